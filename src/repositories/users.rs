use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::db::models::User;
use crate::db::types::UserType;

const COLUMNS: &str = "\
    id, user_type, last_name, first_name, middle_name, group_name, \
    login, hashed_password, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_by_login(
    pool: &SqlitePool,
    login: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE login = ?"))
        .bind(login)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn login_taken(
    pool: &SqlitePool,
    login: &str,
    except_id: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let found = sqlx::query_scalar::<_, String>(
        "SELECT id FROM users WHERE login = ? AND (? IS NULL OR id <> ?)",
    )
    .bind(login)
    .bind(except_id)
    .bind(except_id)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

/// Same person is last + first + middle (missing middle compares as empty) + user type.
pub(crate) async fn person_exists(
    pool: &SqlitePool,
    last_name: &str,
    first_name: &str,
    middle_name: Option<&str>,
    user_type: UserType,
) -> Result<bool, sqlx::Error> {
    let found = sqlx::query_scalar::<_, String>(
        "SELECT id FROM users
         WHERE last_name = ? AND first_name = ? AND COALESCE(middle_name, '') = ?
           AND user_type = ?
         LIMIT 1",
    )
    .bind(last_name)
    .bind(first_name)
    .bind(middle_name.unwrap_or(""))
    .bind(user_type)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

/// First free login among `base`, `base1`, `base2`, ...
pub(crate) async fn next_available_login(
    pool: &SqlitePool,
    base: &str,
) -> Result<String, sqlx::Error> {
    let mut candidate = base.to_string();
    let mut counter: u32 = 1;
    while login_taken(pool, &candidate, None).await? {
        candidate = format!("{base}{counter}");
        counter += 1;
    }
    Ok(candidate)
}

pub(crate) struct CreateUser<'a> {
    pub id: &'a str,
    pub user_type: UserType,
    pub last_name: &'a str,
    pub first_name: &'a str,
    pub middle_name: Option<&'a str>,
    pub group_name: Option<&'a str>,
    pub login: &'a str,
    pub hashed_password: String,
    pub created_at: time::PrimitiveDateTime,
    pub updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(pool: &SqlitePool, params: CreateUser<'_>) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (
            id, user_type, last_name, first_name, middle_name, group_name,
            login, hashed_password, created_at, updated_at
        ) VALUES (?,?,?,?,?,?,?,?,?,?)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.user_type)
    .bind(params.last_name)
    .bind(params.first_name)
    .bind(params.middle_name)
    .bind(params.group_name)
    .bind(params.login)
    .bind(params.hashed_password)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(pool)
    .await
}

pub(crate) struct UpdateUser {
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub group_name: Option<String>,
    pub login: Option<String>,
    pub hashed_password: Option<String>,
    pub updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn update(
    pool: &SqlitePool,
    id: &str,
    params: UpdateUser,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET
            last_name = COALESCE(?, last_name),
            first_name = COALESCE(?, first_name),
            middle_name = COALESCE(?, middle_name),
            group_name = COALESCE(?, group_name),
            login = COALESCE(?, login),
            hashed_password = COALESCE(?, hashed_password),
            updated_at = ?
         WHERE id = ?
         RETURNING {COLUMNS}",
    ))
    .bind(params.last_name)
    .bind(params.first_name)
    .bind(params.middle_name)
    .bind(params.group_name)
    .bind(params.login)
    .bind(params.hashed_password)
    .bind(params.updated_at)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UserSort {
    Newest,
    Oldest,
    Alphabet,
    Group,
}

#[derive(Debug, Clone)]
pub(crate) struct UserListFilter {
    pub user_type: Option<UserType>,
    pub group: Option<String>,
    pub search: Option<String>,
    pub sort: UserSort,
}

pub(crate) async fn list(
    pool: &SqlitePool,
    filter: &UserListFilter,
) -> Result<Vec<User>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM users WHERE 1=1"));

    if let Some(user_type) = filter.user_type {
        builder.push(" AND user_type = ");
        builder.push_bind(user_type);
    }
    if let Some(group) = filter.group.as_ref() {
        builder.push(" AND group_name = ");
        builder.push_bind(group.clone());
    }
    if let Some(search) = filter.search.as_ref() {
        let pattern = format!("%{search}%");
        builder.push(" AND (last_name LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR first_name LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR middle_name LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR group_name LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR login LIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }

    builder.push(match filter.sort {
        UserSort::Newest => " ORDER BY created_at DESC, rowid DESC",
        UserSort::Oldest => " ORDER BY created_at ASC, rowid ASC",
        UserSort::Alphabet => " ORDER BY last_name, first_name, middle_name",
        UserSort::Group => " ORDER BY group_name, last_name, first_name",
    });

    builder.build_query_as::<User>().fetch_all(pool).await
}

pub(crate) async fn distinct_groups(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT group_name FROM users
         WHERE group_name IS NOT NULL AND group_name <> ''
         ORDER BY group_name",
    )
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::primitive_now_utc;
    use crate::test_support;

    async fn insert(pool: &SqlitePool, login: &str, user_type: UserType, group: Option<&str>) {
        let now = primitive_now_utc();
        let id = uuid::Uuid::new_v4().to_string();
        create(
            pool,
            CreateUser {
                id: &id,
                user_type,
                last_name: "Ivanov",
                first_name: login,
                middle_name: None,
                group_name: group,
                login,
                hashed_password: "hash".to_string(),
                created_at: now,
                updated_at: now,
            },
        )
        .await
        .expect("insert user");
    }

    #[tokio::test]
    async fn next_available_login_appends_counter() {
        let pool = test_support::memory_pool().await;
        assert_eq!(next_available_login(&pool, "ivanovii").await.unwrap(), "ivanovii");

        insert(&pool, "ivanovii", UserType::Student, Some("G1")).await;
        insert(&pool, "ivanovii1", UserType::Student, Some("G1")).await;

        assert_eq!(next_available_login(&pool, "ivanovii").await.unwrap(), "ivanovii2");
    }

    #[tokio::test]
    async fn person_exists_treats_missing_middle_name_as_empty() {
        let pool = test_support::memory_pool().await;
        insert(&pool, "petr", UserType::Teacher, None).await;

        assert!(person_exists(&pool, "Ivanov", "petr", None, UserType::Teacher).await.unwrap());
        assert!(person_exists(&pool, "Ivanov", "petr", Some(""), UserType::Teacher).await.unwrap());
        assert!(!person_exists(&pool, "Ivanov", "petr", None, UserType::Student).await.unwrap());
    }

    #[tokio::test]
    async fn list_filters_and_groups() {
        let pool = test_support::memory_pool().await;
        insert(&pool, "anna", UserType::Student, Some("B-2")).await;
        insert(&pool, "boris", UserType::Student, Some("A-1")).await;
        insert(&pool, "vera", UserType::Teacher, None).await;

        let filter = UserListFilter {
            user_type: Some(UserType::Student),
            group: None,
            search: None,
            sort: UserSort::Group,
        };
        let students = list(&pool, &filter).await.unwrap();
        let logins: Vec<_> = students.iter().map(|user| user.login.as_str()).collect();
        assert_eq!(logins, vec!["boris", "anna"]);

        let filter =
            UserListFilter { user_type: None, group: None, search: Some("ver".into()), sort: UserSort::Newest };
        let found = list(&pool, &filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].login, "vera");

        assert_eq!(distinct_groups(&pool).await.unwrap(), vec!["A-1", "B-2"]);
    }

    #[tokio::test]
    async fn update_and_delete() {
        let pool = test_support::memory_pool().await;
        insert(&pool, "gleb", UserType::Student, Some("C-3")).await;
        let user = find_by_login(&pool, "gleb").await.unwrap().expect("user");

        let updated = update(
            &pool,
            &user.id,
            UpdateUser {
                last_name: None,
                first_name: None,
                middle_name: Some("Olegovich".into()),
                group_name: Some("C-4".into()),
                login: None,
                hashed_password: None,
                updated_at: primitive_now_utc(),
            },
        )
        .await
        .unwrap()
        .expect("updated");
        assert_eq!(updated.group_name.as_deref(), Some("C-4"));
        assert_eq!(updated.middle_name.as_deref(), Some("Olegovich"));
        assert_eq!(updated.login, "gleb");

        assert!(login_taken(&pool, "gleb", None).await.unwrap());
        assert!(!login_taken(&pool, "gleb", Some(&user.id)).await.unwrap());

        assert!(delete(&pool, &user.id).await.unwrap());
        assert!(!delete(&pool, &user.id).await.unwrap());
    }
}
