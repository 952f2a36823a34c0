use anyhow::Context;
use sqlx::SqlitePool;

use crate::core::security;
use crate::core::time::primitive_now_utc;
use crate::db::models::User;
use crate::db::types::UserType;
use crate::repositories;
use crate::services::credentials;

#[derive(Debug, Clone)]
pub(crate) struct NewAccount {
    pub(crate) user_type: UserType,
    pub(crate) last_name: String,
    pub(crate) first_name: String,
    pub(crate) middle_name: Option<String>,
    pub(crate) group_name: Option<String>,
}

#[derive(Debug)]
pub(crate) enum RegisterOutcome {
    /// The plaintext password is only ever returned here.
    Created { user: User, password: String },
    AlreadyExists,
}

fn normalized(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
}

/// Creates an account with a generated login and password unless the same person already
/// has an account of this type.
pub(crate) async fn register(
    pool: &SqlitePool,
    account: NewAccount,
) -> anyhow::Result<RegisterOutcome> {
    let last_name = account.last_name.trim();
    let first_name = account.first_name.trim();
    let middle_name = normalized(account.middle_name.as_deref());
    let group_name = normalized(account.group_name.as_deref());

    if repositories::users::person_exists(
        pool,
        last_name,
        first_name,
        middle_name.as_deref(),
        account.user_type,
    )
    .await
    .context("Failed to check for existing user")?
    {
        return Ok(RegisterOutcome::AlreadyExists);
    }

    let base_login = credentials::generate_login(last_name, first_name, middle_name.as_deref());
    let login = repositories::users::next_available_login(pool, &base_login)
        .await
        .context("Failed to pick a free login")?;
    let password = credentials::generate_password();
    let hashed_password =
        security::hash_password(&password).context("Failed to hash generated password")?;

    let now = primitive_now_utc();
    let id = uuid::Uuid::new_v4().to_string();
    let user = repositories::users::create(
        pool,
        repositories::users::CreateUser {
            id: &id,
            user_type: account.user_type,
            last_name,
            first_name,
            middle_name: middle_name.as_deref(),
            group_name: group_name.as_deref(),
            login: &login,
            hashed_password,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .context("Failed to create user")?;

    Ok(RegisterOutcome::Created { user, password })
}

/// Issues a fresh random password. Returns `None` when the user does not exist.
pub(crate) async fn regenerate_password(
    pool: &SqlitePool,
    user_id: &str,
) -> anyhow::Result<Option<(User, String)>> {
    let password = credentials::generate_password();
    let hashed_password =
        security::hash_password(&password).context("Failed to hash generated password")?;

    let updated = repositories::users::update(
        pool,
        user_id,
        repositories::users::UpdateUser {
            last_name: None,
            first_name: None,
            middle_name: None,
            group_name: None,
            login: None,
            hashed_password: Some(hashed_password),
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .context("Failed to store regenerated password")?;

    Ok(updated.map(|user| (user, password)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    fn student(last: &str, first: &str, middle: Option<&str>) -> NewAccount {
        NewAccount {
            user_type: UserType::Student,
            last_name: last.into(),
            first_name: first.into(),
            middle_name: middle.map(String::from),
            group_name: Some(" ХБ-101 ".into()),
        }
    }

    #[tokio::test]
    async fn namesakes_get_numbered_logins_and_duplicates_are_refused() {
        let pool = test_support::memory_pool().await;

        let first = register(&pool, student("Иванов", "Пётр", Some("Сергеевич"))).await.unwrap();
        let RegisterOutcome::Created { user, password } = first else {
            panic!("expected a new account");
        };
        assert_eq!(user.login, "ivanovps");
        assert_eq!(user.group_name.as_deref(), Some("ХБ-101"));
        assert!(security::verify_password(&password, &user.hashed_password).unwrap());

        // Different middle name, same initials.
        let second = register(&pool, student("Иванов", "Павел", Some("Семёнович"))).await.unwrap();
        let RegisterOutcome::Created { user, .. } = second else {
            panic!("expected a new account");
        };
        assert_eq!(user.login, "ivanovps1");

        let again = register(&pool, student("Иванов", "Пётр", Some("Сергеевич"))).await.unwrap();
        assert!(matches!(again, RegisterOutcome::AlreadyExists));
    }

    #[tokio::test]
    async fn regenerated_password_replaces_the_old_one() {
        let pool = test_support::memory_pool().await;
        let RegisterOutcome::Created { user, password } =
            register(&pool, student("Petrova", "Anna", None)).await.unwrap()
        else {
            panic!("expected a new account");
        };

        let (updated, fresh) = regenerate_password(&pool, &user.id).await.unwrap().expect("user");
        assert!(security::verify_password(&fresh, &updated.hashed_password).unwrap());
        assert!(!security::verify_password(&password, &updated.hashed_password).unwrap());

        assert!(regenerate_password(&pool, "missing").await.unwrap().is_none());
    }
}
