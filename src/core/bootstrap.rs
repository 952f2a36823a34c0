use uuid::Uuid;

use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserType;
use crate::repositories;

/// Makes sure the configured administrator account exists, is an admin and accepts the
/// configured password.
pub(crate) async fn ensure_superuser(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_superuser_password.is_empty() {
        tracing::warn!("FIRST_SUPERUSER_PASSWORD not configured; skipping superuser creation");
        return Ok(());
    }

    let login = admin.first_superuser_login.as_str();
    let now = primitive_now_utc();

    if let Some(user) = repositories::users::find_by_login(state.db(), login).await? {
        let password_ok =
            security::verify_password(&admin.first_superuser_password, &user.hashed_password)
                .unwrap_or(false);

        if password_ok && user.user_type == UserType::Admin {
            tracing::info!(login, "Default superuser already up to date");
            return Ok(());
        }

        let hashed_password = if password_ok {
            user.hashed_password.clone()
        } else {
            security::hash_password(&admin.first_superuser_password)?
        };

        sqlx::query(
            "UPDATE users SET hashed_password = ?, user_type = ?, updated_at = ? WHERE id = ?",
        )
        .bind(hashed_password)
        .bind(UserType::Admin)
        .bind(now)
        .bind(&user.id)
        .execute(state.db())
        .await?;

        tracing::info!(login, "Updated default superuser");
        return Ok(());
    }

    let hashed_password = security::hash_password(&admin.first_superuser_password)?;
    let id = Uuid::new_v4().to_string();
    repositories::users::create(
        state.db(),
        repositories::users::CreateUser {
            id: &id,
            user_type: UserType::Admin,
            last_name: "Administrator",
            first_name: "System",
            middle_name: None,
            group_name: None,
            login,
            hashed_password,
            created_at: now,
            updated_at: now,
        },
    )
    .await?;

    tracing::info!(login, "Created default superuser");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[tokio::test]
    async fn superuser_is_created_then_repaired() {
        let ctx = test_support::setup_test_context().await;

        ensure_superuser(&ctx.state).await.expect("create");
        let created = repositories::users::find_by_login(ctx.state.db(), test_support::ADMIN_LOGIN)
            .await
            .unwrap()
            .expect("superuser");
        assert_eq!(created.user_type, UserType::Admin);

        sqlx::query("UPDATE users SET user_type = 'student' WHERE id = ?")
            .bind(&created.id)
            .execute(ctx.state.db())
            .await
            .unwrap();

        ensure_superuser(&ctx.state).await.expect("repair");
        let repaired = repositories::users::find_by_id(ctx.state.db(), &created.id)
            .await
            .unwrap()
            .expect("superuser");
        assert_eq!(repaired.user_type, UserType::Admin);
        assert!(security::verify_password(test_support::ADMIN_PASSWORD, &repaired.hashed_password)
            .unwrap());
    }
}
