use log::{info, warn};
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter};

use crate::credential::verify_password;
use crate::entity::user;
use crate::error::AppError;
use crate::token::{TokenKind, TokenPair, TokenService};

/// Exchanges credentials for a token pair. `identifier` may be the
/// username or the email address.
pub async fn login(
    db: &DatabaseConnection,
    tokens: &TokenService,
    identifier: &str,
    password: &str,
) -> Result<TokenPair, AppError> {
    let identifier = identifier.trim();
    let found = user::Entity::find()
        .filter(
            Condition::any()
                .add(user::Column::Username.eq(identifier))
                .add(user::Column::Email.eq(identifier)),
        )
        .one(db)
        .await?;

    let account = match found {
        Some(account) if verify_password(password, &account.password_hash) => account,
        _ => {
            warn!("failed login for {}", identifier);
            return Err(AppError::authentication_failed());
        }
    };
    if !account.is_active {
        warn!("login refused for inactive user {}", account.id);
        return Err(AppError::authentication_failed());
    }

    info!("user {} logged in", account.id);
    tokens.issue_pair(&account.id.to_string())
}

/// Issues a fresh pair for a valid refresh token. The presented token stays
/// usable until it expires.
pub async fn refresh(db: &DatabaseConnection, tokens: &TokenService, refresh_token: &str) -> Result<TokenPair, AppError> {
    let claims = tokens.decode(refresh_token, TokenKind::Refresh)?;
    let user_id: i32 = claims.sub.parse().map_err(|_| AppError::invalid_token())?;
    let account = user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(AppError::invalid_token)?;
    tokens.issue_pair(&account.id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::resolve_caller;
    use crate::config::AppConfig;
    use crate::service::test_support::{database, register, PASSWORD};
    use crate::service::user::{delete as delete_user, set_active};

    fn token_service() -> TokenService {
        TokenService::new(&AppConfig {
            jwt_secret: "session-test".to_string(),
            ..Default::default()
        })
    }

    #[actix_web::test]
    async fn login_by_username_or_email() {
        let db = database().await;
        let tokens = token_service();
        let alice = register(&db, "alice").await;

        let by_name = login(&db, &tokens, "alice", PASSWORD).await.unwrap();
        assert_eq!(by_name.token_type, "bearer");
        let caller = resolve_caller(&db, &tokens, &by_name.access_token).await.unwrap();
        assert_eq!(caller.id, alice.user_id);

        assert!(login(&db, &tokens, "alice@example.com", PASSWORD).await.is_ok());
    }

    #[actix_web::test]
    async fn bad_credentials_fail_authentication() {
        let db = database().await;
        let tokens = token_service();
        register(&db, "alice").await;

        assert!(matches!(
            login(&db, &tokens, "alice", "wrong-password").await,
            Err(AppError::AuthenticationFailed(_))
        ));
        assert!(matches!(
            login(&db, &tokens, "nobody", PASSWORD).await,
            Err(AppError::AuthenticationFailed(_))
        ));
    }

    #[actix_web::test]
    async fn refresh_requires_refresh_token() {
        let db = database().await;
        let tokens = token_service();
        register(&db, "alice").await;
        let pair = login(&db, &tokens, "alice", PASSWORD).await.unwrap();

        let renewed = refresh(&db, &tokens, &pair.refresh_token).await.unwrap();
        assert!(resolve_caller(&db, &tokens, &renewed.access_token).await.is_ok());

        assert!(matches!(
            refresh(&db, &tokens, &pair.access_token).await,
            Err(AppError::Unauthenticated(_))
        ));
        assert!(matches!(
            resolve_caller(&db, &tokens, &pair.refresh_token).await,
            Err(AppError::Unauthenticated(_))
        ));
    }

    #[actix_web::test]
    async fn deactivated_users_lose_access() {
        let db = database().await;
        let tokens = token_service();
        let alice = register(&db, "alice").await;
        let pair = login(&db, &tokens, "alice", PASSWORD).await.unwrap();

        set_active(&db, &alice, alice.user_id, false).await.unwrap();

        assert!(matches!(
            login(&db, &tokens, "alice", PASSWORD).await,
            Err(AppError::AuthenticationFailed(_))
        ));
        assert!(matches!(
            refresh(&db, &tokens, &pair.refresh_token).await,
            Err(AppError::Unauthenticated(_))
        ));
        assert!(matches!(
            resolve_caller(&db, &tokens, &pair.access_token).await,
            Err(AppError::Unauthenticated(_))
        ));
    }

    #[actix_web::test]
    async fn deleted_users_tokens_stop_working() {
        let db = database().await;
        let tokens = token_service();
        let alice = register(&db, "alice").await;
        let pair = login(&db, &tokens, "alice", PASSWORD).await.unwrap();

        delete_user(&db, &alice, alice.user_id).await.unwrap();

        assert!(matches!(
            refresh(&db, &tokens, &pair.refresh_token).await,
            Err(AppError::Unauthenticated(_))
        ));
        assert!(matches!(
            resolve_caller(&db, &tokens, &pair.access_token).await,
            Err(AppError::Unauthenticated(_))
        ));
    }

    #[actix_web::test]
    async fn expired_access_token_is_unauthenticated() {
        let db = database().await;
        let tokens = TokenService::new(&AppConfig {
            jwt_secret: "session-test".to_string(),
            access_token_expire_minutes: -1,
            ..Default::default()
        });
        register(&db, "alice").await;
        let pair = login(&db, &tokens, "alice", PASSWORD).await.unwrap();

        assert!(matches!(
            resolve_caller(&db, &tokens, &pair.access_token).await,
            Err(AppError::Unauthenticated(_))
        ));
        assert!(refresh(&db, &tokens, &pair.refresh_token).await.is_ok());
    }
}
