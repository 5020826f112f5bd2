use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use log::debug;
use sea_orm::{DatabaseConnection, EntityTrait};

use crate::config::AppConfig;
use crate::entity::{comment, post, profile, user};
use crate::error::AppError;
use crate::token::{TokenKind, TokenService};

/// The authenticated caller of a request.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: i32,
    pub username: String,
    pub is_superuser: bool,
}

impl From<user::Model> for AuthUser {
    fn from(model: user::Model) -> Self {
        Self {
            user_id: model.id,
            username: model.username,
            is_superuser: model.is_superuser,
        }
    }
}

/// Caller identity for public routes; `None` when no valid token was sent.
#[derive(Clone, Debug)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = match request_state(req) {
            Some(state) => state,
            None => {
                return Box::pin(async { Err(AppError::system_exception().into()) });
            }
        };
        let token = extract_token(req, &state.1);

        Box::pin(async move {
            let token = token.ok_or_else(AppError::need_login)?;
            let caller = resolve_caller(&state.0, &state.2, &token).await?;
            Ok(caller.into())
        })
    }
}

impl FromRequest for OptionalAuthUser {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = match request_state(req) {
            Some(state) => state,
            None => {
                return Box::pin(async { Ok(OptionalAuthUser(None)) });
            }
        };
        let token = extract_token(req, &state.1);

        Box::pin(async move {
            if let Some(token) = token {
                let caller = resolve_caller(&state.0, &state.2, &token).await.ok();
                return Ok(OptionalAuthUser(caller.map(AuthUser::from)));
            }
            Ok(OptionalAuthUser(None))
        })
    }
}

type RequestState = (
    web::Data<DatabaseConnection>,
    web::Data<AppConfig>,
    web::Data<TokenService>,
);

fn request_state(req: &HttpRequest) -> Option<RequestState> {
    Some((
        req.app_data::<web::Data<DatabaseConnection>>()?.clone(),
        req.app_data::<web::Data<AppConfig>>()?.clone(),
        req.app_data::<web::Data<TokenService>>()?.clone(),
    ))
}

fn extract_token(req: &HttpRequest, config: &AppConfig) -> Option<String> {
    let header = config.token_header.as_str();
    req.headers()
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            let v = v.trim();
            match v.split_once(' ') {
                Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim().to_string(),
                None if v.eq_ignore_ascii_case("bearer") => String::new(),
                _ => v.to_string(),
            }
        })
        .filter(|v| !v.is_empty())
}

/// Resolves an access token to the live, active user it was issued for.
pub async fn resolve_caller(
    db: &DatabaseConnection,
    tokens: &TokenService,
    token: &str,
) -> Result<user::Model, AppError> {
    let claims = tokens.decode(token, TokenKind::Access)?;
    let user_id = claims
        .sub
        .parse::<i32>()
        .map_err(|_| AppError::invalid_token())?;
    let caller = user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(AppError::invalid_token)?;
    if !caller.is_active {
        debug!("token for inactive user {} rejected", caller.id);
        return Err(AppError::invalid_token());
    }
    Ok(caller)
}

/// A record that exactly one user may mutate.
pub trait Owned {
    fn owner_id(&self) -> i32;
}

impl Owned for post::Model {
    fn owner_id(&self) -> i32 {
        self.author_id
    }
}

impl Owned for comment::Model {
    fn owner_id(&self) -> i32 {
        self.author_id
    }
}

impl Owned for profile::Model {
    fn owner_id(&self) -> i32 {
        self.user_id
    }
}

impl Owned for user::Model {
    fn owner_id(&self) -> i32 {
        self.id
    }
}

pub fn assert_owner<R: Owned>(resource: &R, caller: &AuthUser) -> Result<(), AppError> {
    if resource.owner_id() != caller.user_id {
        return Err(AppError::forbidden(
            "you do not have permission to modify this resource",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn caller(user_id: i32) -> AuthUser {
        AuthUser {
            user_id,
            username: format!("user{}", user_id),
            is_superuser: false,
        }
    }

    fn sample_comment(author_id: i32) -> comment::Model {
        comment::Model {
            id: 1,
            content: "hi".to_string(),
            author_id,
            post_id: 1,
            parent_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn owner_passes_and_stranger_is_forbidden() {
        let comment = sample_comment(3);
        assert!(assert_owner(&comment, &caller(3)).is_ok());
        assert!(matches!(
            assert_owner(&comment, &caller(4)),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn bearer_prefix_is_stripped() {
        let config = AppConfig::default();
        let req = actix_web::test::TestRequest::default()
            .insert_header(("Authorization", "Bearer abc.def.ghi"))
            .to_http_request();
        assert_eq!(extract_token(&req, &config).as_deref(), Some("abc.def.ghi"));

        let empty = actix_web::test::TestRequest::default()
            .insert_header(("Authorization", "Bearer "))
            .to_http_request();
        assert_eq!(extract_token(&empty, &config), None);
    }

    #[test]
    fn scheme_needs_a_separating_space() {
        let config = AppConfig::default();
        let glued = actix_web::test::TestRequest::default()
            .insert_header(("Authorization", "Bearerxyz"))
            .to_http_request();
        assert_eq!(extract_token(&glued, &config).as_deref(), Some("Bearerxyz"));

        let spaced = actix_web::test::TestRequest::default()
            .insert_header(("Authorization", "bearer   abc"))
            .to_http_request();
        assert_eq!(extract_token(&spaced, &config).as_deref(), Some("abc"));
    }
}
