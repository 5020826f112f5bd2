//! Domain operations over the entity store.
//!
//! Every function takes the connection explicitly and returns fully
//! assembled DTOs; related rows are loaded with batched `IN` queries.

pub mod comment;
pub mod post;
pub mod profile;
pub mod session;
pub mod tag;
pub mod user;

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};

use crate::entity::user as user_entity;
use crate::error::AppError;

pub(crate) fn to_rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, false)
}

/// Loads `id -> username` for the given users in one query.
pub(crate) async fn usernames<C: ConnectionTrait>(
    db: &C,
    mut ids: Vec<i32>,
) -> Result<HashMap<i32, String>, AppError> {
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i32, String)> = user_entity::Entity::find()
        .select_only()
        .column(user_entity::Column::Id)
        .column(user_entity::Column::Username)
        .filter(user_entity::Column::Id.is_in(ids))
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows.into_iter().collect())
}

#[cfg(test)]
pub(crate) mod test_support {
    use sea_orm::DatabaseConnection;

    use crate::auth::AuthUser;
    use crate::db::connect_in_memory;
    use crate::service::user::{register as register_user, RegisterUser};

    pub const PASSWORD: &str = "Str0ngP@ssw0rd";

    pub async fn database() -> DatabaseConnection {
        connect_in_memory().await.unwrap()
    }

    pub async fn register(db: &DatabaseConnection, username: &str) -> AuthUser {
        let user = register_user(
            db,
            RegisterUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password: PASSWORD.to_string(),
            },
        )
        .await
        .unwrap();
        AuthUser {
            user_id: user.id,
            username: user.username,
            is_superuser: user.is_superuser,
        }
    }
}
