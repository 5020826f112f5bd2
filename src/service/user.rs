use chrono::Utc;
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::auth::{assert_owner, AuthUser};
use crate::credential::hash_password;
use crate::entity::{comment, post, profile, user};
use crate::error::{is_unique_violation, AppError};
use crate::pagination::{Page, PageDto};
use crate::service::{comment as comment_service, post as post_service, to_rfc3339};

static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]{3,50}$").expect("valid username regex"));
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});

#[derive(Debug, Deserialize)]
pub struct RegisterUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<user::Model> for UserDto {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            is_active: model.is_active,
            is_superuser: model.is_superuser,
            created_at: to_rfc3339(model.created_at),
            updated_at: to_rfc3339(model.updated_at),
        }
    }
}

pub fn validate_username(username: &str) -> Result<(), AppError> {
    if !USERNAME_REGEX.is_match(username) {
        return Err(AppError::param_error(
            "username must be 3-50 characters of letters, digits, '_', '.' or '-'",
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    if email.len() > 256 || !EMAIL_REGEX.is_match(email) {
        return Err(AppError::param_error("invalid email address"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < 8 {
        return Err(AppError::param_error("password must be at least 8 characters"));
    }
    Ok(())
}

fn map_write_error(err: DbErr) -> AppError {
    if is_unique_violation(&err) {
        if err.to_string().contains("email") {
            return AppError::conflict("email already exists");
        }
        return AppError::conflict("username already exists");
    }
    err.into()
}

pub async fn register(db: &DatabaseConnection, input: RegisterUser) -> Result<UserDto, AppError> {
    let username = input.username.trim().to_string();
    let email = input.email.trim().to_string();
    validate_username(&username)?;
    validate_email(&email)?;
    validate_password(&input.password)?;

    let now = Utc::now();
    let model = user::ActiveModel {
        username: Set(username),
        email: Set(email),
        password_hash: Set(hash_password(&input.password)?),
        is_active: Set(true),
        is_superuser: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(map_write_error)?;

    info!("user registered id={} username={}", model.id, model.username);
    Ok(model.into())
}

async fn find(db: &DatabaseConnection, id: i32) -> Result<user::Model, AppError> {
    user::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))
}

pub async fn current(db: &DatabaseConnection, caller: &AuthUser) -> Result<UserDto, AppError> {
    Ok(find(db, caller.user_id).await?.into())
}

pub async fn get(db: &DatabaseConnection, caller: &AuthUser, id: i32) -> Result<UserDto, AppError> {
    let model = find(db, id).await?;
    assert_owner(&model, caller)?;
    Ok(model.into())
}

pub async fn search(
    db: &DatabaseConnection,
    username: Option<&str>,
    email: Option<&str>,
    page: Page,
) -> Result<PageDto<UserDto>, AppError> {
    let mut select = user::Entity::find();
    if let Some(username) = username.filter(|v| !v.is_empty()) {
        select = select.filter(user::Column::Username.contains(username));
    }
    if let Some(email) = email.filter(|v| !v.is_empty()) {
        select = select.filter(user::Column::Email.contains(email));
    }

    let total = select.clone().count(db).await?;
    let rows = select
        .order_by_asc(user::Column::Id)
        .offset(page.offset)
        .limit(page.limit)
        .all(db)
        .await?;
    Ok(PageDto::new(page, total, rows.into_iter().map(UserDto::from).collect()))
}

pub async fn update(
    db: &DatabaseConnection,
    caller: &AuthUser,
    id: i32,
    changes: UserChanges,
) -> Result<UserDto, AppError> {
    let model = find(db, id).await?;
    assert_owner(&model, caller)?;

    let mut active: user::ActiveModel = model.into();
    if let Some(username) = changes.username.map(|v| v.trim().to_string()) {
        validate_username(&username)?;
        active.username = Set(username);
    }
    if let Some(email) = changes.email.map(|v| v.trim().to_string()) {
        validate_email(&email)?;
        active.email = Set(email);
    }
    if let Some(password) = changes.password {
        validate_password(&password)?;
        active.password_hash = Set(hash_password(&password)?);
    }
    active.updated_at = Set(Utc::now());

    let model = active.update(db).await.map_err(map_write_error)?;
    Ok(model.into())
}

/// Deletes a user with everything they own: profile, posts (with their
/// comments and tag links) and comments written elsewhere with their replies.
pub async fn delete(db: &DatabaseConnection, caller: &AuthUser, id: i32) -> Result<(), AppError> {
    let model = find(db, id).await?;
    assert_owner(&model, caller)?;

    db.transaction::<_, (), AppError>(move |txn| {
        Box::pin(async move {
            let post_ids: Vec<i32> = post::Entity::find()
                .select_only()
                .column(post::Column::Id)
                .filter(post::Column::AuthorId.eq(id))
                .into_tuple()
                .all(txn)
                .await?;
            post_service::delete_with_dependents(txn, post_ids).await?;

            let own_comments: Vec<i32> = comment::Entity::find()
                .select_only()
                .column(comment::Column::Id)
                .filter(comment::Column::AuthorId.eq(id))
                .into_tuple()
                .all(txn)
                .await?;
            comment_service::delete_subtrees(txn, own_comments).await?;

            profile::Entity::delete_many()
                .filter(profile::Column::UserId.eq(id))
                .exec(txn)
                .await?;
            user::Entity::delete_by_id(id).exec(txn).await?;
            Ok(())
        })
    })
    .await?;

    info!("user deleted id={}", id);
    Ok(())
}

/// A user may deactivate themself; anything else requires a superuser.
pub async fn set_active(
    db: &DatabaseConnection,
    caller: &AuthUser,
    id: i32,
    active: bool,
) -> Result<UserDto, AppError> {
    let model = find(db, id).await?;
    let self_deactivation = !active && model.id == caller.user_id;
    if !self_deactivation && !caller.is_superuser {
        return Err(AppError::forbidden(
            "you do not have permission to change this user's status",
        ));
    }
    if model.is_active == active {
        return Ok(model.into());
    }

    let mut record: user::ActiveModel = model.into();
    record.is_active = Set(active);
    record.updated_at = Set(Utc::now());
    let model = record.update(db).await?;
    info!("user id={} active={}", model.id, model.is_active);
    Ok(model.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::post_tag;
    use crate::service::comment::{self as comments, NewComment};
    use crate::service::post::{self as posts, NewPost};
    use crate::service::profile::{self as profiles, NewProfile};
    use crate::service::test_support::{database, register as register_fixture, PASSWORD};

    fn draft(title: &str) -> NewPost {
        NewPost {
            title: title.to_string(),
            subtitle: "sub".to_string(),
            content: "body".to_string(),
        }
    }

    fn comment_on(post_id: i32, content: &str, parent_id: Option<i32>) -> NewComment {
        NewComment {
            post_id,
            content: content.to_string(),
            parent_id,
        }
    }

    fn registration(username: &str, email: &str) -> RegisterUser {
        RegisterUser {
            username: username.to_string(),
            email: email.to_string(),
            password: PASSWORD.to_string(),
        }
    }

    #[actix_web::test]
    async fn duplicate_username_and_email_conflict() {
        let db = database().await;
        register(&db, registration("alice", "alice@example.com")).await.unwrap();

        let by_name = register(&db, registration("alice", "other@example.com")).await;
        assert!(matches!(by_name, Err(AppError::Conflict(ref m)) if m.contains("username")));

        let by_email = register(&db, registration("alice2", "alice@example.com")).await;
        assert!(matches!(by_email, Err(AppError::Conflict(ref m)) if m.contains("email")));
    }

    #[actix_web::test]
    async fn registration_validates_shape() {
        let db = database().await;
        assert!(matches!(
            register(&db, registration("ab", "ab@example.com")).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            register(&db, registration("abc", "not-an-email")).await,
            Err(AppError::BadRequest(_))
        ));
        let mut short = registration("abc", "abc@example.com");
        short.password = "short".to_string();
        assert!(matches!(register(&db, short).await, Err(AppError::BadRequest(_))));
    }

    #[actix_web::test]
    async fn only_owner_reads_and_updates() {
        let db = database().await;
        let alice = register_fixture(&db, "alice").await;
        let bob = register_fixture(&db, "bob").await;

        assert!(get(&db, &alice, alice.user_id).await.is_ok());
        assert!(matches!(get(&db, &bob, alice.user_id).await, Err(AppError::Forbidden(_))));
        assert!(matches!(get(&db, &bob, 999).await, Err(AppError::NotFound(_))));

        let renamed = update(
            &db,
            &alice,
            alice.user_id,
            UserChanges {
                username: Some("alice_w".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(renamed.username, "alice_w");

        let clash = update(
            &db,
            &alice,
            alice.user_id,
            UserChanges {
                email: Some("bob@example.com".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(clash, Err(AppError::Conflict(_))));
    }

    #[actix_web::test]
    async fn search_filters_by_substring() {
        let db = database().await;
        register_fixture(&db, "alice").await;
        register_fixture(&db, "alina").await;
        register_fixture(&db, "bob").await;

        let found = search(&db, Some("ali"), None, Page::default()).await.unwrap();
        assert_eq!(found.total_items, 2);
        let names: Vec<_> = found.items.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "alina"]);
    }

    #[actix_web::test]
    async fn delete_cascades_to_everything_the_user_owns() {
        let db = database().await;
        let alice = register_fixture(&db, "alice").await;
        let bob = register_fixture(&db, "bob").await;

        profiles::create(
            &db,
            &alice,
            alice.user_id,
            NewProfile {
                firstname: "Alice".to_string(),
                lastname: "Liddell".to_string(),
                bio: None,
                website: None,
            },
        )
        .await
        .unwrap();
        let farewell = posts::create(&db, &alice, draft("Bye")).await.unwrap();
        posts::publish(&db, &alice, farewell.id).await.unwrap();
        posts::add_tags(&db, &alice, farewell.id, vec!["farewell".to_string()])
            .await
            .unwrap();
        let bobs_post = posts::create(&db, &bob, draft("Hello")).await.unwrap();
        posts::publish(&db, &bob, bobs_post.id).await.unwrap();

        comments::create(&db, &bob, comment_on(farewell.id, "see you", None))
            .await
            .unwrap();
        let bob_root = comments::create(&db, &bob, comment_on(bobs_post.id, "welcome", None))
            .await
            .unwrap();
        let alice_reply = comments::create(&db, &alice, comment_on(bobs_post.id, "thanks", Some(bob_root.id)))
            .await
            .unwrap();
        comments::create(&db, &bob, comment_on(bobs_post.id, "anytime", Some(alice_reply.id)))
            .await
            .unwrap();

        assert!(matches!(
            delete(&db, &bob, alice.user_id).await,
            Err(AppError::Forbidden(_))
        ));
        delete(&db, &alice, alice.user_id).await.unwrap();

        assert!(user::Entity::find_by_id(alice.user_id).one(&db).await.unwrap().is_none());
        assert!(post::Entity::find_by_id(farewell.id).one(&db).await.unwrap().is_none());
        assert!(post::Entity::find_by_id(bobs_post.id).one(&db).await.unwrap().is_some());
        assert_eq!(profile::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(post_tag::Entity::find().count(&db).await.unwrap(), 0);

        let remaining: Vec<i32> = comment::Entity::find()
            .all(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(remaining, vec![bob_root.id]);
    }

    #[actix_web::test]
    async fn deactivation_rules() {
        let db = database().await;
        let alice = register_fixture(&db, "alice").await;
        let bob = register_fixture(&db, "bob").await;

        assert!(matches!(
            set_active(&db, &bob, alice.user_id, false).await,
            Err(AppError::Forbidden(_))
        ));
        let off = set_active(&db, &alice, alice.user_id, false).await.unwrap();
        assert!(!off.is_active);

        let admin = AuthUser {
            is_superuser: true,
            ..bob.clone()
        };
        let on = set_active(&db, &admin, alice.user_id, true).await.unwrap();
        assert!(on.is_active);
    }
}
