//! Author profiles: at most one per user.

use std::collections::HashMap;

use chrono::Utc;
use log::info;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};

use crate::auth::{assert_owner, AuthUser};
use crate::entity::{profile, user};
use crate::error::AppError;
use crate::pagination::{Page, PageDto};
use crate::service::{to_rfc3339, usernames};

#[derive(Debug, Deserialize)]
pub struct NewProfile {
    pub firstname: String,
    pub lastname: String,
    pub bio: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileChanges {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub bio: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDto {
    pub id: i32,
    pub user_id: i32,
    pub username: String,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Public listing entry; contact details are left out.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummaryDto {
    pub user_id: i32,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub author_url: String,
}

fn check_names(firstname: &str, lastname: &str) -> Result<(), AppError> {
    if firstname.trim().is_empty() || lastname.trim().is_empty() {
        return Err(AppError::param_error("firstname and lastname are required"));
    }
    if firstname.chars().count() > 50 || lastname.chars().count() > 50 {
        return Err(AppError::param_error("names must be at most 50 characters"));
    }
    Ok(())
}

async fn find_user(db: &DatabaseConnection, user_id: i32) -> Result<user::Model, AppError> {
    user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))
}

async fn find_for_user(db: &DatabaseConnection, user_id: i32) -> Result<profile::Model, AppError> {
    profile::Entity::find()
        .filter(profile::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("profile not found"))
}

fn to_dto(model: profile::Model, owner: &user::Model) -> ProfileDto {
    ProfileDto {
        id: model.id,
        user_id: model.user_id,
        username: owner.username.clone(),
        email: owner.email.clone(),
        firstname: model.firstname,
        lastname: model.lastname,
        bio: model.bio,
        website: model.website,
        created_at: to_rfc3339(model.created_at),
        updated_at: to_rfc3339(model.updated_at),
    }
}

pub async fn create(
    db: &DatabaseConnection,
    caller: &AuthUser,
    user_id: i32,
    input: NewProfile,
) -> Result<ProfileDto, AppError> {
    let owner = find_user(db, user_id).await?;
    assert_owner(&owner, caller)?;
    check_names(&input.firstname, &input.lastname)?;

    let now = Utc::now();
    let model = profile::ActiveModel {
        user_id: Set(user_id),
        firstname: Set(input.firstname.trim().to_string()),
        lastname: Set(input.lastname.trim().to_string()),
        bio: Set(input.bio),
        website: Set(input.website),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| AppError::conflict_on_unique(e, "profile already exists for this user"))?;

    info!("profile created id={} user={}", model.id, user_id);
    Ok(to_dto(model, &owner))
}

pub async fn get_by_user(db: &DatabaseConnection, caller: &AuthUser, user_id: i32) -> Result<ProfileDto, AppError> {
    let owner = find_user(db, user_id).await?;
    assert_owner(&owner, caller)?;
    let model = find_for_user(db, user_id).await?;
    Ok(to_dto(model, &owner))
}

pub async fn update(
    db: &DatabaseConnection,
    caller: &AuthUser,
    user_id: i32,
    changes: ProfileChanges,
) -> Result<ProfileDto, AppError> {
    let owner = find_user(db, user_id).await?;
    assert_owner(&owner, caller)?;
    let model = find_for_user(db, user_id).await?;

    let firstname = changes.firstname.map(|f| f.trim().to_string());
    let lastname = changes.lastname.map(|l| l.trim().to_string());
    check_names(
        firstname.as_deref().unwrap_or(&model.firstname),
        lastname.as_deref().unwrap_or(&model.lastname),
    )?;

    let mut active: profile::ActiveModel = model.into();
    if let Some(firstname) = firstname {
        active.firstname = Set(firstname);
    }
    if let Some(lastname) = lastname {
        active.lastname = Set(lastname);
    }
    if let Some(bio) = changes.bio {
        active.bio = Set(Some(bio));
    }
    if let Some(website) = changes.website {
        active.website = Set(Some(website));
    }
    active.updated_at = Set(Utc::now());
    let model = active.update(db).await?;
    Ok(to_dto(model, &owner))
}

pub async fn delete(db: &DatabaseConnection, caller: &AuthUser, profile_id: i32) -> Result<(), AppError> {
    let model = profile::Entity::find_by_id(profile_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("profile not found"))?;
    assert_owner(&model, caller)?;
    profile::Entity::delete_by_id(profile_id).exec(db).await?;
    info!("profile deleted id={}", profile_id);
    Ok(())
}

pub async fn search(
    db: &DatabaseConnection,
    username: Option<&str>,
    firstname: Option<&str>,
    lastname: Option<&str>,
    page: Page,
) -> Result<PageDto<AuthorSummaryDto>, AppError> {
    let mut select = profile::Entity::find();
    if let Some(username) = username.filter(|u| !u.is_empty()) {
        let user_ids: Vec<i32> = user::Entity::find()
            .select_only()
            .column(user::Column::Id)
            .filter(user::Column::Username.contains(username))
            .into_tuple()
            .all(db)
            .await?;
        select = select.filter(profile::Column::UserId.is_in(user_ids));
    }
    if let Some(firstname) = firstname.filter(|f| !f.is_empty()) {
        select = select.filter(profile::Column::Firstname.contains(firstname));
    }
    if let Some(lastname) = lastname.filter(|l| !l.is_empty()) {
        select = select.filter(profile::Column::Lastname.contains(lastname));
    }

    let total = select.clone().count(db).await?;
    let models = select
        .order_by_asc(profile::Column::Id)
        .offset(page.offset)
        .limit(page.limit)
        .all(db)
        .await?;
    let names: HashMap<i32, String> = usernames(db, models.iter().map(|m| m.user_id).collect()).await?;
    let items = models
        .into_iter()
        .map(|m| AuthorSummaryDto {
            author_url: format!("/api/authors/{}", m.user_id),
            username: names.get(&m.user_id).cloned().unwrap_or_default(),
            user_id: m.user_id,
            firstname: m.firstname,
            lastname: m.lastname,
        })
        .collect();
    Ok(PageDto::new(page, total, items))
}
