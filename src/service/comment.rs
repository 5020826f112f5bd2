//! Threaded comments on posts.

use std::collections::HashMap;

use chrono::Utc;
use log::{debug, info};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::auth::{assert_owner, AuthUser};
use crate::entity::{comment, post};
use crate::error::AppError;
use crate::pagination::{Page, PageDto};
use crate::service::{to_rfc3339, usernames};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub post_id: i32,
    pub content: String,
    pub parent_id: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDto {
    pub id: i32,
    pub content: String,
    pub author_id: i32,
    pub author_username: String,
    pub post_id: i32,
    pub parent_id: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
    pub replies: Vec<CommentDto>,
}

fn check_content(content: &str) -> Result<(), AppError> {
    if content.trim().is_empty() {
        return Err(AppError::param_error("content must not be empty"));
    }
    Ok(())
}

async fn find(db: &DatabaseConnection, id: i32) -> Result<comment::Model, AppError> {
    comment::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("comment not found"))
}

async fn visible_post(
    db: &DatabaseConnection,
    caller: Option<&AuthUser>,
    post_id: i32,
) -> Result<Option<post::Model>, AppError> {
    let found = post::Entity::find_by_id(post_id).one(db).await?;
    Ok(found.filter(|p| p.is_published || caller.map(|c| c.user_id) == Some(p.author_id)))
}

/// Collects every comment below `roots`, one query per tree level.
async fn descendants<C: ConnectionTrait>(db: &C, roots: Vec<i32>) -> Result<Vec<comment::Model>, AppError> {
    let mut all = Vec::new();
    let mut frontier = roots;
    while !frontier.is_empty() {
        let level = comment::Entity::find()
            .filter(comment::Column::ParentId.is_in(frontier))
            .order_by_asc(comment::Column::CreatedAt)
            .order_by_asc(comment::Column::Id)
            .all(db)
            .await?;
        frontier = level.iter().map(|c| c.id).collect();
        all.extend(level);
    }
    Ok(all)
}

fn build(
    model: comment::Model,
    children: &mut HashMap<i32, Vec<comment::Model>>,
    authors: &HashMap<i32, String>,
) -> CommentDto {
    let replies = children
        .remove(&model.id)
        .unwrap_or_default()
        .into_iter()
        .map(|child| build(child, children, authors))
        .collect();
    CommentDto {
        id: model.id,
        author_username: authors.get(&model.author_id).cloned().unwrap_or_default(),
        content: model.content,
        author_id: model.author_id,
        post_id: model.post_id,
        parent_id: model.parent_id,
        created_at: to_rfc3339(model.created_at),
        updated_at: to_rfc3339(model.updated_at),
        replies,
    }
}

/// Attaches the full reply tree to each root, preserving root order.
async fn with_replies(db: &DatabaseConnection, roots: Vec<comment::Model>) -> Result<Vec<CommentDto>, AppError> {
    let below = descendants(db, roots.iter().map(|c| c.id).collect()).await?;
    let author_ids = roots.iter().chain(below.iter()).map(|c| c.author_id).collect();
    let authors = usernames(db, author_ids).await?;

    let mut children: HashMap<i32, Vec<comment::Model>> = HashMap::new();
    for reply in below {
        if let Some(parent_id) = reply.parent_id {
            children.entry(parent_id).or_default().push(reply);
        }
    }
    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    }
    Ok(roots
        .into_iter()
        .map(|root| build(root, &mut children, &authors))
        .collect())
}

async fn to_dto(db: &DatabaseConnection, model: comment::Model) -> Result<CommentDto, AppError> {
    with_replies(db, vec![model])
        .await?
        .pop()
        .ok_or_else(AppError::system_exception)
}

pub async fn create(db: &DatabaseConnection, author: &AuthUser, input: NewComment) -> Result<CommentDto, AppError> {
    check_content(&input.content)?;
    if visible_post(db, Some(author), input.post_id).await?.is_none() {
        return Err(AppError::param_error("post does not exist"));
    }
    if let Some(parent_id) = input.parent_id {
        let parent = comment::Entity::find_by_id(parent_id).one(db).await?;
        match parent {
            Some(parent) if parent.post_id == input.post_id => {}
            Some(_) => return Err(AppError::param_error("parent comment belongs to another post")),
            None => return Err(AppError::param_error("parent comment does not exist")),
        }
    }

    let now = Utc::now();
    let model = comment::ActiveModel {
        content: Set(input.content),
        author_id: Set(author.user_id),
        post_id: Set(input.post_id),
        parent_id: Set(input.parent_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        "comment created id={} post={} parent={:?}",
        model.id, model.post_id, model.parent_id
    );
    to_dto(db, model).await
}

/// Top-level comments of a post, oldest first, each with its reply tree.
pub async fn list_for_post(
    db: &DatabaseConnection,
    caller: Option<&AuthUser>,
    post_id: i32,
    page: Page,
) -> Result<PageDto<CommentDto>, AppError> {
    if visible_post(db, caller, post_id).await?.is_none() {
        return Err(AppError::not_found("post not found"));
    }
    let select = comment::Entity::find()
        .filter(comment::Column::PostId.eq(post_id))
        .filter(comment::Column::ParentId.is_null());
    let total = select.clone().count(db).await?;
    let roots = select
        .order_by_asc(comment::Column::CreatedAt)
        .order_by_asc(comment::Column::Id)
        .offset(page.offset)
        .limit(page.limit)
        .all(db)
        .await?;
    Ok(PageDto::new(page, total, with_replies(db, roots).await?))
}

pub async fn get(db: &DatabaseConnection, caller: Option<&AuthUser>, id: i32) -> Result<CommentDto, AppError> {
    let model = find(db, id).await?;
    if visible_post(db, caller, model.post_id).await?.is_none() {
        return Err(AppError::not_found("comment not found"));
    }
    to_dto(db, model).await
}

/// Only the content is editable; the thread position never changes.
pub async fn update(
    db: &DatabaseConnection,
    caller: &AuthUser,
    id: i32,
    content: Option<String>,
) -> Result<CommentDto, AppError> {
    let model = find(db, id).await?;
    assert_owner(&model, caller)?;

    let mut active: comment::ActiveModel = model.into();
    if let Some(content) = content {
        check_content(&content)?;
        active.content = Set(content);
    }
    active.updated_at = Set(Utc::now());
    let model = active.update(db).await?;

    debug!("comment updated id={}", model.id);
    to_dto(db, model).await
}

/// Deletes the given comments and everything replying to them.
pub(crate) async fn delete_subtrees<C: ConnectionTrait>(db: &C, roots: Vec<i32>) -> Result<u64, AppError> {
    if roots.is_empty() {
        return Ok(0);
    }
    let mut ids: Vec<i32> = descendants(db, roots.clone())
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();
    ids.extend(roots);
    let res = comment::Entity::delete_many()
        .filter(comment::Column::Id.is_in(ids))
        .exec(db)
        .await?;
    Ok(res.rows_affected)
}

pub async fn delete(db: &DatabaseConnection, caller: &AuthUser, id: i32) -> Result<(), AppError> {
    let model = find(db, id).await?;
    assert_owner(&model, caller)?;

    let removed = db
        .transaction::<_, u64, AppError>(move |txn| Box::pin(async move { delete_subtrees(txn, vec![id]).await }))
        .await?;

    info!("comment deleted id={} removed={}", id, removed);
    Ok(())
}
