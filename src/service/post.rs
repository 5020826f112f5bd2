//! Post lifecycle: drafting, editing, publishing and tagging.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use log::{debug, info};
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::auth::{assert_owner, AuthUser};
use crate::entity::{comment, post, post_tag, tag, user};
use crate::error::AppError;
use crate::pagination::{Page, PageDto};
use crate::service::{tag as tag_service, to_rfc3339, usernames};

/// Builds `lowercase(title)` with spaces turned into hyphens, followed by an
/// 8 hex digit random suffix.
pub fn slugify(title: &str) -> String {
    let base = title.to_lowercase().replace(' ', "-");
    let suffix: u32 = rand::thread_rng().gen();
    format!("{}-{:08x}", base, suffix)
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_published_after(input: &str) -> Result<DateTime<Utc>, AppError> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| AppError::param_error("publishedAfter must be RFC 3339 or YYYY-MM-DD"))
}

#[derive(Debug, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub subtitle: String,
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostChanges {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Default)]
pub struct PostFilter {
    pub title: Option<String>,
    /// A post matches when it carries any of these tags.
    pub tags: Vec<String>,
    pub author: Option<String>,
    pub published_only: bool,
    pub published_after: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDto {
    pub id: i32,
    pub title: String,
    pub subtitle: String,
    pub slug: String,
    pub content: String,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
    pub published_at: Option<String>,
    pub author_id: i32,
    pub author_username: String,
    pub tags: Vec<String>,
}

async fn find<C: ConnectionTrait>(db: &C, id: i32) -> Result<post::Model, AppError> {
    post::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("post not found"))
}

/// Drafts are only visible to their author.
fn visible_to(model: &post::Model, caller: Option<&AuthUser>) -> bool {
    model.is_published || caller.map(|c| c.user_id) == Some(model.author_id)
}

/// Assembles DTOs for a page of posts with one query each for authors,
/// tag links and tags.
async fn to_dtos<C: ConnectionTrait>(db: &C, models: Vec<post::Model>) -> Result<Vec<PostDto>, AppError> {
    if models.is_empty() {
        return Ok(Vec::new());
    }
    let post_ids: Vec<i32> = models.iter().map(|m| m.id).collect();
    let authors = usernames(db, models.iter().map(|m| m.author_id).collect()).await?;

    let links = post_tag::Entity::find()
        .filter(post_tag::Column::PostId.is_in(post_ids))
        .all(db)
        .await?;
    let tag_ids: HashSet<i32> = links.iter().map(|l| l.tag_id).collect();
    let tag_names: HashMap<i32, String> = if tag_ids.is_empty() {
        HashMap::new()
    } else {
        tag::Entity::find()
            .filter(tag::Column::Id.is_in(tag_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect()
    };
    let mut tags_by_post: HashMap<i32, Vec<String>> = HashMap::new();
    for link in links {
        if let Some(name) = tag_names.get(&link.tag_id) {
            tags_by_post.entry(link.post_id).or_default().push(name.clone());
        }
    }

    Ok(models
        .into_iter()
        .map(|m| {
            let mut tags = tags_by_post.remove(&m.id).unwrap_or_default();
            tags.sort();
            PostDto {
                id: m.id,
                author_username: authors.get(&m.author_id).cloned().unwrap_or_default(),
                title: m.title,
                subtitle: m.subtitle,
                slug: m.slug,
                content: m.content,
                is_published: m.is_published,
                created_at: to_rfc3339(m.created_at),
                updated_at: to_rfc3339(m.updated_at),
                published_at: m.published_at.map(to_rfc3339),
                author_id: m.author_id,
                tags,
            }
        })
        .collect())
}

async fn to_dto<C: ConnectionTrait>(db: &C, model: post::Model) -> Result<PostDto, AppError> {
    to_dtos(db, vec![model])
        .await?
        .pop()
        .ok_or_else(AppError::system_exception)
}

pub async fn create(db: &DatabaseConnection, author: &AuthUser, input: NewPost) -> Result<PostDto, AppError> {
    let now = Utc::now();
    let model = post::ActiveModel {
        slug: Set(slugify(&input.title)),
        title: Set(input.title),
        subtitle: Set(input.subtitle),
        content: Set(input.content),
        is_published: Set(false),
        published_at: Set(None),
        author_id: Set(author.user_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| AppError::conflict_on_unique(e, "slug already exists"))?;

    info!("post created id={} slug={} author={}", model.id, model.slug, author.user_id);
    to_dto(db, model).await
}

pub async fn get(db: &DatabaseConnection, caller: Option<&AuthUser>, id: i32) -> Result<PostDto, AppError> {
    let model = find(db, id).await?;
    if !visible_to(&model, caller) {
        return Err(AppError::not_found("post not found"));
    }
    to_dto(db, model).await
}

pub async fn get_by_slug(
    db: &DatabaseConnection,
    caller: Option<&AuthUser>,
    slug: &str,
) -> Result<PostDto, AppError> {
    let model = post::Entity::find()
        .filter(post::Column::Slug.eq(slug))
        .one(db)
        .await?
        .filter(|m| visible_to(m, caller))
        .ok_or_else(|| AppError::not_found("post not found"))?;
    to_dto(db, model).await
}

pub async fn update(
    db: &DatabaseConnection,
    caller: &AuthUser,
    id: i32,
    changes: PostChanges,
) -> Result<PostDto, AppError> {
    let model = find(db, id).await?;
    assert_owner(&model, caller)?;

    let current_title = model.title.clone();
    let mut active: post::ActiveModel = model.into();
    if let Some(title) = changes.title {
        if title != current_title {
            active.slug = Set(slugify(&title));
        }
        active.title = Set(title);
    }
    if let Some(subtitle) = changes.subtitle {
        active.subtitle = Set(subtitle);
    }
    if let Some(content) = changes.content {
        active.content = Set(content);
    }
    active.updated_at = Set(Utc::now());

    let model = active
        .update(db)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, "slug already exists"))?;
    debug!("post updated id={} slug={}", model.id, model.slug);
    to_dto(db, model).await
}

/// Removes posts together with their tag links and every comment on them.
pub(crate) async fn delete_with_dependents<C: ConnectionTrait>(db: &C, post_ids: Vec<i32>) -> Result<(), AppError> {
    if post_ids.is_empty() {
        return Ok(());
    }
    post_tag::Entity::delete_many()
        .filter(post_tag::Column::PostId.is_in(post_ids.clone()))
        .exec(db)
        .await?;
    comment::Entity::delete_many()
        .filter(comment::Column::PostId.is_in(post_ids.clone()))
        .exec(db)
        .await?;
    post::Entity::delete_many()
        .filter(post::Column::Id.is_in(post_ids))
        .exec(db)
        .await?;
    Ok(())
}

pub async fn delete(db: &DatabaseConnection, caller: &AuthUser, id: i32) -> Result<(), AppError> {
    let model = find(db, id).await?;
    assert_owner(&model, caller)?;

    db.transaction::<_, (), AppError>(move |txn| {
        Box::pin(async move { delete_with_dependents(txn, vec![id]).await })
    })
    .await?;

    info!("post deleted id={}", id);
    Ok(())
}

/// Publishing an already published post returns it unchanged.
pub async fn publish(db: &DatabaseConnection, caller: &AuthUser, id: i32) -> Result<PostDto, AppError> {
    let model = find(db, id).await?;
    assert_owner(&model, caller)?;
    if model.is_published {
        return to_dto(db, model).await;
    }

    let now = Utc::now();
    let mut active: post::ActiveModel = model.into();
    active.is_published = Set(true);
    active.published_at = Set(Some(now));
    active.updated_at = Set(now);
    let model = active.update(db).await?;

    info!("post published id={}", model.id);
    to_dto(db, model).await
}

/// Unpublishing a draft returns it unchanged.
pub async fn unpublish(db: &DatabaseConnection, caller: &AuthUser, id: i32) -> Result<PostDto, AppError> {
    let model = find(db, id).await?;
    assert_owner(&model, caller)?;
    if !model.is_published {
        return to_dto(db, model).await;
    }

    let mut active: post::ActiveModel = model.into();
    active.is_published = Set(false);
    active.published_at = Set(None);
    active.updated_at = Set(Utc::now());
    let model = active.update(db).await?;

    info!("post unpublished id={}", model.id);
    to_dto(db, model).await
}

/// Attaches tags by name, creating missing ones. Already attached tags are skipped.
pub async fn add_tags(
    db: &DatabaseConnection,
    caller: &AuthUser,
    id: i32,
    names: Vec<String>,
) -> Result<PostDto, AppError> {
    let model = find(db, id).await?;
    assert_owner(&model, caller)?;

    let names = tag_service::normalize_names(names);
    db.transaction::<_, (), AppError>(move |txn| {
        Box::pin(async move {
            let tags = tag_service::find_or_create(txn, &names).await?;
            let linked: HashSet<i32> = post_tag::Entity::find()
                .filter(post_tag::Column::PostId.eq(id))
                .all(txn)
                .await?
                .into_iter()
                .map(|l| l.tag_id)
                .collect();
            let rows: Vec<post_tag::ActiveModel> = tags
                .iter()
                .filter(|t| !linked.contains(&t.id))
                .map(|t| post_tag::ActiveModel {
                    post_id: Set(id),
                    tag_id: Set(t.id),
                })
                .collect();
            if !rows.is_empty() {
                debug!("linking {} tag(s) to post id={}", rows.len(), id);
                post_tag::Entity::insert_many(rows).exec_without_returning(txn).await?;
            }
            Ok(())
        })
    })
    .await?;

    let model = find(db, id).await?;
    to_dto(db, model).await
}

/// Lists posts newest-published first.
///
/// Anonymous callers only ever see published posts. With `published_only`
/// unset, an authenticated caller additionally sees their own drafts.
pub async fn list(
    db: &DatabaseConnection,
    caller: Option<&AuthUser>,
    filter: PostFilter,
    page: Page,
) -> Result<PageDto<PostDto>, AppError> {
    let mut select = post::Entity::find();

    select = match caller {
        Some(caller) if !filter.published_only => select.filter(
            Condition::any()
                .add(post::Column::IsPublished.eq(true))
                .add(post::Column::AuthorId.eq(caller.user_id)),
        ),
        _ => select.filter(post::Column::IsPublished.eq(true)),
    };

    if let Some(title) = filter.title.as_deref().filter(|t| !t.is_empty()) {
        select = select.filter(post::Column::Title.contains(title));
    }
    if let Some(after) = filter.published_after {
        select = select.filter(post::Column::PublishedAt.gte(after));
    }
    if let Some(author) = filter.author.as_deref().filter(|a| !a.is_empty()) {
        let author_ids: Vec<i32> = user::Entity::find()
            .select_only()
            .column(user::Column::Id)
            .filter(user::Column::Username.contains(author))
            .into_tuple()
            .all(db)
            .await?;
        select = select.filter(post::Column::AuthorId.is_in(author_ids));
    }
    if !filter.tags.is_empty() {
        let tag_ids: Vec<i32> = tag::Entity::find()
            .select_only()
            .column(tag::Column::Id)
            .filter(tag::Column::Name.is_in(filter.tags))
            .into_tuple()
            .all(db)
            .await?;
        let tagged: Vec<i32> = post_tag::Entity::find()
            .select_only()
            .column(post_tag::Column::PostId)
            .filter(post_tag::Column::TagId.is_in(tag_ids))
            .distinct()
            .into_tuple()
            .all(db)
            .await?;
        select = select.filter(post::Column::Id.is_in(tagged));
    }

    let total = select.clone().count(db).await?;
    let models = select
        .order_by_desc(post::Column::PublishedAt)
        .order_by_desc(post::Column::Id)
        .offset(page.offset)
        .limit(page.limit)
        .all(db)
        .await?;
    Ok(PageDto::new(page, total, to_dtos(db, models).await?))
}
