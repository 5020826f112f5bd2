use std::collections::HashSet;

use chrono::Utc;
use log::debug;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Serialize;

use crate::entity::tag;
use crate::error::{is_unique_violation, AppError};
use crate::pagination::{Page, PageDto};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDto {
    pub id: i32,
    pub name: String,
}

impl From<tag::Model> for TagDto {
    fn from(model: tag::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }
}

/// Trims names, drops blanks and duplicates while keeping first-seen order.
pub fn normalize_names(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty() && seen.insert(n.clone()))
        .collect()
}

/// Looks tags up by exact name and inserts the missing ones.
pub(crate) async fn find_or_create<C: ConnectionTrait>(db: &C, names: &[String]) -> Result<Vec<tag::Model>, AppError> {
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let mut found = tag::Entity::find()
        .filter(tag::Column::Name.is_in(names.to_vec()))
        .all(db)
        .await?;

    let missing: Vec<&String> = names
        .iter()
        .filter(|n| !found.iter().any(|t| &t.name == *n))
        .collect();
    for name in missing {
        let now = Utc::now();
        let inserted = tag::ActiveModel {
            name: Set(name.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await;
        match inserted {
            Ok(model) => {
                debug!("tag created id={} name={}", model.id, model.name);
                found.push(model);
            }
            Err(e) if is_unique_violation(&e) => {
                let existing = tag::Entity::find()
                    .filter(tag::Column::Name.eq(name.as_str()))
                    .one(db)
                    .await?
                    .ok_or_else(AppError::system_exception)?;
                found.push(existing);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(found)
}

pub async fn search(db: &DatabaseConnection, pattern: Option<&str>, page: Page) -> Result<PageDto<TagDto>, AppError> {
    let mut select = tag::Entity::find();
    if let Some(pattern) = pattern.map(str::trim).filter(|p| !p.is_empty()) {
        select = select.filter(tag::Column::Name.contains(pattern));
    }
    let total = select.clone().count(db).await?;
    let items = select
        .order_by_asc(tag::Column::Name)
        .offset(page.offset)
        .limit(page.limit)
        .all(db)
        .await?
        .into_iter()
        .map(TagDto::from)
        .collect();
    Ok(PageDto::new(page, total, items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::database;

    #[test]
    fn normalize_drops_blanks_and_repeats() {
        let names = vec![
            " rust ".to_string(),
            "".to_string(),
            "web".to_string(),
            "rust".to_string(),
            "Rust".to_string(),
        ];
        assert_eq!(normalize_names(names), vec!["rust", "web", "Rust"]);
    }

    #[actix_web::test]
    async fn find_or_create_is_idempotent() {
        let db = database().await;
        let names = vec!["rust".to_string(), "sql".to_string()];
        let first = find_or_create(&db, &names).await.unwrap();
        let second = find_or_create(&db, &names).await.unwrap();

        let mut first_ids: Vec<i32> = first.iter().map(|t| t.id).collect();
        let mut second_ids: Vec<i32> = second.iter().map(|t| t.id).collect();
        first_ids.sort();
        second_ids.sort();
        assert_eq!(first_ids, second_ids);
        assert_eq!(tag::Entity::find().count(&db).await.unwrap(), 2);
    }

    #[actix_web::test]
    async fn search_is_ordered_by_name() {
        let db = database().await;
        let names = vec!["web".to_string(), "rust".to_string(), "rustacean".to_string()];
        find_or_create(&db, &names).await.unwrap();

        let all = search(&db, None, Page::default()).await.unwrap();
        let listed: Vec<&str> = all.items.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(listed, vec!["rust", "rustacean", "web"]);

        let matched = search(&db, Some("RUST"), Page::default()).await.unwrap();
        assert_eq!(matched.total_items, 2);
    }
}
