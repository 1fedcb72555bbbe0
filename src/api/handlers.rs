//! In-memory `items` resource served through the pipeline

use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::RouteTable;
use crate::pipeline::{Handler, HandlerOutput, RequestContext};
use crate::response::{PaginationDirective, ResponseAccumulator};

const DEFAULT_PAGE_SIZE: u64 = 20;
const MAX_PAGE_SIZE: u64 = 100;

/// Stored item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request to create or replace an item
#[derive(Debug, Deserialize)]
pub struct ItemRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update
#[derive(Debug, Deserialize)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    page: Option<u64>,
    page_size: Option<u64>,
}

/// Item storage keyed by id
#[derive(Debug)]
pub struct ItemStore {
    items: RwLock<BTreeMap<u64, Item>>,
    next_id: AtomicU64,
}

impl Default for ItemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemStore {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn insert(&self, name: String, description: Option<String>) -> Item {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let item = Item {
            id,
            name,
            description,
            created_at: Utc::now(),
        };
        self.items.write().await.insert(id, item.clone());
        item
    }

    pub async fn get(&self, id: u64) -> Option<Item> {
        self.items.read().await.get(&id).cloned()
    }

    /// One page of items in id order, plus the total count
    pub async fn page(&self, offset: u64, limit: u64) -> (Vec<Item>, u64) {
        let items = self.items.read().await;
        let page = items
            .values()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        (page, items.len() as u64)
    }

    pub async fn update<F>(&self, id: u64, apply: F) -> Option<Item>
    where
        F: FnOnce(&mut Item),
    {
        let mut items = self.items.write().await;
        let item = items.get_mut(&id)?;
        apply(item);
        Some(item.clone())
    }

    pub async fn remove(&self, id: u64) -> Option<Item> {
        self.items.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

/// Register the items routes on `routes`
pub fn mount_items(routes: RouteTable, store: Arc<ItemStore>) -> RouteTable {
    routes
        .get("/items", ListItems(store.clone()))
        .post("/items", CreateItem(store.clone()))
        .get("/items/:id", GetItem(store.clone()))
        .put("/items/:id", UpdateItem::replace(store.clone()))
        .patch("/items/:id", UpdateItem::merge(store.clone()))
        .delete("/items/:id", DeleteItem(store))
}

/// Parse the `id` path parameter, finalizing a 404 when it is not a number
fn item_id(ctx: &RequestContext, response: &mut ResponseAccumulator) -> anyhow::Result<Option<u64>> {
    match ctx.path_param("id").and_then(|raw| raw.parse().ok()) {
        Some(id) => Ok(Some(id)),
        None => {
            response.finalize_error(StatusCode::NOT_FOUND, "Item not found")?;
            Ok(None)
        }
    }
}

/// Deserialize the body, finalizing a 400 when it does not fit `T`
fn item_body<T: serde::de::DeserializeOwned>(
    ctx: &RequestContext,
    response: &mut ResponseAccumulator,
) -> anyhow::Result<Option<T>> {
    match ctx.body_as::<T>() {
        Ok(body) => Ok(Some(body)),
        Err(e) => {
            response.finalize_error(StatusCode::BAD_REQUEST, e.to_string())?;
            Ok(None)
        }
    }
}

fn finished() -> HandlerOutput {
    HandlerOutput::new(serde_json::Value::Null)
}

/// `GET /items?page=&page_size=`
pub struct ListItems(pub Arc<ItemStore>);

#[async_trait]
impl Handler for ListItems {
    async fn handle(
        &self,
        ctx: &RequestContext,
        _response: &mut ResponseAccumulator,
    ) -> anyhow::Result<HandlerOutput> {
        let query: ListQuery = ctx.query().unwrap_or_default();
        let page_size = query
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let page = query.page.unwrap_or(1).max(1);
        let offset = (page - 1).saturating_mul(page_size);

        let (items, total) = self.0.page(offset, page_size).await;
        debug!(page, page_size, total, "Listing items");

        Ok(HandlerOutput::json(&items)?
            .with_pagination(PaginationDirective::new(page, page_size, total)))
    }
}

/// `GET /items/:id`
pub struct GetItem(pub Arc<ItemStore>);

#[async_trait]
impl Handler for GetItem {
    async fn handle(
        &self,
        ctx: &RequestContext,
        response: &mut ResponseAccumulator,
    ) -> anyhow::Result<HandlerOutput> {
        let Some(id) = item_id(ctx, response)? else {
            return Ok(finished());
        };

        match self.0.get(id).await {
            Some(item) => Ok(HandlerOutput::json(&item)?),
            None => {
                response.finalize_error(StatusCode::NOT_FOUND, "Item not found")?;
                Ok(finished())
            }
        }
    }
}

/// `POST /items`
pub struct CreateItem(pub Arc<ItemStore>);

#[async_trait]
impl Handler for CreateItem {
    async fn handle(
        &self,
        ctx: &RequestContext,
        response: &mut ResponseAccumulator,
    ) -> anyhow::Result<HandlerOutput> {
        let Some(req) = item_body::<ItemRequest>(ctx, response)? else {
            return Ok(finished());
        };

        let item = self.0.insert(req.name, req.description).await;
        debug!(id = item.id, "Created item");
        Ok(HandlerOutput::json(&item)?.with_status(StatusCode::CREATED))
    }
}

/// `PUT /items/:id` replaces, `PATCH /items/:id` merges
pub struct UpdateItem {
    store: Arc<ItemStore>,
    merge: bool,
}

impl UpdateItem {
    pub fn replace(store: Arc<ItemStore>) -> Self {
        Self { store, merge: false }
    }

    pub fn merge(store: Arc<ItemStore>) -> Self {
        Self { store, merge: true }
    }
}

#[async_trait]
impl Handler for UpdateItem {
    async fn handle(
        &self,
        ctx: &RequestContext,
        response: &mut ResponseAccumulator,
    ) -> anyhow::Result<HandlerOutput> {
        let Some(id) = item_id(ctx, response)? else {
            return Ok(finished());
        };

        let updated = if self.merge {
            let Some(patch) = item_body::<ItemPatch>(ctx, response)? else {
                return Ok(finished());
            };
            self.store
                .update(id, |item| {
                    if let Some(name) = patch.name {
                        item.name = name;
                    }
                    if patch.description.is_some() {
                        item.description = patch.description;
                    }
                })
                .await
        } else {
            let Some(req) = item_body::<ItemRequest>(ctx, response)? else {
                return Ok(finished());
            };
            self.store
                .update(id, |item| {
                    item.name = req.name;
                    item.description = req.description;
                })
                .await
        };

        match updated {
            Some(item) => Ok(HandlerOutput::json(&item)?),
            None => {
                response.finalize_error(StatusCode::NOT_FOUND, "Item not found")?;
                Ok(finished())
            }
        }
    }
}

/// `DELETE /items/:id`
pub struct DeleteItem(pub Arc<ItemStore>);

#[async_trait]
impl Handler for DeleteItem {
    async fn handle(
        &self,
        ctx: &RequestContext,
        response: &mut ResponseAccumulator,
    ) -> anyhow::Result<HandlerOutput> {
        let Some(id) = item_id(ctx, response)? else {
            return Ok(finished());
        };

        match self.0.remove(id).await {
            Some(_) => Ok(HandlerOutput::new(json!({ "deleted": id }))),
            None => {
                response.finalize_error(StatusCode::NOT_FOUND, "Item not found")?;
                Ok(finished())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderMap, Method};
    use bytes::Bytes;
    use std::collections::HashMap;

    fn ctx(method: Method, uri: &str, id: Option<&str>, body: &'static str) -> RequestContext {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        let mut params = HashMap::new();
        if let Some(id) = id {
            params.insert("id".to_string(), id.to_string());
        }
        RequestContext::new(method, uri.parse().unwrap(), headers, Bytes::from_static(body.as_bytes()))
            .with_path_params(params)
    }

    #[tokio::test]
    async fn test_store_pages_in_id_order() {
        let store = ItemStore::new();
        for i in 0..5 {
            store.insert(format!("item-{}", i), None).await;
        }

        let (page, total) = store.page(2, 2).await;
        assert_eq!(total, 5);
        assert_eq!(page.iter().map(|i| i.id).collect::<Vec<_>>(), vec![3, 4]);
    }

    #[tokio::test]
    async fn test_list_sets_pagination() {
        let store = Arc::new(ItemStore::new());
        for i in 0..7 {
            store.insert(format!("item-{}", i), None).await;
        }

        let mut response = ResponseAccumulator::new();
        let output = ListItems(store)
            .handle(&ctx(Method::GET, "/items?page=2&page_size=3", None, ""), &mut response)
            .await
            .unwrap();

        assert_eq!(output.pagination, Some(PaginationDirective::new(2, 3, 7)));
        assert_eq!(output.data.as_array().unwrap().len(), 3);
        assert_eq!(output.data[0]["id"], 4);
    }

    #[tokio::test]
    async fn test_create_returns_created() {
        let store = Arc::new(ItemStore::new());
        let mut response = ResponseAccumulator::new();
        let output = CreateItem(store.clone())
            .handle(&ctx(Method::POST, "/items", None, r#"{"name":"widget"}"#), &mut response)
            .await
            .unwrap();

        assert_eq!(output.status, StatusCode::CREATED);
        assert_eq!(output.data["name"], "widget");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_create_with_wrong_shape_is_bad_request() {
        let mut response = ResponseAccumulator::new();
        CreateItem(Arc::new(ItemStore::new()))
            .handle(&ctx(Method::POST, "/items", None, r#"{"title":"x"}"#), &mut response)
            .await
            .unwrap();

        assert!(response.is_finalized());
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_missing_item() {
        let mut response = ResponseAccumulator::new();
        GetItem(Arc::new(ItemStore::new()))
            .handle(&ctx(Method::GET, "/items/9", Some("9"), ""), &mut response)
            .await
            .unwrap();

        assert!(response.is_finalized());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_patch_keeps_unset_fields() {
        let store = Arc::new(ItemStore::new());
        let item = store.insert("widget".into(), Some("blue".into())).await;

        let mut response = ResponseAccumulator::new();
        let id = item.id.to_string();
        let output = UpdateItem::merge(store.clone())
            .handle(
                &ctx(Method::PATCH, "/items/1", Some(&id), r#"{"name":"gadget"}"#),
                &mut response,
            )
            .await
            .unwrap();

        assert_eq!(output.data["name"], "gadget");
        assert_eq!(output.data["description"], "blue");
    }

    #[tokio::test]
    async fn test_delete_removes_item() {
        let store = Arc::new(ItemStore::new());
        store.insert("widget".into(), None).await;

        let mut response = ResponseAccumulator::new();
        DeleteItem(store.clone())
            .handle(&ctx(Method::DELETE, "/items/1", Some("1"), ""), &mut response)
            .await
            .unwrap();

        assert!(store.is_empty().await);
        assert!(!response.is_finalized());
    }
}
