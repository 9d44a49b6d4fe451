//! In-memory stand-ins for the target service
//!
//! [`FakeService`] implements [`Transport`] over a tiny CRUD store with the
//! same conventions as the real service: `POST /<collection>` creates,
//! `GET /<collection>` lists (query pairs filter), `PUT` updates and
//! `DELETE /<collection>?<keys>` removes every row matching the keys.

use crate::errors::TransportError;
use crate::transport::{RawResponse, StepRequest, Transport};
use crate::types::HttpMethod;
use parking_lot::Mutex;
use serde_json::{Map, Value as JsonValue};
use std::collections::{HashMap, HashSet};
use url::Url;

type Row = Map<String, JsonValue>;

/// What an injected fault does to a matching request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Answer with this status and leave the store untouched
    Status(u16),
    /// No response at all
    Timeout,
}

#[derive(Debug, Default)]
struct Store {
    collections: HashMap<String, Vec<Row>>,
    keyless: HashSet<String>,
    faults: HashMap<(HttpMethod, String), Fault>,
    log: Vec<StepRequest>,
    next_id: i64,
}

/// Fake CRUD service
#[derive(Debug)]
pub struct FakeService {
    store: Mutex<Store>,
}

impl Default for FakeService {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeService {
    pub fn new() -> Self {
        Self::with_first_id(1)
    }

    /// Identifiers are assigned sequentially starting at `first_id`
    pub fn with_first_id(first_id: i64) -> Self {
        Self {
            store: Mutex::new(Store {
                next_id: first_id,
                ..Store::default()
            }),
        }
    }

    /// Rows of `collection` get no `id` (relationship tables)
    pub fn keyless(self, collection: &str) -> Self {
        self.store.lock().keyless.insert(collection.to_string());
        self
    }

    /// Every `method` request to `collection` hits `fault`
    pub fn fail(self, method: HttpMethod, collection: &str, fault: Fault) -> Self {
        self.store
            .lock()
            .faults
            .insert((method, collection.to_string()), fault);
        self
    }

    /// Rows currently stored in `collection`
    pub fn rows(&self, collection: &str) -> Vec<Row> {
        self.store
            .lock()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Every request received, in arrival order
    pub fn requests(&self) -> Vec<StepRequest> {
        self.store.lock().log.clone()
    }

    /// Number of `method` requests received for `collection`
    pub fn count(&self, method: HttpMethod, collection: &str) -> usize {
        self.store
            .lock()
            .log
            .iter()
            .filter(|r| r.method == method && collection_of(&r.url).as_deref() == Some(collection))
            .count()
    }

    /// Collections of the `DELETE` requests received, in order
    pub fn deletes(&self) -> Vec<String> {
        self.store
            .lock()
            .log
            .iter()
            .filter(|r| r.method == HttpMethod::Delete)
            .filter_map(|r| collection_of(&r.url))
            .collect()
    }

    fn handle(&self, request: &StepRequest) -> Result<RawResponse, TransportError> {
        let url = Url::parse(&request.url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        let collection = url.path().trim_start_matches('/').to_string();
        let filters: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let mut store = self.store.lock();
        store.log.push(request.clone());

        match store.faults.get(&(request.method, collection.clone())) {
            Some(Fault::Timeout) => return Err(TransportError::Timeout),
            Some(Fault::Status(status)) => {
                return Ok(RawResponse::new(*status, format!("injected {}", status)))
            }
            None => {}
        }

        match request.method {
            HttpMethod::Post => {
                let Some(JsonValue::Object(mut row)) = request.body.clone() else {
                    return Ok(RawResponse::new(422, "expected a JSON object"));
                };
                if !store.keyless.contains(&collection) {
                    let id = store.next_id;
                    store.next_id += 1;
                    row.insert("id".to_string(), JsonValue::from(id));
                }
                store.collections.entry(collection).or_default().push(row);
                Ok(RawResponse::new(200, "Created"))
            }
            HttpMethod::Get => {
                let rows: Vec<JsonValue> = store
                    .collections
                    .get(&collection)
                    .map(|rows| {
                        rows.iter()
                            .filter(|row| matches(row, &filters))
                            .cloned()
                            .map(JsonValue::Object)
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(RawResponse::new(200, JsonValue::Array(rows).to_string()))
            }
            HttpMethod::Put => {
                let Some(JsonValue::Object(update)) = request.body.clone() else {
                    return Ok(RawResponse::new(422, "expected a JSON object"));
                };
                let rows = store.collections.entry(collection).or_default();
                let target = match update.get("id") {
                    Some(id) => rows.iter_mut().find(|row| row.get("id") == Some(id)),
                    None => rows.iter_mut().next(),
                };
                match target {
                    Some(row) => {
                        row.extend(update);
                        Ok(RawResponse::new(200, "Updated"))
                    }
                    None => Ok(RawResponse::new(404, "Not found")),
                }
            }
            HttpMethod::Delete => {
                let rows = store.collections.entry(collection).or_default();
                let before = rows.len();
                rows.retain(|row| filters.is_empty() || !matches(row, &filters));
                if rows.len() < before {
                    Ok(RawResponse::new(200, "Deleted"))
                } else {
                    Ok(RawResponse::new(404, "Not found"))
                }
            }
        }
    }
}

fn collection_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .map(|u| u.path().trim_start_matches('/').to_string())
}

fn matches(row: &Row, filters: &[(String, String)]) -> bool {
    filters.iter().all(|(key, expected)| match row.get(key) {
        Some(JsonValue::String(s)) => s == expected,
        Some(other) => other.to_string() == *expected,
        None => false,
    })
}

#[async_trait::async_trait]
impl Transport for FakeService {
    async fn send(&self, request: &StepRequest) -> Result<RawResponse, TransportError> {
        self.handle(request)
    }
}
