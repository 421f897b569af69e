//! Firestore backend over the REST API.
//!
//! Each collection maps to one Firestore collection whose document ids are
//! the item ids. Writes delete every document of the collection and insert
//! the new set in batched commits. Reads are cached per collection until the
//! next write of that collection.

use super::{decode_collection, encode_collection, filter_ids, Storage, StorageError};
use super::{StorageResult, StorageStatus};
use crate::item::Item;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com";
const TOKEN_ENV: &str = "TASKLINE_FIRESTORE_TOKEN";
/// Firestore rejects commits with more writes than this
const MAX_BATCH_WRITES: usize = 500;
const PAGE_SIZE: &str = "300";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn default_database() -> String {
    "(default)".to_string()
}

fn default_storage_collection() -> String {
    "storage".to_string()
}

fn default_archive_collection() -> String {
    "archive".to_string()
}

/// Backend specific settings of a `firestore` storage module
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirestoreConfig {
    pub project_id: String,
    #[serde(default = "default_database")]
    pub database: String,
    /// OAuth bearer token, e.g. from `gcloud auth print-access-token`
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_storage_collection")]
    pub storage_collection: String,
    #[serde(default = "default_archive_collection")]
    pub archive_collection: String,
    /// Override for the emulator, e.g. `http://localhost:8080`
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

/// Encode a JSON value as a Firestore typed value
pub fn to_firestore_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else if let Some(u) = n.as_u64() {
                json!({ "integerValue": u.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64().unwrap_or_default() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(values) => {
            let values: Vec<Value> = values.iter().map(to_firestore_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": to_firestore_fields(map) } }),
    }
}

pub fn to_firestore_fields(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| (key.clone(), to_firestore_value(value)))
        .collect()
}

/// Decode a Firestore typed value; unknown types decode as null
pub fn from_firestore_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|map| map.iter().next()) else {
        return Value::Null;
    };

    match kind.as_str() {
        "integerValue" => match inner {
            Value::String(s) => s
                .parse::<i64>()
                .map(Value::from)
                .or_else(|_| s.parse::<u64>().map(Value::from))
                .unwrap_or(Value::Null),
            Value::Number(_) => inner.clone(),
            _ => Value::Null,
        },
        "booleanValue" | "doubleValue" | "stringValue" | "timestampValue" => inner.clone(),
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(from_firestore_value).collect())
                .unwrap_or_default();
            Value::Array(values)
        }
        "mapValue" => {
            let fields = inner
                .get("fields")
                .and_then(Value::as_object)
                .map(from_firestore_fields)
                .unwrap_or_default();
            Value::Object(fields)
        }
        _ => Value::Null,
    }
}

pub fn from_firestore_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), from_firestore_value(value)))
        .collect()
}

/// The last path segment of a document resource name
fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Storage kept in two Firestore collections
pub struct FirestoreStorage {
    config: FirestoreConfig,
    client: Client,
    token: Option<String>,
    cache: RefCell<HashMap<String, Vec<Item>>>,
}

impl FirestoreStorage {
    pub fn new(name: &str, config: FirestoreConfig) -> StorageResult<Self> {
        let invalid = |reason: &str| StorageError::InvalidConfig {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if config.project_id.trim().is_empty() {
            return Err(invalid("projectId is empty"));
        }
        if config.storage_collection == config.archive_collection {
            return Err(invalid("storageCollection and archiveCollection must differ"));
        }

        let token = std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| config.access_token.clone());
        if token.is_none() && config.api_key.is_none() && config.base_url.is_none() {
            return Err(invalid(&format!(
                "no credentials: set accessToken or apiKey, or export {}",
                TOKEN_ENV
            )));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StorageError::Remote(e.to_string()))?;

        Ok(FirestoreStorage {
            config,
            client,
            token,
            cache: RefCell::new(HashMap::new()),
        })
    }

    /// `projects/{p}/databases/{d}/documents`
    fn documents_path(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.config.project_id, self.config.database
        )
    }

    fn url(&self, suffix: &str) -> String {
        let base = self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        format!("{}/v1/{}{}", base.trim_end_matches('/'), self.documents_path(), suffix)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        match &self.config.api_key {
            Some(key) => request.query(&[("key", key)]),
            None => request,
        }
    }

    fn send(&self, request: RequestBuilder) -> StorageResult<Value> {
        let response = self
            .authorize(request)
            .send()
            .map_err(|e| StorageError::Remote(format!("cannot reach Firestore: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| StorageError::Remote(e.to_string()))?;
        if !status.is_success() {
            return Err(StorageError::Remote(format!("Firestore returned {}: {}", status, body.trim())));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn list_documents(&self, collection: &str, page_size: &str) -> StorageResult<Vec<Document>> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(self.url(&format!("/{}", collection)))
                .query(&[("pageSize", page_size)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let body = self.send(request)?;
            let page: ListResponse = if body.is_null() {
                ListResponse::default()
            } else {
                serde_json::from_value(body)?
            };
            documents.extend(page.documents);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Listed {} document(s) from {}", documents.len(), collection);
        Ok(documents)
    }

    fn fetch(&self, collection: &str) -> StorageResult<Vec<Item>> {
        if let Some(items) = self.cache.borrow().get(collection) {
            return Ok(items.clone());
        }

        let records: Map<String, Value> = self
            .list_documents(collection, PAGE_SIZE)?
            .into_iter()
            .map(|doc| {
                let id = document_id(&doc.name).to_string();
                (id, Value::Object(from_firestore_fields(&doc.fields)))
            })
            .collect();
        let (items, _) = decode_collection(records)?;

        self.cache
            .borrow_mut()
            .insert(collection.to_string(), items.clone());
        Ok(items)
    }

    fn commit(&self, writes: Vec<Value>) -> StorageResult<()> {
        for batch in writes.chunks(MAX_BATCH_WRITES) {
            let request = self
                .client
                .post(self.url(":commit"))
                .json(&json!({ "writes": batch }));
            self.send(request)?;
        }
        Ok(())
    }

    fn replace(&self, collection: &str, data: &[Item]) -> StorageResult<()> {
        self.cache.borrow_mut().remove(collection);

        let deletes: Vec<Value> = self
            .list_documents(collection, PAGE_SIZE)?
            .into_iter()
            .map(|doc| json!({ "delete": doc.name }))
            .collect();
        self.commit(deletes)?;

        let prefix = format!("{}/{}", self.documents_path(), collection);
        let inserts: Vec<Value> = encode_collection(data)?
            .into_iter()
            .map(|(id, record)| {
                let fields = match &record {
                    Value::Object(map) => to_firestore_fields(map),
                    _ => Map::new(),
                };
                json!({ "update": { "name": format!("{}/{}", prefix, id), "fields": fields } })
            })
            .collect();
        self.commit(inserts)?;

        debug!("Replaced {} with {} item(s)", collection, data.len());
        Ok(())
    }
}

impl Storage for FirestoreStorage {
    fn get(&self, ids: Option<&[u64]>) -> StorageResult<Vec<Item>> {
        let items = self.fetch(&self.config.storage_collection)?;
        Ok(filter_ids(items, ids))
    }

    fn get_archive(&self, ids: Option<&[u64]>) -> StorageResult<Vec<Item>> {
        let items = self.fetch(&self.config.archive_collection)?;
        Ok(filter_ids(items, ids))
    }

    fn set(&mut self, data: &[Item]) -> StorageResult<()> {
        let collection = self.config.storage_collection.clone();
        self.replace(&collection, data)
    }

    fn set_archive(&mut self, data: &[Item]) -> StorageResult<()> {
        let collection = self.config.archive_collection.clone();
        self.replace(&collection, data)
    }

    fn status(&self) -> StorageStatus {
        match self.list_documents(&self.config.storage_collection, "1") {
            Ok(_) => StorageStatus::Online,
            Err(e) => StorageStatus::Offline(e.to_string()),
        }
    }
}
