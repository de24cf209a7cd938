//! OData Web API record store.
//!
//! Thin HTTP wrapper over a Dataverse-style `/api/data/v9.x` endpoint.
//! URL, filter and response handling are pure functions for testability;
//! the trait impl only sends requests and maps statuses.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Url};
use serde_json::Value;
use tracing::debug;

use super::{Condition, RecordQuery, RecordStore, RecordStoreError};
use crate::record::{Data, Record, normalize_id};

pub const DEFAULT_WEBAPI_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_WEBAPI_CONNECT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebApiTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebApiConfig {
    /// Service root, e.g. `https://org.crm.dynamics.com/api/data/v9.2`.
    pub base_url: String,
    pub token: Option<String>,
    pub timeouts: WebApiTimeouts,
}

impl WebApiConfig {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `WEBAPI_BASE_URL`
    ///
    /// Optional:
    /// - `WEBAPI_TOKEN_ENV`: names the env var holding a bearer token
    /// - `WEBAPI_REQUEST_TIMEOUT_SECS`: default 30
    /// - `WEBAPI_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns `Config` when the base URL or the named token variable is missing.
    pub fn from_env() -> Result<Self, RecordStoreError> {
        let base_url = std::env::var("WEBAPI_BASE_URL")
            .map_err(|_| RecordStoreError::Config("WEBAPI_BASE_URL not set".into()))?
            .trim_end_matches('/')
            .to_string();

        let token = match std::env::var("WEBAPI_TOKEN_ENV") {
            Ok(var) => Some(
                std::env::var(&var).map_err(|_| RecordStoreError::Config(format!("token env var {var} not set")))?,
            ),
            Err(_) => None,
        };

        let timeouts = WebApiTimeouts {
            request_secs: crate::settings::env_parse("WEBAPI_REQUEST_TIMEOUT_SECS", DEFAULT_WEBAPI_REQUEST_TIMEOUT_SECS),
            connect_secs: crate::settings::env_parse("WEBAPI_CONNECT_TIMEOUT_SECS", DEFAULT_WEBAPI_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self { base_url, token, timeouts })
    }
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct WebApiRecordStore {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    /// Entity logical name → entity set (collection) name.
    collections: HashMap<String, String>,
}

impl WebApiRecordStore {
    /// # Errors
    ///
    /// Returns `Config` if the HTTP client cannot be built.
    pub fn new(config: WebApiConfig, collections: HashMap<String, String>) -> Result<Self, RecordStoreError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| RecordStoreError::Config(e.to_string()))?;
        Ok(Self { http, base_url: config.base_url, token: config.token, collections })
    }

    fn collection(&self, entity: &str) -> Result<&str, RecordStoreError> {
        self.collections
            .get(entity)
            .map(String::as_str)
            .ok_or_else(|| RecordStoreError::UnknownEntity(entity.to_string()))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self
            .http
            .request(method, url)
            .header("Accept", "application/json")
            .header("OData-MaxVersion", "4.0")
            .header("OData-Version", "4.0");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, RecordStoreError> {
        let response = builder
            .send()
            .await
            .map_err(|e| RecordStoreError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RecordStoreError::Rejected { status: status.as_u16(), body })
    }
}

#[async_trait::async_trait]
impl RecordStore for WebApiRecordStore {
    async fn fetch(&self, entity: &str, query: &RecordQuery) -> Result<Vec<Record>, RecordStoreError> {
        let url = fetch_url(&self.base_url, self.collection(entity)?, query)?;
        debug!(entity, %url, "web api fetch");
        let response = self.send(self.request(Method::GET, url)).await?;
        let text = response
            .text()
            .await
            .map_err(|e| RecordStoreError::Transport(e.to_string()))?;
        let records = parse_fetch_response(&text)?;
        // FetchXML cannot carry $filter, so conditions are applied here.
        if query.fetch_xml.is_some() {
            return Ok(records.into_iter().filter(|r| query.matches(r)).collect());
        }
        Ok(records)
    }

    async fn update(&self, entity: &str, id: &str, patch: &Data) -> Result<(), RecordStoreError> {
        let url = entity_url(&self.base_url, self.collection(entity)?, Some(id))?;
        debug!(entity, id, "web api update");
        let builder = self.request(Method::PATCH, url).header("If-Match", "*").json(patch);
        self.send(builder).await?;
        Ok(())
    }

    async fn create(&self, entity: &str, attributes: &Data) -> Result<String, RecordStoreError> {
        let url = entity_url(&self.base_url, self.collection(entity)?, None)?;
        debug!(entity, "web api create");
        let response = self.send(self.request(Method::POST, url).json(attributes)).await?;
        response
            .headers()
            .get("OData-EntityId")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_entity_id)
            .ok_or_else(|| RecordStoreError::Decode("missing OData-EntityId header".into()))
    }

    async fn delete(&self, entity: &str, id: &str) -> Result<(), RecordStoreError> {
        let url = entity_url(&self.base_url, self.collection(entity)?, Some(id))?;
        debug!(entity, id, "web api delete");
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }
}

// =============================================================================
// URLS AND FILTERS
// =============================================================================

/// `{base}/{collection}` or `{base}/{collection}({id})`.
pub(crate) fn entity_url(base: &str, collection: &str, id: Option<&str>) -> Result<Url, RecordStoreError> {
    let raw = match id {
        Some(id) => format!("{base}/{collection}({})", normalize_id(id)),
        None => format!("{base}/{collection}"),
    };
    Url::parse(&raw).map_err(|e| RecordStoreError::Config(format!("invalid url {raw}: {e}")))
}

pub(crate) fn fetch_url(base: &str, collection: &str, query: &RecordQuery) -> Result<Url, RecordStoreError> {
    let mut url = entity_url(base, collection, None)?;
    if query.fetch_xml.is_some() || !query.columns.is_empty() || !query.conditions.is_empty() {
        let mut pairs = url.query_pairs_mut();
        if let Some(fetch_xml) = &query.fetch_xml {
            pairs.append_pair("fetchXml", fetch_xml);
        } else {
            if !query.columns.is_empty() {
                pairs.append_pair("$select", &query.columns.join(","));
            }
            if let Some(filter) = build_filter(&query.conditions) {
                pairs.append_pair("$filter", &filter);
            }
        }
    }
    Ok(url)
}

/// OData `$filter` for a set of `attribute ∈ values` conditions.
pub(crate) fn build_filter(conditions: &[Condition]) -> Option<String> {
    if conditions.is_empty() {
        return None;
    }
    let clauses: Vec<String> = conditions
        .iter()
        .map(|c| {
            if c.values.is_empty() {
                return "false".to_string();
            }
            let terms: Vec<String> = c
                .values
                .iter()
                .map(|v| format!("{} eq {}", c.attribute, odata_literal(v)))
                .collect();
            format!("({})", terms.join(" or "))
        })
        .collect();
    Some(clauses.join(" and "))
}

/// Render a JSON value as an OData literal. GUID strings are unquoted.
pub(crate) fn odata_literal(value: &Value) -> String {
    match value {
        Value::String(s) => match uuid::Uuid::parse_str(&normalize_id(s)) {
            Ok(guid) => guid.to_string(),
            Err(_) => format!("'{}'", s.replace('\'', "''")),
        },
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Extract the id from an `OData-EntityId` header value.
pub(crate) fn parse_entity_id(header: &str) -> Option<String> {
    let open = header.rfind('(')?;
    let id = header[open + 1..].strip_suffix(')')?;
    Some(normalize_id(id))
}

pub(crate) fn parse_fetch_response(body: &str) -> Result<Vec<Record>, RecordStoreError> {
    let mut json: Value = serde_json::from_str(body).map_err(|e| RecordStoreError::Decode(e.to_string()))?;
    match json.get_mut("value").map(Value::take) {
        Some(Value::Array(rows)) => Ok(rows.into_iter().map(Record::from_value).collect()),
        _ => Err(RecordStoreError::Decode("response has no value array".into())),
    }
}

#[cfg(test)]
#[path = "webapi_test.rs"]
mod tests;
