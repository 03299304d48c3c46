use crate::config::Config;
use crate::errors::AppError;
use crate::models::{AccountMetadata, FieldDefinition, RecordDraft, RecordKind};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

/// Capability set this crate requires from a remote CRM.
///
/// The submission workflow is written against this trait, so tests can run it
/// over a mocked transport and the concrete AmoCRM client stays swappable.
/// Record payloads cross the boundary raw; conversion into typed models
/// happens on the caller's side.
#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Full-text search over records of `kind`; at most `limit` raw records.
    async fn search_records(
        &self,
        kind: RecordKind,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Value>, AppError>;

    /// Exact-id lookup of a single record.
    async fn get_record_by_id(
        &self,
        kind: RecordKind,
        id: u64,
    ) -> Result<Option<Value>, AppError>;

    /// Creates a record from the draft and returns its remote-assigned id.
    async fn create_record(&self, kind: RecordKind, draft: &RecordDraft) -> Result<u64, AppError>;

    /// Applies the draft to an existing record.
    async fn update_record(
        &self,
        kind: RecordKind,
        id: u64,
        draft: &RecordDraft,
    ) -> Result<(), AppError>;

    /// Creates a directed association between two records.
    async fn link_records(
        &self,
        from: RecordKind,
        from_id: u64,
        to: RecordKind,
        to_id: u64,
    ) -> Result<(), AppError>;

    /// Fetches the account's contact custom-field catalog.
    async fn get_account_metadata(&self) -> Result<AccountMetadata, AppError>;
}

/// Client for interacting directly with the AmoCRM API.
#[derive(Clone)]
pub struct AmoHttpClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl AmoHttpClient {
    /// Creates a new `AmoHttpClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the AmoCRM account (no trailing slash).
    /// * `token` - The API token for authentication.
    pub fn new(base_url: String, token: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create AmoCRM client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Creates a client from the loaded environment configuration.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(config.base_url.clone(), config.token.clone())
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!("{}/private/api/v2/json/{}", self.base_url, suffix)
    }

    /// Runs a list query and returns the raw record array.
    ///
    /// AmoCRM answers `204 No Content` when a query matches nothing; that is
    /// an empty result, not an error.
    async fn list(
        &self,
        kind: RecordKind,
        params: &[(&str, &str)],
    ) -> Result<Vec<Value>, AppError> {
        let url = Url::parse_with_params(&self.endpoint(&format!("{}/list", kind)), params)
            .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))?;

        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("AmoCRM request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "AmoCRM returned {}: {}",
                status, error_text
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse AmoCRM response: {}", e))
        })?;

        let records = body
            .get("response")
            .and_then(|r| r.get(kind.as_str()))
            .and_then(|r| r.as_array())
            .cloned()
            .unwrap_or_default();
        Ok(records)
    }

    /// POSTs a `{"request": {...}}` envelope and returns the parsed body.
    async fn post_request(&self, suffix: &str, request: Value) -> Result<Value, AppError> {
        let url = self.endpoint(suffix);
        let body = json!({ "request": request });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("AmoCRM request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "AmoCRM returned {}: {}",
                status, error_text
            )));
        }

        let data = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse AmoCRM response: {}", e))
        })?;

        Ok(data)
    }
}

#[async_trait]
impl CrmClient for AmoHttpClient {
    async fn search_records(
        &self,
        kind: RecordKind,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Value>, AppError> {
        tracing::info!("Searching {} in AmoCRM: query=\"{}\"", kind, query);
        self.list(kind, &[("query", query), ("limit_rows", &limit.to_string())])
            .await
    }

    async fn get_record_by_id(
        &self,
        kind: RecordKind,
        id: u64,
    ) -> Result<Option<Value>, AppError> {
        tracing::debug!("Fetching {} record {} from AmoCRM", kind, id);
        let records = self
            .list(kind, &[("id", &id.to_string()), ("limit_rows", "1")])
            .await?;
        Ok(records.into_iter().next())
    }

    async fn create_record(&self, kind: RecordKind, draft: &RecordDraft) -> Result<u64, AppError> {
        tracing::info!("Creating new {} record in AmoCRM", kind);

        let mut request = serde_json::Map::new();
        request.insert(kind.as_str().to_string(), json!({ "add": [draft] }));
        let response_data = self
            .post_request(&format!("{}/set", kind), Value::Object(request))
            .await?;

        // Added records echo back under response.<kind>.add; the id may come
        // as a number or a string depending on the account.
        let added = response_data
            .get("response")
            .and_then(|r| r.get(kind.as_str()))
            .and_then(|k| k.get("add"))
            .and_then(|a| a.as_array())
            .and_then(|a| a.first());

        let record_id = added
            .and_then(|record| record.get("id"))
            .and_then(|id| id.as_u64())
            .or_else(|| {
                added
                    .and_then(|record| record.get("id"))
                    .and_then(|id| id.as_str())
                    .and_then(|id| id.parse().ok())
            });

        match record_id {
            Some(id) => {
                tracing::info!("Created {} record {}", kind, id);
                Ok(id)
            }
            None => {
                tracing::warn!("Unexpected AmoCRM response format: {:?}", response_data);
                Err(AppError::ExternalApiError(
                    "Record creation response missing 'id' field".to_string(),
                ))
            }
        }
    }

    async fn update_record(
        &self,
        kind: RecordKind,
        id: u64,
        draft: &RecordDraft,
    ) -> Result<(), AppError> {
        tracing::info!("Updating {} record {} in AmoCRM", kind, id);

        let mut record = match serde_json::to_value(draft) {
            Ok(Value::Object(map)) => map,
            _ => {
                return Err(AppError::InternalError(
                    "Failed to serialize update payload".to_string(),
                ))
            }
        };
        record.insert("id".to_string(), json!(id));
        // AmoCRM refuses updates without a fresh last_modified timestamp.
        record.insert("last_modified".to_string(), json!(Utc::now().timestamp()));

        let mut request = serde_json::Map::new();
        request.insert(kind.as_str().to_string(), json!({ "update": [record] }));
        self.post_request(&format!("{}/set", kind), Value::Object(request))
            .await?;

        Ok(())
    }

    async fn link_records(
        &self,
        from: RecordKind,
        from_id: u64,
        to: RecordKind,
        to_id: u64,
    ) -> Result<(), AppError> {
        tracing::info!(
            "Linking {} {} to {} {} in AmoCRM",
            from,
            from_id,
            to,
            to_id
        );

        let request = json!({
            "links": {
                "link": [{
                    "from": from.as_str(),
                    "from_id": from_id,
                    "to": to.as_str(),
                    "to_id": to_id,
                }]
            }
        });
        self.post_request("links/set", request).await?;

        Ok(())
    }

    async fn get_account_metadata(&self) -> Result<AccountMetadata, AppError> {
        tracing::info!("Fetching account metadata from AmoCRM");

        let url = self.endpoint("accounts/current");
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("AmoCRM request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "AmoCRM returned {}: {}",
                status, error_text
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse AmoCRM response: {}", e))
        })?;

        let raw_fields = body
            .get("response")
            .and_then(|r| r.get("account"))
            .and_then(|a| a.get("custom_fields"))
            .and_then(|f| f.get("contacts"))
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));

        let contact_fields: Vec<FieldDefinition> =
            serde_json::from_value(raw_fields).map_err(|e| {
                AppError::ExternalApiError(format!("Failed to parse field catalog: {}", e))
            })?;

        Ok(AccountMetadata { contact_fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_creation() {
        let client = AmoHttpClient::new(
            "https://example.amocrm.ru".to_string(),
            "token".to_string(),
        );
        assert!(client.is_ok());
    }
}
