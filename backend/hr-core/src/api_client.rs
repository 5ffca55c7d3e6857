// src/api_client.rs

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{HrError, Result};
use crate::models::RecordId;

pub const PROJECT_ID_HEADER: &str = "X-Project-Id";
pub const PUBLIC_KEY_HEADER: &str = "X-Public-Key";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub project_id: String,
    pub public_key: String,
    pub timeout_secs: u64,
}

// --- Wire Types ---

#[derive(Debug, Clone, Serialize)]
pub struct FieldSelector {
    pub field: FieldName,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldName {
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchParams {
    pub fields: Vec<FieldSelector>,
}

impl FetchParams {
    pub fn for_fields<'a>(fields: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|name| FieldSelector {
                    field: FieldName {
                        name: name.to_string(),
                    },
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WriteResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub results: Vec<WriteResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WriteResult {
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    message: Option<String>,
}

// --- Client ---

/// Client for the hosted records API. One table per entity type; every call is a POST
/// carrying the project credentials as headers.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http_client: Client,
    base_url: Url,
    project_id: String,
    public_key: String,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        if config.project_id.trim().is_empty() || config.public_key.trim().is_empty() {
            return Err(HrError::Config(
                "remote backend requires a project id and public key".to_string(),
            ));
        }
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))?;
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        info!("Records API client configured for {}", base_url);
        Ok(Self {
            http_client,
            base_url,
            project_id: config.project_id,
            public_key: config.public_key,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint(&self, table: &str, action: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{}/{}/{}", base, table, action))?)
    }

    pub fn build_request<B: Serialize + ?Sized>(
        &self,
        table: &str,
        action: &str,
        body: &B,
    ) -> Result<RequestBuilder> {
        let url = self.endpoint(table, action)?;
        Ok(self
            .http_client
            .request(Method::POST, url)
            .header(PROJECT_ID_HEADER, &self.project_id)
            .header(PUBLIC_KEY_HEADER, &self.public_key)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(body))
    }

    pub async fn send_and_deserialize<T: DeserializeOwned>(
        &self,
        request_builder: RequestBuilder,
        context_msg: &str,
    ) -> Result<T> {
        let request = request_builder.build().map_err(|e| {
            error!("Request build failed for '{}': {}", context_msg, e);
            HrError::Request(e)
        })?;
        let request_url = request.url().to_string();
        debug!("Sending request for '{}' to URL: {}", context_msg, request_url);

        let response = self.http_client.execute(request).await.map_err(|e| {
            error!(
                "HTTP execution failed for '{}' (URL: {}): {}",
                context_msg, request_url, e
            );
            HrError::Request(e)
        })?;

        let status = response.status();
        info!(
            "Received response for '{}' (URL: {}): Status={}",
            context_msg, request_url, status
        );
        let body = response.text().await.map_err(|e| {
            error!("Failed to read response body for '{}': {}", context_msg, e);
            HrError::Request(e)
        })?;

        if !status.is_success() {
            error!(
                "API Error Response: Status={}, Body='{}' for URL: {}",
                status, body, request_url
            );
            return Err(remote_failure(status, body));
        }

        debug!("Raw response body for '{}': {}", context_msg, body);
        serde_json::from_str::<T>(&body).map_err(|e| {
            error!(
                "JSON deserialization failed for '{}' (URL: {}): {}",
                context_msg, request_url, e
            );
            HrError::Json(e)
        })
    }

    /// Lists every record of a table. Failures are logged and yield an empty list.
    pub async fn fetch_records(&self, table: &str, fields: &[&str]) -> Vec<Value> {
        match self.try_fetch_records(table, fields).await {
            Ok(records) => records,
            Err(e) => {
                error!("'fetch {}' failed: {}", table, e);
                Vec::new()
            }
        }
    }

    /// Lists every record of a table, propagating transport errors and `success:false`.
    pub async fn try_fetch_records(&self, table: &str, fields: &[&str]) -> Result<Vec<Value>> {
        let context = format!("fetch {}", table);
        let params = FetchParams::for_fields(fields.iter().copied());
        let request = self.build_request(table, "fetch", &params)?;
        let response: ReadResponse = self.send_and_deserialize(request, &context).await?;
        if !response.success {
            return Err(HrError::RemoteFailure {
                status: None,
                message: response
                    .message
                    .unwrap_or_else(|| format!("'{}' reported failure", context)),
            });
        }
        match response.data {
            Value::Array(records) => Ok(records),
            Value::Null => Ok(Vec::new()),
            other => {
                warn!("Unexpected data shape for '{}': {}", context, other);
                Ok(Vec::new())
            }
        }
    }

    /// `Ok(None)` when the API reports the record as unavailable.
    pub async fn get_record_by_id(
        &self,
        table: &str,
        id: RecordId,
        fields: &[&str],
    ) -> Result<Option<Value>> {
        let context = format!("get {} {}", table, id);
        let request = self.build_request(
            table,
            &format!("get/{}", id),
            &FetchParams::for_fields(fields.iter().copied()),
        )?;
        let response: ReadResponse = self.send_and_deserialize(request, &context).await?;
        if !response.success {
            warn!(
                "'{}' reported failure: {}",
                context,
                response.message.unwrap_or_default()
            );
            return Ok(None);
        }
        Ok(match response.data {
            Value::Null => None,
            data => Some(data),
        })
    }

    pub async fn create_records(&self, table: &str, records: Vec<Value>) -> Result<WriteResponse> {
        self.write(table, "create", &json!({ "records": records }))
            .await
    }

    pub async fn update_records(&self, table: &str, records: Vec<Value>) -> Result<WriteResponse> {
        self.write(table, "update", &json!({ "records": records }))
            .await
    }

    pub async fn delete_records(&self, table: &str, ids: &[RecordId]) -> Result<WriteResponse> {
        self.write(table, "delete", &json!({ "RecordIds": ids })).await
    }

    async fn write(&self, table: &str, action: &str, body: &Value) -> Result<WriteResponse> {
        let context = format!("{} {}", action, table);
        let request = self.build_request(table, action, body)?;
        let response: WriteResponse = self.send_and_deserialize(request, &context).await?;
        if !response.success {
            let message = response
                .message
                .unwrap_or_else(|| format!("{} rejected", context));
            error!("'{}' reported failure: {}", context, message);
            return Err(HrError::RemoteFailure {
                status: None,
                message,
            });
        }
        Ok(response)
    }
}

fn remote_failure(status: StatusCode, body: String) -> HrError {
    let message = match serde_json::from_str::<ErrorPayload>(&body) {
        Ok(ErrorPayload {
            message: Some(message),
        }) => message,
        _ => body,
    };
    HrError::RemoteFailure {
        status: Some(status.as_u16()),
        message,
    }
}
