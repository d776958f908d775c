//! Remote worker collaborator.
//!
//! Implements [`MessageStore`] and [`Classifier`] over the worker's
//! internal HTTP API.
//!
//! ## Configuration
//!
//! - `WORKER_URL`: base URL of the worker (required)
//! - `WORKER_API_KEY`: bearer token
//! - `CF_ACCESS_CLIENT_ID` / `CF_ACCESS_CLIENT_SECRET`: access headers, sent
//!   only when both are set
//! - `WORKER_TIMEOUT_SECS`: request timeout (default: 30)

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::classify::{ClassificationItem, Classifier, LabelMap};
use crate::env::{env_or, env_string};
use crate::error::ClassificationError;
use crate::store::{CreateOutcome, MessageStore};
use crate::types::{AnalysisSummary, MessageRecord, TranscriptRecord};

const CLASSIFY_SYSTEM_PROMPT: &str = "Classify transcripts: Financial, Legal, Personal, Other.";
const DEFAULT_MODEL: &str = "@cf/meta/llama-3-8b-instruct";

/// Worker connection settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Base URL, without trailing slash.
    pub base_url: String,
    /// Bearer token.
    pub api_key: Option<String>,
    /// Access client id.
    pub access_client_id: Option<String>,
    /// Access client secret.
    pub access_client_secret: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl WorkerConfig {
    /// Config for a base URL with no credentials.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            access_client_id: None,
            access_client_secret: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Load from environment; `None` when `WORKER_URL` is unset.
    pub fn from_env() -> Option<Self> {
        let base_url = env_string("WORKER_URL")?;
        Some(Self {
            api_key: env_string("WORKER_API_KEY"),
            access_client_id: env_string("CF_ACCESS_CLIENT_ID"),
            access_client_secret: env_string("CF_ACCESS_CLIENT_SECRET"),
            timeout: Duration::from_secs(env_or("WORKER_TIMEOUT_SECS", 30)),
            ..Self::new(base_url)
        })
    }

    fn default_headers(&self) -> Result<HeaderMap, WorkerError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &self.api_key {
            headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", key))?);
        }
        if let (Some(id), Some(secret)) = (&self.access_client_id, &self.access_client_secret) {
            headers.insert(HeaderName::from_static("cf-access-client-id"), header_value(id)?);
            headers.insert(
                HeaderName::from_static("cf-access-client-secret"),
                header_value(secret)?,
            );
        }
        Ok(headers)
    }
}

fn header_value(value: &str) -> Result<HeaderValue, WorkerError> {
    HeaderValue::from_str(value).map_err(|_| WorkerError::InvalidHeader)
}

/// Worker request failures.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Transport or decoding failure.
    #[error("Worker request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status.
    #[error("Worker returned {status} for {path}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Request path.
        path: String,
    },

    /// A credential is not a valid header value.
    #[error("Invalid credential header value")]
    InvalidHeader,
}

/// HTTP client for the worker API.
#[derive(Debug, Clone)]
pub struct WorkerClient {
    client: reqwest::Client,
    base_url: String,
}

impl WorkerClient {
    /// Build a client from config.
    pub fn new(config: WorkerConfig) -> Result<Self, WorkerError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(config.default_headers()?)
            .build()?;
        if config.api_key.is_none() {
            tracing::warn!(base_url = %config.base_url, "Worker client has no API key");
        }
        Ok(Self {
            client,
            base_url: config.base_url,
        })
    }

    /// Build a client from environment variables.
    pub fn from_env() -> Option<Result<Self, WorkerError>> {
        WorkerConfig::from_env().map(Self::new)
    }

    /// Base URL requests go to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, WorkerError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;
        tracing::debug!(path, status = response.status().as_u16(), "Worker call");
        Ok(response)
    }

    fn check(response: reqwest::Response, path: &str) -> Result<reqwest::Response, WorkerError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
                tracing::error!(path, status = status.as_u16(), "Worker rejected credentials");
            }
            Err(WorkerError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            })
        }
    }

    async fn run_ai(&self, task: &str, inputs: Value) -> Result<Value, WorkerError> {
        let path = "/internal/ai/run";
        let payload = json!({
            "model": DEFAULT_MODEL,
            "inputs": {
                "task": task,
                "system": CLASSIFY_SYSTEM_PROMPT,
                "jsonSchema": {
                    "type": "object",
                    "additionalProperties": { "type": "array", "items": { "type": "string" } }
                },
                "context": inputs["context"],
                "transcripts": inputs["transcripts"],
            },
        });
        let response = Self::check(self.post(path, &payload).await?, path)?;
        let body: Value = response.json().await?;
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }
}

/// Interpret a classification result.
///
/// A string is parsed as JSON first; anything that is not an object of
/// string arrays yields an empty map.
pub fn parse_label_result(result: Value) -> LabelMap {
    let result = match result {
        Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(parsed) => parsed,
            Err(_) => return LabelMap::new(),
        },
        other => other,
    };
    let Value::Object(map) = result else {
        return LabelMap::new();
    };

    map.into_iter()
        .filter_map(|(id, labels)| {
            let labels: Vec<String> = labels
                .as_array()?
                .iter()
                .filter_map(|l| l.as_str().map(str::to_string))
                .collect();
            Some((id, labels))
        })
        .collect()
}

#[async_trait]
impl MessageStore for WorkerClient {
    type Error = WorkerError;

    async fn create_message(&self, record: &MessageRecord) -> Result<CreateOutcome, Self::Error> {
        let path = "/internal/db/message/create";
        let response = self.post(path, record).await?;
        if response.status() == StatusCode::CONFLICT {
            return Ok(CreateOutcome::AlreadyExists);
        }
        Self::check(response, path)?;
        Ok(CreateOutcome::Created)
    }

    async fn batch_create_transcripts(&self, transcripts: &[TranscriptRecord]) -> Result<(), Self::Error> {
        let path = "/internal/db/transcripts/batch";
        let response = self.post(path, &json!({ "transcripts": transcripts })).await?;
        Self::check(response, path)?;
        Ok(())
    }

    async fn store_analysis_summary(
        &self,
        message_id: &str,
        summary: &AnalysisSummary,
    ) -> Result<(), Self::Error> {
        let path = "/internal/db/message/update-analysis";
        let body = json!({ "messageId": message_id, "analysis": summary });
        let response = self.post(path, &body).await?;
        Self::check(response, path)?;
        Ok(())
    }
}

#[async_trait]
impl Classifier for WorkerClient {
    async fn classify(&self, items: &[ClassificationItem]) -> Result<LabelMap, ClassificationError> {
        let transcripts: BTreeMap<&str, &str> = items
            .iter()
            .map(|item| (item.id.as_str(), item.content.as_str()))
            .collect();
        let inputs = json!({ "context": "", "transcripts": transcripts });

        let result = self
            .run_ai("classify_transcripts", inputs)
            .await
            .map_err(|e| ClassificationError::Unavailable(e.to_string()))?;
        Ok(parse_label_result(result))
    }

    fn name(&self) -> &str {
        "worker"
    }
}
