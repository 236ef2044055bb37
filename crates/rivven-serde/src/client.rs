//! Remote schema registry client (Confluent-compatible REST API)
//!
//! The serializer only needs four remote operations: subject/version lookup,
//! latest-version lookup, schema-by-id lookup and a compatibility check.
//! [`RegistryClient`] is the seam; [`HttpRegistryClient`] talks to any
//! registry implementing the Confluent API (Confluent, Apicurio,
//! rivven-schema).

use crate::config::RegistryConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::types::{SchemaId, SchemaVersion, Subject, SubjectSchema};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Content types accepted from the registry
pub const ACCEPT: &str =
    "application/vnd.schemaregistry.v1+json, application/vnd.schemaregistry+json, application/json";

const CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";

/// Remote registry operations the serializer depends on
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Resolve a subject at a specific version (or `latest`)
    async fn get_schema_by_subject(
        &self,
        subject: &Subject,
        version: SchemaVersion,
    ) -> RegistryResult<SubjectSchema>;

    /// Resolve the most recent version of a subject
    async fn get_latest_schema(&self, subject: &Subject) -> RegistryResult<SubjectSchema> {
        self.get_schema_by_subject(subject, SchemaVersion::Latest)
            .await
    }

    /// Fetch schema text by global id
    async fn get_schema_by_id(&self, id: SchemaId) -> RegistryResult<String>;

    /// Ask the registry whether `schema` is compatible with `subject` at `version`
    async fn check_compatibility(
        &self,
        schema: &str,
        subject: &Subject,
        version: SchemaVersion,
    ) -> RegistryResult<bool>;
}

/// Shared handle to a registry client
pub type SharedClient = Arc<dyn RegistryClient>;

/// Request body carrying a schema string
#[derive(Debug, Serialize)]
struct SchemaRequest<'a> {
    schema: &'a str,
}

/// Response from getting a schema by ID
#[derive(Debug, Deserialize)]
struct GetSchemaResponse {
    schema: String,
}

/// Response from getting a subject version
#[derive(Debug, Deserialize)]
struct SubjectVersionResponse {
    subject: String,
    version: u32,
    id: u32,
    schema: String,
}

/// Response from compatibility check
#[derive(Debug, Deserialize)]
struct CompatibilityCheckResponse {
    is_compatible: bool,
}

/// Error body returned on non-2xx responses
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error_code: u32,
    message: String,
}

/// HTTP client for Confluent-compatible registries
pub struct HttpRegistryClient {
    client: Client,
    base_url: String,
}

impl std::fmt::Debug for HttpRegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRegistryClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HttpRegistryClient {
    /// Create a new client from configuration
    pub fn new(config: &RegistryConfig) -> RegistryResult<Self> {
        config.validate()?;

        let mut client_builder = Client::builder().timeout(config.timeout());

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            use base64::Engine;
            use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

            let credentials = format!("{}:{}", username, password);
            let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
            let auth_value = format!("Basic {}", encoded);

            let mut headers = HeaderMap::new();
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| RegistryError::Config(e.to_string()))?,
            );

            client_builder = client_builder.default_headers(headers);
        }

        let client = client_builder
            .build()
            .map_err(|e| RegistryError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> RegistryResult<T> {
        let response = self
            .client
            .get(url)
            .header("Accept", ACCEPT)
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> RegistryResult<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(parse_error(status, &body));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn get_schema_by_subject(
        &self,
        subject: &Subject,
        version: SchemaVersion,
    ) -> RegistryResult<SubjectSchema> {
        let url = format!(
            "{}/subjects/{}/versions/{}",
            self.base_url, subject.0, version
        );

        let result: SubjectVersionResponse = self.get_json(&url).await?;

        Ok(SubjectSchema {
            subject: Subject::new(result.subject),
            version: result.version,
            id: SchemaId::new(result.id),
            schema: result.schema,
        })
    }

    async fn get_schema_by_id(&self, id: SchemaId) -> RegistryResult<String> {
        let url = format!("{}/schemas/ids/{}", self.base_url, id.0);
        let result: GetSchemaResponse = self.get_json(&url).await?;
        Ok(result.schema)
    }

    async fn check_compatibility(
        &self,
        schema: &str,
        subject: &Subject,
        version: SchemaVersion,
    ) -> RegistryResult<bool> {
        let url = format!(
            "{}/compatibility/subjects/{}/versions/{}",
            self.base_url, subject.0, version
        );

        let response = self
            .client
            .post(&url)
            .header("Accept", ACCEPT)
            .header("Content-Type", CONTENT_TYPE)
            .json(&SchemaRequest { schema })
            .send()
            .await?;

        let result: CompatibilityCheckResponse = Self::read_json(response).await?;
        Ok(result.is_compatible)
    }
}

/// Map a non-2xx response to a structured error when the body allows it
fn parse_error(status: StatusCode, body: &str) -> RegistryError {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) => RegistryError::Remote {
            status: status.as_u16(),
            error_code: err.error_code,
            message: err.message,
        },
        Err(_) => RegistryError::Http {
            status: status.as_u16(),
            body: body.to_string(),
        },
    }
}
