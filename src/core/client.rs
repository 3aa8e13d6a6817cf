//! Async client for the CQL-to-ELM translation service

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::multipart::Form;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::config::ClientConfig;
use crate::core::errors::{ElmError, Result};
use crate::core::models::{CqlInput, ElmOutput, MAIN_PART};
use crate::core::multipart::{MultipartPart, MultipartPatterns};

/// Media type of a raw CQL request body
pub const CQL_MEDIA_TYPE: &str = "application/cql";

/// Media type requested for a raw translation
pub const ELM_JSON_MEDIA_TYPE: &str = "application/elm+json";

/// Translation client bound to one service endpoint
#[derive(Debug, Clone)]
pub struct ElmTranslator {
    client: reqwest::Client,
    config: Arc<ClientConfig>,
    patterns: Arc<MultipartPatterns>,
}

impl ElmTranslator {
    /// Create a new translator
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            config: Arc::new(config),
            patterns: Arc::new(MultipartPatterns::new()?),
        })
    }

    /// Create from environment
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Translate a main library and its dependencies in one multipart round trip
    pub async fn convert_structured(&self, cql: &CqlInput) -> Result<ElmOutput> {
        let form = cql
            .libraries
            .iter()
            .fold(Form::new(), |form, (name, text)| {
                form.text(name.clone(), text.clone())
            })
            .text(MAIN_PART, cql.main.clone());

        info!(
            "Translating main library with {} dependencies via {}",
            cql.libraries.len(),
            self.config.webservice_url
        );

        let response = self
            .client
            .post(&self.config.webservice_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ElmError::NetworkError {
                message: e.to_string(),
            })?;
        let response = check_status(response).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let delimiter = self.patterns.delimiter(content_type.as_deref());
        if delimiter.is_empty() {
            if self.config.require_boundary {
                return Err(ElmError::BoundaryNotFoundError { content_type });
            }
            warn!(
                "No multipart boundary in content-type {:?}, treating body as one part",
                content_type
            );
        } else {
            debug!("Splitting response on {}", delimiter);
        }

        let body = response.text().await.map_err(|e| ElmError::NetworkError {
            message: e.to_string(),
        })?;

        let parts = self.patterns.parse_parts(&body, &delimiter);
        debug!("Response carried {} parts", parts.len());

        let elm = collect_elm(parts)?;
        info!(
            "Received ELM: main={}, {} libraries",
            elm.main.is_some(),
            elm.libraries.len()
        );
        Ok(elm)
    }

    /// Translate a single CQL document, answering with its ELM JSON
    pub async fn convert_raw(&self, cql: &str) -> Result<Value> {
        info!("Translating raw CQL via {}", self.config.webservice_url);

        let response = self
            .client
            .post(&self.config.webservice_url)
            .header(CONTENT_TYPE, CQL_MEDIA_TYPE)
            .header(ACCEPT, ELM_JSON_MEDIA_TYPE)
            .body(cql.to_string())
            .send()
            .await
            .map_err(|e| ElmError::NetworkError {
                message: e.to_string(),
            })?;
        let response = check_status(response).await?;

        let body = response.text().await.map_err(|e| ElmError::NetworkError {
            message: e.to_string(),
        })?;

        serde_json::from_str(&body).map_err(|e| ElmError::InvalidResponseError {
            message: format!("ELM is not JSON: {}", e),
        })
    }
}

/// Fold decoded parts into a fresh output; a malformed JSON body aborts
fn collect_elm(parts: Vec<MultipartPart>) -> Result<ElmOutput> {
    parts
        .into_iter()
        .try_fold(ElmOutput::default(), |elm, part| {
            let (Some(json), Some(name)) = (part.json_content(), part.name.as_deref()) else {
                return Ok(elm);
            };

            let parsed: Value =
                serde_json::from_str(json).map_err(|source| ElmError::MalformedPartError {
                    name: name.to_string(),
                    source,
                })?;
            Ok(elm.absorb(name, parsed))
        })
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(ElmError::ServiceError {
        status: status.as_u16(),
        message,
    })
}
