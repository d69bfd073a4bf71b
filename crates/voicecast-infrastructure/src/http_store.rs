//! HTTP remote store adapter.
//!
//! Speaks to the studio backend's REST API. All commit endpoints carry the
//! caller's expected version; the backend answers 409 with its current
//! version when the commit is stale, and 422 with messages when the payload
//! is rejected.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use voicecast_core::error::{CastingError, Result};
use voicecast_core::session::{
    AssignmentPatch, CharacterExtraction, LibraryVoice, RemoteStore, Session,
};

use crate::config::StudioConfig;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Remote store implementation over the backend HTTP API.
#[derive(Clone)]
pub struct HttpRemoteStore {
    client: Client,
    base_url: String,
}

impl HttpRemoteStore {
    /// Creates an adapter with the default request timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates an adapter with an explicit request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CastingError::config(format!("failed to build HTTP client: {e}")))?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self { client, base_url })
    }

    /// Creates an adapter from the studio configuration.
    pub fn from_config(config: &StudioConfig) -> Result<Self> {
        Self::with_timeout(
            config.backend_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends a request and decodes the JSON response, mapping failure
    /// statuses onto the error taxonomy.
    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        entity: &'static str,
        entity_id: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| CastingError::parse(format!("malformed response body: {e}")))
        } else {
            let body = response.json::<ErrorBody>().await.unwrap_or_default();
            Err(map_status(status, body, entity, entity_id))
        }
    }
}

#[async_trait::async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn fetch_session(&self, id: &str) -> Result<Session> {
        let request = self.client.get(self.url(&format!("/api/casting/sessions/{id}")));
        self.send("Session", id, request).await
    }

    async fn commit_document(
        &self,
        id: &str,
        document_text: &str,
        expected_version: u64,
    ) -> Result<Session> {
        let request = self
            .client
            .put(self.url(&format!("/api/casting/sessions/{id}/document")))
            .json(&CommitDocumentRequest {
                document_text,
                expected_version,
            });
        self.send("Session", id, request).await
    }

    async fn commit_assignment_metadata(
        &self,
        id: &str,
        character: &str,
        patch: &AssignmentPatch,
        expected_version: u64,
    ) -> Result<Session> {
        let request = self
            .client
            .patch(self.url(&format!(
                "/api/casting/sessions/{id}/assignments/{character}"
            )))
            .json(&PatchAssignmentRequest {
                patch,
                expected_version,
            });
        self.send("Session", id, request).await
    }

    async fn clear_assignment(
        &self,
        id: &str,
        character: &str,
        expected_version: u64,
    ) -> Result<Session> {
        let request = self
            .client
            .delete(self.url(&format!(
                "/api/casting/sessions/{id}/assignments/{character}/voice"
            )))
            .query(&[("expected_version", expected_version)]);
        self.send("Session", id, request).await
    }

    async fn list_library_voices(&self, provider: &str) -> Result<Vec<LibraryVoice>> {
        let request = self
            .client
            .get(self.url(&format!("/api/voice-library/{provider}/voices")));
        self.send("Provider", provider, request).await
    }

    async fn extract_characters(&self, source_path: &str) -> Result<CharacterExtraction> {
        let request = self
            .client
            .post(self.url("/api/casting/extract-characters"))
            .json(&ExtractCharactersRequest { source_path });
        self.send("Screenplay", source_path, request).await
    }
}

#[derive(Serialize)]
struct CommitDocumentRequest<'a> {
    document_text: &'a str,
    expected_version: u64,
}

#[derive(Serialize)]
struct PatchAssignmentRequest<'a> {
    patch: &'a AssignmentPatch,
    expected_version: u64,
}

#[derive(Serialize)]
struct ExtractCharactersRequest<'a> {
    source_path: &'a str,
}

/// Error payload the backend attaches to failure statuses.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    current_version: Option<u64>,
    #[serde(default)]
    messages: Vec<String>,
}

fn map_status(
    status: StatusCode,
    body: ErrorBody,
    entity: &'static str,
    entity_id: &str,
) -> CastingError {
    match status {
        StatusCode::NOT_FOUND => CastingError::not_found(entity, entity_id),
        StatusCode::CONFLICT => {
            CastingError::version_conflict(body.current_version.unwrap_or_default())
        }
        StatusCode::UNPROCESSABLE_ENTITY => {
            if body.messages.is_empty() {
                CastingError::validation([body
                    .detail
                    .unwrap_or_else(|| "commit rejected".to_string())])
            } else {
                CastingError::Validation(body.messages)
            }
        }
        status => CastingError::network(format!(
            "unexpected status {status}: {}",
            body.detail.unwrap_or_default()
        )),
    }
}

fn transport_error(err: reqwest::Error) -> CastingError {
    if err.is_timeout() {
        CastingError::network(format!("request timed out: {err}"))
    } else {
        CastingError::network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_status_carries_current_version() {
        let err = map_status(
            StatusCode::CONFLICT,
            ErrorBody {
                current_version: Some(7),
                ..ErrorBody::default()
            },
            "Session",
            "s-1",
        );
        assert_eq!(err, CastingError::version_conflict(7));
    }

    #[test]
    fn test_not_found_status() {
        let err = map_status(StatusCode::NOT_FOUND, ErrorBody::default(), "Session", "s-1");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_validation_status_prefers_messages() {
        let err = map_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorBody {
                detail: Some("rejected".to_string()),
                messages: vec!["ALICE: missing provider".to_string()],
                ..ErrorBody::default()
            },
            "Session",
            "s-1",
        );
        assert_eq!(
            err,
            CastingError::Validation(vec!["ALICE: missing provider".to_string()])
        );
    }

    #[test]
    fn test_server_error_is_network() {
        let err = map_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody::default(),
            "Session",
            "s-1",
        );
        assert!(err.is_network());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let store = HttpRemoteStore::new("http://localhost:8000/").unwrap();
        assert_eq!(
            store.url("/api/casting/sessions/s-1"),
            "http://localhost:8000/api/casting/sessions/s-1"
        );
    }
}
