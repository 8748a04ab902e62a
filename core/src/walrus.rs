//! Read-only Walrus aggregator client.
//!
//! Blobs are fetched over the aggregator's HTTP API. Writing requires
//! erasure-coding and talking to storage nodes directly, which this client
//! does not do; write calls return `StoreError::Unsupported`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::ledger::{Receipt, TransactionIntent};
use crate::store::{ContentStore, RetentionOptions, StoreError, WriteSession};

const TIMEOUT_SECS: u64 = 30;

pub struct AggregatorStore {
    base_url: String,
    client: Client,
}

impl AggregatorStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn unsupported(what: &str) -> StoreError {
        StoreError::Unsupported(format!(
            "{what} needs a storage publisher; use the sandbox network for writes"
        ))
    }
}

#[async_trait]
impl ContentStore for AggregatorStore {
    fn register_intent(
        &self,
        _session: &WriteSession,
        _owner: &str,
        _retention: RetentionOptions,
    ) -> Result<TransactionIntent, StoreError> {
        Err(Self::unsupported("registering a blob"))
    }

    async fn upload(
        &self,
        _session: &mut WriteSession,
        _registration: &Receipt,
    ) -> Result<(), StoreError> {
        Err(Self::unsupported("uploading a blob"))
    }

    fn certify_intent(&self, _session: &WriteSession) -> Result<TransactionIntent, StoreError> {
        Err(Self::unsupported("certifying a blob"))
    }

    async fn certified(
        &self,
        _session: &mut WriteSession,
        _certification: &Receipt,
    ) -> Result<String, StoreError> {
        Err(Self::unsupported("certifying a blob"))
    }

    async fn get(&self, content_id: &str) -> Result<Vec<u8>, StoreError> {
        let url = format!("{}/v1/blobs/{}", self.base_url, urlencoding::encode(content_id));
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(content_id.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Network(format!(
                "aggregator returned {status}: {body}"
            )));
        }

        let bytes = response.bytes().await?;
        tracing::debug!(event = "blob_fetched", content_id, size = bytes.len());
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn get_returns_raw_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/blobs/abc_123"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(br#"{"name":"Bot"}"#.to_vec()))
            .mount(&server)
            .await;

        let store = AggregatorStore::new(format!("{}/", server.uri())).unwrap();
        let bytes = store.get("abc_123").await.unwrap();
        assert_eq!(bytes, br#"{"name":"Bot"}"#);
    }

    #[tokio::test]
    async fn missing_blob_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = AggregatorStore::new(server.uri()).unwrap();
        assert!(matches!(
            store.get("gone").await,
            Err(StoreError::NotFound(id)) if id == "gone"
        ));
    }

    #[tokio::test]
    async fn server_error_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let store = AggregatorStore::new(server.uri()).unwrap();
        let err = store.get("x").await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn writes_are_unsupported() {
        let store = AggregatorStore::new("http://127.0.0.1:1").unwrap();
        let session = WriteSession::new(b"{}".to_vec());
        assert!(matches!(
            store.register_intent(&session, "0xa", RetentionOptions::epochs(1)),
            Err(StoreError::Unsupported(_))
        ));
    }
}
