//! Content store collaborator. Writes go through a phased session:
//! register (on-chain reservation) → upload → certify (on-chain) → content id.

use async_trait::async_trait;

use crate::digest::ContentDigest;
use crate::ledger::{Receipt, TransactionIntent};

/// Type suffix of the blob reservation object created by a register
/// transaction.
pub const BLOB_OBJECT_TYPE: &str = "::blob::Blob";
/// Type suffix of the event a certify transaction emits.
pub const BLOB_CERTIFIED_EVENT: &str = "::events::BlobCertified";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionOptions {
    pub epochs: u32,
    pub deletable: bool,
}

impl RetentionOptions {
    pub fn epochs(epochs: u32) -> Self {
        Self {
            epochs,
            deletable: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Encoded,
    Registered,
    Uploaded,
    Certified,
}

/// One blob write in progress. Phases advance strictly in order; a store
/// calls `advance` as each phase completes.
#[derive(Debug, Clone)]
pub struct WriteSession {
    bytes: Vec<u8>,
    root_hash: ContentDigest,
    phase: SessionPhase,
    blob_object: Option<String>,
    content_id: Option<String>,
}

impl WriteSession {
    pub fn new(bytes: Vec<u8>) -> Self {
        let root_hash = ContentDigest::of(&bytes);
        Self {
            bytes,
            root_hash,
            phase: SessionPhase::Encoded,
            blob_object: None,
            content_id: None,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn root_hash(&self) -> ContentDigest {
        self.root_hash
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn blob_object(&self) -> Option<&str> {
        self.blob_object.as_deref()
    }

    pub fn content_id(&self) -> Option<&str> {
        self.content_id.as_deref()
    }

    /// Fail unless the session is exactly in `expected`.
    pub fn require(&self, expected: SessionPhase) -> Result<(), StoreError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(StoreError::OutOfOrder {
                expected,
                actual: self.phase,
            })
        }
    }

    pub fn mark_registered(&mut self, blob_object: String) -> Result<(), StoreError> {
        self.require(SessionPhase::Encoded)?;
        self.blob_object = Some(blob_object);
        self.phase = SessionPhase::Registered;
        Ok(())
    }

    pub fn mark_uploaded(&mut self) -> Result<(), StoreError> {
        self.require(SessionPhase::Registered)?;
        self.phase = SessionPhase::Uploaded;
        Ok(())
    }

    pub fn mark_certified(&mut self, content_id: String) -> Result<(), StoreError> {
        self.require(SessionPhase::Uploaded)?;
        self.content_id = Some(content_id);
        self.phase = SessionPhase::Certified;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("storage network error: {0}")]
    Network(String),
    #[error("out-of-order write: expected {expected:?}, session is {actual:?}")]
    OutOfOrder {
        expected: SessionPhase,
        actual: SessionPhase,
    },
    #[error("invalid receipt: {0}")]
    InvalidReceipt(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Network(err.to_string())
    }
}

/// Decentralized blob storage.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Intent that reserves storage for the session's blob.
    fn register_intent(
        &self,
        session: &WriteSession,
        owner: &str,
        retention: RetentionOptions,
    ) -> Result<TransactionIntent, StoreError>;

    /// Push the bytes to the storage nodes, referencing the register receipt.
    async fn upload(
        &self,
        session: &mut WriteSession,
        registration: &Receipt,
    ) -> Result<(), StoreError>;

    /// Intent that certifies the uploaded blob.
    fn certify_intent(&self, session: &WriteSession) -> Result<TransactionIntent, StoreError>;

    /// Resolve the content id assigned at certification.
    async fn certified(
        &self,
        session: &mut WriteSession,
        certification: &Receipt,
    ) -> Result<String, StoreError>;

    async fn get(&self, content_id: &str) -> Result<Vec<u8>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_advance_in_order() {
        let mut s = WriteSession::new(b"{}".to_vec());
        assert_eq!(s.phase(), SessionPhase::Encoded);
        assert!(s.mark_uploaded().is_err());
        s.mark_registered("0xblob".to_string()).unwrap();
        assert!(s.mark_certified("id".to_string()).is_err());
        s.mark_uploaded().unwrap();
        s.mark_certified("id".to_string()).unwrap();
        assert_eq!(s.content_id(), Some("id"));
        assert_eq!(s.blob_object(), Some("0xblob"));
    }

    #[test]
    fn root_hash_covers_exact_bytes() {
        let s = WriteSession::new(b"abc".to_vec());
        assert_eq!(s.root_hash(), ContentDigest::of(b"abc"));
        assert_eq!(s.size(), 3);
    }
}
