//! Signing capability. The only externally gated suspension point of a write:
//! every transaction passes through `Signer::sign`, which may block on a human
//! and may refuse.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ledger::TransactionIntent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub intent: TransactionIntent,
    pub sender: String,
    /// Opaque approval token or signature produced by the signer
    pub signature: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("signer unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Signer: Send + Sync {
    /// Address transactions are signed for.
    fn address(&self) -> &str;

    async fn sign(&self, intent: &TransactionIntent) -> Result<SignedTransaction, SignerError>;
}

/// Approves without asking, optionally only up to a fixed number of approvals.
/// Backs non-interactive runs against the sandbox network.
pub struct StaticSigner {
    address: String,
    approvals_left: Option<AtomicUsize>,
    signed: AtomicUsize,
}

impl StaticSigner {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            approvals_left: None,
            signed: AtomicUsize::new(0),
        }
    }

    /// Approve the first `limit` intents and reject everything after.
    pub fn with_limit(address: impl Into<String>, limit: usize) -> Self {
        Self {
            address: address.into(),
            approvals_left: Some(AtomicUsize::new(limit)),
            signed: AtomicUsize::new(0),
        }
    }

    /// Number of intents signed so far.
    pub fn signed_count(&self) -> usize {
        self.signed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Signer for StaticSigner {
    fn address(&self) -> &str {
        &self.address
    }

    async fn sign(&self, intent: &TransactionIntent) -> Result<SignedTransaction, SignerError> {
        if let Some(left) = &self.approvals_left {
            let granted = left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if !granted {
                return Err(SignerError::Rejected(format!(
                    "approval limit reached before {}",
                    intent.entry_point()
                )));
            }
        }
        self.signed.fetch_add(1, Ordering::SeqCst);
        Ok(SignedTransaction {
            intent: intent.clone(),
            sender: self.address.clone(),
            signature: format!("approved:{}", uuid::Uuid::now_v7()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent() -> TransactionIntent {
        TransactionIntent::CertifyBlob {
            blob_object: "0xb".to_string(),
        }
    }

    #[tokio::test]
    async fn unlimited_signer_always_approves() {
        let signer = StaticSigner::new("0xa");
        for _ in 0..5 {
            let signed = signer.sign(&intent()).await.unwrap();
            assert_eq!(signed.sender, "0xa");
        }
        assert_eq!(signer.signed_count(), 5);
    }

    #[tokio::test]
    async fn limited_signer_rejects_after_budget() {
        let signer = StaticSigner::with_limit("0xa", 2);
        assert!(signer.sign(&intent()).await.is_ok());
        assert!(signer.sign(&intent()).await.is_ok());
        assert!(matches!(
            signer.sign(&intent()).await,
            Err(SignerError::Rejected(_))
        ));
        assert_eq!(signer.signed_count(), 2);
    }
}
