//! Anchored writes: store a payload off-chain, then reference it on-chain.
//!
//! Every write is a strict sequence of awaited steps:
//!
//! 1. encode the payload (local; a failure here touches no network)
//! 2. register a storage reservation (signed transaction)
//! 3. upload the bytes against that reservation
//! 4. certify the blob (signed transaction)
//! 5. read the content id assigned at certification
//! 6. optionally, submit the transaction that records `walrus://<id>` and the
//!    payload digest on-chain (signed transaction)
//!
//! A failure after step 2 leaves an orphaned reservation; a failure in step 6
//! leaves a certified blob nothing points at. Neither is cleaned up here.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::digest::ContentDigest;
use crate::error::{AnchorPhase, MarketError, Result};
use crate::ledger::{Ledger, LedgerError, Receipt, TransactionIntent};
use crate::signer::{Signer, SignerError};
use crate::store::{ContentStore, RetentionOptions, StoreError, WriteSession};
use crate::uri;

/// A certified, retrievable blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anchored {
    pub content_id: String,
    /// `walrus://<content_id>`
    pub uri: String,
    /// SHA-256 of the stored bytes
    pub digest: ContentDigest,
    pub size: u64,
}

/// A blob plus the finalized transaction that references it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchoredRecord {
    pub anchored: Anchored,
    pub receipt: Receipt,
}

#[derive(Clone)]
pub struct AnchorWriter {
    ledger: Arc<dyn Ledger>,
    store: Arc<dyn ContentStore>,
}

impl AnchorWriter {
    pub fn new(ledger: Arc<dyn Ledger>, store: Arc<dyn ContentStore>) -> Self {
        Self { ledger, store }
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Store `payload` and return its content id and pointer. Two signer
    /// approvals: register, certify.
    pub async fn anchor<T>(
        &self,
        payload: &T,
        owner: &str,
        signer: &dyn Signer,
        retention: RetentionOptions,
    ) -> Result<Anchored>
    where
        T: Serialize + DeserializeOwned + PartialEq,
    {
        let bytes = codec::encode_document(payload)?;
        self.anchor_bytes(bytes, owner, signer, retention).await
    }

    /// `anchor`, then submit the transaction `on_chain_call(uri, digest)`
    /// builds and wait for it to finalize. `digest` covers exactly the bytes
    /// that were stored. Three signer approvals in total.
    pub async fn anchor_and_record<T, F>(
        &self,
        payload: &T,
        owner: &str,
        signer: &dyn Signer,
        retention: RetentionOptions,
        on_chain_call: F,
    ) -> Result<AnchoredRecord>
    where
        T: Serialize + DeserializeOwned + PartialEq,
        F: FnOnce(&str, ContentDigest) -> TransactionIntent,
    {
        let bytes = codec::encode_document(payload)?;
        let anchored = self.anchor_bytes(bytes, owner, signer, retention).await?;

        let intent = on_chain_call(&anchored.uri, anchored.digest);
        let entry_point = intent.entry_point();
        let receipt = match self.sign_and_submit(intent, signer, AnchorPhase::Record).await {
            Ok(receipt) => receipt,
            Err(err) => {
                tracing::warn!(
                    event = "anchor_unreferenced_blob",
                    content_id = %anchored.content_id,
                    entry_point,
                    error = %err,
                    "Blob certified but the recording transaction failed"
                );
                return Err(err);
            }
        };

        tracing::info!(
            event = "anchor_recorded",
            content_id = %anchored.content_id,
            entry_point,
            tx_digest = %receipt.digest,
            "Anchored payload recorded on-chain"
        );

        Ok(AnchoredRecord { anchored, receipt })
    }

    async fn anchor_bytes(
        &self,
        bytes: Vec<u8>,
        owner: &str,
        signer: &dyn Signer,
        retention: RetentionOptions,
    ) -> Result<Anchored> {
        let mut session = WriteSession::new(bytes);
        let digest = session.root_hash();
        let size = session.size();

        tracing::info!(
            event = "anchor_started",
            owner = %owner,
            size,
            digest = %digest,
            epochs = retention.epochs,
            "Anchoring payload"
        );

        // Phase A: reservation. Nothing durable exists if this fails.
        let intent = self
            .store
            .register_intent(&session, owner, retention)
            .map_err(|e| storage_error(AnchorPhase::Register, e))?;
        let registration = self
            .sign_and_submit(intent, signer, AnchorPhase::Register)
            .await?;

        // Phase B: upload against the reservation.
        if let Err(e) = self.store.upload(&mut session, &registration).await {
            tracing::warn!(
                event = "anchor_orphaned_reservation",
                blob_object = ?session.blob_object(),
                register_tx = %registration.digest,
                error = %e,
                "Upload failed; reservation left uncertified"
            );
            return Err(storage_error(AnchorPhase::Upload, e));
        }

        // Phase C: certification.
        let intent = self
            .store
            .certify_intent(&session)
            .map_err(|e| storage_error(AnchorPhase::Certify, e))?;
        let certification = match self
            .sign_and_submit(intent, signer, AnchorPhase::Certify)
            .await
        {
            Ok(receipt) => receipt,
            Err(err) => {
                tracing::warn!(
                    event = "anchor_orphaned_reservation",
                    blob_object = ?session.blob_object(),
                    error = %err,
                    "Certification failed; reservation left uncertified"
                );
                return Err(err);
            }
        };

        let content_id = self
            .store
            .certified(&mut session, &certification)
            .await
            .map_err(|e| storage_error(AnchorPhase::Certify, e))?;

        tracing::info!(
            event = "anchor_certified",
            content_id = %content_id,
            certify_tx = %certification.digest,
            "Blob certified"
        );

        Ok(Anchored {
            uri: uri::to_uri(&content_id),
            content_id,
            digest,
            size,
        })
    }

    /// Sign `intent` and submit it, mapping failures to the phase's error.
    pub(crate) async fn sign_and_submit(
        &self,
        intent: TransactionIntent,
        signer: &dyn Signer,
        phase: AnchorPhase,
    ) -> Result<Receipt> {
        let entry_point = intent.entry_point();
        let signed = signer.sign(&intent).await.map_err(|e| {
            tracing::info!(event = "signing_rejected", %phase, entry_point, "Signer declined");
            match e {
                SignerError::Rejected(reason) | SignerError::Unavailable(reason) => {
                    MarketError::SigningRejected { phase, reason }
                }
            }
        })?;

        tracing::debug!(event = "tx_submitting", %phase, entry_point, sender = %signed.sender);

        self.ledger
            .submit(signed)
            .await
            .map_err(|e| ledger_error(phase, e))
    }
}

fn storage_error(phase: AnchorPhase, err: StoreError) -> MarketError {
    MarketError::StorageUnavailable {
        phase,
        message: err.to_string(),
    }
}

fn ledger_error(phase: AnchorPhase, err: LedgerError) -> MarketError {
    match phase {
        AnchorPhase::Register | AnchorPhase::Upload | AnchorPhase::Certify => {
            MarketError::StorageUnavailable {
                phase,
                message: err.to_string(),
            }
        }
        AnchorPhase::Encode | AnchorPhase::Record => {
            MarketError::LedgerSubmissionFailed(err.to_string())
        }
    }
}
