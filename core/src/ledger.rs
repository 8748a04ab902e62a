//! Ledger collaborator: transaction intents, receipts, and the read surface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::digest::ContentDigest;
use crate::model::{Endpoint, ValidationStatus};
use crate::signer::SignedTransaction;

/// A transaction to be signed and submitted, naming the Move entry point it
/// targets and its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum TransactionIntent {
    /// Reserve storage for a blob that has not been uploaded yet.
    RegisterBlob {
        owner: String,
        size: u64,
        root_hash: ContentDigest,
        epochs: u32,
        deletable: bool,
    },
    /// Finalize an uploaded blob so it becomes retrievable.
    CertifyBlob { blob_object: String },
    RegisterAgent {
        registry: String,
        name: String,
        description: String,
        image: String,
        token_uri: String,
    },
    SetDescription { agent: String, value: String },
    SetImage { agent: String, value: String },
    SetTokenUri { agent: String, value: String },
    AddEndpoint { agent: String, endpoint: Endpoint },
    GiveFeedback {
        registry: String,
        agent_id: u64,
        score: u8,
        file_uri: String,
        file_hash: ContentDigest,
    },
    RequestValidation {
        registry: String,
        agent: String,
        validator: String,
        request_uri: String,
        request_hash: ContentDigest,
    },
    RespondValidation {
        registry: String,
        request_hash: ContentDigest,
        response: ValidationStatus,
        response_uri: String,
        response_hash: ContentDigest,
        tag: String,
    },
}

impl TransactionIntent {
    /// Fully qualified `module::function` this intent calls.
    pub fn entry_point(&self) -> &'static str {
        match self {
            TransactionIntent::RegisterBlob { .. } => "system::register_blob",
            TransactionIntent::CertifyBlob { .. } => "system::certify_blob",
            TransactionIntent::RegisterAgent { .. } => "identity_registry::register",
            TransactionIntent::SetDescription { .. } => "identity_registry::set_description",
            TransactionIntent::SetImage { .. } => "identity_registry::set_image",
            TransactionIntent::SetTokenUri { .. } => "identity_registry::set_token_uri",
            TransactionIntent::AddEndpoint { .. } => "identity_registry::add_endpoint",
            TransactionIntent::GiveFeedback { .. } => "reputation_registry::give_feedback",
            TransactionIntent::RequestValidation { .. } => "validation_registry::request_validation",
            TransactionIntent::RespondValidation { .. } => "validation_registry::respond_validation",
        }
    }
}

/// Read-only call against registry view logic. No signer, no state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum ViewCall {
    GetReputationSummary { registry: String, agent_id: u64 },
}

impl ViewCall {
    /// `(module, function)` of the view function.
    pub fn target(&self) -> (&'static str, &'static str) {
        match self {
            ViewCall::GetReputationSummary { .. } => {
                ("reputation_registry", "get_reputation_summary")
            }
        }
    }
}

/// An on-chain object as returned by an object query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerObject {
    pub object_id: String,
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Move struct fields, as JSON
    pub fields: serde_json::Value,
}

/// An emitted Move event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub event_type: String,
    pub sender: String,
    pub tx_digest: String,
    pub event_seq: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<u64>,
    pub fields: serde_json::Value,
}

/// Outcome of a finalized transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub digest: String,
    /// Objects created by the transaction
    pub created: Vec<LedgerObject>,
    pub events: Vec<LedgerEvent>,
}

impl Receipt {
    /// First created object whose type ends with `type_suffix`.
    pub fn created_of_type(&self, type_suffix: &str) -> Option<&LedgerObject> {
        self.created.iter().find(|o| o.type_name.ends_with(type_suffix))
    }

    /// First event whose type ends with `type_suffix`.
    pub fn event_of_type(&self, type_suffix: &str) -> Option<&LedgerEvent> {
        self.events.iter().find(|e| e.event_type.ends_with(type_suffix))
    }
}

/// Cursor-based pagination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    /// Cursor for the next page. None if this is the last page.
    pub next_cursor: Option<String>,
    pub has_next_page: bool,
}

impl<T> Page<T> {
    pub fn last(data: Vec<T>) -> Self {
        Self {
            data,
            next_cursor: None,
            has_next_page: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Chain execution rejected or reverted the transaction
    #[error("execution failed: {0}")]
    Execution(String),
    /// Node unreachable, timed out, or returned a transport-level error
    #[error("transport error: {0}")]
    Transport(String),
    /// The response could not be interpreted
    #[error("unexpected response: {0}")]
    Decode(String),
    /// This client does not implement the operation
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Blockchain RPC and transaction-submission surface.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Submit a signed transaction and wait for finality.
    async fn submit(&self, tx: SignedTransaction) -> Result<Receipt, LedgerError>;

    /// Run a view function without changing state. Returns raw return values,
    /// one byte vector per value.
    async fn simulate(&self, call: &ViewCall, sender: &str) -> Result<Vec<Vec<u8>>, LedgerError>;

    /// One page of objects of `struct_type` owned by `owner`.
    async fn owned_objects(
        &self,
        owner: &str,
        struct_type: &str,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<Page<LedgerObject>, LedgerError>;

    /// One page of events of `event_type`, oldest first.
    async fn query_events(
        &self,
        event_type: &str,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<Page<LedgerEvent>, LedgerError>;

    async fn get_object(&self, object_id: &str) -> Result<Option<LedgerObject>, LedgerError>;
}

/// Follow an owned-object cursor to the end.
pub async fn all_owned_objects(
    ledger: &dyn Ledger,
    owner: &str,
    struct_type: &str,
    page_size: usize,
) -> Result<Vec<LedgerObject>, LedgerError> {
    let mut out = Vec::new();
    let mut cursor = None;
    loop {
        let page = ledger
            .owned_objects(owner, struct_type, cursor.take(), page_size)
            .await?;
        out.extend(page.data);
        match page.next_cursor {
            Some(next) if page.has_next_page => cursor = Some(next),
            _ => break,
        }
    }
    Ok(out)
}

/// Follow an event cursor to the end.
pub async fn all_events(
    ledger: &dyn Ledger,
    event_type: &str,
    page_size: usize,
) -> Result<Vec<LedgerEvent>, LedgerError> {
    let mut out = Vec::new();
    let mut cursor = None;
    loop {
        let page = ledger.query_events(event_type, cursor.take(), page_size).await?;
        out.extend(page.data);
        match page.next_cursor {
            Some(next) if page.has_next_page => cursor = Some(next),
            _ => break,
        }
    }
    Ok(out)
}

/// Integer field that may arrive as a JSON number or, as Sui renders `u64`,
/// a decimal string.
pub fn json_u64(fields: &serde_json::Value, key: &str) -> Option<u64> {
    match fields.get(key)? {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub fn json_str(fields: &serde_json::Value, key: &str) -> Option<String> {
    fields.get(key)?.as_str().map(str::to_string)
}

/// Decode a BCS-encoded unsigned integer of exactly `N` bytes (little-endian).
pub fn decode_fixed_le<const N: usize>(raw: &[u8]) -> Result<[u8; N], LedgerError> {
    raw.try_into().map_err(|_| {
        LedgerError::Decode(format!("expected {N}-byte integer, got {} bytes", raw.len()))
    })
}
