use serde::Serialize;

use crate::codec::CodecError;

/// Phase of an anchored write. Attached to errors so a caller can tell how far
/// the operation got before it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorPhase {
    Encode,
    Register,
    Upload,
    Certify,
    Record,
}

impl std::fmt::Display for AnchorPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AnchorPhase::Encode => "encode",
            AnchorPhase::Register => "register",
            AnchorPhase::Upload => "upload",
            AnchorPhase::Certify => "certify",
            AnchorPhase::Record => "record",
        };
        f.write_str(name)
    }
}

/// Every failure an orchestrated write or a read-model call can surface.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    /// The payload could not be encoded or failed local validation.
    /// Raised before any network call.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The signer declined one of the approval points.
    #[error("signing rejected during {phase}: {reason}")]
    SigningRejected { phase: AnchorPhase, reason: String },

    /// The content store (or the storage transactions backing it) failed.
    #[error("storage unavailable during {phase}: {message}")]
    StorageUnavailable { phase: AnchorPhase, message: String },

    /// The final anchoring transaction was rejected or reverted.
    #[error("ledger submission failed: {0}")]
    LedgerSubmissionFailed(String),

    /// An off-chain payload referenced by an on-chain pointer could not be
    /// fetched or decoded.
    #[error("failed to resolve {uri}: {message}")]
    ResolutionFailed { uri: String, message: String },

    /// A ledger query failed (node unreachable or unexpected response).
    #[error("ledger query failed: {0}")]
    LedgerUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl MarketError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            MarketError::InvalidPayload(_) => codes::INVALID_PAYLOAD,
            MarketError::SigningRejected { .. } => codes::SIGNING_REJECTED,
            MarketError::StorageUnavailable { .. } => codes::STORAGE_UNAVAILABLE,
            MarketError::LedgerSubmissionFailed(_) => codes::LEDGER_SUBMISSION_FAILED,
            MarketError::ResolutionFailed { .. } => codes::RESOLUTION_FAILED,
            MarketError::LedgerUnavailable(_) => codes::LEDGER_UNAVAILABLE,
            MarketError::NotFound(_) => codes::NOT_FOUND,
            MarketError::Configuration(_) => codes::CONFIGURATION,
        }
    }

    /// Phase the failure happened in, when it belongs to an anchored write.
    pub fn phase(&self) -> Option<AnchorPhase> {
        match self {
            MarketError::InvalidPayload(_) => Some(AnchorPhase::Encode),
            MarketError::SigningRejected { phase, .. }
            | MarketError::StorageUnavailable { phase, .. } => Some(*phase),
            MarketError::LedgerSubmissionFailed(_) => Some(AnchorPhase::Record),
            _ => None,
        }
    }

    /// Structured body for printing to a user or another program.
    pub fn to_body(&self) -> ErrorBody {
        let docs_hint = match self {
            MarketError::StorageUnavailable {
                phase: AnchorPhase::Upload | AnchorPhase::Certify,
                ..
            } => Some(
                "A storage reservation was registered but never certified. \
                 Re-run the whole action; the earlier reservation is abandoned."
                    .to_string(),
            ),
            MarketError::LedgerSubmissionFailed(_) => Some(
                "The payload was stored but is not referenced on-chain. \
                 Re-run the whole action."
                    .to_string(),
            ),
            MarketError::Configuration(_) => {
                Some("Check the AGENTMARKET_* environment variables.".to_string())
            }
            _ => None,
        };
        ErrorBody {
            error: self.code().to_string(),
            message: self.to_string(),
            phase: self.phase(),
            docs_hint,
        }
    }
}

impl From<crate::ledger::LedgerError> for MarketError {
    fn from(err: crate::ledger::LedgerError) -> Self {
        MarketError::LedgerUnavailable(err.to_string())
    }
}

impl From<CodecError> for MarketError {
    fn from(err: CodecError) -> Self {
        MarketError::InvalidPayload(err.to_string())
    }
}

/// Structured error output. Contains enough for a caller to decide whether to
/// re-initiate the action.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g. "signing_rejected")
    pub error: String,
    /// Human-readable description of what went wrong
    pub message: String,
    /// Write phase the failure occurred in (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<AnchorPhase>,
    /// Hint about what to do next
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
}

/// Error codes used across the SDK
pub mod codes {
    pub const INVALID_PAYLOAD: &str = "invalid_payload";
    pub const SIGNING_REJECTED: &str = "signing_rejected";
    pub const STORAGE_UNAVAILABLE: &str = "storage_unavailable";
    pub const LEDGER_SUBMISSION_FAILED: &str = "ledger_submission_failed";
    pub const RESOLUTION_FAILED: &str = "resolution_failed";
    pub const LEDGER_UNAVAILABLE: &str = "ledger_unavailable";
    pub const NOT_FOUND: &str = "not_found";
    pub const CONFIGURATION: &str = "configuration_error";
}

pub type Result<T> = std::result::Result<T, MarketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_failure_body_carries_orphan_hint() {
        let err = MarketError::StorageUnavailable {
            phase: AnchorPhase::Upload,
            message: "connection reset".to_string(),
        };
        let body = err.to_body();
        assert_eq!(body.error, codes::STORAGE_UNAVAILABLE);
        assert_eq!(body.phase, Some(AnchorPhase::Upload));
        assert!(body.docs_hint.is_some());
    }

    #[test]
    fn register_failure_has_no_orphan_hint() {
        let err = MarketError::StorageUnavailable {
            phase: AnchorPhase::Register,
            message: "timeout".to_string(),
        };
        assert!(err.to_body().docs_hint.is_none());
    }

    #[test]
    fn body_serializes_snake_case_phase() {
        let err = MarketError::SigningRejected {
            phase: AnchorPhase::Certify,
            reason: "declined".to_string(),
        };
        let json = serde_json::to_value(err.to_body()).unwrap();
        assert_eq!(json["phase"], "certify");
        assert_eq!(json["error"], "signing_rejected");
        assert!(json.get("docs_hint").is_none());
    }
}
