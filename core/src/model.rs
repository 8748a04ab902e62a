use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::ContentDigest;
use crate::error::MarketError;

/// Type tag written into every agent metadata document.
pub const AGENT_METADATA_TYPE: &str = "https://eips.ethereum.org/EIPS/eip-8004#registration-v1";

/// Open extension fields of an off-chain document. Keys not in the known
/// schema land here on decode and are written back on encode.
pub type Extensions = BTreeMap<String, serde_json::Value>;

/// Agent identity record: on-chain fields plus the resolved off-chain metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// On-chain object id
    pub id: String,
    /// Numeric id assigned by the identity registry at registration
    pub agent_id: u64,
    /// Current owner address
    pub owner: String,
    pub name: String,
    pub description: String,
    pub image: String,
    /// Pointer to the off-chain metadata document
    pub token_uri: String,
    /// Append-only list of service endpoints
    pub endpoints: Vec<Endpoint>,
    /// Decoded document behind `token_uri`. Absent until fetched, and absent
    /// when fetching failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AgentMetadata>,
}

/// Service endpoint. On-chain records carry only the three named fields;
/// off-chain documents may add more.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    pub endpoint: String,
    /// Empty when the document omits it
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(flatten)]
    pub extensions: Extensions,
}

/// Off-chain agent registration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMetadata {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Vec<Endpoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrations: Option<Vec<Registration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_trust: Option<Vec<String>>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

/// Where an agent is registered: id plus registry identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_registry: Option<String>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

/// Input for registering a new agent. Field-level validation lives here, not
/// in the codec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDraft {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub supported_trust: Vec<String>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

impl AgentDraft {
    pub fn validate(&self) -> Result<(), MarketError> {
        if self.name.trim().is_empty() {
            return Err(MarketError::InvalidPayload("name is required".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(MarketError::InvalidPayload(
                "description is required".to_string(),
            ));
        }
        for ep in &self.endpoints {
            if ep.name.trim().is_empty() || ep.endpoint.trim().is_empty() {
                return Err(MarketError::InvalidPayload(
                    "endpoint name and address are required".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn to_metadata(&self) -> AgentMetadata {
        AgentMetadata {
            type_tag: Some(AGENT_METADATA_TYPE.to_string()),
            name: Some(self.name.clone()),
            description: Some(self.description.clone()),
            image: Some(self.image.clone()),
            endpoints: Some(self.endpoints.clone()),
            registrations: Some(Vec::new()),
            supported_trust: Some(self.supported_trust.clone()),
            extensions: self.extensions.clone(),
        }
    }
}

/// Live reputation numbers for one agent. Never cached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reputation {
    pub feedback_count: u64,
    /// 0-100
    pub average_score: u8,
    pub feedbacks: Vec<Feedback>,
}

/// One submitted feedback record. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub agent_id: u64,
    /// 0-100
    pub score: u8,
    /// Submitter address
    pub client: String,
    pub file_uri: String,
    pub file_hash: ContentDigest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<u64>,
}

/// Off-chain feedback document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackContent {
    pub agent_id: u64,
    pub score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

/// Validator verdict. `Pending` is a real status, not the absence of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ValidationStatus {
    Rejected,
    Approved,
    Pending,
}

impl TryFrom<u8> for ValidationStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ValidationStatus::Rejected),
            1 => Ok(ValidationStatus::Approved),
            2 => Ok(ValidationStatus::Pending),
            other => Err(format!("Unknown validation status {other}")),
        }
    }
}

impl From<ValidationStatus> for u8 {
    fn from(status: ValidationStatus) -> Self {
        match status {
            ValidationStatus::Rejected => 0,
            ValidationStatus::Approved => 1,
            ValidationStatus::Pending => 2,
        }
    }
}

impl std::str::FromStr for ValidationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rejected" | "0" => Ok(ValidationStatus::Rejected),
            "approved" | "1" => Ok(ValidationStatus::Approved),
            "pending" | "2" => Ok(ValidationStatus::Pending),
            other => Err(format!(
                "Unknown validation status '{other}' (expected rejected, approved, or pending)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    pub agent_id: u64,
    /// Address designated to respond
    pub validator: String,
    pub requester: String,
    pub request_uri: String,
    pub request_hash: ContentDigest,
}

impl ValidationRequest {
    /// Canonical key for per-request state: the hex-encoded request digest.
    pub fn key(&self) -> String {
        self.request_hash.to_hex()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub request_hash: ContentDigest,
    pub validator: String,
    pub response: ValidationStatus,
    pub response_uri: String,
    pub response_hash: ContentDigest,
    pub tag: String,
}

/// A request joined with the latest response recorded for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRecord {
    pub key: String,
    pub request: ValidationRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ValidationResponse>,
}

/// Off-chain validation request document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequestContent {
    pub agent_id: u64,
    pub validator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

/// Off-chain validation response document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponseContent {
    pub request_hash: ContentDigest,
    pub response: ValidationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn draft_requires_name_and_description() {
        let mut draft = AgentDraft {
            name: "Bot".to_string(),
            description: " ".to_string(),
            ..Default::default()
        };
        assert!(matches!(draft.validate(), Err(MarketError::InvalidPayload(_))));
        draft.description = "x".to_string();
        assert!(draft.validate().is_ok());
        draft.name.clear();
        assert!(draft.validate().is_err());
    }

    #[test]
    fn draft_metadata_carries_type_tag() {
        let draft = AgentDraft {
            name: "Bot".to_string(),
            description: "x".to_string(),
            image: "https://i/x.png".to_string(),
            ..Default::default()
        };
        let meta = draft.to_metadata();
        assert_eq!(meta.type_tag.as_deref(), Some(AGENT_METADATA_TYPE));
        assert_eq!(meta.name.as_deref(), Some("Bot"));
        assert_eq!(meta.endpoints, Some(Vec::new()));
    }

    #[test]
    fn validation_status_wire_values() {
        assert_eq!(serde_json::to_value(ValidationStatus::Pending).unwrap(), json!(2));
        let s: ValidationStatus = serde_json::from_value(json!(0)).unwrap();
        assert_eq!(s, ValidationStatus::Rejected);
        assert!(serde_json::from_value::<ValidationStatus>(json!(3)).is_err());
        assert_eq!("approved".parse::<ValidationStatus>(), Ok(ValidationStatus::Approved));
    }

    #[test]
    fn agent_view_omits_missing_metadata() {
        let agent = Agent {
            id: "0x1".to_string(),
            agent_id: 1,
            owner: "0xa".to_string(),
            name: "n".to_string(),
            description: "d".to_string(),
            image: String::new(),
            token_uri: String::new(),
            endpoints: Vec::new(),
            metadata: None,
        };
        let v = serde_json::to_value(&agent).unwrap();
        assert!(v.get("metadata").is_none());
        assert_eq!(v["agentId"], 1);
        assert_eq!(v["tokenUri"], "");
    }
}
