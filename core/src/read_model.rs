//! Read models: ledger objects and events turned into `Agent`, `Reputation`,
//! and validation views, with off-chain documents resolved where possible.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::codec;
use crate::config::Deployment;
use crate::digest::ContentDigest;
use crate::error::{MarketError, Result};
use crate::ledger::{
    Ledger, LedgerError, LedgerEvent, ViewCall, all_events, all_owned_objects, decode_fixed_le,
    json_str, json_u64,
};
use crate::model::{
    Agent, Endpoint, Extensions, Feedback, Reputation, ValidationRecord, ValidationRequest,
    ValidationResponse, ValidationStatus,
};
use crate::store::ContentStore;
use crate::uri;

/// Sender used for view calls when no caller address is known.
pub const ZERO_ADDRESS: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000000";

/// Which validation records to return. Empty matches everything.
#[derive(Debug, Clone, Default)]
pub struct ValidationFilter {
    pub agent_id: Option<u64>,
    pub validator: Option<String>,
}

#[derive(Clone)]
pub struct ReadModel {
    deployment: Deployment,
    ledger: Arc<dyn Ledger>,
    store: Arc<dyn ContentStore>,
}

impl ReadModel {
    pub fn new(
        deployment: Deployment,
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            deployment,
            ledger,
            store,
        }
    }

    /// Fetch and decode the document behind a `walrus://` pointer.
    pub async fn resolve<T: DeserializeOwned>(&self, pointer: &str) -> Result<T> {
        let failed = |message: String| MarketError::ResolutionFailed {
            uri: pointer.to_string(),
            message,
        };
        let id = uri::content_id(pointer)
            .ok_or_else(|| failed("not a walrus:// pointer".to_string()))?;
        let bytes = self.store.get(id).await.map_err(|e| failed(e.to_string()))?;
        codec::decode(&bytes).map_err(|e| failed(e.to_string()))
    }

    /// Build an `Agent` from on-chain fields. Metadata is resolved when the
    /// token URI is a `walrus://` pointer; if that fails the agent is returned
    /// without it.
    pub async fn hydrate_agent(&self, fields: &Value, owner: &str) -> Agent {
        let token_uri = json_str(fields, "token_uri").unwrap_or_default();
        let mut agent = Agent {
            id: object_id_field(fields).unwrap_or_default(),
            agent_id: json_u64(fields, "agent_id").unwrap_or_default(),
            owner: json_str(fields, "owner").unwrap_or_else(|| owner.to_string()),
            name: json_str(fields, "name").unwrap_or_default(),
            description: json_str(fields, "description").unwrap_or_default(),
            image: json_str(fields, "image").unwrap_or_default(),
            endpoints: endpoints_field(fields),
            token_uri,
            metadata: None,
        };

        if uri::content_id(&agent.token_uri).is_some() {
            match self.resolve(&agent.token_uri).await {
                Ok(metadata) => agent.metadata = Some(metadata),
                Err(e) => {
                    tracing::debug!(
                        event = "agent_metadata_unresolved",
                        agent_id = agent.agent_id,
                        token_uri = %agent.token_uri,
                        error = %e,
                        "Metadata unavailable; returning agent without it"
                    );
                }
            }
        }

        agent
    }

    /// Every agent `owner` currently holds, in ledger order.
    pub async fn list_owned_agents(&self, owner: &str) -> Result<Vec<Agent>> {
        let objects = all_owned_objects(
            self.ledger.as_ref(),
            owner,
            &self.deployment.agent_type(),
            self.deployment.page_size,
        )
        .await?;

        let agents = join_all(objects.iter().map(|o| {
            let holder = o.owner.as_deref().unwrap_or(owner);
            self.hydrate_agent(&o.fields, holder)
        }))
        .await;
        Ok(agents)
    }

    /// Every registered agent that is still held by the address it was
    /// registered to, in registration order.
    pub async fn list_all_agents(&self) -> Result<Vec<Agent>> {
        let events = self.registrations().await?;

        let mut seen = HashSet::new();
        let owners: Vec<String> = events
            .iter()
            .filter_map(registration_owner)
            .filter(|o| seen.insert(o.clone()))
            .collect();

        let owned = join_all(owners.iter().map(|o| self.list_owned_agents(o))).await;
        let mut by_owner: BTreeMap<&str, Vec<Agent>> = BTreeMap::new();
        for (owner, agents) in owners.iter().zip(owned) {
            by_owner.insert(owner.as_str(), agents?);
        }

        let mut out = Vec::new();
        for event in &events {
            let (Some(agent_id), Some(owner)) =
                (json_u64(&event.fields, "agent_id"), registration_owner(event))
            else {
                continue;
            };
            let found = by_owner
                .get(owner.as_str())
                .and_then(|agents| agents.iter().find(|a| a.agent_id == agent_id));
            match found {
                Some(agent) => out.push(agent.clone()),
                None => tracing::debug!(
                    event = "agent_no_longer_owned",
                    agent_id,
                    owner = %owner,
                    "Registered agent not held by its registrant; skipped"
                ),
            }
        }
        Ok(out)
    }

    /// One agent by numeric id.
    pub async fn get_agent(&self, agent_id: u64) -> Result<Agent> {
        let events = self.registrations().await?;
        let owner = events
            .iter()
            .find(|e| json_u64(&e.fields, "agent_id") == Some(agent_id))
            .and_then(registration_owner)
            .ok_or_else(|| MarketError::NotFound(format!("agent {agent_id}")))?;

        self.list_owned_agents(&owner)
            .await?
            .into_iter()
            .find(|a| a.agent_id == agent_id)
            .ok_or_else(|| MarketError::NotFound(format!("agent {agent_id} held by {owner}")))
    }

    /// Feedback count and average from the reputation registry's view
    /// function. Never fails: any error reads as no feedback, and is logged
    /// at warn so zeros from a failed call are not mistaken for live data.
    pub async fn resolve_reputation_summary(
        &self,
        agent_id: u64,
        caller: Option<&str>,
    ) -> Reputation {
        match self.reputation_summary(agent_id, caller).await {
            Ok((feedback_count, average_score)) => Reputation {
                feedback_count,
                average_score,
                feedbacks: Vec::new(),
            },
            Err(e) => {
                tracing::warn!(
                    event = "reputation_summary_fallback",
                    agent_id,
                    error = %e,
                    "Reputation summary unavailable; reporting zero"
                );
                Reputation::default()
            }
        }
    }

    async fn reputation_summary(
        &self,
        agent_id: u64,
        caller: Option<&str>,
    ) -> std::result::Result<(u64, u8), LedgerError> {
        let call = ViewCall::GetReputationSummary {
            registry: self.deployment.reputation_registry.clone(),
            agent_id,
        };
        let values = self
            .ledger
            .simulate(&call, caller.unwrap_or(ZERO_ADDRESS))
            .await?;
        let [count, average] = values.as_slice() else {
            return Err(LedgerError::Decode(format!(
                "expected 2 return values, got {}",
                values.len()
            )));
        };
        let count = u64::from_le_bytes(decode_fixed_le::<8>(count)?);
        let [average] = decode_fixed_le::<1>(average)?;
        Ok((count, average))
    }

    /// Every feedback record submitted for `agent_id`, oldest first.
    pub async fn list_feedback(&self, agent_id: u64) -> Result<Vec<Feedback>> {
        let events = all_events(
            self.ledger.as_ref(),
            &self.deployment.feedback_given_event(),
            self.deployment.page_size,
        )
        .await?;
        Ok(events
            .iter()
            .filter_map(parse_feedback)
            .filter(|f| f.agent_id == agent_id)
            .collect())
    }

    /// Summary plus the individual feedback records. A failed listing leaves
    /// `feedbacks` empty.
    pub async fn resolve_reputation(&self, agent_id: u64, caller: Option<&str>) -> Reputation {
        let mut reputation = self.resolve_reputation_summary(agent_id, caller).await;
        match self.list_feedback(agent_id).await {
            Ok(feedbacks) => reputation.feedbacks = feedbacks,
            Err(e) => tracing::debug!(
                event = "feedback_list_unavailable",
                agent_id,
                error = %e,
                "Feedback listing failed"
            ),
        }
        reputation
    }

    /// Validation requests joined with the latest response filed for each.
    pub async fn list_validations(&self, filter: &ValidationFilter) -> Result<Vec<ValidationRecord>> {
        let ledger = self.ledger.as_ref();
        let page_size = self.deployment.page_size;
        let requested = all_events(ledger, &self.deployment.validation_requested_event(), page_size)
            .await?;
        let responded = all_events(ledger, &self.deployment.validation_responded_event(), page_size)
            .await?;

        // Events arrive oldest first, so later inserts win.
        let mut latest: BTreeMap<String, ValidationResponse> = BTreeMap::new();
        for response in responded.iter().filter_map(parse_validation_response) {
            latest.insert(response.request_hash.to_hex(), response);
        }

        Ok(requested
            .iter()
            .filter_map(parse_validation_request)
            .filter(|r| filter.agent_id.is_none_or(|id| r.agent_id == id))
            .filter(|r| filter.validator.as_deref().is_none_or(|v| r.validator == v))
            .map(|request| {
                let key = request.key();
                ValidationRecord {
                    response: latest.get(&key).cloned(),
                    key,
                    request,
                }
            })
            .collect())
    }

    async fn registrations(&self) -> Result<Vec<LedgerEvent>> {
        Ok(all_events(
            self.ledger.as_ref(),
            &self.deployment.agent_registered_event(),
            self.deployment.page_size,
        )
        .await?)
    }
}

fn registration_owner(event: &LedgerEvent) -> Option<String> {
    json_str(&event.fields, "owner").or_else(|| Some(event.sender.clone()))
}

/// Object id as either a plain string or Sui's `{"id": "0x.."}` UID wrapper.
fn object_id_field(fields: &Value) -> Option<String> {
    match fields.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Object(uid) => uid.get("id")?.as_str().map(str::to_string),
        _ => None,
    }
}

/// Endpoints as plain objects or as Move structs wrapped in `{"fields": ..}`.
fn endpoints_field(fields: &Value) -> Vec<Endpoint> {
    let Some(Value::Array(items)) = fields.get("endpoints") else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let inner = item.get("fields").unwrap_or(item);
            Some(Endpoint {
                name: json_str(inner, "name")?,
                endpoint: json_str(inner, "endpoint")?,
                version: json_str(inner, "version").unwrap_or_default(),
                extensions: Extensions::new(),
            })
        })
        .collect()
}

fn parse_feedback(event: &LedgerEvent) -> Option<Feedback> {
    let f = &event.fields;
    Some(Feedback {
        agent_id: json_u64(f, "agent_id")?,
        score: u8::try_from(json_u64(f, "score")?).ok()?,
        client: json_str(f, "client").unwrap_or_else(|| event.sender.clone()),
        file_uri: json_str(f, "file_uri").unwrap_or_default(),
        file_hash: ContentDigest::from_json(f.get("file_hash")?)?,
        timestamp_ms: event.timestamp_ms,
    })
}

fn parse_validation_request(event: &LedgerEvent) -> Option<ValidationRequest> {
    let f = &event.fields;
    Some(ValidationRequest {
        agent_id: json_u64(f, "agent_id")?,
        validator: json_str(f, "validator")?,
        requester: json_str(f, "requester").unwrap_or_else(|| event.sender.clone()),
        request_uri: json_str(f, "request_uri").unwrap_or_default(),
        request_hash: ContentDigest::from_json(f.get("request_hash")?)?,
    })
}

fn parse_validation_response(event: &LedgerEvent) -> Option<ValidationResponse> {
    let f = &event.fields;
    let status = u8::try_from(json_u64(f, "response")?).ok()?;
    Some(ValidationResponse {
        request_hash: ContentDigest::from_json(f.get("request_hash")?)?,
        validator: json_str(f, "validator").unwrap_or_else(|| event.sender.clone()),
        response: ValidationStatus::try_from(status).ok()?,
        response_uri: json_str(f, "response_uri").unwrap_or_default(),
        response_hash: f
            .get("response_hash")
            .and_then(ContentDigest::from_json)
            .unwrap_or_else(|| ContentDigest::from_bytes([0; 32])),
        tag: json_str(f, "tag").unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::sandbox::SandboxNetwork;

    fn reader() -> (Arc<SandboxNetwork>, ReadModel) {
        let net = Arc::new(SandboxNetwork::new(Deployment::sandbox()));
        let reader = ReadModel::new(Deployment::sandbox(), net.clone(), net.clone());
        (net, reader)
    }

    #[tokio::test]
    async fn hydrate_renames_fields_one_to_one() {
        let (_net, reader) = reader();
        let fields = json!({
            "id": {"id": "0xabc"},
            "agent_id": "7",
            "name": "Bot",
            "description": "d",
            "image": "https://i/x.png",
            "token_uri": "https://example.com/meta.json",
            "endpoints": [{"type": "0x8004::identity_registry::Endpoint",
                           "fields": {"name": "MCP", "endpoint": "https://m", "version": "1"}}]
        });
        let agent = reader.hydrate_agent(&fields, "0xowner").await;
        assert_eq!(agent.id, "0xabc");
        assert_eq!(agent.agent_id, 7);
        assert_eq!(agent.owner, "0xowner");
        assert_eq!(agent.endpoints[0].name, "MCP");
        // Non-walrus token URIs are not fetched.
        assert!(agent.metadata.is_none());
    }

    #[tokio::test]
    async fn unresolvable_metadata_is_swallowed() {
        let (net, reader) = reader();
        let fields = json!({"id": "0x1", "agent_id": 1, "token_uri": "walrus://missing"});
        let agent = reader.hydrate_agent(&fields, "0xa").await;
        assert!(agent.metadata.is_none());
        assert_eq!(net.call_log(), vec!["get"]);
    }

    #[tokio::test]
    async fn summary_falls_back_to_zero() {
        let (net, reader) = reader();
        net.fail_simulation(true);
        let rep = reader.resolve_reputation_summary(3, None).await;
        assert_eq!(rep, Reputation::default());
    }

    #[tokio::test]
    async fn get_agent_reports_not_found() {
        let (_net, reader) = reader();
        let err = reader.get_agent(42).await.unwrap_err();
        assert!(matches!(err, MarketError::NotFound(_)));
    }

    #[test]
    fn response_parse_requires_known_status() {
        let event = LedgerEvent {
            event_type: "x".to_string(),
            sender: "0xv".to_string(),
            tx_digest: "d".to_string(),
            event_seq: 0,
            timestamp_ms: None,
            fields: json!({"request_hash": ContentDigest::of(b"r"), "response": 9}),
        };
        assert!(parse_validation_response(&event).is_none());
    }
}
