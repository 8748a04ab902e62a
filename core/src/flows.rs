//! Marketplace write flows: each one anchors its off-chain document and then
//! records the pointer and digest through the matching registry call.

use std::sync::Arc;

use serde::Serialize;

use crate::config::Deployment;
use crate::digest::ContentDigest;
use crate::error::{AnchorPhase, MarketError, Result};
use crate::ledger::{Ledger, Receipt, TransactionIntent, json_u64};
use crate::model::{
    AgentDraft, AgentMetadata, Endpoint, FeedbackContent, ValidationRequestContent,
    ValidationResponseContent, ValidationStatus,
};
use crate::orchestrator::{AnchorWriter, AnchoredRecord};
use crate::read_model::ReadModel;
use crate::signer::Signer;
use crate::store::{ContentStore, RetentionOptions};

const MAX_SCORE: u8 = 100;

/// Result of `register_agent`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredAgent {
    /// On-chain object id of the new agent
    pub object_id: String,
    pub agent_id: u64,
    pub token_uri: String,
    pub metadata_hash: ContentDigest,
    pub tx_digest: String,
}

/// Result of `request_validation`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedValidation {
    /// Hex-encoded request digest; identifies the request from now on
    pub key: String,
    pub request_uri: String,
    pub tx_digest: String,
}

/// Entry point for every signed operation against one deployment.
#[derive(Clone)]
pub struct Marketplace {
    deployment: Deployment,
    writer: AnchorWriter,
}

impl Marketplace {
    pub fn new(
        deployment: Deployment,
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            deployment,
            writer: AnchorWriter::new(ledger, store),
        }
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    pub fn writer(&self) -> &AnchorWriter {
        &self.writer
    }

    /// Read model over the same collaborators.
    pub fn reader(&self) -> ReadModel {
        ReadModel::new(
            self.deployment.clone(),
            self.writer.ledger().clone(),
            self.writer.store().clone(),
        )
    }

    fn retention(&self) -> RetentionOptions {
        RetentionOptions::epochs(self.deployment.storage_epochs)
    }

    /// Numeric id carried by the agent object `agent`.
    async fn agent_id_of(&self, agent: &str) -> Result<u64> {
        let object = self
            .writer
            .ledger()
            .get_object(agent)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("agent object {agent}")))?;
        json_u64(&object.fields, "agent_id").ok_or_else(|| {
            MarketError::InvalidPayload(format!("{agent} is not an agent object"))
        })
    }

    // ==================== Identity ====================

    pub async fn register_agent(
        &self,
        draft: &AgentDraft,
        signer: &dyn Signer,
    ) -> Result<RegisteredAgent> {
        draft.validate()?;
        let metadata = draft.to_metadata();
        let registry = self.deployment.identity_registry.clone();

        let record = self
            .writer
            .anchor_and_record(&metadata, signer.address(), signer, self.retention(), |uri, _| {
                TransactionIntent::RegisterAgent {
                    registry,
                    name: draft.name.clone(),
                    description: draft.description.clone(),
                    image: draft.image.clone(),
                    token_uri: uri.to_string(),
                }
            })
            .await?;

        let object_id = record
            .receipt
            .created_of_type("::identity_registry::Agent")
            .map(|o| o.object_id.clone())
            .ok_or_else(|| malformed_receipt(&record.receipt, "no agent object created"))?;
        let agent_id = record
            .receipt
            .event_of_type("::identity_registry::AgentRegistered")
            .and_then(|e| json_u64(&e.fields, "agent_id"))
            .ok_or_else(|| malformed_receipt(&record.receipt, "no AgentRegistered event"))?;

        tracing::info!(
            event = "agent_registered",
            agent_id,
            object_id = %object_id,
            owner = %signer.address(),
            "Agent registered"
        );

        Ok(RegisteredAgent {
            object_id,
            agent_id,
            token_uri: record.anchored.uri,
            metadata_hash: record.anchored.digest,
            tx_digest: record.receipt.digest,
        })
    }

    /// Anchor a new metadata document and point the agent at it. The previous
    /// blob is left in place.
    pub async fn update_metadata(
        &self,
        agent: &str,
        metadata: &AgentMetadata,
        signer: &dyn Signer,
    ) -> Result<AnchoredRecord> {
        let record = self
            .writer
            .anchor_and_record(metadata, signer.address(), signer, self.retention(), |uri, _| {
                TransactionIntent::SetTokenUri {
                    agent: agent.to_string(),
                    value: uri.to_string(),
                }
            })
            .await?;

        tracing::info!(
            event = "agent_metadata_updated",
            agent = %agent,
            token_uri = %record.anchored.uri,
            "Agent metadata updated"
        );
        Ok(record)
    }

    pub async fn set_description(
        &self,
        agent: &str,
        description: &str,
        signer: &dyn Signer,
    ) -> Result<Receipt> {
        let intent = TransactionIntent::SetDescription {
            agent: agent.to_string(),
            value: description.to_string(),
        };
        self.writer
            .sign_and_submit(intent, signer, AnchorPhase::Record)
            .await
    }

    pub async fn set_image(&self, agent: &str, image: &str, signer: &dyn Signer) -> Result<Receipt> {
        let intent = TransactionIntent::SetImage {
            agent: agent.to_string(),
            value: image.to_string(),
        };
        self.writer
            .sign_and_submit(intent, signer, AnchorPhase::Record)
            .await
    }

    /// Append an endpoint. Endpoints cannot be removed or reordered.
    pub async fn add_endpoint(
        &self,
        agent: &str,
        endpoint: Endpoint,
        signer: &dyn Signer,
    ) -> Result<Receipt> {
        if endpoint.name.trim().is_empty() || endpoint.endpoint.trim().is_empty() {
            return Err(MarketError::InvalidPayload(
                "endpoint name and address are required".to_string(),
            ));
        }
        let intent = TransactionIntent::AddEndpoint {
            agent: agent.to_string(),
            endpoint,
        };
        self.writer
            .sign_and_submit(intent, signer, AnchorPhase::Record)
            .await
    }

    // ==================== Reputation ====================

    /// Submit feedback for `agent_id`. The on-chain score and the document's
    /// `score` and `agentId` always agree.
    pub async fn give_feedback(
        &self,
        agent_id: u64,
        score: u8,
        mut content: FeedbackContent,
        signer: &dyn Signer,
    ) -> Result<AnchoredRecord> {
        if score > MAX_SCORE {
            return Err(MarketError::InvalidPayload(format!(
                "score must be between 0 and {MAX_SCORE}, got {score}"
            )));
        }
        content.agent_id = agent_id;
        content.score = score;
        let registry = self.deployment.reputation_registry.clone();

        let record = self
            .writer
            .anchor_and_record(&content, signer.address(), signer, self.retention(), |uri, hash| {
                TransactionIntent::GiveFeedback {
                    registry,
                    agent_id,
                    score,
                    file_uri: uri.to_string(),
                    file_hash: hash,
                }
            })
            .await?;

        tracing::info!(
            event = "feedback_given",
            agent_id,
            score,
            client = %signer.address(),
            "Feedback recorded"
        );
        Ok(record)
    }

    // ==================== Validation ====================

    /// Ask `validator` to validate the agent object `agent`. Returns the
    /// request key responses are filed under. The stored document names the
    /// agent id the object carries on-chain, whatever `content` said.
    pub async fn request_validation(
        &self,
        agent: &str,
        validator: &str,
        mut content: ValidationRequestContent,
        signer: &dyn Signer,
    ) -> Result<RequestedValidation> {
        if validator.trim().is_empty() {
            return Err(MarketError::InvalidPayload("validator is required".to_string()));
        }
        content.validator = validator.to_string();
        content.agent_id = self.agent_id_of(agent).await?;
        let registry = self.deployment.validation_registry.clone();

        let record = self
            .writer
            .anchor_and_record(&content, signer.address(), signer, self.retention(), |uri, hash| {
                TransactionIntent::RequestValidation {
                    registry,
                    agent: agent.to_string(),
                    validator: validator.to_string(),
                    request_uri: uri.to_string(),
                    request_hash: hash,
                }
            })
            .await?;

        let key = record.anchored.digest.to_hex();
        tracing::info!(
            event = "validation_requested",
            key = %key,
            agent = %agent,
            validator = %validator,
            "Validation requested"
        );

        Ok(RequestedValidation {
            key,
            request_uri: record.anchored.uri,
            tx_digest: record.receipt.digest,
        })
    }

    /// File a response to a validation request. Only the designated validator
    /// can do this; a later response replaces an earlier one.
    pub async fn respond_validation(
        &self,
        request_hash: ContentDigest,
        status: ValidationStatus,
        mut content: ValidationResponseContent,
        tag: &str,
        signer: &dyn Signer,
    ) -> Result<AnchoredRecord> {
        content.request_hash = request_hash;
        content.response = status;
        let registry = self.deployment.validation_registry.clone();

        let record = self
            .writer
            .anchor_and_record(&content, signer.address(), signer, self.retention(), |uri, hash| {
                TransactionIntent::RespondValidation {
                    registry,
                    request_hash,
                    response: status,
                    response_uri: uri.to_string(),
                    response_hash: hash,
                    tag: tag.to_string(),
                }
            })
            .await?;

        tracing::info!(
            event = "validation_responded",
            key = %request_hash.to_hex(),
            response = u8::from(status),
            "Validation response recorded"
        );
        Ok(record)
    }
}

fn malformed_receipt(receipt: &Receipt, what: &str) -> MarketError {
    MarketError::LedgerSubmissionFailed(format!(
        "transaction {} finalized but its receipt has {what}",
        receipt.digest
    ))
}
