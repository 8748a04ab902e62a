//! In-process network: one object that plays both the ledger (with the three
//! registry modules and the storage system module) and the content store.
//!
//! It enforces what the real collaborators enforce: blobs must be registered,
//! uploaded, and certified in that order; only an agent's owner may edit it;
//! only the designated validator may respond. Fault switches let callers
//! simulate outages. State can be saved to and loaded from a JSON file.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::Deployment;
use crate::digest::ContentDigest;
use crate::ledger::{
    Ledger, LedgerError, LedgerEvent, LedgerObject, Page, Receipt, TransactionIntent, ViewCall,
};
use crate::model::{Endpoint, Extensions};
use crate::signer::SignedTransaction;
use crate::store::{
    BLOB_CERTIFIED_EVENT, BLOB_OBJECT_TYPE, ContentStore, RetentionOptions, SessionPhase,
    StoreError, WriteSession,
};

/// Package id of the simulated storage system module.
pub const STORAGE_PACKAGE: &str = "0x3a1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobStatus {
    Registered,
    Uploaded,
    Certified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BlobRecord {
    owner: String,
    size: u64,
    root_hash: ContentDigest,
    epochs: u32,
    deletable: bool,
    status: BlobStatus,
    /// Base64 of the uploaded bytes, held until certification
    #[serde(skip_serializing_if = "Option::is_none")]
    pending: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AgentRecord {
    agent_id: u64,
    owner: String,
    name: String,
    description: String,
    image: String,
    token_uri: String,
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FeedbackRecord {
    client: String,
    score: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ValidationEntry {
    agent_id: u64,
    validator: String,
    requester: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<u8>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SandboxState {
    tx_count: u64,
    next_agent_id: u64,
    /// Agent objects in creation order
    agents: Vec<(String, AgentRecord)>,
    blobs: BTreeMap<String, BlobRecord>,
    /// Certified blobs, base64 encoded, keyed by content id
    contents: BTreeMap<String, String>,
    feedback: BTreeMap<u64, Vec<FeedbackRecord>>,
    validations: BTreeMap<String, ValidationEntry>,
    events: Vec<LedgerEvent>,
}

#[derive(Debug, Default)]
struct Faults {
    uploads: bool,
    simulation: bool,
    entry_points: HashSet<String>,
    unreadable: HashSet<String>,
}

pub struct SandboxNetwork {
    deployment: Deployment,
    state: Mutex<SandboxState>,
    faults: Mutex<Faults>,
    calls: Mutex<Vec<String>>,
    uploads: Mutex<Vec<Vec<u8>>>,
}

impl SandboxNetwork {
    pub fn new(deployment: Deployment) -> Self {
        Self::with_state(deployment, SandboxState::default())
    }

    fn with_state(deployment: Deployment, state: SandboxState) -> Self {
        Self {
            deployment,
            state: Mutex::new(state),
            faults: Mutex::new(Faults::default()),
            calls: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    /// Load a snapshot written by `save`, or start empty if `path` does not
    /// exist yet.
    pub fn load(deployment: Deployment, path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::new(deployment));
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read sandbox state '{}': {e}", path.display()))?;
        let state: SandboxState = serde_json::from_str(&raw)
            .map_err(|e| format!("Invalid sandbox state in '{}': {e}", path.display()))?;
        Ok(Self::with_state(deployment, state))
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        let data = {
            let state = self.lock_state();
            serde_json::to_string_pretty(&*state)
                .map_err(|e| format!("Failed to serialize sandbox state: {e}"))?
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create '{}': {e}", parent.display()))?;
        }
        std::fs::write(path, data)
            .map_err(|e| format!("Failed to write sandbox state '{}': {e}", path.display()))
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    // ==================== Fault injection ====================

    pub fn fail_uploads(&self, fail: bool) {
        self.lock_faults().uploads = fail;
    }

    pub fn fail_simulation(&self, fail: bool) {
        self.lock_faults().simulation = fail;
    }

    /// Make every submission to `entry_point` (e.g. `"identity_registry::register"`)
    /// abort.
    pub fn fail_entry_point(&self, entry_point: &str) {
        self.lock_faults().entry_points.insert(entry_point.to_string());
    }

    /// Make reads of one content id fail with a network error.
    pub fn make_unreadable(&self, content_id: &str) {
        self.lock_faults().unreadable.insert(content_id.to_string());
    }

    /// Replace the stored bytes behind a content id.
    pub fn corrupt_content(&self, content_id: &str, bytes: &[u8]) {
        self.lock_state()
            .contents
            .insert(content_id.to_string(), STANDARD.encode(bytes));
    }

    // ==================== Inspection ====================

    /// Collaborator calls in order: `submit:<entry point>`, `upload`,
    /// `simulate`, `get`.
    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Bytes received by `upload`, in order.
    pub fn uploaded_payloads(&self) -> Vec<Vec<u8>> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }

    pub fn blob_statuses(&self) -> Vec<BlobStatus> {
        self.lock_state().blobs.values().map(|b| b.status).collect()
    }

    // ==================== Internals ====================

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SandboxState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_call(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn agent_type(&self) -> String {
        self.deployment.agent_type()
    }

    fn blob_type() -> String {
        format!("{STORAGE_PACKAGE}{BLOB_OBJECT_TYPE}")
    }

    fn execute(
        &self,
        state: &mut SandboxState,
        tx: &SignedTransaction,
    ) -> Result<(Vec<LedgerObject>, Vec<(String, serde_json::Value)>), LedgerError> {
        let d = &self.deployment;
        let sender = tx.sender.as_str();
        let mut created = Vec::new();
        let mut events = Vec::new();

        match &tx.intent {
            TransactionIntent::RegisterBlob {
                owner,
                size,
                root_hash,
                epochs,
                deletable,
            } => {
                if *epochs == 0 {
                    return Err(abort("storage must be reserved for at least one epoch"));
                }
                let id = random_object_id();
                state.blobs.insert(
                    id.clone(),
                    BlobRecord {
                        owner: owner.clone(),
                        size: *size,
                        root_hash: *root_hash,
                        epochs: *epochs,
                        deletable: *deletable,
                        status: BlobStatus::Registered,
                        pending: None,
                        content_id: None,
                    },
                );
                created.push(LedgerObject {
                    object_id: id.clone(),
                    type_name: Self::blob_type(),
                    owner: Some(owner.clone()),
                    fields: json!({"size": size.to_string(), "root_hash": root_hash, "certified": false}),
                });
                events.push((
                    format!("{STORAGE_PACKAGE}::events::BlobRegistered"),
                    json!({"object_id": id, "size": size.to_string(), "end_epoch": epochs}),
                ));
            }
            TransactionIntent::CertifyBlob { blob_object } => {
                let blob = state
                    .blobs
                    .get_mut(blob_object)
                    .ok_or_else(|| abort("unknown blob object"))?;
                if blob.status != BlobStatus::Uploaded {
                    return Err(abort("blob has not been uploaded"));
                }
                let pending = blob
                    .pending
                    .take()
                    .ok_or_else(|| abort("blob has no uploaded data"))?;
                let content_id = URL_SAFE_NO_PAD.encode(blob.root_hash.as_bytes());
                blob.status = BlobStatus::Certified;
                blob.content_id = Some(content_id.clone());
                state.contents.insert(content_id.clone(), pending);
                events.push((
                    format!("{STORAGE_PACKAGE}{BLOB_CERTIFIED_EVENT}"),
                    json!({"blob_id": content_id, "object_id": blob_object}),
                ));
            }
            TransactionIntent::RegisterAgent {
                registry,
                name,
                description,
                image,
                token_uri,
            } => {
                expect_registry(registry, &d.identity_registry)?;
                state.next_agent_id += 1;
                let agent_id = state.next_agent_id;
                let id = random_object_id();
                let record = AgentRecord {
                    agent_id,
                    owner: sender.to_string(),
                    name: name.clone(),
                    description: description.clone(),
                    image: image.clone(),
                    token_uri: token_uri.clone(),
                    endpoints: Vec::new(),
                };
                created.push(agent_object(&self.agent_type(), &id, &record));
                state.agents.push((id.clone(), record));
                events.push((
                    d.agent_registered_event(),
                    json!({
                        "agent_id": agent_id.to_string(),
                        "owner": sender,
                        "object_id": id,
                        "token_uri": token_uri,
                    }),
                ));
            }
            TransactionIntent::SetDescription { agent, value } => {
                let record = owned_agent(state, agent, sender)?;
                record.description = value.clone();
                events.push(agent_updated(d, record.agent_id, "description"));
            }
            TransactionIntent::SetImage { agent, value } => {
                let record = owned_agent(state, agent, sender)?;
                record.image = value.clone();
                events.push(agent_updated(d, record.agent_id, "image"));
            }
            TransactionIntent::SetTokenUri { agent, value } => {
                let record = owned_agent(state, agent, sender)?;
                record.token_uri = value.clone();
                events.push(agent_updated(d, record.agent_id, "token_uri"));
            }
            TransactionIntent::AddEndpoint { agent, endpoint } => {
                let record = owned_agent(state, agent, sender)?;
                record.endpoints.push(Endpoint {
                    extensions: Extensions::new(),
                    ..endpoint.clone()
                });
                events.push(agent_updated(d, record.agent_id, "endpoints"));
            }
            TransactionIntent::GiveFeedback {
                registry,
                agent_id,
                score,
                file_uri,
                file_hash,
            } => {
                expect_registry(registry, &d.reputation_registry)?;
                if *score > 100 {
                    return Err(abort("score must be between 0 and 100"));
                }
                if !state.agents.iter().any(|(_, a)| a.agent_id == *agent_id) {
                    return Err(abort("unknown agent id"));
                }
                state.feedback.entry(*agent_id).or_default().push(FeedbackRecord {
                    client: sender.to_string(),
                    score: *score,
                });
                events.push((
                    d.feedback_given_event(),
                    json!({
                        "agent_id": agent_id.to_string(),
                        "client": sender,
                        "score": score,
                        "file_uri": file_uri,
                        "file_hash": file_hash,
                    }),
                ));
            }
            TransactionIntent::RequestValidation {
                registry,
                agent,
                validator,
                request_uri,
                request_hash,
            } => {
                expect_registry(registry, &d.validation_registry)?;
                let agent_id = owned_agent(state, agent, sender)?.agent_id;
                let key = request_hash.to_hex();
                if state.validations.contains_key(&key) {
                    return Err(abort("validation request already exists"));
                }
                state.validations.insert(
                    key,
                    ValidationEntry {
                        agent_id,
                        validator: validator.clone(),
                        requester: sender.to_string(),
                        response: None,
                    },
                );
                events.push((
                    d.validation_requested_event(),
                    json!({
                        "agent_id": agent_id.to_string(),
                        "validator": validator,
                        "requester": sender,
                        "request_uri": request_uri,
                        "request_hash": request_hash,
                    }),
                ));
            }
            TransactionIntent::RespondValidation {
                registry,
                request_hash,
                response,
                response_uri,
                response_hash,
                tag,
            } => {
                expect_registry(registry, &d.validation_registry)?;
                let entry = state
                    .validations
                    .get_mut(&request_hash.to_hex())
                    .ok_or_else(|| abort("unknown validation request"))?;
                if entry.validator != sender {
                    return Err(abort("only the designated validator may respond"));
                }
                let status = u8::from(*response);
                entry.response = Some(status);
                events.push((
                    d.validation_responded_event(),
                    json!({
                        "request_hash": request_hash,
                        "validator": sender,
                        "response": status,
                        "response_uri": response_uri,
                        "response_hash": response_hash,
                        "tag": tag,
                    }),
                ));
            }
        }

        Ok((created, events))
    }
}

#[async_trait]
impl Ledger for SandboxNetwork {
    async fn submit(&self, tx: SignedTransaction) -> Result<Receipt, LedgerError> {
        let entry_point = tx.intent.entry_point();
        self.record_call(format!("submit:{entry_point}"));

        if tx.sender.is_empty() || tx.signature.is_empty() {
            return Err(LedgerError::Execution("transaction is not signed".to_string()));
        }
        if self.lock_faults().entry_points.contains(entry_point) {
            return Err(abort(&format!("{entry_point} aborted")));
        }

        let mut state = self.lock_state();
        let (created, raw_events) = self.execute(&mut state, &tx)?;

        state.tx_count += 1;
        let digest = tx_digest(state.tx_count, &tx.signature);
        let timestamp_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let events: Vec<LedgerEvent> = raw_events
            .into_iter()
            .enumerate()
            .map(|(seq, (event_type, fields))| LedgerEvent {
                event_type,
                sender: tx.sender.clone(),
                tx_digest: digest.clone(),
                event_seq: seq as u64,
                timestamp_ms: Some(timestamp_ms),
                fields,
            })
            .collect();
        state.events.extend(events.iter().cloned());

        tracing::debug!(event = "sandbox_tx_finalized", entry_point, tx_digest = %digest);

        Ok(Receipt {
            digest,
            created,
            events,
        })
    }

    async fn simulate(&self, call: &ViewCall, _sender: &str) -> Result<Vec<Vec<u8>>, LedgerError> {
        self.record_call("simulate".to_string());
        if self.lock_faults().simulation {
            return Err(LedgerError::Transport("simulation endpoint unavailable".to_string()));
        }
        match call {
            ViewCall::GetReputationSummary { registry, agent_id } => {
                expect_registry(registry, &self.deployment.reputation_registry)?;
                let state = self.lock_state();
                let records = state.feedback.get(agent_id).map(Vec::as_slice).unwrap_or(&[]);
                let count = records.len() as u64;
                let average = if count == 0 {
                    0
                } else {
                    let total: u64 = records.iter().map(|r| u64::from(r.score)).sum();
                    (total / count) as u8
                };
                Ok(vec![count.to_le_bytes().to_vec(), vec![average]])
            }
        }
    }

    async fn owned_objects(
        &self,
        owner: &str,
        struct_type: &str,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<Page<LedgerObject>, LedgerError> {
        let state = self.lock_state();
        let all: Vec<LedgerObject> = if struct_type == self.agent_type() {
            state
                .agents
                .iter()
                .filter(|(_, a)| a.owner == owner)
                .map(|(id, a)| agent_object(struct_type, id, a))
                .collect()
        } else {
            Vec::new()
        };
        paginate(all, cursor, limit)
    }

    async fn query_events(
        &self,
        event_type: &str,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<Page<LedgerEvent>, LedgerError> {
        let state = self.lock_state();
        let matching: Vec<LedgerEvent> = state
            .events
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect();
        paginate(matching, cursor, limit)
    }

    async fn get_object(&self, object_id: &str) -> Result<Option<LedgerObject>, LedgerError> {
        let state = self.lock_state();
        if let Some((id, a)) = state.agents.iter().find(|(id, _)| id == object_id) {
            return Ok(Some(agent_object(&self.agent_type(), id, a)));
        }
        Ok(state.blobs.get(object_id).map(|b| LedgerObject {
            object_id: object_id.to_string(),
            type_name: Self::blob_type(),
            owner: Some(b.owner.clone()),
            fields: json!({
                "size": b.size.to_string(),
                "root_hash": b.root_hash,
                "certified": b.status == BlobStatus::Certified,
                "deletable": b.deletable,
                "end_epoch": b.epochs,
            }),
        }))
    }
}

#[async_trait]
impl ContentStore for SandboxNetwork {
    fn register_intent(
        &self,
        session: &WriteSession,
        owner: &str,
        retention: RetentionOptions,
    ) -> Result<TransactionIntent, StoreError> {
        session.require(SessionPhase::Encoded)?;
        Ok(TransactionIntent::RegisterBlob {
            owner: owner.to_string(),
            size: session.size(),
            root_hash: session.root_hash(),
            epochs: retention.epochs,
            deletable: retention.deletable,
        })
    }

    async fn upload(
        &self,
        session: &mut WriteSession,
        registration: &Receipt,
    ) -> Result<(), StoreError> {
        session.require(SessionPhase::Encoded)?;
        let blob_object = registration
            .created_of_type(BLOB_OBJECT_TYPE)
            .map(|o| o.object_id.clone())
            .ok_or_else(|| {
                StoreError::InvalidReceipt("register receipt created no blob object".to_string())
            })?;

        self.record_call("upload".to_string());
        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.push(session.bytes().to_vec());
        }
        if self.lock_faults().uploads {
            return Err(StoreError::Network("storage nodes unreachable".to_string()));
        }

        {
            let mut state = self.lock_state();
            let blob = state.blobs.get_mut(&blob_object).ok_or_else(|| {
                StoreError::InvalidReceipt(format!("blob object {blob_object} is not registered"))
            })?;
            if blob.status != BlobStatus::Registered {
                return Err(StoreError::InvalidReceipt(format!(
                    "blob object {blob_object} is {:?}, not registered",
                    blob.status
                )));
            }
            if blob.root_hash != session.root_hash() || blob.size != session.size() {
                return Err(StoreError::InvalidReceipt(
                    "uploaded bytes do not match the reservation".to_string(),
                ));
            }
            blob.pending = Some(STANDARD.encode(session.bytes()));
            blob.status = BlobStatus::Uploaded;
        }

        session.mark_registered(blob_object)?;
        session.mark_uploaded()
    }

    fn certify_intent(&self, session: &WriteSession) -> Result<TransactionIntent, StoreError> {
        session.require(SessionPhase::Uploaded)?;
        let blob_object = session
            .blob_object()
            .ok_or_else(|| StoreError::InvalidReceipt("session has no blob object".to_string()))?;
        Ok(TransactionIntent::CertifyBlob {
            blob_object: blob_object.to_string(),
        })
    }

    async fn certified(
        &self,
        session: &mut WriteSession,
        certification: &Receipt,
    ) -> Result<String, StoreError> {
        let content_id = certification
            .event_of_type(BLOB_CERTIFIED_EVENT)
            .and_then(|e| e.fields.get("blob_id"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                StoreError::InvalidReceipt("certify receipt carries no blob id".to_string())
            })?;
        session.mark_certified(content_id.clone())?;
        Ok(content_id)
    }

    async fn get(&self, content_id: &str) -> Result<Vec<u8>, StoreError> {
        self.record_call("get".to_string());
        if self.lock_faults().unreadable.contains(content_id) {
            return Err(StoreError::Network(format!("aggregator timed out for {content_id}")));
        }
        let encoded = self
            .lock_state()
            .contents
            .get(content_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(content_id.to_string()))?;
        STANDARD
            .decode(encoded)
            .map_err(|e| StoreError::Network(format!("stored blob is not valid base64: {e}")))
    }
}

fn abort(reason: &str) -> LedgerError {
    LedgerError::Execution(format!("MoveAbort: {reason}"))
}

fn expect_registry(given: &str, expected: &str) -> Result<(), LedgerError> {
    if given == expected {
        Ok(())
    } else {
        Err(abort(&format!("wrong registry object {given}")))
    }
}

fn owned_agent<'a>(
    state: &'a mut SandboxState,
    object_id: &str,
    sender: &str,
) -> Result<&'a mut AgentRecord, LedgerError> {
    let (_, record) = state
        .agents
        .iter_mut()
        .find(|(id, _)| id == object_id)
        .ok_or_else(|| abort("unknown agent object"))?;
    if record.owner != sender {
        return Err(abort("sender does not own the agent"));
    }
    Ok(record)
}

fn agent_updated(d: &Deployment, agent_id: u64, field: &str) -> (String, serde_json::Value) {
    (
        format!("{}::identity_registry::AgentUpdated", d.package_id),
        json!({"agent_id": agent_id.to_string(), "field": field}),
    )
}

fn agent_object(type_name: &str, id: &str, a: &AgentRecord) -> LedgerObject {
    LedgerObject {
        object_id: id.to_string(),
        type_name: type_name.to_string(),
        owner: Some(a.owner.clone()),
        fields: json!({
            "id": id,
            "agent_id": a.agent_id.to_string(),
            "owner": a.owner,
            "name": a.name,
            "description": a.description,
            "image": a.image,
            "token_uri": a.token_uri,
            "endpoints": a.endpoints,
        }),
    }
}

fn paginate<T>(items: Vec<T>, cursor: Option<String>, limit: usize) -> Result<Page<T>, LedgerError> {
    let start = match cursor {
        Some(c) => c
            .parse::<usize>()
            .map_err(|_| LedgerError::Decode(format!("invalid cursor '{c}'")))?,
        None => 0,
    };
    let limit = limit.max(1);
    let total = items.len();
    let data: Vec<T> = items.into_iter().skip(start).take(limit).collect();
    let end = start + data.len();
    let has_next_page = end < total;
    Ok(Page {
        data,
        next_cursor: has_next_page.then(|| end.to_string()),
        has_next_page,
    })
}

fn random_object_id() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    format!("0x{}", hex::encode(bytes))
}

fn tx_digest(seq: u64, signature: &str) -> String {
    let mut material = seq.to_le_bytes().to_vec();
    material.extend_from_slice(signature.as_bytes());
    URL_SAFE_NO_PAD.encode(ContentDigest::of(&material).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{Signer, StaticSigner};

    async fn register(net: &SandboxNetwork, signer: &StaticSigner, name: &str) -> Receipt {
        let intent = TransactionIntent::RegisterAgent {
            registry: net.deployment().identity_registry.clone(),
            name: name.to_string(),
            description: "d".to_string(),
            image: String::new(),
            token_uri: String::new(),
        };
        net.submit(signer.sign(&intent).await.unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn agent_ids_increase() {
        let net = SandboxNetwork::new(Deployment::sandbox());
        let signer = StaticSigner::new("0xa");
        let first = register(&net, &signer, "one").await;
        let second = register(&net, &signer, "two").await;
        let id = |r: &Receipt| r.events[0].fields["agent_id"].as_str().unwrap().to_string();
        assert_eq!(id(&first), "1");
        assert_eq!(id(&second), "2");
    }

    #[tokio::test]
    async fn only_owner_may_edit() {
        let net = SandboxNetwork::new(Deployment::sandbox());
        let owner = StaticSigner::new("0xa");
        let stranger = StaticSigner::new("0xb");
        let receipt = register(&net, &owner, "mine").await;
        let agent = receipt.created[0].object_id.clone();

        let intent = TransactionIntent::SetImage {
            agent: agent.clone(),
            value: "https://evil".to_string(),
        };
        let err = net
            .submit(stranger.sign(&intent).await.unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Execution(_)));

        net.submit(owner.sign(&intent).await.unwrap()).await.unwrap();
        let obj = net.get_object(&agent).await.unwrap().unwrap();
        assert_eq!(obj.fields["image"], "https://evil");
    }

    #[tokio::test]
    async fn certify_before_upload_aborts() {
        let net = SandboxNetwork::new(Deployment::sandbox());
        let signer = StaticSigner::new("0xa");
        let session = WriteSession::new(b"{}".to_vec());
        let reg = net
            .register_intent(&session, "0xa", RetentionOptions::epochs(1))
            .unwrap();
        let receipt = net.submit(signer.sign(&reg).await.unwrap()).await.unwrap();
        let blob_object = receipt.created[0].object_id.clone();

        let certify = TransactionIntent::CertifyBlob { blob_object };
        let err = net
            .submit(signer.sign(&certify).await.unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not been uploaded"));
    }

    #[tokio::test]
    async fn pagination_walks_every_page() {
        let net = SandboxNetwork::new(Deployment::sandbox());
        let signer = StaticSigner::new("0xa");
        for i in 0..5 {
            register(&net, &signer, &format!("a{i}")).await;
        }
        let event_type = net.deployment().agent_registered_event();
        let first = net.query_events(&event_type, None, 2).await.unwrap();
        assert_eq!(first.data.len(), 2);
        assert!(first.has_next_page);
        let second = net
            .query_events(&event_type, first.next_cursor, 2)
            .await
            .unwrap();
        let third = net
            .query_events(&event_type, second.next_cursor, 2)
            .await
            .unwrap();
        assert_eq!(third.data.len(), 1);
        assert!(!third.has_next_page);
        assert_eq!(third.next_cursor, None);
    }

    #[tokio::test]
    async fn state_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sandbox.json");

        let net = SandboxNetwork::new(Deployment::sandbox());
        let signer = StaticSigner::new("0xa");
        register(&net, &signer, "persisted").await;
        net.save(&path).unwrap();

        let reloaded = SandboxNetwork::load(Deployment::sandbox(), &path).unwrap();
        let agents = reloaded
            .owned_objects("0xa", &Deployment::sandbox().agent_type(), None, 10)
            .await
            .unwrap();
        assert_eq!(agents.data.len(), 1);
        assert_eq!(agents.data[0].fields["name"], "persisted");

        let next = register(&reloaded, &signer, "next").await;
        assert_eq!(next.events[0].fields["agent_id"], "2");
    }

    #[tokio::test]
    async fn summary_is_fixed_width() {
        let net = SandboxNetwork::new(Deployment::sandbox());
        let call = ViewCall::GetReputationSummary {
            registry: net.deployment().reputation_registry.clone(),
            agent_id: 1,
        };
        let values = net.simulate(&call, "0x0").await.unwrap();
        assert_eq!(values, vec![vec![0u8; 8], vec![0u8]]);
    }
}
