//! Read-only ledger over Sui JSON-RPC.
//!
//! Covers the queries the read models need, and view calls through
//! `sui_devInspectTransactionBlock`. Submitting transactions requires a
//! wallet and is reported as unsupported.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::ledger::{
    Ledger, LedgerError, LedgerEvent, LedgerObject, Page, Receipt, ViewCall, json_u64,
};
use crate::signer::SignedTransaction;

const TIMEOUT_SECS: u64 = 30;

pub struct SuiRpcLedger {
    url: String,
    /// Package that defines the registry modules view calls target
    package_id: String,
    client: Client,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcPage<T> {
    data: Vec<T>,
    next_cursor: Option<Value>,
    #[serde(default)]
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
struct ObjectResponse {
    data: Option<ObjectData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectData {
    object_id: String,
    #[serde(rename = "type")]
    type_name: Option<String>,
    owner: Option<Value>,
    content: Option<MoveContent>,
}

#[derive(Debug, Deserialize)]
struct MoveContent {
    #[serde(rename = "type")]
    type_name: Option<String>,
    #[serde(default)]
    fields: Value,
}

#[derive(Debug, Deserialize)]
struct DevInspectResults {
    #[serde(default)]
    results: Option<Vec<ExecutionResult>>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecutionResult {
    /// `(bcs bytes, move type)` per return value
    #[serde(default)]
    return_values: Vec<(Vec<u8>, String)>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventId {
    tx_digest: String,
    event_seq: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventData {
    id: EventId,
    sender: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    parsed_json: Value,
    timestamp_ms: Option<String>,
}

impl SuiRpcLedger {
    pub fn new(url: impl Into<String>, package_id: impl Into<String>) -> Result<Self, LedgerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            package_id: package_id.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(LedgerError::Transport(format!("{method} returned {status}: {text}")));
        }

        let envelope: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| LedgerError::Decode(format!("{method}: {e}")))?;

        if let Some(err) = envelope.error {
            return Err(LedgerError::Execution(format!(
                "{method} failed ({}): {}",
                err.code, err.message
            )));
        }
        envelope
            .result
            .ok_or_else(|| LedgerError::Decode(format!("{method}: response has no result")))
    }

    /// Version at which a shared object became shared; needed to pass it as
    /// a transaction input.
    async fn initial_shared_version(&self, object_id: &str) -> Result<u64, LedgerError> {
        let response: ObjectResponse = self
            .call("sui_getObject", json!([object_id, {"showOwner": true}]))
            .await?;
        response
            .data
            .and_then(|d| d.owner)
            .as_ref()
            .and_then(|owner| owner.get("Shared"))
            .and_then(|shared| json_u64(shared, "initial_shared_version"))
            .ok_or_else(|| LedgerError::Decode(format!("{object_id} is not a shared object")))
    }
}

#[async_trait]
impl Ledger for SuiRpcLedger {
    async fn submit(&self, _tx: SignedTransaction) -> Result<Receipt, LedgerError> {
        Err(LedgerError::Unsupported(
            "transaction submission requires a wallet; use the sandbox network for writes"
                .to_string(),
        ))
    }

    async fn simulate(&self, call: &ViewCall, sender: &str) -> Result<Vec<Vec<u8>>, LedgerError> {
        let (module, function) = call.target();
        let kind = match call {
            ViewCall::GetReputationSummary { registry, agent_id } => {
                let version = self.initial_shared_version(registry).await?;
                move_call_kind(
                    &parse_address(&self.package_id)?,
                    module,
                    function,
                    &[
                        CallArg::SharedObject {
                            id: parse_address(registry)?,
                            initial_shared_version: version,
                        },
                        CallArg::Pure(agent_id.to_le_bytes().to_vec()),
                    ],
                )
            }
        };

        let inspected: DevInspectResults = self
            .call(
                "sui_devInspectTransactionBlock",
                json!([sender, STANDARD.encode(kind), null, null]),
            )
            .await?;
        if let Some(error) = inspected.error {
            return Err(LedgerError::Execution(format!("{module}::{function}: {error}")));
        }
        let result = inspected
            .results
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| LedgerError::Decode(format!("{module}::{function} returned nothing")))?;
        Ok(result
            .return_values
            .into_iter()
            .map(|(bytes, _)| bytes)
            .collect())
    }

    async fn owned_objects(
        &self,
        owner: &str,
        struct_type: &str,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<Page<LedgerObject>, LedgerError> {
        let query = json!({
            "filter": {"StructType": struct_type},
            "options": {"showType": true, "showOwner": true, "showContent": true}
        });
        let page: RpcPage<ObjectResponse> = self
            .call(
                "suix_getOwnedObjects",
                json!([owner, query, decode_cursor(cursor), limit]),
            )
            .await?;

        Ok(Page {
            data: page
                .data
                .into_iter()
                .filter_map(|r| r.data.map(to_ledger_object))
                .collect(),
            next_cursor: page.next_cursor.and_then(encode_cursor),
            has_next_page: page.has_next_page,
        })
    }

    async fn query_events(
        &self,
        event_type: &str,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<Page<LedgerEvent>, LedgerError> {
        let page: RpcPage<EventData> = self
            .call(
                "suix_queryEvents",
                json!([{"MoveEventType": event_type}, decode_cursor(cursor), limit, false]),
            )
            .await?;

        let data = page
            .data
            .into_iter()
            .map(|e| LedgerEvent {
                event_seq: e.id.event_seq.parse().unwrap_or_default(),
                event_type: e.type_name,
                sender: e.sender,
                tx_digest: e.id.tx_digest,
                timestamp_ms: e.timestamp_ms.and_then(|t| t.parse().ok()),
                fields: e.parsed_json,
            })
            .collect();

        Ok(Page {
            data,
            next_cursor: page.next_cursor.and_then(encode_cursor),
            has_next_page: page.has_next_page,
        })
    }

    async fn get_object(&self, object_id: &str) -> Result<Option<LedgerObject>, LedgerError> {
        let response: ObjectResponse = self
            .call(
                "sui_getObject",
                json!([object_id, {"showType": true, "showOwner": true, "showContent": true}]),
            )
            .await?;
        Ok(response.data.map(to_ledger_object))
    }
}

/// Transaction input for a view call. Shared objects are passed immutably.
enum CallArg {
    Pure(Vec<u8>),
    SharedObject { id: [u8; 32], initial_shared_version: u64 },
}

/// BCS `TransactionKind::ProgrammableTransaction` holding a single move call
/// `package::module::function(inputs..)` with no type arguments.
fn move_call_kind(package: &[u8; 32], module: &str, function: &str, inputs: &[CallArg]) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(0); // ProgrammableTransaction
    uleb128(&mut out, inputs.len());
    for input in inputs {
        match input {
            CallArg::Pure(bytes) => {
                out.push(0);
                uleb128(&mut out, bytes.len());
                out.extend_from_slice(bytes);
            }
            CallArg::SharedObject {
                id,
                initial_shared_version,
            } => {
                out.push(1); // CallArg::Object
                out.push(1); // ObjectArg::SharedObject
                out.extend_from_slice(id);
                out.extend_from_slice(&initial_shared_version.to_le_bytes());
                out.push(0); // mutable: false
            }
        }
    }
    uleb128(&mut out, 1);
    out.push(0); // Command::MoveCall
    out.extend_from_slice(package);
    for ident in [module, function] {
        uleb128(&mut out, ident.len());
        out.extend_from_slice(ident.as_bytes());
    }
    uleb128(&mut out, 0);
    uleb128(&mut out, inputs.len());
    for index in 0..inputs.len() as u16 {
        out.push(1); // Argument::Input
        out.extend_from_slice(&index.to_le_bytes());
    }
    out
}

fn uleb128(out: &mut Vec<u8>, mut n: usize) {
    loop {
        let byte = (n & 0x7f) as u8;
        n >>= 7;
        if n == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// 32-byte Sui address from `0x`-prefixed hex, short forms left-padded.
fn parse_address(raw: &str) -> Result<[u8; 32], LedgerError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    if digits.is_empty() || digits.len() > 64 {
        return Err(LedgerError::Decode(format!("invalid address '{raw}'")));
    }
    let bytes = hex::decode(format!("{digits:0>64}"))
        .map_err(|e| LedgerError::Decode(format!("invalid address '{raw}': {e}")))?;
    bytes
        .try_into()
        .map_err(|_| LedgerError::Decode(format!("invalid address '{raw}'")))
}

fn to_ledger_object(data: ObjectData) -> LedgerObject {
    let (content_type, fields) = match data.content {
        Some(c) => (c.type_name, c.fields),
        None => (None, Value::Null),
    };
    LedgerObject {
        object_id: data.object_id,
        type_name: data.type_name.or(content_type).unwrap_or_default(),
        owner: data.owner.as_ref().and_then(address_owner),
        fields,
    }
}

/// Address of an address- or object-owned object. Shared and immutable
/// objects have none.
fn address_owner(owner: &Value) -> Option<String> {
    owner
        .get("AddressOwner")
        .or_else(|| owner.get("ObjectOwner"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Sui cursors are strings for objects and `{txDigest, eventSeq}` for events;
/// both travel through `Page` as compact JSON text.
fn encode_cursor(cursor: Value) -> Option<String> {
    (!cursor.is_null()).then(|| cursor.to_string())
}

fn decode_cursor(cursor: Option<String>) -> Value {
    match cursor {
        Some(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
        None => Value::Null,
    }
}
