use serde_json::json;

use crate::context::Context;
use crate::util::print_json;

/// Print the resolved deployment (network, registry ids, endpoints).
pub fn config(ctx: &Context) -> i32 {
    let d = ctx.deployment();
    print_json(&json!({
        "network": d.network.as_str(),
        "package_id": d.package_id,
        "identity_registry": d.identity_registry,
        "reputation_registry": d.reputation_registry,
        "validation_registry": d.validation_registry,
        "rpc_url": d.rpc_url,
        "aggregator_url": d.aggregator_url,
        "storage_epochs": d.storage_epochs,
        "page_size": d.page_size,
        "address": ctx.address(),
    }))
}
