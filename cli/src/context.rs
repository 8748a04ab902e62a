use std::path::PathBuf;
use std::sync::Arc;

use agentmarket_core::sandbox::SandboxNetwork;
use agentmarket_core::sui_rpc::SuiRpcLedger;
use agentmarket_core::walrus::AggregatorStore;
use agentmarket_core::{Deployment, Marketplace, Network, ReadModel};

use crate::signer::PromptSigner;
use crate::util::exit_error;

/// Address used on the sandbox network when `--address` is not given.
pub const SANDBOX_ADDRESS: &str =
    "0x00000000000000000000000000000000000000000000000000000000000000a1";

/// Everything a command needs: the marketplace for one deployment, the
/// acting address, and (on the sandbox) where to persist state afterwards.
pub struct Context {
    pub market: Marketplace,
    address: Option<String>,
    auto_approve: bool,
    sandbox: Option<(Arc<SandboxNetwork>, PathBuf)>,
}

pub struct GlobalArgs {
    pub network: String,
    pub state_file: PathBuf,
    pub address: Option<String>,
    pub yes: bool,
}

impl Context {
    pub fn from_args(args: GlobalArgs) -> Self {
        let network: Network = args
            .network
            .parse()
            .unwrap_or_else(|e: agentmarket_core::MarketError| exit_error(&e.to_string(), None));
        let deployment = Deployment::from_env(network).unwrap_or_else(|e| {
            exit_error(
                &e.to_string(),
                Some("Set the AGENTMARKET_* variables (or use --network sandbox)"),
            )
        });

        tracing::debug!(
            event = "deployment_selected",
            network = %deployment.network,
            package_id = %deployment.package_id,
            page_size = deployment.page_size,
        );

        if network == Network::Sandbox {
            let net = SandboxNetwork::load(deployment.clone(), &args.state_file)
                .unwrap_or_else(|e| exit_error(&e, Some("Delete the state file to start over")));
            let net = Arc::new(net);
            return Self {
                market: Marketplace::new(deployment, net.clone(), net.clone()),
                address: Some(args.address.unwrap_or_else(|| SANDBOX_ADDRESS.to_string())),
                auto_approve: args.yes,
                sandbox: Some((net, args.state_file)),
            };
        }

        let ledger = SuiRpcLedger::new(deployment.rpc_url.clone(), deployment.package_id.clone())
            .unwrap_or_else(|e| exit_error(&e.to_string(), None));
        let store = AggregatorStore::new(deployment.aggregator_url.clone())
            .unwrap_or_else(|e| exit_error(&e.to_string(), None));
        Self {
            market: Marketplace::new(deployment, Arc::new(ledger), Arc::new(store)),
            address: args.address,
            auto_approve: args.yes,
            sandbox: None,
        }
    }

    pub fn reader(&self) -> ReadModel {
        self.market.reader()
    }

    pub fn deployment(&self) -> &Deployment {
        self.market.deployment()
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn require_address(&self) -> &str {
        self.address().unwrap_or_else(|| {
            exit_error(
                "An address is required for this command",
                Some("Pass --address or set AGENTMARKET_ADDRESS"),
            )
        })
    }

    pub fn signer(&self) -> PromptSigner {
        PromptSigner::new(self.require_address().to_string(), self.auto_approve)
    }

    /// Write sandbox state back to disk. Called after every command, even a
    /// failed one, because a failed write can still leave orphaned blobs.
    pub fn persist(&self) -> i32 {
        let Some((net, path)) = &self.sandbox else {
            return 0;
        };
        match net.save(path) {
            Ok(()) => 0,
            Err(e) => {
                tracing::error!(event = "sandbox_save_failed", error = %e, "Sandbox state not saved");
                crate::util::EXIT_FAILURE
            }
        }
    }
}
