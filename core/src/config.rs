use crate::error::MarketError;

pub const DEFAULT_STORAGE_EPOCHS: u32 = 5;
pub const DEFAULT_EVENT_PAGE_SIZE: usize = 50;

/// Which deployment to talk to. `Sandbox` is the in-process simulated
/// network; the others are real Sui/Walrus networks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Network {
    Testnet,
    Mainnet,
    Devnet,
    Localnet,
    Sandbox,
}

impl Network {
    pub fn default_rpc_url(self) -> &'static str {
        match self {
            Network::Testnet => "https://fullnode.testnet.sui.io:443",
            Network::Mainnet => "https://fullnode.mainnet.sui.io:443",
            Network::Devnet => "https://fullnode.devnet.sui.io:443",
            Network::Localnet | Network::Sandbox => "http://127.0.0.1:9000",
        }
    }

    pub fn default_aggregator_url(self) -> &'static str {
        match self {
            Network::Testnet | Network::Devnet => "https://aggregator.walrus-testnet.walrus.space",
            Network::Mainnet => "https://aggregator.walrus-mainnet.walrus.space",
            Network::Localnet | Network::Sandbox => "http://127.0.0.1:31415",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
            Network::Devnet => "devnet",
            Network::Localnet => "localnet",
            Network::Sandbox => "sandbox",
        }
    }
}

impl std::str::FromStr for Network {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "testnet" | "test" => Ok(Network::Testnet),
            "mainnet" | "main" => Ok(Network::Mainnet),
            "devnet" | "dev" => Ok(Network::Devnet),
            "localnet" | "local" => Ok(Network::Localnet),
            "sandbox" => Ok(Network::Sandbox),
            other => Err(MarketError::Configuration(format!(
                "Unknown network '{other}' (expected testnet, mainnet, devnet, localnet, or sandbox)"
            ))),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-chain identifiers and endpoints for one deployment of the registries.
#[derive(Clone, Debug)]
pub struct Deployment {
    pub network: Network,
    /// Move package that defines the three registry modules
    pub package_id: String,
    pub identity_registry: String,
    pub reputation_registry: String,
    pub validation_registry: String,
    pub rpc_url: String,
    pub aggregator_url: String,
    /// Storage retention, in epochs, for newly anchored blobs
    pub storage_epochs: u32,
    /// Page size for event and object queries. Every page is followed.
    pub page_size: usize,
}

impl Deployment {
    /// Deployment with placeholder ids, used by the sandbox network.
    pub fn sandbox() -> Self {
        Self {
            network: Network::Sandbox,
            package_id: "0x8004".to_string(),
            identity_registry: "0x8004a1".to_string(),
            reputation_registry: "0x8004b2".to_string(),
            validation_registry: "0x8004c3".to_string(),
            rpc_url: Network::Sandbox.default_rpc_url().to_string(),
            aggregator_url: Network::Sandbox.default_aggregator_url().to_string(),
            storage_epochs: DEFAULT_STORAGE_EPOCHS,
            page_size: DEFAULT_EVENT_PAGE_SIZE,
        }
    }

    /// Read the deployment from `AGENTMARKET_*` environment variables. Registry
    /// ids are required for every real network; the sandbox falls back to its
    /// placeholders.
    pub fn from_env(network: Network) -> Result<Self, MarketError> {
        Self::from_lookup(network, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        network: Network,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, MarketError> {
        let base = if network == Network::Sandbox {
            Some(Self::sandbox())
        } else {
            None
        };

        let required = |key: &str, fallback: Option<&String>| -> Result<String, MarketError> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| fallback.cloned())
                .ok_or_else(|| MarketError::Configuration(format!("{key} must be set for {network}")))
        };

        let storage_epochs = match lookup("AGENTMARKET_STORAGE_EPOCHS") {
            Some(raw) => raw.parse::<u32>().map_err(|e| {
                MarketError::Configuration(format!("Invalid AGENTMARKET_STORAGE_EPOCHS '{raw}': {e}"))
            })?,
            None => DEFAULT_STORAGE_EPOCHS,
        };
        let page_size = match lookup("AGENTMARKET_EVENT_PAGE_SIZE") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    MarketError::Configuration(format!(
                        "Invalid AGENTMARKET_EVENT_PAGE_SIZE '{raw}': expected a positive integer"
                    ))
                })?,
            None => DEFAULT_EVENT_PAGE_SIZE,
        };

        Ok(Self {
            network,
            package_id: required("AGENTMARKET_PACKAGE_ID", base.as_ref().map(|b| &b.package_id))?,
            identity_registry: required(
                "AGENTMARKET_IDENTITY_REGISTRY",
                base.as_ref().map(|b| &b.identity_registry),
            )?,
            reputation_registry: required(
                "AGENTMARKET_REPUTATION_REGISTRY",
                base.as_ref().map(|b| &b.reputation_registry),
            )?,
            validation_registry: required(
                "AGENTMARKET_VALIDATION_REGISTRY",
                base.as_ref().map(|b| &b.validation_registry),
            )?,
            rpc_url: lookup("AGENTMARKET_RPC_URL")
                .unwrap_or_else(|| network.default_rpc_url().to_string()),
            aggregator_url: lookup("AGENTMARKET_AGGREGATOR_URL")
                .unwrap_or_else(|| network.default_aggregator_url().to_string()),
            storage_epochs,
            page_size,
        })
    }

    pub fn agent_type(&self) -> String {
        format!("{}::identity_registry::Agent", self.package_id)
    }

    pub fn agent_registered_event(&self) -> String {
        format!("{}::identity_registry::AgentRegistered", self.package_id)
    }

    pub fn feedback_given_event(&self) -> String {
        format!("{}::reputation_registry::FeedbackGiven", self.package_id)
    }

    pub fn validation_requested_event(&self) -> String {
        format!("{}::validation_registry::ValidationRequested", self.package_id)
    }

    pub fn validation_responded_event(&self) -> String {
        format!("{}::validation_registry::ValidationResponded", self.package_id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn sandbox_needs_no_env() {
        let d = Deployment::from_lookup(Network::Sandbox, lookup_from(&[])).unwrap();
        assert_eq!(d.package_id, "0x8004");
        assert_eq!(d.page_size, DEFAULT_EVENT_PAGE_SIZE);
    }

    #[test]
    fn real_network_requires_registry_ids() {
        let err = Deployment::from_lookup(Network::Testnet, lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("AGENTMARKET_PACKAGE_ID"));
    }

    #[test]
    fn env_overrides_defaults() {
        let d = Deployment::from_lookup(
            Network::Testnet,
            lookup_from(&[
                ("AGENTMARKET_PACKAGE_ID", "0xpkg"),
                ("AGENTMARKET_IDENTITY_REGISTRY", "0xid"),
                ("AGENTMARKET_REPUTATION_REGISTRY", "0xrep"),
                ("AGENTMARKET_VALIDATION_REGISTRY", "0xval"),
                ("AGENTMARKET_STORAGE_EPOCHS", "12"),
                ("AGENTMARKET_EVENT_PAGE_SIZE", "7"),
            ]),
        )
        .unwrap();
        assert_eq!(d.rpc_url, "https://fullnode.testnet.sui.io:443");
        assert_eq!(d.storage_epochs, 12);
        assert_eq!(d.page_size, 7);
        assert_eq!(d.agent_type(), "0xpkg::identity_registry::Agent");
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let err = Deployment::from_lookup(
            Network::Sandbox,
            lookup_from(&[("AGENTMARKET_EVENT_PAGE_SIZE", "0")]),
        )
        .unwrap_err();
        assert!(matches!(err, MarketError::Configuration(_)));
    }

    #[test]
    fn network_names() {
        assert_eq!("main".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!("LOCALNET".parse::<Network>().unwrap(), Network::Localnet);
        assert!("moon".parse::<Network>().is_err());
    }
}
