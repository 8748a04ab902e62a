//! Client SDK for the on-chain agent identity, reputation, and validation
//! registries, with agent documents stored off-chain as content-addressed
//! blobs.

pub mod codec;
pub mod config;
pub mod digest;
pub mod error;
pub mod flows;
pub mod ledger;
pub mod model;
pub mod orchestrator;
pub mod read_model;
pub mod sandbox;
pub mod session;
pub mod signer;
pub mod store;
pub mod sui_rpc;
pub mod uri;
pub mod walrus;

pub use config::{Deployment, Network};
pub use error::{AnchorPhase, MarketError};
pub use flows::Marketplace;
pub use read_model::ReadModel;
