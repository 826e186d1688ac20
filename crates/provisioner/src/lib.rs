//! Kubernetes node and monitoring stack provisioning over SSH.
//!
//! Each host runs through a fixed pipeline (requirement check, cluster
//! install, monitoring install, verification, backup) with its progress
//! persisted as a JSON status record.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use provisioner::{FileStatusStore, FleetDriver, PhaseContext, ProvisionConfig, SshExecutor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Arc::new(ProvisionConfig::load("config.json".as_ref())?);
//!     let driver = FleetDriver::new(
//!         Arc::new(SshExecutor::new()),
//!         Arc::new(FileStatusStore::new("status")),
//!         PhaseContext::new(config, "."),
//!     );
//!     let report = driver.run(&["10.0.0.5".to_string()]).await;
//!     println!("{} completed", report.completed());
//!     Ok(())
//! }
//! ```

// Allow product names without backticks in doc comments
#![allow(clippy::doc_markdown)]

pub mod config;
pub mod error;
pub mod executor;
pub mod fleet;
pub mod orchestrator;
pub mod phase;
pub mod status;
pub mod store;
pub mod ui;

// Re-export commonly used types at the crate root
pub use config::{HostTarget, ProvisionConfig};
pub use error::{ConfigError, ConnectionError, PersistenceError, PhaseError};
pub use executor::{CommandOutcome, CommandOutput, RemoteExecutor, RemoteSession, SshExecutor};
pub use fleet::{FleetDriver, FleetReport};
pub use orchestrator::HostOrchestrator;
pub use phase::{Phase, PhaseContext, PhaseKind, Pipeline};
pub use status::{HostState, StatusRecord};
pub use store::{FileStatusStore, StatusStore};
