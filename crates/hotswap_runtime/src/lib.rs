//! Sessions, hot rule updates, snapshots, and scenario replay for hotswap.
//!
//! This crate provides:
//! - [`Session`] - Working memory, logical clock, and the active rule set
//! - [`SharedSession`] - A session shared between threads
//! - [`Scanner`] - Applies newer artifacts from a [`RuleRepository`]
//! - [`Scenario`] - Scripted replay of events and rule updates
//! - Snapshot serialization in `MessagePack`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod repository;
pub mod scanner;
pub mod scenario;
pub mod serialize;
pub mod session;
pub mod shared;

pub use config::SessionConfig;
pub use hotswap_engine::RetroactivePolicy;
pub use repository::{
    DirectoryRepository, MemoryRepository, RULES_EXTENSION, RuleArtifact, RuleRepository,
    read_artifact,
};
pub use scanner::{ScanOutcome, Scanner};
pub use scenario::{EventSpec, Phase, PhaseReport, Scenario, ScenarioReport};
pub use serialize::{from_bytes, load_from_file, save_to_file, to_bytes};
pub use session::{Session, SessionSnapshot};
pub use shared::SharedSession;
