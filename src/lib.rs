//! hotswap - Event rule engine with in-session rule replacement
//!
//! This crate re-exports all layers of the hotswap system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 4: hotswap_runtime    - Sessions, hot updates, snapshots, scenarios, CLI
//! Layer 3: hotswap_engine     - Pattern matching, agenda, refraction, rule sets
//! Layer 2: hotswap_language   - Lexer, parser, rule declarations
//! Layer 1: hotswap_storage    - Event store, logical clock
//! Layer 0: hotswap_foundation - Core types (Value, Event, Timestamp, Error)
//! ```

pub use hotswap_engine as engine;
pub use hotswap_foundation as foundation;
pub use hotswap_language as language;
pub use hotswap_runtime as runtime;
pub use hotswap_storage as storage;
