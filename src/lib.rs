#![warn(missing_docs)]
//! A long-lived client agent for a HashiCorp Vault AppRole session.
//!
//! The agent logs in once with an AppRole role_id/secret_id pair, then
//! maintains the token's renewal lifecycle and three independently
//! refreshed secret caches (KV v2, dynamic database credentials, static
//! database credentials) until asked to shut down.

/// Typed wrappers for the six vault operations the agent needs: login,
/// renew-self, KV v2 read, dynamic/static credential reads, and lease
/// lookup.
pub mod api;
/// The three secret caches, each with its own staleness policy.
pub mod cache;
/// INI-backed configuration loading and defaults.
pub mod config;
/// The crate-wide error enum.
pub mod error;
/// The reqwest-backed HTTP executor shared by every vault operation.
pub mod http;
/// Spawns and joins the token/KV/dynamic/static workers plus the
/// foreground consumer.
pub mod scheduler;
/// The session façade: the single entry point every worker uses.
pub mod session;
/// Token renewal state machine.
pub mod token;
mod util;

pub use config::Configuration;
pub use error::Error;
pub use scheduler::Scheduler;
pub use session::Session;
