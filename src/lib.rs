//! convo - streaming conversation sessions against a chat backend
//!
//! A send names an existing thread or creates one, appends the user message
//! and an assistant placeholder to the thread's optimistic log, streams the
//! reply into the placeholder, and then commits or rolls back the pair.
//!
//! This library exposes modules for use in integration tests and the `convo`
//! binary.

pub mod adapters;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod log;
pub mod models;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod stream;
pub mod traits;

pub use config::{CancelPolicy, SessionConfig};
pub use events::SessionEvent;
pub use session::{SendReceipt, SessionManager, SessionPhase};
