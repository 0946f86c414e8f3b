//! Error handling for the session core.
//!
//! | Type | Raised by | Category |
//! |------|-----------|----------|
//! | [`BackendError`] | thread create / list / history calls | Network, Server, Client |
//! | [`StreamError`] | the reply stream | Network, Server |
//! | [`LogError`] | optimistic log misuse | Client |
//! | [`OpenThreadError`] | loading a thread's history | Network, Server, Client |
//! | [`SendError`] | one send, end to end | depends on cause |
//!
//! Nothing here is fatal: every failure ends one send and the session
//! returns to idle.

mod backend;
mod category;
mod log;
mod open;
mod send;
mod stream;

pub use backend::BackendError;
pub use category::ErrorCategory;
pub use log::LogError;
pub use open::OpenThreadError;
pub use send::{SendError, SendErrorKind, SendFailure};
pub use stream::StreamError;
