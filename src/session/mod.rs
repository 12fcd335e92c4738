//! Session engine layer
//!
//! The stateful heart of the client: one event-loop task owns the login
//! session, the websocket transport, room membership, message history and
//! typing presence. Callers hold an [`EngineHandle`] and observe changes
//! through broadcast notices.

pub mod auth;
pub mod connection;
pub mod engine;
pub mod event;
pub mod handle;
pub mod presence;
pub mod store;

pub use auth::{AuthError, CredentialBridge};
pub use connection::{ConnectionReport, ConnectionStatus, TransportError};
pub use engine::SessionEngine;
pub use event::{EngineCommand, EngineEvent, EngineNotice};
pub use handle::EngineHandle;
pub use presence::TypingTracker;
pub use store::MessageStore;
