//! Chat session engine library.
//!
//! This library provides the client-side core of a room-based chat
//! application: credential handling against a cookie/CSRF authenticated
//! backend, a websocket transport with automatic reconnection, the room
//! protocol, a bounded persisted message store and typing presence.

// layers
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod session;
pub mod ui;

// shared library
pub mod common;
