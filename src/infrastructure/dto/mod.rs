//! Data Transfer Objects (DTOs) for the chat session engine.
//!
//! DTOs are organized by protocol:
//! - `websocket`: chat gateway frame DTOs (tagged by the `type` field)
//! - `http`: REST API request/response DTOs
//!
//! Conversion into domain types lives in `conversion` and validates every
//! field, so malformed input never crosses into the domain layer.

pub mod conversion;
pub mod http;
pub mod websocket;
