//! ドメイン層
//!
//! チャットセッションの中核となる型を定義します。
//! 値オブジェクトは不変条件をコンストラクタで強制し、
//! 一度生成された値が常に妥当であることを保証します。
//!
//! この層は他の層（infrastructure / session / ui）に依存しません。

pub mod entity;
pub mod error;
pub mod event;
pub mod value_object;

pub use entity::{Member, Message, MessageKind, Session};
pub use error::DomainError;
pub use event::RoomEvent;
pub use value_object::{ConnectionToken, MessageBody, RoomId, Timestamp, Username};
