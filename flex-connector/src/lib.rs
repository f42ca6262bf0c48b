//! FlexLedger Connector
//!
//! Client-side submission and confirmation protocol for the FlexLedger
//! network. The connector turns a logical `invoke`/`query` call into:
//! - a signed proposal sent to the channel's endorsing nodes,
//! - validation and aggregation of their responses,
//! - broadcast of the endorsed transaction to the ordering service,
//! - correlation of that broadcast with the asynchronous commit
//!   notification,
//!
//! all under per-step timeouts and explicit partial-failure policies.
//!
//! This module provides:
//! - Network profile loading and validation
//! - Signing identity and enrollment material
//! - Channel sessions and commit event listeners
//! - The transaction coordinator (`invoke` / `query`)
//! - HTTP node transports

pub mod connector;
pub mod coordinator;
pub mod error;
pub mod identity;
pub mod listener;
pub mod message;
pub mod node;
pub mod profile;
pub mod session;
pub mod transport;

pub use connector::*;
pub use coordinator::*;
pub use error::*;
pub use identity::*;
pub use listener::*;
pub use message::*;
pub use node::*;
pub use profile::*;
pub use session::*;
pub use transport::*;
