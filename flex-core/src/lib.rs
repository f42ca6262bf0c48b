//! FlexLedger Core
//!
//! Shared types for the FlexLedger flexibility-market ledger. The ledger
//! records business documents (bids, metering reports, schedules,
//! activation orders) exchanged between market-role participants; this
//! crate defines the vocabulary every FlexLedger component speaks:
//! - Market roles and caller context
//! - Commit status and block metadata
//! - Contract function naming (`"<Resource>.<operation>"`)
//! - Protocol constants

pub mod constants;
pub mod types;

pub use constants::*;
pub use types::*;
