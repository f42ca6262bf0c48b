//! Protocol constants for the FlexLedger connector.

/// Default bound on proposal dispatch and endorsement collection, in seconds
pub const DEFAULT_PROPOSAL_TIMEOUT_SECS: u64 = 10;

/// Default bound on the commit notification wait, in seconds
pub const DEFAULT_COMMIT_TIMEOUT_SECS: u64 = 10;

/// Endorsement status code indicating a successful simulation
pub const ENDORSEMENT_SUCCESS_STATUS: u32 = 200;

/// Number of argument slots on the wire (business args, caller context)
pub const WIRE_ARG_SLOTS: usize = 2;

/// Maximum reconnect attempts for a lost commit event subscription
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Base reconnect delay in milliseconds
pub const RECONNECT_DELAY_MS: u64 = 1000;

/// Reconnect delay cap in milliseconds
pub const RECONNECT_DELAY_CAP_MS: u64 = 30_000;

/// Capacity of the per-channel recent-commit cache
pub const RECENT_COMMIT_CAPACITY: usize = 256;
