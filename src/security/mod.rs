//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client.rs (resolve client identifier)
//!     → rate_limit.rs (fixed window per client, API routes only)
//!     → origin.rs (mutating methods only)
//!     → user_agent.rs (allow-list, then denylist)
//!     → content_type.rs (API POST/PUT only)
//!     → Pass to upstream
//! Outgoing response:
//!     → headers.rs (security headers, CSP, nonce)
//! ```
//!
//! # Design Decisions
//! - Defense in depth: this layer is not the site's authorization
//! - Fail closed on the four explicit rejections, fail open on internal faults
//! - No regex in the hot path (prefix, substring and wildcard matching only)

pub mod client;
pub mod clock;
pub mod content_type;
pub mod filter;
pub mod headers;
pub mod ledger;
pub mod nonce;
pub mod origin;
pub mod rate_limit;
pub mod user_agent;

pub use clock::{Clock, ManualClock, SystemClock};
pub use filter::{EdgeFilter, FilterPolicy, RequestClass, RequestHead, RouteCategory};
pub use ledger::{LedgerEntry, LedgerStore, MemoryLedger, StoreError};
pub use rate_limit::{FixedWindowLimiter, LimitError, Verdict};
