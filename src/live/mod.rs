//! Live Refresh
//!
//! Keeps the ranking of one displayed campaign current by recomputing it
//! whenever the store reports a relevant sale change.
//!
//! ```text
//! store.subscribe_sales() ──► filter (scope) ──► aggregator.rank() ──► watch<BoardState>
//! Refresher::refresh() ─────────────────────────────┘
//! ```

mod channel;

pub use channel::{BoardState, LiveRanking, RefreshScope, Refresher};
