//! Ranking
//!
//! Turns the stored participants and sales of a campaign into an ordered
//! leaderboard.
//!
//! ```text
//! Campaign ─┐
//!           ├─ participants (selection order)
//!           │     └─ sales per participant ── fold(sum) ─┐   (concurrent, joined)
//!           └──────────────────────────────────────────── sort desc (stable) → Ranking
//! ```

mod aggregator;

pub use aggregator::{RankedEntry, Ranking, RankingAggregator, RankingError, TieBreak};
