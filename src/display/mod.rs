//! Display Composition
//!
//! Pure functions from a [`Ranking`](crate::ranking::Ranking) to the
//! [`Scoreboard`] view model: header with team progress, podium in visual
//! order, the remaining list and the celebration overlay.
//!
//! - **board**: `compose` and the view model types
//! - **format**: pt-BR number, value, date and progress formatting
//! - **celebration**: notifications derived from consecutive rankings
//! - **notification**: notification types and the self-dismissing overlay

pub mod board;
pub mod celebration;
pub mod format;
pub mod notification;

pub use board::{compose, Header, ListRow, PodiumColumn, PodiumHeight, PodiumSlot, ProgressView, Scoreboard};
pub use celebration::detect;
pub use format::{format_number, format_value, Progress};
pub use notification::{
    Notification, NotificationKind, NotificationOverlay, OverlayPhase, OverlayTiming, OverlayView,
};
