//! Mute-aware visibility filtering.
//!
//! Every read path and every push path decides what an observer may see by
//! asking the same [`VisibilityFilter`]. Mute edges live in the
//! [`MuteRelationStore`]; the filter caches per-muter mute sets and the store
//! invalidates that cache before a mute or unmute call returns, so the next
//! read or push after the call already reflects it.

pub mod cache;
pub mod error;
pub mod filter;
pub mod query;
pub mod store;
pub mod unread;

pub use cache::{MuteSet, MuteSetCache};
pub use error::{MuteError, VisibilityError};
pub use filter::{HiddenReason, Verdict, VisibilityFilter};
pub use query::ContentQueryFilter;
pub use store::{MuteListener, MuteRelationStore};
pub use unread::UnreadStateAggregator;
