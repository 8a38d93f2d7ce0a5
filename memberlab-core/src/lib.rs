//! MemberLab Core: index membership history, survivor analysis, and price annotation.
//!
//! - Domain types (months, membership snapshots, spans, survivor records, bars)
//! - Membership sources: day-by-day ticker history and snapshot tables
//! - Presence matrix and ticker spans
//! - Monthly survivor computation with forward fill
//! - Symbol normalization
//! - Price providers and the per-ticker batch fetcher
//! - Daily/monthly returns and the index-membership flag

pub mod data;
pub mod domain;
pub mod matrix;
pub mod membership;
pub mod returns;
pub mod span;
pub mod survivors;
pub mod symbols;

pub use matrix::PresenceMatrix;
pub use span::compute_spans;
pub use survivors::compute_survivors;
pub use symbols::SymbolMap;
