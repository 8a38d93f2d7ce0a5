//! Domain types for memberlab

pub mod bar;
pub mod month;
pub mod snapshot;

pub use bar::{PriceBar, PriceRecord, TickerBars};
pub use month::{Month, MonthError};
pub use snapshot::{MembershipSnapshot, MonthlySurvivorRecord, RecordOrigin, TickerSpan};
