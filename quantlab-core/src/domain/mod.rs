//! Domain types for QuantLab.

pub mod bar;
pub mod indicator_value;
pub mod position;
pub mod trade;

pub use bar::{Bar, BarError};
pub use indicator_value::{DateRange, IndicatorValue};
pub use position::DailyPosition;
pub use trade::{Trade, TradeSide};

/// Symbol type alias
pub type Symbol = String;
