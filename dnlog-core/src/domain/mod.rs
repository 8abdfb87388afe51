//! Domain types for DN Log

pub mod contract;
pub mod ids;
pub mod position;

pub use contract::{contract_name, exchange_symbol, normalize_expiry};
pub use ids::PositionId;
pub use position::{ArchivedPosition, OptionType, ParseOptionTypeError, Position};
