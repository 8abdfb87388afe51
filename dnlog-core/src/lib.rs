//! DN Log Core: delta-neutral option position tracking.
//!
//! This crate contains everything except the operator-facing surface:
//! - Domain types (positions, option types, ids, contract naming)
//! - Hedge math: entry/target hedge and the band-triggered rehedge decision
//! - Record store with an active set and an append-only archive
//! - Lifecycle manager gating every hedge change behind operator confirmation
//! - Delta sources (Binance options mark data, moneyness mock)
//! - TOML configuration

pub mod config;
pub mod domain;
pub mod hedge;
pub mod lifecycle;
pub mod market;
pub mod store;

pub use config::{AppConfig, ConfigError, MarketConfig, SourceKind};
pub use domain::{ArchivedPosition, OptionType, Position, PositionId};
pub use hedge::{
    entry_hedge, hedge_side, rehedge_decision, target_hedge, HedgeDirection, RehedgeDecision,
};
pub use lifecycle::{
    DeltaQuote, LifecycleError, NewPosition, Observation, PositionLifecycle, ValidationError,
};
pub use market::{BinanceDeltaSource, DeltaSource, MarketError, MockDeltaSource};
pub use store::{JsonFileStore, Listing, MemoryStore, PositionStore, StoreError, StoreHealth};
