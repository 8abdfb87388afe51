//! Position lifecycle manager.
//!
//! The only component that mutates positions. Hedge changes are split into
//! two steps: `observe_delta` computes a decision (and records the delta),
//! `confirm_rehedge` applies it once the operator says the trade was done.
//! Nothing here assumes a trade happened because the math says it should.
//!
//! ```text
//!  (none) --create--> ACTIVE --observe (inside band)--> ACTIVE
//!                       |  observe (outside band) + confirm
//!                       v
//!                     ACTIVE (hedge = target, rehedge_count + 1)
//!                       |  close
//!                       v
//!                     CLOSED (archived, terminal)
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{
    contract_name, exchange_symbol, normalize_expiry, ArchivedPosition, OptionType,
    ParseOptionTypeError, Position, PositionId,
};
use crate::hedge::{entry_hedge, RehedgeDecision};
use crate::market::DeltaSource;
use crate::store::{Listing, PositionStore, StoreError};

/// Bad operator input. Recoverable: re-prompt.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    #[error("{field} must be greater than zero, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} must be between -1 and 1, got {value}")]
    DeltaOutOfRange { field: &'static str, value: f64 },

    #[error("expiry must not be empty")]
    EmptyExpiry,

    #[error(transparent)]
    OptionType(#[from] ParseOptionTypeError),
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("position '{id}' not found")]
    NotFound { id: PositionId },

    /// The id generator handed out a taken id. Should never happen.
    #[error("internal error: position id '{id}' already exists")]
    DuplicateId { id: PositionId },

    #[error("position '{id}' is inside its band; there is no rehedge to confirm")]
    RehedgeNotNeeded { id: PositionId },

    #[error("position '{id}' changed since the delta was observed; observe again")]
    StaleObservation { id: PositionId },

    #[error(transparent)]
    Storage(StoreError),
}

impl From<StoreError> for LifecycleError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { id } => LifecycleError::NotFound { id },
            StoreError::DuplicateId { id } => LifecycleError::DuplicateId { id },
            other => LifecycleError::Storage(other),
        }
    }
}

/// Operator intent to open a position.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPosition {
    pub expiry: String,
    pub option_type: OptionType,
    pub strike: f64,
    pub size: f64,
    pub entry_delta: f64,
    pub band: f64,
}

impl NewPosition {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if normalize_expiry(&self.expiry).is_empty() {
            return Err(ValidationError::EmptyExpiry);
        }
        positive("strike", self.strike)?;
        positive("size", self.size)?;
        positive("band", self.band)?;
        unit_delta("entry delta", self.entry_delta)?;
        Ok(())
    }

    /// Perp position to open alongside the option.
    pub fn starting_hedge(&self) -> f64 {
        entry_hedge(self.size, self.entry_delta, self.option_type)
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field });
    }
    if value <= 0.0 {
        return Err(ValidationError::NotPositive { field, value });
    }
    Ok(())
}

fn unit_delta(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field });
    }
    if value.abs() > 1.0 {
        return Err(ValidationError::DeltaOutOfRange { field, value });
    }
    Ok(())
}

/// A delta observation and the decision it produced.
///
/// Carries the hedge it was computed against so a confirmation can be checked
/// for staleness.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub id: PositionId,
    pub observed_delta: f64,
    pub decision: RehedgeDecision,
    pub observed_at: NaiveDateTime,
}

/// Result of asking a delta source about a position.
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaQuote {
    Live { source: String, delta: f64 },
    /// No usable value; the caller should ask the operator instead.
    Unavailable { reason: String },
}

pub struct PositionLifecycle<S: PositionStore> {
    store: S,
    underlying: String,
}

impl<S: PositionStore> PositionLifecycle<S> {
    pub fn new(store: S, underlying: impl Into<String>) -> Self {
        Self {
            store,
            underlying: underlying.into().trim().to_uppercase(),
        }
    }

    pub fn list_active(&self) -> Listing<Position> {
        self.store.list_active()
    }

    pub fn list_history(&self) -> Listing<ArchivedPosition> {
        self.store.list_history()
    }

    pub fn get(&self, id: &PositionId) -> Result<Position, LifecycleError> {
        Ok(self.store.get(id)?)
    }

    /// Validate, compute the starting hedge, assign an id and persist.
    pub fn create(&mut self, intent: NewPosition) -> Result<Position, LifecycleError> {
        self.create_at(intent, now())
    }

    pub fn create_at(
        &mut self,
        intent: NewPosition,
        now: NaiveDateTime,
    ) -> Result<Position, LifecycleError> {
        intent.validate()?;

        let expiry = normalize_expiry(&intent.expiry);
        let today: NaiveDate = now.date();
        let position = Position {
            id: self.store.generate_id_at(now),
            contract_name: contract_name(
                &self.underlying,
                &expiry,
                intent.strike,
                intent.option_type,
            ),
            option_type: intent.option_type,
            strike: intent.strike,
            exchange_symbol: exchange_symbol(
                &self.underlying,
                &expiry,
                intent.strike,
                intent.option_type,
                today,
            ),
            expiry,
            size: intent.size,
            entry_delta: intent.entry_delta,
            band: intent.band,
            current_hedge: intent.starting_hedge(),
            last_delta: intent.entry_delta,
            rehedge_count: 0,
            created_at: now,
            updated_at: now,
            is_active: true,
        };

        self.store.create(position.clone())?;
        info!(
            id = %position.id,
            contract = %position.contract_name,
            hedge = position.current_hedge,
            "Opened position"
        );
        Ok(position)
    }

    /// Compute the rehedge decision for `observed_delta` and record it as the
    /// last known delta. The hedge itself is left alone.
    pub fn observe_delta(
        &mut self,
        id: &PositionId,
        observed_delta: f64,
    ) -> Result<Observation, LifecycleError> {
        self.observe_delta_at(id, observed_delta, now())
    }

    pub fn observe_delta_at(
        &mut self,
        id: &PositionId,
        observed_delta: f64,
        now: NaiveDateTime,
    ) -> Result<Observation, LifecycleError> {
        unit_delta("observed delta", observed_delta)?;

        let mut position = self.store.get(id)?;
        let decision = position.check_rehedge(observed_delta);

        position.last_delta = observed_delta;
        position.updated_at = now;
        self.store.update(position)?;

        Ok(Observation {
            id: id.clone(),
            observed_delta,
            decision,
            observed_at: now,
        })
    }

    /// Apply an observed rehedge after the operator confirmed the trade.
    pub fn confirm_rehedge(
        &mut self,
        observation: &Observation,
    ) -> Result<Position, LifecycleError> {
        self.confirm_rehedge_at(observation, now())
    }

    pub fn confirm_rehedge_at(
        &mut self,
        observation: &Observation,
        now: NaiveDateTime,
    ) -> Result<Position, LifecycleError> {
        let id = &observation.id;
        if !observation.decision.needed {
            return Err(LifecycleError::RehedgeNotNeeded { id: id.clone() });
        }

        let mut position = self.store.get(id)?;
        if position.current_hedge != observation.decision.current_hedge {
            return Err(LifecycleError::StaleObservation { id: id.clone() });
        }

        let previous = position.current_hedge;
        position.current_hedge = observation.decision.target_hedge;
        position.rehedge_count += 1;
        position.updated_at = now;
        self.store.update(position.clone())?;

        info!(
            %id,
            from = previous,
            to = position.current_hedge,
            rehedges = position.rehedge_count,
            "Rehedge confirmed"
        );
        Ok(position)
    }

    /// Archive an active position. The caller collects the confirmation.
    pub fn close(&mut self, id: &PositionId) -> Result<ArchivedPosition, LifecycleError> {
        self.close_at(id, now())
    }

    pub fn close_at(
        &mut self,
        id: &PositionId,
        now: NaiveDateTime,
    ) -> Result<ArchivedPosition, LifecycleError> {
        let archived = self.store.archive_and_remove(id, now)?;
        info!(%id, rehedges = archived.position.rehedge_count, "Closed position");
        Ok(archived)
    }

    /// Ask `source` for the position's current delta.
    pub fn fetch_delta(
        &self,
        id: &PositionId,
        source: &dyn DeltaSource,
    ) -> Result<DeltaQuote, LifecycleError> {
        let position = self.store.get(id)?;
        let Some(symbol) = position.exchange_symbol.as_deref() else {
            return Ok(DeltaQuote::Unavailable {
                reason: format!("no exchange symbol for {}", position.contract_name),
            });
        };

        match source.fetch_delta(symbol) {
            Ok(delta) if delta.is_finite() && delta.abs() <= 1.0 => Ok(DeltaQuote::Live {
                source: source.name().to_string(),
                delta,
            }),
            Ok(delta) => Ok(DeltaQuote::Unavailable {
                reason: format!("{} returned an out-of-range delta ({delta})", source.name()),
            }),
            Err(e) => {
                warn!(%id, symbol, source = source.name(), error = %e, "Delta fetch failed");
                Ok(DeltaQuote::Unavailable {
                    reason: e.to_string(),
                })
            }
        }
    }
}

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}
