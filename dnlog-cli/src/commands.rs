//! Operator flows shared by the one-shot subcommands and the menu.
//!
//! Every hedge change is gated on the operator saying the trade was done;
//! declining leaves the stored hedge alone.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use dnlog_core::{
    DeltaQuote, DeltaSource, NewPosition, Position, PositionId, PositionLifecycle, PositionStore,
};
use tracing::debug;

use crate::prompt::Prompt;
use crate::render;

/// Lifecycle manager plus the configured delta source, if one could be built.
pub struct Session<S: PositionStore> {
    pub lifecycle: PositionLifecycle<S>,
    pub source: Option<Box<dyn DeltaSource>>,
}

impl<S: PositionStore> Session<S> {
    pub fn new(lifecycle: PositionLifecycle<S>, source: Option<Box<dyn DeltaSource>>) -> Self {
        Self { lifecycle, source }
    }
}

pub fn list<S: PositionStore, W: Write>(session: &Session<S>, out: &mut W) -> Result<()> {
    render::positions(out, &session.lifecycle.list_active())?;
    Ok(())
}

pub fn history<S: PositionStore, W: Write>(session: &Session<S>, out: &mut W) -> Result<()> {
    render::history(out, &session.lifecycle.list_history())?;
    Ok(())
}

/// Ask for every field of a new position.
pub fn read_new_position<R: BufRead, W: Write>(prompt: &mut Prompt<R, W>) -> Result<NewPosition> {
    Ok(NewPosition {
        expiry: prompt.non_empty("Expiry (e.g. 27FEB): ")?,
        option_type: prompt.option_type("Type (call/put): ")?,
        strike: prompt.float("Strike: ")?,
        size: prompt.float("Size (e.g. 0.1): ")?,
        entry_delta: prompt.delta("Entry delta (0.0 to 1.0): ")?,
        band: prompt.float("Band (rehedge threshold, e.g. 0.0038): ")?,
    })
}

/// Show the starting hedge and record the position once the operator has opened it.
///
/// Returns `None` when the operator declines; nothing is written then.
pub fn open<S, R, W>(
    session: &mut Session<S>,
    prompt: &mut Prompt<R, W>,
    intent: NewPosition,
    assume_yes: bool,
) -> Result<Option<Position>>
where
    S: PositionStore,
    R: BufRead,
    W: Write,
{
    intent.validate()?;
    render::starting_hedge(prompt.writer(), &intent)?;

    if !assume_yes && !prompt.confirm("Did you open this hedge?")? {
        writeln!(prompt.writer(), "Cancelled. Nothing saved.")?;
        return Ok(None);
    }

    let position = session
        .lifecycle
        .create(intent)
        .context("failed to record position")?;
    writeln!(
        prompt.writer(),
        "Saved {} as {} (hedge {:+.5}).",
        position.contract_name,
        position.id,
        position.current_hedge
    )?;
    Ok(Some(position))
}

/// Observe a delta, show the decision and, if a rehedge is needed and the
/// operator confirms the trade, record the new hedge.
pub fn check<S, R, W>(
    session: &mut Session<S>,
    prompt: &mut Prompt<R, W>,
    id: &PositionId,
    delta: Option<f64>,
    assume_yes: bool,
) -> Result<()>
where
    S: PositionStore,
    R: BufRead,
    W: Write,
{
    let position = session.lifecycle.get(id)?;
    render::detail(prompt.writer(), &position)?;

    let delta = match delta {
        Some(delta) => delta,
        None => resolve_delta(session, prompt, id)?,
    };

    let observation = session.lifecycle.observe_delta(id, delta)?;
    render::decision(prompt.writer(), position.band, &observation)?;
    if !observation.decision.needed {
        return Ok(());
    }

    if !assume_yes && !prompt.confirm("Did you execute this trade?")? {
        writeln!(
            prompt.writer(),
            "Not recorded. Hedge stays at {:+.5}.",
            observation.decision.current_hedge
        )?;
        return Ok(());
    }

    let updated = session.lifecycle.confirm_rehedge(&observation)?;
    writeln!(
        prompt.writer(),
        "Hedge updated to {:+.5} ({} rehedges).",
        updated.current_hedge,
        updated.rehedge_count
    )?;
    Ok(())
}

/// The operator's delta. A live value from the configured source is offered
/// as the default; without one the operator must type it.
fn resolve_delta<S, R, W>(
    session: &Session<S>,
    prompt: &mut Prompt<R, W>,
    id: &PositionId,
) -> Result<f64>
where
    S: PositionStore,
    R: BufRead,
    W: Write,
{
    if let Some(source) = session.source.as_deref() {
        match session.lifecycle.fetch_delta(id, source)? {
            DeltaQuote::Live { source, delta } => {
                let label =
                    format!("Delta from {source}: {delta:.4}. Enter to accept or type a value: ");
                return Ok(prompt.delta_or(&label, delta)?);
            }
            DeltaQuote::Unavailable { reason } => {
                debug!(%id, %reason, "Falling back to manual delta");
                writeln!(prompt.writer(), "Live delta unavailable: {reason}")?;
            }
        }
    }
    Ok(prompt.delta("Current option delta (0.0 to 1.0): ")?)
}

/// Archive a position after confirmation.
pub fn close<S, R, W>(
    session: &mut Session<S>,
    prompt: &mut Prompt<R, W>,
    id: &PositionId,
    assume_yes: bool,
) -> Result<bool>
where
    S: PositionStore,
    R: BufRead,
    W: Write,
{
    let position = session.lifecycle.get(id)?;
    render::detail(prompt.writer(), &position)?;

    let question = format!("Close {} and move it to history?", position.contract_name);
    if !assume_yes && !prompt.confirm(&question)? {
        writeln!(prompt.writer(), "Kept open.")?;
        return Ok(false);
    }

    let archived = session.lifecycle.close(id)?;
    writeln!(
        prompt.writer(),
        "Closed {} after {} rehedges. Archived to history.",
        archived.position.contract_name,
        archived.position.rehedge_count
    )?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnlog_core::{LifecycleError, MarketError, MemoryStore, OptionType};
    use std::io::Cursor;

    struct Unreachable;

    impl DeltaSource for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }

        fn fetch_delta(&self, _symbol: &str) -> Result<f64, MarketError> {
            Err(MarketError::NetworkUnreachable("timed out".into()))
        }
    }

    struct Fixed(f64);

    impl DeltaSource for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn fetch_delta(&self, _symbol: &str) -> Result<f64, MarketError> {
            Ok(self.0)
        }
    }

    fn session(source: Option<Box<dyn DeltaSource>>) -> Session<MemoryStore> {
        Session::new(PositionLifecycle::new(MemoryStore::new(), "BTC"), source)
    }

    fn prompt(input: &str) -> Prompt<Cursor<&[u8]>, Vec<u8>> {
        Prompt::new(Cursor::new(input.as_bytes()), Vec::new())
    }

    fn text(p: &mut Prompt<Cursor<&[u8]>, Vec<u8>>) -> String {
        String::from_utf8(p.writer().clone()).unwrap()
    }

    fn call() -> NewPosition {
        NewPosition {
            expiry: "27FEB".into(),
            option_type: OptionType::Call,
            strike: 70_000.0,
            size: 0.1,
            entry_delta: 0.5,
            band: 0.0038,
        }
    }

    fn opened(s: &mut Session<MemoryStore>) -> Position {
        open(s, &mut prompt(""), call(), true).unwrap().unwrap()
    }

    #[test]
    fn declined_open_saves_nothing() {
        let mut s = session(None);
        let mut p = prompt("n\n");
        assert!(open(&mut s, &mut p, call(), false).unwrap().is_none());
        assert!(s.lifecycle.list_active().is_empty());
        assert!(text(&mut p).contains("open SHORT perp position of 0.0500"));
    }

    #[test]
    fn confirmed_open_saves() {
        let mut s = session(None);
        let mut p = prompt("y\n");
        let pos = open(&mut s, &mut p, call(), false).unwrap().unwrap();
        assert_eq!(s.lifecycle.get(&pos.id).unwrap(), pos);
    }

    #[test]
    fn invalid_open_is_rejected_before_asking() {
        let mut s = session(None);
        let mut p = prompt("y\n");
        let err = open(&mut s, &mut p, NewPosition { band: 0.0, ..call() }, false).unwrap_err();
        assert!(err.downcast_ref::<dnlog_core::ValidationError>().is_some());
        assert!(!text(&mut p).contains("(y/n)"));
    }

    #[test]
    fn check_falls_back_to_manual_delta_and_applies_on_yes() {
        let mut s = session(Some(Box::new(Unreachable)));
        let pos = opened(&mut s);

        let mut p = prompt("0.55\ny\n");
        check(&mut s, &mut p, &pos.id, None, false).unwrap();

        let out = text(&mut p);
        assert!(out.contains("Live delta unavailable"));
        assert!(out.contains("EXECUTE: SELL 0.0050"));
        let stored = s.lifecycle.get(&pos.id).unwrap();
        assert!((stored.current_hedge - -0.055).abs() < 1e-9);
        assert_eq!(stored.rehedge_count, 1);
    }

    #[test]
    fn check_accepts_live_delta_and_decline_keeps_hedge() {
        let mut s = session(Some(Box::new(Fixed(0.7))));
        let pos = opened(&mut s);

        let mut p = prompt("\nn\n");
        check(&mut s, &mut p, &pos.id, None, false).unwrap();

        assert!(text(&mut p).contains("Delta from fixed: 0.7000"));
        let stored = s.lifecycle.get(&pos.id).unwrap();
        assert_eq!(stored.current_hedge, pos.current_hedge);
        assert_eq!(stored.rehedge_count, 0);
        assert_eq!(stored.last_delta, 0.7);
    }

    #[test]
    fn typed_delta_overrides_live_suggestion() {
        let mut s = session(Some(Box::new(Fixed(0.7))));
        let pos = opened(&mut s);

        let mut p = prompt("0.55\nn\n");
        check(&mut s, &mut p, &pos.id, None, false).unwrap();

        assert!(text(&mut p).contains("EXECUTE: SELL 0.0050"));
        let stored = s.lifecycle.get(&pos.id).unwrap();
        assert_eq!(stored.last_delta, 0.55);
        assert_eq!(stored.rehedge_count, 0);
    }

    #[test]
    fn check_inside_band_asks_nothing() {
        let mut s = session(None);
        let pos = opened(&mut s);

        let mut p = prompt("");
        check(&mut s, &mut p, &pos.id, Some(0.52), false).unwrap();
        let out = text(&mut p);
        assert!(out.contains("SAFE"));
        assert!(!out.contains("(y/n)"));
    }

    #[test]
    fn close_requires_confirmation() {
        let mut s = session(None);
        let pos = opened(&mut s);

        assert!(!close(&mut s, &mut prompt("n\n"), &pos.id, false).unwrap());
        assert_eq!(s.lifecycle.list_active().len(), 1);

        assert!(close(&mut s, &mut prompt("y\n"), &pos.id, false).unwrap());
        assert!(s.lifecycle.list_active().is_empty());
        assert_eq!(s.lifecycle.list_history().len(), 1);

        let err = close(&mut s, &mut prompt(""), &pos.id, true).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LifecycleError>(),
            Some(LifecycleError::NotFound { .. })
        ));
    }
}
