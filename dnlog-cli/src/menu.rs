//! Interactive menu loop.
//!
//! Errors from a single action are shown and the menu continues; only the end
//! of operator input (or a broken output stream) leaves the loop.

use std::io::{BufRead, Write};

use anyhow::Result;
use dnlog_core::{PositionId, PositionStore};

use crate::commands::{self, Session};
use crate::prompt::{is_input_closed, Prompt};

const CHOICES: &str = "[n] new  [c] check delta  [x] close  [h] history  [q] quit";

pub fn run<S, R, W>(session: &mut Session<S>, prompt: &mut Prompt<R, W>) -> Result<()>
where
    S: PositionStore,
    R: BufRead,
    W: Write,
{
    loop {
        writeln!(prompt.writer())?;
        commands::list(session, prompt.writer())?;
        writeln!(prompt.writer(), "{CHOICES}")?;

        let Some(choice) = prompt.line("Select: ")? else {
            return Ok(());
        };

        let outcome = match choice.to_ascii_lowercase().as_str() {
            "n" | "1" => new_position(session, prompt),
            "c" | "2" => match select(session, prompt)? {
                Some(id) => commands::check(session, prompt, &id, None, false),
                None => Ok(()),
            },
            "x" | "3" => match select(session, prompt)? {
                Some(id) => commands::close(session, prompt, &id, false).map(|_| ()),
                None => Ok(()),
            },
            "h" | "4" => commands::history(session, prompt.writer()),
            "q" | "5" | "quit" | "exit" => return Ok(()),
            "" => Ok(()),
            other => {
                writeln!(prompt.writer(), "Unknown choice '{other}'.")?;
                Ok(())
            }
        };

        if let Err(e) = outcome {
            if is_input_closed(&e) {
                return Ok(());
            }
            writeln!(prompt.writer(), "Error: {e:#}")?;
        }
    }
}

/// Prompt for a new position, restarting the form while the values are rejected.
fn new_position<S, R, W>(session: &mut Session<S>, prompt: &mut Prompt<R, W>) -> Result<()>
where
    S: PositionStore,
    R: BufRead,
    W: Write,
{
    loop {
        let intent = commands::read_new_position(prompt)?;
        if let Err(e) = intent.validate() {
            writeln!(prompt.writer(), "Invalid position: {e}. Start again.")?;
            continue;
        }
        commands::open(session, prompt, intent, false)?;
        return Ok(());
    }
}

/// Pick an active position by list number or id. Blank cancels.
fn select<S, R, W>(session: &Session<S>, prompt: &mut Prompt<R, W>) -> Result<Option<PositionId>>
where
    S: PositionStore,
    R: BufRead,
    W: Write,
{
    let active = session.lifecycle.list_active().items;
    if active.is_empty() {
        writeln!(prompt.writer(), "No active positions.")?;
        return Ok(None);
    }

    loop {
        let answer = prompt.required_line("Position # or id (blank to cancel): ")?;
        if answer.is_empty() {
            return Ok(None);
        }
        if let Ok(n) = answer.parse::<usize>() {
            if let Some(p) = n.checked_sub(1).and_then(|i| active.get(i)) {
                return Ok(Some(p.id.clone()));
            }
        }
        if let Some(p) = active.iter().find(|p| p.id.as_str() == answer) {
            return Ok(Some(p.id.clone()));
        }
        writeln!(prompt.writer(), "No active position '{answer}'.")?;
    }
}
