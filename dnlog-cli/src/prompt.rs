//! Line-oriented operator prompts over any reader/writer pair.

use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::str::FromStr;

use dnlog_core::OptionType;

pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Where rendered output goes, so it interleaves correctly with prompts.
    pub fn writer(&mut self) -> &mut W {
        &mut self.output
    }

    /// One trimmed line, or `None` once input is exhausted.
    pub fn line(&mut self, label: &str) -> io::Result<Option<String>> {
        write!(self.output, "{label}")?;
        self.output.flush()?;

        let mut buf = String::new();
        if self.input.read_line(&mut buf)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(buf.trim().to_string()))
    }

    /// Like `line`, but end of input is an error.
    pub fn required_line(&mut self, label: &str) -> io::Result<String> {
        self.line(label)?.ok_or_else(input_closed)
    }

    /// Re-prompt until the answer parses as `T`.
    pub fn parsed<T>(&mut self, label: &str) -> io::Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        loop {
            let answer = self.required_line(label)?;
            match answer.parse() {
                Ok(value) => return Ok(value),
                Err(e) => writeln!(self.output, "Invalid input: {e}. Try again.")?,
            }
        }
    }

    /// Re-prompt until the answer is a finite number.
    pub fn float(&mut self, label: &str) -> io::Result<f64> {
        loop {
            let answer = self.required_line(label)?;
            match answer.parse::<f64>() {
                Ok(value) if value.is_finite() => return Ok(value),
                _ => writeln!(self.output, "Invalid number. Try again.")?,
            }
        }
    }

    /// Re-prompt until the answer is a delta in [-1, 1].
    pub fn delta(&mut self, label: &str) -> io::Result<f64> {
        loop {
            let value = self.float(label)?;
            if value.abs() <= 1.0 {
                return Ok(value);
            }
            writeln!(self.output, "Delta must be between -1 and 1. Try again.")?;
        }
    }

    /// Like `delta`, but a blank answer (or end of input) takes `suggested`.
    pub fn delta_or(&mut self, label: &str, suggested: f64) -> io::Result<f64> {
        loop {
            let answer = match self.line(label)? {
                Some(answer) if !answer.is_empty() => answer,
                _ => return Ok(suggested),
            };
            match answer.parse::<f64>() {
                Ok(value) if value.is_finite() && value.abs() <= 1.0 => return Ok(value),
                Ok(value) if value.is_finite() => {
                    writeln!(self.output, "Delta must be between -1 and 1. Try again.")?
                }
                _ => writeln!(self.output, "Invalid number. Try again.")?,
            }
        }
    }

    pub fn option_type(&mut self, label: &str) -> io::Result<OptionType> {
        self.parsed(label)
    }

    /// Re-prompt until the answer is not blank.
    pub fn non_empty(&mut self, label: &str) -> io::Result<String> {
        loop {
            let answer = self.required_line(label)?;
            if !answer.is_empty() {
                return Ok(answer);
            }
        }
    }

    /// `y`/`yes` confirms. Anything else, including end of input, declines.
    pub fn confirm(&mut self, question: &str) -> io::Result<bool> {
        let answer = self.line(&format!("{question} (y/n): "))?;
        Ok(answer
            .map(|a| a.eq_ignore_ascii_case("y") || a.eq_ignore_ascii_case("yes"))
            .unwrap_or(false))
    }
}

pub fn input_closed() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "input closed")
}

/// True if `err` (anywhere in its chain) is the end of operator input.
pub fn is_input_closed(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::UnexpectedEof)
    })
}
