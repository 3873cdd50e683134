//! Built-in text transforms
//!
//! Each transform is stateless apart from its output writer: one record in, one record out.

use crate::error::{PipelineError, Result};
use crate::stage::{Record, Transform};
use std::io::{self, Write};
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Default pause between characters for [`Typewriter`]
pub const TYPEWRITER_DELAY: Duration = Duration::from_millis(100);

fn flush_error(stage: &str, e: io::Error) -> PipelineError {
    PipelineError::Transform {
        stage: stage.to_string(),
        message: format!("could not flush output: {e}"),
    }
}

/// Converts every character to upper case
#[derive(Debug, Default)]
pub struct Uppercaser;

impl Transform for Uppercaser {
    fn process(&mut self, input: Record) -> Option<Record> {
        Some(input.to_uppercase())
    }

    fn name(&self) -> &str {
        "uppercaser"
    }
}

/// Reverses the order of the characters
#[derive(Debug, Default)]
pub struct Flipper;

impl Transform for Flipper {
    fn process(&mut self, input: Record) -> Option<Record> {
        Some(input.chars().rev().collect())
    }

    fn name(&self) -> &str {
        "flipper"
    }
}

/// Moves every character one position to the right; the last one wraps to the front
#[derive(Debug, Default)]
pub struct Rotator;

impl Transform for Rotator {
    fn process(&mut self, input: Record) -> Option<Record> {
        let Some(last) = input.chars().next_back() else {
            return Some(input);
        };
        let mut output = String::with_capacity(input.len());
        output.push(last);
        output.push_str(&input[..input.len() - last.len_utf8()]);
        Some(output)
    }

    fn name(&self) -> &str {
        "rotator"
    }
}

/// Puts a space between every pair of characters
#[derive(Debug, Default)]
pub struct Expander;

impl Transform for Expander {
    fn process(&mut self, input: Record) -> Option<Record> {
        let mut output = String::with_capacity(input.len() * 2);
        for (i, c) in input.chars().enumerate() {
            if i > 0 {
                output.push(' ');
            }
            output.push(c);
        }
        Some(output)
    }

    fn name(&self) -> &str {
        "expander"
    }
}

/// Writes every record on its own line and passes it through unchanged
pub struct Logger {
    out: Box<dyn Write + Send>,
}

impl Logger {
    /// Log to standard output
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }

    pub fn with_writer(out: impl Write + Send + 'static) -> Self {
        Self { out: Box::new(out) }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for Logger {
    fn process(&mut self, input: Record) -> Option<Record> {
        if let Err(e) = writeln!(self.out, "{input}") {
            warn!(stage = "logger", error = %e, "could not write record");
        }
        Some(input)
    }

    fn on_shutdown(&mut self) -> Result<()> {
        self.out.flush().map_err(|e| flush_error("logger", e))
    }

    fn name(&self) -> &str {
        "logger"
    }
}

/// Prints each record one character at a time, then passes it through unchanged
pub struct Typewriter {
    out: Box<dyn Write + Send>,
    delay: Duration,
}

impl Typewriter {
    pub fn new() -> Self {
        Self::with_writer(io::stdout(), TYPEWRITER_DELAY)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self::with_writer(io::stdout(), delay)
    }

    pub fn with_writer(out: impl Write + Send + 'static, delay: Duration) -> Self {
        Self {
            out: Box::new(out),
            delay,
        }
    }

    fn type_out(&mut self, input: &str) -> io::Result<()> {
        write!(self.out, "[typewriter] ")?;
        let mut buf = [0u8; 4];
        for c in input.chars() {
            self.out.write_all(c.encode_utf8(&mut buf).as_bytes())?;
            self.out.flush()?;
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
        }
        writeln!(self.out)?;
        self.out.flush()
    }
}

impl Default for Typewriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for Typewriter {
    fn process(&mut self, input: Record) -> Option<Record> {
        if let Err(e) = self.type_out(&input) {
            warn!(stage = "typewriter", error = %e, "could not write record");
        }
        Some(input)
    }

    fn on_shutdown(&mut self) -> Result<()> {
        self.out.flush().map_err(|e| flush_error("typewriter", e))
    }

    fn name(&self) -> &str {
        "typewriter"
    }
}
