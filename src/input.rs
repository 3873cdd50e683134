use crate::error::Result;
use crate::pipeline::Pipeline;
use std::borrow::Cow;
use std::io::BufRead;
use tracing::{debug, info, warn};

/// Feed newline-delimited records from `reader` into `pipeline`
///
/// Stops at the first line equal to `end_marker`, or at end of input. Bytes that are not
/// valid UTF-8 are replaced with U+FFFD rather than ending the stream. Returns the number of
/// records fed; a record the pipeline refuses aborts feeding with that error.
pub fn feed_lines<R: BufRead>(pipeline: &Pipeline, mut reader: R, end_marker: &str) -> Result<usize> {
    let mut fed = 0;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = strip_line_ending(&buf);
        let record = match String::from_utf8_lossy(line) {
            Cow::Borrowed(valid) => valid.to_owned(),
            Cow::Owned(repaired) => {
                warn!(line = fed + 1, "input line is not valid UTF-8, replacing invalid bytes");
                repaired
            }
        };

        if record == end_marker {
            debug!(records = fed, "end marker read");
            return Ok(fed);
        }
        pipeline.feed(record)?;
        fed += 1;
    }

    info!(records = fed, "input ended without end marker");
    Ok(fed)
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
