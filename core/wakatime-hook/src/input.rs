//! Newline-delimited editor events on stdin.
//!
//! Lines that are not UTF-8 or do not parse as an event are logged and
//! skipped; only a failing read ends the stream.

use std::io::BufRead;

use wakatime_core::EditorEvent;

use crate::error::HookError;

/// Calls `handle` for every well-formed event in `reader`, in order.
pub fn for_each_event(
    mut reader: impl BufRead,
    mut handle: impl FnMut(EditorEvent),
) -> Result<(), HookError> {
    let mut buf = Vec::new();
    let mut line_no = 0usize;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).map_err(HookError::Stdin)? == 0 {
            return Ok(());
        }
        line_no += 1;

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(err) => {
                tracing::warn!(line = line_no, error = %err, "Skipping editor event that is not UTF-8");
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }
        match EditorEvent::parse_line(line) {
            Ok(event) => handle(event),
            Err(err) => {
                tracing::warn!(line = line_no, error = %err, "Skipping malformed editor event");
            }
        }
    }
}
