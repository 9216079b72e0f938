//! Decoding of a worker's stdout.
//!
//! Workers report progress with marker lines on stdout, mixed in with the JSON result they print
//! when they are done:
//!
//! - a line that is exactly `!+` means a sub-step started,
//! - a line that is exactly `!-` means a sub-step finished,
//! - everything else is part of the JSON result.
//!
//! Output arrives in chunks that need not end on a line boundary, so a line is only checked for a
//! marker once its newline has arrived.

use stampede_summary_model::{RunOutput, WorkerResult};

const STEP_STARTED: &[u8] = b"!+";
const STEP_FINISHED: &[u8] = b"!-";

/// A progress marker found on a worker's stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolEvent {
    StepStarted,
    StepFinished,
}

#[derive(Debug, Default)]
pub struct StreamProtocolParser {
    /// Bytes of the line currently being received
    line: Vec<u8>,
    /// Everything that wasn't a marker, in the order it was received
    payload: Vec<u8>,
}

impl StreamProtocolParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk of output, returning any markers it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ProtocolEvent> {
        let mut events = Vec::new();

        let mut rest = chunk;
        while let Some(newline) = rest.iter().position(|b| *b == b'\n') {
            self.line.extend_from_slice(&rest[..newline]);
            rest = &rest[newline + 1..];

            match self.line.as_slice() {
                STEP_STARTED => events.push(ProtocolEvent::StepStarted),
                STEP_FINISHED => events.push(ProtocolEvent::StepFinished),
                line => {
                    self.payload.extend_from_slice(line);
                    self.payload.push(b'\n');
                }
            }
            self.line.clear();
        }
        self.line.extend_from_slice(rest);

        events
    }

    /// The payload received so far, not counting an unfinished last line.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// End of stream. Whatever is left is the worker's result.
    ///
    /// An unterminated last line is never a marker. A payload that isn't a JSON object gives
    /// [RunOutput::Invalid] with the text kept as it was received.
    pub fn finish(mut self) -> RunOutput {
        self.payload.append(&mut self.line);

        match parse_worker_result(&self.payload) {
            Ok(result) => RunOutput::Parsed(result),
            Err(error) => RunOutput::Invalid {
                raw: raw_text(&self.payload),
                error,
            },
        }
    }

    /// The stream broke before it ended. Everything received so far is kept as the raw output.
    pub fn abort(mut self, error: String) -> RunOutput {
        self.payload.append(&mut self.line);

        RunOutput::Invalid {
            raw: raw_text(&self.payload),
            error,
        }
    }
}

/// Output as text. Bytes that aren't valid UTF-8 are escaped rather than replaced, so nothing is
/// lost.
fn raw_text(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => payload.escape_ascii().to_string(),
    }
}

fn parse_worker_result(payload: &[u8]) -> Result<WorkerResult, String> {
    let value: serde_json::Value = serde_json::from_slice(payload).map_err(|e| e.to_string())?;
    if !value.is_object() {
        return Err(format!("expected a JSON object, got `{value}`"));
    }

    serde_json::from_value(value).map_err(|e| e.to_string())
}
