//! Incremental decoding of `text/event-stream` completion bodies
//!
//! Bytes arrive in arbitrary chunks: a chunk may end mid-line or even in the
//! middle of a multi-byte UTF-8 sequence. The decoder buffers both until a
//! complete line is available.

use serde::Deserialize;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// A decoded stream frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// Non-empty content delta
    Delta(String),
    /// The terminating `[DONE]` sentinel
    Done,
    /// An error envelope sent in-band by the provider
    Error(String),
}

/// Line-oriented SSE decoder with carry-over for partial lines and code points
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending_bytes: Vec<u8>,
    line_buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every frame completed by it
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        let text = self.decode_utf8(bytes);
        self.line_buffer.push_str(&text);

        let mut frames = Vec::new();
        while let Some(pos) = self.line_buffer.find('\n') {
            let line: String = self.line_buffer.drain(..=pos).collect();
            if let Some(frame) = parse_line(line.trim_end_matches(['\n', '\r'])) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush whatever is left once the body has ended
    pub fn finish(&mut self) -> Vec<SseFrame> {
        let mut rest = String::from_utf8_lossy(&std::mem::take(&mut self.pending_bytes)).into_owned();
        rest.insert_str(0, &std::mem::take(&mut self.line_buffer));
        rest.lines()
            .filter_map(|line| parse_line(line.trim_end_matches('\r')))
            .collect()
    }

    fn decode_utf8(&mut self, bytes: &[u8]) -> String {
        self.pending_bytes.extend_from_slice(bytes);
        match std::str::from_utf8(&self.pending_bytes) {
            Ok(text) => {
                let text = text.to_owned();
                self.pending_bytes.clear();
                text
            }
            // Incomplete sequence at the tail: keep it for the next chunk
            Err(e) if e.error_len().is_none() => {
                let tail = self.pending_bytes.split_off(e.valid_up_to());
                let text = String::from_utf8_lossy(&self.pending_bytes).into_owned();
                self.pending_bytes = tail;
                text
            }
            Err(_) => {
                let text = String::from_utf8_lossy(&self.pending_bytes).into_owned();
                self.pending_bytes.clear();
                text
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
}

/// Parse a single line; anything that is not a usable `data:` frame yields `None`
fn parse_line(line: &str) -> Option<SseFrame> {
    let payload = line.strip_prefix(DATA_PREFIX)?;
    if payload.trim() == DONE_SENTINEL {
        return Some(SseFrame::Done);
    }

    match serde_json::from_str::<StreamEvent>(payload) {
        Ok(event) => {
            if let Some(error) = event.error {
                return Some(SseFrame::Error(error.message));
            }
            event
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta)
                .and_then(|delta| delta.content)
                .filter(|content| !content.is_empty())
                .map(SseFrame::Delta)
        }
        Err(e) => {
            tracing::warn!(error = %e, line = %payload, "Skipping malformed stream event");
            None
        }
    }
}
