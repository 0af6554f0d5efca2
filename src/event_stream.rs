//! Incremental decoder for the job event stream
//!
//! The backend answers `POST /api/download` with a `text/event-stream` body made of
//! `event: <type>` and `data: <json>` lines. Chunks arrive at arbitrary boundaries,
//! so the decoder keeps the trailing partial line (as raw bytes, which also keeps
//! split multibyte characters intact) and only interprets complete lines.
//!
//! The decoder performs no I/O. Memory use is bounded by the longest partial line:
//! consumed lines are drained after every chunk.

const EVENT_MARKER: &str = "event:";
const DATA_MARKER: &str = "data:";

/// One decoded `(event type, payload)` pair
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamFrame {
    /// Event type from the most recent `event:` line
    pub event: String,
    /// Raw text following the `data:` marker
    pub data: String,
}

impl StreamFrame {
    /// Create a frame
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }
}

/// Line-oriented decoder that turns byte chunks into [`StreamFrame`]s
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buffer: Vec<u8>,
    current_event: Option<String>,
}

impl EventStreamDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return the frames completed by it, in arrival order
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut consumed = 0;
        while let Some(pos) = self.buffer[consumed..].iter().position(|b| *b == b'\n') {
            let line = &self.buffer[consumed..consumed + pos];
            if let Some(frame) = decode_line(line, &mut self.current_event) {
                frames.push(frame);
            }
            consumed += pos + 1;
        }
        self.buffer.drain(..consumed);

        frames
    }

    /// Bytes currently held as an incomplete line
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// End the stream, discarding any incomplete trailing line
    ///
    /// Returns the number of discarded bytes.
    pub fn finish(&mut self) -> usize {
        let dropped = self.buffer.len();
        if dropped > 0 {
            tracing::debug!(bytes = dropped, "discarding incomplete line at end of stream");
        }
        self.buffer.clear();
        self.current_event = None;
        dropped
    }
}

fn decode_line(raw: &[u8], current_event: &mut Option<String>) -> Option<StreamFrame> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let line = String::from_utf8_lossy(raw);

    if let Some(event) = line.strip_prefix(EVENT_MARKER) {
        *current_event = Some(field_value(event).to_string());
        return None;
    }

    if let Some(data) = line.strip_prefix(DATA_MARKER) {
        return match current_event {
            Some(event) => Some(StreamFrame::new(event.clone(), field_value(data))),
            None => {
                tracing::trace!("ignoring data line before any event line");
                None
            }
        };
    }

    None
}

fn field_value(rest: &str) -> &str {
    rest.strip_prefix(' ').unwrap_or(rest)
}
