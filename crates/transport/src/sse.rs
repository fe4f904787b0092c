use crate::error::{Result, TransportError};

pub const DONE_MARKER: &str = "[DONE]";

/// One dispatched `data:` payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub data: String,
}

impl SseEvent {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }

    /// End-of-stream marker, case-insensitive
    pub fn is_done(&self) -> bool {
        self.data.eq_ignore_ascii_case(DONE_MARKER)
    }
}

/// Line-oriented event-stream state machine.
///
/// A `data:` line sets the pending payload and a blank line dispatches it.
/// `[DONE]` ends the stream and is only handed out when `emit_done` is set.
/// `event:` lines and `:` comments carry nothing; any other line is an error.
#[derive(Debug, Default)]
pub struct SseSegmenter {
    buffer: Vec<u8>,
    pending: Option<SseEvent>,
    emit_done: bool,
    finished: bool,
}

impl SseSegmenter {
    pub fn new(emit_done: bool) -> Self {
        Self {
            emit_done,
            ..Self::default()
        }
    }

    /// Stream reached `[DONE]`; later input is ignored
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed raw bytes and drain the events completed by them.
    ///
    /// Partial lines stay buffered until their newline arrives.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<SseEvent>> {
        let mut events = Vec::new();
        if self.finished {
            return Ok(events);
        }
        self.buffer.extend_from_slice(bytes);

        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = std::str::from_utf8(&raw).map_err(|_| TransportError::InvalidEncoding)?;
            self.push_line(line.trim_end_matches(['\n', '\r']), &mut events)?;
            if self.finished {
                self.buffer.clear();
                break;
            }
        }
        Ok(events)
    }

    /// Segment a complete stream in one shot
    pub fn segment(input: &str, emit_done: bool) -> Result<Vec<SseEvent>> {
        let mut segmenter = Self::new(emit_done);
        let mut events = Vec::new();
        for line in input.lines() {
            segmenter.push_line(line, &mut events)?;
            if segmenter.finished {
                break;
            }
        }
        Ok(events)
    }

    fn push_line(&mut self, line: &str, events: &mut Vec<SseEvent>) -> Result<()> {
        if let Some(data) = line.strip_prefix("data:") {
            self.pending = Some(SseEvent::new(data.trim()));
            return Ok(());
        }

        if line.is_empty() {
            if let Some(event) = self.pending.take() {
                if event.is_done() {
                    self.finished = true;
                    if self.emit_done {
                        events.push(event);
                    }
                } else {
                    events.push(event);
                }
            }
            return Ok(());
        }

        if let Some(name) = line.strip_prefix("event:") {
            if name.trim() == "ping" {
                log::trace!("Skipping ping event");
            }
            return Ok(());
        }

        if line.starts_with(':') {
            return Ok(());
        }

        Err(TransportError::InvalidFormat(line.to_string()))
    }
}
