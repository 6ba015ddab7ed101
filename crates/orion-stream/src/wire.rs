//! Newline-delimited JSON decoding for backend events.

use std::collections::VecDeque;

use futures::{Stream, StreamExt as _, stream};
use tracing::debug;

use crate::event::InboundEvent;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid event JSON: {0}")]
    Json(String),
    #[error("event has a blank request id")]
    BlankRequestId,
}

/// Strict decode of one JSON event.
pub fn parse_event(raw: &str) -> Result<InboundEvent, DecodeError> {
    let event: InboundEvent =
        serde_json::from_str(raw).map_err(|e| DecodeError::Json(e.to_string()))?;
    if event.request_id.is_blank() {
        return Err(DecodeError::BlankRequestId);
    }
    Ok(event)
}

/// Lenient decode: malformed or unknown events are dropped.
pub fn decode_event(raw: &str) -> Option<InboundEvent> {
    match parse_event(raw) {
        Ok(event) => Some(event),
        Err(err) => {
            debug!(error = %err, len = raw.len(), "dropping undecodable event");
            None
        }
    }
}

/// Splits raw transport chunks into events, one JSON document per line.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<InboundEvent> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(idx) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=idx).collect();
            if let Some(event) = decode_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Decodes whatever is left after the final chunk.
    pub fn finish(&mut self) -> Option<InboundEvent> {
        let rest = std::mem::take(&mut self.buf);
        decode_line(&rest)
    }

    pub fn pending_bytes(&self) -> usize {
        self.buf.len()
    }
}

fn decode_line(bytes: &[u8]) -> Option<InboundEvent> {
    let text = String::from_utf8_lossy(bytes);
    let line = text.trim();
    if line.is_empty() {
        return None;
    }
    decode_event(line)
}

/// Adapts a stream of byte chunks into a stream of decoded events.
pub fn decode_stream<S, B>(chunks: S) -> impl Stream<Item = InboundEvent>
where
    S: Stream<Item = B> + Unpin,
    B: AsRef<[u8]>,
{
    let state = (chunks, LineDecoder::default(), VecDeque::new(), false);
    stream::unfold(state, |(mut chunks, mut decoder, mut ready, mut done)| async move {
        loop {
            if let Some(event) = ready.pop_front() {
                return Some((event, (chunks, decoder, ready, done)));
            }
            if done {
                return None;
            }
            match chunks.next().await {
                Some(chunk) => ready.extend(decoder.push_chunk(chunk.as_ref())),
                None => {
                    done = true;
                    ready.extend(decoder.finish());
                }
            }
        }
    })
}
