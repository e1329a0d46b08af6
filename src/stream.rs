//! Incremental stream synchronization for generated text.
//!
//! A generator reports its output as a sequence of fragments. Well-behaved
//! generators send the cumulative text so far, so each fragment extends the
//! previous one; others send unrelated pieces. [`StreamSynchronizer`] turns
//! either kind of sequence into the minimal deltas needed to keep every
//! registered [`Sink`] byte-for-byte in sync, flushing each delta as soon as
//! it is known.

use std::io::{self, Write};

use crate::observability::{
    STREAM_BYTES, STREAM_ENCODING_FALLBACKS, STREAM_FRAGMENTS, STREAM_NON_EXTENDING,
    STREAM_SINK_ERRORS,
};

///////////////////////////////////////////// Sink /////////////////////////////////////////////

/// A destination for streamed output.
///
/// Implementations must make the text visible (flushed) before returning.
pub trait Sink {
    /// Writes `text` and flushes it.
    fn write_delta(&mut self, text: &str) -> io::Result<()>;
}

impl Sink for Vec<u8> {
    fn write_delta(&mut self, text: &str) -> io::Result<()> {
        self.write_all(text.as_bytes())
    }
}

////////////////////////////////////////// StreamState //////////////////////////////////////////

/// Cumulative text already emitted for the current turn.
///
/// Created fresh for every turn. Everything held here has already been
/// handed to the sinks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamState {
    previous: String,
}

impl StreamState {
    /// Creates an empty state for a new turn.
    pub fn new() -> Self {
        Self::default()
    }

    /// The cumulative text emitted so far.
    pub fn previous(&self) -> &str {
        &self.previous
    }

    /// Consumes the state, returning the cumulative text.
    pub fn into_text(self) -> String {
        self.previous
    }

    /// Folds `fragment` into the state and returns the part of it that has
    /// not been emitted yet.
    ///
    /// A fragment that starts with the cumulative text replaces it and yields
    /// only its unseen suffix. Any other fragment is yielded whole and
    /// appended, so the cumulative text only ever grows.
    pub fn advance<'f>(&mut self, fragment: &'f str) -> &'f str {
        match fragment.strip_prefix(self.previous.as_str()) {
            Some(delta) => {
                self.previous.clear();
                self.previous.push_str(fragment);
                delta
            }
            None => {
                STREAM_NON_EXTENDING.click();
                self.previous.push_str(fragment);
                fragment
            }
        }
    }
}

/////////////////////////////////////// StreamSynchronizer ///////////////////////////////////////

/// Replicates generator fragments to a set of sinks as minimal deltas.
pub struct StreamSynchronizer<'a> {
    state: StreamState,
    sinks: Vec<&'a mut dyn Sink>,
}

impl<'a> StreamSynchronizer<'a> {
    /// Creates a synchronizer with a fresh [`StreamState`] writing to `sinks`.
    pub fn new(sinks: Vec<&'a mut dyn Sink>) -> Self {
        Self {
            state: StreamState::new(),
            sinks,
        }
    }

    /// Handles one fragment from the generator.
    ///
    /// Fragments are expected as UTF-8. A fragment that does not decode (for
    /// example, a token boundary that splits a multi-byte character) is
    /// decoded lossily, dropping the undecodable bytes, and the delta is
    /// derived from that. This never fails; sink errors are logged and
    /// counted.
    pub fn emit(&mut self, fragment: &[u8]) {
        STREAM_FRAGMENTS.click();
        match std::str::from_utf8(fragment) {
            Ok(text) => {
                let delta = self.state.advance(text);
                self.write(delta);
            }
            Err(err) => {
                STREAM_ENCODING_FALLBACKS.click();
                log::debug!("fragment is not valid UTF-8 ({err}); decoding lossily");
                let safe = decode_lossy(fragment);
                let delta = self.state.advance(&safe);
                self.write(delta);
            }
        }
    }

    /// Convenience for generators that already produce `&str`.
    pub fn emit_str(&mut self, fragment: &str) {
        self.emit(fragment.as_bytes());
    }

    /// The state accumulated so far this turn.
    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Ends the turn, releasing the sinks and returning the final state.
    pub fn finish(self) -> StreamState {
        self.state
    }

    fn write(&mut self, delta: &str) {
        if delta.is_empty() {
            return;
        }
        STREAM_BYTES.count(delta.len() as u64);
        for sink in self.sinks.iter_mut() {
            if let Err(err) = sink.write_delta(delta) {
                if err.kind() == io::ErrorKind::InvalidData {
                    STREAM_ENCODING_FALLBACKS.click();
                    let safe = sanitize_for_sink(delta);
                    if let Err(err) = sink.write_delta(&safe) {
                        STREAM_SINK_ERRORS.click();
                        log::warn!("sink rejected sanitized output: {err}");
                    }
                } else {
                    STREAM_SINK_ERRORS.click();
                    log::warn!("sink write failed: {err}");
                }
            }
        }
    }
}

/// Decodes `bytes` as UTF-8, dropping any invalid sequences.
pub fn decode_lossy(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

/// Reduces `text` to characters every terminal and file can take.
fn sanitize_for_sink(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii()).collect()
}
