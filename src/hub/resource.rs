//! Thread-safe append-only byte buffer with a sealed/error terminal state
//! (spec §4.1 "Resource").

use tokio::sync::RwLock;

use crate::error::HubError;

/// Outcome of a `Resource::read_at` call. `NoProgress` is the spec's
/// distinguished sentinel (§4.1) — it must never leak past `hub::storage`,
/// which is the only caller that knows how to subscribe and retry.
pub(crate) enum ReadOutcome {
    /// `n` bytes were copied into the caller's buffer.
    Data(usize),
    /// The resource is sealed and every written byte has already been read.
    Eof,
    /// The resource is sealed with a terminal error.
    Err(HubError),
    /// Not sealed, and there is nothing beyond `off` yet.
    NoProgress,
}

#[derive(Debug)]
struct State {
    bytes: Vec<u8>,
    sealed: bool,
    terminal_error: Option<HubError>,
}

#[derive(Debug)]
pub(crate) struct Resource {
    state: RwLock<State>,
}

impl Resource {
    pub(crate) fn new() -> Self {
        Self {
            state: RwLock::new(State {
                bytes: Vec::new(),
                sealed: false,
                terminal_error: None,
            }),
        }
    }

    pub(crate) async fn read_at(&self, buf: &mut [u8], off: usize) -> ReadOutcome {
        let state = self.state.read().await;

        if off < state.bytes.len() {
            let available = &state.bytes[off..];
            let n = available.len().min(buf.len());
            buf[..n].copy_from_slice(&available[..n]);
            return ReadOutcome::Data(n);
        }

        if !state.sealed {
            return ReadOutcome::NoProgress;
        }

        match &state.terminal_error {
            Some(err) => ReadOutcome::Err(err.clone()),
            None => ReadOutcome::Eof,
        }
    }

    pub(crate) async fn write(&self, data: &[u8]) -> Result<usize, HubError> {
        let mut state = self.state.write().await;
        if state.sealed {
            return Err(HubError::StreamClosedForWriting);
        }
        state.bytes.extend_from_slice(data);
        Ok(data.len())
    }

    pub(crate) async fn close(&self, err: Option<HubError>) -> Result<(), HubError> {
        let mut state = self.state.write().await;
        if state.sealed {
            return Err(HubError::StreamAlreadyClosed);
        }
        state.sealed = true;
        state.terminal_error = err;
        Ok(())
    }
}
