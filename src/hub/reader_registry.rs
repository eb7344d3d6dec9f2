//! Reference counts the live readers+writer per stream; emits a release
//! event when the count hits zero (spec §4.3).

use std::collections::HashMap;

use tokio::sync::{mpsc, Mutex};

use crate::error::HubError;

#[derive(Debug)]
pub(crate) struct ReaderRegistry {
    counts: Mutex<HashMap<String, usize>>,
    release_tx: mpsc::Sender<String>,
}

impl ReaderRegistry {
    pub(crate) fn new(release_tx: mpsc::Sender<String>) -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            release_tx,
        }
    }

    pub(crate) async fn created(&self, id: &str) {
        let mut counts = self.counts.lock().await;
        *counts.entry(id.to_owned()).or_insert(0) += 1;
    }

    /// Decrements the handle count for `id`. On transition to zero, the id
    /// is published on the release channel for the disposer and removed
    /// from the table. Returns an error if `id` has no live handles.
    pub(crate) async fn closed(&self, id: &str) -> Result<(), HubError> {
        let should_release = {
            let mut counts = self.counts.lock().await;
            let count = counts.get_mut(id).ok_or(HubError::UnknownStream)?;
            *count -= 1;
            let zero = *count == 0;
            if zero {
                counts.remove(id);
            }
            zero
        };

        if should_release {
            let _ = self.release_tx.send(id.to_owned()).await;
        }

        Ok(())
    }
}
