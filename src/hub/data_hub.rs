//! Public façade: `CreateStream`, `GetStreamOutput`, `GetOrCreateStream`
//! (spec §4.5).

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::storage::Storage;
use super::stream_io::{DataStreamInput, DataStreamOutput};
use crate::error::HubError;

/// The process-wide streaming fan-out registry (spec §9 "Global state").
/// Created once at startup, torn down on shutdown.
pub struct DataHub {
    storage: Arc<Storage>,
    disposer: JoinHandle<()>,
    /// Serializes `get_or_create_stream` so Create and GetStreamOutput are
    /// observed atomically with respect to each other (spec §4.5).
    coalesce_lock: Mutex<()>,
}

impl DataHub {
    pub fn new() -> Self {
        let (storage, disposer) = Storage::new();
        Self {
            storage,
            disposer,
            coalesce_lock: Mutex::new(()),
        }
    }

    pub async fn create_stream(&self, id: &str) -> Result<DataStreamInput, HubError> {
        self.storage.create(id).await?;
        Ok(DataStreamInput::new(id.to_owned(), Arc::clone(&self.storage)))
    }

    pub async fn get_stream_output(&self, id: &str) -> Result<DataStreamOutput, HubError> {
        let reader = self.storage.get_stream_reader(id).await?;
        Ok(DataStreamOutput::new(reader))
    }

    /// Attempts to create the stream; whether or not creation succeeds,
    /// obtains an output. If creation succeeded, `input` is `Some` — the
    /// caller is the producer. If another caller is already producing for
    /// this fingerprint, `input` is `None` and the caller should only read.
    pub async fn get_or_create_stream(
        &self,
        id: &str,
    ) -> Result<(DataStreamOutput, Option<DataStreamInput>), HubError> {
        let _guard = self.coalesce_lock.lock().await;

        let input = match self.storage.create(id).await {
            Ok(()) => Some(DataStreamInput::new(id.to_owned(), Arc::clone(&self.storage))),
            Err(HubError::StreamAlreadyExists) => None,
            Err(err) => return Err(err),
        };

        let output = self.get_stream_output(id).await?;
        Ok((output, input))
    }

    /// Stops the Notification Bus and Disposer tasks, waiting for them to
    /// exit (spec §9 "Teardown must wait for the Notification Bus and
    /// Disposer to exit"). Dropping the last `DataHub` instance drops the
    /// storage's internal bus handle, which the bus task treats as
    /// shutdown; this just awaits the disposer's task join explicitly.
    pub async fn shutdown(self) {
        drop(self.storage);
        let _ = self.disposer.await;
    }
}

impl Default for DataHub {
    fn default() -> Self {
        Self::new()
    }
}
