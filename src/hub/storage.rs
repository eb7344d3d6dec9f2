//! Composes the Resource map, Notification Bus, and Reader Registry into
//! the Create / Write / Close / GetStreamReader / background-disposer
//! contract of spec §4.4.
//!
//! Locking discipline (spec §5): the resource-map lock is always dropped
//! before calling into the Notification Bus, since the Bus's request/reply
//! round-trip can suspend the caller.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use super::notification_bus::{self, BusHandle};
use super::reader_registry::ReaderRegistry;
use super::resource::{ReadOutcome, Resource};
use crate::error::HubError;

#[derive(Debug)]
pub(crate) struct Storage {
    resources: RwLock<HashMap<String, Arc<Resource>>>,
    bus: BusHandle,
    registry: ReaderRegistry,
}

impl Storage {
    pub(crate) fn new() -> (Arc<Self>, tokio::task::JoinHandle<()>) {
        let (release_tx, release_rx) = mpsc::channel(256);
        let storage = Arc::new(Self {
            resources: RwLock::new(HashMap::new()),
            bus: notification_bus::spawn(),
            registry: ReaderRegistry::new(release_tx),
        });

        let disposer = tokio::spawn(run_disposer(Arc::clone(&storage), release_rx));
        (storage, disposer)
    }

    pub(crate) async fn create(&self, id: &str) -> Result<(), HubError> {
        {
            let mut resources = self.resources.write().await;
            if resources.contains_key(id) {
                return Err(HubError::StreamAlreadyExists);
            }
            resources.insert(id.to_owned(), Arc::new(Resource::new()));
        }

        if let Err(err) = self.bus.register_topic(id.to_owned()).await {
            self.resources.write().await.remove(id);
            return Err(err);
        }

        self.registry.created(id).await;
        Ok(())
    }

    pub(crate) async fn write(&self, id: &str, data: &[u8]) -> Result<usize, HubError> {
        let resource = {
            let resources = self.resources.read().await;
            resources.get(id).cloned().ok_or(HubError::UnknownStream)?
        };

        let n = resource.write(data).await?;
        self.bus.notify(id.to_owned()).await;
        Ok(n)
    }

    pub(crate) async fn close(&self, id: &str, err: Option<HubError>) -> Result<(), HubError> {
        let resource = {
            let resources = self.resources.read().await;
            resources.get(id).cloned().ok_or(HubError::UnknownStream)?
        };

        resource.close(err.clone()).await?;
        self.bus.close_topic(id.to_owned(), err).await;
        self.registry.closed(id).await
    }

    pub(crate) async fn get_stream_reader(
        self: &Arc<Self>,
        id: &str,
    ) -> Result<StreamReader, HubError> {
        self.registry.created(id).await;

        let exists = self.resources.read().await.contains_key(id);
        if !exists {
            self.registry.closed(id).await?;
            return Err(HubError::UnknownStream);
        }

        Ok(StreamReader {
            id: id.to_owned(),
            storage: Arc::clone(self),
        })
    }

    async fn read_at(&self, id: &str, buf: &mut [u8], off: usize) -> Result<usize, HubError> {
        loop {
            let resource = {
                let resources = self.resources.read().await;
                match resources.get(id) {
                    Some(r) => Arc::clone(r),
                    None => return Err(HubError::UnknownStream),
                }
            };

            match resource.read_at(buf, off).await {
                ReadOutcome::Data(n) => return Ok(n),
                ReadOutcome::Eof => return Ok(0),
                ReadOutcome::Err(err) => return Err(err),
                ReadOutcome::NoProgress => {
                    let rx = self.bus.subscribe(id.to_owned()).await;
                    match rx.await {
                        Ok(notification) if !notification.closed => continue,
                        Ok(notification) => match notification.err {
                            Some(err) => return Err(err),
                            None => continue,
                        },
                        Err(_) => return Err(HubError::Cancelled),
                    }
                }
            }
        }
    }

    async fn reader_closed(&self, id: &str) -> Result<(), HubError> {
        self.registry.closed(id).await
    }

    async fn dispose(&self, id: &str) {
        self.resources.write().await.remove(id);
    }
}

/// Thin handle returned by `Storage::get_stream_reader`. Implements the
/// `ReadAt → NoProgress → Subscribe → wake → retry` loop described in spec
/// §4.4 and §9 ("the core pattern").
#[derive(Debug)]
pub(crate) struct StreamReader {
    id: String,
    storage: Arc<Storage>,
}

impl StreamReader {
    pub(crate) async fn read_at(&self, buf: &mut [u8], off: usize) -> Result<usize, HubError> {
        self.storage.read_at(&self.id, buf, off).await
    }

    pub(crate) async fn close(&self) -> Result<(), HubError> {
        self.storage.reader_closed(&self.id).await
    }
}

async fn run_disposer(storage: Arc<Storage>, mut release_rx: mpsc::Receiver<String>) {
    while let Some(id) = release_rx.recv().await {
        storage.dispose(&id).await;
    }
}
