//! Shared fakes and a minimal single-shot HTTP responder for the
//! integration suites, standing in for the imaginary transform service and
//! the origin host (spec §8's "fake in-process implementations of the
//! cache/transform/fetch ports").

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use imcaxy::cache::{CacheFacade, CachedImage, CachedImagesRepository, CachedImagesStorage};
use imcaxy::error::CacheError;
use imcaxy::hub::{DataStreamInput, DataStreamOutput};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Binds an ephemeral port and, for every accepted connection, replies with
/// a fixed `200 OK` response carrying `body` and `content_type`, then closes
/// the connection. Returns the address clients should hit.
pub async fn spawn_fixed_response_server(body: &'static [u8], content_type: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                // Drain the request so the client's write doesn't block on us.
                let _ = socket.read(&mut buf).await;

                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.write_all(body).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Binds an ephemeral port; the first connection gets a fixed `200 OK`
/// response, every subsequent connection is dropped without a response.
/// Used to prove a caller did NOT re-invoke a service after the first call.
pub async fn spawn_single_shot_response_server(body: &'static [u8], content_type: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut first = true;
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let served_first = first;
            first = false;
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                if served_first {
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.write_all(body).await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Binds an ephemeral port and replies `404 Not Found` to every connection.
pub async fn spawn_not_found_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                    .await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

#[derive(Default)]
pub struct InMemoryRepository {
    rows: Mutex<HashMap<(String, String), CachedImage>>,
}

#[async_trait]
impl CachedImagesRepository for InMemoryRepository {
    async fn create_cached_image_info(&self, info: &CachedImage) -> Result<(), CacheError> {
        let mut rows = self.rows.lock().await;
        let key = (info.fingerprint.clone(), info.processor_name.clone());
        if rows.contains_key(&key) {
            return Err(CacheError::EntryAlreadyExists);
        }
        rows.insert(key, info.clone());
        Ok(())
    }

    async fn delete_cached_image_info(&self, fingerprint: &str, processor_name: &str) -> Result<(), CacheError> {
        self.rows
            .lock()
            .await
            .remove(&(fingerprint.to_owned(), processor_name.to_owned()))
            .map(|_| ())
            .ok_or(CacheError::EntryNotFound)
    }

    async fn get_cached_image_info(&self, fingerprint: &str, processor_name: &str) -> Result<CachedImage, CacheError> {
        self.rows
            .lock()
            .await
            .get(&(fingerprint.to_owned(), processor_name.to_owned()))
            .cloned()
            .ok_or(CacheError::EntryNotFound)
    }

    async fn get_cached_image_infos_of_source(&self, source_url: &str) -> Result<Vec<CachedImage>, CacheError> {
        Ok(self
            .rows
            .lock()
            .await
            .values()
            .filter(|row| row.source_url == source_url)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryStorage {
    blobs: Mutex<HashMap<(String, String), Vec<u8>>>,
}

#[async_trait]
impl CachedImagesStorage for InMemoryStorage {
    async fn save(
        &self,
        fingerprint: &str,
        processor_name: &str,
        _mime_type: &str,
        output: DataStreamOutput,
    ) -> Result<(), CacheError> {
        let mut bytes = Vec::new();
        let mut chunk = [0u8; 64];
        loop {
            let n = output.read_at(&mut chunk, bytes.len() as u64).await?;
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..n]);
        }
        output.close().await.ok();
        self.blobs
            .lock()
            .await
            .insert((fingerprint.to_owned(), processor_name.to_owned()), bytes);
        Ok(())
    }

    async fn get(
        &self,
        fingerprint: &str,
        processor_name: &str,
        input: DataStreamInput,
    ) -> Result<(), (DataStreamInput, CacheError)> {
        let bytes = self
            .blobs
            .lock()
            .await
            .get(&(fingerprint.to_owned(), processor_name.to_owned()))
            .cloned();

        match bytes {
            Some(bytes) => {
                if let Err(e) = input.write(&bytes).await {
                    return Err((input, e.into()));
                }
                if let Err(e) = input.close(None).await {
                    return Err((input, e.into()));
                }
                Ok(())
            }
            None => Err((input, CacheError::EntryNotFound)),
        }
    }

    async fn delete(&self, fingerprint: &str, processor_name: &str) -> Result<(), CacheError> {
        self.blobs
            .lock()
            .await
            .remove(&(fingerprint.to_owned(), processor_name.to_owned()))
            .map(|_| ())
            .ok_or(CacheError::EntryNotFound)
    }
}

pub fn in_memory_cache() -> Arc<dyn CacheFacade> {
    Arc::new(imcaxy::cache::CacheService::new(
        Arc::new(InMemoryRepository::default()),
        Arc::new(InMemoryStorage::default()),
    ))
}

pub fn empty_params() -> BTreeMap<String, Vec<String>> {
    BTreeMap::new()
}
