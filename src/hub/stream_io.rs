//! `DataStreamInput` / `DataStreamOutput` handles (spec §4.5).

use std::sync::Arc;
use tokio::sync::Mutex;

use super::storage::{Storage, StreamReader};
use crate::error::HubError;

/// The unique write capability for a stream. Constructed only by
/// `DataHub::create_stream` / `DataHub::get_or_create_stream`.
#[derive(Debug)]
pub struct DataStreamInput {
    id: String,
    storage: Arc<Storage>,
}

impl DataStreamInput {
    pub(crate) fn new(id: String, storage: Arc<Storage>) -> Self {
        Self { id, storage }
    }

    pub async fn write(&self, data: &[u8]) -> Result<usize, HubError> {
        self.storage.write(&self.id, data).await
    }

    /// Seals the stream. `err` is normalized to `None` before sealing when
    /// it represents a clean EOF — callers that pump an upstream reader to
    /// completion pass whatever `Option<HubError>` they derived from that
    /// pump, already EOF-normalized.
    pub async fn close(&self, err: Option<HubError>) -> Result<(), HubError> {
        self.storage.close(&self.id, err).await
    }

    /// Copies from `reader` in ≤256-byte chunks until `reader` reports EOF.
    /// Forwards the reader's EOF unchanged (returns `Ok(total)`); a write
    /// error aborts early.
    pub async fn read_from<R>(&self, mut reader: R) -> Result<u64, HubError>
    where
        R: tokio::io::AsyncRead + Unpin,
    {
        use tokio::io::AsyncReadExt;

        let mut total: u64 = 0;
        let mut chunk = [0u8; 256];
        loop {
            let n = reader
                .read(&mut chunk)
                .await
                .map_err(|e| HubError::Upstream(e.to_string()))?;
            if n == 0 {
                return Ok(total);
            }
            self.write(&chunk[..n]).await?;
            total += n as u64;
        }
    }
}

/// A reader cursor over a stream; many per stream. `Seek` supports START and
/// CURRENT only per spec §4.5.
#[derive(Debug)]
pub struct DataStreamOutput {
    reader: StreamReader,
    pos: Mutex<u64>,
}

pub enum SeekFrom {
    Start(u64),
    Current(i64),
}

impl DataStreamOutput {
    pub(crate) fn new(reader: StreamReader) -> Self {
        Self {
            reader,
            pos: Mutex::new(0),
        }
    }

    pub async fn read(&self, buf: &mut [u8]) -> Result<usize, HubError> {
        let mut pos = self.pos.lock().await;
        let n = self.reader.read_at(buf, *pos as usize).await?;
        *pos += n as u64;
        Ok(n)
    }

    pub async fn read_at(&self, buf: &mut [u8], off: u64) -> Result<usize, HubError> {
        self.reader.read_at(buf, off as usize).await
    }

    pub async fn seek(&self, seek: SeekFrom) -> Result<u64, HubError> {
        let mut pos = self.pos.lock().await;
        let new_pos: i64 = match seek {
            SeekFrom::Start(off) => off as i64,
            SeekFrom::Current(delta) => *pos as i64 + delta,
        };
        if new_pos < 0 {
            return Err(HubError::OffsetOutOfRange);
        }
        *pos = new_pos as u64;
        Ok(*pos)
    }

    /// Loops `read_at` + `write` until EOF; returns the byte count written.
    pub async fn write_to<W>(&self, mut writer: W) -> Result<u64, HubError>
    where
        W: tokio::io::AsyncWrite + Unpin,
    {
        use tokio::io::AsyncWriteExt;

        let mut pos: u64 = 0;
        let mut chunk = [0u8; 256];
        loop {
            let n = self.reader.read_at(&mut chunk, pos as usize).await?;
            if n == 0 {
                return Ok(pos);
            }
            writer
                .write_all(&chunk[..n])
                .await
                .map_err(|e| HubError::Upstream(e.to_string()))?;
            pos += n as u64;
        }
    }

    pub async fn close(&self) -> Result<(), HubError> {
        self.reader.close().await
    }
}
