//! Adapts a `DataStreamOutput` into an `axum::body::Body` by looping
//! `read_at` through `futures_util::stream::unfold`, since the Hub's reader
//! handle has no native `Stream`/`AsyncRead` implementation.

use axum::body::Body;
use bytes::Bytes;

use crate::hub::DataStreamOutput;

const CHUNK_SIZE: usize = 8192;

pub fn into_body(output: DataStreamOutput) -> Body {
    let state = (output, 0u64);
    Body::from_stream(futures_util::stream::unfold(state, |(output, offset)| async move {
        let mut chunk = vec![0u8; CHUNK_SIZE];
        match output.read_at(&mut chunk, offset).await {
            Ok(0) => None,
            Ok(n) => {
                chunk.truncate(n);
                Some((Ok::<_, std::io::Error>(Bytes::from(chunk)), (output, offset + n as u64)))
            }
            Err(e) => Some((Err(std::io::Error::other(e.to_string())), (output, offset))),
        }
    }))
}
