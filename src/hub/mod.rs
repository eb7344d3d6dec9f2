//! The Data Hub: a single-producer, multi-consumer byte stream broker with
//! request coalescing (spec §4).
//!
//! Submodules mirror the layering called out in spec §9: `resource` holds
//! the per-stream byte buffer and its sealed/error state, `notification_bus`
//! wakes blocked readers, `reader_registry` reference-counts live handles so
//! a stream is disposed once its last reader and its writer both close, and
//! `storage` composes the three into the public `DataHub` façade exported
//! from this module.

mod data_hub;
mod notification_bus;
mod reader_registry;
mod resource;
mod storage;
mod stream_io;

pub use data_hub::DataHub;
pub use stream_io::{DataStreamInput, DataStreamOutput, SeekFrom};
