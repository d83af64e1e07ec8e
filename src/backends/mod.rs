//! Bundled backend implementations.
//!
//! | Backend | Capability | Description |
//! |---------|------------|-------------|
//! | [`InMemoryBackend`] | `InProcess` | Maps behind tokio locks, absolute and sliding expiry |
//! | [`DiskBackend`] | `Durable` | JSON files on disk, optional zstd |
//! | [`CallbackBackend`] | `Callback` | Caller-supplied async closures |
//! | `RecordingBackend` | configurable | Records calls, injects failures (`test-util` feature) |
//!
//! A distributed cache plugs in by implementing
//! [`Backend`](crate::cascade::Backend) and reporting
//! `Capability::Distributed`.

pub mod callback;
pub mod disk;
pub mod memory;
#[cfg(any(test, feature = "test-util"))]
pub mod recording;

pub use callback::CallbackBackend;
pub use disk::DiskBackend;
pub use memory::InMemoryBackend;
#[cfg(any(test, feature = "test-util"))]
pub use recording::{BackendOp, RecordingBackend};
