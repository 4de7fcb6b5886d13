//! Bundled backend adapters: dedicated OS threads (native) and tokio tasks.

#[cfg(not(target_arch = "wasm32"))]
pub mod thread_backend;
#[cfg(feature = "tokio-runtime")]
pub mod tokio_backend;

#[cfg(not(target_arch = "wasm32"))]
pub use thread_backend::{SlotExecutor, ThreadBackend};
#[cfg(feature = "tokio-runtime")]
pub use tokio_backend::{AsyncSlotExecutor, TokioBackend};
