//! The SDK's bounded event queue and its optional persistence layer
//! (spec.md §4.1).

pub mod bounded;
pub mod persistent;
pub mod storage;

pub use bounded::{EventQueue, QueueSignal, QueueStats, DEFAULT_MAX_SIZE};
pub use persistent::{PersistentQueue, PersistentQueueConfig};
pub use storage::{KeyValueStorage, MemoryStorage};
