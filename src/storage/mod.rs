//! File store collaborator.
//!
//! The orchestrator resolves uploads to scanner input through this module
//! and deletes files whose disposition is infected or unscannable.

mod local;
mod memory;
mod traits;

pub use local::LocalFileStore;
pub use memory::MemoryFileStore;
pub use traits::FileStore;
