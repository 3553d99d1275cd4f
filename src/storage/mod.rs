//! Storage backends for the editor's documents

pub mod filesystem;
pub mod memory;
pub mod traits;

pub use filesystem::FsDocumentStore;
pub use memory::MemoryDocumentStore;
pub use traits::{DocumentStore, DocumentSummary, SharedDocumentStore};
