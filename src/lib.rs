pub mod domain;
pub mod engine;
pub mod ingestion;
pub mod memory_store;
pub mod output;

pub use engine::Engine;
pub use memory_store::MemoryStore;
