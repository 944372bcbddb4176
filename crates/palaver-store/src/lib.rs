//! Conversation persistence for the palaver chat backend.
//!
//! One document per conversation: the message list and generation
//! parameters live inside the document as JSON. Writers replace the
//! whole message list rather than appending fields; the last writer's
//! full view wins, which is a known lost-update risk accepted by this
//! design rather than hidden behind a lock the store does not have.

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::{ConversationStore, SharedStore};
