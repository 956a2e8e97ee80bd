//! Storage contracts of the wiki engine.
//!
//! The engine reads and writes pages only through [`PageStore`] and reports
//! changed pages to a [`SearchQueue`]. Text bodies are content addressed by
//! [`text_hash`], so the hash of a revision doubles as a cache key for
//! everything derived from its text.
//!
//! [`MemoryStore`] is a complete in-memory implementation.

mod error;
mod memory;
mod model;
mod search;
mod store;

pub use error::{StorageError, StorageErrorKind};
pub use memory::MemoryStore;
pub use model::{Attachment, Author, NewAttachment, NewRevision, Page, Revision, TagCount, text_hash};
pub use search::{MemorySearchQueue, NullSearchQueue, SearchQueue, WIKI_PAGE};
pub use store::{ATTACH_KEY, LINK_KEY, OWNER_KEY, PageStore, TAG_KEY};
