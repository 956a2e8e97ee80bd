//! Wiki engine on top of the markup crate.
//!
//! [`Wiki`] ties a [`PageStore`](inyoka_storage::PageStore), a
//! [`Cache`](inyoka_cache::Cache) and a search queue together:
//!
//! - rendering checks the read privilege, caches compiled streams by text
//!   hash and format, and replays them with a [`WikiContext`] that expands
//!   the dynamic macros
//! - edits check privileges and reserved metadata, merge stale edits with
//!   the head, record metadata and invalidate dependent pages
//! - behavior pages (`X-Behave`) configure the [`Acl`], the interwiki map,
//!   the smilies and the stylesheet through [`Storages`]

mod acl;
mod behaviors;
mod context;
mod engine;
mod error;
mod macros;
mod metadata;
mod settings;

pub use acl::{
    Acl, AclParseError, AclRule, GROUP_ALL, GROUP_OWNER, GROUP_REGISTERED, GROUP_UNREGISTERED, Principal, Privilege,
    Privileges, Subject, UnknownPrivilege,
};
pub use behaviors::{
    ACL_BEHAVIOR, BEHAVE_KEY, INTERWIKI_BEHAVIOR, InterwikiMap, SMILEY_BEHAVIOR, STYLE_BEHAVIOR, Storages, data_lines,
    expand_url,
};
pub use context::{StorePages, USER_PREFIX, WikiContext};
pub use engine::{EditRequest, Wiki};
pub use error::WikiError;
pub use metadata::{CACHE_TIME_KEY, REDIRECT_KEY, changed_restricted_key, extract_metadata, is_restricted_key};
pub use settings::Settings;

#[cfg(test)]
mod tests {
    use super::*;
    use inyoka_storage::MemoryStore;
    use static_assertions::assert_impl_all;

    assert_impl_all!(Wiki: Send, Sync);
    assert_impl_all!(Storages: Send, Sync);
    assert_impl_all!(MemoryStore: Send, Sync);
    assert_impl_all!(Settings: Send, Sync, Clone);
}
