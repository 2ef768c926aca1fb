//! Cache Keys Module
//!
//! Derives deterministic cache keys from configuration sources, so a changed
//! source is simply a different key rather than something to invalidate.

mod derive;
mod source;
mod source_cache;

pub use derive::{content_hash, derive_key, DerivedKey, VersionSignal};
pub use source::{ConfigSource, EnvSource, FileSource};
pub use source_cache::{source_tags, SourceCache, VALIDATED_CONFIG_KEY};
