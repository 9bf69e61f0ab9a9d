//! Configuration for a lookup session.

/// Static defaults for a [`crate::LookupSession`].
///
/// Per-request values come from the intent built by `search`; this
/// struct holds the session-wide defaults.
#[derive(Debug, Clone)]
pub struct LookupConfig {
    /// Language the looked-up terms are written in.
    pub source_language: String,
    /// Language definitions are generated in; part of the cache key.
    pub target_language: String,
    /// Default generation flavor, if the product defines one.
    pub flavor: Option<String>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            source_language: "AUTO".into(),
            target_language: "ENGLISH".into(),
            flavor: None,
        }
    }
}
