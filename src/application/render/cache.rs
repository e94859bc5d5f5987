//! Per-session render cache validated by source modification time.

use std::collections::HashMap;

use crate::domain::types::{ModTime, SourceIdentity};

/// Rendered output remembered for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub mod_time: ModTime,
    pub rendered: String,
}

/// State owned by one user session.
///
/// The render map is created on the first successful store and lives as long
/// as the session itself. Entries are never evicted; a stale entry stays in
/// place until the next store for the same source replaces it.
#[derive(Debug, Default)]
pub struct SessionContext {
    renders: Option<HashMap<SourceIdentity, CacheEntry>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached output for `id`, only if it was rendered from a source with
    /// exactly `current` as its modification time.
    pub fn lookup(&self, id: &SourceIdentity, current: ModTime) -> Option<&str> {
        self.renders
            .as_ref()?
            .get(id)
            .filter(|entry| entry.mod_time == current)
            .map(|entry| entry.rendered.as_str())
    }

    pub fn store(&mut self, id: SourceIdentity, mod_time: ModTime, rendered: String) {
        self.renders
            .get_or_insert_with(HashMap::new)
            .insert(id, CacheEntry { mod_time, rendered });
    }

    /// Raw entry access regardless of freshness.
    pub fn entry(&self, id: &SourceIdentity) -> Option<&CacheEntry> {
        self.renders.as_ref()?.get(id)
    }

    pub fn cached_sources(&self) -> usize {
        self.renders.as_ref().map_or(0, HashMap::len)
    }

    pub fn has_render_cache(&self) -> bool {
        self.renders.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(path: &str) -> SourceIdentity {
        SourceIdentity::new(path)
    }

    #[test]
    fn lookup_after_store_returns_output() {
        let mut session = SessionContext::new();
        let t = ModTime::from_unix_seconds(100);
        session.store(id("/docs/a.md"), t, "<p>a</p>".to_string());

        assert_eq!(session.lookup(&id("/docs/a.md"), t), Some("<p>a</p>"));
    }

    #[test]
    fn changed_mod_time_hides_entry_without_evicting_it() {
        let mut session = SessionContext::new();
        let t1 = ModTime::from_unix_seconds(100);
        let t2 = ModTime::from_unix_seconds(101);
        session.store(id("/docs/a.md"), t1, "<p>a</p>".to_string());

        assert_eq!(session.lookup(&id("/docs/a.md"), t2), None);
        assert_eq!(session.cached_sources(), 1);
        assert_eq!(session.entry(&id("/docs/a.md")).map(|e| e.mod_time), Some(t1));
    }

    #[test]
    fn freshness_has_no_tolerance_window() {
        let mut session = SessionContext::new();
        session.store(
            id("/docs/a.md"),
            ModTime::from_unix_nanos(1_000),
            "x".to_string(),
        );
        assert_eq!(
            session.lookup(&id("/docs/a.md"), ModTime::from_unix_nanos(1_001)),
            None
        );
    }

    #[test]
    fn store_replaces_entry_wholesale() {
        let mut session = SessionContext::new();
        let t1 = ModTime::from_unix_seconds(1);
        let t2 = ModTime::from_unix_seconds(2);
        session.store(id("/docs/a.md"), t1, "old".to_string());
        session.store(id("/docs/a.md"), t2, "new".to_string());

        assert_eq!(session.lookup(&id("/docs/a.md"), t1), None);
        assert_eq!(session.lookup(&id("/docs/a.md"), t2), Some("new"));
        assert_eq!(session.cached_sources(), 1);
    }

    #[test]
    fn map_is_created_lazily() {
        let mut session = SessionContext::new();
        assert!(!session.has_render_cache());
        assert_eq!(
            session.lookup(&id("/docs/a.md"), ModTime::from_unix_seconds(1)),
            None
        );
        assert!(!session.has_render_cache());

        session.store(id("/docs/a.md"), ModTime::from_unix_seconds(1), String::new());
        assert!(session.has_render_cache());
    }

    #[test]
    fn sessions_do_not_share_entries() {
        let t = ModTime::from_unix_seconds(5);
        let mut first = SessionContext::new();
        let second = SessionContext::new();
        first.store(id("/docs/a.md"), t, "a".to_string());

        assert_eq!(second.lookup(&id("/docs/a.md"), t), None);
    }
}
