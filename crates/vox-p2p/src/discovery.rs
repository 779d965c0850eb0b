//! Peer catalog.
//!
//! The address book behind peer discovery: every peer this node has heard
//! of, whether or not a connection currently exists. Eventually-consistent
//! gossip, not authoritative membership — entries are merged from remote
//! catalogs deduplicated by id, and activity flags reflect this node's own
//! observations only.
//!
//! The periodic tasks that act on the catalog (reconnect, health-check,
//! gossip) live in the node runtime; this type only answers questions and
//! records outcomes.

use parking_lot::RwLock;

use vox_types::{time::now_millis, PeerEntry};

/// Thread-safe catalog of known peers, keyed by id.
#[derive(Debug, Default)]
pub struct PeerCatalog {
    entries: RwLock<Vec<PeerEntry>>,
}

impl PeerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the catalog with bootstrap entries, skipping `self_id`.
    pub fn with_bootstrap(bootstrap: Vec<PeerEntry>, self_id: &str) -> Self {
        let catalog = Self::new();
        for entry in bootstrap {
            if entry.id != self_id {
                catalog.insert(entry);
            }
        }
        catalog
    }

    /// Add an entry if its id is not already known. Returns whether it was
    /// new.
    pub fn insert(&self, entry: PeerEntry) -> bool {
        let mut entries = self.entries.write();
        if entries.iter().any(|e| e.id == entry.id) {
            return false;
        }
        entries.push(entry);
        true
    }

    /// Merge a gossiped catalog, deduplicating by id and never admitting
    /// this node's own id. Returns how many entries were new.
    pub fn merge(&self, remote: Vec<PeerEntry>, self_id: &str) -> usize {
        let mut added = 0;
        for entry in remote {
            if entry.id == self_id {
                continue;
            }
            // Remote activity flags are the sender's observations, not ours.
            let fresh = PeerEntry::new(entry.id, entry.address, entry.port);
            if self.insert(fresh) {
                added += 1;
            }
        }
        added
    }

    /// Record a successful contact with `id`.
    pub fn mark_active(&self, id: &str) {
        self.update(id, |e| {
            e.active = true;
            e.last_contact_ms = now_millis();
        });
    }

    /// Record that the connection to `id` is gone.
    pub fn mark_inactive(&self, id: &str) {
        self.update(id, |e| e.active = false);
    }

    /// Refresh the last-contact stamp without changing activity.
    pub fn touch(&self, id: &str) {
        self.update(id, |e| e.last_contact_ms = now_millis());
    }

    fn update(&self, id: &str, f: impl FnOnce(&mut PeerEntry)) {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
            f(entry);
        }
    }

    /// Entries that are inactive and past the retry cooldown — the ones the
    /// reconnect task should dial now.
    pub fn due_for_connect(&self, retry_cooldown_ms: u64) -> Vec<PeerEntry> {
        let now = now_millis();
        self.entries
            .read()
            .iter()
            .filter(|e| !e.active && now.saturating_sub(e.last_contact_ms) > retry_cooldown_ms)
            .cloned()
            .collect()
    }

    /// Full copy for gossip responses and status reporting.
    pub fn snapshot(&self) -> Vec<PeerEntry> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.entries.read().iter().filter(|e| e.active).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, port: u16) -> PeerEntry {
        PeerEntry::new(id, "localhost", port)
    }

    #[test]
    fn insert_deduplicates_by_id() {
        let catalog = PeerCatalog::new();
        assert!(catalog.insert(entry("TSE-RJ", 8002)));
        assert!(!catalog.insert(entry("TSE-RJ", 9999)));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn bootstrap_skips_self() {
        let catalog = PeerCatalog::with_bootstrap(
            vec![entry("TSE-SP", 8001), entry("TSE-RJ", 8002)],
            "TSE-SP",
        );
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.snapshot()[0].id, "TSE-RJ");
    }

    #[test]
    fn merge_adds_only_unseen_ids_and_never_self() {
        let catalog = PeerCatalog::with_bootstrap(vec![entry("TSE-RJ", 8002)], "TSE-SP");
        let added = catalog.merge(
            vec![entry("TSE-SP", 8001), entry("TSE-RJ", 8002), entry("TSE-MG", 8003)],
            "TSE-SP",
        );
        assert_eq!(added, 1);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn merged_entries_start_inactive() {
        let catalog = PeerCatalog::new();
        let mut remote = entry("TSE-MG", 8003);
        remote.active = true; // the sender's view, not ours
        catalog.merge(vec![remote], "TSE-SP");
        assert_eq!(catalog.active_count(), 0);
    }

    #[test]
    fn activity_flags_round_trip() {
        let catalog = PeerCatalog::new();
        catalog.insert(entry("TSE-RJ", 8002));
        catalog.mark_active("TSE-RJ");
        assert_eq!(catalog.active_count(), 1);
        catalog.mark_inactive("TSE-RJ");
        assert_eq!(catalog.active_count(), 0);
    }

    #[test]
    fn due_for_connect_honors_the_cooldown() {
        let catalog = PeerCatalog::new();
        let mut stale = entry("TSE-RJ", 8002);
        stale.last_contact_ms = 0; // long past any cooldown
        catalog.insert(stale);
        catalog.insert(entry("TSE-MG", 8003)); // just stamped

        let due = catalog.due_for_connect(2_000);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, "TSE-RJ");

        catalog.mark_active("TSE-RJ");
        assert!(catalog.due_for_connect(2_000).is_empty());
    }
}
