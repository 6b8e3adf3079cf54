//! In-memory donation registry: loads donation documents from disk,
//! validates them, and exposes an atomically-replaceable snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use va_domain::error::{Error, Result};

use crate::loader;
use crate::snapshot::DonationSnapshot;
use crate::validate::{self, HandlerCapabilities};

pub struct DonationRegistry {
    snapshot: RwLock<Arc<DonationSnapshot>>,
    root: PathBuf,
    /// If true, any handler validation failure aborts the whole load.
    /// If false, the offending handler's donation is skipped and the
    /// rest of the registry still loads.
    strict: bool,
}

impl DonationRegistry {
    /// Load donations from `root`, validating each against `handlers`.
    pub fn load(root: &Path, strict: bool, handlers: &dyn HandlerCapabilities) -> Result<Self> {
        let snapshot = Self::build_snapshot(root, strict, handlers)?;
        tracing::info!(
            donations_root = %root.display(),
            intent_count = snapshot.by_intent_name.len(),
            domain_count = snapshot.by_domain.len(),
            "donation registry loaded"
        );
        Ok(Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
            root: root.to_path_buf(),
            strict,
        })
    }

    pub fn empty() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(DonationSnapshot::default())),
            root: PathBuf::new(),
            strict: false,
        }
    }

    fn build_snapshot(
        root: &Path,
        strict: bool,
        handlers: &dyn HandlerCapabilities,
    ) -> Result<DonationSnapshot> {
        let donations = loader::scan_donations(root)?;
        let mut valid = Vec::with_capacity(donations.len());
        for donation in donations {
            match validate::validate(&donation, handlers) {
                Ok(()) => valid.push(donation),
                Err(e) if strict => {
                    return Err(Error::DonationSchema {
                        handler: donation.handler_domain.clone(),
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        handler = %donation.handler_domain,
                        error = %e,
                        "skipping invalid donation document"
                    );
                }
            }
        }
        Ok(DonationSnapshot::build(valid))
    }

    /// Re-scan the donations root and atomically swap in a new snapshot.
    /// Readers holding the old `Arc` keep seeing a consistent view.
    pub fn reload(&self, handlers: &dyn HandlerCapabilities) -> Result<()> {
        let snapshot = Self::build_snapshot(&self.root, self.strict, handlers)?;
        tracing::info!(
            intent_count = snapshot.by_intent_name.len(),
            domain_count = snapshot.by_domain.len(),
            "donation registry reloaded"
        );
        *self.snapshot.write() = Arc::new(snapshot);
        Ok(())
    }

    pub fn snapshot(&self) -> Arc<DonationSnapshot> {
        self.snapshot.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::NoHandlers;

    struct AllowAll;
    impl HandlerCapabilities for AllowAll {
        fn has_method(&self, _h: &str, _m: &str) -> bool {
            true
        }
    }

    fn sample_json() -> &'static str {
        r#"{
            "schema_version": "1.0",
            "handler_domain": "timers",
            "method_donations": [
                {
                    "method_name": "set_timer",
                    "intent_suffix": "set",
                    "phrases": ["set a timer for {duration}"]
                }
            ]
        }"#
    }

    #[test]
    fn load_from_empty_root_gives_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let registry = DonationRegistry::load(dir.path(), true, &AllowAll).unwrap();
        assert_eq!(registry.snapshot().by_intent_name.len(), 0);
    }

    #[test]
    fn load_populates_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("timers.json"), sample_json()).unwrap();
        let registry = DonationRegistry::load(dir.path(), true, &AllowAll).unwrap();
        assert!(registry.snapshot().method_by_intent("timers.set").is_some());
    }

    #[test]
    fn non_strict_mode_skips_invalid_and_keeps_going() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("timers.json"), sample_json()).unwrap();
        // NoHandlers rejects every method, which would normally be fatal.
        let registry = DonationRegistry::load(dir.path(), false, &NoHandlers).unwrap();
        assert_eq!(registry.snapshot().by_intent_name.len(), 0);
    }

    #[test]
    fn strict_mode_propagates_validation_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("timers.json"), sample_json()).unwrap();
        let result = DonationRegistry::load(dir.path(), true, &NoHandlers);
        assert!(result.is_err());
    }

    #[test]
    fn reload_picks_up_new_files() {
        let dir = tempfile::tempdir().unwrap();
        let registry = DonationRegistry::load(dir.path(), true, &AllowAll).unwrap();
        assert_eq!(registry.snapshot().by_intent_name.len(), 0);
        std::fs::write(dir.path().join("timers.json"), sample_json()).unwrap();
        registry.reload(&AllowAll).unwrap();
        assert_eq!(registry.snapshot().by_intent_name.len(), 1);
    }
}
