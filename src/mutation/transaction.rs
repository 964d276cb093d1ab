//! Multi-key optimistic write descriptor.
//!
//! A [`Transaction`] lists every cache key an operation touches together
//! with its update function. Applying it writes the keys one after the
//! other; it is not atomic, and a failure between the optimistic phase
//! and reconciliation leaves whatever was applied in place. The snapshots
//! taken on apply make a later rollback possible.

use crate::backend::Backend;
use crate::cache::{CacheKey, CacheValue, RemoteCache};
use std::fmt;

type Update = Box<dyn FnOnce(Option<CacheValue>) -> Option<CacheValue> + Send>;

struct CacheWrite {
    key: CacheKey,
    update: Update,
}

/// Keys and update functions for one optimistic operation.
pub struct Transaction {
    label: &'static str,
    writes: Vec<CacheWrite>,
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("label", &self.label)
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Transaction {
    #[must_use]
    pub const fn new(label: &'static str) -> Self {
        Self {
            label,
            writes: Vec::new(),
        }
    }

    /// Add a key and the update to apply to it.
    #[must_use]
    pub fn write<F>(mut self, key: CacheKey, update: F) -> Self
    where
        F: FnOnce(Option<CacheValue>) -> Option<CacheValue> + Send + 'static,
    {
        self.writes.push(CacheWrite {
            key,
            update: Box::new(update),
        });
        self
    }

    /// Update an issue list in place; a missing entry is left missing.
    #[must_use]
    pub fn edit_issues<F>(self, key: CacheKey, edit: F) -> Self
    where
        F: FnOnce(&mut Vec<crate::model::Issue>) + Send + 'static,
    {
        self.write(key, move |prev| {
            prev.and_then(CacheValue::into_issues).map(|mut issues| {
                edit(&mut issues);
                CacheValue::Issues(issues)
            })
        })
    }

    /// Update a single cached issue; a missing entry is left missing.
    #[must_use]
    pub fn edit_issue<F>(self, key: CacheKey, edit: F) -> Self
    where
        F: FnOnce(&mut crate::model::Issue) + Send + 'static,
    {
        self.write(key, move |prev| {
            prev.and_then(CacheValue::into_issue).map(|mut issue| {
                edit(&mut issue);
                CacheValue::Issue(Box::new(issue))
            })
        })
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }

    /// Keys this transaction writes, in apply order.
    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.writes.iter().map(|w| &w.key)
    }

    /// Write every key now, without revalidation.
    pub fn apply<B: Backend + 'static>(self, cache: &RemoteCache<B>) -> Applied {
        let mut snapshots = Vec::with_capacity(self.writes.len());
        for CacheWrite { key, update } in self.writes {
            snapshots.push((key.clone(), cache.get(&key)));
            cache.set(key, update, false);
        }
        Applied {
            label: self.label,
            snapshots,
        }
    }
}

/// An applied transaction: the pre-write value of every key it touched.
#[derive(Debug)]
pub struct Applied {
    label: &'static str,
    snapshots: Vec<(CacheKey, Option<CacheValue>)>,
}

impl Applied {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }

    /// Put every touched key back as it was before `apply`, in reverse order.
    pub fn rollback<B: Backend + 'static>(self, cache: &RemoteCache<B>) {
        for (key, snapshot) in self.snapshots.into_iter().rev() {
            cache.restore(key, snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::cache::{ProjectScope, RetryPolicy};
    use crate::model::ProjectSummary;

    fn setup() -> (RemoteCache<MemoryBackend>, ProjectScope, MemoryBackend) {
        let project = ProjectSummary::new("p1", "Web", Some("WEB"));
        let seed = MemoryBackend::new("acme", project.clone());
        let backend = MemoryBackend::new("acme", project);
        (RemoteCache::new(backend, RetryPolicy::none()), ProjectScope::new("acme", "p1"), seed)
    }

    #[test]
    fn test_apply_writes_all_keys_and_rollback_restores() {
        let (cache, scope, seed) = setup();
        let a = seed.issue("a", "A", 1);
        cache.set(scope.issues(), |_| Some(CacheValue::Issues(vec![a])), false);

        let tx = Transaction::new("test")
            .edit_issues(scope.issues(), |issues| issues.clear())
            .write(scope.sub_issues("a"), |_| Some(CacheValue::Issues(Vec::new())));
        assert_eq!(tx.keys().count(), 2);

        let applied = tx.apply(&cache);
        assert!(cache.get(&scope.issues()).unwrap().as_issues().unwrap().is_empty());
        assert!(cache.contains(&scope.sub_issues("a")));

        applied.rollback(&cache);
        assert_eq!(cache.get(&scope.issues()).unwrap().as_issues().unwrap().len(), 1);
        assert!(!cache.contains(&scope.sub_issues("a")));
    }

    #[test]
    fn test_edit_on_missing_entry_stays_missing() {
        let (cache, scope, _) = setup();
        Transaction::new("noop")
            .edit_issue(scope.issue("zz"), |i| i.name.clear())
            .apply(&cache);
        assert!(!cache.contains(&scope.issue("zz")));
    }
}
