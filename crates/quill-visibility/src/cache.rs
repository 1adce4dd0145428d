use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use uuid::Uuid;

use crate::store::MuteListener;

/// Immutable snapshot of the users one observer has muted.
#[derive(Debug, Clone, Default)]
pub struct MuteSet {
    mutees: Arc<HashSet<Uuid>>,
}

impl MuteSet {
    pub fn new(mutees: HashSet<Uuid>) -> Self {
        Self {
            mutees: Arc::new(mutees),
        }
    }

    pub fn contains(&self, user_id: Uuid) -> bool {
        self.mutees.contains(&user_id)
    }

    pub fn is_empty(&self) -> bool {
        self.mutees.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mutees.len()
    }
}

impl FromIterator<Uuid> for MuteSet {
    fn from_iter<I: IntoIterator<Item = Uuid>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Per-muter cache of [`MuteSet`]s.
///
/// Every invalidation bumps `generation`. A loader remembers the generation
/// it saw before reading the store and only installs its result if no
/// invalidation happened in between, so a slow load can never reinstate a
/// set that predates a mute.
pub struct MuteSetCache {
    inner: RwLock<CacheInner>,
    capacity: usize,
}

#[derive(Default)]
struct CacheInner {
    sets: HashMap<Uuid, MuteSet>,
    generation: u64,
}

impl MuteSetCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(CacheInner::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn get_or_load<F>(&self, muter_id: Uuid, load: F) -> anyhow::Result<MuteSet>
    where
        F: FnOnce() -> anyhow::Result<HashSet<Uuid>>,
    {
        let observed = {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(set) = inner.sets.get(&muter_id) {
                return Ok(set.clone());
            }
            inner.generation
        };

        let set = MuteSet::new(load()?);

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.generation == observed {
            if inner.sets.len() >= self.capacity {
                inner.sets.clear();
            }
            inner.sets.insert(muter_id, set.clone());
        }

        Ok(set)
    }

    pub fn invalidate(&self, muter_id: Uuid) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.sets.remove(&muter_id);
        inner.generation = inner.generation.wrapping_add(1);
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MuteListener for MuteSetCache {
    fn on_mute_changed(&self, muter_id: Uuid) {
        self.invalidate(muter_id);
    }
}
