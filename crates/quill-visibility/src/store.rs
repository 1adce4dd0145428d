use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};
use uuid::Uuid;

use quill_db::Database;
use quill_types::models::MuteEdge;

use crate::error::MuteError;

/// Hook for anything holding state derived from mute edges.
///
/// Called synchronously after a mute edge for `muter_id` was created or
/// deleted and before the store call returns.
pub trait MuteListener: Send + Sync {
    fn on_mute_changed(&self, muter_id: Uuid);
}

/// Owner of the directional mute edges.
pub struct MuteRelationStore {
    db: Arc<Database>,
    listeners: RwLock<Vec<Arc<dyn MuteListener>>>,
}

impl MuteRelationStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn MuteListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Mute `mutee_id` for `muter_id`. Muting an already-muted user succeeds
    /// without creating a second edge.
    pub fn create(&self, muter_id: Uuid, mutee_id: Uuid) -> Result<(), MuteError> {
        if muter_id == mutee_id {
            return Err(MuteError::SelfMute);
        }
        if !self.db.user_exists(mutee_id)? {
            return Err(MuteError::UserNotFound(mutee_id));
        }

        if self.db.insert_muting(muter_id, mutee_id)? {
            info!("{} muted {}", muter_id, mutee_id);
            self.notify(muter_id);
        } else {
            debug!("{} already mutes {}", muter_id, mutee_id);
        }
        Ok(())
    }

    /// Remove the edge if present.
    pub fn delete(&self, muter_id: Uuid, mutee_id: Uuid) -> Result<(), MuteError> {
        if muter_id == mutee_id {
            return Err(MuteError::SelfMute);
        }

        if self.db.delete_muting(muter_id, mutee_id)? {
            info!("{} unmuted {}", muter_id, mutee_id);
            self.notify(muter_id);
        }
        Ok(())
    }

    pub fn exists(&self, muter_id: Uuid, mutee_id: Uuid) -> Result<bool, MuteError> {
        Ok(self.db.muting_exists(muter_id, mutee_id)?)
    }

    pub fn mutee_set_of(&self, muter_id: Uuid) -> Result<HashSet<Uuid>, MuteError> {
        Ok(self.db.get_mutee_ids(muter_id)?.into_iter().collect())
    }

    /// Edges created by `muter_id`, newest first.
    pub fn list(&self, muter_id: Uuid) -> Result<Vec<MuteEdge>, MuteError> {
        let rows = self.db.get_mutings(muter_id)?;
        let edges = rows
            .into_iter()
            .map(MuteEdge::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(edges)
    }

    fn notify(&self, muter_id: Uuid) {
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            listener.on_mute_changed(muter_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::testutil::Fixture;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Uuid>>);

    impl MuteListener for Recorder {
        fn on_mute_changed(&self, muter_id: Uuid) {
            self.0.lock().unwrap().push(muter_id);
        }
    }

    #[test]
    fn create_twice_equals_create_once() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let carol = fx.user("carol");

        fx.store.create(alice, carol).unwrap();
        let once = fx.store.mutee_set_of(alice).unwrap();
        fx.store.create(alice, carol).unwrap();

        assert_eq!(fx.store.mutee_set_of(alice).unwrap(), once);
        assert_eq!(fx.store.list(alice).unwrap().len(), 1);
        assert!(fx.store.exists(alice, carol).unwrap());
    }

    #[test]
    fn self_mute_is_rejected_without_state_change() {
        let fx = Fixture::new();
        let alice = fx.user("alice");

        let err = fx.store.create(alice, alice).unwrap_err();
        assert!(matches!(err, MuteError::SelfMute));
        assert!(err.is_invalid_input());
        assert!(fx.store.mutee_set_of(alice).unwrap().is_empty());
    }

    #[test]
    fn muting_unknown_user_is_rejected() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let ghost = Uuid::new_v4();

        let err = fx.store.create(alice, ghost).unwrap_err();
        assert!(matches!(err, MuteError::UserNotFound(id) if id == ghost));
        assert!(!fx.store.exists(alice, ghost).unwrap());
    }

    #[test]
    fn listeners_hear_only_real_changes() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let carol = fx.user("carol");
        let recorder = Arc::new(Recorder::default());
        fx.store.add_listener(recorder.clone());

        fx.store.create(alice, carol).unwrap();
        fx.store.create(alice, carol).unwrap();
        fx.store.delete(alice, carol).unwrap();
        fx.store.delete(alice, carol).unwrap();

        assert_eq!(*recorder.0.lock().unwrap(), vec![alice, alice]);
        assert!(!fx.store.exists(alice, carol).unwrap());
    }

    #[test]
    fn muting_is_directional() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let carol = fx.user("carol");

        fx.store.create(alice, carol).unwrap();
        assert!(!fx.store.exists(carol, alice).unwrap());
        assert!(fx.store.mutee_set_of(carol).unwrap().is_empty());
    }
}
