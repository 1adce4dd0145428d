use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

use quill_types::events::{StreamChannel, StreamEvent};

use crate::emission::{Emission, Route};
use crate::gate::StreamEventGate;

/// One live channel subscription of one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSubscription {
    pub conn_id: Uuid,
    pub user_id: Uuid,
    pub channel: StreamChannel,
    pub live_since: DateTime<Utc>,
}

/// Tracks open stream connections and pushes gated events to them.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    gate: StreamEventGate,

    /// conn_id -> connection state
    connections: RwLock<HashMap<Uuid, ConnectionEntry>>,
}

struct ConnectionEntry {
    user_id: Uuid,
    tx: mpsc::UnboundedSender<StreamEvent>,
    /// channel -> subscribed at
    channels: HashMap<StreamChannel, DateTime<Utc>>,
}

impl Dispatcher {
    pub fn new(gate: StreamEventGate) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                gate,
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a connection for `user_id`. Returns (conn_id, receiver).
    /// The connection receives nothing until it connects to a channel.
    pub fn register(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<StreamEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                conn_id,
                ConnectionEntry {
                    user_id,
                    tx,
                    channels: HashMap::new(),
                },
            );
        (conn_id, rx)
    }

    /// Drop a connection and all of its subscriptions.
    pub fn unregister(&self, conn_id: Uuid) {
        self.inner
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&conn_id);
    }

    /// Subscribe a connection to a channel. Returns false for unknown connections.
    pub fn connect(&self, conn_id: Uuid, channel: StreamChannel) -> bool {
        let mut connections = self.inner.connections.write().unwrap_or_else(PoisonError::into_inner);
        match connections.get_mut(&conn_id) {
            Some(entry) => {
                entry.channels.entry(channel).or_insert_with(Utc::now);
                true
            }
            None => false,
        }
    }

    pub fn disconnect(&self, conn_id: Uuid, channel: StreamChannel) {
        let mut connections = self.inner.connections.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = connections.get_mut(&conn_id) {
            entry.channels.remove(&channel);
        }
    }

    /// Push an event to one connection without gating. Only for events that
    /// carry no third-party content.
    pub fn send_direct(&self, conn_id: Uuid, event: StreamEvent) -> bool {
        let connections = self.inner.connections.read().unwrap_or_else(PoisonError::into_inner);
        connections
            .get(&conn_id)
            .is_some_and(|entry| entry.tx.send(event).is_ok())
    }

    pub fn subscriptions(&self) -> Vec<StreamSubscription> {
        let connections = self.inner.connections.read().unwrap_or_else(PoisonError::into_inner);
        connections
            .iter()
            .flat_map(|(&conn_id, entry)| {
                entry.channels.iter().map(move |(&channel, &live_since)| StreamSubscription {
                    conn_id,
                    user_id: entry.user_id,
                    channel,
                    live_since,
                })
            })
            .collect()
    }

    /// Gate and push an event to every matching subscriber. Returns the number
    /// of connections it was delivered to.
    ///
    /// Blocking: the gate may read the database. The connection table lock is
    /// released before any gate check runs.
    pub fn publish(&self, emission: Emission) -> usize {
        let targets: Vec<(Uuid, mpsc::UnboundedSender<StreamEvent>)> = {
            let connections = self.inner.connections.read().unwrap_or_else(PoisonError::into_inner);
            connections
                .values()
                .filter(|entry| match emission.route {
                    Route::User(user_id) => {
                        entry.user_id == user_id && entry.channels.contains_key(&StreamChannel::Main)
                    }
                    Route::Channel(channel) => entry.channels.contains_key(&channel),
                })
                .map(|entry| (entry.user_id, entry.tx.clone()))
                .collect()
        };

        let mut delivered = 0;
        for (user_id, tx) in targets {
            if tx.is_closed() {
                continue;
            }
            if !self.inner.gate.admit(user_id, &emission.subject) {
                continue;
            }
            if tx.send(emission.event.clone()).is_ok() {
                delivered += 1;
            }
        }

        if delivered > 0 {
            debug!("{} delivered to {} connection(s)", emission.event.kind(), delivered);
        } else {
            trace!("{} delivered to no connections", emission.event.kind());
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use quill_db::Database;
    use quill_types::models::{Note, Notification, NotificationKind};
    use quill_visibility::{MuteRelationStore, VisibilityFilter};

    use super::*;

    struct Fixture {
        db: Arc<Database>,
        store: Arc<MuteRelationStore>,
        dispatcher: Dispatcher,
    }

    impl Fixture {
        fn new() -> Self {
            let db = Arc::new(Database::open_in_memory().unwrap());
            let store = Arc::new(MuteRelationStore::new(db.clone()));
            let filter = VisibilityFilter::new(db.clone(), store.clone());
            let dispatcher = Dispatcher::new(StreamEventGate::new(filter));
            Self { db, store, dispatcher }
        }

        fn user(&self, name: &str) -> Uuid {
            let id = Uuid::new_v4();
            self.db.create_user(id, name, "hash").unwrap();
            id
        }

        fn post(&self, author: Uuid, mentions: Vec<Uuid>) -> Note {
            let note = Note {
                id: Uuid::new_v4(),
                author_id: author,
                text: Some("hi".into()),
                mentions,
                renote_id: None,
                created_at: Utc::now(),
            };
            self.db.insert_note(&note).unwrap();
            note
        }

        fn listen(&self, user_id: Uuid, channel: StreamChannel) -> (Uuid, mpsc::UnboundedReceiver<StreamEvent>) {
            let (conn_id, rx) = self.dispatcher.register(user_id);
            assert!(self.dispatcher.connect(conn_id, channel));
            (conn_id, rx)
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn muted_mention_is_never_pushed() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let carol = fx.user("carol");
        fx.store.create(alice, carol).unwrap();
        let (_, mut rx) = fx.listen(alice, StreamChannel::Main);

        let note = fx.post(carol, vec![alice]);
        assert_eq!(fx.dispatcher.publish(Emission::mention(alice, note.clone())), 0);
        assert_eq!(fx.dispatcher.publish(Emission::unread_mention(alice, note)), 0);

        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn muted_notification_is_never_pushed() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let bob = fx.user("bob");
        let carol = fx.user("carol");
        fx.store.create(alice, carol).unwrap();
        let (_, mut rx) = fx.listen(alice, StreamChannel::Main);

        let notification = |actor| Notification {
            id: Uuid::new_v4(),
            recipient_id: alice,
            kind: NotificationKind::Reaction,
            actor_id: actor,
            note_id: None,
            reaction: Some("like".into()),
            created_at: Utc::now(),
            is_read: false,
        };

        fx.dispatcher.publish(Emission::unread_notification(notification(carol)));
        let from_bob = notification(bob);
        fx.dispatcher.publish(Emission::unread_notification(from_bob.clone()));

        assert_eq!(
            drain(&mut rx),
            vec![StreamEvent::UnreadNotification { notification_id: from_bob.id }]
        );
    }

    #[test]
    fn drop_is_per_subscriber() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let bob = fx.user("bob");
        let carol = fx.user("carol");
        fx.store.create(alice, carol).unwrap();
        let (_, mut alice_rx) = fx.listen(alice, StreamChannel::LocalTimeline);
        let (_, mut bob_rx) = fx.listen(bob, StreamChannel::LocalTimeline);

        let note = fx.post(carol, vec![]);
        assert_eq!(fx.dispatcher.publish(Emission::note(note.clone())), 1);

        assert!(drain(&mut alice_rx).is_empty());
        assert_eq!(drain(&mut bob_rx), vec![StreamEvent::Note(note)]);
    }

    #[test]
    fn targeted_events_need_the_main_channel() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let bob = fx.user("bob");
        let (_, mut timeline_rx) = fx.listen(alice, StreamChannel::LocalTimeline);
        let (_, mut bob_rx) = fx.listen(bob, StreamChannel::Main);

        let note = fx.post(bob, vec![alice]);
        fx.dispatcher.publish(Emission::mention(alice, note));

        assert!(drain(&mut timeline_rx).is_empty());
        assert!(drain(&mut bob_rx).is_empty());
    }

    #[test]
    fn mute_applies_to_the_next_emission() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let carol = fx.user("carol");
        let (_, mut rx) = fx.listen(alice, StreamChannel::LocalTimeline);

        let before = fx.post(carol, vec![]);
        assert_eq!(fx.dispatcher.publish(Emission::note(before)), 1);

        fx.store.create(alice, carol).unwrap();
        let after = fx.post(carol, vec![]);
        assert_eq!(fx.dispatcher.publish(Emission::note(after)), 0);

        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn disconnect_and_unregister_stop_delivery() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let bob = fx.user("bob");
        let (conn_id, mut rx) = fx.listen(alice, StreamChannel::LocalTimeline);
        assert_eq!(fx.dispatcher.subscriptions().len(), 1);

        fx.dispatcher.disconnect(conn_id, StreamChannel::LocalTimeline);
        assert_eq!(fx.dispatcher.publish(Emission::note(fx.post(bob, vec![]))), 0);
        assert!(fx.dispatcher.subscriptions().is_empty());

        fx.dispatcher.unregister(conn_id);
        assert!(!fx.dispatcher.connect(conn_id, StreamChannel::Main));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn store_failure_drops_filtered_events() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let bob = fx.user("bob");
        let original = fx.post(bob, vec![]);
        let mut renote = fx.post(bob, vec![alice]);
        renote.renote_id = Some(original.id);
        let (_, mut timeline_rx) = fx.listen(alice, StreamChannel::LocalTimeline);
        let (_, mut main_rx) = fx.listen(alice, StreamChannel::Main);

        // A panic while holding the connection poisons it for every later call
        let db = fx.db.clone();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            db.with_conn::<_, ()>(|_| panic!("poisoning test database"))
        }));

        assert_eq!(fx.dispatcher.publish(Emission::note(renote.clone())), 0);
        assert_eq!(fx.dispatcher.publish(Emission::mention(alice, renote)), 0);
        assert!(drain(&mut timeline_rx).is_empty());

        assert_eq!(fx.dispatcher.publish(Emission::read_all_unread_mentions(alice)), 1);
        assert_eq!(drain(&mut main_rx), vec![StreamEvent::ReadAllUnreadMentions]);
    }

    #[test]
    fn control_events_always_pass() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let (conn_id, mut rx) = fx.listen(alice, StreamChannel::Main);

        assert_eq!(fx.dispatcher.publish(Emission::read_all_unread_mentions(alice)), 1);
        assert!(fx.dispatcher.send_direct(conn_id, StreamEvent::ReadAllNotifications));
        assert_eq!(
            drain(&mut rx),
            vec![StreamEvent::ReadAllUnreadMentions, StreamEvent::ReadAllNotifications]
        );
    }
}
