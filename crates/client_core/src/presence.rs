//! Who else is editing what, as seen from delivered notifications.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use shared::{
    domain::{ClientIdentity, EventId},
    protocol::{EditingNotification, EditingStatus},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceChange {
    Started { event_id: EventId, peer: ClientIdentity },
    Stopped { event_id: EventId, peer: ClientIdentity },
    Unchanged,
}

pub struct PeerPresence {
    own_identity: ClientIdentity,
    stale_after: Duration,
    editors: HashMap<EventId, HashMap<ClientIdentity, Instant>>,
}

impl PeerPresence {
    /// A peer that misses two consecutive resends is considered gone.
    pub fn new(own_identity: ClientIdentity, broadcast_period: Duration) -> Self {
        Self {
            own_identity,
            stale_after: broadcast_period * 2,
            editors: HashMap::new(),
        }
    }

    pub fn apply(&mut self, notification: &EditingNotification, now: Instant) -> PresenceChange {
        if notification.from == self.own_identity {
            return PresenceChange::Unchanged;
        }

        match notification.status {
            EditingStatus::Editing => {
                let stale_after = self.stale_after;
                let peers = self.editors.entry(notification.event_id).or_default();
                let previous = peers.insert(notification.from.clone(), now);
                let was_live =
                    previous.is_some_and(|seen| now.saturating_duration_since(seen) <= stale_after);
                if was_live {
                    PresenceChange::Unchanged
                } else {
                    PresenceChange::Started {
                        event_id: notification.event_id,
                        peer: notification.from.clone(),
                    }
                }
            }
            EditingStatus::Stopped => {
                let removed = self
                    .editors
                    .get_mut(&notification.event_id)
                    .and_then(|peers| peers.remove(&notification.from))
                    .is_some();
                self.editors.retain(|_, peers| !peers.is_empty());
                if removed {
                    PresenceChange::Stopped {
                        event_id: notification.event_id,
                        peer: notification.from.clone(),
                    }
                } else {
                    PresenceChange::Unchanged
                }
            }
        }
    }

    pub fn editors_of(&self, event_id: EventId, now: Instant) -> Vec<ClientIdentity> {
        let mut peers: Vec<_> = self
            .editors
            .get(&event_id)
            .into_iter()
            .flatten()
            .filter(|(_, seen)| now.saturating_duration_since(**seen) <= self.stale_after)
            .map(|(peer, _)| peer.clone())
            .collect();
        peers.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        peers
    }

    /// Drops peers whose resends stopped arriving and reports them.
    pub fn prune(&mut self, now: Instant) -> Vec<(EventId, ClientIdentity)> {
        let stale_after = self.stale_after;
        let mut expired = Vec::new();
        for (event_id, peers) in &mut self.editors {
            peers.retain(|peer, seen| {
                let live = now.saturating_duration_since(*seen) <= stale_after;
                if !live {
                    expired.push((*event_id, peer.clone()));
                }
                live
            });
        }
        self.editors.retain(|_, peers| !peers.is_empty());
        expired.sort_by(|a, b| (a.0 .0, a.1.as_str()).cmp(&(b.0 .0, b.1.as_str())));
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_millis(1800);

    fn note(event: i64, status: EditingStatus, from: &str) -> EditingNotification {
        EditingNotification::new(EventId(event), status, ClientIdentity::new(from))
    }

    #[test]
    fn ignores_own_notifications() {
        let mut presence = PeerPresence::new(ClientIdentity::new("me"), PERIOD);
        let now = Instant::now();

        let change = presence.apply(&note(5, EditingStatus::Editing, "me"), now);
        assert_eq!(change, PresenceChange::Unchanged);
        assert!(presence.editors_of(EventId(5), now).is_empty());
    }

    #[test]
    fn resends_keep_peer_without_reporting_a_new_start() {
        let mut presence = PeerPresence::new(ClientIdentity::new("me"), PERIOD);
        let start = Instant::now();

        assert_eq!(
            presence.apply(&note(5, EditingStatus::Editing, "bob"), start),
            PresenceChange::Started {
                event_id: EventId(5),
                peer: ClientIdentity::new("bob"),
            }
        );
        assert_eq!(
            presence.apply(&note(5, EditingStatus::Editing, "bob"), start + PERIOD),
            PresenceChange::Unchanged
        );
        assert_eq!(
            presence.editors_of(EventId(5), start + PERIOD * 2),
            vec![ClientIdentity::new("bob")]
        );
    }

    #[test]
    fn stop_removes_peer() {
        let mut presence = PeerPresence::new(ClientIdentity::new("me"), PERIOD);
        let now = Instant::now();
        presence.apply(&note(5, EditingStatus::Editing, "bob"), now);

        let change = presence.apply(&note(5, EditingStatus::Stopped, "bob"), now);
        assert_eq!(
            change,
            PresenceChange::Stopped {
                event_id: EventId(5),
                peer: ClientIdentity::new("bob"),
            }
        );
        assert!(presence.editors_of(EventId(5), now).is_empty());
        assert_eq!(
            presence.apply(&note(5, EditingStatus::Stopped, "bob"), now),
            PresenceChange::Unchanged
        );
    }

    #[test]
    fn lost_stop_heals_after_two_missed_resends() {
        let mut presence = PeerPresence::new(ClientIdentity::new("me"), PERIOD);
        let start = Instant::now();
        presence.apply(&note(5, EditingStatus::Editing, "bob"), start);
        presence.apply(&note(7, EditingStatus::Editing, "carol"), start + PERIOD);

        let later = start + PERIOD * 2 + Duration::from_millis(1);
        assert!(presence.editors_of(EventId(5), later).is_empty());
        assert_eq!(
            presence.prune(later),
            vec![(EventId(5), ClientIdentity::new("bob"))]
        );
        assert_eq!(
            presence.editors_of(EventId(7), later),
            vec![ClientIdentity::new("carol")]
        );
    }
}
