//! Derived "users with unread messages" set.
//!
//! Two feeds add to the set: a one-shot seed taken when the inbox user list
//! loads, and the live global pending-message feed. Nothing removes a user
//! except an explicit mark-as-read. Clears are tracked per message id: a
//! message this session has marked read never re-lights its user, while any
//! other pending message does, including ones that arrive mid-clear.

use std::collections::{BTreeSet, HashMap, HashSet};
use uuid::Uuid;

/// A pending message as seen by the live feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRef {
    pub user_id: String,
    pub message_id: Uuid,
}

#[derive(Debug, Default, Clone)]
pub struct UnreadTracker {
    unread: BTreeSet<String>,
    /// Messages this session marked read, per user.
    acknowledged: HashMap<String, HashSet<Uuid>>,
    /// Users with a mark-as-read in flight, with pending ids observed meanwhile.
    clearing: HashMap<String, HashSet<Uuid>>,
}

impl UnreadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_unread(&self, user_id: &str) -> bool {
        self.unread.contains(user_id)
    }

    pub fn users(&self) -> Vec<String> {
        self.unread.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.unread.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unread.is_empty()
    }

    /// Adds users found by the initial per-user existence check.
    /// Returns whether the set changed.
    pub fn seed<I, S>(&mut self, user_ids: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut changed = false;
        for user_id in user_ids {
            let user_id = user_id.into();
            if self.clearing.contains_key(&user_id) {
                continue;
            }
            changed |= self.unread.insert(user_id);
        }
        changed
    }

    /// Applies one snapshot of the global pending feed. Additive only: users
    /// absent from the snapshot keep their flag.
    pub fn observe_pending<'a, I>(&mut self, pending: I) -> bool
    where
        I: IntoIterator<Item = &'a PendingRef>,
    {
        let mut changed = false;
        for item in pending {
            if self
                .acknowledged
                .get(&item.user_id)
                .is_some_and(|ids| ids.contains(&item.message_id))
            {
                continue;
            }
            if let Some(seen) = self.clearing.get_mut(&item.user_id) {
                seen.insert(item.message_id);
                continue;
            }
            changed |= self.unread.insert(item.user_id.clone());
        }
        changed
    }

    /// Optimistically clears the user before the status updates are sent.
    pub fn begin_clear(&mut self, user_id: &str) -> bool {
        self.clearing.entry(user_id.to_string()).or_default();
        self.unread.remove(user_id)
    }

    /// Reconciles an optimistic clear with the outcome of the status updates.
    /// The user is re-flagged if any update failed or a message that was not
    /// marked read showed up as pending while the clear was in flight.
    pub fn finish_clear(&mut self, user_id: &str, marked: &[Uuid], failed: &[Uuid]) -> bool {
        let acknowledged = self.acknowledged.entry(user_id.to_string()).or_default();
        acknowledged.extend(marked.iter().copied());

        let seen_meanwhile = self.clearing.remove(user_id).unwrap_or_default();
        let still_pending = !failed.is_empty() || seen_meanwhile.iter().any(|id| !acknowledged.contains(id));

        if still_pending {
            self.unread.insert(user_id.to_string())
        } else {
            false
        }
    }

    /// Rolls back an optimistic clear whose updates never ran.
    pub fn abort_clear(&mut self, user_id: &str) -> bool {
        self.clearing.remove(user_id);
        self.unread.insert(user_id.to_string())
    }

    /// Forgets everything, as when the inbox screen is mounted again.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(user_id: &str, message_id: Uuid) -> PendingRef {
        PendingRef {
            user_id: user_id.to_string(),
            message_id,
        }
    }

    #[test]
    fn seed_and_live_feed_are_additive() {
        let mut tracker = UnreadTracker::new();
        tracker.seed(["alice"]);
        tracker.observe_pending(&[pending("bob", Uuid::new_v4())]);

        // A later snapshot without alice does not clear her.
        tracker.observe_pending(&Vec::<PendingRef>::new());
        assert_eq!(tracker.users(), vec!["alice".to_string(), "bob".to_string()]);
    }

    #[test]
    fn user_stays_unread_until_explicit_clear() {
        let mut tracker = UnreadTracker::new();
        let msg = Uuid::new_v4();
        tracker.observe_pending(&[pending("alice", msg)]);
        for _ in 0..5 {
            tracker.observe_pending(&[pending("bob", Uuid::new_v4())]);
            assert!(tracker.is_unread("alice"));
        }

        assert!(tracker.begin_clear("alice"));
        assert!(!tracker.is_unread("alice"));
        tracker.finish_clear("alice", &[msg], &[]);
        assert!(!tracker.is_unread("alice"));
    }

    #[test]
    fn stale_snapshot_during_clear_does_not_relight() {
        let mut tracker = UnreadTracker::new();
        let msg = Uuid::new_v4();
        tracker.observe_pending(&[pending("alice", msg)]);

        tracker.begin_clear("alice");
        tracker.observe_pending(&[pending("alice", msg)]);
        assert!(!tracker.is_unread("alice"));

        tracker.finish_clear("alice", &[msg], &[]);
        assert!(!tracker.is_unread("alice"));

        // Snapshots taken before the update landed still mention the message.
        tracker.observe_pending(&[pending("alice", msg)]);
        assert!(!tracker.is_unread("alice"));
    }

    #[test]
    fn new_message_during_clear_relights_on_finish() {
        let mut tracker = UnreadTracker::new();
        let old = Uuid::new_v4();
        let new = Uuid::new_v4();
        tracker.observe_pending(&[pending("alice", old)]);

        tracker.begin_clear("alice");
        tracker.observe_pending(&[pending("alice", old), pending("alice", new)]);
        assert!(!tracker.is_unread("alice"));

        assert!(tracker.finish_clear("alice", &[old], &[]));
        assert!(tracker.is_unread("alice"));
    }

    #[test]
    fn new_message_after_clear_relights() {
        let mut tracker = UnreadTracker::new();
        let old = Uuid::new_v4();
        tracker.begin_clear("alice");
        tracker.finish_clear("alice", &[old], &[]);

        tracker.observe_pending(&[pending("alice", Uuid::new_v4())]);
        assert!(tracker.is_unread("alice"));
    }

    #[test]
    fn failed_update_rolls_back_the_clear() {
        let mut tracker = UnreadTracker::new();
        let ok = Uuid::new_v4();
        let failed = Uuid::new_v4();
        tracker.seed(["alice"]);

        tracker.begin_clear("alice");
        tracker.finish_clear("alice", &[ok], &[failed]);
        assert!(tracker.is_unread("alice"));
    }

    #[test]
    fn abort_restores_the_flag() {
        let mut tracker = UnreadTracker::new();
        tracker.seed(["alice"]);
        tracker.begin_clear("alice");
        assert!(tracker.abort_clear("alice"));
        assert!(tracker.is_unread("alice"));

        // The aborted clear no longer swallows observations.
        tracker.begin_clear("alice");
        tracker.finish_clear("alice", &[], &[]);
        tracker.observe_pending(&[pending("alice", Uuid::new_v4())]);
        assert!(tracker.is_unread("alice"));
    }

    #[test]
    fn seed_skips_users_being_cleared() {
        let mut tracker = UnreadTracker::new();
        tracker.begin_clear("alice");
        assert!(!tracker.seed(["alice"]));
        assert!(!tracker.is_unread("alice"));
    }
}
