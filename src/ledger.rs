use std::collections::{HashMap, HashSet};

use crate::{subscriber::SubscriberRef, target::Target};

/// Result of mutating the ledger with new subscriber interest.
pub(crate) struct AddOutcome {
    /// Targets that had no prior interest from anyone and need a wire
    /// `SUBSCRIBE`/`PSUBSCRIBE`.
    pub to_wire: Vec<Target>,
    /// Targets that were already confirmed; the calling subscriber can be
    /// told `:subscribed`/`:psubscribed` immediately.
    pub already_confirmed: Vec<Target>,
}

/// Result of removing a subscriber's interest in some targets.
pub(crate) struct RemoveOutcome {
    /// Targets the subscriber actually had interest in (in order); each is
    /// worth an `:unsubscribed`/`:punsubscribed` notification. Targets the
    /// subscriber was never interested in are silently dropped from this
    /// list, per the spec's usage-error handling.
    pub removed: Vec<Target>,
    /// The subset of `removed` whose subscriber set became empty as a
    /// result — these need a wire `UNSUBSCRIBE`/`PUNSUBSCRIBE` if currently
    /// connected.
    pub to_wire: Vec<Target>,
}

/// The subscription ledger: who wants which channels and patterns, split
/// into targets the server has acknowledged (`confirmed`) and targets still
/// awaiting acknowledgement (`pending`).
///
/// Pure and I/O-free by design, so every operation below is directly
/// unit-testable without a runtime.
#[derive(Debug, Default)]
pub(crate) struct Ledger {
    confirmed: HashMap<Target, HashSet<SubscriberRef>>,
    pending: HashMap<Target, HashSet<SubscriberRef>>,
}

impl Ledger {
    /// Records that `subscriber` wants `targets`.
    pub fn add_interest(&mut self, targets: &[Target], subscriber: SubscriberRef) -> AddOutcome {
        let mut to_wire = Vec::new();
        let mut already_confirmed = Vec::new();

        for target in targets {
            if let Some(set) = self.confirmed.get_mut(target) {
                set.insert(subscriber);
                already_confirmed.push(target.clone());
            } else if let Some(set) = self.pending.get_mut(target) {
                set.insert(subscriber);
            } else {
                let mut set = HashSet::new();
                set.insert(subscriber);
                self.pending.insert(target.clone(), set);
                to_wire.push(target.clone());
            }
        }

        AddOutcome { to_wire, already_confirmed }
    }

    /// Removes `subscriber`'s interest in `targets`.
    ///
    /// Targets the subscriber had no interest in are silently ignored (a
    /// usage error per the spec, not reported as an error). Each entry
    /// removed is reported in `removed`; the subset that also emptied its
    /// subscriber set is reported again in `to_wire`.
    pub fn remove_interest(&mut self, targets: &[Target], subscriber: SubscriberRef) -> RemoveOutcome {
        let mut removed = Vec::new();
        let mut to_wire = Vec::new();

        for target in targets {
            match Self::remove_from(&mut self.confirmed, target, subscriber) {
                Removal::Orphaned => {
                    removed.push(target.clone());
                    to_wire.push(target.clone());
                }
                Removal::StillHasSubscribers => removed.push(target.clone()),
                Removal::NotPresent => match Self::remove_from(&mut self.pending, target, subscriber) {
                    Removal::Orphaned => {
                        removed.push(target.clone());
                        to_wire.push(target.clone());
                    }
                    Removal::StillHasSubscribers => removed.push(target.clone()),
                    Removal::NotPresent => {}
                },
            }
        }

        RemoveOutcome { removed, to_wire }
    }

    /// Removes every trace of `subscriber`, as if it had unsubscribed from
    /// everything at once. Returns the orphaned channels and patterns
    /// (targets with no remaining interest), split by kind so the caller can
    /// build the matching wire commands.
    pub fn drop_subscriber(&mut self, subscriber: SubscriberRef) -> (Vec<Target>, Vec<Target>) {
        let mut channels = Vec::new();
        let mut patterns = Vec::new();

        for map in [&mut self.confirmed, &mut self.pending] {
            let mut emptied = Vec::new();
            for (target, set) in map.iter_mut() {
                set.remove(&subscriber);
                if set.is_empty() {
                    emptied.push(target.clone());
                }
            }
            for target in emptied {
                map.remove(&target);
                match target {
                    Target::Channel(_) => channels.push(target),
                    Target::Pattern(_) => patterns.push(target),
                }
            }
        }

        (channels, patterns)
    }

    /// The server acknowledged a subscribe for `target`; migrates its
    /// pending subscribers to confirmed and returns them so the caller can
    /// notify each with `:subscribed`/`:psubscribed`.
    pub fn on_subscribe_confirmed(&mut self, target: &Target) -> Vec<SubscriberRef> {
        match self.pending.remove(target) {
            Some(set) => {
                let subscribers: Vec<_> = set.iter().copied().collect();
                self.confirmed.insert(target.clone(), set);
                subscribers
            }
            None => Vec::new(),
        }
    }

    /// The server acknowledged an unsubscribe for `target`. If subscribers
    /// had re-subscribed to it in the meantime (a race between our
    /// unsubscribe and their subscribe), the entry is moved back to pending
    /// and `true` is returned so the caller re-issues a wire subscribe.
    pub fn on_unsubscribe_confirmed(&mut self, target: &Target) -> bool {
        match self.confirmed.remove(target) {
            Some(set) if !set.is_empty() => {
                self.pending.insert(target.clone(), set);
                true
            }
            _ => false,
        }
    }

    /// A reconnect happened: every confirmed target reverts to pending, since
    /// the new connection has acknowledged nothing yet.
    pub fn on_disconnect_reset(&mut self) {
        for (target, set) in self.confirmed.drain() {
            self.pending.entry(target).or_default().extend(set);
        }
    }

    /// Defensively enforces invariant 2 (no empty subscriber sets) on the
    /// pending map before a reconnect's bulk resubscribe; `remove_interest`
    /// and `drop_subscriber` already maintain this as they go, so this is a
    /// no-op in practice, kept as a guard against future regressions.
    pub fn purge_empty_pending(&mut self) {
        self.pending.retain(|_, set| !set.is_empty());
    }

    pub fn has_subscriber(&self, subscriber: SubscriberRef) -> bool {
        self.confirmed.values().any(|set| set.contains(&subscriber))
            || self.pending.values().any(|set| set.contains(&subscriber))
    }

    pub fn confirmed_subscribers(&self, target: &Target) -> impl Iterator<Item = &SubscriberRef> {
        self.confirmed.get(target).into_iter().flatten()
    }

    pub fn pending_targets(&self) -> impl Iterator<Item = &Target> {
        self.pending.keys()
    }

    /// Every subscriber with any interest recorded anywhere in the ledger,
    /// deduplicated. Used to fan out a `:disconnected` notification to
    /// everyone still listening after a transport failure.
    pub fn all_subscribers(&self) -> Vec<SubscriberRef> {
        let mut seen = HashSet::new();
        for set in self.confirmed.values().chain(self.pending.values()) {
            seen.extend(set.iter().copied());
        }
        seen.into_iter().collect()
    }

    fn remove_from(
        map: &mut HashMap<Target, HashSet<SubscriberRef>>,
        target: &Target,
        subscriber: SubscriberRef,
    ) -> Removal {
        let Some(set) = map.get_mut(target) else {
            return Removal::NotPresent;
        };
        if !set.remove(&subscriber) {
            return Removal::NotPresent;
        }
        if set.is_empty() {
            map.remove(target);
            Removal::Orphaned
        } else {
            Removal::StillHasSubscribers
        }
    }
}

enum Removal {
    /// The subscriber was removed and the target's set is now empty.
    Orphaned,
    /// The subscriber was removed but other subscribers remain.
    StillHasSubscribers,
    /// The subscriber was not in this map's set for the target.
    NotPresent,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sub(n: u64) -> SubscriberRef {
        SubscriberRef::for_test(n)
    }

    fn channel(name: &str) -> Target {
        Target::Channel(name.as_bytes().to_vec().into())
    }

    #[test]
    fn first_subscriber_triggers_wire_subscribe() {
        let mut ledger = Ledger::default();
        let outcome = ledger.add_interest(&[channel("news")], sub(1));
        assert_eq!(outcome.to_wire, vec![channel("news")]);
        assert!(outcome.already_confirmed.is_empty());
    }

    #[test]
    fn second_subscriber_to_pending_target_does_not_resend_wire_subscribe() {
        let mut ledger = Ledger::default();
        ledger.add_interest(&[channel("news")], sub(1));
        let outcome = ledger.add_interest(&[channel("news")], sub(2));
        assert!(outcome.to_wire.is_empty());
        assert!(outcome.already_confirmed.is_empty());
    }

    #[test]
    fn subscriber_joining_confirmed_target_is_told_immediately() {
        let mut ledger = Ledger::default();
        ledger.add_interest(&[channel("news")], sub(1));
        ledger.on_subscribe_confirmed(&channel("news"));

        let outcome = ledger.add_interest(&[channel("news")], sub(2));
        assert!(outcome.to_wire.is_empty());
        assert_eq!(outcome.already_confirmed, vec![channel("news")]);
    }

    #[test]
    fn last_subscriber_leaving_triggers_wire_unsubscribe() {
        let mut ledger = Ledger::default();
        ledger.add_interest(&[channel("news")], sub(1));
        ledger.on_subscribe_confirmed(&channel("news"));

        let outcome = ledger.remove_interest(&[channel("news")], sub(1));
        assert_eq!(outcome.removed, vec![channel("news")]);
        assert_eq!(outcome.to_wire, vec![channel("news")]);
        assert!(!ledger.has_subscriber(sub(1)));
    }

    #[test]
    fn remaining_subscriber_keeps_target_alive() {
        let mut ledger = Ledger::default();
        ledger.add_interest(&[channel("news")], sub(1));
        ledger.add_interest(&[channel("news")], sub(2));
        ledger.on_subscribe_confirmed(&channel("news"));

        let outcome = ledger.remove_interest(&[channel("news")], sub(1));
        assert_eq!(outcome.removed, vec![channel("news")]);
        assert!(outcome.to_wire.is_empty());
        assert!(ledger.confirmed_subscribers(&channel("news")).any(|&s| s == sub(2)));
    }

    #[test]
    fn unsubscribing_from_a_target_never_subscribed_to_is_a_silent_no_op() {
        let mut ledger = Ledger::default();
        ledger.add_interest(&[channel("news")], sub(1));

        let outcome = ledger.remove_interest(&[channel("weather")], sub(1));
        assert!(outcome.removed.is_empty());
        assert!(outcome.to_wire.is_empty());
    }

    #[test]
    fn drop_subscriber_orphans_only_their_exclusive_targets() {
        let mut ledger = Ledger::default();
        ledger.add_interest(&[channel("a"), channel("b")], sub(1));
        ledger.add_interest(&[channel("b")], sub(2));

        let (channels, patterns) = ledger.drop_subscriber(sub(1));
        assert_eq!(channels, vec![channel("a")]);
        assert!(patterns.is_empty());
        assert!(!ledger.has_subscriber(sub(1)));
        assert!(ledger.has_subscriber(sub(2)));
    }

    #[test]
    fn disconnect_moves_every_confirmed_target_back_to_pending() {
        let mut ledger = Ledger::default();
        ledger.add_interest(&[channel("news")], sub(1));
        ledger.on_subscribe_confirmed(&channel("news"));

        ledger.on_disconnect_reset();
        assert!(ledger.confirmed_subscribers(&channel("news")).next().is_none());
        assert!(ledger.pending_targets().any(|t| *t == channel("news")));
    }

    #[test]
    fn resubscribe_race_during_unsubscribe_reinstates_pending() {
        let mut ledger = Ledger::default();
        ledger.add_interest(&[channel("news")], sub(1));
        ledger.on_subscribe_confirmed(&channel("news"));
        ledger.remove_interest(&[channel("news")], sub(1));

        // A second subscriber arrives before the server's unsubscribe ack
        // comes back.
        ledger.add_interest(&[channel("news")], sub(2));
        let needs_resubscribe = ledger.on_unsubscribe_confirmed(&channel("news"));

        assert!(needs_resubscribe);
        assert!(ledger.pending_targets().any(|t| *t == channel("news")));
    }

    #[test]
    fn stale_unsubscribe_ack_for_target_with_no_subscribers_is_a_no_op() {
        let mut ledger = Ledger::default();
        let needs_resubscribe = ledger.on_unsubscribe_confirmed(&channel("news"));
        assert!(!needs_resubscribe);
    }
}
