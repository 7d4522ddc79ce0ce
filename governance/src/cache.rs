//! Memoized round layouts.
//!
//! Non-authoritative: an entry is only reused when the inputs that produced it
//! hash to the same fingerprint and no open round has since passed its
//! nominal end. Any change to the proposal-id set drops every entry.

use std::collections::{BTreeSet, VecDeque};

use tracing::trace;

use tally_types::{ProposalId, Timestamp};

use crate::round::Round;

struct CacheEntry {
    fingerprint: u64,
    rounds: Vec<Round>,
    /// Latest `now` at which `rounds` is still correct. `None` once every
    /// round is finished.
    valid_until: Option<Timestamp>,
}

/// Small LRU of computed round layouts.
pub struct RoundCache {
    capacity: usize,
    entries: VecDeque<CacheEntry>,
    known_ids: BTreeSet<ProposalId>,
    hits: u64,
    misses: u64,
}

impl RoundCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
            known_ids: BTreeSet::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Record the current proposal-id set, clearing the cache when it moved.
    /// Returns whether a clear happened.
    pub fn observe_ids(&mut self, ids: &BTreeSet<ProposalId>) -> bool {
        if &self.known_ids == ids {
            return false;
        }
        self.known_ids = ids.clone();
        let had_entries = !self.entries.is_empty();
        self.entries.clear();
        if had_entries {
            trace!(proposals = ids.len(), "proposal set changed, round cache cleared");
        }
        had_entries
    }

    pub fn get(&mut self, fingerprint: u64, now: Timestamp) -> Option<Vec<Round>> {
        let pos = self.entries.iter().position(|e| {
            e.fingerprint == fingerprint && e.valid_until.map_or(true, |until| now <= until)
        });
        match pos {
            Some(pos) => {
                self.hits += 1;
                let entry = self.entries.remove(pos)?;
                let rounds = entry.rounds.clone();
                self.entries.push_front(entry);
                Some(rounds)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, fingerprint: u64, rounds: Vec<Round>) {
        let valid_until = rounds
            .iter()
            .filter(|r| r.is_open())
            .map(|r| r.nominal_end_time)
            .min();
        self.entries.retain(|e| e.fingerprint != fingerprint);
        self.entries.push_front(CacheEntry {
            fingerprint,
            rounds,
            valid_until,
        });
        self.entries.truncate(self.capacity);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.known_ids.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_round(end: u64) -> Round {
        Round {
            id: 1,
            start_time: Timestamp::new(0),
            nominal_end_time: Timestamp::new(end),
            proposals: vec![ProposalId::new(1)],
            is_finished: false,
            early_winner: None,
            actual_end_time: None,
        }
    }

    #[test]
    fn hit_until_open_round_expires() {
        let mut cache = RoundCache::new(4);
        cache.insert(7, vec![open_round(100)]);
        assert!(cache.get(7, Timestamp::new(100)).is_some());
        assert!(cache.get(7, Timestamp::new(101)).is_none());
        assert!(cache.get(8, Timestamp::new(50)).is_none());
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn finished_layouts_never_expire() {
        let mut round = open_round(100);
        round.is_finished = true;
        let mut cache = RoundCache::new(4);
        cache.insert(1, vec![round]);
        assert!(cache.get(1, Timestamp::new(u64::MAX)).is_some());
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = RoundCache::new(2);
        cache.insert(1, Vec::new());
        cache.insert(2, Vec::new());
        assert!(cache.get(1, Timestamp::new(0)).is_some());
        cache.insert(3, Vec::new());
        assert_eq!(cache.len(), 2);
        assert!(cache.get(2, Timestamp::new(0)).is_none());
        assert!(cache.get(1, Timestamp::new(0)).is_some());
    }

    #[test]
    fn id_set_change_clears() {
        let mut cache = RoundCache::new(2);
        let ids = BTreeSet::from([ProposalId::new(1)]);
        cache.observe_ids(&ids);
        cache.insert(1, Vec::new());
        assert!(!cache.observe_ids(&ids));
        assert!(cache.observe_ids(&BTreeSet::from([ProposalId::new(2)])));
        assert!(cache.is_empty());
    }
}
