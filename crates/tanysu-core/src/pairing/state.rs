use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{domain::UserId, errors::Error, Result};

/// Where a participant currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParticipantStatus {
    Idle,
    Queued,
    Paired(UserId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    AlreadyQueued,
    /// Paired participants never enter the queue; nothing changed.
    AlreadyPaired(UserId),
}

/// Waiting queue plus pairing map.
///
/// Invariants kept by every method here:
/// - `partners[a] == b` implies `partners[b] == a`, and `a != b`
/// - nobody with a partner is in `queue`
/// - `queue` has no duplicates and keeps insertion order
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingState {
    #[serde(default)]
    queue: Vec<UserId>,
    #[serde(default)]
    partners: HashMap<UserId, UserId>,
}

impl PairingState {
    pub fn partner_of(&self, id: UserId) -> Option<UserId> {
        self.partners.get(&id).copied()
    }

    pub fn is_queued(&self, id: UserId) -> bool {
        self.queue.contains(&id)
    }

    pub fn status(&self, id: UserId) -> ParticipantStatus {
        match self.partner_of(id) {
            Some(p) => ParticipantStatus::Paired(p),
            None if self.is_queued(id) => ParticipantStatus::Queued,
            None => ParticipantStatus::Idle,
        }
    }

    pub fn queue(&self) -> &[UserId] {
        &self.queue
    }

    pub fn pair_count(&self) -> usize {
        self.partners.len() / 2
    }

    pub fn enqueue(&mut self, id: UserId) -> EnqueueOutcome {
        if let Some(p) = self.partner_of(id) {
            return EnqueueOutcome::AlreadyPaired(p);
        }
        if self.is_queued(id) {
            return EnqueueOutcome::AlreadyQueued;
        }
        self.queue.push(id);
        EnqueueOutcome::Queued
    }

    /// Queue contents minus `excluding`, in insertion order.
    pub fn candidates(&self, excluding: UserId) -> Vec<UserId> {
        self.queue
            .iter()
            .copied()
            .filter(|&id| id != excluding)
            .collect()
    }

    /// Pair `requester` with `target`, who must be waiting in the queue.
    ///
    /// On error nothing is modified.
    pub fn pair(&mut self, requester: UserId, target: UserId) -> Result<()> {
        if requester == target {
            return Err(Error::InvalidPairing(format!(
                "participant {requester} cannot pair with themselves"
            )));
        }
        if self.partners.contains_key(&requester) {
            return Err(Error::AlreadyPaired(requester));
        }
        if self.partners.contains_key(&target) {
            return Err(Error::AlreadyPaired(target));
        }
        if !self.is_queued(target) {
            return Err(Error::InvalidPairing(format!(
                "participant {target} is not waiting for a partner"
            )));
        }

        self.partners.insert(requester, target);
        self.partners.insert(target, requester);
        self.queue.retain(|&id| id != requester && id != target);
        Ok(())
    }

    /// Drop `id`'s pairing (both directions) and queue entries of both sides.
    ///
    /// Returns the former partner, if any.
    pub fn release(&mut self, id: UserId) -> Option<UserId> {
        let partner = self.partners.remove(&id);
        if let Some(p) = partner {
            if self.partners.get(&p) == Some(&id) {
                self.partners.remove(&p);
            }
        }
        self.queue.retain(|&q| q != id && Some(q) != partner);
        partner
    }

    /// Restore the invariants on a loaded snapshot. Returns the number of fixes.
    pub fn repair(&mut self) -> usize {
        let mut fixes = 0;

        let before = self.queue.len();
        let mut seen = Vec::with_capacity(before);
        self.queue.retain(|id| {
            if seen.contains(id) {
                false
            } else {
                seen.push(*id);
                true
            }
        });
        fixes += before - self.queue.len();

        let broken: Vec<UserId> = self
            .partners
            .iter()
            .filter(|(a, b)| a == b || self.partners.get(*b) != Some(*a))
            .map(|(a, _)| *a)
            .collect();
        for id in broken {
            self.partners.remove(&id);
            fixes += 1;
        }

        let before = self.queue.len();
        let partners = &self.partners;
        self.queue.retain(|id| !partners.contains_key(id));
        fixes += before - self.queue.len();

        fixes
    }
}
