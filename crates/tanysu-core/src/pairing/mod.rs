//! Partner assignment: waiting queue + symmetric pairing map.
//!
//! `PairingEngine` is the only writer of this state. All mutators run under a
//! single write lock and commit a full snapshot to the [`StateStore`] before the
//! new state becomes visible, so a failed commit leaves nothing half-applied.

pub mod state;
pub mod store;

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{domain::UserId, Result};

pub use state::{EnqueueOutcome, PairingState, ParticipantStatus};
pub use store::{JsonFileStateStore, MemoryStateStore, StateStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PairingStats {
    pub waiting: usize,
    pub pairs: usize,
}

pub struct PairingEngine {
    store: Arc<dyn StateStore>,
    state: RwLock<PairingState>,
}

impl PairingEngine {
    /// Load the last committed snapshot, repairing it if it breaks an invariant.
    pub async fn open(store: Arc<dyn StateStore>) -> Result<Self> {
        let mut st = store.load().await?;
        let fixes = st.repair();
        if fixes > 0 {
            warn!(fixes, "pairing snapshot violated invariants; repaired");
            store.commit(&st).await?;
        }
        info!(
            waiting = st.queue().len(),
            pairs = st.pair_count(),
            "pairing state loaded"
        );
        Ok(Self {
            store,
            state: RwLock::new(st),
        })
    }

    /// Apply `f` to a copy of the state and commit it; the live state only
    /// changes if both succeed. No-op mutations skip the commit.
    async fn mutate<T>(&self, f: impl FnOnce(&mut PairingState) -> Result<T>) -> Result<T> {
        let mut live = self.state.write().await;
        let mut next = live.clone();
        let out = f(&mut next)?;
        if next != *live {
            self.store.commit(&next).await?;
            *live = next;
        }
        Ok(out)
    }

    pub async fn enqueue(&self, id: UserId) -> Result<EnqueueOutcome> {
        let outcome = self.mutate(|st| Ok(st.enqueue(id))).await?;
        info!(user = %id, ?outcome, "enqueue");
        Ok(outcome)
    }

    /// Waiting participants other than `excluding`, oldest first. Read-only.
    pub async fn list_candidates(&self, excluding: UserId) -> Vec<UserId> {
        self.state.read().await.candidates(excluding)
    }

    /// Pair `requester` with the waiting `target`.
    ///
    /// Fails with `AlreadyPaired` if either side is busy and `InvalidPairing`
    /// for self-pairing or a target that is not waiting.
    pub async fn try_pair(&self, requester: UserId, target: UserId) -> Result<()> {
        self.mutate(|st| st.pair(requester, target)).await?;
        info!(user = %requester, partner = %target, "paired");
        Ok(())
    }

    pub async fn get_partner(&self, id: UserId) -> Option<UserId> {
        self.state.read().await.partner_of(id)
    }

    pub async fn status(&self, id: UserId) -> ParticipantStatus {
        self.state.read().await.status(id)
    }

    /// End `id`'s pairing (both directions) and drop both sides from the queue.
    ///
    /// Returns the former partner so the caller can notify them.
    pub async fn release(&self, id: UserId) -> Result<Option<UserId>> {
        let partner = self.mutate(|st| Ok(st.release(id))).await?;
        match partner {
            Some(p) => info!(user = %id, partner = %p, "released"),
            None => info!(user = %id, "released (no partner)"),
        }
        Ok(partner)
    }

    pub async fn stats(&self) -> PairingStats {
        let st = self.state.read().await;
        PairingStats {
            waiting: st.queue().len(),
            pairs: st.pair_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;

    const A: UserId = UserId(100);
    const B: UserId = UserId(200);
    const C: UserId = UserId(300);

    async fn engine() -> (Arc<MemoryStateStore>, PairingEngine) {
        let store = Arc::new(MemoryStateStore::new());
        let engine = PairingEngine::open(store.clone()).await.unwrap();
        (store, engine)
    }

    #[tokio::test]
    async fn select_scenario_pairs_and_empties_queue() {
        let (store, engine) = engine().await;
        engine.enqueue(A).await.unwrap();
        engine.enqueue(B).await.unwrap();
        assert_eq!(engine.list_candidates(B).await, vec![A]);

        engine.try_pair(B, A).await.unwrap();
        assert_eq!(engine.get_partner(A).await, Some(B));
        assert_eq!(engine.get_partner(B).await, Some(A));
        assert_eq!(engine.stats().await, PairingStats { waiting: 0, pairs: 1 });

        // The snapshot reached the store.
        assert_eq!(store.load().await.unwrap().partner_of(A), Some(B));
    }

    #[tokio::test]
    async fn exclusivity_until_release() {
        let (_store, engine) = engine().await;
        for id in [A, B, C] {
            engine.enqueue(id).await.unwrap();
        }
        engine.try_pair(A, B).await.unwrap();

        assert!(matches!(
            engine.try_pair(A, C).await,
            Err(Error::AlreadyPaired(_))
        ));

        assert_eq!(engine.release(B).await.unwrap(), Some(A));
        assert_eq!(engine.status(A).await, ParticipantStatus::Idle);
        assert_eq!(engine.status(B).await, ParticipantStatus::Idle);
        engine.try_pair(A, C).await.unwrap();
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let (_store, engine) = engine().await;
        assert_eq!(engine.release(A).await.unwrap(), None);
        assert_eq!(engine.release(A).await.unwrap(), None);
        assert_eq!(engine.stats().await, PairingStats { waiting: 0, pairs: 0 });
    }

    #[tokio::test]
    async fn failed_commit_mutates_nothing() {
        let (store, engine) = engine().await;
        engine.enqueue(A).await.unwrap();
        engine.enqueue(B).await.unwrap();

        store.set_unavailable(true);
        assert!(matches!(
            engine.try_pair(B, A).await,
            Err(Error::StoreUnavailable(_))
        ));
        assert!(matches!(
            engine.enqueue(C).await,
            Err(Error::StoreUnavailable(_))
        ));
        assert_eq!(engine.get_partner(A).await, None);
        assert_eq!(engine.list_candidates(C).await, vec![A, B]);

        store.set_unavailable(false);
        engine.try_pair(B, A).await.unwrap();
        assert_eq!(engine.get_partner(B).await, Some(A));
    }

    #[tokio::test]
    async fn noop_mutations_do_not_touch_the_store() {
        let (store, engine) = engine().await;
        engine.enqueue(A).await.unwrap();
        store.set_unavailable(true);

        assert_eq!(engine.enqueue(A).await.unwrap(), EnqueueOutcome::AlreadyQueued);
        assert_eq!(engine.release(B).await.unwrap(), None);
    }

    #[tokio::test]
    async fn racing_selections_pair_the_target_once() {
        let (_store, engine) = engine().await;
        let engine = Arc::new(engine);
        let target = UserId(1);
        engine.enqueue(target).await.unwrap();

        let mut tasks = Vec::new();
        for i in 2..=33 {
            let engine = engine.clone();
            tasks.push(tokio::spawn(async move {
                let me = UserId(i);
                engine.enqueue(me).await.unwrap();
                engine.try_pair(me, target).await.is_ok()
            }));
        }

        let mut wins = 0;
        for t in tasks {
            if t.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);

        let winner = engine.get_partner(target).await.unwrap();
        assert_eq!(engine.get_partner(winner).await, Some(target));
        assert_eq!(engine.stats().await, PairingStats { waiting: 31, pairs: 1 });
        for id in engine.list_candidates(target).await {
            assert_eq!(engine.get_partner(id).await, None);
        }
    }

    #[tokio::test]
    async fn open_repairs_broken_snapshot() {
        let store = Arc::new(MemoryStateStore::new());
        let broken: PairingState =
            serde_json::from_str(r#"{"queue":[100],"partners":{"100":200}}"#).unwrap();
        store.commit(&broken).await.unwrap();

        let engine = PairingEngine::open(store.clone()).await.unwrap();
        assert_eq!(engine.get_partner(A).await, None);
        assert_eq!(engine.status(A).await, ParticipantStatus::Queued);
        assert_eq!(store.load().await.unwrap().partner_of(A), None);
    }
}
