use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;

use crate::{errors::Error, pairing::state::PairingState, utils::write_json_atomic, Result};

/// Backing storage for the waiting queue and pairing map.
///
/// `commit` replaces the whole snapshot and must be all-or-nothing: after an
/// error the previously committed snapshot is still the one `load` returns.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self) -> Result<PairingState>;
    async fn commit(&self, state: &PairingState) -> Result<()>;
}

/// Process-local store. State is lost on restart.
#[derive(Default)]
pub struct MemoryStateStore {
    snapshot: Mutex<PairingState>,
    unavailable: AtomicBool,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreUnavailable` (or recover).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable("memory store offline".to_string()));
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, PairingState>> {
        self.snapshot
            .lock()
            .map_err(|_| Error::StoreUnavailable("memory store poisoned".to_string()))
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<PairingState> {
        self.check()?;
        Ok(self.lock()?.clone())
    }

    async fn commit(&self, state: &PairingState) -> Result<()> {
        self.check()?;
        *self.lock()? = state.clone();
        Ok(())
    }
}

/// JSON snapshot on disk, replaced atomically via a temp file + rename.
#[derive(Clone, Debug)]
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn unavailable(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::StoreUnavailable(format!("{}: {e}", path.display()))
}

#[async_trait]
impl StateStore for JsonFileStateStore {
    async fn load(&self) -> Result<PairingState> {
        let txt = match tokio::fs::read_to_string(&self.path).await {
            Ok(txt) => txt,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PairingState::default())
            }
            Err(e) => return Err(unavailable(&self.path, e)),
        };
        if txt.trim().is_empty() {
            return Ok(PairingState::default());
        }
        serde_json::from_str(&txt).map_err(|e| unavailable(&self.path, e))
    }

    async fn commit(&self, state: &PairingState) -> Result<()> {
        write_json_atomic(&self.path, state)
            .await
            .map_err(|e| unavailable(&self.path, e))
    }
}
