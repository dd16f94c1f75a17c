//! JSON file persistence for the address book.
//!
//! The file layout is private to this implementation and versioned so a
//! future change can be detected on load.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::domain::{AddrBook, AddressState, KnownAddress, NetworkAddress, Timestamp};

const FILE_VERSION: u32 = 1;

/// Errors loading or saving the address book file.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("address book file I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("address book file is malformed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported address book file version {0}")]
    UnsupportedVersion(u32),
}

#[derive(Debug, Serialize, Deserialize)]
struct AddrBookFile {
    version: u32,
    addrs: Vec<StoredAddress>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredAddress {
    addr: String,
    src: String,
    state: String,
    first_seen: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_attempt: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_success: Option<u64>,
    #[serde(default)]
    attempts: u32,
}

impl From<&KnownAddress> for StoredAddress {
    fn from(entry: &KnownAddress) -> Self {
        Self {
            addr: entry.addr.to_string(),
            src: entry.source.to_string(),
            state: entry.state.as_str().to_string(),
            first_seen: entry.first_seen.as_secs(),
            last_attempt: entry.last_attempt.map(|t| t.as_secs()),
            last_success: entry.last_success.map(|t| t.as_secs()),
            attempts: entry.attempts,
        }
    }
}

impl StoredAddress {
    fn into_known(self) -> Option<KnownAddress> {
        let addr: NetworkAddress = self.addr.parse().ok()?;
        let source: NetworkAddress = self.src.parse().ok()?;
        let state = AddressState::parse(&self.state)?;
        Some(KnownAddress {
            addr,
            source,
            state,
            first_seen: Timestamp::new(self.first_seen),
            last_attempt: self.last_attempt.map(Timestamp::new),
            last_success: self.last_success.map(Timestamp::new),
            attempts: self.attempts,
        })
    }
}

/// Loads and saves an [`AddrBook`] as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonAddrBookStore {
    path: PathBuf,
}

impl JsonAddrBookStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Restore entries into `book`. A missing file is an empty book.
    ///
    /// Returns how many entries were restored.
    pub fn load(&self, book: &AddrBook) -> Result<usize, PersistenceError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let file: AddrBookFile = serde_json::from_str(&raw)?;
        if file.version != FILE_VERSION {
            return Err(PersistenceError::UnsupportedVersion(file.version));
        }

        let total = file.addrs.len();
        let entries: Vec<KnownAddress> = file
            .addrs
            .into_iter()
            .filter_map(StoredAddress::into_known)
            .collect();
        if entries.len() < total {
            warn!(
                skipped = total - entries.len(),
                path = %self.path.display(),
                "Skipped malformed address book entries"
            );
        }

        let restored = book.restore(entries);
        info!(restored, path = %self.path.display(), "Loaded address book");
        Ok(restored)
    }

    /// Write every entry of `book`, replacing the file atomically.
    pub fn save(&self, book: &AddrBook) -> Result<(), PersistenceError> {
        let snapshot = book.snapshot();
        let file = AddrBookFile {
            version: FILE_VERSION,
            addrs: snapshot.iter().map(StoredAddress::from).collect(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        info!(count = snapshot.len(), path = %self.path.display(), "Saved address book");
        Ok(())
    }

    /// Save `book` every `period` until `shutdown` turns true.
    ///
    /// The first save happens one period after spawning. A failed save is
    /// logged and retried on the next tick.
    pub fn spawn_periodic_save(
        &self,
        book: Arc<AddrBook>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = store.save(&book) {
                            warn!(error = %e, path = %store.path.display(), "Periodic address book save failed");
                        }
                    }
                }
            }
            debug!("Address book save routine stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AddrBookConfig;
    use crate::testing::{routable_addr, FixedTimeSource};

    fn book() -> AddrBook {
        AddrBook::new(AddrBookConfig::default(), Arc::new(FixedTimeSource::new(1000)))
    }

    #[test]
    fn test_missing_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonAddrBookStore::new(dir.path().join("addrbook.json"));
        assert_eq!(store.load(&book()).unwrap(), 0);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonAddrBookStore::new(dir.path().join("nested").join("addrbook.json"));

        let original = book();
        original.add(&routable_addr(1), &routable_addr(9)).unwrap();
        original.add(&routable_addr(2), &routable_addr(9)).unwrap();
        original.mark_good(&routable_addr(1).id);
        store.save(&original).unwrap();

        let loaded = book();
        assert_eq!(store.load(&loaded).unwrap(), 2);
        assert_eq!(
            loaded.get(&routable_addr(1).id).unwrap().state,
            AddressState::Good
        );
        assert_eq!(loaded.get(&routable_addr(2).id).unwrap().source, routable_addr(9));
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("addrbook.json");
        let good = routable_addr(1).to_string();
        fs::write(
            &path,
            format!(
                r#"{{"version":1,"addrs":[
                    {{"addr":"{good}","src":"{good}","state":"new","first_seen":5}},
                    {{"addr":"garbage","src":"{good}","state":"new","first_seen":5}}
                ]}}"#
            ),
        )
        .unwrap();

        let loaded = book();
        assert_eq!(JsonAddrBookStore::new(&path).load(&loaded).unwrap(), 1);
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("addrbook.json");
        fs::write(&path, r#"{"version":99,"addrs":[]}"#).unwrap();
        assert!(matches!(
            JsonAddrBookStore::new(&path).load(&book()),
            Err(PersistenceError::UnsupportedVersion(99))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_save_writes_after_each_period() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonAddrBookStore::new(dir.path().join("addrbook.json"));
        let live = Arc::new(book());
        live.add(&routable_addr(1), &routable_addr(9)).unwrap();
        let (shutdown, rx) = watch::channel(false);

        let task = store.spawn_periodic_save(live.clone(), Duration::from_secs(120), rx);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!store.path().exists());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(store.load(&book()).unwrap(), 1);

        live.add(&routable_addr(2), &routable_addr(9)).unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(store.load(&book()).unwrap(), 2);

        shutdown.send_replace(true);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_save_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonAddrBookStore::new(dir.path().join("addrbook.json"));
        let (shutdown, rx) = watch::channel(false);
        let task = store.spawn_periodic_save(Arc::new(book()), Duration::from_secs(120), rx);

        shutdown.send_replace(true);
        task.await.unwrap();
        tokio::time::sleep(Duration::from_secs(300)).await;

        assert!(!store.path().exists());
    }
}
