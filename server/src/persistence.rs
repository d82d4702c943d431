use std::{
    collections::{BTreeMap, HashMap},
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{fs, sync::mpsc, time};

use crate::{combatant::Weapon, game_state::Room, id::Id};

const SAVE_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("{path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("{path}: {source}")]
    Json { path: PathBuf, source: serde_json::Error },
}

/// What survives a reconnect. Fight state never does.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub name: String,
    pub room_id: Id<Room>,
    pub hp: i32,
    pub max_hp: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub attack: i32,
    pub defense: i32,
    pub weapon: Weapon,
    pub xp: u32,
    pub level: u32,
    #[serde(default)]
    pub inventory: Vec<String>,
}

/// One JSON file per player, named by their lowercased name.
#[derive(Clone, Debug)]
pub struct PlayerStore {
    dir: PathBuf,
}

impl PlayerStore {
    pub fn new(data_dir: &Path) -> PlayerStore {
        PlayerStore { dir: data_dir.join("players") }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name.to_ascii_lowercase()))
    }

    pub async fn load(&self, name: &str) -> Result<Option<PlayerRecord>, PersistError> {
        let path = self.path_for(name);
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(PersistError::Io { path, source }),
        };
        let record =
            serde_json::from_str(&text).map_err(|source| PersistError::Json { path, source })?;
        Ok(Some(record))
    }

    /// Writes to a temporary file first so a crash never leaves half a record.
    pub async fn save(&self, record: &PlayerRecord) -> Result<(), PersistError> {
        let path = self.path_for(&record.name);
        let temp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(record)
            .map_err(|source| PersistError::Json { path: path.clone(), source })?;

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| PersistError::Io { path: self.dir.clone(), source })?;
        fs::write(&temp_path, json)
            .await
            .map_err(|source| PersistError::Io { path: temp_path.clone(), source })?;
        fs::rename(&temp_path, &path)
            .await
            .map_err(|source| PersistError::Io { path: path.clone(), source })?;
        debug!("Saved {}", path.display());
        Ok(())
    }
}

/// Records handed to the writer but not yet on disk, by lowercase name.
type Unsaved = Arc<Mutex<HashMap<String, PlayerRecord>>>;

fn lock(unsaved: &Unsaved) -> MutexGuard<'_, HashMap<String, PlayerRecord>> {
    unsaved.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fire-and-forget handle to the background writer. The game loop never
/// waits on the disk. Loads see queued saves before they reach the file.
#[derive(Clone, Debug)]
pub struct PersistenceHandle {
    store: PlayerStore,
    sender: mpsc::UnboundedSender<PlayerRecord>,
    unsaved: Unsaved,
}

impl PersistenceHandle {
    pub fn spawn(store: PlayerStore) -> PersistenceHandle {
        let (sender, receiver) = mpsc::unbounded_channel();
        let unsaved = Unsaved::default();
        tokio::spawn(run_writer(store.clone(), receiver, unsaved.clone()));
        PersistenceHandle { store, sender, unsaved }
    }

    pub fn save(&self, record: PlayerRecord) {
        lock(&self.unsaved).insert(record.name.to_ascii_lowercase(), record.clone());
        if self.sender.send(record).is_err() {
            error!("Player writer is gone, a save was dropped");
        }
    }

    pub async fn load(&self, name: &str) -> Result<Option<PlayerRecord>, PersistError> {
        let queued = lock(&self.unsaved).get(&name.to_ascii_lowercase()).cloned();
        match queued {
            Some(record) => Ok(Some(record)),
            None => self.store.load(name).await,
        }
    }
}

async fn run_writer(
    store: PlayerStore,
    mut receiver: mpsc::UnboundedReceiver<PlayerRecord>,
    unsaved: Unsaved,
) {
    while let Some(record) = receiver.recv().await {
        // Only the newest record per player matters.
        let mut batch = BTreeMap::new();
        batch.insert(record.name.to_ascii_lowercase(), record);
        while let Ok(record) = receiver.try_recv() {
            batch.insert(record.name.to_ascii_lowercase(), record);
        }
        for (key, record) in batch {
            if save_with_retry(&store, &record).await {
                let mut unsaved = lock(&unsaved);
                // A newer save may have been queued meanwhile.
                if unsaved.get(&key) == Some(&record) {
                    unsaved.remove(&key);
                }
            }
        }
    }
    debug!("Player writer stopped");
}

async fn save_with_retry(store: &PlayerStore, record: &PlayerRecord) -> bool {
    for attempt in 1..=SAVE_ATTEMPTS {
        match store.save(record).await {
            Ok(()) => return true,
            Err(err) if attempt < SAVE_ATTEMPTS => {
                warn!("Saving {} failed (attempt {}): {}", record.name, attempt, err);
                time::sleep(RETRY_BACKOFF * attempt).await;
            }
            Err(err) => error!("Giving up on saving {}: {}", record.name, err),
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Player;
    use tempfile::TempDir;

    fn record(name: &str) -> PlayerRecord {
        let mut player = Player::new(Id::new(1), name.to_string(), Id::new(3));
        player.xp = 42;
        player.inventory.push("rusty dagger".to_string());
        player.to_record()
    }

    #[tokio::test]
    async fn saved_records_load_back_by_any_case() {
        let dir = TempDir::new().unwrap();
        let store = PlayerStore::new(dir.path());

        store.save(&record("Alice")).await.unwrap();

        assert_eq!(store.load("ALICE").await.unwrap(), Some(record("Alice")));
        assert!(dir.path().join("players").join("alice.json").exists());
        assert!(!dir.path().join("players").join("alice.json.tmp").exists());
    }

    #[tokio::test]
    async fn unknown_players_have_no_record() {
        let dir = TempDir::new().unwrap();
        let store = PlayerStore::new(dir.path());
        assert_eq!(store.load("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_records_are_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("players")).unwrap();
        std::fs::write(dir.path().join("players").join("bob.json"), "{ not json").unwrap();
        let store = PlayerStore::new(dir.path());

        assert!(matches!(store.load("Bob").await, Err(PersistError::Json { .. })));
    }

    #[tokio::test]
    async fn background_writer_keeps_the_latest_record() {
        let dir = TempDir::new().unwrap();
        let store = PlayerStore::new(dir.path());
        let handle = PersistenceHandle::spawn(store.clone());

        let mut latest = record("Alice");
        handle.save(record("Alice"));
        latest.xp = 99;
        handle.save(latest.clone());

        let mut loaded = None;
        for _ in 0..50 {
            time::sleep(Duration::from_millis(20)).await;
            loaded = store.load("alice").await.unwrap();
            if loaded.as_ref() == Some(&latest) {
                break;
            }
        }
        assert_eq!(loaded, Some(latest));
    }

    #[tokio::test]
    async fn a_quick_reconnect_sees_the_queued_save() {
        let dir = TempDir::new().unwrap();
        let store = PlayerStore::new(dir.path());
        let mut old = record("Alice");
        old.xp = 1;
        store.save(&old).await.unwrap();
        let handle = PersistenceHandle::spawn(store.clone());

        let mut latest = record("Alice");
        latest.xp = 500;
        handle.save(latest.clone());

        assert_eq!(handle.load("alice").await.unwrap(), Some(latest.clone()));
        for _ in 0..50 {
            time::sleep(Duration::from_millis(20)).await;
            if lock(&handle.unsaved).is_empty() {
                break;
            }
        }
        assert!(lock(&handle.unsaved).is_empty());
        assert_eq!(store.load("alice").await.unwrap(), Some(latest.clone()));
        assert_eq!(handle.load("ALICE").await.unwrap(), Some(latest));
    }
}
