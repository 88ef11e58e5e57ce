//! Player persistence.
//!
//! Handlers never wait on storage writes: they queue commands on a
//! [`PersistenceHandle`] and a background task applies them in order. Loads
//! go through the same queue, so a load always observes earlier saves.

mod blob;
mod cache;
mod database;
mod memory;
mod records;

pub use cache::Cache;
pub use database::Database;
pub use memory::MemoryStore;
pub use records::{ItemRow, PetRow, PlayerRecord, PlayerSnapshot};

use std::sync::Arc;

use futures::future::BoxFuture;
use log::{error, info, warn};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::config::ServerConfig;
use crate::world::{ItemStack, Pet, Session};

/// Queue depth before fire-and-forget writes start being dropped
const QUEUE_CAPACITY: usize = 1024;

const DEFAULT_DB_CONNECTIONS: u32 = 10;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),
    #[error("record encoding error: {0}")]
    Blob(#[from] bincode::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("column {column} holds out of range value {value}")]
    OutOfRange { column: &'static str, value: i64 },
}

/// Storage backend for player, pet and item rows
pub trait Store: Send + Sync {
    fn load_player(&self, user_id: u32) -> BoxFuture<'_, Result<Option<PlayerRecord>, StoreError>>;
    fn save_player(&self, record: PlayerRecord) -> BoxFuture<'_, Result<(), StoreError>>;
    fn list_pets(&self, user_id: u32) -> BoxFuture<'_, Result<Vec<PetRow>, StoreError>>;
    fn upsert_pet(&self, row: PetRow) -> BoxFuture<'_, Result<(), StoreError>>;
    fn delete_pet(&self, user_id: u32, catch_time: u32) -> BoxFuture<'_, Result<(), StoreError>>;
    fn list_items(&self, user_id: u32) -> BoxFuture<'_, Result<Vec<ItemRow>, StoreError>>;
    fn upsert_item(&self, row: ItemRow) -> BoxFuture<'_, Result<(), StoreError>>;
    fn delete_item(&self, user_id: u32, item_id: u32) -> BoxFuture<'_, Result<(), StoreError>>;
}

/// Commands sent to the persistence background task
#[derive(Debug)]
pub enum PersistenceCommand {
    SavePlayer(PlayerRecord),
    UpsertPet(PetRow),
    DeletePet { user_id: u32, catch_time: u32 },
    UpsertItem(ItemRow),
    DeleteItem { user_id: u32, item_id: u32 },
    LoadPlayer {
        user_id: u32,
        response: oneshot::Sender<Option<PlayerSnapshot>>,
    },
    Shutdown,
}

impl PersistenceCommand {
    fn user_id(&self) -> Option<u32> {
        match self {
            Self::SavePlayer(record) => Some(record.user_id),
            Self::UpsertPet(row) => Some(row.user_id),
            Self::UpsertItem(row) => Some(row.user_id),
            Self::DeletePet { user_id, .. }
            | Self::DeleteItem { user_id, .. }
            | Self::LoadPlayer { user_id, .. } => Some(*user_id),
            Self::Shutdown => None,
        }
    }
}

/// Handle for sending commands to the persistence task
#[derive(Clone)]
pub struct PersistenceHandle {
    sender: mpsc::Sender<PersistenceCommand>,
}

impl PersistenceHandle {
    fn enqueue(&self, cmd: PersistenceCommand) {
        let user_id = cmd.user_id();
        if let Err(e) = self.sender.try_send(cmd) {
            warn!("Dropping persistence write for player {:?}: {}", user_id, e);
        }
    }

    pub fn save_player(&self, record: PlayerRecord) {
        self.enqueue(PersistenceCommand::SavePlayer(record));
    }

    pub fn upsert_pet(&self, row: PetRow) {
        self.enqueue(PersistenceCommand::UpsertPet(row));
    }

    pub fn delete_pet(&self, user_id: u32, catch_time: u32) {
        self.enqueue(PersistenceCommand::DeletePet { user_id, catch_time });
    }

    pub fn upsert_item(&self, row: ItemRow) {
        self.enqueue(PersistenceCommand::UpsertItem(row));
    }

    pub fn delete_item(&self, user_id: u32, item_id: u32) {
        self.enqueue(PersistenceCommand::DeleteItem { user_id, item_id });
    }

    /// Queue the player record of a session
    pub fn save_session(&self, session: &Session) {
        match PlayerRecord::from_session(session) {
            Ok(record) => self.save_player(record),
            Err(e) => error!("Failed to encode player {}: {}", session.user_id, e),
        }
    }

    pub fn save_pet(&self, user_id: u32, pet: &Pet) {
        self.upsert_pet(PetRow::from_pet(user_id, pet));
    }

    /// Queue an item row, deleting it once the stack is empty
    pub fn save_item(&self, user_id: u32, item_id: u32, stack: &ItemStack) {
        if stack.count == 0 {
            self.delete_item(user_id, item_id);
        } else {
            self.upsert_item(ItemRow::from_stack(user_id, item_id, stack));
        }
    }

    /// Load everything stored for a player; `None` when absent or unreachable
    pub async fn load_player(&self, user_id: u32) -> Option<PlayerSnapshot> {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(PersistenceCommand::LoadPlayer { user_id, response: tx })
            .await
            .is_err()
        {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Shutdown the persistence task
    pub async fn shutdown(&self) {
        let _ = self.sender.send(PersistenceCommand::Shutdown).await;
    }
}

/// Spawn the background task over `store`, with an optional cache in front.
pub fn spawn(store: Arc<dyn Store>, cache: Option<Cache>) -> PersistenceHandle {
    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
    tokio::spawn(persistence_task(store, cache, rx));
    PersistenceHandle { sender: tx }
}

/// Connect the configured backends and spawn the background task.
///
/// An unreachable database falls back to the in-memory store and an
/// unreachable cache is skipped; neither stops startup.
pub async fn init(config: &ServerConfig) -> PersistenceHandle {
    let store: Arc<dyn Store> = match config.database.url.as_deref() {
        Some(url) => {
            let max = config.database.max_connections.unwrap_or(DEFAULT_DB_CONNECTIONS);
            match Database::connect(url, max).await {
                Ok(db) => {
                    info!("Connected to PostgreSQL");
                    Arc::new(db)
                }
                Err(e) => {
                    error!("Failed to connect to PostgreSQL, keeping players in memory: {}", e);
                    Arc::new(MemoryStore::new())
                }
            }
        }
        None => {
            info!("No database configured, keeping players in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let cache = match config.cache.url.as_deref() {
        Some(url) => match Cache::connect(url).await {
            Ok(cache) => {
                info!("Connected to Redis");
                Some(cache)
            }
            Err(e) => {
                warn!("Failed to connect to Redis, running without cache: {}", e);
                None
            }
        },
        None => None,
    };

    let handle = spawn(store, cache);
    info!("Persistence background task started");
    handle
}

async fn load_snapshot(store: &dyn Store, user_id: u32) -> Result<Option<PlayerSnapshot>, StoreError> {
    let Some(player) = store.load_player(user_id).await? else {
        return Ok(None);
    };
    let pets = store.list_pets(user_id).await?;
    let items = store.list_items(user_id).await?;
    Ok(Some(PlayerSnapshot { player, pets, items }))
}

async fn apply(store: &dyn Store, cmd: PersistenceCommand) -> Result<(), StoreError> {
    match cmd {
        PersistenceCommand::SavePlayer(record) => store.save_player(record).await,
        PersistenceCommand::UpsertPet(row) => store.upsert_pet(row).await,
        PersistenceCommand::DeletePet { user_id, catch_time } => {
            store.delete_pet(user_id, catch_time).await
        }
        PersistenceCommand::UpsertItem(row) => store.upsert_item(row).await,
        PersistenceCommand::DeleteItem { user_id, item_id } => {
            store.delete_item(user_id, item_id).await
        }
        PersistenceCommand::LoadPlayer { .. } | PersistenceCommand::Shutdown => Ok(()),
    }
}

/// Background task that handles all persistence operations
async fn persistence_task(
    store: Arc<dyn Store>,
    cache: Option<Cache>,
    mut rx: mpsc::Receiver<PersistenceCommand>,
) {
    info!("Persistence task running");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            PersistenceCommand::LoadPlayer { user_id, response } => {
                if let Some(cache) = &cache {
                    match cache.get(user_id).await {
                        Ok(Some(snapshot)) => {
                            let _ = response.send(Some(snapshot));
                            continue;
                        }
                        Ok(None) => {}
                        Err(e) => warn!("Failed to read player {} from cache: {}", user_id, e),
                    }
                }

                let result = match load_snapshot(store.as_ref(), user_id).await {
                    Ok(Some(snapshot)) => {
                        info!("Loaded player {} from store", user_id);
                        if let Some(cache) = &cache {
                            if let Err(e) = cache.put(&snapshot).await {
                                warn!("Failed to cache player {}: {}", user_id, e);
                            }
                        }
                        Some(snapshot)
                    }
                    Ok(None) => None,
                    Err(e) => {
                        error!("Failed to load player {}: {}", user_id, e);
                        None
                    }
                };
                let _ = response.send(result);
            }

            PersistenceCommand::Shutdown => {
                info!("Persistence task shutting down");
                break;
            }

            write => {
                let user_id = write.user_id();
                if let Err(e) = apply(store.as_ref(), write).await {
                    error!("Failed to persist player {:?}: {}", user_id, e);
                }
                if let (Some(cache), Some(user_id)) = (&cache, user_id) {
                    if let Err(e) = cache.invalidate(user_id).await {
                        warn!("Failed to invalidate cached player {}: {}", user_id, e);
                    }
                }
            }
        }
    }

    info!("Persistence task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Spawn, WorldState};

    #[tokio::test]
    async fn test_saved_session_loads_back() {
        let store = Arc::new(MemoryStore::new());
        let handle = spawn(store.clone(), None);

        let mut session = Session::new(1001, Spawn::default());
        session.coins = 1234;
        session.add_pet(Pet::new(7, 55, 5, 31));
        session.add_item(300011, 2);

        handle.save_session(&session);
        for pet in &session.pets {
            handle.save_pet(session.user_id, pet);
        }
        for (item_id, stack) in &session.items {
            handle.save_item(session.user_id, *item_id, stack);
        }

        let snapshot = handle.load_player(1001).await.unwrap();
        assert_eq!(snapshot.player.coins, 1234);
        assert_eq!(snapshot.pets.len(), 1);
        assert_eq!(snapshot.items[0].item_id, 300011);

        let world = WorldState::default();
        snapshot.hydrate(&world);
        assert_eq!(world.session(1001).map(|s| s.coins), Some(1234));
    }

    #[tokio::test]
    async fn test_unknown_player_loads_none() {
        let handle = spawn(Arc::new(MemoryStore::new()), None);
        assert!(handle.load_player(77).await.is_none());
    }

    #[tokio::test]
    async fn test_empty_stack_deletes_row() {
        let store = Arc::new(MemoryStore::new());
        let handle = spawn(store.clone(), None);

        handle.save_item(5, 1, &ItemStack { count: 3, expire_time: 0 });
        handle.save_item(5, 1, &ItemStack { count: 0, expire_time: 0 });
        // Round trip through the queue so both writes have landed
        handle.load_player(5).await;

        assert!(store.list_items(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_closes_queue() {
        let handle = spawn(Arc::new(MemoryStore::new()), None);
        handle.shutdown().await;
        tokio::task::yield_now().await;
        assert!(handle.load_player(1).await.is_none());
    }
}
