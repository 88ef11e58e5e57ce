//! In-process store used when no database is configured, and by tests.

use std::collections::{BTreeMap, HashMap};

use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;

use super::{ItemRow, PetRow, PlayerRecord, Store, StoreError};

#[derive(Default)]
struct Tables {
    players: HashMap<u32, PlayerRecord>,
    pets: BTreeMap<(u32, u32), PetRow>,
    items: BTreeMap<(u32, u32), ItemRow>,
}

/// Keeps every row in memory; lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn rows_for<T: Clone>(table: &BTreeMap<(u32, u32), T>, user_id: u32) -> Vec<T> {
    table
        .range((user_id, 0)..=(user_id, u32::MAX))
        .map(|(_, row)| row.clone())
        .collect()
}

impl Store for MemoryStore {
    fn load_player(&self, user_id: u32) -> BoxFuture<'_, Result<Option<PlayerRecord>, StoreError>> {
        let record = self.tables.lock().players.get(&user_id).cloned();
        future::ready(Ok(record)).boxed()
    }

    fn save_player(&self, record: PlayerRecord) -> BoxFuture<'_, Result<(), StoreError>> {
        self.tables.lock().players.insert(record.user_id, record);
        future::ready(Ok(())).boxed()
    }

    fn list_pets(&self, user_id: u32) -> BoxFuture<'_, Result<Vec<PetRow>, StoreError>> {
        let rows = rows_for(&self.tables.lock().pets, user_id);
        future::ready(Ok(rows)).boxed()
    }

    fn upsert_pet(&self, row: PetRow) -> BoxFuture<'_, Result<(), StoreError>> {
        self.tables
            .lock()
            .pets
            .insert((row.user_id, row.catch_time), row);
        future::ready(Ok(())).boxed()
    }

    fn delete_pet(&self, user_id: u32, catch_time: u32) -> BoxFuture<'_, Result<(), StoreError>> {
        self.tables.lock().pets.remove(&(user_id, catch_time));
        future::ready(Ok(())).boxed()
    }

    fn list_items(&self, user_id: u32) -> BoxFuture<'_, Result<Vec<ItemRow>, StoreError>> {
        let rows = rows_for(&self.tables.lock().items, user_id);
        future::ready(Ok(rows)).boxed()
    }

    fn upsert_item(&self, row: ItemRow) -> BoxFuture<'_, Result<(), StoreError>> {
        self.tables
            .lock()
            .items
            .insert((row.user_id, row.item_id), row);
        future::ready(Ok(())).boxed()
    }

    fn delete_item(&self, user_id: u32, item_id: u32) -> BoxFuture<'_, Result<(), StoreError>> {
        self.tables.lock().items.remove(&(user_id, item_id));
        future::ready(Ok(())).boxed()
    }
}
