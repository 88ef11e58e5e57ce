//! Redis read-through cache for player snapshots.

use redis::{aio::ConnectionManager, AsyncCommands};

use super::{PlayerSnapshot, StoreError};

const PLAYER_PREFIX: &str = "seer:player:";

/// TTL for cached data (1 hour)
const CACHE_TTL_SECONDS: u64 = 3600;

fn player_key(user_id: u32) -> String {
    format!("{}{}", PLAYER_PREFIX, user_id)
}

/// Redis cache wrapper
#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
}

impl Cache {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    pub async fn put(&self, snapshot: &PlayerSnapshot) -> Result<(), StoreError> {
        let json = serde_json::to_string(snapshot)?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(player_key(snapshot.player.user_id), json, CACHE_TTL_SECONDS)
            .await?;
        Ok(())
    }

    /// A cached entry that no longer parses counts as a miss
    pub async fn get(&self, user_id: u32) -> Result<Option<PlayerSnapshot>, StoreError> {
        let mut conn = self.conn.clone();
        let json: Option<String> = conn.get(player_key(user_id)).await?;
        Ok(json.and_then(|j| serde_json::from_str(&j).ok()))
    }

    /// Drop a player's entry after any write so the next load rereads the store
    pub async fn invalidate(&self, user_id: u32) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(player_key(user_id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_key_layout() {
        assert_eq!(player_key(1001), "seer:player:1001");
    }
}
