//! PostgreSQL store.
//!
//! Unsigned protocol values are kept in `BIGINT` columns and range-checked
//! on the way back out.

use futures::future::{BoxFuture, FutureExt};
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Row};

use super::{ItemRow, PetRow, PlayerRecord, Store, StoreError};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS seer_players (
        user_id      BIGINT PRIMARY KEY,
        nick         TEXT NOT NULL,
        reg_time     BIGINT NOT NULL,
        color        BIGINT NOT NULL,
        texture      BIGINT NOT NULL,
        energy       BIGINT NOT NULL,
        coins        BIGINT NOT NULL,
        gold         BIGINT NOT NULL,
        fight_badge  BIGINT NOT NULL,
        map_id       BIGINT NOT NULL,
        map_type     BIGINT NOT NULL,
        pos_x        BIGINT NOT NULL,
        pos_y        BIGINT NOT NULL,
        current_pet  BIGINT NOT NULL,
        clothes      BYTEA NOT NULL,
        nono         BYTEA NOT NULL,
        team         BYTEA NOT NULL,
        tasks        BYTEA NOT NULL,
        updated_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS seer_pets (
        user_id     BIGINT NOT NULL,
        catch_time  BIGINT NOT NULL,
        species_id  BIGINT NOT NULL,
        level       BIGINT NOT NULL,
        dv          BIGINT NOT NULL,
        exp         BIGINT NOT NULL,
        hp          BIGINT NOT NULL,
        skills      BIGINT[] NOT NULL,
        name        TEXT NOT NULL,
        PRIMARY KEY (user_id, catch_time)
    )",
    "CREATE TABLE IF NOT EXISTS seer_items (
        user_id      BIGINT NOT NULL,
        item_id      BIGINT NOT NULL,
        count        BIGINT NOT NULL,
        expire_time  BIGINT NOT NULL,
        PRIMARY KEY (user_id, item_id)
    )",
];

/// Database connection wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect and make sure the tables exist
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn load_player_row(&self, user_id: u32) -> Result<Option<PlayerRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT user_id, nick, reg_time, color, texture, energy, coins, gold, fight_badge,
                    map_id, map_type, pos_x, pos_y, current_pet, clothes, nono, team, tasks
             FROM seer_players WHERE user_id = $1",
        )
        .bind(i64::from(user_id))
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> Result<PlayerRecord, StoreError> {
            Ok(PlayerRecord {
                user_id: column(&r, "user_id")?,
                nick: r.try_get("nick")?,
                reg_time: column(&r, "reg_time")?,
                color: column(&r, "color")?,
                texture: column(&r, "texture")?,
                energy: column(&r, "energy")?,
                coins: column(&r, "coins")?,
                gold: column(&r, "gold")?,
                fight_badge: column(&r, "fight_badge")?,
                map_id: column(&r, "map_id")?,
                map_type: column(&r, "map_type")?,
                pos_x: column(&r, "pos_x")?,
                pos_y: column(&r, "pos_y")?,
                current_pet: column(&r, "current_pet")?,
                clothes: r.try_get("clothes")?,
                nono: r.try_get("nono")?,
                team: r.try_get("team")?,
                tasks: r.try_get("tasks")?,
            })
        })
        .transpose()
    }

    async fn save_player_row(&self, record: &PlayerRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO seer_players (user_id, nick, reg_time, color, texture, energy, coins, gold,
                                       fight_badge, map_id, map_type, pos_x, pos_y, current_pet,
                                       clothes, nono, team, tasks)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
             ON CONFLICT (user_id) DO UPDATE SET
                nick = EXCLUDED.nick,
                reg_time = EXCLUDED.reg_time,
                color = EXCLUDED.color,
                texture = EXCLUDED.texture,
                energy = EXCLUDED.energy,
                coins = EXCLUDED.coins,
                gold = EXCLUDED.gold,
                fight_badge = EXCLUDED.fight_badge,
                map_id = EXCLUDED.map_id,
                map_type = EXCLUDED.map_type,
                pos_x = EXCLUDED.pos_x,
                pos_y = EXCLUDED.pos_y,
                current_pet = EXCLUDED.current_pet,
                clothes = EXCLUDED.clothes,
                nono = EXCLUDED.nono,
                team = EXCLUDED.team,
                tasks = EXCLUDED.tasks,
                updated_at = NOW()",
        )
        .bind(i64::from(record.user_id))
        .bind(&record.nick)
        .bind(i64::from(record.reg_time))
        .bind(i64::from(record.color))
        .bind(i64::from(record.texture))
        .bind(i64::from(record.energy))
        .bind(i64::from(record.coins))
        .bind(i64::from(record.gold))
        .bind(i64::from(record.fight_badge))
        .bind(i64::from(record.map_id))
        .bind(i64::from(record.map_type))
        .bind(i64::from(record.pos_x))
        .bind(i64::from(record.pos_y))
        .bind(i64::from(record.current_pet))
        .bind(&record.clothes)
        .bind(&record.nono)
        .bind(&record.team)
        .bind(&record.tasks)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_pets(&self, user_id: u32) -> Result<Vec<PetRow>, StoreError> {
        let rows = sqlx::query(
            "SELECT user_id, catch_time, species_id, level, dv, exp, hp, skills, name
             FROM seer_pets WHERE user_id = $1 ORDER BY catch_time",
        )
        .bind(i64::from(user_id))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> Result<PetRow, StoreError> {
                let stored: Vec<i64> = r.try_get("skills")?;
                let mut skills = [0u32; 4];
                for (slot, id) in skills.iter_mut().zip(stored) {
                    *slot = narrow("skills", id)?;
                }
                Ok(PetRow {
                    user_id: column(r, "user_id")?,
                    catch_time: column(r, "catch_time")?,
                    species_id: column(r, "species_id")?,
                    level: column(r, "level")?,
                    dv: column(r, "dv")?,
                    exp: column(r, "exp")?,
                    hp: column(r, "hp")?,
                    skills,
                    name: r.try_get("name")?,
                })
            })
            .collect()
    }

    async fn save_pet(&self, row: &PetRow) -> Result<(), StoreError> {
        let skills: Vec<i64> = row.skills.iter().map(|&id| i64::from(id)).collect();
        sqlx::query(
            "INSERT INTO seer_pets (user_id, catch_time, species_id, level, dv, exp, hp, skills, name)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (user_id, catch_time) DO UPDATE SET
                species_id = EXCLUDED.species_id,
                level = EXCLUDED.level,
                dv = EXCLUDED.dv,
                exp = EXCLUDED.exp,
                hp = EXCLUDED.hp,
                skills = EXCLUDED.skills,
                name = EXCLUDED.name",
        )
        .bind(i64::from(row.user_id))
        .bind(i64::from(row.catch_time))
        .bind(i64::from(row.species_id))
        .bind(i64::from(row.level))
        .bind(i64::from(row.dv))
        .bind(i64::from(row.exp))
        .bind(i64::from(row.hp))
        .bind(skills)
        .bind(&row.name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove_pet(&self, user_id: u32, catch_time: u32) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM seer_pets WHERE user_id = $1 AND catch_time = $2")
            .bind(i64::from(user_id))
            .bind(i64::from(catch_time))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn load_items(&self, user_id: u32) -> Result<Vec<ItemRow>, StoreError> {
        let rows = sqlx::query(
            "SELECT user_id, item_id, count, expire_time FROM seer_items
             WHERE user_id = $1 ORDER BY item_id",
        )
        .bind(i64::from(user_id))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> Result<ItemRow, StoreError> {
                Ok(ItemRow {
                    user_id: column(r, "user_id")?,
                    item_id: column(r, "item_id")?,
                    count: column(r, "count")?,
                    expire_time: column(r, "expire_time")?,
                })
            })
            .collect()
    }

    async fn save_item(&self, row: &ItemRow) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO seer_items (user_id, item_id, count, expire_time)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id, item_id) DO UPDATE SET
                count = EXCLUDED.count,
                expire_time = EXCLUDED.expire_time",
        )
        .bind(i64::from(row.user_id))
        .bind(i64::from(row.item_id))
        .bind(i64::from(row.count))
        .bind(i64::from(row.expire_time))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove_item(&self, user_id: u32, item_id: u32) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM seer_items WHERE user_id = $1 AND item_id = $2")
            .bind(i64::from(user_id))
            .bind(i64::from(item_id))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn column(row: &PgRow, name: &'static str) -> Result<u32, StoreError> {
    let value: i64 = row.try_get(name)?;
    narrow(name, value)
}

fn narrow(name: &'static str, value: i64) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::OutOfRange { column: name, value })
}

impl Store for Database {
    fn load_player(&self, user_id: u32) -> BoxFuture<'_, Result<Option<PlayerRecord>, StoreError>> {
        self.load_player_row(user_id).boxed()
    }

    fn save_player(&self, record: PlayerRecord) -> BoxFuture<'_, Result<(), StoreError>> {
        async move { self.save_player_row(&record).await }.boxed()
    }

    fn list_pets(&self, user_id: u32) -> BoxFuture<'_, Result<Vec<PetRow>, StoreError>> {
        self.load_pets(user_id).boxed()
    }

    fn upsert_pet(&self, row: PetRow) -> BoxFuture<'_, Result<(), StoreError>> {
        async move { self.save_pet(&row).await }.boxed()
    }

    fn delete_pet(&self, user_id: u32, catch_time: u32) -> BoxFuture<'_, Result<(), StoreError>> {
        self.remove_pet(user_id, catch_time).boxed()
    }

    fn list_items(&self, user_id: u32) -> BoxFuture<'_, Result<Vec<ItemRow>, StoreError>> {
        self.load_items(user_id).boxed()
    }

    fn upsert_item(&self, row: ItemRow) -> BoxFuture<'_, Result<(), StoreError>> {
        async move { self.save_item(&row).await }.boxed()
    }

    fn delete_item(&self, user_id: u32, item_id: u32) -> BoxFuture<'_, Result<(), StoreError>> {
        self.remove_item(user_id, item_id).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narrow_rejects_out_of_range() {
        assert_eq!(narrow("coins", 42).unwrap(), 42);
        assert_eq!(narrow("coins", i64::from(u32::MAX)).unwrap(), u32::MAX);
        assert!(matches!(
            narrow("coins", -1),
            Err(StoreError::OutOfRange { column: "coins", value: -1 })
        ));
        assert!(narrow("coins", 1 << 40).is_err());
    }

    #[test]
    fn test_schema_covers_every_table() {
        let joined = SCHEMA.join("\n");
        for table in ["seer_players", "seer_pets", "seer_items"] {
            assert!(joined.contains(table), "missing {}", table);
        }
    }
}
