//! Row types exchanged with a [`Store`](super::Store), and their mapping
//! to and from in-memory sessions.

use log::warn;
use serde::{Deserialize, Serialize};

use super::blob::Blob;
use crate::world::{Cloth, ItemStack, NonoInfo, Pet, Session, TaskState, TeamInfo, WorldState};

/// Persisted part of a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub user_id: u32,
    pub nick: String,
    pub reg_time: u32,
    pub color: u32,
    pub texture: u32,
    pub energy: u32,
    pub coins: u32,
    pub gold: u32,
    pub fight_badge: u32,
    pub map_id: u32,
    pub map_type: u32,
    pub pos_x: u32,
    pub pos_y: u32,
    pub current_pet: u32,
    pub clothes: Vec<u8>,
    pub nono: Vec<u8>,
    pub team: Vec<u8>,
    pub tasks: Vec<u8>,
}

impl PlayerRecord {
    pub fn from_session(session: &Session) -> Result<Self, bincode::Error> {
        Ok(Self {
            user_id: session.user_id,
            nick: session.nick.clone(),
            reg_time: session.reg_time,
            color: session.color,
            texture: session.texture,
            energy: session.energy,
            coins: session.coins,
            gold: session.gold,
            fight_badge: session.fight_badge,
            map_id: session.map_id(),
            map_type: session.map_type,
            pos_x: session.pos_x,
            pos_y: session.pos_y,
            current_pet: session.current_pet,
            clothes: session.clothes.encode()?,
            nono: session.nono.encode()?,
            team: session.team.encode()?,
            tasks: session.tasks.encode()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetRow {
    pub user_id: u32,
    pub catch_time: u32,
    pub species_id: u32,
    pub level: u32,
    pub dv: u32,
    pub exp: u32,
    pub hp: u32,
    pub skills: [u32; 4],
    pub name: String,
}

impl PetRow {
    pub fn from_pet(user_id: u32, pet: &Pet) -> Self {
        Self {
            user_id,
            catch_time: pet.catch_time,
            species_id: pet.species_id,
            level: pet.level,
            dv: pet.dv,
            exp: pet.exp,
            hp: pet.hp,
            skills: pet.skills,
            name: pet.name.clone(),
        }
    }

    pub fn into_pet(self) -> Pet {
        let mut pet = Pet::new(self.species_id, self.catch_time, self.level, self.dv);
        pet.exp = self.exp;
        pet.hp = self.hp;
        pet.skills = self.skills;
        pet.name = self.name;
        pet
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRow {
    pub user_id: u32,
    pub item_id: u32,
    pub count: u32,
    pub expire_time: u32,
}

impl ItemRow {
    pub fn from_stack(user_id: u32, item_id: u32, stack: &ItemStack) -> Self {
        Self {
            user_id,
            item_id,
            count: stack.count,
            expire_time: stack.expire_time,
        }
    }
}

/// Everything stored for one player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub player: PlayerRecord,
    pub pets: Vec<PetRow>,
    pub items: Vec<ItemRow>,
}

impl PlayerSnapshot {
    pub fn from_session(session: &Session) -> Result<Self, bincode::Error> {
        Ok(Self {
            player: PlayerRecord::from_session(session)?,
            pets: session
                .pets
                .iter()
                .map(|pet| PetRow::from_pet(session.user_id, pet))
                .collect(),
            items: session
                .items
                .iter()
                .map(|(item_id, stack)| ItemRow::from_stack(session.user_id, *item_id, stack))
                .collect(),
        })
    }

    /// Load this snapshot into the world, replacing the session's stored fields.
    ///
    /// A sub-record that fails to decode is reset to its default.
    pub fn hydrate(self, world: &WorldState) {
        let PlayerSnapshot { player, pets, items } = self;
        let user_id = player.user_id;
        let clothes = decode_or_default::<Vec<Cloth>>(user_id, "clothes", &player.clothes);
        let nono = decode_or_default::<NonoInfo>(user_id, "nono", &player.nono);
        let team = decode_or_default::<TeamInfo>(user_id, "team", &player.team);
        let tasks = decode_or_default::<TaskState>(user_id, "tasks", &player.tasks);

        world.hydrate_session(user_id, player.map_id, move |session| {
            session.nick = player.nick;
            session.reg_time = player.reg_time;
            session.color = player.color;
            session.texture = player.texture;
            session.energy = player.energy;
            session.coins = player.coins;
            session.gold = player.gold;
            session.fight_badge = player.fight_badge;
            session.map_type = player.map_type;
            session.pos_x = player.pos_x;
            session.pos_y = player.pos_y;
            session.current_pet = player.current_pet;
            session.clothes = clothes;
            session.nono = nono;
            session.team = team;
            session.tasks = tasks;

            session.pets.clear();
            for row in pets {
                session.add_pet(row.into_pet());
            }
            session.items = items
                .into_iter()
                .map(|row| {
                    let stack = ItemStack {
                        count: row.count,
                        expire_time: row.expire_time,
                    };
                    (row.item_id, stack)
                })
                .collect();
        });
    }
}

fn decode_or_default<T: Blob>(user_id: u32, field: &str, raw: &[u8]) -> T {
    T::decode(raw).unwrap_or_else(|e| {
        warn!("Player {} has an unreadable {} record, resetting it: {}", user_id, field, e);
        T::default()
    })
}
