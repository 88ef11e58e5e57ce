//! Per-player session data.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::battle::FightState;

/// Highest genetic value a pet can carry
pub const MAX_DV: u32 = 31;

/// Where new sessions appear
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spawn {
    pub map_id: u32,
    pub x: u32,
    pub y: u32,
}

impl Default for Spawn {
    fn default() -> Self {
        Self { map_id: 1, x: 300, y: 270 }
    }
}

/// An owned creature instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pet {
    pub species_id: u32,
    /// Unique per owner; identifies the instance
    pub catch_time: u32,
    pub level: u32,
    pub dv: u32,
    pub exp: u32,
    pub hp: u32,
    pub skills: [u32; 4],
    pub name: String,
}

impl Pet {
    pub fn new(species_id: u32, catch_time: u32, level: u32, dv: u32) -> Self {
        Self {
            species_id,
            catch_time,
            level: level.max(1),
            dv: dv.min(MAX_DV),
            exp: 0,
            hp: 0,
            skills: [0; 4],
            name: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemStack {
    pub count: u32,
    pub expire_time: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cloth {
    pub id: u32,
    pub level: u32,
}

/// Companion robot sub-record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonoInfo {
    pub has_nono: bool,
    pub flag: u32,
    pub state: u32,
    pub color: u32,
    pub nick: String,
    pub super_nono: u32,
    pub super_stage: u32,
    pub vip_level: u32,
    pub power: u32,
    pub mate: u32,
    pub iq: u32,
    pub ai: u16,
    pub hp: u32,
    pub max_hp: u32,
    pub energy: u32,
    pub birth: u32,
}

impl Default for NonoInfo {
    fn default() -> Self {
        Self {
            has_nono: true,
            flag: 1,
            state: 0,
            color: 0xFFFFFF,
            nick: "NoNo".to_string(),
            super_nono: 0,
            super_stage: 1,
            vip_level: 0,
            power: 10000,
            mate: 10000,
            iq: 0,
            ai: 0,
            hp: 10000,
            max_hp: 10000,
            energy: 100,
            birth: 0,
        }
    }
}

/// Team affiliation; `id == 0` means no team
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInfo {
    pub id: u32,
    pub privilege: u32,
    pub contribution: u32,
    pub logo_bg: u16,
    pub logo_icon: u16,
    pub logo_color: u16,
    pub text_color: u16,
    pub logo_word: String,
}

/// Quest progress: status byte per task plus free-form counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskState {
    pub status: BTreeMap<u32, u8>,
    pub buffers: BTreeMap<u32, BTreeMap<u32, u32>>,
}

/// One logical player
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: u32,
    pub nick: String,
    pub reg_time: u32,
    pub color: u32,
    pub texture: u32,
    pub energy: u32,
    pub coins: u32,
    pub gold: u32,
    pub fight_badge: u32,
    /// Only moved through `WorldState::update_map` so the map index stays in step
    map_id: u32,
    pub map_type: u32,
    pub pos_x: u32,
    pub pos_y: u32,
    pub time_limit: u32,
    pub login_count: u32,
    /// Catch time of the pet the player fights with, 0 for the first one
    pub current_pet: u32,
    pub clothes: Vec<Cloth>,
    pub pets: Vec<Pet>,
    pub items: BTreeMap<u32, ItemStack>,
    pub nono: NonoInfo,
    pub team: TeamInfo,
    pub tasks: TaskState,
    pub fight: Option<FightState>,
}

impl Session {
    pub fn new(user_id: u32, spawn: Spawn) -> Self {
        Self {
            user_id,
            nick: format!("Seer{}", user_id),
            reg_time: unix_now().saturating_sub(86_400 * 365),
            color: 0x66CCFF,
            texture: 1,
            energy: 100,
            coins: 2000,
            gold: 0,
            fight_badge: 0,
            map_id: spawn.map_id,
            map_type: 0,
            pos_x: spawn.x,
            pos_y: spawn.y,
            time_limit: 86_400,
            login_count: 0,
            current_pet: 0,
            clothes: Vec::new(),
            pets: Vec::new(),
            items: BTreeMap::new(),
            nono: NonoInfo::default(),
            team: TeamInfo::default(),
            tasks: TaskState::default(),
            fight: None,
        }
    }

    pub fn map_id(&self) -> u32 {
        self.map_id
    }

    pub(super) fn set_map_id(&mut self, map_id: u32) {
        self.map_id = map_id;
    }

    /// Add a pet unless one with the same catch time is already owned
    pub fn add_pet(&mut self, pet: Pet) -> bool {
        if self.find_pet(pet.catch_time).is_some() {
            return false;
        }
        self.pets.push(pet);
        true
    }

    pub fn find_pet(&self, catch_time: u32) -> Option<&Pet> {
        self.pets.iter().find(|p| p.catch_time == catch_time)
    }

    pub fn find_pet_mut(&mut self, catch_time: u32) -> Option<&mut Pet> {
        self.pets.iter_mut().find(|p| p.catch_time == catch_time)
    }

    /// The pet sent into battle: the chosen one if still owned, else the first
    pub fn current_pet(&self) -> Option<&Pet> {
        if self.current_pet != 0 {
            if let Some(pet) = self.find_pet(self.current_pet) {
                return Some(pet);
            }
        }
        self.pets.first()
    }

    pub fn add_item(&mut self, item_id: u32, count: u32) {
        let stack = self.items.entry(item_id).or_insert(ItemStack { count: 0, expire_time: 0 });
        stack.count = stack.count.saturating_add(count);
    }

    pub fn is_fighting(&self) -> bool {
        self.fight.is_some()
    }

    /// Drop any active battle
    pub fn end_fight(&mut self) -> Option<FightState> {
        self.fight.take()
    }
}

pub fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_defaults() {
        let session = Session::new(1001, Spawn::default());
        assert_eq!(session.nick, "Seer1001");
        assert_eq!(session.map_id(), 1);
        assert_eq!((session.pos_x, session.pos_y), (300, 270));
        assert_eq!(session.coins, 2000);
        assert_eq!(session.energy, 100);
        assert_eq!(session.color, 0x66CCFF);
        assert!(session.nono.has_nono);
        assert_eq!(session.nono.nick, "NoNo");
        assert!(!session.is_fighting());
        assert!(session.reg_time < unix_now());
    }

    #[test]
    fn test_pet_dv_is_clamped() {
        assert_eq!(Pet::new(1, 1, 5, 99).dv, MAX_DV);
        assert_eq!(Pet::new(1, 1, 5, 12).dv, 12);
        assert_eq!(Pet::new(1, 1, 0, 0).level, 1);
    }

    #[test]
    fn test_catch_time_is_unique_per_owner() {
        let mut session = Session::new(1, Spawn::default());
        assert!(session.add_pet(Pet::new(7, 100, 5, 31)));
        assert!(!session.add_pet(Pet::new(9, 100, 8, 10)));
        assert!(session.add_pet(Pet::new(9, 101, 8, 10)));
        assert_eq!(session.pets.len(), 2);
        assert_eq!(session.find_pet(100).map(|p| p.species_id), Some(7));
    }

    #[test]
    fn test_current_pet_falls_back_to_first() {
        let mut session = Session::new(1, Spawn::default());
        assert!(session.current_pet().is_none());
        session.add_pet(Pet::new(7, 100, 5, 31));
        session.add_pet(Pet::new(9, 200, 5, 31));
        assert_eq!(session.current_pet().map(|p| p.catch_time), Some(100));

        session.current_pet = 200;
        assert_eq!(session.current_pet().map(|p| p.catch_time), Some(200));

        session.current_pet = 999;
        assert_eq!(session.current_pet().map(|p| p.catch_time), Some(100));
    }

    #[test]
    fn test_items_stack() {
        let mut session = Session::new(1, Spawn::default());
        session.add_item(300001, 2);
        session.add_item(300001, 3);
        assert_eq!(session.items[&300001].count, 5);
    }
}
