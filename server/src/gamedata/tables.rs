//! Boss and map-ogre tables, built in with optional JSON overrides.

use std::collections::HashMap;

use serde::Deserialize;

/// Ogre slots the client shows per map
pub const OGRE_SLOTS: usize = 9;

/// Boss fought through the challenge command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BossConfig {
    pub species_id: u32,
    pub level: u32,
    /// 0 keeps the derived HP
    pub max_hp: u32,
    pub reward_item_id: u32,
    pub reward_count: u32,
}

/// Wild creature shown in one map slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OgreSlot {
    pub species_id: u32,
    pub shiny: u32,
}

pub type OgreLayout = [OgreSlot; OGRE_SLOTS];

pub fn builtin_bosses() -> HashMap<u32, BossConfig> {
    let novice = BossConfig {
        species_id: super::NOVICE_BOSS_ID,
        level: 10,
        max_hp: 100,
        reward_item_id: 0,
        reward_count: 0,
    };
    HashMap::from([(novice.species_id, novice)])
}

pub fn builtin_ogres() -> HashMap<u32, OgreLayout> {
    let pair = |species_id| OgreSlot { species_id, shiny: 0 };
    let mut plains = OgreLayout::default();
    plains[0] = pair(10);
    plains[1] = pair(58);
    let mut training = OgreLayout::default();
    for (slot, species_id) in [1, 4, 7, 10].into_iter().enumerate() {
        training[slot] = pair(species_id);
    }
    HashMap::from([(8, plains), (515, plains), (301, training)])
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BossEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    pet_id: u32,
    #[serde(default)]
    level: u32,
    #[serde(default)]
    max_hp: u32,
    #[serde(default)]
    reward_item_id: u32,
    #[serde(default)]
    reward_count: u32,
}

#[derive(Debug, Deserialize)]
struct BossFile {
    #[serde(default)]
    bosses: Vec<BossEntry>,
}

/// Parse a boss file. `species_by_name` resolves entries given only by name.
pub fn parse_bosses(
    raw: &str,
    species_by_name: impl Fn(&str) -> Option<u32>,
) -> Result<HashMap<u32, BossConfig>, serde_json::Error> {
    let file: BossFile = serde_json::from_str(raw)?;
    let mut out = HashMap::new();
    for entry in file.bosses {
        let species_id = match entry.pet_id {
            0 if !entry.name.is_empty() => species_by_name(&entry.name).unwrap_or(0),
            id => id,
        };
        if species_id == 0 {
            continue;
        }
        let reward_count = match (entry.reward_item_id, entry.reward_count) {
            (0, _) => 0,
            (_, 0) => 1,
            (_, count) => count,
        };
        out.insert(
            species_id,
            BossConfig {
                species_id,
                level: entry.level.max(1),
                max_hp: entry.max_hp,
                reward_item_id: entry.reward_item_id,
                reward_count,
            },
        );
    }
    Ok(out)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OgreEntry {
    slot: u32,
    pet_id: u32,
    #[serde(default)]
    shiny: u32,
}

#[derive(Debug, Deserialize)]
struct OgreMap {
    #[serde(default)]
    ogres: Vec<OgreEntry>,
}

#[derive(Debug, Deserialize)]
struct OgreFile {
    #[serde(default)]
    maps: HashMap<String, OgreMap>,
}

/// Parse a map-ogre file.
///
/// Entries with a slot in 0..9 keep it; larger slot numbers fill the free
/// slots in ascending order.
pub fn parse_ogres(raw: &str) -> Result<HashMap<u32, OgreLayout>, serde_json::Error> {
    let file: OgreFile = serde_json::from_str(raw)?;
    let mut out = HashMap::new();
    for (key, map) in file.maps {
        let Ok(map_id) = key.trim().parse::<u32>() else {
            continue;
        };
        if map_id == 0 {
            continue;
        }

        let mut layout = OgreLayout::default();
        let mut taken = [false; OGRE_SLOTS];
        let mut extras = Vec::new();
        for ogre in map.ogres {
            let slot = ogre.slot as usize;
            let entry = OgreSlot {
                species_id: ogre.pet_id,
                shiny: ogre.shiny,
            };
            if slot < OGRE_SLOTS {
                layout[slot] = entry;
                taken[slot] = true;
            } else {
                extras.push((ogre.slot, entry));
            }
        }
        extras.sort_by_key(|(slot, _)| *slot);
        let mut free = (0..OGRE_SLOTS).filter(|i| !taken[*i]);
        for (_, entry) in extras {
            match free.next() {
                Some(slot) => layout[slot] = entry,
                None => break,
            }
        }
        out.insert(map_id, layout);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables() {
        let bosses = builtin_bosses();
        assert_eq!(bosses[&13].level, 10);
        assert_eq!(bosses[&13].max_hp, 100);

        let ogres = builtin_ogres();
        assert_eq!(ogres[&8][1].species_id, 58);
        assert_eq!(ogres[&301][3].species_id, 10);
        assert_eq!(ogres[&301][4], OgreSlot::default());
    }

    #[test]
    fn test_boss_file_resolves_names() {
        let raw = r#"{ "bosses": [
            { "petId": 47, "level": 25, "maxHp": 200, "rewardItemId": 400051 },
            { "name": "Leo", "level": 35 },
            { "name": "Unknown", "level": 50 }
        ] }"#;
        let bosses = parse_bosses(raw, |name| (name == "Leo").then_some(88)).unwrap();
        assert_eq!(bosses.len(), 2);
        assert_eq!(bosses[&47].reward_count, 1);
        assert_eq!(bosses[&88].level, 35);
        assert_eq!(bosses[&88].reward_count, 0);
    }

    #[test]
    fn test_ogre_file_fills_free_slots() {
        let raw = r#"{ "maps": {
            "10": { "ogres": [
                { "slot": 1, "petId": 5 },
                { "slot": 40, "petId": 9, "shiny": 1 },
                { "slot": 20, "petId": 8 }
            ] },
            "bad": { "ogres": [] }
        } }"#;
        let ogres = parse_ogres(raw).unwrap();
        assert_eq!(ogres.len(), 1);
        let layout = ogres[&10];
        assert_eq!(layout[0].species_id, 8);
        assert_eq!(layout[1].species_id, 5);
        assert_eq!(layout[2], OgreSlot { species_id: 9, shiny: 1 });
    }
}
