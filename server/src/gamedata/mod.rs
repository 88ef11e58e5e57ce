//! Static game data: species, skills, type chart, boss and ogre tables.
//!
//! Built once at startup and shared read-only behind an `Arc`.

mod catalog;
mod tables;

use std::collections::HashMap;
use std::path::Path;

use log::{info, warn};
use thiserror::Error;

use crate::battle::{BaseStats, GrowthClass, TypeChart};
use crate::config::DataConfig;

pub use catalog::{parse_skills, parse_species};
pub use tables::{builtin_bosses, builtin_ogres, parse_bosses, parse_ogres, BossConfig, OgreLayout, OgreSlot, OGRE_SLOTS};

/// Boss fought when the challenge names none
pub const NOVICE_BOSS_ID: u32 = 13;

#[derive(Debug, Error)]
pub enum GameDataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearnableSkill {
    pub skill_id: u32,
    pub level: u32,
}

/// Immutable species record
#[derive(Debug, Clone, PartialEq)]
pub struct Species {
    pub id: u32,
    pub name: String,
    pub base: BaseStats,
    pub growth: GrowthClass,
    pub element: u32,
    /// Experience yield, 0 when the catalog has none
    pub base_exp: u32,
    pub learnable: Vec<LearnableSkill>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkillCategory {
    #[default]
    Physical,
    Special,
    Status,
}

impl SkillCategory {
    pub fn from_id(id: u32) -> Self {
        match id {
            2 => SkillCategory::Special,
            4 => SkillCategory::Status,
            _ => SkillCategory::Physical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Skill {
    pub id: u32,
    pub power: u32,
    pub max_pp: u32,
    pub element: u32,
    pub accuracy: u32,
    pub category: SkillCategory,
    pub side_effect: u32,
    pub crit_rate: u32,
}

impl Skill {
    /// Plain physical attack used for ids missing from the catalog
    pub fn fallback(id: u32) -> Self {
        Self {
            id,
            power: 40,
            max_pp: 20,
            element: 0,
            accuracy: 100,
            category: SkillCategory::Physical,
            side_effect: 0,
            crit_rate: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GameData {
    species: HashMap<u32, Species>,
    skills: HashMap<u32, Skill>,
    pub types: TypeChart,
    bosses: HashMap<u32, BossConfig>,
    ogres: HashMap<u32, OgreLayout>,
}

impl Default for GameData {
    fn default() -> Self {
        Self {
            species: HashMap::new(),
            skills: HashMap::new(),
            types: TypeChart::identity(),
            bosses: builtin_bosses(),
            ogres: builtin_ogres(),
        }
    }
}

impl GameData {
    /// Load every table under the data root.
    ///
    /// A missing or broken file is logged and leaves that table at its
    /// built-in contents; startup never fails here.
    pub fn load(config: &DataConfig) -> Self {
        let mut data = Self::default();

        match read(&config.skills_path()).and_then(|raw| Ok(parse_skills(&raw)?)) {
            Ok(skills) => data.skills = skills,
            Err(e) => warn!("Skill catalog not loaded: {}", e),
        }
        match read(&config.species_path()).and_then(|raw| Ok(parse_species(&raw)?)) {
            Ok(species) => data.species = species,
            Err(e) => warn!("Species catalog not loaded: {}", e),
        }
        data.types = TypeChart::load(&config.types_path());

        let bosses = read(&config.bosses_path())
            .and_then(|raw| Ok(parse_bosses(&raw, |name| data.species_id_by_name(name))?));
        match bosses {
            Ok(bosses) if !bosses.is_empty() => data.bosses = bosses,
            Ok(_) => {}
            Err(e) => info!("Using built-in boss table: {}", e),
        }
        match read(&config.ogres_path()).and_then(|raw| Ok(parse_ogres(&raw)?)) {
            Ok(ogres) => data.ogres.extend(ogres),
            Err(e) => info!("Using built-in ogre table: {}", e),
        }

        info!(
            "Game data ready: {} species, {} skills, {} bosses, {} ogre maps",
            data.species.len(),
            data.skills.len(),
            data.bosses.len(),
            data.ogres.len()
        );
        data
    }

    pub fn species(&self, id: u32) -> Option<&Species> {
        self.species.get(&id)
    }

    pub fn species_id_by_name(&self, name: &str) -> Option<u32> {
        self.species.values().find(|s| s.name == name).map(|s| s.id)
    }

    pub fn skill(&self, id: u32) -> Option<&Skill> {
        self.skills.get(&id)
    }

    pub fn skill_or_fallback(&self, id: u32) -> Skill {
        self.skills.get(&id).copied().unwrap_or_else(|| Skill::fallback(id))
    }

    pub fn boss(&self, species_id: u32) -> Option<&BossConfig> {
        self.bosses.get(&species_id)
    }

    /// Ogre layout of a map; empty slots for maps without one
    pub fn ogres(&self, map_id: u32) -> OgreLayout {
        self.ogres.get(&map_id).copied().unwrap_or_default()
    }

    pub fn insert_species(&mut self, species: Species) {
        self.species.insert(species.id, species);
    }

    pub fn insert_skill(&mut self, skill: Skill) {
        self.skills.insert(skill.id, skill);
    }

    pub fn insert_boss(&mut self, boss: BossConfig) {
        self.bosses.insert(boss.species_id, boss);
    }

    pub fn species_count(&self) -> usize {
        self.species.len()
    }

    pub fn skill_count(&self) -> usize {
        self.skills.len()
    }
}

fn read(path: &Path) -> Result<String, GameDataError> {
    std::fs::read_to_string(path).map_err(|source| GameDataError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("seer-gamedata-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_missing_files_leave_builtins() {
        let config = DataConfig {
            root: PathBuf::from("/nonexistent/seer-data"),
            ..DataConfig::default()
        };
        let data = GameData::load(&config);
        assert_eq!(data.species_count(), 0);
        assert_eq!(data.types, TypeChart::identity());
        assert!(data.boss(NOVICE_BOSS_ID).is_some());
        assert_eq!(data.ogres(8)[0].species_id, 10);
    }

    #[test]
    fn test_load_from_directory() {
        let root = temp_root("load");
        std::fs::write(
            root.join("spt.xml"),
            r#"<Monsters><Monster ID="13" DefName="Mushroom" Hp="60" Type="1"/></Monsters>"#,
        )
        .unwrap();
        std::fs::write(root.join("skills.xml"), r#"<Moves><Move ID="10001" Power="35"/></Moves>"#).unwrap();
        std::fs::write(root.join("elements.json"), r#"{"FIRE": {"GRASS": 2}}"#).unwrap();
        std::fs::write(root.join("spt-boss.json"), r#"{"bosses": [{"name": "Mushroom", "level": 12}]}"#).unwrap();

        let config = DataConfig {
            root: root.clone(),
            ..DataConfig::default()
        };
        let data = GameData::load(&config);
        assert_eq!(data.species(13).map(|s| s.name.as_str()), Some("Mushroom"));
        assert_eq!(data.skill(10001).map(|s| s.power), Some(35));
        assert_eq!(data.types.multiplier(3, 1), 2.0);
        assert_eq!(data.boss(13).map(|b| b.level), Some(12));

        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn test_unknown_skill_uses_fallback() {
        let data = GameData::default();
        let skill = data.skill_or_fallback(555);
        assert_eq!(skill.id, 555);
        assert_eq!(skill.max_pp, 20);
        assert!(skill.power > 0);
    }
}
