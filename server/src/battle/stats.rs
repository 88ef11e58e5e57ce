//! Stat derivation, experience curves and skill slots.

use crate::gamedata::Species;
use crate::world::MAX_DV;

/// Skill shown when a species is unknown
pub const FALLBACK_SKILL_ID: u32 = 10001;

/// Species base values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BaseStats {
    pub hp: u32,
    pub attack: u32,
    pub defence: u32,
    pub special_attack: u32,
    pub special_defence: u32,
    pub speed: u32,
}

/// Derived combat stats of one creature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub hp: u32,
    pub max_hp: u32,
    pub attack: u32,
    pub defence: u32,
    pub special_attack: u32,
    pub special_defence: u32,
    pub speed: u32,
}

impl Stats {
    /// Stats used when the species is missing from the catalog
    pub const FALLBACK: Stats = Stats {
        hp: 20,
        max_hp: 20,
        attack: 10,
        defence: 10,
        special_attack: 10,
        special_defence: 10,
        speed: 10,
    };
}

/// Derive stats from base values, level and DV.
///
/// Non-HP stats are `(2*base + dv) * level / 100 + 5`; HP adds `level + 10`
/// instead of 5. Level 0 counts as 1 and DV is capped at 31.
pub fn derive_stats(base: &BaseStats, level: u32, dv: u32) -> Stats {
    let level = u64::from(level.max(1));
    let dv = u64::from(dv.min(MAX_DV));
    let scaled = |b: u32| (2 * u64::from(b) + dv) * level / 100;
    let clamp = |v: u64| v.min(u64::from(u32::MAX)) as u32;

    let hp = clamp(scaled(base.hp) + level + 10);
    Stats {
        hp,
        max_hp: hp,
        attack: clamp(scaled(base.attack) + 5),
        defence: clamp(scaled(base.defence) + 5),
        special_attack: clamp(scaled(base.special_attack) + 5),
        special_defence: clamp(scaled(base.special_defence) + 5),
        speed: clamp(scaled(base.speed) + 5),
    }
}

/// Stats for a species that may be missing from the catalog
pub fn stats_for(species: Option<&Species>, level: u32, dv: u32) -> Stats {
    match species {
        Some(species) => derive_stats(&species.base, level, dv),
        None => Stats::FALLBACK,
    }
}

/// Experience curve class of a species
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrowthClass {
    /// 0.8 x level^3
    Fast,
    /// level^3
    #[default]
    Medium,
    /// 1.2 x level^3
    Slow,
    /// 1.5 x level^3
    VerySlow,
}

impl GrowthClass {
    /// Map the catalog's numeric class; unknown values use the medium curve
    pub fn from_id(id: u32) -> Self {
        match id {
            0 => GrowthClass::Fast,
            1 => GrowthClass::Medium,
            2 => GrowthClass::Slow,
            3 => GrowthClass::VerySlow,
            _ => GrowthClass::Medium,
        }
    }

    /// Multiplier as numerator / denominator
    fn ratio(self) -> (u64, u64) {
        match self {
            GrowthClass::Fast => (4, 5),
            GrowthClass::Medium => (1, 1),
            GrowthClass::Slow => (6, 5),
            GrowthClass::VerySlow => (3, 2),
        }
    }
}

/// Experience needed to finish `level`
pub fn exp_threshold(growth: GrowthClass, level: u32) -> u32 {
    let level = u64::from(level);
    let (num, den) = growth.ratio();
    let required = level * level * level * num / den;
    required.min(u64::from(u32::MAX)) as u32
}

/// Experience figures reported to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpProgress {
    pub exp: u32,
    /// Experience gathered inside the current level
    pub level_exp: u32,
    pub next_level_exp: u32,
}

pub fn exp_progress(species: Option<&Species>, level: u32, exp: u32) -> ExpProgress {
    let next_level_exp = match species {
        Some(species) => exp_threshold(species.growth, level),
        None => 100,
    };
    ExpProgress {
        exp,
        level_exp: exp,
        next_level_exp,
    }
}

/// The four skill slots a creature of `level` carries.
///
/// Learnable skills with `learn_level <= level` qualify; when more than four
/// do, the four learned most recently are kept. Slots are in learn order,
/// empty slots are 0 and no id repeats.
pub fn skills_for_level(species: Option<&Species>, level: u32) -> [u32; 4] {
    let Some(species) = species else {
        return [FALLBACK_SKILL_ID, 0, 0, 0];
    };

    let mut learned: Vec<_> = species
        .learnable
        .iter()
        .filter(|m| m.skill_id > 0 && m.level <= level)
        .collect();
    learned.sort_by_key(|m| m.level);

    let mut picked: Vec<u32> = Vec::with_capacity(4);
    for m in learned.iter().rev() {
        if picked.len() == 4 {
            break;
        }
        if !picked.contains(&m.skill_id) {
            picked.push(m.skill_id);
        }
    }
    picked.reverse();

    let mut slots = [0u32; 4];
    slots[..picked.len()].copy_from_slice(&picked);
    slots
}

/// Fill missing slots of a stored skill list from the species' learnset
pub fn normalize_skills(stored: [u32; 4], species: Option<&Species>, level: u32) -> [u32; 4] {
    if stored.iter().all(|&s| s == 0) {
        skills_for_level(species, level)
    } else {
        stored
    }
}
