//! Creature battle engine: stats, experience, type chart and turn resolution.

mod damage;
mod fight;
mod stats;
mod types;

pub use damage::{compute_damage, roll_damage, Hit};
pub use fight::{
    exp_reward, resolve_exchange, Attack, BattleError, BattlePhase, Combatant, ExchangeOutcome, FightState,
    Reward, Side, DEFAULT_BASE_EXP, ENEMY_DV,
};
pub use stats::{
    derive_stats, exp_progress, exp_threshold, normalize_skills, skills_for_level, stats_for, BaseStats,
    ExpProgress, GrowthClass, Stats, FALLBACK_SKILL_ID,
};
pub use types::{element_id, TypeChart, ELEMENT_NAMES, MAX_ELEMENT};
