//! Damage calculation for a single attack.

use rand::Rng;

use super::fight::Combatant;
use super::types::TypeChart;
use crate::gamedata::{Skill, SkillCategory};

/// Critical chance is `crit_rate` in this many
const CRIT_ODDS: u32 = 16;
const CRIT_MULTIPLIER: f64 = 1.5;
const SAME_TYPE_BONUS: f64 = 1.5;

/// Result of one damage roll
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub damage: u32,
    pub critical: bool,
    pub effectiveness: f64,
}

/// Accuracy check; 100 or more (or unset) never misses.
pub fn rolls_hit<R: Rng + ?Sized>(skill: &Skill, rng: &mut R) -> bool {
    if skill.accuracy == 0 || skill.accuracy >= 100 {
        return true;
    }
    rng.gen_range(0..100) < skill.accuracy
}

/// Roll critical and spread, then compute the damage.
pub fn roll_damage<R: Rng + ?Sized>(
    attacker: &Combatant,
    defender: &Combatant,
    skill: &Skill,
    chart: &TypeChart,
    rng: &mut R,
) -> Hit {
    let critical = rng.gen_range(1..=CRIT_ODDS) <= skill.crit_rate.max(1);
    let spread = f64::from(rng.gen_range(85u32..=100)) / 100.0;
    Hit {
        damage: compute_damage(attacker, defender, skill, chart, critical, spread),
        critical,
        effectiveness: chart.multiplier(skill.element, defender.element),
    }
}

/// Deterministic part of the damage formula.
///
/// `((0.4 * level + 2) * power * atk / def) / 50 + 2`, scaled by type
/// effectiveness, same-type bonus, critical and `spread`. A damaging skill
/// always deals at least 1 unless the defender is immune.
pub fn compute_damage(
    attacker: &Combatant,
    defender: &Combatant,
    skill: &Skill,
    chart: &TypeChart,
    critical: bool,
    spread: f64,
) -> u32 {
    if skill.power == 0 || skill.category == SkillCategory::Status {
        return 0;
    }

    let (atk, def) = match skill.category {
        SkillCategory::Special => (attacker.stats.special_attack, defender.stats.special_defence),
        _ => (attacker.stats.attack, defender.stats.defence),
    };
    let atk = f64::from(atk.max(1));
    let def = f64::from(def.max(1));
    let level = f64::from(attacker.level.max(1));

    let base = (level * 0.4 + 2.0) * f64::from(skill.power) * atk / def / 50.0 + 2.0;
    let effectiveness = chart.multiplier(skill.element, defender.element);
    if effectiveness == 0.0 {
        return 0;
    }
    let stab = if skill.element > 0 && skill.element == attacker.element {
        SAME_TYPE_BONUS
    } else {
        1.0
    };
    let crit = if critical { CRIT_MULTIPLIER } else { 1.0 };

    let total = base * effectiveness * stab * crit * spread;
    (total.min(f64::from(u32::MAX)) as u32).max(1)
}
