//! One-on-one battle state and exchange resolution.

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use super::damage::{roll_damage, rolls_hit};
use super::stats::{normalize_skills, skills_for_level, stats_for, Stats};
use crate::gamedata::GameData;

/// DV given to wild and boss opponents
pub const ENEMY_DV: u32 = 15;

/// Base experience for species without one in the catalog
pub const DEFAULT_BASE_EXP: u32 = 50;

/// Status counters carried per combatant, indexed by status id
pub const STATUS_SLOTS: usize = 20;

/// Status id of fatigue: the next turn is skipped
pub const STATUS_FATIGUE: usize = 7;

/// Skill side effect that tires the attacker out
pub const FATIGUE_EFFECT: u32 = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BattleError {
    #[error("battle already concluded")]
    Concluded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Player,
    Enemy,
}

/// One side of a battle
#[derive(Debug, Clone, PartialEq)]
pub struct Combatant {
    pub species_id: u32,
    pub catch_time: u32,
    pub level: u32,
    pub dv: u32,
    pub element: u32,
    pub stats: Stats,
    pub hp: u32,
    pub skills: [u32; 4],
    /// Remaining uses per skill slot
    pub pp: [u32; 4],
    /// Turns left on each status
    pub status: [u8; STATUS_SLOTS],
}

impl Combatant {
    /// Build at full HP with the learnset for its level
    pub fn new(data: &GameData, species_id: u32, catch_time: u32, level: u32, dv: u32) -> Self {
        let species = data.species(species_id);
        let level = level.max(1);
        let stats = stats_for(species, level, dv);
        let mut combatant = Self {
            species_id,
            catch_time,
            level,
            dv,
            element: species.map(|s| s.element).unwrap_or(0),
            stats,
            hp: stats.max_hp,
            skills: [0; 4],
            pp: [0; 4],
            status: [0; STATUS_SLOTS],
        };
        combatant.set_skills(data, skills_for_level(species, level));
        combatant
    }

    /// Use a stored skill list; an empty one keeps the learnset
    pub fn with_skills(mut self, data: &GameData, stored: [u32; 4]) -> Self {
        let skills = normalize_skills(stored, data.species(self.species_id), self.level);
        self.set_skills(data, skills);
        self
    }

    /// Start with `hp` left; 0 means full
    pub fn with_hp(mut self, hp: u32) -> Self {
        if hp > 0 {
            self.hp = hp.min(self.stats.max_hp);
        }
        self
    }

    /// Override maximum HP, as boss configuration does
    pub fn with_max_hp(mut self, max_hp: u32) -> Self {
        if max_hp > 0 {
            self.stats.max_hp = max_hp;
            self.stats.hp = max_hp;
            self.hp = max_hp;
        }
        self
    }

    pub fn is_fainted(&self) -> bool {
        self.hp == 0
    }

    /// PP a skill id has left, if this combatant knows it
    pub fn pp_of(&self, skill_id: u32) -> Option<u32> {
        self.skills
            .iter()
            .position(|&s| s == skill_id && s > 0)
            .map(|slot| self.pp[slot])
    }

    /// Spend a turn of fatigue if one is pending
    fn can_act(&mut self) -> bool {
        let fatigue = &mut self.status[STATUS_FATIGUE];
        if *fatigue > 0 {
            *fatigue -= 1;
            return false;
        }
        true
    }

    fn set_skills(&mut self, data: &GameData, skills: [u32; 4]) {
        self.skills = skills;
        for (slot, &skill_id) in skills.iter().enumerate() {
            self.pp[slot] = if skill_id > 0 { data.skill_or_fallback(skill_id).max_pp } else { 0 };
        }
    }

    fn usable_slots(&self) -> Vec<usize> {
        (0..4).filter(|&i| self.skills[i] > 0 && self.pp[i] > 0).collect()
    }

    /// The requested skill if usable, else the first usable one
    fn choose_slot(&self, requested: u32) -> Option<usize> {
        let usable = self.usable_slots();
        usable
            .iter()
            .copied()
            .find(|&i| self.skills[i] == requested)
            .or_else(|| usable.first().copied())
    }

    fn random_slot<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        self.usable_slots().choose(rng).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattlePhase {
    /// Battle set up, exchanges may be resolved
    Engaged,
    /// Terminal; `winner` is None after an escape
    Concluded { winner: Option<Side> },
}

/// Item granted when the player wins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reward {
    pub item_id: u32,
    pub count: u32,
}

/// Active battle attached to a session
#[derive(Debug, Clone, PartialEq)]
pub struct FightState {
    pub player: Combatant,
    pub enemy: Combatant,
    pub turn: u32,
    /// Client confirmed it finished loading the battle scene
    pub ready: bool,
    pub phase: BattlePhase,
    pub reward: Option<Reward>,
}

impl FightState {
    pub fn new(player: Combatant, enemy: Combatant) -> Self {
        Self {
            player,
            enemy,
            turn: 0,
            ready: false,
            phase: BattlePhase::Engaged,
            reward: None,
        }
    }

    pub fn with_reward(mut self, reward: Option<Reward>) -> Self {
        self.reward = reward;
        self
    }

    pub fn is_concluded(&self) -> bool {
        matches!(self.phase, BattlePhase::Concluded { .. })
    }

    pub fn winner(&self) -> Option<Side> {
        match self.phase {
            BattlePhase::Concluded { winner } => winner,
            BattlePhase::Engaged => None,
        }
    }

    /// Player leaves; nobody wins
    pub fn escape(&mut self) {
        self.phase = BattlePhase::Concluded { winner: None };
    }
}

/// What one side did during an exchange
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attack {
    pub side: Side,
    /// 0 when no usable skill was left
    pub skill_id: u32,
    pub damage: u32,
    pub critical: bool,
    /// The skill missed or the attacker was too tired to act
    pub missed: bool,
    /// Attacker's HP after the exchange step
    pub attacker_hp: u32,
    pub attacker_max_hp: u32,
    pub attacker_element: u32,
    /// PP left on the used skill
    pub pp_left: u32,
    pub status: [u8; STATUS_SLOTS],
}

impl Attack {
    /// A turn in which `attacker` did nothing
    pub fn idle(side: Side, attacker: &Combatant) -> Self {
        Self {
            side,
            skill_id: 0,
            damage: 0,
            critical: false,
            missed: false,
            attacker_hp: attacker.hp,
            attacker_max_hp: attacker.stats.max_hp,
            attacker_element: attacker.element,
            pp_left: 0,
            status: attacker.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeOutcome {
    pub player: Attack,
    /// None when the enemy was knocked out before acting
    pub enemy: Option<Attack>,
    pub winner: Option<Side>,
}

/// Resolve one exchange: the player attacks, then the enemy retaliates if it
/// is still standing.
///
/// HP never goes below 0. Both sides cannot faint in the same exchange, so a
/// concluded exchange always has a winner.
pub fn resolve_exchange<R: Rng + ?Sized>(
    fight: &mut FightState,
    data: &GameData,
    requested_skill: u32,
    rng: &mut R,
) -> Result<ExchangeOutcome, BattleError> {
    if fight.is_concluded() {
        return Err(BattleError::Concluded);
    }
    fight.turn += 1;

    let slot = fight.player.choose_slot(requested_skill);
    let player = strike(&mut fight.player, &mut fight.enemy, Side::Player, slot, data, rng);

    let enemy = if fight.enemy.is_fainted() {
        None
    } else {
        let slot = fight.enemy.random_slot(rng);
        Some(strike(&mut fight.enemy, &mut fight.player, Side::Enemy, slot, data, rng))
    };

    let winner = if fight.enemy.is_fainted() {
        Some(Side::Player)
    } else if fight.player.is_fainted() {
        Some(Side::Enemy)
    } else {
        None
    };
    if winner.is_some() {
        fight.phase = BattlePhase::Concluded { winner };
    }

    Ok(ExchangeOutcome { player, enemy, winner })
}

fn strike<R: Rng + ?Sized>(
    attacker: &mut Combatant,
    defender: &mut Combatant,
    side: Side,
    slot: Option<usize>,
    data: &GameData,
    rng: &mut R,
) -> Attack {
    if !attacker.can_act() {
        return Attack {
            missed: true,
            ..Attack::idle(side, attacker)
        };
    }
    let Some(slot) = slot else {
        return Attack::idle(side, attacker);
    };

    let skill_id = attacker.skills[slot];
    attacker.pp[slot] = attacker.pp[slot].saturating_sub(1);
    let pp_left = attacker.pp[slot];
    let skill = data.skill_or_fallback(skill_id);

    if !rolls_hit(&skill, rng) {
        return Attack {
            skill_id,
            pp_left,
            missed: true,
            ..Attack::idle(side, attacker)
        };
    }

    let hit = roll_damage(attacker, defender, &skill, &data.types, rng);
    defender.hp = defender.hp.saturating_sub(hit.damage);
    if skill.side_effect == FATIGUE_EFFECT {
        let fatigue = &mut attacker.status[STATUS_FATIGUE];
        *fatigue = (*fatigue).max(1);
    }

    Attack {
        skill_id,
        damage: hit.damage,
        critical: hit.critical,
        pp_left,
        ..Attack::idle(side, attacker)
    }
}

/// Experience for beating a wild opponent.
///
/// `max(1, floor(floor(base_exp * level / 7) * 0.8))`
pub fn exp_reward(data: &GameData, enemy_species: u32, enemy_level: u32) -> u32 {
    let base_exp = data
        .species(enemy_species)
        .map(|s| s.base_exp)
        .filter(|&e| e > 0)
        .unwrap_or(DEFAULT_BASE_EXP);
    let level = u64::from(enemy_level.max(1));
    let raw = u64::from(base_exp) * level / 7;
    let wild = raw * 4 / 5;
    wild.clamp(1, u64::from(u32::MAX)) as u32
}
