//! Pet roster commands and the pet bodies shared with battles.

use bytes::Bytes;

use seer_shared::{BodyReader, BodyWriter};

use super::Shared;
use crate::battle::{exp_progress, normalize_skills, stats_for};
use crate::gamedata::GameData;
use crate::network::Context;
use crate::world::{Pet, MAX_DV};

/// Species shown when a player owns no pet yet
pub(super) const STARTER_SPECIES: u32 = 7;
pub(super) const STARTER_LEVEL: u32 = 5;

/// Map id reported as where a pet was caught
const DEFAULT_CATCH_MAP: u32 = 301;

/// Catch time synthesized for a pet the player does not actually own
pub(super) fn placeholder_catch_time(species_id: u32) -> u32 {
    0x6968_6700 + species_id
}

pub(super) fn starter_pet() -> Pet {
    Pet::new(
        STARTER_SPECIES,
        placeholder_catch_time(STARTER_SPECIES),
        STARTER_LEVEL,
        MAX_DV,
    )
}

/// Full pet description used by the roster, login and battle start
pub(super) fn full_pet_info(data: &GameData, pet: &Pet) -> Bytes {
    let species = data.species(pet.species_id);
    let stats = stats_for(species, pet.level, pet.dv);
    let exp = exp_progress(species, pet.level, pet.exp);
    let skills = normalize_skills(pet.skills, species, pet.level);
    let hp = if pet.hp == 0 { stats.max_hp } else { pet.hp.min(stats.max_hp) };

    let mut body = BodyWriter::with_capacity(160);
    body.put_u32(pet.species_id)
        .put_fixed_str(&pet.name, 16)
        .put_u32(pet.dv)
        .put_u32(0) // nature
        .put_u32(pet.level)
        .put_u32(exp.exp)
        .put_u32(exp.level_exp)
        .put_u32(exp.next_level_exp)
        .put_u32(hp)
        .put_u32(stats.max_hp)
        .put_u32(stats.attack)
        .put_u32(stats.defence)
        .put_u32(stats.special_attack)
        .put_u32(stats.special_defence)
        .put_u32(stats.speed)
        .put_zeros(6 * 4); // effort values

    put_skill_slots(&mut body, data, &skills);

    body.put_u32(pet.catch_time)
        .put_u32(DEFAULT_CATCH_MAP)
        .put_u32(0) // catch rect
        .put_u32(pet.level)
        .put_u16(0)
        .put_u32(0);
    body.finish()
}

/// Learned-skill count followed by four (id, pp) pairs
pub(super) fn put_skill_slots(body: &mut BodyWriter, data: &GameData, skills: &[u32; 4]) {
    body.put_u32(skills.iter().filter(|&&id| id > 0).count() as u32);
    for &id in skills {
        let pp = if id > 0 { data.skill_or_fallback(id).max_pp } else { 0 };
        body.put_u32(id).put_u32(pp);
    }
}

/// Stat refresh pushed after a battle changes a pet
pub(super) fn update_prop_body(data: &GameData, pet: &Pet) -> Bytes {
    let species = data.species(pet.species_id);
    let stats = stats_for(species, pet.level, pet.dv);
    let exp = exp_progress(species, pet.level, pet.exp);
    let hp = if pet.hp == 0 { stats.max_hp } else { pet.hp.min(stats.max_hp) };

    let mut body = BodyWriter::with_capacity(80);
    body.put_u32(pet.catch_time)
        .put_u32(pet.species_id)
        .put_u32(pet.level)
        .put_u32(exp.exp)
        .put_u32(exp.level_exp)
        .put_u32(exp.next_level_exp)
        .put_u32(hp)
        .put_u32(stats.max_hp)
        .put_u32(stats.attack)
        .put_u32(stats.defence)
        .put_u32(stats.special_attack)
        .put_u32(stats.special_defence)
        .put_u32(stats.speed)
        .put_zeros(7 * 4);
    body.finish()
}

/// Describe one pet by catch time, falling back to the current or starter pet.
pub async fn get_pet_info(game: Shared, ctx: Context) {
    let catch_time = BodyReader::new(&ctx.body).read_u32();
    let pet = game.world.with_session(ctx.user_id, |session| {
        let owned = if catch_time != 0 {
            session.find_pet(catch_time)
        } else {
            session.current_pet()
        };
        owned.cloned()
    });

    let pet = pet.unwrap_or_else(|| {
        let mut starter = starter_pet();
        if catch_time != 0 {
            starter.catch_time = catch_time;
        }
        starter
    });
    ctx.reply(&full_pet_info(&game.data, &pet)).await;
}

pub async fn get_pet_list(game: Shared, ctx: Context) {
    let pets = game.world.with_session(ctx.user_id, |session| session.pets.clone());
    let mut body = BodyWriter::new();
    body.put_u32(pets.len() as u32);
    for pet in &pets {
        body.put_bytes(&full_pet_info(&game.data, pet));
    }
    ctx.reply(&body.finish()).await;
}
