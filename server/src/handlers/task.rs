//! Task completion, including the novice task that hands out the first pet.

use bytes::Bytes;
use log::info;
use rand::Rng;

use seer_shared::{BodyReader, BodyWriter};

use super::pet::{placeholder_catch_time, STARTER_LEVEL, STARTER_SPECIES};
use super::Shared;
use crate::network::Context;
use crate::world::{Pet, Session, MAX_DV};

/// Novice task whose parameter picks the first pet
pub(super) const SELECT_PET_TASK: u32 = 86;

const TASK_DONE: u8 = 3;

/// Starter species offered by the novice task, keyed by choice
fn starter_choice(param: u32) -> u32 {
    match param {
        1 => 1,
        2 => 7,
        3 => 4,
        _ => STARTER_SPECIES,
    }
}

/// Give the chosen starter and make it the current pet. Completing the task
/// again returns the pet already granted.
fn grant_starter(session: &mut Session, param: u32) -> (Pet, bool) {
    let species_id = starter_choice(param);
    let catch_time = placeholder_catch_time(species_id);
    if let Some(pet) = session.find_pet(catch_time) {
        return (pet.clone(), false);
    }

    let dv = rand::thread_rng().gen_range(0..=MAX_DV);
    let pet = Pet::new(species_id, catch_time, STARTER_LEVEL, dv);
    session.add_pet(pet.clone());
    session.current_pet = catch_time;
    (pet, true)
}

fn complete_body(task_id: u32, pet: Option<&Pet>) -> Bytes {
    let mut body = BodyWriter::with_capacity(16);
    body.put_u32(task_id)
        .put_u32(pet.map(|p| p.species_id).unwrap_or(0))
        .put_u32(pet.map(|p| p.catch_time).unwrap_or(0))
        .put_u32(0); // reward items
    body.finish()
}

/// Mark a task done. The novice pet task also grants the chosen starter.
pub async fn complete_task(game: Shared, ctx: Context) {
    let mut reader = BodyReader::new(&ctx.body);
    let task_id = reader.read_u32();
    let param = reader.read_u32();

    let (granted, session) = game.world.with_session(ctx.user_id, |session| {
        let granted = (task_id == SELECT_PET_TASK).then(|| grant_starter(session, param));
        session.tasks.status.insert(task_id, TASK_DONE);
        (granted, session.clone())
    });

    if let Some((pet, true)) = &granted {
        info!(
            "Player {} picked starter species {} (dv {})",
            ctx.user_id, pet.species_id, pet.dv
        );
        game.persistence.save_pet(ctx.user_id, pet);
    }
    game.persistence.save_session(&session);

    let pet = granted.as_ref().map(|(pet, _)| pet);
    ctx.reply(&complete_body(task_id, pet)).await;
}
