//! Map presence: entering, leaving, listing, walking and chat.

use bytes::Bytes;
use log::debug;

use seer_shared::commands::LIST_MAP_PLAYER;
use seer_shared::{protocol, BodyReader, BodyWriter};

use super::pet::STARTER_SPECIES;
use super::Shared;
use crate::network::Context;
use crate::world::{unix_now, Session, MAX_DV};

/// Appearance record for one player on a map
fn people_info(session: &Session, now: u32) -> Bytes {
    let nono = &session.nono;
    let super_nono = nono.super_nono > 0;
    let (catch_time, species_id, dv) = session
        .current_pet()
        .map(|pet| (pet.catch_time, pet.species_id, pet.dv))
        .unwrap_or((0, STARTER_SPECIES, MAX_DV));

    let mut body = BodyWriter::with_capacity(160);
    body.put_u32(now)
        .put_u32(session.user_id)
        .put_fixed_str(&session.nick, 16)
        .put_u32(session.color)
        .put_u32(session.texture)
        .put_u32(if super_nono { 3 } else { 0 })
        .put_u32(nono.super_stage)
        .put_u32(0) // action type
        .put_u32(session.pos_x)
        .put_u32(session.pos_y)
        .put_u32(0) // action
        .put_u32(0) // direction
        .put_u32(0) // shape
        .put_u32(catch_time)
        .put_u32(species_id)
        .put_u32(dv)
        .put_u32(0) // pet skin
        .put_u32(0) // fight flag
        .put_u32(0) // mentor
        .put_u32(0) // student
        .put_u32(nono.flag)
        .put_u32(nono.color)
        .put_u32(u32::from(super_nono))
        .put_u32(0) // player form
        .put_u32(0); // transform time

    let team = &session.team;
    body.put_u32(team.id)
        .put_u32(0) // core count
        .put_u32(0) // show logo
        .put_u16(team.logo_bg)
        .put_u16(team.logo_icon)
        .put_u16(team.logo_color)
        .put_u16(team.text_color)
        .put_fixed_str(&team.logo_word, 4);

    body.put_u32(session.clothes.len() as u32);
    for cloth in &session.clothes {
        body.put_u32(cloth.id).put_u32(cloth.level);
    }
    body.put_u32(0); // title
    body.finish()
}

/// Count followed by the appearance of everyone on `map_id`
fn map_player_list(game: &Shared, map_id: u32) -> Bytes {
    let now = unix_now();
    let sessions: Vec<Session> = game
        .world
        .players_in_map(map_id)
        .into_iter()
        .filter_map(|user_id| game.world.session(user_id))
        .collect();

    let mut body = BodyWriter::new();
    body.put_u32(sessions.len() as u32);
    for session in &sessions {
        body.put_bytes(&people_info(session, now));
    }
    body.finish()
}

/// Send `body` to everyone on the sender's map, or back to the sender when
/// they are in no map.
async fn broadcast_or_reply(game: &Shared, ctx: &Context, map_id: u32, body: &[u8]) {
    if map_id > 0 {
        let frame = protocol::encode(ctx.command_id, ctx.user_id, 0, body);
        game.world.broadcast(map_id, &frame).await;
    } else {
        ctx.reply(body).await;
    }
}

pub async fn enter_map(game: Shared, ctx: Context) {
    let mut reader = BodyReader::new(&ctx.body);
    let map_type = reader.read_u32();
    let requested = reader.read_u32();
    let (mut x, mut y) = (reader.read_u32(), reader.read_u32());
    if x == 0 && y == 0 {
        x = game.config.spawn_x;
        y = game.config.spawn_y;
    }

    let map_id = game.world.with_session(ctx.user_id, |session| {
        session.map_type = map_type;
        session.pos_x = x;
        session.pos_y = y;
        if requested == 0 {
            session.map_id()
        } else {
            requested
        }
    });
    game.world.update_map(ctx.user_id, map_id);
    debug!("Player {} entered map {} at ({}, {})", ctx.user_id, map_id, x, y);

    let Some(session) = game.world.session(ctx.user_id) else {
        return;
    };
    game.persistence.save_session(&session);

    ctx.reply(&people_info(&session, unix_now())).await;
    ctx.push(LIST_MAP_PLAYER, &map_player_list(&game, map_id)).await;
}

pub async fn leave_map(game: Shared, ctx: Context) {
    game.world.get_or_create_session(ctx.user_id);
    game.world.update_map(ctx.user_id, 0);
    game.save_player(ctx.user_id);

    let mut body = BodyWriter::with_capacity(4);
    body.put_u32(ctx.user_id);
    ctx.reply(&body.finish()).await;
}

pub async fn list_map_player(game: Shared, ctx: Context) {
    let map_id = game.world.get_or_create_session(ctx.user_id).map_id();
    ctx.reply(&map_player_list(&game, map_id)).await;
}

/// Nine (species, shiny) slots for the wild pets on the player's map
pub async fn map_ogre_list(game: Shared, ctx: Context) {
    let map_id = game.world.get_or_create_session(ctx.user_id).map_id();
    let mut body = BodyWriter::with_capacity(72);
    for slot in game.data.ogres(map_id) {
        body.put_u32(slot.species_id).put_u32(slot.shiny);
    }
    ctx.reply(&body.finish()).await;
}

pub async fn people_walk(game: Shared, ctx: Context) {
    let mut reader = BodyReader::new(&ctx.body);
    let walk_type = reader.read_u32();
    let x = reader.read_u32();
    let y = reader.read_u32();
    let path_len = reader.read_u32();
    let path = reader.read_bytes(path_len as usize);

    let map_id = game.world.with_session(ctx.user_id, |session| {
        session.pos_x = x;
        session.pos_y = y;
        session.map_id()
    });

    let mut body = BodyWriter::with_capacity(20 + path.len());
    body.put_u32(walk_type)
        .put_u32(ctx.user_id)
        .put_u32(x)
        .put_u32(y)
        .put_u32(path_len)
        .put_bytes(path);
    broadcast_or_reply(&game, &ctx, map_id, &body.finish()).await;
}

pub async fn chat(game: Shared, ctx: Context) {
    let mut reader = BodyReader::new(&ctx.body);
    let _chat_type = reader.read_u32();
    let len = reader.read_u32();
    let message = reader.read_bytes(len as usize);

    let (nick, map_id) = game
        .world
        .with_session(ctx.user_id, |session| (session.nick.clone(), session.map_id()));

    let mut body = BodyWriter::with_capacity(28 + message.len());
    body.put_u32(ctx.user_id)
        .put_fixed_str(&nick, 16)
        .put_u32(0) // recipient
        .put_u32(message.len() as u32)
        .put_bytes(message);
    broadcast_or_reply(&game, &ctx, map_id, &body.finish()).await;
}
