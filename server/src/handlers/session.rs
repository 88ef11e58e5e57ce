//! Login-in and clock commands.

use bytes::Bytes;
use log::info;

use seer_shared::BodyWriter;

use super::pet::full_pet_info;
use super::Shared;
use crate::gamedata::GameData;
use crate::network::Context;
use crate::world::{unix_now, Session};

/// Task status bytes carried in the login body
const TASK_SLOTS: u32 = 500;

/// VIP expiry sent for super companions without an explicit end time
const VIP_FOREVER: u32 = 0x7FFF_FFFF;

/// Bind the connection, load or create the player and send the full profile.
pub async fn login_in(game: Shared, ctx: Context) {
    let user_id = ctx.user_id;
    if let Some(previous) = game.world.register_connection(user_id, ctx.connection.clone()) {
        if previous.id() != ctx.connection.id() {
            info!("Player {} reconnected, replacing {}", user_id, previous);
        }
    }

    match game.persistence.load_player(user_id).await {
        Some(snapshot) => snapshot.hydrate(&game.world),
        None => {
            game.world.get_or_create_session(user_id);
        }
    }

    let session = game.world.with_session(user_id, |session| {
        session.login_count = session.login_count.saturating_add(1);
        session.clone()
    });
    game.persistence.save_session(&session);

    ctx.reply(&login_body(&session, &game.data)).await;
    info!(
        "Player {} logged in on map {} ({} online)",
        user_id,
        session.map_id(),
        game.world.online_count()
    );
}

pub async fn system_time(_game: Shared, ctx: Context) {
    let mut body = BodyWriter::with_capacity(8);
    body.put_u32(unix_now()).put_u32(0);
    ctx.reply(&body.finish()).await;
}

fn login_body(session: &Session, data: &GameData) -> Bytes {
    let nono = &session.nono;
    let super_nono = nono.super_nono > 0;
    let mut body = BodyWriter::with_capacity(2048);

    body.put_u32(session.user_id)
        .put_u32(session.reg_time)
        .put_fixed_str(&session.nick, 16)
        .put_u32(if super_nono { 3 } else { 0 });

    body.put_u32(0) // ds flag
        .put_u32(session.color)
        .put_u32(session.texture)
        .put_u32(session.energy)
        .put_u32(session.coins)
        .put_u32(session.fight_badge)
        .put_u32(session.map_id())
        .put_u32(session.pos_x)
        .put_u32(session.pos_y)
        .put_u32(0) // time online today
        .put_u32(session.time_limit)
        .put_zeros(4);

    body.put_u32(session.login_count)
        .put_u32(0) // inviter
        .put_u32(0) // new invitees
        .put_u32(nono.vip_level)
        .put_u32(0) // vip value
        .put_u32(nono.super_stage)
        .put_u32(0) // auto charge
        .put_u32(if super_nono { VIP_FOREVER } else { 0 })
        .put_u32(0) // fresh man bonus
        .put_zeros(80 + 50);

    body.put_u32(0) // mentor
        .put_u32(0) // student
        .put_u32(0) // graduations
        .put_u32(100) // max puni level
        .put_u32(100) // max pet level
        .put_u32(session.pets.len() as u32)
        .put_zeros(18 * 4);

    body.put_u32(u32::from(nono.has_nono))
        .put_u32(u32::from(super_nono))
        .put_u32(nono.flag)
        .put_u32(nono.color)
        .put_fixed_str(&nono.nick, 16);

    let team = &session.team;
    body.put_u32(team.id)
        .put_u32(team.privilege)
        .put_u32(0) // super core
        .put_u32(0) // show logo
        .put_u32(team.contribution)
        .put_u32(0) // exchangeable contribution
        .put_zeros(8) // team pk
        .put_u8(0) // badge
        .put_u32(0)
        .put_zeros(27);

    for task_id in 1..=TASK_SLOTS {
        body.put_u8(session.tasks.status.get(&task_id).copied().unwrap_or(0));
    }

    body.put_u32(session.pets.len() as u32);
    for pet in &session.pets {
        body.put_bytes(&full_pet_info(data, pet));
    }

    body.put_u32(session.clothes.len() as u32);
    for cloth in &session.clothes {
        body.put_u32(cloth.id).put_u32(cloth.level);
    }

    body.put_u32(0) // current title
        .put_zeros(200);
    body.finish()
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use seer_shared::commands::{LOGIN_IN, SYSTEM_TIME};
    use seer_shared::BodyReader;

    use crate::world::Pet;

    #[tokio::test]
    async fn test_login_creates_and_binds_session() {
        let game = game();
        let (ctx, mut stream) = request(LOGIN_IN, 1001, &[]);
        login_in(game.clone(), ctx).await;

        let frame = next_frame(&mut stream).await;
        assert_eq!(frame.command_id, LOGIN_IN);
        assert_eq!(frame.seq, 0);

        let mut reader = BodyReader::new(&frame.body);
        assert_eq!(reader.read_u32(), 1001);
        reader.read_u32();
        assert_eq!(reader.read_fixed_str(16), "Seer1001");

        assert!(game.world.connection(1001).is_some());
        assert_eq!(game.world.players_in_map(1), vec![1001]);
        assert_eq!(game.world.session(1001).map(|s| s.login_count), Some(1));
    }

    #[tokio::test]
    async fn test_login_restores_saved_player() {
        let game = game();
        let mut session = Session::new(7, Default::default());
        session.coins = 4321;
        session.add_pet(Pet::new(7, 99, 10, 20));
        game.persistence.save_session(&session);
        game.persistence.save_pet(7, &session.pets[0]);

        let (ctx, mut stream) = request(LOGIN_IN, 7, &[]);
        login_in(game.clone(), ctx).await;
        next_frame(&mut stream).await;

        let restored = game.world.session(7).unwrap();
        assert_eq!(restored.coins, 4321);
        assert_eq!(restored.find_pet(99).map(|p| p.level), Some(10));
    }

    #[test]
    fn test_login_body_layout() {
        let data = GameData::default();
        let mut session = Session::new(5, Default::default());
        let empty = login_body(&session, &data);

        session.add_pet(Pet::new(7, 1, 5, 31));
        let with_pet = login_body(&session, &data);
        assert_eq!(with_pet.len() - empty.len(), full_pet_info(&data, &session.pets[0]).len());
    }

    #[tokio::test]
    async fn test_system_time_is_eight_bytes() {
        let (ctx, mut stream) = request(SYSTEM_TIME, 1, &[]);
        system_time(game(), ctx).await;
        let frame = next_frame(&mut stream).await;
        assert_eq!(frame.body.len(), 8);
        assert!(BodyReader::new(&frame.body).read_u32() > 0);
    }
}
