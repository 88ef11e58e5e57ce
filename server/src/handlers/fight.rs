//! Boss and wild battles: challenge, ready, skill exchanges, catching and
//! escape.

use bytes::Bytes;
use log::{debug, info, warn};
use rand::Rng;

use seer_shared::commands::{
    FIGHT_OVER, GET_PET_INFO, NOTE_READY_TO_FIGHT, NOTE_START_FIGHT, NOTE_UPDATE_PROP, NOTE_USE_SKILL,
};
use seer_shared::{BodyReader, BodyWriter};

use super::pet::{full_pet_info, put_skill_slots, starter_pet, update_prop_body};
use super::Shared;
use crate::battle::{
    exp_reward, resolve_exchange, stats_for, Attack, Combatant, ExchangeOutcome, FightState, Reward, Side,
    ENEMY_DV,
};
use crate::gamedata::{GameData, NOVICE_BOSS_ID};
use crate::network::Context;
use crate::world::{unix_now, ItemStack, Pet, Session, MAX_DV};

/// Catch map reported for the opponent
const WILD_CATCH_MAP: u32 = 301;

/// Level of monsters met on a map
const WILD_LEVEL: u32 = 5;

/// Combatant for the pet the session sends into battle
fn player_combatant(session: &Session, data: &GameData) -> Combatant {
    let pet = session.current_pet().cloned().unwrap_or_else(starter_pet);
    Combatant::new(data, pet.species_id, pet.catch_time, pet.level, pet.dv)
        .with_skills(data, pet.skills)
        .with_hp(pet.hp)
}

fn boss_fight(data: &GameData, player: Combatant, boss_id: u32) -> FightState {
    let (species_id, level, max_hp, reward) = match data.boss(boss_id) {
        Some(boss) => {
            let reward = (boss.reward_item_id > 0).then(|| Reward {
                item_id: boss.reward_item_id,
                count: boss.reward_count.max(1),
            });
            (boss.species_id, boss.level.max(1), boss.max_hp, reward)
        }
        None => (boss_id, 1, 0, None),
    };
    let enemy = Combatant::new(data, species_id, unix_now(), level, ENEMY_DV).with_max_hp(max_hp);
    FightState::new(player, enemy).with_reward(reward)
}

/// Species in the requested ogre slot of `map_id`, else the first occupied
/// slot, else the novice boss
fn wild_species(data: &GameData, map_id: u32, slot: u32) -> u32 {
    let layout = data.ogres(map_id);
    layout
        .get(slot as usize)
        .map(|ogre| ogre.species_id)
        .filter(|&id| id > 0)
        .or_else(|| layout.iter().map(|ogre| ogre.species_id).find(|&id| id > 0))
        .unwrap_or(NOVICE_BOSS_ID)
}

fn wild_fight(data: &GameData, player: Combatant, species_id: u32) -> FightState {
    let enemy = Combatant::new(data, species_id, unix_now(), WILD_LEVEL, ENEMY_DV);
    FightState::new(player, enemy)
}

/// Attach `fight` to the session and build the ready notice
fn engage(session: &mut Session, data: &GameData, user_id: u32, fight: FightState) -> Bytes {
    let body = ready_body(data, user_id, &session.nick, session.map_id(), &fight);
    if session.fight.replace(fight).is_some() {
        debug!("Player {} abandoned a running fight", user_id);
    }
    body
}

/// What a finished battle changed on the session
#[derive(Debug, Default)]
struct Settlement {
    pet: Option<Pet>,
    item: Option<(u32, ItemStack)>,
    exp: u32,
}

/// Write battle results back to the owned pet and grant the reward on a win
fn settle(session: &mut Session, data: &GameData, fight: &FightState, won: bool) -> Settlement {
    let mut settlement = Settlement::default();
    if let Some(pet) = session.find_pet_mut(fight.player.catch_time) {
        pet.hp = fight.player.hp;
        if won {
            settlement.exp = exp_reward(data, fight.enemy.species_id, fight.enemy.level);
            pet.exp = pet.exp.saturating_add(settlement.exp);
        }
        settlement.pet = Some(pet.clone());
    }
    if let (true, Some(reward)) = (won, fight.reward) {
        session.add_item(reward.item_id, reward.count);
        settlement.item = session.items.get(&reward.item_id).map(|stack| (reward.item_id, *stack));
    }
    settlement
}

fn persist_settlement(game: &Shared, user_id: u32, settlement: &Settlement) {
    if let Some(pet) = &settlement.pet {
        game.persistence.save_pet(user_id, pet);
    }
    if let Some((item_id, stack)) = &settlement.item {
        game.persistence.save_item(user_id, *item_id, stack);
    }
    game.save_player(user_id);
}

fn simple_pet_info(body: &mut BodyWriter, data: &GameData, combatant: &Combatant, catch_map: u32) {
    body.put_u32(combatant.species_id)
        .put_u32(combatant.level)
        .put_u32(combatant.hp)
        .put_u32(combatant.stats.max_hp);
    put_skill_slots(body, data, &combatant.skills);
    body.put_u32(combatant.catch_time)
        .put_u32(catch_map)
        .put_u32(0) // catch rect
        .put_u32(combatant.level)
        .put_u32(combatant.species_id); // skin
}

fn ready_body(data: &GameData, user_id: u32, nick: &str, map_id: u32, fight: &FightState) -> Bytes {
    let catch_map = if map_id == 0 { WILD_CATCH_MAP } else { map_id };
    let mut body = BodyWriter::with_capacity(256);
    body.put_u32(2).put_u32(user_id).put_fixed_str(nick, 16).put_u32(1);
    simple_pet_info(&mut body, data, &fight.player, catch_map);
    body.put_u32(0).put_fixed_str("", 16).put_u32(1);
    simple_pet_info(&mut body, data, &fight.enemy, WILD_CATCH_MAP);
    body.finish()
}

fn fight_pet_info(body: &mut BodyWriter, data: &GameData, user_id: u32, combatant: &Combatant, catchable: bool) {
    let name = data.species(combatant.species_id).map(|s| s.name.as_str()).unwrap_or("");
    body.put_u32(user_id)
        .put_u32(combatant.species_id)
        .put_fixed_str(name, 16)
        .put_u32(combatant.catch_time)
        .put_u32(combatant.hp)
        .put_u32(combatant.stats.max_hp)
        .put_u32(combatant.level)
        .put_u32(u32::from(catchable))
        .put_zeros(6);
}

fn start_body(data: &GameData, user_id: u32, fight: &FightState) -> Bytes {
    let mut body = BodyWriter::with_capacity(128);
    body.put_u32(0);
    fight_pet_info(&mut body, data, user_id, &fight.player, false);
    fight_pet_info(&mut body, data, 0, &fight.enemy, true);
    body.finish()
}

fn attack_value(body: &mut BodyWriter, user_id: u32, attack: &Attack, lost_hp: u32) {
    body.put_u32(user_id)
        .put_u32(attack.skill_id)
        .put_u32(u32::from(attack.skill_id > 0 && !attack.missed))
        .put_u32(lost_hp)
        .put_i32(0) // hp gained
        .put_i32(attack.attacker_hp as i32)
        .put_u32(attack.attacker_max_hp)
        .put_u32(u32::from(attack.missed))
        .put_u32(0)
        .put_u32(u32::from(attack.critical))
        .put_bytes(&attack.status)
        .put_zeros(6) // stat stages
        .put_u32(0)
        .put_u32(0)
        .put_u32(attack.attacker_element);
}

/// Both halves of an exchange; a knocked-out enemy reports an idle turn
fn exchange_body(user_id: u32, outcome: &ExchangeOutcome, enemy: &Combatant) -> Bytes {
    let mut body = BodyWriter::with_capacity(2 * 80);
    attack_value(&mut body, user_id, &outcome.player, outcome.player.damage);
    let idle = Attack::idle(Side::Enemy, enemy);
    let enemy_attack = outcome.enemy.as_ref().unwrap_or(&idle);
    attack_value(&mut body, 0, enemy_attack, enemy_attack.damage);
    body.finish()
}

fn fight_over_body(reason: u32, winner: u32) -> Bytes {
    let mut body = BodyWriter::with_capacity(28);
    body.put_u32(reason).put_u32(winner).put_zeros(20);
    body.finish()
}

/// Start a battle against a configured boss; boss 0 is the novice boss.
pub async fn challenge_boss(game: Shared, ctx: Context) {
    let boss_id = match BodyReader::new(&ctx.body).read_u32() {
        0 => NOVICE_BOSS_ID,
        id => id,
    };

    let body = game.world.with_session(ctx.user_id, |session| {
        let player = player_combatant(session, &game.data);
        let fight = boss_fight(&game.data, player, boss_id);
        engage(session, &game.data, ctx.user_id, fight)
    });
    info!("Player {} challenged boss {}", ctx.user_id, boss_id);
    ctx.push(NOTE_READY_TO_FIGHT, &body).await;
}

/// Fight the monster in an ogre slot of the player's map.
pub async fn fight_npc_monster(game: Shared, ctx: Context) {
    let slot = BodyReader::new(&ctx.body).read_u32();

    let (species_id, body) = game.world.with_session(ctx.user_id, |session| {
        let species_id = wild_species(&game.data, session.map_id(), slot);
        let player = player_combatant(session, &game.data);
        let fight = wild_fight(&game.data, player, species_id);
        (species_id, engage(session, &game.data, ctx.user_id, fight))
    });
    info!("Player {} engaged species {} from slot {}", ctx.user_id, species_id, slot);
    ctx.reply(&[]).await;
    ctx.push(NOTE_READY_TO_FIGHT, &body).await;
}

/// Client finished loading the battle scene
pub async fn ready_to_fight(game: Shared, ctx: Context) {
    let fight = game.world.with_session(ctx.user_id, |session| {
        let fight = session.fight.as_mut()?;
        fight.ready = true;
        let start = start_body(&game.data, ctx.user_id, fight);
        let player = fight.player.clone();
        let pet = session.find_pet(player.catch_time).cloned().unwrap_or_else(|| {
            let mut pet = Pet::new(player.species_id, player.catch_time, player.level, player.dv);
            pet.skills = player.skills;
            pet.hp = player.hp;
            pet
        });
        Some((start, full_pet_info(&game.data, &pet)))
    });

    let Some((start, pet_info)) = fight else {
        debug!("Player {} sent ready without a fight", ctx.user_id);
        return;
    };
    ctx.push(NOTE_START_FIGHT, &start).await;
    ctx.push(GET_PET_INFO, &pet_info).await;
}

/// Outcome of one skill command as seen by the handler
enum Turn {
    NoFight,
    Ongoing(Bytes),
    Finished {
        exchange: Bytes,
        winner: Option<Side>,
        settlement: Settlement,
    },
}

fn play_turn(session: &mut Session, data: &GameData, user_id: u32, requested: u32) -> Turn {
    let Some(fight) = session.fight.as_mut() else {
        return Turn::NoFight;
    };
    let outcome = match resolve_exchange(fight, data, requested, &mut rand::thread_rng()) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Player {} used a skill in a finished fight: {}", user_id, e);
            session.end_fight();
            return Turn::NoFight;
        }
    };
    let exchange = exchange_body(user_id, &outcome, &fight.enemy);
    if outcome.winner.is_none() {
        return Turn::Ongoing(exchange);
    }

    let Some(fight) = session.end_fight() else {
        return Turn::NoFight;
    };
    let settlement = settle(session, data, &fight, outcome.winner == Some(Side::Player));
    Turn::Finished {
        exchange,
        winner: outcome.winner,
        settlement,
    }
}

pub async fn use_skill(game: Shared, ctx: Context) {
    let requested = BodyReader::new(&ctx.body).read_u32();
    ctx.reply(&[]).await;

    let turn = game
        .world
        .with_session(ctx.user_id, |session| play_turn(session, &game.data, ctx.user_id, requested));

    match turn {
        Turn::NoFight => ctx.push(FIGHT_OVER, &fight_over_body(0, 0)).await,
        Turn::Ongoing(exchange) => ctx.push(NOTE_USE_SKILL, &exchange).await,
        Turn::Finished {
            exchange,
            winner,
            settlement,
        } => {
            ctx.push(NOTE_USE_SKILL, &exchange).await;
            let winner_id = if winner == Some(Side::Player) { ctx.user_id } else { 0 };
            ctx.push(FIGHT_OVER, &fight_over_body(0, winner_id)).await;
            if let Some(pet) = &settlement.pet {
                ctx.push(NOTE_UPDATE_PROP, &update_prop_body(&game.data, pet)).await;
            }
            info!(
                "Player {} finished a fight, winner {:?}, +{} exp",
                ctx.user_id, winner, settlement.exp
            );
            persist_settlement(&game, ctx.user_id, &settlement);
        }
    }
}

/// End the fight by taking the opponent as a new pet. Counts as a win.
fn capture(session: &mut Session, data: &GameData) -> Option<(Pet, Settlement)> {
    let fight = session.end_fight()?;
    let enemy = &fight.enemy;

    let mut catch_time = if enemy.catch_time > 0 { enemy.catch_time } else { unix_now() };
    while session.find_pet(catch_time).is_some() {
        catch_time = catch_time.wrapping_add(1).max(1);
    }
    let level = enemy.level.max(1);
    let dv = rand::thread_rng().gen_range(1..=MAX_DV);
    let mut pet = Pet::new(enemy.species_id, catch_time, level, dv);
    pet.hp = stats_for(data.species(enemy.species_id), level, dv).max_hp;
    session.add_pet(pet.clone());

    let settlement = settle(session, data, &fight, true);
    Some((pet, settlement))
}

pub async fn catch_monster(game: Shared, ctx: Context) {
    let caught = game.world.with_session(ctx.user_id, |session| capture(session, &game.data));
    let Some((pet, settlement)) = caught else {
        debug!("Player {} tried to catch outside a fight", ctx.user_id);
        ctx.reply(&[0; 8]).await;
        return;
    };

    let mut body = BodyWriter::with_capacity(8);
    body.put_u32(pet.catch_time).put_u32(pet.species_id);
    ctx.reply(&body.finish()).await;
    ctx.push(FIGHT_OVER, &fight_over_body(0, ctx.user_id)).await;
    if let Some(fighter) = &settlement.pet {
        ctx.push(NOTE_UPDATE_PROP, &update_prop_body(&game.data, fighter)).await;
    }
    info!(
        "Player {} caught species {} at level {}, +{} exp",
        ctx.user_id, pet.species_id, pet.level, settlement.exp
    );

    game.persistence.save_pet(ctx.user_id, &pet);
    persist_settlement(&game, ctx.user_id, &settlement);
}

/// Leave the battle; the pet keeps the HP it had.
pub async fn escape_fight(game: Shared, ctx: Context) {
    let settlement = game.world.with_session(ctx.user_id, |session| {
        let mut fight = session.end_fight()?;
        fight.escape();
        Some(settle(session, &game.data, &fight, false))
    });
    if let Some(settlement) = &settlement {
        persist_settlement(&game, ctx.user_id, settlement);
    }

    let mut body = BodyWriter::with_capacity(4);
    body.put_u32(1);
    ctx.reply(&body.finish()).await;
}

#[cfg(test)]
mod tests {
    use super::super::pet::{get_pet_list, placeholder_catch_time};
    use super::super::task::{complete_task, SELECT_PET_TASK};
    use super::super::testing::*;
    use super::*;
    use crate::battle::{BaseStats, GrowthClass};
    use crate::gamedata::{LearnableSkill, Skill, Species};
    use seer_shared::commands::{
        CATCH_MONSTER, CHALLENGE_BOSS, COMPLETE_TASK, ESCAPE_FIGHT, FIGHT_NPC_MONSTER, GET_PET_LIST,
        READY_TO_FIGHT, USE_SKILL,
    };
    use seer_shared::Packet;

    /// Skill learned by the strong fixture species
    const STRONG_SKILL: u32 = 10001;
    /// Skill learned by the weak fixture species
    const WEAK_SKILL: u32 = 10002;

    fn species(id: u32, attack: u32, hp: u32, skill_id: u32) -> Species {
        Species {
            id,
            name: format!("Species{}", id),
            base: BaseStats {
                hp,
                attack,
                defence: 40,
                special_attack: 40,
                special_defence: 40,
                speed: 40,
            },
            growth: GrowthClass::Medium,
            element: 0,
            base_exp: 70,
            learnable: vec![LearnableSkill { skill_id, level: 1 }],
        }
    }

    /// A strong player pet against a fragile novice boss
    fn lopsided() -> GameData {
        let mut data = GameData::default();
        data.insert_species(species(7, 250, 100, STRONG_SKILL));
        data.insert_species(species(NOVICE_BOSS_ID, 5, 10, WEAK_SKILL));
        data.insert_skill(Skill {
            id: STRONG_SKILL,
            power: 60,
            max_pp: 30,
            ..Skill::fallback(STRONG_SKILL)
        });
        data.insert_skill(Skill {
            id: WEAK_SKILL,
            power: 10,
            max_pp: 30,
            ..Skill::fallback(WEAK_SKILL)
        });
        data
    }

    async fn pick_starter(game: &Shared, user_id: u32) {
        // choice 2 is species 7
        let mut body = u32_body(SELECT_PET_TASK);
        body.extend_from_slice(&u32_body(2));
        let (ctx, mut stream) = request(COMPLETE_TASK, user_id, &body);
        complete_task(game.clone(), ctx).await;
        next_frame(&mut stream).await;
    }

    async fn pet_count(game: &Shared, user_id: u32) -> u32 {
        let (ctx, mut stream) = request(GET_PET_LIST, user_id, &[]);
        get_pet_list(game.clone(), ctx).await;
        BodyReader::new(&next_frame(&mut stream).await.body).read_u32()
    }

    fn u32_body(value: u32) -> Vec<u8> {
        value.to_be_bytes().to_vec()
    }

    #[tokio::test]
    async fn test_challenge_uses_boss_table() {
        let game = game_with(lopsided());
        let (ctx, mut stream) = request(CHALLENGE_BOSS, 1, &u32_body(0));
        challenge_boss(game.clone(), ctx).await;

        let frame = next_frame(&mut stream).await;
        assert_eq!(frame.command_id, NOTE_READY_TO_FIGHT);

        let session = game.world.session(1).unwrap();
        let fight = session.fight.unwrap();
        assert_eq!(fight.enemy.species_id, NOVICE_BOSS_ID);
        assert_eq!(fight.enemy.level, 10);
        assert_eq!(fight.enemy.stats.max_hp, 100);
        assert_eq!(fight.player.species_id, 7);
        assert_eq!(fight.player.catch_time, placeholder_catch_time(7));
    }

    #[tokio::test]
    async fn test_ready_without_fight_is_silent() {
        let game = game();
        let (ctx, stream) = request(READY_TO_FIGHT, 1, &[]);
        ready_to_fight(game, ctx).await;
        drop(stream);
    }

    #[tokio::test]
    async fn test_ready_sends_start_then_pet_info() {
        let game = game_with(lopsided());
        let (ctx, mut stream) = request(CHALLENGE_BOSS, 1, &u32_body(0));
        challenge_boss(game.clone(), ctx).await;
        next_frame(&mut stream).await;

        let (ctx, mut stream) = request(READY_TO_FIGHT, 1, &[]);
        ready_to_fight(game.clone(), ctx).await;
        assert_eq!(next_frame(&mut stream).await.command_id, NOTE_START_FIGHT);
        assert_eq!(next_frame(&mut stream).await.command_id, GET_PET_INFO);
        assert!(game.world.session(1).unwrap().fight.unwrap().ready);
    }

    async fn fight_until_over(game: &Shared, user_id: u32) -> Vec<Packet> {
        let mut frames = Vec::new();
        for _ in 0..50 {
            let (ctx, mut stream) = request(USE_SKILL, user_id, &u32_body(0));
            use_skill(game.clone(), ctx).await;
            let ack = next_frame(&mut stream).await;
            assert_eq!(ack.command_id, USE_SKILL);
            let exchange = next_frame(&mut stream).await;
            assert_eq!(exchange.command_id, NOTE_USE_SKILL);
            frames.push(exchange);
            if game.world.session(user_id).unwrap().fight.is_none() {
                frames.push(next_frame(&mut stream).await);
                return frames;
            }
        }
        panic!("fight did not finish");
    }

    #[tokio::test]
    async fn test_winning_fight_grants_exp_and_reward() {
        let mut data = lopsided();
        data.insert_boss(crate::gamedata::BossConfig {
            species_id: NOVICE_BOSS_ID,
            level: 10,
            max_hp: 30,
            reward_item_id: 300011,
            reward_count: 0,
        });
        let game = game_with(data);
        game.world.with_session(1, |s| {
            s.add_pet(Pet::new(7, 500, 50, 31));
        });

        let (ctx, mut stream) = request(CHALLENGE_BOSS, 1, &u32_body(0));
        challenge_boss(game.clone(), ctx).await;
        next_frame(&mut stream).await;

        let frames = fight_until_over(&game, 1).await;
        let over = frames.last().unwrap();
        assert_eq!(over.command_id, FIGHT_OVER);
        let mut reader = BodyReader::new(&over.body);
        assert_eq!(reader.read_u32(), 0);
        assert_eq!(reader.read_u32(), 1);

        let session = game.world.session(1).unwrap();
        // floor(floor(70 * 10 / 7) * 0.8)
        assert_eq!(session.find_pet(500).map(|p| (p.exp, p.level)), Some((80, 50)));
        assert_eq!(session.items.get(&300011).map(|s| s.count), Some(1));
        assert!(!session.is_fighting());
    }

    #[tokio::test]
    async fn test_skill_without_fight_reports_over() {
        let game = game();
        let (ctx, mut stream) = request(USE_SKILL, 3, &u32_body(10001));
        use_skill(game, ctx).await;

        assert_eq!(next_frame(&mut stream).await.command_id, USE_SKILL);
        let over = next_frame(&mut stream).await;
        assert_eq!(over.command_id, FIGHT_OVER);
        assert_eq!(&over.body[..8], &[0u8; 8]);
    }

    #[tokio::test]
    async fn test_escape_clears_fight_and_keeps_hp() {
        let game = game_with(lopsided());
        game.world.with_session(1, |s| {
            let mut pet = Pet::new(7, 500, 5, 31);
            pet.hp = 7;
            s.add_pet(pet);
        });
        let (ctx, mut stream) = request(CHALLENGE_BOSS, 1, &u32_body(0));
        challenge_boss(game.clone(), ctx).await;
        next_frame(&mut stream).await;

        let (ctx, mut stream) = request(ESCAPE_FIGHT, 1, &[]);
        escape_fight(game.clone(), ctx).await;
        let frame = next_frame(&mut stream).await;
        assert_eq!(BodyReader::new(&frame.body).read_u32(), 1);

        let session = game.world.session(1).unwrap();
        assert!(!session.is_fighting());
        assert_eq!(session.find_pet(500).map(|p| (p.hp, p.exp)), Some((7, 0)));
    }

    #[tokio::test]
    async fn test_wild_fight_uses_ogre_slot() {
        let game = game_with(lopsided());
        game.world.get_or_create_session(1);
        assert!(game.world.update_map(1, 301));

        // map 301 holds species 1, 4, 7 and 10 in its first slots
        let (ctx, mut stream) = request(FIGHT_NPC_MONSTER, 1, &u32_body(2));
        fight_npc_monster(game.clone(), ctx).await;
        let ack = next_frame(&mut stream).await;
        assert_eq!(ack.command_id, FIGHT_NPC_MONSTER);
        assert!(ack.body.is_empty());
        assert_eq!(next_frame(&mut stream).await.command_id, NOTE_READY_TO_FIGHT);

        let fight = game.world.session(1).unwrap().fight.unwrap();
        assert_eq!(fight.enemy.species_id, 7);
        assert_eq!(fight.enemy.level, WILD_LEVEL);
        assert_eq!(fight.reward, None);
    }

    #[test]
    fn test_wild_species_falls_back() {
        let data = GameData::default();
        assert_eq!(wild_species(&data, 301, 8), 1);
        assert_eq!(wild_species(&data, 301, 99), 1);
        assert_eq!(wild_species(&data, 12345, 0), NOVICE_BOSS_ID);
    }

    #[tokio::test]
    async fn test_starter_gains_exp_from_wild_win() {
        let game = game_with(lopsided());
        pick_starter(&game, 1).await;
        assert_eq!(pet_count(&game, 1).await, 1);

        // the spawn map has no ogres, so the novice boss species turns up
        let (ctx, mut stream) = request(FIGHT_NPC_MONSTER, 1, &u32_body(0));
        fight_npc_monster(game.clone(), ctx).await;
        next_frame(&mut stream).await;
        next_frame(&mut stream).await;
        assert_eq!(
            game.world.session(1).unwrap().fight.map(|f| f.player.catch_time),
            Some(placeholder_catch_time(7))
        );

        let frames = fight_until_over(&game, 1).await;
        let over = frames.last().unwrap();
        assert_eq!(over.command_id, FIGHT_OVER);
        assert_eq!(&over.body[4..8], &1u32.to_be_bytes());

        let session = game.world.session(1).unwrap();
        let starter = session.find_pet(placeholder_catch_time(7)).unwrap();
        // floor(floor(70 * 5 / 7) * 0.8)
        assert_eq!(starter.exp, 40);
        assert!(session.items.is_empty());
    }

    #[tokio::test]
    async fn test_catch_adds_pet_and_ends_fight() {
        let game = game_with(lopsided());
        pick_starter(&game, 1).await;
        assert!(game.world.update_map(1, 301));

        let (ctx, mut stream) = request(FIGHT_NPC_MONSTER, 1, &u32_body(2));
        fight_npc_monster(game.clone(), ctx).await;
        next_frame(&mut stream).await;
        next_frame(&mut stream).await;
        let enemy_catch_time = game.world.session(1).unwrap().fight.unwrap().enemy.catch_time;

        let (ctx, mut stream) = request(CATCH_MONSTER, 1, &[]);
        catch_monster(game.clone(), ctx).await;
        let reply = next_frame(&mut stream).await;
        assert_eq!(reply.command_id, CATCH_MONSTER);
        let mut reader = BodyReader::new(&reply.body);
        assert_eq!(reader.read_u32(), enemy_catch_time);
        assert_eq!(reader.read_u32(), 7);
        let over = next_frame(&mut stream).await;
        assert_eq!(over.command_id, FIGHT_OVER);
        assert_eq!(&over.body[4..8], &1u32.to_be_bytes());
        assert_eq!(next_frame(&mut stream).await.command_id, NOTE_UPDATE_PROP);

        assert_eq!(pet_count(&game, 1).await, 2);
        let session = game.world.session(1).unwrap();
        assert!(!session.is_fighting());
        let caught = session.find_pet(enemy_catch_time).unwrap();
        assert_eq!((caught.species_id, caught.level), (7, WILD_LEVEL));
        assert!((1..=MAX_DV).contains(&caught.dv));
        assert!(caught.hp > 0);
        assert_eq!(session.find_pet(placeholder_catch_time(7)).map(|p| p.exp), Some(40));
    }

    #[tokio::test]
    async fn test_catch_without_fight_returns_nothing() {
        let game = game();
        let (ctx, mut stream) = request(CATCH_MONSTER, 1, &[]);
        catch_monster(game.clone(), ctx).await;
        let reply = next_frame(&mut stream).await;
        assert_eq!(&reply.body[..], &[0u8; 8]);
        assert!(game.world.session(1).unwrap().pets.is_empty());
    }
}
