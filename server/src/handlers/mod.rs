//! Command handlers wired into the gateway and login registries.
//!
//! Handlers are thin: they decode a few fields, call into the world state or
//! battle engine, and answer through the request context.

mod fight;
mod login;
mod map;
mod pet;
mod session;
mod task;

use std::future::Future;
use std::sync::Arc;

use log::debug;

use seer_shared::commands::*;

use crate::config::GameConfig;
use crate::gamedata::GameData;
use crate::network::{handler, CloseHook, CommandRegistry, Connection, Context};
use crate::persistence::PersistenceHandle;
use crate::world::WorldState;

/// Everything a handler may reach
pub struct Game {
    pub world: Arc<WorldState>,
    pub data: Arc<GameData>,
    pub persistence: PersistenceHandle,
    pub config: GameConfig,
}

pub type Shared = Arc<Game>;

impl Game {
    /// Queue the current player record of `user_id`
    pub fn save_player(&self, user_id: u32) {
        if let Some(session) = self.world.session(user_id) {
            self.persistence.save_session(&session);
        }
    }
}

fn on<F, Fut>(registry: &CommandRegistry, id: i32, game: &Shared, f: F)
where
    F: Fn(Shared, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let game = game.clone();
    registry.register(id, handler(move |ctx| f(game.clone(), ctx)));
}

/// Install every gateway handler, then the bulk stubs and the default.
pub fn register_gateway(registry: &CommandRegistry, game: &Shared) {
    on(registry, LOGIN_IN, game, session::login_in);
    on(registry, SYSTEM_TIME, game, session::system_time);

    on(registry, ENTER_MAP, game, map::enter_map);
    on(registry, LEAVE_MAP, game, map::leave_map);
    on(registry, LIST_MAP_PLAYER, game, map::list_map_player);
    on(registry, MAP_OGRE_LIST, game, map::map_ogre_list);
    on(registry, PEOPLE_WALK, game, map::people_walk);
    on(registry, CHAT, game, map::chat);

    on(registry, GET_PET_INFO, game, pet::get_pet_info);
    on(registry, GET_PET_LIST, game, pet::get_pet_list);

    on(registry, COMPLETE_TASK, game, task::complete_task);

    on(registry, CHALLENGE_BOSS, game, fight::challenge_boss);
    on(registry, READY_TO_FIGHT, game, fight::ready_to_fight);
    on(registry, USE_SKILL, game, fight::use_skill);
    on(registry, FIGHT_NPC_MONSTER, game, fight::fight_npc_monster);
    on(registry, CATCH_MONSTER, game, fight::catch_monster);
    on(registry, ESCAPE_FIGHT, game, fight::escape_fight);

    register_stubs(registry);
    registry.set_default(handler(|ctx: Context| async move { ctx.reply(&[]).await }));
}

/// Fixed-answer commands. Never overrides a real handler.
fn register_stubs(registry: &CommandRegistry) {
    for &id in STUB_ZERO_U32 {
        registry.register_if_absent(id, handler(|ctx: Context| async move { ctx.reply(&[0; 4]).await }));
    }
    for &id in STUB_EMPTY {
        registry.register_if_absent(id, handler(|ctx: Context| async move { ctx.reply(&[]).await }));
    }
}

/// Install the login listener handlers. Unknown commands are dropped.
pub fn register_login(registry: &CommandRegistry, game: &Shared) {
    on(registry, LOGIN_VERIFY, game, login::verify);
    on(registry, LOGIN_MAIN, game, login::main_login);
    on(registry, LOGIN_GOOD_SERVER_LIST, game, login::good_server_list);
    on(registry, LOGIN_SERVER_LIST, game, login::server_list);
}

/// Unbind a closing connection and flush its player.
pub fn close_hook(game: &Shared) -> CloseHook {
    let game = game.clone();
    Arc::new(move |conn: &Connection| {
        if let Some(user_id) = game.world.unbind_connection(conn.id()) {
            debug!("Player {} disconnected ({})", user_id, conn);
            game.save_player(user_id);
        }
    })
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_stubs_do_not_override_handlers() {
        let registry = CommandRegistry::new();
        let game = game();
        register_gateway(&registry, &game);

        // 10001 is both a stub id and unrelated to any feature handler
        assert!(registry.contains(10001));
        let (ctx, mut stream) = request(10001, 7, &[]);
        assert!(registry.dispatch(ctx).await);
        let frame = next_frame(&mut stream).await;
        assert_eq!(frame.command_id, 10001);
        assert_eq!(&frame.body[..], &[0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_default_answers_empty() {
        let registry = CommandRegistry::new();
        register_gateway(&registry, &game());

        let (ctx, mut stream) = request(31337, 7, &[1, 2, 3]);
        assert!(registry.dispatch(ctx).await);
        let frame = next_frame(&mut stream).await;
        assert_eq!(frame.command_id, 31337);
        assert!(frame.body.is_empty());
    }

    #[tokio::test]
    async fn test_login_registry_drops_unknown() {
        let registry = CommandRegistry::new();
        register_login(&registry, &game());
        let (ctx, _stream) = request(2001, 7, &[]);
        assert!(!registry.dispatch(ctx).await);
    }

    #[tokio::test]
    async fn test_close_hook_unbinds_only_that_connection() {
        let game = game();
        let (ctx, _stream) = request(LOGIN_IN, 42, &[]);
        game.world.get_or_create_session(42);
        game.world.register_connection(42, ctx.connection.clone());

        let hook = close_hook(&game);
        let (other, _other_stream) = request(LOGIN_IN, 43, &[]);
        hook(&other.connection);
        assert!(game.world.connection(42).is_some());

        hook(&ctx.connection);
        assert!(game.world.connection(42).is_none());
    }
}
