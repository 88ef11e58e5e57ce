//! Seer game server
//!
//! Runs the gateway and login listeners, plus the Flash policy responder,
//! over one shared world state.

mod battle;
mod config;
mod gamedata;
mod handlers;
mod network;
mod persistence;
mod world;

use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::sync::watch;

use crate::config::ServerConfig;
use crate::gamedata::GameData;
use crate::handlers::{Game, Shared};
use crate::network::{run_policy_listener, CommandRegistry, ConnectionServer, ListenerOptions};
use crate::world::{Spawn, WorldState};

/// How often online players are flushed to the store
const SAVE_INTERVAL_SECS: u64 = 60;

#[tokio::main]
async fn main() {
    let path = ServerConfig::resolve_path(std::env::args().nth(1));
    let config = match ServerConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log.level.as_str())).init();
    info!("Starting Seer server with config {}", path.display());

    if let Err(e) = run(config).await {
        error!("Server failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: ServerConfig) -> Result<(), network::ServerError> {
    let data = Arc::new(GameData::load(&config.data));
    let persistence = persistence::init(&config).await;
    let spawn = Spawn {
        map_id: config.game.spawn_map,
        x: config.game.spawn_x,
        y: config.game.spawn_y,
    };
    let game: Shared = Arc::new(Game {
        world: Arc::new(WorldState::new(spawn)),
        data,
        persistence: persistence.clone(),
        config: config.game.clone(),
    });

    let gateway_registry = Arc::new(CommandRegistry::new());
    handlers::register_gateway(&gateway_registry, &game);
    let login_registry = Arc::new(CommandRegistry::new());
    handlers::register_login(&login_registry, &game);
    info!(
        "Registered {} gateway and {} login commands",
        gateway_registry.len(),
        login_registry.len()
    );

    let gateway = Arc::new(
        ConnectionServer::new(gateway_registry, ListenerOptions::gateway(&config.gateway))
            .with_close_hook(handlers::close_hook(&game)),
    );
    let login = Arc::new(ConnectionServer::new(login_registry, ListenerOptions::login()));

    let gateway_listener = ConnectionServer::bind(&config.gateway.address).await?;
    let login_listener = ConnectionServer::bind(&config.login.address).await?;
    let policy_listener = if config.login.policy_enabled {
        let addr = format!("0.0.0.0:{}", config.login.policy_port);
        match ConnectionServer::bind(&addr).await {
            Ok(listener) => Some(listener),
            Err(e) => {
                // Low ports need privileges; the login port answers policy requests too
                error!("Policy responder disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = vec![
        tokio::spawn(gateway.run(gateway_listener, shutdown_rx.clone())),
        tokio::spawn(login.run(login_listener, shutdown_rx.clone())),
        tokio::spawn(periodic_save(game.clone(), shutdown_rx.clone())),
    ];
    if let Some(listener) = policy_listener {
        tasks.push(tokio::spawn(run_policy_listener(listener, shutdown_rx.clone())));
    }

    info!("Server started successfully!");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
    }
    info!("Shutting down...");

    let _ = shutdown_tx.send(true);
    futures::future::join_all(tasks).await;
    save_online(&game);
    persistence.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

fn save_online(game: &Game) {
    let users = game.world.online_users();
    for &user_id in &users {
        game.save_player(user_id);
    }
    info!("Saved {} online players", users.len());
}

async fn periodic_save(game: Shared, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(Duration::from_secs(SAVE_INTERVAL_SECS));
    interval.tick().await;
    loop {
        tokio::select! {
            _ = interval.tick() => save_online(&game),
            _ = shutdown.changed() => break,
        }
    }
}
