mod ability;
mod aggression;
mod combat_error;
mod combat_roll;
mod combat_session;
mod combat_system;
mod combatant;
mod config;
mod energy;
mod event_writer;
mod game_alias;
mod game_combat;
mod game_help;
mod game_logic;
mod game_room;
mod game_state;
mod id;
mod line;
mod mob;
mod mob_coll;
mod named;
mod persistence;
mod player;
mod player_coll;
mod rewards;
mod round_scheduler;
mod server_actor;
mod server_websocket;
#[cfg(test)]
mod test_support;
mod text_util;
mod tick;

use std::{path::Path, process};

use config::ServerConfig;
use game_state::{GameState, LoadedGameState};
use id::Id;
use log::{error, info};
use persistence::{PersistenceHandle, PlayerStore};
use server_websocket::{handle_connection, ConnectQuery, ConnectionContext};
use tokio::sync::mpsc;
use warp::Filter;

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match ServerConfig::load(Path::new("data/config.yaml")) {
        Ok(config) => config,
        Err(err) => {
            error!("Bad config: {}", err);
            process::exit(1);
        }
    };

    let loaded_game_state = match LoadedGameState::load(&config.data_dir) {
        Ok(loaded) => loaded,
        Err(err) => {
            error!("Could not load world data: {}", err);
            process::exit(1);
        }
    };
    if let Err(err) = loaded_game_state.validate(Id::new(config.combat.start_room)) {
        error!("Invalid world data: {}", err);
        process::exit(1);
    }
    let game_state = GameState::new(loaded_game_state, config.clone());

    let persistence = PersistenceHandle::spawn(PlayerStore::new(&config.data_dir));
    let context =
        ConnectionContext { persistence: persistence.clone(), start_room: game_state.start_room() };

    let (actor_sender, actor_receiver) = mpsc::channel::<server_actor::Message>(4096);
    let self_sender = actor_sender.clone();
    tokio::spawn(async move {
        server_actor::run(actor_receiver, self_sender, game_state, persistence).await
    });

    let routes = warp::path!("api" / "ws")
        .and(warp::query::<ConnectQuery>())
        .and(warp::ws())
        .map(move |query: ConnectQuery, ws: warp::ws::Ws| {
            let message_sender = actor_sender.clone();
            let context = context.clone();
            ws.on_upgrade(|websocket| handle_connection(websocket, query, context, message_sender))
        });

    info!("Listening on port {}", config.port);
    warp::serve(routes).run(([127, 0, 0, 1], config.port)).await;
}
