use std::collections::HashMap;

use futures_util::future;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::{sync::mpsc, time};

use crate::{
    event_writer::EventWriter,
    game_logic,
    game_state::GameState,
    id::Id,
    line::{span, Color, Line},
    persistence::PersistenceHandle,
    player::Player,
    tick::TICK_INTERVAL,
};

#[derive(Debug)]
pub enum Message {
    PlayerConnected {
        player: Player,
        connection: mpsc::Sender<PlayerEvent>,
    },
    PlayerDisconnected {
        player_id: Id<Player>,
    },
    PlayerCommand {
        player_id: Id<Player>,
        command: String,
    },
    Tick,
}

#[derive(Serialize, Debug)]
pub struct PlayerEvent {
    lines: Vec<Line>,
}

pub async fn run(
    mut messages: mpsc::Receiver<Message>,
    self_sender: mpsc::Sender<Message>,
    mut game_state: GameState,
    persistence: PersistenceHandle,
) {
    use Message::*;

    tokio::spawn(async move {
        let mut interval = time::interval(TICK_INTERVAL);
        loop {
            interval.tick().await;
            if self_sender.send(Tick).await.is_err() {
                break;
            }
        }
    });

    let mut connections: HashMap<Id<Player>, mpsc::Sender<PlayerEvent>> = HashMap::new();
    let mut event_writer = EventWriter::new();

    game_logic::initialize(&mut game_state);

    debug!("Server loop starting");
    while let Some(message) = messages.recv().await {
        match message {
            PlayerConnected { player, connection } => {
                let player_id = player.id;
                let name = player.name.clone();
                if game_logic::on_player_connect(player, &mut event_writer, &mut game_state) {
                    info!("{} connected", name);
                    connections.insert(player_id, connection);
                } else {
                    info!("Refused a second connection for {}", name);
                    let line = span("That name is already in use.").color(Color::Red).line();
                    if connection.send(PlayerEvent { lines: vec![line] }).await.is_err() {
                        debug!("Refused connection for {} already closed", name);
                    }
                }
            }
            PlayerDisconnected { player_id } => {
                connections.remove(&player_id);
                if let Some(player) =
                    game_logic::on_player_disconnect(player_id, &mut event_writer, &mut game_state)
                {
                    info!("{} disconnected", player.name);
                    persistence.save(player.to_record());
                }
            }
            PlayerCommand { player_id, command } => {
                if let Err(err) =
                    game_logic::on_command(player_id, &command, &mut event_writer, &mut game_state)
                {
                    warn!("Player command: {}", err);
                }
            }
            Tick => {
                game_logic::on_tick(&mut event_writer, &mut game_state);
            }
        }
        save_dirty_players(&mut game_state, &persistence);
        send_player_events(&connections, &mut event_writer).await;
    }
}

fn save_dirty_players(game_state: &mut GameState, persistence: &PersistenceHandle) {
    for player_id in game_state.players.take_dirty() {
        if let Some(player) = game_state.players.get(&player_id) {
            persistence.save(player.to_record());
        }
    }
}

async fn send_player_events(
    connections: &HashMap<Id<Player>, mpsc::Sender<PlayerEvent>>,
    event_writer: &mut EventWriter,
) {
    let results = future::join_all(event_writer.lines.drain().filter_map(|(player_id, lines)| {
        connections.get(&player_id).map(|connection| connection.send(PlayerEvent { lines }))
    }))
    .await;
    for result in results {
        if let Err(err) = result {
            warn!("Dropped output for a closed connection: {}", err);
        }
    }
}
