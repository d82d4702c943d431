use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket};

use crate::{
    game_state::Room,
    id::Id,
    persistence::PersistenceHandle,
    player::Player,
    server_actor,
};

static NEXT_PLAYER_ID: AtomicU64 = AtomicU64::new(0);

static VALID_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]{1,15}$").expect("name pattern compiles"));

#[derive(Deserialize, Debug)]
pub struct ConnectQuery {
    name: String,
}

/// Where a brand-new character starts, and where saved ones come back from.
#[derive(Clone, Debug)]
pub struct ConnectionContext {
    pub persistence: PersistenceHandle,
    pub start_room: Id<Room>,
}

pub fn is_valid_name(name: &str) -> bool {
    VALID_NAME.is_match(name)
}

pub async fn handle_connection(
    ws: WebSocket,
    connect_query: ConnectQuery,
    context: ConnectionContext,
    actor_sender: mpsc::Sender<server_actor::Message>,
) {
    debug!("New connection");
    let (mut sink, mut stream) = ws.split();

    if !is_valid_name(&connect_query.name) {
        debug!("Rejected name {:?}", connect_query.name);
        let _ = sink.send(Message::close_with(4000u16, "invalid name")).await;
        return;
    }

    let player_id = Id::new(NEXT_PLAYER_ID.fetch_add(1, Ordering::SeqCst));
    let player = match context.persistence.load(&connect_query.name).await {
        Ok(Some(record)) => Player::from_record(player_id, record),
        Ok(None) => Player::new(player_id, connect_query.name.clone(), context.start_room),
        Err(err) => {
            warn!("Loading {}: {}", connect_query.name, err);
            let _ = sink.send(Message::close_with(1011u16, "could not load character")).await;
            return;
        }
    };

    let (event_sender, mut event_receiver) = mpsc::channel::<server_actor::PlayerEvent>(64);
    tokio::spawn(async move {
        while let Some(event) = event_receiver.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!("Serializing player event: {}", err);
                    continue;
                }
            };
            if sink.send(Message::text(json)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
        debug!("Sender closed");
    });

    let connected = server_actor::Message::PlayerConnected { player, connection: event_sender };
    if actor_sender.send(connected).await.is_err() {
        warn!("Game loop is gone");
        return;
    }

    while let Some(Ok(message)) = stream.next().await {
        if message.is_close() {
            break;
        }
        if let Ok(text) = message.to_str() {
            let command = server_actor::Message::PlayerCommand { player_id, command: text.to_string() };
            if actor_sender.send(command).await.is_err() {
                break;
            }
        }
    }
    if actor_sender.send(server_actor::Message::PlayerDisconnected { player_id }).await.is_err() {
        warn!("Game loop is gone");
    }
    debug!("Receiver closed");
}
