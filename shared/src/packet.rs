use crate::replication::StateBroadcast;
use crate::state::GameState;
use serde::{Deserialize, Serialize};

/// Version clients must announce in `Connect`.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest datagram either side expects to receive.
pub const MAX_PACKET_SIZE: usize = 2048;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Heartbeat,
    ConfirmGameState {
        epoch: u32,
        state: GameState,
    },
    Disconnect,

    Connected {
        client_id: u32,
    },
    GameState {
        epoch: u32,
        game_mode: String,
        state: GameState,
        completed: bool,
    },
    Disconnected {
        reason: String,
    },
}

impl From<StateBroadcast> for Packet {
    fn from(broadcast: StateBroadcast) -> Self {
        Packet::GameState {
            epoch: broadcast.epoch,
            game_mode: broadcast.game_mode,
            state: broadcast.state,
            completed: broadcast.completed,
        }
    }
}
