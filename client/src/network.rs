use crate::game::ClientGame;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{
    BoxError, GameModeCatalog, GameObserver, GameState, Packet, StateBroadcast, MAX_PACKET_SIZE,
    PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep, MissedTickBehavior};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Local address to bind, port 0 picks a free one
    pub bind_addr: String,
    pub tick_duration: Duration,
    /// Keeps the connection alive; also retries `Connect` until answered
    pub heartbeat_interval: Duration,
    /// Simulated latency, half applied on send and half on receive
    pub fake_ping_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:0".to_string(),
            tick_duration: Duration::from_secs_f64(1.0 / 30.0),
            heartbeat_interval: Duration::from_secs(1),
            fake_ping_ms: 0,
        }
    }
}

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    client_id: Option<u32>,
    connected: bool,

    game: ClientGame,
    config: ClientConfig,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        config: ClientConfig,
        catalog: GameModeCatalog,
    ) -> Result<Self, BoxError> {
        let socket = UdpSocket::bind(&config.bind_addr).await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            client_id: None,
            connected: false,
            game: ClientGame::new(catalog),
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, BoxError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn client_id(&self) -> Option<u32> {
        self.client_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn game(&self) -> &ClientGame {
        &self.game
    }

    pub fn add_observer(&mut self, observer: Box<dyn GameObserver>) {
        self.game.add_observer(observer);
    }

    async fn connect(&mut self) -> Result<(), BoxError> {
        info!("Connecting to server at {}...", self.server_addr);

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), BoxError> {
        if self.config.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.config.fake_ping_ms / 2)).await;
        }

        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    /// Handles one packet from the server. Returns false once the server
    /// closed the connection.
    async fn handle_packet(&mut self, packet: Packet) -> Result<bool, BoxError> {
        match packet {
            Packet::Connected { client_id } => {
                info!("Connected! Client ID: {}", client_id);
                self.client_id = Some(client_id);
                self.connected = true;
            }

            Packet::GameState {
                epoch,
                game_mode,
                state,
                completed,
            } => {
                let broadcast = StateBroadcast {
                    epoch,
                    game_mode,
                    state,
                    completed,
                };

                match self.game.apply_server_state(&broadcast) {
                    Ok(Some(confirm)) => {
                        if let Err(e) = self.send_packet(&confirm).await {
                            error!("Error sending confirmation: {}", e);
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        error!("Cannot follow server game {}: {}", epoch, err);
                        return Err(err.into());
                    }
                }
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.client_id = None;
                return Ok(false);
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }

        Ok(true)
    }

    /// Tells the server we are leaving.
    pub async fn disconnect(&mut self) {
        if self.connected {
            if let Err(e) = self.send_packet(&Packet::Disconnect).await {
                debug!("Error sending disconnect: {}", e);
            }
            self.connected = false;
        }
        self.game.exit();
    }

    /// Runs until the server disconnects us.
    ///
    /// Fails when the server runs a game mode this client does not know.
    pub async fn run(&mut self) -> Result<(), BoxError> {
        self.connect().await?;

        let mut tick_interval = interval(self.config.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut heartbeat_interval = interval(self.config.heartbeat_interval);
        heartbeat_interval.tick().await;

        let mut buffer = [0u8; MAX_PACKET_SIZE];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, from)) => {
                            if from != self.server_addr {
                                debug!("Ignoring packet from {}", from);
                                continue;
                            }

                            if self.config.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.config.fake_ping_ms / 2)).await;
                            }

                            if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                                if !self.handle_packet(packet).await? {
                                    break;
                                }
                            } else {
                                warn!("Failed to deserialize packet from server");
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = tick_interval.tick() => {
                    self.game.execute();
                },

                _ = heartbeat_interval.tick() => {
                    let result = if self.connected {
                        self.send_packet(&Packet::Heartbeat).await
                    } else {
                        self.connect().await
                    };
                    if let Err(e) = result {
                        error!("Error sending heartbeat: {}", e);
                    }
                },
            }
        }

        self.game.exit();
        Ok(())
    }

    /// Current lifecycle state of the local game.
    pub fn state(&self) -> GameState {
        self.game.state()
    }
}
