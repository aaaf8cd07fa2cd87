//! Server network layer handling UDP communications and game loop coordination

use crate::client_manager::{ClientManager, DEFAULT_CLIENT_TIMEOUT};
use crate::game::{GameManager, LifecyclePolicy};
use crate::host::HostReadiness;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{
    BoxError, ConfirmOutcome, GameModeCatalog, GameObserver, GameState, Packet, SandboxMode,
    ServerReplicator, MAX_PACKET_SIZE, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Runtime settings of a [`Server`]
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tick_duration: Duration,
    pub max_clients: usize,
    /// Silence after which a client is dropped
    pub client_timeout: Duration,
    /// How often unconfirmed state is sent again
    pub resend_interval: Duration,
    /// Mode the first game runs; no game is created when unset
    pub starting_mode: Option<String>,
    pub policy: LifecyclePolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_secs_f64(1.0 / 30.0),
            max_clients: 16,
            client_timeout: DEFAULT_CLIENT_TIMEOUT,
            resend_interval: Duration::from_millis(250),
            starting_mode: Some(SandboxMode::NAME.to_string()),
            policy: LifecyclePolicy::default(),
        }
    }
}

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: u32,
    },
    /// Start-up finished, create the first game
    Initialize,
    Shutdown,
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    BroadcastPacket { packet: Packet },
}

/// Main server coordinating networking, the game and its replication
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    games: GameManager,
    replicator: ServerReplicator,
    config: ServerConfig,
    readiness: HostReadiness,
    /// Address of the in-process client when running as a host
    host_client: Option<SocketAddr>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        config: ServerConfig,
        catalog: GameModeCatalog,
    ) -> Result<Self, BoxError> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        let clients = ClientManager::new(config.max_clients, config.client_timeout);
        let games = GameManager::new(catalog, config.starting_mode.clone(), config.policy);

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(clients)),
            games,
            replicator: ServerReplicator::new(),
            config,
            readiness: HostReadiness::dedicated(),
            host_client: None,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, BoxError> {
        Ok(self.socket.local_addr()?)
    }

    /// Holds back game initialization until a client connects from `addr`.
    pub fn with_host_client(mut self, addr: SocketAddr) -> Self {
        self.host_client = Some(addr);
        self.readiness = HostReadiness::host();
        self
    }

    pub fn add_observer(&mut self, observer: Box<dyn GameObserver>) {
        self.games.add_observer(observer);
    }

    /// Sender that can stop a running server with [`ServerMessage::Shutdown`].
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    pub fn games(&self) -> &GameManager {
        &self.games
    }

    pub fn replicator(&self) -> &ServerReplicator {
        &self.replicator
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    /// Spawns task that asks the main loop to initialize once start-up is done
    fn spawn_initializer(&self) {
        let readiness = self.readiness.clone();
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            readiness.wait().await;
            if let Err(e) = server_tx.send(ServerMessage::Initialize) {
                error!("Failed to send initialize message: {}", e);
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), BoxError> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet) {
        if let Err(e) = self.game_tx.send(GameMessage::BroadcastPacket { packet }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Handles one message for the main loop. Returns false once the server should stop.
    async fn handle_message(&mut self, message: Option<ServerMessage>) -> Result<bool, BoxError> {
        match message {
            Some(ServerMessage::PacketReceived { packet, addr }) => {
                self.handle_packet(packet, addr).await;
            }
            Some(ServerMessage::ClientTimeout { client_id }) => {
                let live = self.clients.read().await.len();
                self.on_client_removed(client_id, live);
            }
            Some(ServerMessage::Initialize) => {
                if let Err(err) = self.games.initialize() {
                    error!("Failed to initialize game: {}", err);
                    return Err(err.into());
                }
                self.flush_state_changes();
            }
            Some(ServerMessage::Shutdown) | None => {
                info!("Server shutting down");
                self.games.shutdown();
                self.flush_state_changes();
                self.broadcast_packet(Packet::Disconnected {
                    reason: "Server shutting down".to_string(),
                });
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Processes incoming packets and feeds them to replication
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        let client_id = self.clients.write().await.touch_by_addr(addr);

        match packet {
            Packet::Connect { client_version } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    warn!(
                        "Rejecting {}: protocol version {} but server speaks {}",
                        addr, client_version, PROTOCOL_VERSION
                    );
                    self.send_packet(
                        Packet::Disconnected {
                            reason: "Protocol version mismatch".to_string(),
                        },
                        addr,
                    );
                    return;
                }

                // A repeated Connect means our answer was lost; keep the id
                // and its confirmations
                if let Some(existing_id) = client_id {
                    debug!("Client {} at {} connected again", existing_id, addr);
                    self.send_packet(Packet::Connected { client_id: existing_id }, addr);
                    if let Some(state) = self.replicator.retained().cloned() {
                        self.send_packet(Packet::from(state), addr);
                    }
                    return;
                }

                let new_client_id = self.clients.write().await.add_client(addr);

                match new_client_id {
                    Some(new_client_id) => {
                        self.send_packet(Packet::Connected { client_id: new_client_id }, addr);
                        if let Some(state) = self.replicator.on_connect(new_client_id) {
                            self.send_packet(state, addr);
                        }

                        if self.host_client == Some(addr) {
                            debug!("Host client connected as {}", new_client_id);
                            self.readiness.mark_client_started();
                        }
                    }
                    None => {
                        self.send_packet(
                            Packet::Disconnected {
                                reason: "Server full".to_string(),
                            },
                            addr,
                        );
                    }
                }
            }

            Packet::Heartbeat => {
                if client_id.is_none() {
                    debug!("Heartbeat from unknown address {}", addr);
                    self.reject_unknown(addr);
                }
            }

            Packet::ConfirmGameState { epoch, state } => {
                let Some(client_id) = client_id else {
                    debug!("Dropping confirmation from unknown address {}", addr);
                    self.reject_unknown(addr);
                    return;
                };

                let live = self.clients.read().await.len();
                match self
                    .replicator
                    .on_client_confirm(client_id, epoch, state, live)
                {
                    ConfirmOutcome::QuorumReached(state) => self.on_quorum(state),
                    ConfirmOutcome::Recorded | ConfirmOutcome::Dropped(_) => {}
                }
            }

            Packet::Disconnect => {
                if let Some(client_id) = client_id {
                    let live = {
                        let mut clients = self.clients.write().await;
                        clients.remove_client(&client_id);
                        clients.len()
                    };
                    self.on_client_removed(client_id, live);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Tells a sender we do not know, usually one evicted by timeout, that it
    /// is no longer connected.
    fn reject_unknown(&self, addr: SocketAddr) {
        self.send_packet(
            Packet::Disconnected {
                reason: "Not connected".to_string(),
            },
            addr,
        );
    }

    /// Forgets a client that is gone. The others may now agree on a state.
    fn on_client_removed(&mut self, client_id: u32, live: usize) {
        if let Some(state) = self.replicator.on_disconnect(client_id, live) {
            self.on_quorum(state);
        }
    }

    fn on_quorum(&mut self, state: GameState) {
        self.games.on_quorum_confirmed(state);
        self.flush_state_changes();
    }

    /// Broadcasts every state change the game made since the last flush.
    fn flush_state_changes(&mut self) {
        for change in self.games.take_state_changes() {
            let packet = self.replicator.on_local_state_changed(change);
            self.broadcast_packet(packet);
        }
    }

    /// Sends the current state again to clients that have not confirmed it.
    async fn resend_unconfirmed(&mut self) {
        let Some((packet, lagging)) = self.replicator.resend_targets() else {
            return;
        };

        let addrs: Vec<SocketAddr> = {
            let clients = self.clients.read().await;
            lagging
                .iter()
                .filter_map(|client_id| clients.get_client_addr(*client_id))
                .collect()
        };

        debug!("Resending state to {} clients", addrs.len());
        for addr in addrs {
            self.send_packet(packet.clone(), addr);
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), BoxError> {
        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();
        self.spawn_initializer();

        let mut tick_interval = interval(self.config.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut resend_interval = interval(self.config.resend_interval);
        resend_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");
        self.readiness.mark_server_started();

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    if !self.handle_message(message).await? {
                        break;
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    self.games.execute();
                    self.flush_state_changes();
                },

                _ = resend_interval.tick() => {
                    self.resend_unconfirmed().await;
                },
            }
        }

        Ok(())
    }
}
