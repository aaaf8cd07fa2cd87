//! Integration tests for the replicated game lifecycle
//!
//! These tests validate cross-component interactions and real network behavior.

use bincode::{deserialize, serialize};
use client::game::ClientGame;
use client::network::{Client, ClientConfig};
use server::game::{GameManager, LifecyclePolicy};
use server::network::{Server, ServerConfig, ServerMessage};
use shared::{
    ConfirmOutcome, GameModeCatalog, GameObserver, GameSnapshot, GameState, Packet, SandboxMode,
    ServerReplicator, StateBroadcast, TimedMode, MAX_PACKET_SIZE, PROTOCOL_VERSION,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::sleep;

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Tests packet serialization round-trip for every packet the protocol uses
    #[test]
    fn packet_serialization_roundtrip() {
        let test_packets = vec![
            Packet::Connect {
                client_version: PROTOCOL_VERSION,
            },
            Packet::Heartbeat,
            Packet::ConfirmGameState {
                epoch: 3,
                state: GameState::Stopped,
            },
            Packet::Disconnect,
            Packet::Connected { client_id: 42 },
            Packet::GameState {
                epoch: 3,
                game_mode: TimedMode::NAME.to_string(),
                state: GameState::Active,
                completed: false,
            },
            Packet::Disconnected {
                reason: "Test".to_string(),
            },
        ];

        for packet in test_packets {
            let serialized = serialize(&packet).unwrap();
            assert!(serialized.len() <= MAX_PACKET_SIZE);
            let deserialized: Packet = deserialize(&serialized).unwrap();
            assert_eq!(packet, deserialized);
        }
    }

    /// Tests malformed packet handling
    #[test]
    fn malformed_packet_handling() {
        let valid_packet = Packet::GameState {
            epoch: 1,
            game_mode: SandboxMode::NAME.to_string(),
            state: GameState::Ready,
            completed: false,
        };
        let valid_data = serialize(&valid_packet).unwrap();

        // Test truncated packet
        let truncated_data = &valid_data[..valid_data.len() / 2];
        let result: Result<Packet, _> = deserialize(truncated_data);
        assert!(
            result.is_err(),
            "Should fail to deserialize truncated packet"
        );

        // Test unknown packet tag
        let mut corrupted_data = valid_data.clone();
        corrupted_data[0] = 0xFF;
        let result: Result<Packet, _> = deserialize(&corrupted_data);
        assert!(
            result.is_err(),
            "Should fail to deserialize corrupted packet"
        );

        // Test empty packet
        let empty_data = vec![];
        let result: Result<Packet, _> = deserialize(&empty_data);
        assert!(result.is_err(), "Should fail to deserialize empty packet");
    }
}

/// IN-MEMORY REPLICATION TESTS
///
/// A server-side manager and replicator wired to client games without sockets.
mod replication_tests {
    use super::*;

    struct Harness {
        manager: GameManager,
        replicator: ServerReplicator,
        clients: Vec<(u32, ClientGame)>,
        quorums: Vec<GameState>,
    }

    impl Harness {
        fn new(policy: LifecyclePolicy, client_ids: &[u32]) -> Self {
            let mut harness = Self {
                manager: GameManager::new(
                    GameModeCatalog::with_builtin_modes(3),
                    Some(SandboxMode::NAME.to_string()),
                    policy,
                ),
                replicator: ServerReplicator::new(),
                clients: Vec::new(),
                quorums: Vec::new(),
            };
            for id in client_ids {
                harness.join(*id);
            }
            harness
        }

        fn join(&mut self, id: u32) {
            let mut game = ClientGame::new(GameModeCatalog::with_builtin_modes(3));
            let confirm = self
                .replicator
                .on_connect(id)
                .and_then(|packet| game.apply_server_state(&broadcast_of(&packet)).unwrap());

            self.clients.push((id, game));
            if let Some(confirm) = confirm {
                self.deliver_confirm(id, confirm);
            }
        }

        fn leave(&mut self, id: u32) {
            self.clients.retain(|(client_id, _)| *client_id != id);
            let live = self.clients.len();
            if let Some(state) = self.replicator.on_disconnect(id, live) {
                self.quorum(state);
            }
        }

        fn client(&self, id: u32) -> &ClientGame {
            &self.clients.iter().find(|(client_id, _)| *client_id == id).unwrap().1
        }

        fn deliver_confirm(&mut self, id: u32, confirm: Packet) {
            let (epoch, state) = match confirm {
                Packet::ConfirmGameState { epoch, state } => (epoch, state),
                other => panic!("Unexpected confirmation {:?}", other),
            };
            let live = self.clients.len();
            if let ConfirmOutcome::QuorumReached(state) =
                self.replicator.on_client_confirm(id, epoch, state, live)
            {
                self.quorum(state);
            }
        }

        fn quorum(&mut self, state: GameState) {
            self.quorums.push(state);
            self.manager.on_quorum_confirmed(state);
        }

        /// Broadcasts pending server changes to every client until nothing changes.
        fn pump(&mut self) {
            loop {
                let changes = self.manager.take_state_changes();
                if changes.is_empty() {
                    return;
                }

                for change in changes {
                    let packet = self.replicator.on_local_state_changed(change);
                    let broadcast = broadcast_of(&packet);

                    let mut confirms = Vec::new();
                    for (id, game) in &mut self.clients {
                        if let Some(confirm) = game.apply_server_state(&broadcast).unwrap() {
                            confirms.push((*id, confirm));
                        }
                    }
                    for (id, confirm) in confirms {
                        self.deliver_confirm(id, confirm);
                    }
                }
            }
        }
    }

    fn broadcast_of(packet: &Packet) -> StateBroadcast {
        match packet {
            Packet::GameState {
                epoch,
                game_mode,
                state,
                completed,
            } => StateBroadcast {
                epoch: *epoch,
                game_mode: game_mode.clone(),
                state: *state,
                completed: *completed,
            },
            other => panic!("Not a state packet: {:?}", other),
        }
    }

    fn manual() -> LifecyclePolicy {
        LifecyclePolicy {
            auto_begin: false,
            auto_reset: false,
        }
    }

    /// Ready quorum fires once; Active quorum only after both confirm Active
    #[test]
    fn quorum_per_broadcast_state() {
        let mut harness = Harness::new(manual(), &[1, 2]);
        harness.manager.initialize().unwrap();
        harness.pump();

        assert_eq!(harness.quorums, vec![GameState::Ready]);

        harness.manager.game_mut().unwrap().begin_game().unwrap();
        harness.pump();

        assert_eq!(harness.quorums, vec![GameState::Ready, GameState::Active]);
        assert_eq!(harness.client(1).state(), GameState::Active);
        assert_eq!(harness.client(2).state(), GameState::Active);
    }

    /// The default policy begins the game as soon as all clients are ready
    #[test]
    fn auto_begin_after_ready_quorum() {
        let mut harness = Harness::new(LifecyclePolicy::default(), &[1, 2, 3]);
        harness.manager.initialize().unwrap();
        harness.pump();

        assert_eq!(harness.manager.game().unwrap().state(), GameState::Active);
        for id in 1..=3 {
            assert_eq!(harness.client(id).state(), GameState::Active);
        }
    }

    /// Full cycle with a timed round: complete, reset and begin again
    #[test]
    fn timed_round_cycles_with_auto_reset() {
        let policy = LifecyclePolicy {
            auto_begin: true,
            auto_reset: true,
        };
        let mut harness = Harness::new(policy, &[1, 2]);
        harness.manager.initialize().unwrap();
        harness.manager.reboot_with(TimedMode::NAME).unwrap();
        harness.pump();
        assert_eq!(harness.manager.game().unwrap().state(), GameState::Active);

        for _ in 0..3 {
            harness.manager.execute();
        }
        harness.pump();

        assert_eq!(
            harness.quorums,
            vec![
                GameState::Ready,
                GameState::Active,
                GameState::Stopped,
                GameState::Ready,
                GameState::Active
            ]
        );
        let game = harness.manager.game().unwrap();
        assert_eq!(game.state(), GameState::Active);
        assert!(!game.completed());
    }

    /// A late joiner blocks quorum until it confirms
    #[test]
    fn late_joiner_catches_up_from_retained_state() {
        let mut harness = Harness::new(LifecyclePolicy::default(), &[1, 2]);
        harness.manager.initialize().unwrap();
        harness.pump();
        assert_eq!(harness.quorums, vec![GameState::Ready, GameState::Active]);

        harness.join(3);

        assert_eq!(harness.client(3).state(), GameState::Active);
        assert_eq!(harness.replicator.roster().get(3), Some(GameState::Active));
        assert_eq!(
            harness.quorums,
            vec![GameState::Ready, GameState::Active, GameState::Active]
        );
    }

    /// A client that leaves without confirming no longer blocks the others
    #[test]
    fn disconnect_unblocks_quorum() {
        let mut harness = Harness::new(manual(), &[1, 2]);
        harness.manager.initialize().unwrap();
        harness.pump();
        harness.manager.game_mut().unwrap().begin_game().unwrap();

        let changes = harness.manager.take_state_changes();
        let packet = harness
            .replicator
            .on_local_state_changed(changes[0].clone());
        let confirm = harness.clients[0]
            .1
            .apply_server_state(&broadcast_of(&packet))
            .unwrap()
            .unwrap();
        harness.deliver_confirm(1, confirm);
        assert_eq!(harness.quorums, vec![GameState::Ready]);

        harness.leave(2);

        assert_eq!(harness.quorums, vec![GameState::Ready, GameState::Active]);
    }

    /// Confirmations for a torn down game never count for the new one
    #[test]
    fn reboot_discards_old_confirmations() {
        let mut harness = Harness::new(manual(), &[1, 2]);
        harness.manager.initialize().unwrap();
        harness.pump();
        assert_eq!(harness.quorums, vec![GameState::Ready]);

        harness.manager.reboot_with(TimedMode::NAME).unwrap();
        let changes = harness.manager.take_state_changes();
        assert_eq!(changes.len(), 1);
        harness.replicator.on_local_state_changed(changes[0].clone());

        let outcome = harness
            .replicator
            .on_client_confirm(1, 1, GameState::Ready, 2);
        assert!(matches!(outcome, ConfirmOutcome::Dropped(_)));
        assert_eq!(harness.replicator.roster().get(1), Some(GameState::None));
    }
}

/// CLIENT-SERVER INTEGRATION TESTS
mod client_server_tests {
    use super::*;

    type Events = Arc<Mutex<Vec<String>>>;

    struct EventLog(Events);

    impl GameObserver for EventLog {
        fn on_begin(&mut self, game: &GameSnapshot<'_>) {
            self.0.lock().unwrap().push(format!("begin:{}", game.epoch));
        }
        fn on_complete(&mut self, game: &GameSnapshot<'_>) {
            self.0.lock().unwrap().push(format!("complete:{}", game.epoch));
        }
        fn on_reset(&mut self, game: &GameSnapshot<'_>) {
            self.0.lock().unwrap().push(format!("reset:{}", game.epoch));
        }
    }

    fn count(events: &Events, prefix: &str) -> usize {
        events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.starts_with(prefix))
            .count()
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..300 {
            if condition() {
                return true;
            }
            sleep(Duration::from_millis(10)).await;
        }
        false
    }

    fn fast_server_config() -> ServerConfig {
        ServerConfig {
            tick_duration: Duration::from_millis(10),
            resend_interval: Duration::from_millis(50),
            ..ServerConfig::default()
        }
    }

    fn fast_client_config() -> ClientConfig {
        ClientConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            tick_duration: Duration::from_millis(10),
            heartbeat_interval: Duration::from_millis(100),
            fake_ping_ms: 0,
        }
    }

    async fn recv_packet(socket: &UdpSocket) -> Packet {
        let mut buffer = [0u8; MAX_PACKET_SIZE];
        let (len, _) =
            tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buffer))
                .await
                .expect("no packet from server")
                .unwrap();
        deserialize(&buffer[..len]).unwrap()
    }

    /// A raw UDP peer walks through connect, confirm and the resulting begin
    #[tokio::test]
    async fn raw_socket_confirms_ready_and_sees_active() {
        let mut server = Server::new(
            "127.0.0.1:0",
            fast_server_config(),
            GameModeCatalog::with_builtin_modes(100),
        )
        .await
        .unwrap();
        let server_addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let server_task =
            tokio::spawn(async move { server.run().await.map_err(|e| e.to_string()) });

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let connect = serialize(&Packet::Connect {
            client_version: PROTOCOL_VERSION,
        })
        .unwrap();
        socket.send_to(&connect, server_addr).await.unwrap();

        assert_eq!(recv_packet(&socket).await, Packet::Connected { client_id: 1 });

        let epoch = loop {
            match recv_packet(&socket).await {
                Packet::GameState {
                    epoch,
                    state: GameState::Ready,
                    ..
                } => break epoch,
                other => panic!("Unexpected packet {:?}", other),
            }
        };

        let confirm = serialize(&Packet::ConfirmGameState {
            epoch,
            state: GameState::Ready,
        })
        .unwrap();
        socket.send_to(&confirm, server_addr).await.unwrap();

        // Resends of Ready may still be in flight
        loop {
            match recv_packet(&socket).await {
                Packet::GameState {
                    state: GameState::Active,
                    epoch: active_epoch,
                    ..
                } => {
                    assert_eq!(active_epoch, epoch);
                    break;
                }
                Packet::GameState {
                    state: GameState::Ready,
                    ..
                } => continue,
                other => panic!("Unexpected packet {:?}", other),
            }
        }

        shutdown.send(ServerMessage::Shutdown).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(2), server_task)
            .await
            .expect("server did not stop")
            .unwrap();
        assert!(result.is_ok());
    }

    /// Two clients follow a timed game through several rounds
    #[tokio::test]
    async fn clients_follow_timed_rounds() {
        let config = ServerConfig {
            starting_mode: Some(TimedMode::NAME.to_string()),
            policy: LifecyclePolicy {
                auto_begin: true,
                auto_reset: true,
            },
            ..fast_server_config()
        };
        let mut server = Server::new("127.0.0.1:0", config, GameModeCatalog::with_builtin_modes(5))
            .await
            .unwrap();
        let server_addr = server.local_addr().unwrap().to_string();
        let shutdown = server.shutdown_handle();
        let server_task =
            tokio::spawn(async move { server.run().await.map_err(|e| e.to_string()) });

        let mut logs = Vec::new();
        for _ in 0..2 {
            let events = Events::default();
            let mut client = Client::new(
                &server_addr,
                fast_client_config(),
                GameModeCatalog::with_builtin_modes(5),
            )
            .await
            .unwrap();
            client.add_observer(Box::new(EventLog(events.clone())));
            tokio::spawn(async move { client.run().await.map_err(|e| e.to_string()) });
            logs.push(events);
        }

        let cycled = wait_until(|| {
            logs.iter()
                .all(|events| count(events, "begin") >= 2 && count(events, "reset") >= 1)
        })
        .await;
        assert!(cycled, "clients did not see a full round: {:?}", logs);

        shutdown.send(ServerMessage::Shutdown).unwrap();
        let _ = tokio::time::timeout(Duration::from_secs(2), server_task).await;
    }

    /// The host's own client gates initialization and follows the game
    #[tokio::test]
    async fn host_client_is_waited_for() {
        let server = Server::new(
            "127.0.0.1:0",
            fast_server_config(),
            GameModeCatalog::with_builtin_modes(100),
        )
        .await
        .unwrap();
        let server_addr = server.local_addr().unwrap().to_string();

        let events = Events::default();
        let mut client = Client::new(
            &server_addr,
            fast_client_config(),
            GameModeCatalog::with_builtin_modes(100),
        )
        .await
        .unwrap();
        client.add_observer(Box::new(EventLog(events.clone())));

        let mut server = server.with_host_client(client.local_addr().unwrap());
        let shutdown = server.shutdown_handle();
        let server_task =
            tokio::spawn(async move { server.run().await.map_err(|e| e.to_string()) });

        sleep(Duration::from_millis(50)).await;
        assert_eq!(count(&events, "begin"), 0);

        tokio::spawn(async move { client.run().await.map_err(|e| e.to_string()) });

        assert!(wait_until(|| count(&events, "begin:1") == 1).await);

        shutdown.send(ServerMessage::Shutdown).unwrap();
        let _ = tokio::time::timeout(Duration::from_secs(2), server_task).await;
    }

    /// A client speaking another protocol version is turned away
    #[tokio::test]
    async fn protocol_mismatch_is_rejected() {
        let mut server = Server::new(
            "127.0.0.1:0",
            fast_server_config(),
            GameModeCatalog::with_builtin_modes(100),
        )
        .await
        .unwrap();
        let server_addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let server_task =
            tokio::spawn(async move { server.run().await.map_err(|e| e.to_string()) });

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let connect = serialize(&Packet::Connect {
            client_version: PROTOCOL_VERSION + 1,
        })
        .unwrap();
        socket.send_to(&connect, server_addr).await.unwrap();

        assert!(matches!(
            recv_packet(&socket).await,
            Packet::Disconnected { .. }
        ));

        shutdown.send(ServerMessage::Shutdown).unwrap();
        let _ = tokio::time::timeout(Duration::from_secs(2), server_task).await;
    }
}
