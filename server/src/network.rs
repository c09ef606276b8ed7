//! Server network layer handling UDP communications and game loop coordination

use crate::client_manager::{ClientManager, CLIENT_TIMEOUT};
use crate::game::GameWorld;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{GameConfig, Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: u32, player_id: String },
    Shutdown,
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    BroadcastPacket { packet: Packet, exclude: Option<u32> },
}

/// Main server coordinating networking and game simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    world: GameWorld,
    tick_duration: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: Option<mpsc::UnboundedReceiver<GameMessage>>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_clients: usize,
        config: GameConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            world: GameWorld::new(config),
            tick_duration,
            server_tx,
            server_rx,
            game_tx,
            game_rx: Some(game_rx),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        Ok(self.socket.local_addr()?)
    }

    /// Handle for asking a running server to stop
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    pub fn world(&self) -> &GameWorld {
        &self.world
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; 65_536];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match deserialize::<Packet>(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping undecodable packet from {}: {}", addr, e),
                    },
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
        let mut game_rx = match self.game_rx.take() {
            Some(rx) => rx,
            None => return,
        };

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }

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
                    clients_guard.check_timeouts(CLIENT_TIMEOUT)
                };

                for client in timed_out {
                    info!("Client {} timed out", client.id);
                    let message = ServerMessage::ClientTimeout {
                        client_id: client.id,
                        player_id: client.player_id,
                    };
                    if let Err(e) = server_tx.send(message) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, exclude: Option<u32>) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { packet, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Processes incoming packets
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        let client_id = {
            let clients = self.clients.read().await;
            clients.find_client_by_addr(addr)
        };

        match packet {
            Packet::Connect {
                client_version,
                name,
            } => {
                info!(
                    "Client {} connecting from {} (version: {})",
                    name, addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    warn!(
                        "Client {} speaks protocol {}, expected {}",
                        addr, client_version, PROTOCOL_VERSION
                    );
                }

                if let Some(existing_id) = client_id {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    self.disconnect_client(existing_id).await;
                }

                if self.clients.read().await.is_full() {
                    let reason = "Server full".to_string();
                    self.send_packet(Packet::Disconnected { reason }, addr);
                    return;
                }

                let player_id = match self.world.spawn_player(&name) {
                    Some(player_id) => player_id,
                    None => {
                        let reason = "Could not spawn player".to_string();
                        self.send_packet(Packet::Disconnected { reason }, addr);
                        return;
                    }
                };

                let added = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr, &name, &player_id)
                };

                match added {
                    Some(client_id) => {
                        self.send_packet(
                            Packet::Connected {
                                client_id,
                                player_id,
                            },
                            addr,
                        );
                    }
                    None => {
                        self.world.remove_player(&player_id);
                        let reason = "Server full".to_string();
                        self.send_packet(Packet::Disconnected { reason }, addr);
                    }
                }
            }

            Packet::Action { action } => {
                if let Some(client_id) = client_id {
                    let mut clients = self.clients.write().await;
                    clients.add_action(client_id, action);
                } else {
                    debug!("Ignoring {} from unknown address {}", action.kind(), addr);
                }
            }

            Packet::Latency { timestamp } => {
                if let Some(client_id) = client_id {
                    self.clients.write().await.touch(client_id);
                }
                self.send_packet(Packet::Latency { timestamp }, addr);
            }

            Packet::Disconnect => {
                if let Some(client_id) = client_id {
                    self.disconnect_client(client_id).await;
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    async fn disconnect_client(&mut self, client_id: u32) {
        let removed = {
            let mut clients = self.clients.write().await;
            clients.remove_client(&client_id)
        };

        if let Some(client) = removed {
            self.world.remove_player(&client.player_id);
        }
    }

    /// Applies queued client actions and advances the world by `dt`
    async fn process_tick(&mut self, dt: Duration) {
        let actions = {
            let mut clients = self.clients.write().await;
            clients.take_pending_actions()
        };

        for (player_id, action) in &actions {
            self.world.apply_client_action(player_id, action);
        }

        let report = self.world.tick(dt);
        for id in &report.created {
            debug!("Entity {} entered the world", id);
        }
        for id in &report.destroyed {
            debug!("Entity {} left the world", id);
        }
    }

    /// Broadcasts the current snapshot to all connected clients
    async fn broadcast_snapshot(&mut self) {
        if self.clients.read().await.is_empty() {
            return;
        }

        let packet = self.world.next_snapshot_packet();
        self.broadcast_packet(packet, None);
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { player_id, .. }) => {
                            self.world.remove_player(&player_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick);
                    last_tick = now;

                    self.process_tick(dt).await;
                    self.broadcast_snapshot().await;

                    if self.world.tick % 60 == 0 {
                        let client_count = self.clients.read().await.len();
                        if client_count > 0 {
                            debug!(
                                "Tick {}: {} clients, {} players, {:.1}Hz",
                                self.world.tick,
                                client_count,
                                self.world.num_players(),
                                1.0 / dt.as_secs_f32().max(f32::EPSILON)
                            );
                        }
                    }
                },
            }
        }

        let reason = "Server shutting down".to_string();
        self.broadcast_packet(Packet::Disconnected { reason }, None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Action;
    use std::net::{IpAddr, Ipv4Addr};

    async fn create_test_server() -> Server {
        Server::new(
            "127.0.0.1:0",
            Duration::from_millis(16),
            2,
            GameConfig::default(),
        )
        .await
        .unwrap()
    }

    fn test_addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 40001)
    }

    fn connect(name: &str) -> Packet {
        Packet::Connect {
            client_version: PROTOCOL_VERSION,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_channel_communication() {
        let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

        let msg = ServerMessage::PacketReceived {
            packet: Packet::Latency { timestamp: 7 },
            addr: test_addr(),
        };
        assert!(tx.send(msg).is_ok());

        match rx.try_recv().unwrap() {
            ServerMessage::PacketReceived { packet, addr } => {
                assert_eq!(addr, test_addr());
                assert_eq!(packet, Packet::Latency { timestamp: 7 });
            }
            _ => panic!("Unexpected message type"),
        }
    }

    #[tokio::test]
    async fn test_connect_spawns_player_and_replies() {
        let mut server = create_test_server().await;
        let mut game_rx = server.game_rx.take().unwrap();

        server.handle_packet(connect("alice"), test_addr()).await;

        match game_rx.try_recv().unwrap() {
            GameMessage::SendPacket {
                packet: Packet::Connected { player_id, .. },
                addr,
            } => {
                assert_eq!(addr, test_addr());
                assert!(server.world().state().contains(&player_id));
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reconnect_replaces_player() {
        let mut server = create_test_server().await;
        let _game_rx = server.game_rx.take().unwrap();

        server.handle_packet(connect("alice"), test_addr()).await;
        server.handle_packet(connect("alice"), test_addr()).await;

        assert_eq!(server.clients.read().await.len(), 1);
        assert_eq!(server.world().state().len(), 4);
    }

    #[tokio::test]
    async fn test_server_full() {
        let mut server = create_test_server().await;
        let mut game_rx = server.game_rx.take().unwrap();

        for port in 40001..40004 {
            let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
            server.handle_packet(connect("player"), addr).await;
        }

        let mut rejected = 0;
        while let Ok(message) = game_rx.try_recv() {
            if let GameMessage::SendPacket {
                packet: Packet::Disconnected { .. },
                ..
            } = message
            {
                rejected += 1;
            }
        }
        assert_eq!(rejected, 1);
        assert_eq!(server.world().state().len(), 5);
    }

    #[tokio::test]
    async fn test_latency_probe_is_echoed() {
        let mut server = create_test_server().await;
        let mut game_rx = server.game_rx.take().unwrap();

        server
            .handle_packet(Packet::Latency { timestamp: 123456 }, test_addr())
            .await;

        match game_rx.try_recv().unwrap() {
            GameMessage::SendPacket { packet, addr } => {
                assert_eq!(packet, Packet::Latency { timestamp: 123456 });
                assert_eq!(addr, test_addr());
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_client_actions_applied_on_tick() {
        let mut server = create_test_server().await;
        let mut game_rx = server.game_rx.take().unwrap();

        server.handle_packet(connect("alice"), test_addr()).await;
        let player_id = match game_rx.try_recv().unwrap() {
            GameMessage::SendPacket {
                packet: Packet::Connected { player_id, .. },
                ..
            } => player_id,
            other => panic!("Unexpected message: {:?}", other),
        };

        let action = Action::SetPosition {
            id: player_id.clone(),
            x: 5.0,
            y: 6.0,
        };
        server
            .handle_packet(Packet::Action { action }, test_addr())
            .await;
        assert_ne!(server.world().state().entity(&player_id).unwrap().x, 5.0);

        server.process_tick(Duration::from_millis(16)).await;
        server.broadcast_snapshot().await;

        let player = server.world().state().entity(&player_id).unwrap();
        assert_eq!((player.x, player.y), (5.0, 6.0));

        match game_rx.try_recv().unwrap() {
            GameMessage::BroadcastPacket {
                packet: Packet::Snapshot { sequence, .. },
                exclude,
            } => {
                assert_eq!(sequence, 1);
                assert_eq!(exclude, None);
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_disconnect_removes_player() {
        let mut server = create_test_server().await;
        let _game_rx = server.game_rx.take().unwrap();

        server.handle_packet(connect("alice"), test_addr()).await;
        assert_eq!(server.world().state().len(), 4);

        server.handle_packet(Packet::Disconnect, test_addr()).await;
        assert!(server.clients.read().await.is_empty());
        assert_eq!(server.world().state().len(), 3);
    }
}
