use crate::game::{ClientStore, Store};
use crate::input::ScriptedInput;
use crate::link_quality::LinkQuality;
use crate::rendering::LogRenderHost;
use crate::sync::SyncLayer;
use bincode::{deserialize, serialize};
use log::{error, info, warn};
use shared::{
    now_millis, Action, Dispatcher, EntityFactory, EntityPool, GameConfig, Packet, Reducer,
    WorldState, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep};

const UPDATE_INTERVAL: Duration = Duration::from_millis(16);
const REPORT_INTERVAL: Duration = Duration::from_secs(5);

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    name: String,
    client_id: Option<u32>,
    player_id: Option<String>,
    connected: bool,

    sync: SyncLayer<ClientStore>,
    pool: EntityPool,
    dispatcher: Dispatcher,
    component_actions: mpsc::UnboundedReceiver<Action>,
    input: Arc<ScriptedInput>,
    render_host: LogRenderHost,
    link: LinkQuality,

    fake_ping_ms: u64,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        name: &str,
        fake_ping_ms: u64,
        config: GameConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;
        let (dispatcher, component_actions) = Dispatcher::channel();

        let store = ClientStore::new(Reducer::new(config.spawn_offset));

        Ok(Client {
            socket,
            server_addr,
            name: name.to_string(),
            client_id: None,
            player_id: None,
            connected: false,
            sync: SyncLayer::new(store, &config),
            pool: EntityPool::new(EntityFactory::new(config.clone())),
            dispatcher,
            component_actions,
            input: Arc::new(ScriptedInput::default()),
            render_host: LogRenderHost::new(),
            link: LinkQuality::new(config.ping_interval),
            fake_ping_ms,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn player_id(&self) -> Option<&str> {
        self.player_id.as_deref()
    }

    /// The client's current view of the world
    pub fn world(&self) -> &WorldState {
        self.sync.store().state()
    }

    pub fn ping(&self) -> Option<u64> {
        self.sync.ping()
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server as {}...", self.name);

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            name: self.name.clone(),
        };
        self.send_packet(&packet).await
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected {
                client_id,
                player_id,
            } => {
                info!("Connected! Client ID: {}, playing {}", client_id, player_id);
                self.sync.store_mut().set_local_player(&player_id);
                self.pool
                    .factory_mut()
                    .set_local_player(&player_id, self.input.clone());
                self.client_id = Some(client_id);
                self.player_id = Some(player_id);
                self.connected = true;
            }

            Packet::Snapshot { sequence, snapshot } => {
                if let Some(loss) = self.sync.handle_set_state(snapshot, sequence) {
                    info!("Packet loss over last window: {:.2} lost per received", loss);
                }
            }

            Packet::Latency { timestamp } => {
                let ping = self.sync.handle_latency(timestamp, now_millis());
                self.link.record(ping as f32, self.sync.packet_loss());
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.client_id = None;
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
    }

    /// Reconciles the entity pool against the store and runs the components
    fn update_entities(&mut self) {
        let report = self.pool.reconcile(
            self.sync.store().state().entities(),
            &self.dispatcher,
            &mut self.render_host,
        );

        for err in &report.invalid {
            warn!("Ignored entity record: {}", err);
        }
        if !report.created.is_empty() || !report.destroyed.is_empty() {
            info!(
                "Entities: +{} -{} ({} players)",
                report.created.len(),
                report.destroyed.len(),
                self.pool.num_players()
            );
        }
    }

    /// Moves the local player by its own velocity
    fn local_motion(&self, dt: Duration) -> Option<Action> {
        let player_id = self.player_id.as_deref()?;
        let player = self.sync.store().state().entity(player_id)?;

        if player.is_dead || (player.vx == 0.0 && player.vy == 0.0) {
            return None;
        }

        let dt = dt.as_secs_f32();
        Some(Action::SetPosition {
            id: player_id.to_string(),
            x: player.x + player.vx * dt,
            y: player.y + player.vy * dt,
        })
    }

    /// Feeds queued component actions through the dedup gate
    fn drain_actions(&mut self) {
        while let Ok(action) = self.component_actions.try_recv() {
            self.sync.dispatch(action);
        }
    }

    async fn flush_outbound(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        for action in self.sync.store_mut().take_outbound() {
            self.send_packet(&Packet::Action { action }).await?;
        }
        Ok(())
    }

    /// Runs until `duration` elapses, or forever when it is `None`
    pub async fn run(&mut self, duration: Option<Duration>) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let started = Instant::now();
        let mut update_interval = interval(UPDATE_INTERVAL);
        let mut report_interval = interval(REPORT_INTERVAL);

        let mut buffer = vec![0u8; 65_536];

        loop {
            if let Some(duration) = duration {
                if started.elapsed() >= duration {
                    break;
                }
            }

            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if self.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
                            }

                            match deserialize::<Packet>(&buffer[..len]) {
                                Ok(packet) => self.handle_packet(packet),
                                Err(e) => warn!("Dropping undecodable packet: {}", e),
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = update_interval.tick() => {
                    if !self.connected {
                        continue;
                    }

                    self.update_entities();
                    if let Some(motion) = self.local_motion(UPDATE_INTERVAL) {
                        self.dispatcher.dispatch(motion);
                    }
                    self.drain_actions();

                    if let Err(e) = self.flush_outbound().await {
                        error!("Error sending actions: {}", e);
                    }

                    if let Some(timestamp) = self.sync.poll_latency_probe(now_millis()) {
                        if let Err(e) = self.send_packet(&Packet::Latency { timestamp }).await {
                            error!("Error sending latency probe: {}", e);
                        }
                    }
                },

                _ = report_interval.tick() => {
                    if self.connected {
                        info!("Link: {}", self.link.summary());
                    }
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }
        self.pool.clear(&mut self.render_host);

        Ok(())
    }
}
