//! Upstream sessions and their manager.
//!
//! Each session is one task that owns the upstream socket and the
//! world mirror. Everything else talks to it through channels: the
//! downstream connection sends serverbound packets in, the session
//! sends rewritten clientbound packets out, and the manager sends
//! control commands.

use crate::{
    auth::{self, TokenRefresher},
    bridge::{gamemode_update, EidRewriter, ServerboundAction},
    config::Config,
    dump::{Direction, PacketDumper},
    net::VanillaPacketIo,
    profile::{Profile, ProfileStore},
    protocol::{
        chat::ChatComponent,
        packet::{client, server, side, state},
        vanilla_codec::{CompressionThreshold, EncryptionKey},
        PROTOCOL_VERSION,
    },
    replay::{emit_join_sequence, CLIENT_EID},
    world::{MirrorEvent, PlayerState, QueueStatus, WorldMirror},
};
use ahash::AHashMap;
use rand::RngCore;
use rsa::{pkcs8::DecodePublicKey, Pkcs1v15Encrypt, RsaPublicKey};
use serde::Serialize;
use std::{
    collections::VecDeque,
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::{
    net::TcpStream,
    select,
    sync::{oneshot, watch, Notify},
    task,
    time::timeout,
};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const CHAT_HISTORY_CAP: usize = 100;
const CHAT_HISTORY_TRIM: usize = 90;

const LOW_HEALTH_REASON: &str = "Disconnected because of low health";

/// Errors surfaced by [`SessionManager::connect`].
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("a session for this profile is already open")]
    AlreadyConnected,
    #[error("token refresh failed")]
    TokenRefresh,
    #[error("connect timed out")]
    Timeout,
    /// The server refused the login with a chat component.
    #[error("server refused login: {}", .0.to_plain_text())]
    Refused(ChatComponent),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The downstream side of an attached client: the session pushes
/// rewritten clientbound packets into this bounded channel and the
/// connection task drains it onto the socket. The bound provides the
/// flow control the replay burst needs.
#[derive(Clone)]
pub struct DownstreamHandle {
    pub packets: flume::Sender<server::play::Packet>,
}

pub enum SessionCommand {
    Attach {
        handle: DownstreamHandle,
        /// The client is already in a world and must be respawned
        /// through a sentinel dimension instead of re-joined.
        respawn: bool,
        reply: oneshot::Sender<()>,
    },
    Detach,
    SendChat(String),
    ClientPacket(client::play::Packet),
    SubscribeChat {
        reply: oneshot::Sender<(Vec<ChatComponent>, flume::Receiver<ChatComponent>)>,
    },
    Disconnect,
}

/// Snapshot published on the per-profile status channel.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub id: String,
    pub connected: bool,
    pub queue: Option<QueueStatus>,
    pub playing: bool,
    pub player: PlayerState,
    pub dimension: i32,
    /// Milliseconds until the next reconnect attempt, if one is due.
    pub reconnect_in: Option<u64>,
}

impl SessionStatus {
    fn offline(id: String) -> Self {
        Self {
            id,
            connected: false,
            queue: None,
            playing: false,
            player: PlayerState::default(),
            dimension: 0,
            reconnect_in: None,
        }
    }
}

/// Events for the external control plane.
#[derive(Clone, Debug)]
pub enum ProxyEvent {
    Connected {
        profile_id: String,
    },
    Disconnected {
        profile_id: String,
        reason: Option<ChatComponent>,
    },
    /// A player appeared in render distance.
    PlayerNearby {
        profile_id: String,
        player: String,
    },
}

#[derive(Clone)]
pub struct SessionHandle {
    pub profile: Profile,
    commands: flume::Sender<SessionCommand>,
    pub status: watch::Receiver<SessionStatus>,
    cancel: Arc<Notify>,
    user_disconnected: Arc<AtomicBool>,
}

impl SessionHandle {
    pub fn is_connected(&self) -> bool {
        self.status.borrow().connected
    }

    pub async fn attach(&self, handle: DownstreamHandle, respawn: bool) -> anyhow::Result<()> {
        let (reply, done) = oneshot::channel();
        self.commands
            .send_async(SessionCommand::Attach {
                handle,
                respawn,
                reply,
            })
            .await
            .map_err(|_| anyhow::anyhow!("session ended"))?;
        done.await.map_err(|_| anyhow::anyhow!("session ended"))
    }

    pub fn detach(&self) {
        self.commands.send(SessionCommand::Detach).ok();
    }

    pub fn send_chat(&self, text: impl Into<String>) {
        self.commands
            .send(SessionCommand::SendChat(text.into()))
            .ok();
    }

    /// Forwards a serverbound packet from the attached client.
    /// Returns false once the session is gone.
    pub fn client_packet(&self, packet: client::play::Packet) -> bool {
        self.commands
            .send(SessionCommand::ClientPacket(packet))
            .is_ok()
    }

    /// Subscribes to the chat stream; the last 100 lines are replayed
    /// in the returned vector.
    pub async fn subscribe_chat(
        &self,
    ) -> anyhow::Result<(Vec<ChatComponent>, flume::Receiver<ChatComponent>)> {
        let (reply, result) = oneshot::channel();
        self.commands
            .send_async(SessionCommand::SubscribeChat { reply })
            .await
            .map_err(|_| anyhow::anyhow!("session ended"))?;
        result.await.map_err(|_| anyhow::anyhow!("session ended"))
    }
}

pub struct SessionManager {
    config: Config,
    profiles: Arc<dyn ProfileStore>,
    refresher: TokenRefresher,
    sessions: Mutex<AHashMap<String, SessionHandle>>,
    events_tx: flume::Sender<ProxyEvent>,
    events_rx: flume::Receiver<ProxyEvent>,
}

impl SessionManager {
    pub fn new(
        config: Config,
        profiles: Arc<dyn ProfileStore>,
        refresher: TokenRefresher,
    ) -> Arc<Self> {
        let (events_tx, events_rx) = flume::unbounded();
        Arc::new(Self {
            config,
            profiles,
            refresher,
            sessions: Mutex::new(AHashMap::new()),
            events_tx,
            events_rx,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn profiles(&self) -> &Arc<dyn ProfileStore> {
        &self.profiles
    }

    /// Stream of lifecycle events for the control plane.
    pub fn events(&self) -> flume::Receiver<ProxyEvent> {
        self.events_rx.clone()
    }

    pub fn session(&self, profile_id: &str) -> Option<SessionHandle> {
        self.sessions
            .lock()
            .expect("session table poisoned")
            .get(profile_id)
            .cloned()
    }

    pub fn open_session_count(&self) -> usize {
        self.sessions.lock().expect("session table poisoned").len()
    }

    pub fn send_chat(&self, profile_id: &str, text: &str) {
        if let Some(handle) = self.session(profile_id) {
            handle.send_chat(text);
        }
    }

    /// Opens an upstream session for the profile. The entry is
    /// registered before the network round-trip so a racing second
    /// connect is refused; it is removed again if login fails.
    pub async fn connect(self: Arc<Self>, profile: Profile) -> Result<(), ConnectError> {
        let (commands_tx, commands_rx) = flume::unbounded();
        let (status_tx, status_rx) = watch::channel(SessionStatus::offline(profile.id.clone()));
        let cancel = Arc::new(Notify::new());
        let user_disconnected = Arc::new(AtomicBool::new(false));

        let handle = SessionHandle {
            profile: profile.clone(),
            commands: commands_tx,
            status: status_rx,
            cancel: cancel.clone(),
            user_disconnected: user_disconnected.clone(),
        };

        {
            let mut sessions = self.sessions.lock().expect("session table poisoned");
            if sessions.contains_key(&profile.id) {
                return Err(ConnectError::AlreadyConnected);
            }
            sessions.insert(profile.id.clone(), handle);
        }

        let result = self.connect_inner(&profile).await;
        let io = match result {
            Ok(io) => io,
            Err(e) => {
                self.remove(&profile.id);
                return Err(e);
            }
        };

        let manager = Arc::clone(&self);
        task::spawn(async move {
            manager
                .supervise(profile, io, commands_rx, status_tx, cancel, user_disconnected)
                .await;
        });
        Ok(())
    }

    /// Ends the session and suppresses auto-reconnect.
    pub fn disconnect(&self, profile_id: &str) {
        let handle = self.session(profile_id);
        if let Some(handle) = handle {
            handle.user_disconnected.store(true, Ordering::SeqCst);
            handle.cancel.notify_waiters();
            handle.commands.send(SessionCommand::Disconnect).ok();
        }
    }

    fn remove(&self, profile_id: &str) {
        self.sessions
            .lock()
            .expect("session table poisoned")
            .remove(profile_id);
    }

    /// Refreshes the token and performs the upstream login.
    async fn connect_inner(
        &self,
        profile: &Profile,
    ) -> Result<(VanillaPacketIo<side::Client, state::Play>, u128), ConnectError> {
        if !(self.refresher)(profile.clone()).await {
            return Err(ConnectError::TokenRefresh);
        }
        // the refresher may have rotated the token in the store
        let profile = self
            .profiles
            .by_id_or_name(&profile.id)
            .unwrap_or_else(|| profile.clone());

        match timeout(
            CONNECT_TIMEOUT,
            establish(
                &self.config.upstream.host,
                self.config.upstream.port,
                &profile,
            ),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ConnectError::Timeout),
        }
    }

    /// Runs the session until it ends, then applies the auto-reconnect
    /// policy, repeating until told to stop.
    async fn supervise(
        self: Arc<Self>,
        profile: Profile,
        first_io: (VanillaPacketIo<side::Client, state::Play>, u128),
        commands: flume::Receiver<SessionCommand>,
        status_tx: watch::Sender<SessionStatus>,
        cancel: Arc<Notify>,
        user_disconnected: Arc<AtomicBool>,
    ) {
        let mut io = Some(first_io);
        loop {
            let (io_now, self_uuid) = match io.take() {
                Some(pair) => pair,
                None => match self.connect_inner(&profile).await {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(profile = %profile.name, "reconnect failed: {e}");
                        if matches!(e, ConnectError::TokenRefresh)
                            || !self.wait_for_reconnect(&profile, &status_tx, &cancel).await
                            || user_disconnected.load(Ordering::SeqCst)
                        {
                            break;
                        }
                        continue;
                    }
                },
            };

            self.events_tx
                .send(ProxyEvent::Connected {
                    profile_id: profile.id.clone(),
                })
                .ok();
            tracing::info!(profile = %profile.name, "upstream session open");

            let mut session = UpstreamSession::new(
                profile.clone(),
                io_now,
                self_uuid,
                status_tx.clone(),
                self.events_tx.clone(),
                &self.config,
            );
            let reason = session.run(&commands, &user_disconnected).await;

            self.events_tx
                .send(ProxyEvent::Disconnected {
                    profile_id: profile.id.clone(),
                    reason: reason.clone(),
                })
                .ok();
            tracing::info!(profile = %profile.name, "upstream session ended");

            if user_disconnected.load(Ordering::SeqCst)
                || !profile.settings.auto_reconnect.enabled
            {
                break;
            }
            if !self.wait_for_reconnect(&profile, &status_tx, &cancel).await
                || user_disconnected.load(Ordering::SeqCst)
            {
                break;
            }
        }

        status_tx.send_replace(SessionStatus::offline(profile.id.clone()));
        self.remove(&profile.id);
    }

    /// Sleeps out the reconnect delay. Returns false when cancelled.
    async fn wait_for_reconnect(
        &self,
        profile: &Profile,
        status_tx: &watch::Sender<SessionStatus>,
        cancel: &Notify,
    ) -> bool {
        let delay = profile.settings.auto_reconnect.delay;
        status_tx.send_modify(|status| {
            status.connected = false;
            status.playing = false;
            status.reconnect_in = Some(delay);
        });
        select! {
            _ = tokio::time::sleep(Duration::from_millis(delay)) => true,
            _ = cancel.notified() => false,
        }
    }
}

/// Performs handshake and login against the upstream server, leaving
/// the connection in the Play state.
async fn establish(
    host: &str,
    port: u16,
    profile: &Profile,
) -> Result<(VanillaPacketIo<side::Client, state::Play>, u128), ConnectError> {
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(anyhow::Error::from)?;
    stream.set_nodelay(true).ok();

    let io: VanillaPacketIo<side::Client, state::Handshake> = VanillaPacketIo::new(stream);
    io.send_packet(client::handshake::Packet::Handshake(
        client::handshake::Handshake {
            protocol_version: PROTOCOL_VERSION,
            server_address: host.to_owned(),
            server_port: port,
            next_state: client::handshake::NextState::Login,
        },
    ))
    .await?;

    let mut io: VanillaPacketIo<side::Client, state::Login> = io.switch_state();
    io.send_packet(client::login::Packet::LoginStart(
        client::login::LoginStart {
            username: profile.name.clone(),
        },
    ))
    .await?;

    let uuid = loop {
        match io.recv_packet().await? {
            server::login::Packet::EncryptionRequest(request) => {
                let mut secret = [0u8; 16];
                rand::thread_rng().fill_bytes(&mut secret);

                let hash = auth::server_hash(&request.server_id, &secret, &request.public_key);
                auth::join_session(&profile.access_token, &profile.id, &hash).await?;

                let public_key = RsaPublicKey::from_public_key_der(&request.public_key)
                    .map_err(anyhow::Error::from)?;
                let (shared_secret, verify_token) = {
                    let mut rng = rand::thread_rng();
                    let shared_secret = public_key
                        .encrypt(&mut rng, Pkcs1v15Encrypt, &secret)
                        .map_err(anyhow::Error::from)?;
                    let verify_token = public_key
                        .encrypt(&mut rng, Pkcs1v15Encrypt, &request.verify_token)
                        .map_err(anyhow::Error::from)?;
                    (shared_secret, verify_token)
                };

                io.send_packet(client::login::Packet::EncryptionResponse(
                    client::login::EncryptionResponse {
                        shared_secret,
                        verify_token,
                    },
                ))
                .await?;
                io.enable_encryption(EncryptionKey::new(secret));
            }
            server::login::Packet::SetCompression(packet) => {
                if let Some(threshold) =
                    usize::try_from(packet.threshold).ok().and_then(NonZeroUsize::new)
                {
                    io.enable_compression(CompressionThreshold::new(threshold));
                }
            }
            server::login::Packet::Disconnect(packet) => {
                return Err(ConnectError::Refused(packet.reason));
            }
            server::login::Packet::LoginSuccess(packet) => {
                tracing::debug!(username = %packet.username, "login success");
                break auth::parse_uuid(&packet.uuid).unwrap_or(0);
            }
        }
    };

    Ok((io.switch_state(), uuid))
}

/// State owned by one running session task.
struct UpstreamSession {
    profile: Profile,
    io: VanillaPacketIo<side::Client, state::Play>,
    self_uuid: u128,
    mirror: WorldMirror,
    conn: Option<DownstreamHandle>,
    last_chat_messages: VecDeque<ChatComponent>,
    chat_listeners: Vec<flume::Sender<ChatComponent>>,
    disconnect_reason: Option<ChatComponent>,
    status_tx: watch::Sender<SessionStatus>,
    events_tx: flume::Sender<ProxyEvent>,
    dumper: Option<PacketDumper>,
    status_dirty: bool,
}

enum LoopControl {
    Continue,
    End,
}

impl UpstreamSession {
    fn new(
        profile: Profile,
        io: VanillaPacketIo<side::Client, state::Play>,
        self_uuid: u128,
        status_tx: watch::Sender<SessionStatus>,
        events_tx: flume::Sender<ProxyEvent>,
        config: &Config,
    ) -> Self {
        let dumper = if profile.settings.enable_packet_dumps {
            match PacketDumper::open(&config.dumps_dir, &profile.id) {
                Ok(dumper) => Some(dumper),
                Err(e) => {
                    tracing::warn!("failed to open packet dump: {e}");
                    None
                }
            }
        } else {
            None
        };
        Self {
            profile,
            io,
            self_uuid,
            mirror: WorldMirror::new(),
            conn: None,
            last_chat_messages: VecDeque::new(),
            chat_listeners: Vec::new(),
            disconnect_reason: None,
            status_tx,
            events_tx,
            dumper,
            status_dirty: true,
        }
    }

    fn rewriter(&self) -> EidRewriter {
        EidRewriter::new(self.mirror.self_eid, CLIENT_EID)
    }

    /// Drives the session until the upstream ends or a disconnect is
    /// requested. Returns the disconnect reason, if one was recorded.
    async fn run(
        &mut self,
        commands: &flume::Receiver<SessionCommand>,
        user_disconnected: &AtomicBool,
    ) -> Option<ChatComponent> {
        let mut ticker = tokio::time::interval(Duration::from_millis(100));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            select! {
                result = self.io.recv_packet_raw() => match result {
                    Ok((packet, plain)) => {
                        match self.handle_upstream_packet(packet, plain).await {
                            Ok(LoopControl::Continue) => {}
                            Ok(LoopControl::End) => break,
                            Err(e) => {
                                tracing::warn!(profile = %self.profile.name, "session failed: {e}");
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        if self.disconnect_reason.is_none() && !user_disconnected.load(Ordering::SeqCst) {
                            tracing::info!(profile = %self.profile.name, "upstream ended: {e}");
                        }
                        break;
                    }
                },
                cmd = commands.recv_async() => match cmd {
                    Ok(cmd) => match self.handle_command(cmd).await {
                        Ok(LoopControl::Continue) => {}
                        Ok(LoopControl::End) => break,
                        Err(e) => {
                            tracing::warn!(profile = %self.profile.name, "session failed: {e}");
                            break;
                        }
                    },
                    Err(_) => break,
                },
                _ = ticker.tick(), if self.status_dirty => {
                    self.publish_status();
                }
            }
        }

        // an upstream end takes the downstream with it; the supervisor
        // publishes the offline status
        self.conn = None;
        self.disconnect_reason.take()
    }

    async fn handle_upstream_packet(
        &mut self,
        packet: server::play::Packet,
        plain: Vec<u8>,
    ) -> anyhow::Result<LoopControl> {
        if let server::play::Packet::KeepAlive(keep_alive) = &packet {
            self.io
                .send_packet(client::play::Packet::KeepAlive(client::play::KeepAlive {
                    id: keep_alive.id,
                }))
                .await?;
        } else if let Some(dumper) = &self.dumper {
            dumper.record(Direction::Inbound, plain);
        }

        let events = self.mirror.apply(&packet)?;
        let mut control = LoopControl::Continue;
        for event in events {
            if let LoopControl::End = self.handle_mirror_event(event).await? {
                control = LoopControl::End;
            }
        }

        let mut downstream_gone = false;
        if let Some(conn) = &self.conn {
            let mut forwarded = packet;
            self.rewriter().rewrite_clientbound(&mut forwarded, &self.mirror);
            downstream_gone = conn.packets.send_async(forwarded).await.is_err();
        }
        if downstream_gone {
            tracing::debug!(profile = %self.profile.name, "downstream detached");
            self.conn = None;
        }

        self.status_dirty = true;
        Ok(control)
    }

    async fn handle_mirror_event(&mut self, event: MirrorEvent) -> anyhow::Result<LoopControl> {
        match event {
            MirrorEvent::TeleportRequest { teleport_id } => {
                self.io
                    .send_packet(client::play::Packet::TeleportConfirm(
                        client::play::TeleportConfirm { teleport_id },
                    ))
                    .await?;
            }
            MirrorEvent::Chat { message } => {
                self.last_chat_messages.push_back(message.clone());
                if self.last_chat_messages.len() > CHAT_HISTORY_CAP {
                    let excess = self.last_chat_messages.len() - CHAT_HISTORY_TRIM;
                    self.last_chat_messages.drain(..excess);
                }
                self.chat_listeners
                    .retain(|listener| listener.send(message.clone()).is_ok());
            }
            MirrorEvent::GamemodeChanged { gamemode } => {
                if let Some(conn) = &self.conn {
                    conn.packets
                        .send_async(gamemode_update(self.self_uuid, gamemode))
                        .await
                        .ok();
                }
            }
            MirrorEvent::HealthChanged { health } => {
                let settings = &self.profile.settings.auto_disconnect;
                let blocked_by_client = self.conn.is_some() && settings.disable_while_playing;
                if settings.enabled
                    && self.mirror.health_initialized
                    && health < settings.health
                    && !blocked_by_client
                {
                    tracing::info!(profile = %self.profile.name, health, "auto-disconnecting");
                    self.disconnect_reason = Some(ChatComponent::text(LOW_HEALTH_REASON));
                    return Ok(LoopControl::End);
                }
            }
            MirrorEvent::PlayerSpawned { name } => {
                let settings = &self.profile.settings.notify_players;
                let Some(name) = name else {
                    return Ok(LoopControl::Continue);
                };
                let muted = self.conn.is_some() && settings.disable_while_playing;
                if settings.enabled && !muted && !settings.ignore.contains(&name) {
                    self.events_tx
                        .send(ProxyEvent::PlayerNearby {
                            profile_id: self.profile.id.clone(),
                            player: name,
                        })
                        .ok();
                }
            }
            MirrorEvent::Disconnected { reason } => {
                tracing::info!(
                    profile = %self.profile.name,
                    reason = %reason.to_plain_text(),
                    "kicked by upstream"
                );
                self.disconnect_reason = Some(reason);
                return Ok(LoopControl::End);
            }
        }
        Ok(LoopControl::Continue)
    }

    async fn handle_command(&mut self, command: SessionCommand) -> anyhow::Result<LoopControl> {
        match command {
            SessionCommand::Attach {
                handle,
                respawn,
                reply,
            } => {
                // ack first: the caller must start draining its channel
                // before the replay burst fills the bound
                reply.send(()).ok();
                for packet in emit_join_sequence(&self.mirror, CLIENT_EID, respawn) {
                    if handle.packets.send_async(packet).await.is_err() {
                        return Ok(LoopControl::Continue);
                    }
                }
                self.conn = Some(handle);
                self.status_dirty = true;
            }
            SessionCommand::Detach => {
                self.conn = None;
                self.status_dirty = true;
            }
            SessionCommand::SendChat(text) => {
                self.io
                    .send_packet(client::play::Packet::ChatMessage(
                        client::play::ChatMessage { message: text },
                    ))
                    .await?;
            }
            SessionCommand::ClientPacket(packet) => {
                let rewriter = self.rewriter();
                match rewriter.filter_serverbound(packet, &mut self.mirror) {
                    ServerboundAction::Forward(packet) => {
                        let plain = self.io.send_packet_raw(packet).await?;
                        if let Some(dumper) = &self.dumper {
                            dumper.record(Direction::Outbound, plain);
                        }
                        self.status_dirty = true;
                    }
                    ServerboundAction::Drop => {}
                }
            }
            SessionCommand::SubscribeChat { reply } => {
                let (sender, receiver) = flume::unbounded();
                self.chat_listeners.push(sender);
                let history = self.last_chat_messages.iter().cloned().collect();
                reply.send((history, receiver)).ok();
            }
            SessionCommand::Disconnect => return Ok(LoopControl::End),
        }
        Ok(LoopControl::Continue)
    }

    fn publish_status(&mut self) {
        self.status_dirty = false;
        self.status_tx.send_replace(SessionStatus {
            id: self.profile.id.clone(),
            connected: true,
            queue: self.mirror.queue.clone(),
            playing: self.conn.is_some(),
            player: self.mirror.player.clone(),
            dimension: self.mirror.dimension,
            reconnect_in: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::no_refresh,
        config::UpstreamConfig,
        profile::{InMemoryProfileStore, ProfileSettings},
        protocol::packet::server::play::JoinGame,
    };
    use std::time::Instant;
    use tokio::net::TcpListener;

    fn test_profile(auto_reconnect_delay: Option<u64>) -> Profile {
        let mut settings = ProfileSettings::default();
        if let Some(delay) = auto_reconnect_delay {
            settings.auto_reconnect.enabled = true;
            settings.auto_reconnect.delay = delay;
        }
        Profile {
            id: "ab".repeat(16),
            name: "player".into(),
            access_token: "token".into(),
            settings,
        }
    }

    fn test_config(port: u16) -> Config {
        Config {
            upstream: UpstreamConfig {
                host: "127.0.0.1".into(),
                port,
            },
            ..Config::default()
        }
    }

    /// Accepts one proxy connection and walks it through an offline
    /// login, ending in the Play state.
    async fn accept_login(
        listener: &TcpListener,
    ) -> VanillaPacketIo<side::Server, state::Play> {
        let (stream, _) = listener.accept().await.unwrap();
        let io: VanillaPacketIo<side::Server, state::Handshake> = VanillaPacketIo::new(stream);
        let client::handshake::Packet::Handshake(handshake) = io.recv_packet().await.unwrap();
        assert_eq!(handshake.protocol_version, PROTOCOL_VERSION);
        assert_eq!(handshake.next_state, client::handshake::NextState::Login);

        let io: VanillaPacketIo<side::Server, state::Login> = io.switch_state();
        let client::login::Packet::LoginStart(start) = io.recv_packet().await.unwrap() else {
            panic!("expected login start");
        };
        io.send_packet(server::login::Packet::LoginSuccess(
            server::login::LoginSuccess {
                uuid: "d6a33537-0444-45be-b12b-af138b1ab81f".into(),
                username: start.username,
            },
        ))
        .await
        .unwrap();
        io.switch_state()
    }

    #[tokio::test]
    async fn connect_refused_when_already_mapped() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let manager = SessionManager::new(
            test_config(port),
            InMemoryProfileStore::new(vec![test_profile(None)]),
            no_refresh(),
        );

        let server = tokio::spawn(async move {
            let io = accept_login(&listener).await;
            // keep the session alive until the test ends
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(io);
        });

        Arc::clone(&manager).connect(test_profile(None)).await.unwrap();
        assert!(matches!(
            Arc::clone(&manager).connect(test_profile(None)).await,
            Err(ConnectError::AlreadyConnected)
        ));
        assert_eq!(manager.open_session_count(), 1);
        server.abort();
    }

    #[tokio::test]
    async fn auto_reconnect_after_upstream_end() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let manager = SessionManager::new(
            test_config(port),
            InMemoryProfileStore::new(vec![test_profile(Some(100))]),
            no_refresh(),
        );

        let server = tokio::spawn(async move {
            let io = accept_login(&listener).await;
            io.send_packet(server::play::Packet::JoinGame(JoinGame {
                entity_id: 1,
                gamemode: 0,
                dimension: 0,
                difficulty: 2,
                max_players: 20,
                level_type: "default".into(),
                reduced_debug_info: false,
            }))
            .await
            .unwrap();
            drop(io);

            let closed_at = Instant::now();
            let _second = accept_login(&listener).await;
            closed_at.elapsed()
        });

        Arc::clone(&manager).connect(test_profile(Some(100))).await.unwrap();
        let elapsed = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("a reconnect attempt must arrive")
            .unwrap();
        assert!(
            elapsed >= Duration::from_millis(80),
            "reconnected too early: {elapsed:?}"
        );

        manager.disconnect(&test_profile(None).id);
    }

    #[tokio::test]
    async fn disconnect_suppresses_auto_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let manager = SessionManager::new(
            test_config(port),
            InMemoryProfileStore::new(vec![test_profile(Some(50))]),
            no_refresh(),
        );

        let (hold_tx, hold_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            let io = accept_login(&listener).await;
            hold_rx.await.ok();
            drop(io);
            // no further connection may arrive
            tokio::time::timeout(Duration::from_millis(400), listener.accept())
                .await
                .is_err()
        });

        let profile = test_profile(Some(50));
        Arc::clone(&manager).connect(profile.clone()).await.unwrap();
        manager.disconnect(&profile.id);
        hold_tx.send(()).ok();

        assert!(server.await.unwrap(), "no reconnect after user disconnect");

        // the entry is removed once the supervisor exits
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(manager.open_session_count(), 0);
    }

    #[tokio::test]
    async fn chat_subscription_replays_history() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let manager = SessionManager::new(
            test_config(port),
            InMemoryProfileStore::new(vec![test_profile(None)]),
            no_refresh(),
        );

        let server = tokio::spawn(async move {
            let io = accept_login(&listener).await;
            io.send_packet(server::play::Packet::ChatMessage(
                server::play::ChatMessage {
                    message: ChatComponent::text("hello"),
                    position: 0,
                },
            ))
            .await
            .unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(io);
        });

        let profile = test_profile(None);
        Arc::clone(&manager).connect(profile.clone()).await.unwrap();
        let handle = manager.session(&profile.id).unwrap();

        // give the session loop a moment to apply the chat packet
        tokio::time::sleep(Duration::from_millis(200)).await;
        let (history, _live) = handle.subscribe_chat().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].to_plain_text(), "hello");

        server.abort();
        manager.disconnect(&profile.id);
    }
}
