//! The downstream protocol server: accepts game clients, answers
//! status pings, performs the login handshake, and hands logged-in
//! clients to their profile's session.

use crate::{
    net::VanillaPacketIo,
    profile::Profile,
    protocol::{
        chat::ChatComponent,
        packet::{client, client::handshake::NextState, server, side, state},
        vanilla_codec::{CompressionThreshold, EncryptionKey, COMPRESSION_THRESHOLD},
        GAME_VERSION, PROTOCOL_VERSION,
    },
    replay::CLIENT_EID,
    session::{DownstreamHandle, SessionHandle, SessionManager},
};
use anyhow::{bail, Context};
use rand::RngCore;
use rsa::{pkcs8::EncodePublicKey, Pkcs1v15Encrypt, RsaPrivateKey};
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, select, task};

/// The all-zero UUID presented on login success.
const NIL_UUID: &str = "00000000-0000-0000-0000-000000000000";

/// How often the lobby repeats the profile roster.
const ROSTER_INTERVAL: Duration = Duration::from_secs(10);

/// The listener's RSA identity, generated once at startup.
struct ServerKey {
    private: RsaPrivateKey,
    public_der: Vec<u8>,
}

impl ServerKey {
    fn generate() -> anyhow::Result<Self> {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), 1024)?;
        let public_der = private
            .to_public_key()
            .to_public_key_der()?
            .as_bytes()
            .to_vec();
        Ok(Self {
            private,
            public_der,
        })
    }
}

pub struct DownstreamListener {
    manager: Arc<SessionManager>,
    tcp: TcpListener,
    key: Arc<ServerKey>,
}

impl DownstreamListener {
    pub async fn bind(manager: Arc<SessionManager>) -> anyhow::Result<Self> {
        let tcp = TcpListener::bind(manager.config().listen).await?;
        let key = Arc::new(ServerKey::generate()?);
        Ok(Self { manager, tcp, key })
    }

    pub fn local_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
        Ok(self.tcp.local_addr()?)
    }

    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            let (stream, remote) = self.tcp.accept().await?;
            tracing::debug!("accepted downstream connection from {remote}");
            stream.set_nodelay(true).ok();
            let manager = Arc::clone(&self.manager);
            let key = Arc::clone(&self.key);
            task::spawn(async move {
                if let Err(e) = handle_connection(stream, manager, key).await {
                    tracing::debug!("downstream connection from {remote} ended: {e:#}");
                }
            });
        }
    }
}

async fn handle_connection(
    stream: tokio::net::TcpStream,
    manager: Arc<SessionManager>,
    key: Arc<ServerKey>,
) -> anyhow::Result<()> {
    let io: VanillaPacketIo<side::Server, state::Handshake> = VanillaPacketIo::new(stream);
    let client::handshake::Packet::Handshake(handshake) = io.recv_packet().await?;

    match handshake.next_state {
        NextState::Status => handle_status(io.switch_state(), &manager).await,
        NextState::Login => {
            handle_login(io.switch_state(), handshake.protocol_version, manager, key).await
        }
    }
}

async fn handle_status(
    io: VanillaPacketIo<side::Server, state::Status>,
    manager: &SessionManager,
) -> anyhow::Result<()> {
    loop {
        match io.recv_packet().await {
            Ok(client::status::Packet::Request(_)) => {
                let status = serde_json::json!({
                    "version": { "name": GAME_VERSION, "protocol": PROTOCOL_VERSION },
                    "players": {
                        "online": manager.open_session_count(),
                        "max": manager.profiles().len(),
                    },
                    "description": { "text": manager.config().server_name },
                });
                io.send_packet(server::status::Packet::Response(server::status::Response {
                    response: status.to_string(),
                }))
                .await?;
            }
            Ok(client::status::Packet::Ping(ping)) => {
                io.send_packet(server::status::Packet::Pong(server::status::Pong {
                    payload: ping.payload,
                }))
                .await?;
                return Ok(());
            }
            Err(_) => return Ok(()),
        }
    }
}

async fn handle_login(
    mut io: VanillaPacketIo<side::Server, state::Login>,
    protocol_version: i32,
    manager: Arc<SessionManager>,
    key: Arc<ServerKey>,
) -> anyhow::Result<()> {
    if protocol_version != PROTOCOL_VERSION {
        let translate = if protocol_version < PROTOCOL_VERSION {
            "multiplayer.disconnect.outdated_client"
        } else {
            "multiplayer.disconnect.outdated_server"
        };
        io.send_packet(server::login::Packet::Disconnect(server::login::Disconnect {
            reason: ChatComponent::translate(translate, vec![ChatComponent::text(GAME_VERSION)]),
        }))
        .await?;
        return Ok(());
    }

    let client::login::Packet::LoginStart(start) = io.recv_packet().await? else {
        bail!("expected login start");
    };
    let Some(profile) = manager.profiles().by_name(&start.username) else {
        io.send_packet(server::login::Packet::Disconnect(server::login::Disconnect {
            reason: ChatComponent::text("You need to connect via one of your profiles"),
        }))
        .await?;
        return Ok(());
    };

    let mut verify_token = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut verify_token);
    io.send_packet(server::login::Packet::EncryptionRequest(
        server::login::EncryptionRequest {
            server_id: String::new(),
            public_key: key.public_der.clone(),
            verify_token: verify_token.to_vec(),
        },
    ))
    .await?;

    let client::login::Packet::EncryptionResponse(response) = io.recv_packet().await? else {
        bail!("expected encryption response");
    };
    let shared_secret = key
        .private
        .decrypt(Pkcs1v15Encrypt, &response.shared_secret)
        .context("shared secret decryption failed")?;
    let echoed_token = key
        .private
        .decrypt(Pkcs1v15Encrypt, &response.verify_token)
        .context("verify token decryption failed")?;
    if echoed_token != verify_token {
        bail!("verify token mismatch");
    }
    let secret: [u8; 16] = shared_secret
        .try_into()
        .map_err(|_| anyhow::anyhow!("shared secret is not 16 bytes"))?;
    io.enable_encryption(EncryptionKey::new(secret));

    io.send_packet(server::login::Packet::SetCompression(
        server::login::SetCompression {
            threshold: COMPRESSION_THRESHOLD as i32,
        },
    ))
    .await?;
    io.enable_compression(CompressionThreshold::standard());

    io.send_packet(server::login::Packet::LoginSuccess(
        server::login::LoginSuccess {
            uuid: NIL_UUID.to_owned(),
            username: start.username.clone(),
        },
    ))
    .await?;
    tracing::info!(username = %start.username, "downstream client logged in");

    let io: VanillaPacketIo<side::Server, state::Play> = io.switch_state();
    let mut client = DownstreamClient {
        io,
        manager,
        profile,
        attached: None,
        packets: flume::bounded(256),
        keep_alive_counter: 0,
    };
    let result = client.run().await;
    if let Some(handle) = &client.attached {
        handle.detach();
    }
    result
}

/// A logged-in downstream client: either attached to a session or
/// sitting in the lobby choosing one.
struct DownstreamClient {
    io: VanillaPacketIo<side::Server, state::Play>,
    manager: Arc<SessionManager>,
    profile: Profile,
    attached: Option<SessionHandle>,
    packets: (
        flume::Sender<server::play::Packet>,
        flume::Receiver<server::play::Packet>,
    ),
    keep_alive_counter: i64,
}

impl DownstreamClient {
    async fn run(&mut self) -> anyhow::Result<()> {
        // attach straight away when the profile's session is live,
        // otherwise park the client in the lobby
        let session = self
            .manager
            .session(&self.profile.id)
            .filter(SessionHandle::is_connected);
        match session {
            Some(handle) => {
                handle
                    .attach(
                        DownstreamHandle {
                            packets: self.packets.0.clone(),
                        },
                        false,
                    )
                    .await?;
                self.attached = Some(handle);
            }
            None => {
                self.send_lobby_world().await?;
                self.send_roster().await?;
            }
        }

        let mut roster = tokio::time::interval(ROSTER_INTERVAL);
        roster.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        roster.reset();

        loop {
            select! {
                packet = self.packets.1.recv_async() => match packet {
                    Ok(packet) => self.io.send_packet(packet).await?,
                    // the sending session is gone; the upstream end
                    // takes the downstream with it
                    Err(_) => bail!("session ended"),
                },
                result = self.io.recv_packet() => {
                    let packet = result?;
                    self.handle_client_packet(packet).await?;
                }
                _ = roster.tick(), if self.attached.is_none() => {
                    self.send_roster().await?;
                    self.send_keep_alive().await?;
                }
            }
        }
    }

    async fn handle_client_packet(&mut self, packet: client::play::Packet) -> anyhow::Result<()> {
        if let client::play::Packet::ChatMessage(chat) = &packet {
            if let Some(target) = chat.message.strip_prefix("/connect ") {
                return self.connect_command(target.trim()).await;
            }
            if let Some(target) = chat.message.strip_prefix("/disconnect ") {
                return self.disconnect_command(target.trim()).await;
            }
        }

        if let Some(handle) = &self.attached {
            if !handle.client_packet(packet) {
                bail!("session ended");
            }
        }
        // in the lobby everything else (keep-alive replies, movement in
        // the void) is simply discarded
        Ok(())
    }

    async fn connect_command(&mut self, target: &str) -> anyhow::Result<()> {
        let Some(profile) = self.manager.profiles().by_id_or_name(target) else {
            return self.system_message(format!("Unknown profile '{target}'")).await;
        };
        let Some(handle) = self
            .manager
            .session(&profile.id)
            .filter(SessionHandle::is_connected)
        else {
            return self
                .system_message(format!("No open session for '{}'", profile.name))
                .await;
        };

        if let Some(current) = self.attached.take() {
            current.detach();
        }
        // a fresh channel, so nothing the old session was still pushing
        // can interleave with the new session's replay
        self.packets = flume::bounded(256);
        // the client already has a world; route it through the
        // sentinel-respawn replay
        handle
            .attach(
                DownstreamHandle {
                    packets: self.packets.0.clone(),
                },
                true,
            )
            .await?;
        self.attached = Some(handle);
        self.system_message(format!("Connected to '{}'", profile.name))
            .await
    }

    async fn disconnect_command(&mut self, target: &str) -> anyhow::Result<()> {
        let Some(profile) = self.manager.profiles().by_id_or_name(target) else {
            return self.system_message(format!("Unknown profile '{target}'")).await;
        };
        if let Some(attached) = &self.attached {
            if attached.profile.id == profile.id {
                self.attached = None;
            }
        }
        self.manager.disconnect(&profile.id);
        self.system_message(format!("Disconnected '{}'", profile.name))
            .await
    }

    /// A minimal synthetic join so the client can render chat while it
    /// has no session attached.
    async fn send_lobby_world(&mut self) -> anyhow::Result<()> {
        self.io
            .send_packet(server::play::Packet::JoinGame(server::play::JoinGame {
                entity_id: CLIENT_EID,
                gamemode: 3,
                dimension: 1,
                difficulty: 0,
                max_players: 0,
                level_type: "flat".to_owned(),
                reduced_debug_info: false,
            }))
            .await?;
        self.io
            .send_packet(server::play::Packet::PlayerPositionAndLook(
                server::play::PlayerPositionAndLook {
                    x: 0.0,
                    y: 64.0,
                    z: 0.0,
                    yaw: 0.0,
                    pitch: 0.0,
                    flags: 0,
                    teleport_id: 0,
                },
            ))
            .await?;
        Ok(())
    }

    async fn send_roster(&mut self) -> anyhow::Result<()> {
        let mut lines = vec![ChatComponent::text("Profiles:")];
        for profile in self.manager.profiles().all() {
            let (connected, queue) = match self.manager.session(&profile.id) {
                Some(handle) => {
                    let status = handle.status.borrow().clone();
                    (status.connected, status.queue)
                }
                None => (false, None),
            };
            let state = match (connected, queue) {
                (true, Some(queue)) => format!("in queue at {}", queue.position),
                (true, None) => "connected".to_owned(),
                (false, _) => "disconnected".to_owned(),
            };
            lines.push(ChatComponent::clickable(
                format!("\n  {} - {state}", profile.name),
                format!("/connect {}", profile.id),
            ));
        }
        self.io
            .send_packet(server::play::Packet::ChatMessage(server::play::ChatMessage {
                message: ChatComponent::Array(lines),
                position: 1,
            }))
            .await
    }

    async fn send_keep_alive(&mut self) -> anyhow::Result<()> {
        self.keep_alive_counter += 1;
        self.io
            .send_packet(server::play::Packet::KeepAlive(server::play::KeepAlive {
                id: self.keep_alive_counter,
            }))
            .await
    }

    async fn system_message(&mut self, text: String) -> anyhow::Result<()> {
        self.io
            .send_packet(server::play::Packet::ChatMessage(server::play::ChatMessage {
                message: ChatComponent::text(text),
                position: 1,
            }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::no_refresh,
        config::Config,
        profile::{InMemoryProfileStore, ProfileSettings},
        protocol::chat::ChatObject,
    };
    use rsa::{pkcs8::DecodePublicKey, RsaPublicKey};
    use tokio::net::TcpStream;

    async fn start_listener(profiles: Vec<Profile>) -> std::net::SocketAddr {
        let config = Config {
            listen: "127.0.0.1:0".parse().unwrap(),
            ..Config::default()
        };
        let manager = SessionManager::new(config, InMemoryProfileStore::new(profiles), no_refresh());
        let listener = DownstreamListener::bind(manager).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(listener.run());
        addr
    }

    async fn handshake(
        addr: std::net::SocketAddr,
        protocol_version: i32,
        next_state: NextState,
    ) -> VanillaPacketIo<side::Client, state::Handshake> {
        let stream = TcpStream::connect(addr).await.unwrap();
        let io: VanillaPacketIo<side::Client, state::Handshake> = VanillaPacketIo::new(stream);
        io.send_packet(client::handshake::Packet::Handshake(
            client::handshake::Handshake {
                protocol_version,
                server_address: "localhost".into(),
                server_port: addr.port(),
                next_state,
            },
        ))
        .await
        .unwrap();
        io
    }

    #[tokio::test]
    async fn status_ping_round_trip() {
        let addr = start_listener(Vec::new()).await;
        let io = handshake(addr, PROTOCOL_VERSION, NextState::Status).await;
        let io: VanillaPacketIo<side::Client, state::Status> = io.switch_state();

        io.send_packet(client::status::Packet::Request(client::status::Request))
            .await
            .unwrap();
        let server::status::Packet::Response(response) = io.recv_packet().await.unwrap() else {
            panic!("expected status response");
        };
        let json: serde_json::Value = serde_json::from_str(&response.response).unwrap();
        assert_eq!(json["version"]["name"], "1.12.2");
        assert_eq!(json["version"]["protocol"], 340);
        assert_eq!(json["players"]["online"], 0);

        io.send_packet(client::status::Packet::Ping(client::status::Ping {
            payload: 0x0123_4567_89AB_CDEF,
        }))
        .await
        .unwrap();
        let server::status::Packet::Pong(pong) = io.recv_packet().await.unwrap() else {
            panic!("expected pong");
        };
        assert_eq!(pong.payload, 0x0123_4567_89AB_CDEF);
    }

    #[tokio::test]
    async fn outdated_client_is_rejected() {
        let addr = start_listener(Vec::new()).await;
        let io = handshake(addr, 339, NextState::Login).await;
        let io: VanillaPacketIo<side::Client, state::Login> = io.switch_state();

        let server::login::Packet::Disconnect(disconnect) = io.recv_packet().await.unwrap() else {
            panic!("expected disconnect");
        };
        let json = serde_json::to_string(&disconnect.reason).unwrap();
        assert_eq!(
            json,
            r#"{"translate":"multiplayer.disconnect.outdated_client","with":["1.12.2"]}"#
        );
    }

    #[tokio::test]
    async fn unknown_profile_is_rejected() {
        let addr = start_listener(Vec::new()).await;
        let io = handshake(addr, PROTOCOL_VERSION, NextState::Login).await;
        let io: VanillaPacketIo<side::Client, state::Login> = io.switch_state();
        io.send_packet(client::login::Packet::LoginStart(client::login::LoginStart {
            username: "stranger".into(),
        }))
        .await
        .unwrap();

        let server::login::Packet::Disconnect(disconnect) = io.recv_packet().await.unwrap() else {
            panic!("expected disconnect");
        };
        assert_eq!(
            disconnect.reason,
            ChatComponent::text("You need to connect via one of your profiles")
        );
    }

    #[tokio::test]
    async fn full_login_reaches_the_lobby() {
        let profile = Profile {
            id: "cd".repeat(16),
            name: "player".into(),
            access_token: String::new(),
            settings: ProfileSettings::default(),
        };
        let addr = start_listener(vec![profile]).await;
        let io = handshake(addr, PROTOCOL_VERSION, NextState::Login).await;
        let mut io: VanillaPacketIo<side::Client, state::Login> = io.switch_state();
        io.send_packet(client::login::Packet::LoginStart(client::login::LoginStart {
            username: "player".into(),
        }))
        .await
        .unwrap();

        let server::login::Packet::EncryptionRequest(request) = io.recv_packet().await.unwrap()
        else {
            panic!("expected encryption request");
        };
        let public_key = RsaPublicKey::from_public_key_der(&request.public_key).unwrap();
        let secret = [9u8; 16];
        let mut rng = rand::thread_rng();
        io.send_packet(client::login::Packet::EncryptionResponse(
            client::login::EncryptionResponse {
                shared_secret: public_key
                    .encrypt(&mut rng, Pkcs1v15Encrypt, &secret)
                    .unwrap(),
                verify_token: public_key
                    .encrypt(&mut rng, Pkcs1v15Encrypt, &request.verify_token)
                    .unwrap(),
            },
        ))
        .await
        .unwrap();
        io.enable_encryption(EncryptionKey::new(secret));

        let server::login::Packet::SetCompression(compression) = io.recv_packet().await.unwrap()
        else {
            panic!("expected set compression");
        };
        assert_eq!(compression.threshold, 256);
        io.enable_compression(CompressionThreshold::standard());

        let server::login::Packet::LoginSuccess(success) = io.recv_packet().await.unwrap() else {
            panic!("expected login success");
        };
        assert_eq!(success.uuid, NIL_UUID);
        assert_eq!(success.username, "player");

        let io: VanillaPacketIo<side::Client, state::Play> = io.switch_state();
        let server::play::Packet::JoinGame(join) = io.recv_packet().await.unwrap() else {
            panic!("expected the lobby join");
        };
        assert_eq!(join.entity_id, CLIENT_EID);

        // position sync, then the roster listing with clickable rows
        let server::play::Packet::PlayerPositionAndLook(_) = io.recv_packet().await.unwrap() else {
            panic!("expected position");
        };
        let server::play::Packet::ChatMessage(roster) = io.recv_packet().await.unwrap() else {
            panic!("expected the roster message");
        };
        assert_eq!(roster.position, 1);
        let ChatComponent::Array(lines) = &roster.message else {
            panic!("expected a component list");
        };
        assert!(lines.len() >= 2);
        let ChatComponent::Object(ChatObject { click_event, .. }) = &lines[1] else {
            panic!("expected a clickable row");
        };
        assert_eq!(click_event.as_ref().unwrap().action, "run_command");
    }
}
