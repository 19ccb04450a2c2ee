//! The world mirror: a structured snapshot of everything the upstream
//! session has told us, complete enough to reconstitute a world join
//! for a freshly attached client.

pub mod chunk;
pub mod entity;

use crate::{
    position::BlockPosition,
    protocol::{
        chat::ChatComponent,
        packet::server::play::{
            self as play, game_state, BossBarAction, MapIcon, Packet, PlayerListInfo,
            PlayerProperty, TeamsAction,
        },
        slot::Slot,
    },
};
use ahash::{AHashMap, AHashSet};
use chunk::{Chunk, ChunkSection};
use entity::{Entity, EntityKind};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

pub const INVENTORY_SIZE: usize = 46;

/// Chat text that marks leaving the queue.
const QUEUE_EXIT_TEXT: &str = "Connecting to the server";

fn queue_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"(?s)queue: (\d+).+time: ([^\n]+)").unwrap())
}

/// Side effects of applying a packet that the session loop must act on.
#[derive(Clone, Debug)]
pub enum MirrorEvent {
    /// The server moved us; a teleport confirm must be echoed.
    TeleportRequest { teleport_id: i32 },
    /// A chat line arrived (queue latch already applied).
    Chat { message: ChatComponent },
    /// Our gamemode changed mid-session.
    GamemodeChanged { gamemode: u8 },
    /// A health packet arrived (first one flips `health_initialized`).
    HealthChanged { health: f32 },
    /// A player spawned in range; `name` resolved via the tab list.
    PlayerSpawned { name: Option<String> },
    /// The server disconnected us with a reason.
    Disconnected { reason: ChatComponent },
}

#[derive(Clone, Debug, PartialEq, Default, Serialize)]
pub struct PlayerState {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TabPlayer {
    pub name: String,
    pub properties: Vec<PlayerProperty>,
    pub gamemode: i32,
    pub ping: i32,
    pub display_name: Option<ChatComponent>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Team {
    pub display_name: String,
    pub prefix: String,
    pub suffix: String,
    pub friendly_flags: u8,
    pub name_tag_visibility: String,
    pub collision_rule: String,
    pub color: i8,
    pub members: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BossBar {
    pub title: ChatComponent,
    pub health: f32,
    pub color: i32,
    pub division: i32,
    pub flags: u8,
}

pub const MAP_SIZE: usize = 128;

#[derive(Clone, Debug, PartialEq)]
pub struct MapState {
    pub scale: i8,
    pub tracking_position: bool,
    pub icons: Vec<MapIcon>,
    pub data: Box<[u8; MAP_SIZE * MAP_SIZE]>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueueStatus {
    pub position: i32,
    pub time: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WorldMirror {
    pub joined: bool,
    pub self_eid: i32,
    pub gamemode: u8,
    pub dimension: i32,
    pub difficulty: u8,
    pub max_players: u8,
    pub level_type: String,

    pub player: PlayerState,
    pub inventory: Vec<Slot>,
    pub held_item: i8,

    pub health: f32,
    pub food: i32,
    pub saturation: f32,
    pub health_initialized: bool,
    pub xp_bar: f32,
    pub level: i32,
    pub total_xp: i32,

    pub invulnerable: bool,
    pub flying: bool,
    pub allow_flying: bool,
    pub creative_mode: bool,
    pub flying_speed: f32,
    pub fov: f32,

    pub players: AHashMap<u128, TabPlayer>,
    pub teams: AHashMap<String, Team>,
    pub boss_bars: AHashMap<u128, BossBar>,
    pub maps: AHashMap<i32, MapState>,
    pub unlocked_recipes: AHashSet<i32>,
    pub crafting_book_open: bool,
    pub filtering_craftable: bool,

    pub chunks: AHashMap<i32, AHashMap<i32, Chunk>>,
    pub entities: AHashMap<i32, Entity>,

    pub world_age: i64,
    pub time_of_day: i64,
    pub spawn_position: BlockPosition,
    pub raining: bool,
    pub fade_value: f32,
    pub fade_time: f32,
    pub camera: Option<i32>,
    pub riding_eid: Option<i32>,

    pub player_list_header: Option<ChatComponent>,
    pub player_list_footer: Option<ChatComponent>,
    pub queue: Option<QueueStatus>,
}

impl Default for WorldMirror {
    fn default() -> Self {
        Self {
            joined: false,
            self_eid: 0,
            gamemode: 0,
            dimension: 0,
            difficulty: 0,
            max_players: 0,
            level_type: String::new(),
            player: PlayerState::default(),
            inventory: vec![Slot::EMPTY; INVENTORY_SIZE],
            held_item: 0,
            health: 20.0,
            food: 20,
            saturation: 5.0,
            health_initialized: false,
            xp_bar: 0.0,
            level: 0,
            total_xp: 0,
            invulnerable: false,
            flying: false,
            allow_flying: false,
            creative_mode: false,
            flying_speed: 0.05,
            fov: 0.1,
            players: AHashMap::new(),
            teams: AHashMap::new(),
            boss_bars: AHashMap::new(),
            maps: AHashMap::new(),
            unlocked_recipes: AHashSet::new(),
            crafting_book_open: false,
            filtering_craftable: false,
            chunks: AHashMap::new(),
            entities: AHashMap::new(),
            world_age: 0,
            time_of_day: 0,
            spawn_position: BlockPosition::new(0, 0, 0),
            raining: false,
            fade_value: 0.0,
            fade_time: 0.0,
            camera: None,
            riding_eid: None,
            player_list_header: None,
            player_list_footer: None,
            queue: None,
        }
    }
}

impl WorldMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_sky_light(&self) -> bool {
        self.dimension == 0
    }

    /// Applies a clientbound packet to the snapshot. Returns the side
    /// effects the session loop must handle.
    pub fn apply(&mut self, packet: &Packet) -> anyhow::Result<Vec<MirrorEvent>> {
        let mut events = Vec::new();
        match packet {
            Packet::SpawnObject(p) => {
                self.entities.insert(
                    p.entity_id,
                    Entity::new(EntityKind::Object {
                        uuid: p.uuid,
                        object_type: p.kind,
                        data: p.data,
                        position: (p.x, p.y, p.z),
                        velocity: (p.velocity_x, p.velocity_y, p.velocity_z),
                        yaw: p.yaw,
                        pitch: p.pitch,
                    }),
                );
            }
            Packet::SpawnExperienceOrb(p) => {
                self.entities.insert(
                    p.entity_id,
                    Entity::new(EntityKind::Orb {
                        position: (p.x, p.y, p.z),
                        count: p.count,
                    }),
                );
            }
            Packet::SpawnGlobalEntity(p) => {
                self.entities.insert(
                    p.entity_id,
                    Entity::new(EntityKind::Global {
                        global_type: p.kind,
                        position: (p.x, p.y, p.z),
                    }),
                );
            }
            Packet::SpawnMob(p) => {
                let mut entity = Entity::new(EntityKind::Mob {
                    uuid: p.uuid,
                    mob_type: p.kind,
                    position: (p.x, p.y, p.z),
                    velocity: (p.velocity_x, p.velocity_y, p.velocity_z),
                    yaw: p.yaw,
                    pitch: p.pitch,
                    head_pitch: p.head_pitch,
                });
                entity.metadata = p.metadata.clone();
                self.entities.insert(p.entity_id, entity);
            }
            Packet::SpawnPainting(p) => {
                self.entities.insert(
                    p.entity_id,
                    Entity::new(EntityKind::Painting {
                        uuid: p.uuid,
                        title: p.title.clone(),
                        position: p.position,
                        direction: p.direction,
                    }),
                );
            }
            Packet::SpawnPlayer(p) => {
                let mut entity = Entity::new(EntityKind::Player {
                    uuid: p.uuid,
                    position: (p.x, p.y, p.z),
                    yaw: p.yaw,
                    pitch: p.pitch,
                });
                entity.metadata = p.metadata.clone();
                self.entities.insert(p.entity_id, entity);
                events.push(MirrorEvent::PlayerSpawned {
                    name: self.players.get(&p.uuid).map(|player| player.name.clone()),
                });
            }
            Packet::UpdateBlockEntity(p) => {
                self.update_block_entity(p);
            }
            Packet::BlockChange(p) => {
                self.set_block(p.position.x, p.position.y, p.position.z, p.block_id as u16);
            }
            Packet::BossBar(p) => self.apply_boss_bar(p),
            Packet::ChatMessage(p) => {
                if p.message.to_plain_text().contains(QUEUE_EXIT_TEXT) {
                    self.queue = None;
                }
                events.push(MirrorEvent::Chat {
                    message: p.message.clone(),
                });
            }
            Packet::MultiBlockChange(p) => {
                for record in &p.records {
                    self.set_block(
                        p.chunk_x * 16 + record.x(),
                        i32::from(record.y),
                        p.chunk_z * 16 + record.z(),
                        record.block_id as u16,
                    );
                }
            }
            Packet::WindowItems(p) => {
                if p.window_id == 0 {
                    let mut slots = p.slots.clone();
                    slots.resize(INVENTORY_SIZE, Slot::EMPTY);
                    slots.truncate(INVENTORY_SIZE);
                    self.inventory = slots;
                }
            }
            Packet::SetSlot(p) => {
                if p.window_id == 0 {
                    if let Some(slot) = self.inventory.get_mut(p.slot as usize) {
                        *slot = p.item.clone();
                    }
                }
            }
            Packet::Disconnect(p) => {
                events.push(MirrorEvent::Disconnected {
                    reason: p.reason.clone(),
                });
            }
            Packet::Explosion(p) => {
                for (dx, dy, dz) in &p.records {
                    self.set_block(
                        f64::from(p.x).floor() as i32 + i32::from(*dx),
                        f64::from(p.y).floor() as i32 + i32::from(*dy),
                        f64::from(p.z).floor() as i32 + i32::from(*dz),
                        0,
                    );
                }
            }
            Packet::UnloadChunk(p) => {
                if let Some(column) = self.chunks.get_mut(&p.chunk_x) {
                    column.remove(&p.chunk_z);
                    if column.is_empty() {
                        self.chunks.remove(&p.chunk_x);
                    }
                }
            }
            Packet::ChangeGameState(p) => match p.reason {
                game_state::RAIN_END => self.raining = false,
                game_state::RAIN_BEGIN => self.raining = true,
                game_state::GAMEMODE => {
                    self.gamemode = p.value as u8;
                    events.push(MirrorEvent::GamemodeChanged {
                        gamemode: self.gamemode,
                    });
                }
                game_state::FADE_VALUE => self.fade_value = p.value,
                game_state::FADE_TIME => self.fade_time = p.value,
                _ => {}
            },
            Packet::ChunkData(p) => {
                let has_sky_light = self.has_sky_light();
                let column = self.chunks.entry(p.chunk_x).or_default();
                if p.full {
                    let mut chunk = Chunk::new(p.chunk_x, p.chunk_z);
                    chunk.apply(p, has_sky_light)?;
                    column.insert(p.chunk_z, chunk);
                } else {
                    let chunk = column
                        .entry(p.chunk_z)
                        .or_insert_with(|| Chunk::new(p.chunk_x, p.chunk_z));
                    chunk.apply(p, has_sky_light)?;
                }
            }
            Packet::JoinGame(p) => {
                self.joined = true;
                self.self_eid = p.entity_id;
                self.gamemode = p.gamemode;
                self.dimension = p.dimension;
                self.difficulty = p.difficulty;
                self.max_players = p.max_players;
                self.level_type = p.level_type.clone();
                self.entities.insert(
                    p.entity_id,
                    Entity::new(EntityKind::Player {
                        uuid: 0,
                        position: (self.player.x, self.player.y, self.player.z),
                        yaw: self.player.yaw,
                        pitch: self.player.pitch,
                    }),
                );
                events.push(MirrorEvent::GamemodeChanged {
                    gamemode: self.gamemode,
                });
            }
            Packet::Map(p) => self.apply_map(p),
            Packet::EntityRelativeMove(p) => {
                if let Some(entity) = self.entities.get_mut(&p.entity_id) {
                    entity.move_relative(p.delta_x, p.delta_y, p.delta_z);
                }
            }
            Packet::EntityLookAndRelativeMove(p) => {
                if let Some(entity) = self.entities.get_mut(&p.entity_id) {
                    entity.move_relative(p.delta_x, p.delta_y, p.delta_z);
                    entity.set_look(p.yaw, p.pitch);
                }
            }
            Packet::EntityLook(p) => {
                if let Some(entity) = self.entities.get_mut(&p.entity_id) {
                    entity.set_look(p.yaw, p.pitch);
                }
            }
            Packet::VehicleMove(p) => {
                if let Some(riding) = self.riding_eid {
                    if let Some(entity) = self.entities.get_mut(&riding) {
                        entity.set_position((p.x, p.y, p.z));
                    }
                }
                self.player.x = p.x;
                self.player.y = p.y;
                self.player.z = p.z;
            }
            Packet::PlayerAbilities(p) => {
                use play::ability_flags::*;
                self.invulnerable = p.flags & INVULNERABLE != 0;
                self.flying = p.flags & FLYING != 0;
                self.allow_flying = p.flags & ALLOW_FLYING != 0;
                self.creative_mode = p.flags & CREATIVE_MODE != 0;
                self.flying_speed = p.flying_speed;
                self.fov = p.fov_modifier;
            }
            Packet::PlayerListItem(p) => self.apply_player_list(p),
            Packet::PlayerPositionAndLook(p) => {
                // bit set means the value is relative
                self.player.x = if p.flags & 0x01 != 0 {
                    self.player.x + p.x
                } else {
                    p.x
                };
                self.player.y = if p.flags & 0x02 != 0 {
                    self.player.y + p.y
                } else {
                    p.y
                };
                self.player.z = if p.flags & 0x04 != 0 {
                    self.player.z + p.z
                } else {
                    p.z
                };
                self.player.yaw = if p.flags & 0x08 != 0 {
                    self.player.yaw + p.yaw
                } else {
                    p.yaw
                };
                self.player.pitch = if p.flags & 0x10 != 0 {
                    self.player.pitch + p.pitch
                } else {
                    p.pitch
                };
                self.sync_self_entity();
                events.push(MirrorEvent::TeleportRequest {
                    teleport_id: p.teleport_id,
                });
            }
            Packet::UnlockRecipes(p) => {
                self.crafting_book_open = p.crafting_book_open;
                self.filtering_craftable = p.filtering_craftable;
                match p.action {
                    2 => {
                        for recipe in &p.recipes {
                            self.unlocked_recipes.remove(recipe);
                        }
                    }
                    _ => {
                        self.unlocked_recipes.extend(p.recipes.iter().copied());
                        self.unlocked_recipes.extend(p.all_recipes.iter().copied());
                    }
                }
            }
            Packet::DestroyEntities(p) => {
                for entity_id in &p.entity_ids {
                    self.entities.remove(entity_id);
                    if self.riding_eid == Some(*entity_id) {
                        self.riding_eid = None;
                    }
                }
            }
            Packet::Respawn(p) => {
                if p.dimension != self.dimension {
                    let self_entity = self.entities.remove(&self.self_eid);
                    self.entities.clear();
                    if let Some(self_entity) = self_entity {
                        self.entities.insert(self.self_eid, self_entity);
                    }
                    self.chunks.clear();
                    self.maps.clear();
                    self.riding_eid = None;
                }
                self.dimension = p.dimension;
                self.difficulty = p.difficulty;
                self.gamemode = p.gamemode;
                self.level_type = p.level_type.clone();
                events.push(MirrorEvent::GamemodeChanged {
                    gamemode: self.gamemode,
                });
            }
            Packet::EntityHeadLook(p) => {
                if let Some(entity) = self.entities.get_mut(&p.entity_id) {
                    if let EntityKind::Mob { head_pitch, .. } = &mut entity.kind {
                        *head_pitch = p.head_yaw;
                    }
                }
            }
            Packet::Camera(p) => {
                self.camera = Some(p.entity_id);
            }
            Packet::HeldItemChange(p) => {
                self.held_item = p.slot;
            }
            Packet::EntityMetadata(p) => {
                if let Some(entity) = self.entities.get_mut(&p.entity_id) {
                    entity.metadata.merge(&p.metadata);
                }
            }
            Packet::AttachEntity(p) => {
                if let Some(entity) = self.entities.get_mut(&p.attached_entity_id) {
                    entity.attached_to =
                        (p.holding_entity_id != -1).then_some(p.holding_entity_id);
                }
            }
            Packet::EntityVelocity(p) => {
                if let Some(entity) = self.entities.get_mut(&p.entity_id) {
                    entity.set_velocity((p.velocity_x, p.velocity_y, p.velocity_z));
                }
            }
            Packet::EntityEquipment(p) => {
                if let Some(entity) = self.entities.get_mut(&p.entity_id) {
                    entity.equipment.insert(p.slot, p.item.clone());
                }
            }
            Packet::SetExperience(p) => {
                self.xp_bar = p.experience_bar;
                self.level = p.level;
                self.total_xp = p.total_experience;
            }
            Packet::UpdateHealth(p) => {
                self.health = p.health;
                self.food = p.food;
                self.saturation = p.saturation;
                self.health_initialized = true;
                events.push(MirrorEvent::HealthChanged { health: p.health });
            }
            Packet::SetPassengers(p) => {
                if let Some(entity) = self.entities.get_mut(&p.vehicle_id) {
                    entity.passengers = p.passengers.clone();
                }
                if p.passengers.contains(&self.self_eid) {
                    self.riding_eid = Some(p.vehicle_id);
                } else if self.riding_eid == Some(p.vehicle_id) {
                    self.riding_eid = None;
                }
            }
            Packet::Teams(p) => self.apply_teams(p),
            Packet::SpawnPosition(p) => {
                self.spawn_position = p.position;
            }
            Packet::TimeUpdate(p) => {
                self.world_age = p.world_age;
                self.time_of_day = p.time_of_day;
            }
            Packet::PlayerListHeaderFooter(p) => {
                self.player_list_header = Some(p.header.clone());
                self.player_list_footer = Some(p.footer.clone());
                let footer_text = p.footer.to_plain_text();
                if let Some(captures) = queue_regex().captures(&footer_text) {
                    let position = captures[1].parse().unwrap_or(0);
                    self.queue = Some(QueueStatus {
                        position,
                        time: captures[2].to_owned(),
                    });
                }
            }
            Packet::EntityTeleport(p) => {
                if let Some(entity) = self.entities.get_mut(&p.entity_id) {
                    entity.set_position((p.x, p.y, p.z));
                    entity.set_look(p.yaw, p.pitch);
                }
            }
            Packet::EntityProperties(p) => {
                if let Some(entity) = self.entities.get_mut(&p.entity_id) {
                    entity.properties = p.properties.clone();
                }
            }
            _ => {}
        }
        Ok(events)
    }

    fn sync_self_entity(&mut self) {
        let player = self.player.clone();
        let self_eid = self.self_eid;
        if let Some(entity) = self.entities.get_mut(&self_eid) {
            entity.set_position((player.x, player.y, player.z));
            entity.set_look(player.yaw, player.pitch);
        }
    }

    /// Updates the player position from serverbound movement; used by
    /// the bridge's serverbound filter.
    pub fn track_player_position(&mut self, x: f64, y: f64, z: f64) {
        self.player.x = x;
        self.player.y = y;
        self.player.z = z;
        self.sync_self_entity();
    }

    pub fn track_player_look(&mut self, yaw: f32, pitch: f32) {
        self.player.yaw = yaw;
        self.player.pitch = pitch;
        self.sync_self_entity();
    }

    pub fn chunk_at(&self, chunk_x: i32, chunk_z: i32) -> Option<&Chunk> {
        self.chunks.get(&chunk_x)?.get(&chunk_z)
    }

    pub fn block_at(&self, x: i32, y: i32, z: i32) -> u16 {
        let Some(chunk) = self.chunk_at(x >> 4, z >> 4) else {
            return 0;
        };
        if !(0..256).contains(&y) {
            return 0;
        }
        match &chunk.sections[(y >> 4) as usize] {
            Some(section) => section.blocks[ChunkSection::block_index(x, y, z)],
            None => 0,
        }
    }

    fn set_block(&mut self, x: i32, y: i32, z: i32, block: u16) {
        if !(0..256).contains(&y) {
            return;
        }
        let has_sky_light = self.has_sky_light();
        let Some(chunk) = self
            .chunks
            .get_mut(&(x >> 4))
            .and_then(|column| column.get_mut(&(z >> 4)))
        else {
            return;
        };
        let section = &mut chunk.sections[(y >> 4) as usize];
        match section {
            Some(section) => section.blocks[ChunkSection::block_index(x, y, z)] = block,
            None if block != 0 => {
                let mut fresh = ChunkSection::empty(has_sky_light);
                fresh.blocks[ChunkSection::block_index(x, y, z)] = block;
                *section = Some(fresh);
            }
            None => {}
        }
        if block == 0 {
            chunk.block_entities.retain(|tag| {
                (
                    tag.payload.get_int("x"),
                    tag.payload.get_int("y"),
                    tag.payload.get_int("z"),
                ) != (Some(i64::from(x)), Some(i64::from(y)), Some(i64::from(z)))
            });
        }
    }

    fn update_block_entity(&mut self, packet: &play::UpdateBlockEntity) {
        let position = packet.position;
        let Some(chunk) = self
            .chunks
            .get_mut(&(position.x >> 4))
            .and_then(|column| column.get_mut(&(position.z >> 4)))
        else {
            return;
        };
        let coords = (
            Some(i64::from(position.x)),
            Some(i64::from(position.y)),
            Some(i64::from(position.z)),
        );
        chunk.block_entities.retain(|tag| {
            (
                tag.payload.get_int("x"),
                tag.payload.get_int("y"),
                tag.payload.get_int("z"),
            ) != coords
        });
        if let Some(tag) = &packet.nbt.0 {
            chunk.block_entities.push(tag.clone());
        }
    }

    fn apply_boss_bar(&mut self, packet: &play::BossBar) {
        match &packet.action {
            BossBarAction::Add {
                title,
                health,
                color,
                division,
                flags,
            } => {
                self.boss_bars.insert(
                    packet.uuid,
                    BossBar {
                        title: title.clone(),
                        health: *health,
                        color: *color,
                        division: *division,
                        flags: *flags,
                    },
                );
            }
            BossBarAction::Remove => {
                self.boss_bars.remove(&packet.uuid);
            }
            BossBarAction::UpdateHealth { health } => {
                if let Some(bar) = self.boss_bars.get_mut(&packet.uuid) {
                    bar.health = *health;
                }
            }
            BossBarAction::UpdateTitle { title } => {
                if let Some(bar) = self.boss_bars.get_mut(&packet.uuid) {
                    bar.title = title.clone();
                }
            }
            BossBarAction::UpdateStyle { color, division } => {
                if let Some(bar) = self.boss_bars.get_mut(&packet.uuid) {
                    bar.color = *color;
                    bar.division = *division;
                }
            }
            BossBarAction::UpdateFlags { flags } => {
                if let Some(bar) = self.boss_bars.get_mut(&packet.uuid) {
                    bar.flags = *flags;
                }
            }
        }
    }

    fn apply_map(&mut self, packet: &play::Map) {
        let map = self.maps.entry(packet.map_id).or_insert_with(|| MapState {
            scale: packet.scale,
            tracking_position: packet.tracking_position,
            icons: Vec::new(),
            data: Box::new([0; MAP_SIZE * MAP_SIZE]),
        });
        map.scale = packet.scale;
        map.tracking_position = packet.tracking_position;
        map.icons = packet.icons.clone();
        if let Some(update) = &packet.update {
            for column in 0..usize::from(update.columns) {
                for row in 0..usize::from(update.rows) {
                    let Some(&pixel) = update.data.get(row * usize::from(update.columns) + column)
                    else {
                        continue;
                    };
                    let x = usize::from(update.x) + column;
                    let z = usize::from(update.z) + row;
                    if x < MAP_SIZE && z < MAP_SIZE {
                        map.data[z * MAP_SIZE + x] = pixel;
                    }
                }
            }
        }
    }

    fn apply_player_list(&mut self, packet: &play::PlayerListItem) {
        for entry in &packet.players {
            match &entry.info {
                PlayerListInfo::Add {
                    name,
                    properties,
                    gamemode,
                    ping,
                    display_name,
                } => {
                    self.players.insert(
                        entry.uuid,
                        TabPlayer {
                            name: name.clone(),
                            properties: properties.clone(),
                            gamemode: *gamemode,
                            ping: *ping,
                            display_name: display_name.clone(),
                        },
                    );
                }
                PlayerListInfo::UpdateGamemode { gamemode } => {
                    if let Some(player) = self.players.get_mut(&entry.uuid) {
                        player.gamemode = *gamemode;
                    }
                }
                PlayerListInfo::UpdateLatency { ping } => {
                    if let Some(player) = self.players.get_mut(&entry.uuid) {
                        player.ping = *ping;
                    }
                }
                PlayerListInfo::UpdateDisplayName { display_name } => {
                    if let Some(player) = self.players.get_mut(&entry.uuid) {
                        player.display_name = display_name.clone();
                    }
                }
                PlayerListInfo::Remove => {
                    self.players.remove(&entry.uuid);
                }
            }
        }
    }

    fn apply_teams(&mut self, packet: &play::Teams) {
        match &packet.action {
            TeamsAction::Create {
                display_name,
                prefix,
                suffix,
                friendly_flags,
                name_tag_visibility,
                collision_rule,
                color,
                members,
            } => {
                self.teams.insert(
                    packet.name.clone(),
                    Team {
                        display_name: display_name.clone(),
                        prefix: prefix.clone(),
                        suffix: suffix.clone(),
                        friendly_flags: *friendly_flags,
                        name_tag_visibility: name_tag_visibility.clone(),
                        collision_rule: collision_rule.clone(),
                        color: *color,
                        members: members.clone(),
                    },
                );
            }
            TeamsAction::Remove => {
                self.teams.remove(&packet.name);
            }
            TeamsAction::UpdateInfo {
                display_name,
                prefix,
                suffix,
                friendly_flags,
                name_tag_visibility,
                collision_rule,
                color,
            } => {
                if let Some(team) = self.teams.get_mut(&packet.name) {
                    team.display_name = display_name.clone();
                    team.prefix = prefix.clone();
                    team.suffix = suffix.clone();
                    team.friendly_flags = *friendly_flags;
                    team.name_tag_visibility = name_tag_visibility.clone();
                    team.collision_rule = collision_rule.clone();
                    team.color = *color;
                }
            }
            TeamsAction::AddMembers { members } => {
                if let Some(team) = self.teams.get_mut(&packet.name) {
                    for member in members {
                        if !team.members.contains(member) {
                            team.members.push(member.clone());
                        }
                    }
                }
            }
            TeamsAction::RemoveMembers { members } => {
                if let Some(team) = self.teams.get_mut(&packet.name) {
                    team.members.retain(|member| !members.contains(member));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::server::play::{
        ChangeGameState, ChatMessage, JoinGame, PlayerListHeaderFooter, Respawn, UpdateHealth,
    };

    fn join(mirror: &mut WorldMirror) {
        mirror
            .apply(&Packet::JoinGame(JoinGame {
                entity_id: 1,
                gamemode: 0,
                dimension: 0,
                difficulty: 2,
                max_players: 20,
                level_type: "default".into(),
                reduced_debug_info: false,
            }))
            .unwrap();
    }

    #[test]
    fn join_game_seeds_self_entity() {
        let mut mirror = WorldMirror::new();
        join(&mut mirror);
        assert!(mirror.joined);
        assert_eq!(mirror.self_eid, 1);
        assert!(mirror.entities.contains_key(&1));
    }

    #[test]
    fn queue_latched_from_footer_and_cleared_by_chat() {
        let mut mirror = WorldMirror::new();
        mirror
            .apply(&Packet::PlayerListHeaderFooter(PlayerListHeaderFooter {
                header: ChatComponent::text(""),
                footer: ChatComponent::text("position in queue: 42\nestimated time: 1h 30m"),
            }))
            .unwrap();
        assert_eq!(
            mirror.queue,
            Some(QueueStatus {
                position: 42,
                time: "1h 30m".into()
            })
        );

        // an unrelated footer does not clear the latch
        mirror
            .apply(&Packet::PlayerListHeaderFooter(PlayerListHeaderFooter {
                header: ChatComponent::text(""),
                footer: ChatComponent::text("play.example.net"),
            }))
            .unwrap();
        assert!(mirror.queue.is_some());

        mirror
            .apply(&Packet::ChatMessage(ChatMessage {
                message: ChatComponent::text("Connecting to the server..."),
                position: 0,
            }))
            .unwrap();
        assert_eq!(mirror.queue, None);
    }

    #[test]
    fn health_packet_flips_initialized() {
        let mut mirror = WorldMirror::new();
        assert!(!mirror.health_initialized);
        let events = mirror
            .apply(&Packet::UpdateHealth(UpdateHealth {
                health: 3.0,
                food: 10,
                saturation: 0.0,
            }))
            .unwrap();
        assert!(mirror.health_initialized);
        assert!(matches!(
            events.as_slice(),
            [MirrorEvent::HealthChanged { health }] if *health == 3.0
        ));
    }

    #[test]
    fn respawn_to_new_dimension_clears_world_but_keeps_self() {
        let mut mirror = WorldMirror::new();
        join(&mut mirror);
        mirror.entities.insert(
            50,
            Entity::new(EntityKind::Orb {
                position: (0.0, 0.0, 0.0),
                count: 3,
            }),
        );
        mirror
            .chunks
            .entry(0)
            .or_default()
            .insert(0, Chunk::new(0, 0));
        mirror.maps.insert(
            0,
            MapState {
                scale: 0,
                tracking_position: false,
                icons: Vec::new(),
                data: Box::new([0; MAP_SIZE * MAP_SIZE]),
            },
        );

        mirror
            .apply(&Packet::Respawn(Respawn {
                dimension: -1,
                difficulty: 2,
                gamemode: 0,
                level_type: "default".into(),
            }))
            .unwrap();

        assert_eq!(mirror.dimension, -1);
        assert_eq!(mirror.entities.len(), 1);
        assert!(mirror.entities.contains_key(&1));
        assert!(mirror.chunks.is_empty());
        assert!(mirror.maps.is_empty());
    }

    #[test]
    fn game_state_changes() {
        let mut mirror = WorldMirror::new();
        mirror
            .apply(&Packet::ChangeGameState(ChangeGameState {
                reason: game_state::RAIN_BEGIN,
                value: 0.0,
            }))
            .unwrap();
        assert!(mirror.raining);
        let events = mirror
            .apply(&Packet::ChangeGameState(ChangeGameState {
                reason: game_state::GAMEMODE,
                value: 1.0,
            }))
            .unwrap();
        assert_eq!(mirror.gamemode, 1);
        assert!(matches!(
            events.as_slice(),
            [MirrorEvent::GamemodeChanged { gamemode: 1 }]
        ));
    }

    #[test]
    fn block_change_allocates_section_and_purges_block_entities() {
        use crate::protocol::nbt::{NamedTag, Nbt, NbtCompound};

        let mut mirror = WorldMirror::new();
        join(&mut mirror);
        let mut chunk = Chunk::new(0, 0);
        chunk.block_entities.push(NamedTag::new(NbtCompound(vec![
            ("x".into(), Nbt::Int(5)),
            ("y".into(), Nbt::Int(64)),
            ("z".into(), Nbt::Int(5)),
        ])));
        mirror.chunks.entry(0).or_default().insert(0, chunk);

        mirror.set_block(5, 64, 5, 1 << 4);
        assert_eq!(mirror.block_at(5, 64, 5), 1 << 4);
        assert_eq!(mirror.chunk_at(0, 0).unwrap().block_entities.len(), 1);

        mirror.set_block(5, 64, 5, 0);
        assert_eq!(mirror.block_at(5, 64, 5), 0);
        assert!(mirror.chunk_at(0, 0).unwrap().block_entities.is_empty());
    }

    #[test]
    fn set_passengers_tracks_riding() {
        let mut mirror = WorldMirror::new();
        join(&mut mirror);
        mirror.entities.insert(
            9,
            Entity::new(EntityKind::Object {
                uuid: 0,
                object_type: 1,
                data: 0,
                position: (0.0, 0.0, 0.0),
                velocity: (0, 0, 0),
                yaw: 0.0,
                pitch: 0.0,
            }),
        );
        mirror
            .apply(&Packet::SetPassengers(play::SetPassengers {
                vehicle_id: 9,
                passengers: vec![1],
            }))
            .unwrap();
        assert_eq!(mirror.riding_eid, Some(9));
        mirror
            .apply(&Packet::SetPassengers(play::SetPassengers {
                vehicle_id: 9,
                passengers: vec![],
            }))
            .unwrap();
        assert_eq!(mirror.riding_eid, None);
    }
}
