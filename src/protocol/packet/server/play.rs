//! Clientbound Play packets for protocol 340.
//!
//! Everything the world mirror, replay engine or rewriter touches is
//! fully typed; the rest keeps its body as a raw tail.

use crate::{
    position::BlockPosition,
    protocol::{
        chat::ChatComponent, decoder, metadata::Metadata, nbt::NamedTag, nbt::OptionalNbt,
        slot::Slot, Decode, Decoder, Encode, Encoder,
    },
};
use minecraft_session_proxy_macros::{Decode, Encode};

#[derive(Debug, Clone, Encode, Decode, strum::AsRefStr)]
#[encoding(discriminant = "varint")]
pub enum Packet {
    #[encoding(id = 0x00)]
    SpawnObject(SpawnObject),
    #[encoding(id = 0x01)]
    SpawnExperienceOrb(SpawnExperienceOrb),
    #[encoding(id = 0x02)]
    SpawnGlobalEntity(SpawnGlobalEntity),
    #[encoding(id = 0x03)]
    SpawnMob(SpawnMob),
    #[encoding(id = 0x04)]
    SpawnPainting(SpawnPainting),
    #[encoding(id = 0x05)]
    SpawnPlayer(SpawnPlayer),
    #[encoding(id = 0x06)]
    Animation(Animation),
    #[encoding(id = 0x07)]
    Statistics(Statistics),
    #[encoding(id = 0x08)]
    BlockBreakAnimation(BlockBreakAnimation),
    #[encoding(id = 0x09)]
    UpdateBlockEntity(UpdateBlockEntity),
    #[encoding(id = 0x0A)]
    BlockAction(BlockAction),
    #[encoding(id = 0x0B)]
    BlockChange(BlockChange),
    #[encoding(id = 0x0C)]
    BossBar(BossBar),
    #[encoding(id = 0x0D)]
    ServerDifficulty(ServerDifficulty),
    #[encoding(id = 0x0E)]
    TabComplete(TabComplete),
    #[encoding(id = 0x0F)]
    ChatMessage(ChatMessage),
    #[encoding(id = 0x10)]
    MultiBlockChange(MultiBlockChange),
    #[encoding(id = 0x11)]
    ConfirmTransaction(ConfirmTransaction),
    #[encoding(id = 0x12)]
    CloseWindow(CloseWindow),
    #[encoding(id = 0x13)]
    OpenWindow(OpenWindow),
    #[encoding(id = 0x14)]
    WindowItems(WindowItems),
    #[encoding(id = 0x15)]
    WindowProperty(WindowProperty),
    #[encoding(id = 0x16)]
    SetSlot(SetSlot),
    #[encoding(id = 0x17)]
    SetCooldown(SetCooldown),
    #[encoding(id = 0x18)]
    PluginMessage(PluginMessage),
    #[encoding(id = 0x19)]
    NamedSoundEffect(NamedSoundEffect),
    #[encoding(id = 0x1A)]
    Disconnect(Disconnect),
    #[encoding(id = 0x1B)]
    EntityStatus(EntityStatus),
    #[encoding(id = 0x1C)]
    Explosion(Explosion),
    #[encoding(id = 0x1D)]
    UnloadChunk(UnloadChunk),
    #[encoding(id = 0x1E)]
    ChangeGameState(ChangeGameState),
    #[encoding(id = 0x1F)]
    KeepAlive(KeepAlive),
    #[encoding(id = 0x20)]
    ChunkData(ChunkData),
    #[encoding(id = 0x21)]
    Effect(Effect),
    #[encoding(id = 0x22)]
    Particle(Particle),
    #[encoding(id = 0x23)]
    JoinGame(JoinGame),
    #[encoding(id = 0x24)]
    Map(Map),
    #[encoding(id = 0x25)]
    EntityIdle(EntityIdle),
    #[encoding(id = 0x26)]
    EntityRelativeMove(EntityRelativeMove),
    #[encoding(id = 0x27)]
    EntityLookAndRelativeMove(EntityLookAndRelativeMove),
    #[encoding(id = 0x28)]
    EntityLook(EntityLook),
    #[encoding(id = 0x29)]
    VehicleMove(VehicleMove),
    #[encoding(id = 0x2A)]
    OpenSignEditor(OpenSignEditor),
    #[encoding(id = 0x2B)]
    CraftRecipeResponse(CraftRecipeResponse),
    #[encoding(id = 0x2C)]
    PlayerAbilities(PlayerAbilities),
    #[encoding(id = 0x2D)]
    CombatEvent(CombatEvent),
    #[encoding(id = 0x2E)]
    PlayerListItem(PlayerListItem),
    #[encoding(id = 0x2F)]
    PlayerPositionAndLook(PlayerPositionAndLook),
    #[encoding(id = 0x30)]
    UseBed(UseBed),
    #[encoding(id = 0x31)]
    UnlockRecipes(UnlockRecipes),
    #[encoding(id = 0x32)]
    DestroyEntities(DestroyEntities),
    #[encoding(id = 0x33)]
    RemoveEntityEffect(RemoveEntityEffect),
    #[encoding(id = 0x34)]
    ResourcePackSend(ResourcePackSend),
    #[encoding(id = 0x35)]
    Respawn(Respawn),
    #[encoding(id = 0x36)]
    EntityHeadLook(EntityHeadLook),
    #[encoding(id = 0x37)]
    SelectAdvancementTab(SelectAdvancementTab),
    #[encoding(id = 0x38)]
    WorldBorder(WorldBorder),
    #[encoding(id = 0x39)]
    Camera(Camera),
    #[encoding(id = 0x3A)]
    HeldItemChange(HeldItemChange),
    #[encoding(id = 0x3B)]
    DisplayScoreboard(DisplayScoreboard),
    #[encoding(id = 0x3C)]
    EntityMetadata(EntityMetadata),
    #[encoding(id = 0x3D)]
    AttachEntity(AttachEntity),
    #[encoding(id = 0x3E)]
    EntityVelocity(EntityVelocity),
    #[encoding(id = 0x3F)]
    EntityEquipment(EntityEquipment),
    #[encoding(id = 0x40)]
    SetExperience(SetExperience),
    #[encoding(id = 0x41)]
    UpdateHealth(UpdateHealth),
    #[encoding(id = 0x42)]
    ScoreboardObjective(ScoreboardObjective),
    #[encoding(id = 0x43)]
    SetPassengers(SetPassengers),
    #[encoding(id = 0x44)]
    Teams(Teams),
    #[encoding(id = 0x45)]
    UpdateScore(UpdateScore),
    #[encoding(id = 0x46)]
    SpawnPosition(SpawnPosition),
    #[encoding(id = 0x47)]
    TimeUpdate(TimeUpdate),
    #[encoding(id = 0x48)]
    Title(Title),
    #[encoding(id = 0x49)]
    SoundEffect(SoundEffect),
    #[encoding(id = 0x4A)]
    PlayerListHeaderFooter(PlayerListHeaderFooter),
    #[encoding(id = 0x4B)]
    CollectItem(CollectItem),
    #[encoding(id = 0x4C)]
    EntityTeleport(EntityTeleport),
    #[encoding(id = 0x4D)]
    Advancements(Advancements),
    #[encoding(id = 0x4E)]
    EntityProperties(EntityProperties),
    #[encoding(id = 0x4F)]
    EntityEffect(EntityEffect),
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SpawnObject {
    #[encoding(varint)]
    pub entity_id: i32,
    pub uuid: u128,
    pub kind: i8,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[encoding(angle)]
    pub pitch: f32,
    #[encoding(angle)]
    pub yaw: f32,
    pub data: i32,
    pub velocity_x: i16,
    pub velocity_y: i16,
    pub velocity_z: i16,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SpawnExperienceOrb {
    #[encoding(varint)]
    pub entity_id: i32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub count: i16,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SpawnGlobalEntity {
    #[encoding(varint)]
    pub entity_id: i32,
    pub kind: u8,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SpawnMob {
    #[encoding(varint)]
    pub entity_id: i32,
    pub uuid: u128,
    #[encoding(varint)]
    pub kind: i32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[encoding(angle)]
    pub yaw: f32,
    #[encoding(angle)]
    pub pitch: f32,
    #[encoding(angle)]
    pub head_pitch: f32,
    pub velocity_x: i16,
    pub velocity_y: i16,
    pub velocity_z: i16,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SpawnPainting {
    #[encoding(varint)]
    pub entity_id: i32,
    pub uuid: u128,
    pub title: String,
    pub position: BlockPosition,
    pub direction: u8,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SpawnPlayer {
    #[encoding(varint)]
    pub entity_id: i32,
    pub uuid: u128,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[encoding(angle)]
    pub yaw: f32,
    #[encoding(angle)]
    pub pitch: f32,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Animation {
    #[encoding(varint)]
    pub entity_id: i32,
    pub animation: u8,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Statistics {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct BlockBreakAnimation {
    #[encoding(varint)]
    pub entity_id: i32,
    pub position: BlockPosition,
    pub stage: i8,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct UpdateBlockEntity {
    pub position: BlockPosition,
    pub action: u8,
    pub nbt: OptionalNbt,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct BlockAction {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct BlockChange {
    pub position: BlockPosition,
    #[encoding(varint)]
    pub block_id: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct BossBar {
    pub uuid: u128,
    pub action: BossBarAction,
}

#[derive(Debug, Clone, Encode, Decode)]
#[encoding(discriminant = "varint")]
pub enum BossBarAction {
    #[encoding(id = 0)]
    Add {
        title: ChatComponent,
        health: f32,
        #[encoding(varint)]
        color: i32,
        #[encoding(varint)]
        division: i32,
        flags: u8,
    },
    #[encoding(id = 1)]
    Remove,
    #[encoding(id = 2)]
    UpdateHealth { health: f32 },
    #[encoding(id = 3)]
    UpdateTitle { title: ChatComponent },
    #[encoding(id = 4)]
    UpdateStyle {
        #[encoding(varint)]
        color: i32,
        #[encoding(varint)]
        division: i32,
    },
    #[encoding(id = 5)]
    UpdateFlags { flags: u8 },
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ServerDifficulty {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct TabComplete {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ChatMessage {
    pub message: ChatComponent,
    /// 0 chat box, 1 system message, 2 above hotbar.
    pub position: u8,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct MultiBlockChange {
    pub chunk_x: i32,
    pub chunk_z: i32,
    #[encoding(length_prefix = "varint")]
    pub records: Vec<BlockChangeRecord>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct BlockChangeRecord {
    /// x in the high nibble, z in the low nibble.
    pub horizontal: u8,
    pub y: u8,
    #[encoding(varint)]
    pub block_id: i32,
}

impl BlockChangeRecord {
    pub fn x(&self) -> i32 {
        i32::from(self.horizontal >> 4)
    }

    pub fn z(&self) -> i32 {
        i32::from(self.horizontal & 0xF)
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ConfirmTransaction {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct CloseWindow {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct OpenWindow {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct WindowItems {
    pub window_id: u8,
    pub slots: Vec<Slot>,
}

impl Encode for WindowItems {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_u8(self.window_id);
        encoder.write_i16(self.slots.len().try_into().unwrap_or(i16::MAX));
        for slot in &self.slots {
            slot.encode(encoder);
        }
    }
}

impl Decode for WindowItems {
    fn decode(decoder: &mut Decoder) -> decoder::Result<Self> {
        let window_id = decoder.read_u8()?;
        let count = decoder.read_i16()?.max(0);
        let mut slots = Vec::with_capacity(count as usize);
        for _ in 0..count {
            slots.push(Slot::decode(decoder)?);
        }
        Ok(Self { window_id, slots })
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct WindowProperty {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SetSlot {
    pub window_id: i8,
    pub slot: i16,
    pub item: Slot,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SetCooldown {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct PluginMessage {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct NamedSoundEffect {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Disconnect {
    pub reason: ChatComponent,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct EntityStatus {
    /// Plain int, not a varint.
    pub entity_id: i32,
    pub status: i8,
}

#[derive(Debug, Clone)]
pub struct Explosion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub radius: f32,
    /// Block offsets relative to the explosion centre, each set to air.
    pub records: Vec<(i8, i8, i8)>,
    pub motion_x: f32,
    pub motion_y: f32,
    pub motion_z: f32,
}

impl Encode for Explosion {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_f32(self.x);
        encoder.write_f32(self.y);
        encoder.write_f32(self.z);
        encoder.write_f32(self.radius);
        encoder.write_i32(self.records.len().try_into().unwrap_or(i32::MAX));
        for (dx, dy, dz) in &self.records {
            encoder.write_i8(*dx);
            encoder.write_i8(*dy);
            encoder.write_i8(*dz);
        }
        encoder.write_f32(self.motion_x);
        encoder.write_f32(self.motion_y);
        encoder.write_f32(self.motion_z);
    }
}

impl Decode for Explosion {
    fn decode(decoder: &mut Decoder) -> decoder::Result<Self> {
        let x = decoder.read_f32()?;
        let y = decoder.read_f32()?;
        let z = decoder.read_f32()?;
        let radius = decoder.read_f32()?;
        let count = decoder.read_i32()?.max(0);
        let mut records = Vec::with_capacity((count as usize).min(4096));
        for _ in 0..count {
            records.push((decoder.read_i8()?, decoder.read_i8()?, decoder.read_i8()?));
        }
        Ok(Self {
            x,
            y,
            z,
            radius,
            records,
            motion_x: decoder.read_f32()?,
            motion_y: decoder.read_f32()?,
            motion_z: decoder.read_f32()?,
        })
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct UnloadChunk {
    pub chunk_x: i32,
    pub chunk_z: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ChangeGameState {
    pub reason: u8,
    pub value: f32,
}

/// Game state change reasons used by the mirror.
pub mod game_state {
    pub const RAIN_END: u8 = 1;
    pub const RAIN_BEGIN: u8 = 2;
    pub const GAMEMODE: u8 = 3;
    pub const FADE_VALUE: u8 = 7;
    pub const FADE_TIME: u8 = 8;
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct KeepAlive {
    pub id: i64,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ChunkData {
    pub chunk_x: i32,
    pub chunk_z: i32,
    /// Ground-up continuous: a full column including biomes.
    pub full: bool,
    #[encoding(varint)]
    pub section_bitmask: i32,
    /// Section payloads, parsed by the chunk store (the layout depends
    /// on the current dimension).
    #[encoding(length_prefix = "varint")]
    pub data: Vec<u8>,
    #[encoding(length_prefix = "varint")]
    pub block_entities: Vec<NamedTag>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Effect {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Particle {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct JoinGame {
    pub entity_id: i32,
    pub gamemode: u8,
    pub dimension: i32,
    pub difficulty: u8,
    pub max_players: u8,
    pub level_type: String,
    pub reduced_debug_info: bool,
}

#[derive(Debug, Clone)]
pub struct Map {
    pub map_id: i32,
    pub scale: i8,
    pub tracking_position: bool,
    pub icons: Vec<MapIcon>,
    /// `None` when the packet carries icons only.
    pub update: Option<MapUpdate>,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct MapIcon {
    /// Icon type in the high nibble, direction in the low nibble.
    pub direction_and_type: u8,
    pub x: u8,
    pub z: u8,
}

#[derive(Debug, Clone)]
pub struct MapUpdate {
    pub columns: u8,
    pub rows: u8,
    pub x: u8,
    pub z: u8,
    pub data: Vec<u8>,
}

impl Encode for Map {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_var_int(self.map_id);
        encoder.write_i8(self.scale);
        encoder.write_bool(self.tracking_position);
        encoder.write_var_int(self.icons.len().try_into().unwrap_or(i32::MAX));
        for icon in &self.icons {
            icon.encode(encoder);
        }
        match &self.update {
            Some(update) => {
                encoder.write_u8(update.columns);
                encoder.write_u8(update.rows);
                encoder.write_u8(update.x);
                encoder.write_u8(update.z);
                encoder.write_var_int(update.data.len().try_into().unwrap_or(i32::MAX));
                encoder.write_slice(&update.data);
            }
            None => encoder.write_u8(0),
        }
    }
}

impl Decode for Map {
    fn decode(decoder: &mut Decoder) -> decoder::Result<Self> {
        let map_id = decoder.read_var_int()?;
        let scale = decoder.read_i8()?;
        let tracking_position = decoder.read_bool()?;
        let icon_count = decoder.read_var_int()?.max(0);
        let mut icons = Vec::with_capacity((icon_count as usize).min(256));
        for _ in 0..icon_count {
            icons.push(MapIcon::decode(decoder)?);
        }
        let columns = decoder.read_u8()?;
        let update = if columns > 0 {
            let rows = decoder.read_u8()?;
            let x = decoder.read_u8()?;
            let z = decoder.read_u8()?;
            let length = usize::try_from(decoder.read_var_int()?)?;
            let data = decoder.consume_slice(length)?.to_vec();
            Some(MapUpdate {
                columns,
                rows,
                x,
                z,
                data,
            })
        } else {
            None
        };
        Ok(Self {
            map_id,
            scale,
            tracking_position,
            icons,
            update,
        })
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct EntityIdle {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct EntityRelativeMove {
    #[encoding(varint)]
    pub entity_id: i32,
    pub delta_x: i16,
    pub delta_y: i16,
    pub delta_z: i16,
    pub on_ground: bool,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct EntityLookAndRelativeMove {
    #[encoding(varint)]
    pub entity_id: i32,
    pub delta_x: i16,
    pub delta_y: i16,
    pub delta_z: i16,
    #[encoding(angle)]
    pub yaw: f32,
    #[encoding(angle)]
    pub pitch: f32,
    pub on_ground: bool,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct EntityLook {
    #[encoding(varint)]
    pub entity_id: i32,
    #[encoding(angle)]
    pub yaw: f32,
    #[encoding(angle)]
    pub pitch: f32,
    pub on_ground: bool,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct VehicleMove {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct OpenSignEditor {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct CraftRecipeResponse {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct PlayerAbilities {
    pub flags: u8,
    pub flying_speed: f32,
    pub fov_modifier: f32,
}

/// Bit assignments of [`PlayerAbilities::flags`].
pub mod ability_flags {
    pub const INVULNERABLE: u8 = 0x01;
    pub const FLYING: u8 = 0x02;
    pub const ALLOW_FLYING: u8 = 0x04;
    pub const CREATIVE_MODE: u8 = 0x08;
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct CombatEvent {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct PlayerListItem {
    pub action: i32,
    pub players: Vec<PlayerListEntry>,
}

pub mod player_list_action {
    pub const ADD: i32 = 0;
    pub const UPDATE_GAMEMODE: i32 = 1;
    pub const UPDATE_LATENCY: i32 = 2;
    pub const UPDATE_DISPLAY_NAME: i32 = 3;
    pub const REMOVE: i32 = 4;
}

#[derive(Debug, Clone)]
pub struct PlayerListEntry {
    pub uuid: u128,
    pub info: PlayerListInfo,
}

#[derive(Debug, Clone)]
pub enum PlayerListInfo {
    Add {
        name: String,
        properties: Vec<PlayerProperty>,
        gamemode: i32,
        ping: i32,
        display_name: Option<ChatComponent>,
    },
    UpdateGamemode {
        gamemode: i32,
    },
    UpdateLatency {
        ping: i32,
    },
    UpdateDisplayName {
        display_name: Option<ChatComponent>,
    },
    Remove,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct PlayerProperty {
    pub name: String,
    pub value: String,
    #[encoding(bool_prefixed)]
    pub signature: Option<String>,
}

impl Encode for PlayerListItem {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_var_int(self.action);
        encoder.write_var_int(self.players.len().try_into().unwrap_or(i32::MAX));
        for entry in &self.players {
            entry.uuid.encode(encoder);
            match &entry.info {
                PlayerListInfo::Add {
                    name,
                    properties,
                    gamemode,
                    ping,
                    display_name,
                } => {
                    encoder.write_string(name);
                    encoder.write_var_int(properties.len().try_into().unwrap_or(i32::MAX));
                    for property in properties {
                        property.encode(encoder);
                    }
                    encoder.write_var_int(*gamemode);
                    encoder.write_var_int(*ping);
                    encoder.write_bool(display_name.is_some());
                    if let Some(display_name) = display_name {
                        display_name.encode(encoder);
                    }
                }
                PlayerListInfo::UpdateGamemode { gamemode } => {
                    encoder.write_var_int(*gamemode);
                }
                PlayerListInfo::UpdateLatency { ping } => {
                    encoder.write_var_int(*ping);
                }
                PlayerListInfo::UpdateDisplayName { display_name } => {
                    encoder.write_bool(display_name.is_some());
                    if let Some(display_name) = display_name {
                        display_name.encode(encoder);
                    }
                }
                PlayerListInfo::Remove => {}
            }
        }
    }
}

impl Decode for PlayerListItem {
    fn decode(decoder: &mut Decoder) -> decoder::Result<Self> {
        let action = decoder.read_var_int()?;
        let count = decoder.read_var_int()?.max(0);
        let mut players = Vec::with_capacity((count as usize).min(1024));
        for _ in 0..count {
            let uuid = u128::decode(decoder)?;
            let info = match action {
                player_list_action::ADD => {
                    let name = String::decode(decoder)?;
                    let property_count = decoder.read_var_int()?.max(0);
                    let mut properties = Vec::with_capacity((property_count as usize).min(16));
                    for _ in 0..property_count {
                        properties.push(PlayerProperty::decode(decoder)?);
                    }
                    let gamemode = decoder.read_var_int()?;
                    let ping = decoder.read_var_int()?;
                    let display_name = if decoder.read_bool()? {
                        Some(ChatComponent::decode(decoder)?)
                    } else {
                        None
                    };
                    PlayerListInfo::Add {
                        name,
                        properties,
                        gamemode,
                        ping,
                        display_name,
                    }
                }
                player_list_action::UPDATE_GAMEMODE => PlayerListInfo::UpdateGamemode {
                    gamemode: decoder.read_var_int()?,
                },
                player_list_action::UPDATE_LATENCY => PlayerListInfo::UpdateLatency {
                    ping: decoder.read_var_int()?,
                },
                player_list_action::UPDATE_DISPLAY_NAME => PlayerListInfo::UpdateDisplayName {
                    display_name: if decoder.read_bool()? {
                        Some(ChatComponent::decode(decoder)?)
                    } else {
                        None
                    },
                },
                player_list_action::REMOVE => PlayerListInfo::Remove,
                other => {
                    return Err(crate::protocol::DecodeError::UnknownDiscriminant(i64::from(
                        other,
                    )))
                }
            };
            players.push(PlayerListEntry { uuid, info });
        }
        Ok(Self { action, players })
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct PlayerPositionAndLook {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    /// Bit set means the corresponding value is a delta.
    pub flags: u8,
    #[encoding(varint)]
    pub teleport_id: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct UseBed {
    #[encoding(varint)]
    pub entity_id: i32,
    pub position: BlockPosition,
}

#[derive(Debug, Clone)]
pub struct UnlockRecipes {
    /// 0 init, 1 add, 2 remove.
    pub action: i32,
    pub crafting_book_open: bool,
    pub filtering_craftable: bool,
    pub recipes: Vec<i32>,
    /// Only present for action 0.
    pub all_recipes: Vec<i32>,
}

impl Encode for UnlockRecipes {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_var_int(self.action);
        encoder.write_bool(self.crafting_book_open);
        encoder.write_bool(self.filtering_craftable);
        encoder.write_var_int(self.recipes.len().try_into().unwrap_or(i32::MAX));
        for recipe in &self.recipes {
            encoder.write_var_int(*recipe);
        }
        if self.action == 0 {
            encoder.write_var_int(self.all_recipes.len().try_into().unwrap_or(i32::MAX));
            for recipe in &self.all_recipes {
                encoder.write_var_int(*recipe);
            }
        }
    }
}

impl Decode for UnlockRecipes {
    fn decode(decoder: &mut Decoder) -> decoder::Result<Self> {
        let action = decoder.read_var_int()?;
        let crafting_book_open = decoder.read_bool()?;
        let filtering_craftable = decoder.read_bool()?;
        let count = decoder.read_var_int()?.max(0);
        let mut recipes = Vec::with_capacity((count as usize).min(4096));
        for _ in 0..count {
            recipes.push(decoder.read_var_int()?);
        }
        let mut all_recipes = Vec::new();
        if action == 0 {
            let count = decoder.read_var_int()?.max(0);
            for _ in 0..count {
                all_recipes.push(decoder.read_var_int()?);
            }
        }
        Ok(Self {
            action,
            crafting_book_open,
            filtering_craftable,
            recipes,
            all_recipes,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DestroyEntities {
    pub entity_ids: Vec<i32>,
}

impl Encode for DestroyEntities {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_var_int(self.entity_ids.len().try_into().unwrap_or(i32::MAX));
        for id in &self.entity_ids {
            encoder.write_var_int(*id);
        }
    }
}

impl Decode for DestroyEntities {
    fn decode(decoder: &mut Decoder) -> decoder::Result<Self> {
        let count = decoder.read_var_int()?.max(0);
        let mut entity_ids = Vec::with_capacity((count as usize).min(4096));
        for _ in 0..count {
            entity_ids.push(decoder.read_var_int()?);
        }
        Ok(Self { entity_ids })
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct RemoveEntityEffect {
    #[encoding(varint)]
    pub entity_id: i32,
    pub effect: u8,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ResourcePackSend {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Respawn {
    pub dimension: i32,
    pub difficulty: u8,
    pub gamemode: u8,
    pub level_type: String,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct EntityHeadLook {
    #[encoding(varint)]
    pub entity_id: i32,
    #[encoding(angle)]
    pub head_yaw: f32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SelectAdvancementTab {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct WorldBorder {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Camera {
    #[encoding(varint)]
    pub entity_id: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct HeldItemChange {
    pub slot: i8,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct DisplayScoreboard {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct EntityMetadata {
    #[encoding(varint)]
    pub entity_id: i32,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct AttachEntity {
    pub attached_entity_id: i32,
    pub holding_entity_id: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct EntityVelocity {
    #[encoding(varint)]
    pub entity_id: i32,
    pub velocity_x: i16,
    pub velocity_y: i16,
    pub velocity_z: i16,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct EntityEquipment {
    #[encoding(varint)]
    pub entity_id: i32,
    #[encoding(varint)]
    pub slot: i32,
    pub item: Slot,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SetExperience {
    pub experience_bar: f32,
    #[encoding(varint)]
    pub level: i32,
    #[encoding(varint)]
    pub total_experience: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct UpdateHealth {
    pub health: f32,
    #[encoding(varint)]
    pub food: i32,
    pub saturation: f32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ScoreboardObjective {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct SetPassengers {
    pub vehicle_id: i32,
    pub passengers: Vec<i32>,
}

impl Encode for SetPassengers {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_var_int(self.vehicle_id);
        encoder.write_var_int(self.passengers.len().try_into().unwrap_or(i32::MAX));
        for id in &self.passengers {
            encoder.write_var_int(*id);
        }
    }
}

impl Decode for SetPassengers {
    fn decode(decoder: &mut Decoder) -> decoder::Result<Self> {
        let vehicle_id = decoder.read_var_int()?;
        let count = decoder.read_var_int()?.max(0);
        let mut passengers = Vec::with_capacity((count as usize).min(64));
        for _ in 0..count {
            passengers.push(decoder.read_var_int()?);
        }
        Ok(Self {
            vehicle_id,
            passengers,
        })
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Teams {
    pub name: String,
    pub action: TeamsAction,
}

#[derive(Debug, Clone, Encode, Decode)]
#[encoding(discriminant = "byte")]
pub enum TeamsAction {
    #[encoding(id = 0)]
    Create {
        display_name: String,
        prefix: String,
        suffix: String,
        friendly_flags: u8,
        name_tag_visibility: String,
        collision_rule: String,
        color: i8,
        #[encoding(length_prefix = "varint")]
        members: Vec<String>,
    },
    #[encoding(id = 1)]
    Remove,
    #[encoding(id = 2)]
    UpdateInfo {
        display_name: String,
        prefix: String,
        suffix: String,
        friendly_flags: u8,
        name_tag_visibility: String,
        collision_rule: String,
        color: i8,
    },
    #[encoding(id = 3)]
    AddMembers {
        #[encoding(length_prefix = "varint")]
        members: Vec<String>,
    },
    #[encoding(id = 4)]
    RemoveMembers {
        #[encoding(length_prefix = "varint")]
        members: Vec<String>,
    },
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct UpdateScore {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SpawnPosition {
    pub position: BlockPosition,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct TimeUpdate {
    pub world_age: i64,
    pub time_of_day: i64,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Title {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SoundEffect {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct PlayerListHeaderFooter {
    pub header: ChatComponent,
    pub footer: ChatComponent,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct CollectItem {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct EntityTeleport {
    #[encoding(varint)]
    pub entity_id: i32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[encoding(angle)]
    pub yaw: f32,
    #[encoding(angle)]
    pub pitch: f32,
    pub on_ground: bool,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Advancements {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct EntityProperties {
    pub entity_id: i32,
    pub properties: Vec<EntityProperty>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityProperty {
    pub key: String,
    pub value: f64,
    pub modifiers: Vec<AttributeModifier>,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct AttributeModifier {
    pub uuid: u128,
    pub amount: f64,
    pub operation: i8,
}

impl Encode for EntityProperties {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_var_int(self.entity_id);
        encoder.write_i32(self.properties.len().try_into().unwrap_or(i32::MAX));
        for property in &self.properties {
            encoder.write_string(&property.key);
            encoder.write_f64(property.value);
            encoder.write_var_int(property.modifiers.len().try_into().unwrap_or(i32::MAX));
            for modifier in &property.modifiers {
                modifier.encode(encoder);
            }
        }
    }
}

impl Decode for EntityProperties {
    fn decode(decoder: &mut Decoder) -> decoder::Result<Self> {
        let entity_id = decoder.read_var_int()?;
        let count = decoder.read_i32()?.max(0);
        let mut properties = Vec::with_capacity((count as usize).min(64));
        for _ in 0..count {
            let key = String::decode(decoder)?;
            let value = decoder.read_f64()?;
            let modifier_count = decoder.read_var_int()?.max(0);
            let mut modifiers = Vec::with_capacity((modifier_count as usize).min(64));
            for _ in 0..modifier_count {
                modifiers.push(AttributeModifier::decode(decoder)?);
            }
            properties.push(EntityProperty {
                key,
                value,
                modifiers,
            });
        }
        Ok(Self {
            entity_id,
            properties,
        })
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct EntityEffect {
    #[encoding(varint)]
    pub entity_id: i32,
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}
