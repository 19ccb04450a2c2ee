//! Serverbound Play packets for protocol 340. The rewriter only needs
//! a handful of these typed; the rest are raw tails.

use minecraft_session_proxy_macros::{Decode, Encode};

#[derive(Debug, Clone, Encode, Decode, strum::AsRefStr)]
#[encoding(discriminant = "varint")]
pub enum Packet {
    #[encoding(id = 0x00)]
    TeleportConfirm(TeleportConfirm),
    #[encoding(id = 0x01)]
    TabComplete(TabComplete),
    #[encoding(id = 0x02)]
    ChatMessage(ChatMessage),
    #[encoding(id = 0x03)]
    ClientStatus(ClientStatus),
    #[encoding(id = 0x04)]
    ClientSettings(ClientSettings),
    #[encoding(id = 0x05)]
    ConfirmTransaction(ConfirmTransaction),
    #[encoding(id = 0x06)]
    EnchantItem(EnchantItem),
    #[encoding(id = 0x07)]
    ClickWindow(ClickWindow),
    #[encoding(id = 0x08)]
    CloseWindow(CloseWindow),
    #[encoding(id = 0x09)]
    PluginMessage(PluginMessage),
    #[encoding(id = 0x0A)]
    UseEntity(UseEntity),
    #[encoding(id = 0x0B)]
    KeepAlive(KeepAlive),
    #[encoding(id = 0x0C)]
    PlayerOnGround(PlayerOnGround),
    #[encoding(id = 0x0D)]
    PlayerPosition(PlayerPosition),
    #[encoding(id = 0x0E)]
    PlayerPositionAndLook(PlayerPositionAndLook),
    #[encoding(id = 0x0F)]
    PlayerLook(PlayerLook),
    #[encoding(id = 0x10)]
    VehicleMove(VehicleMove),
    #[encoding(id = 0x11)]
    SteerBoat(SteerBoat),
    #[encoding(id = 0x12)]
    CraftRecipeRequest(CraftRecipeRequest),
    #[encoding(id = 0x13)]
    PlayerAbilities(PlayerAbilities),
    #[encoding(id = 0x14)]
    PlayerDigging(PlayerDigging),
    #[encoding(id = 0x15)]
    EntityAction(EntityAction),
    #[encoding(id = 0x16)]
    SteerVehicle(SteerVehicle),
    #[encoding(id = 0x17)]
    CraftingBookData(CraftingBookData),
    #[encoding(id = 0x18)]
    ResourcePackStatus(ResourcePackStatus),
    #[encoding(id = 0x19)]
    AdvancementTab(AdvancementTab),
    #[encoding(id = 0x1A)]
    HeldItemChange(HeldItemChange),
    #[encoding(id = 0x1B)]
    CreativeInventoryAction(CreativeInventoryAction),
    #[encoding(id = 0x1C)]
    UpdateSign(UpdateSign),
    #[encoding(id = 0x1D)]
    SwingArm(SwingArm),
    #[encoding(id = 0x1E)]
    Spectate(Spectate),
    #[encoding(id = 0x1F)]
    PlayerBlockPlacement(PlayerBlockPlacement),
    #[encoding(id = 0x20)]
    UseItem(UseItem),
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct TeleportConfirm {
    #[encoding(varint)]
    pub teleport_id: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct TabComplete {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ChatMessage {
    pub message: String,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ClientStatus {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ClientSettings {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ConfirmTransaction {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct EnchantItem {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ClickWindow {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct CloseWindow {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct PluginMessage {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct UseEntity {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct KeepAlive {
    pub id: i64,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct PlayerOnGround {
    pub on_ground: bool,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct PlayerPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub on_ground: bool,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct PlayerPositionAndLook {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    pub on_ground: bool,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct PlayerLook {
    pub yaw: f32,
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
pub struct SteerBoat {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct CraftRecipeRequest {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct PlayerAbilities {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct PlayerDigging {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct EntityAction {
    #[encoding(varint)]
    pub entity_id: i32,
    #[encoding(varint)]
    pub action: i32,
    #[encoding(varint)]
    pub jump_boost: i32,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SteerVehicle {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct CraftingBookData {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct ResourcePackStatus {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct AdvancementTab {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct HeldItemChange {
    pub slot: i16,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct CreativeInventoryAction {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct UpdateSign {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SwingArm {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Spectate {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct PlayerBlockPlacement {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct UseItem {
    #[encoding(length_prefix = "inferred")]
    pub data: Vec<u8>,
}
