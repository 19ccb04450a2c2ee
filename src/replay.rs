//! Synthesises the clientbound packet sequence that brings a freshly
//! logged-in client from a blank state to the mirror's current state.
//!
//! Ordering is load-bearing: the client rejects entities before the
//! join packet, chunks before the first position sync, and block
//! entities before their chunks.

use crate::{
    world::{entity::EntityKind, WorldMirror, MAP_SIZE},
    protocol::packet::server::play::{
        self as play, Packet,
    },
};

/// The downstream is always told it is this entity id.
pub const CLIENT_EID: i32 = 9_999_999;

/// Emits the full join sequence for the given snapshot.
///
/// With `respawn` set the client is assumed to already be in a world
/// (switching sessions); it is routed through a sentinel dimension and
/// back to force a full reload instead of receiving a second join.
pub fn emit_join_sequence(mirror: &WorldMirror, client_eid: i32, respawn: bool) -> Vec<Packet> {
    let mut packets = Vec::new();
    let map_eid = |eid: i32| if eid == mirror.self_eid { client_eid } else { eid };

    if respawn {
        let sentinel = if mirror.dimension == 1 { 0 } else { 1 };
        packets.push(Packet::Respawn(play::Respawn {
            dimension: sentinel,
            difficulty: mirror.difficulty,
            gamemode: mirror.gamemode,
            level_type: mirror.level_type.clone(),
        }));
        packets.push(Packet::Respawn(play::Respawn {
            dimension: mirror.dimension,
            difficulty: mirror.difficulty,
            gamemode: mirror.gamemode,
            level_type: mirror.level_type.clone(),
        }));
    } else {
        packets.push(Packet::JoinGame(play::JoinGame {
            entity_id: client_eid,
            // the high bit is the hardcore flag; never present it downstream
            gamemode: mirror.gamemode & 0x7,
            dimension: mirror.dimension,
            difficulty: mirror.difficulty,
            max_players: mirror.max_players,
            level_type: mirror.level_type.clone(),
            reduced_debug_info: false,
        }));
    }

    packets.push(Packet::PlayerAbilities(play::PlayerAbilities {
        flags: ability_flags(mirror),
        flying_speed: mirror.flying_speed,
        fov_modifier: mirror.fov,
    }));

    if !mirror.players.is_empty() {
        packets.push(Packet::PlayerListItem(play::PlayerListItem {
            action: play::player_list_action::ADD,
            players: mirror
                .players
                .iter()
                .map(|(uuid, player)| play::PlayerListEntry {
                    uuid: *uuid,
                    info: play::PlayerListInfo::Add {
                        name: player.name.clone(),
                        properties: player.properties.clone(),
                        gamemode: player.gamemode,
                        ping: player.ping,
                        display_name: player.display_name.clone(),
                    },
                })
                .collect(),
        }));
    }

    for (name, team) in &mirror.teams {
        packets.push(Packet::Teams(play::Teams {
            name: name.clone(),
            action: play::TeamsAction::Create {
                display_name: team.display_name.clone(),
                prefix: team.prefix.clone(),
                suffix: team.suffix.clone(),
                friendly_flags: team.friendly_flags,
                name_tag_visibility: team.name_tag_visibility.clone(),
                collision_rule: team.collision_rule.clone(),
                color: team.color,
                members: team.members.clone(),
            },
        }));
    }

    packets.push(Packet::WindowItems(play::WindowItems {
        window_id: 0,
        slots: mirror.inventory.clone(),
    }));

    for (map_id, map) in &mirror.maps {
        packets.push(Packet::Map(play::Map {
            map_id: *map_id,
            scale: map.scale,
            tracking_position: map.tracking_position,
            icons: map.icons.clone(),
            update: Some(play::MapUpdate {
                columns: MAP_SIZE as u8,
                rows: MAP_SIZE as u8,
                x: 0,
                z: 0,
                data: map.data.to_vec(),
            }),
        }));
    }

    packets.push(Packet::HeldItemChange(play::HeldItemChange {
        slot: mirror.held_item,
    }));
    packets.push(Packet::SetExperience(play::SetExperience {
        experience_bar: mirror.xp_bar,
        level: mirror.level,
        total_experience: mirror.total_xp,
    }));
    if mirror.health_initialized {
        packets.push(Packet::UpdateHealth(play::UpdateHealth {
            health: mirror.health,
            food: mirror.food,
            saturation: mirror.saturation,
        }));
    }
    if let (Some(header), Some(footer)) = (&mirror.player_list_header, &mirror.player_list_footer) {
        packets.push(Packet::PlayerListHeaderFooter(play::PlayerListHeaderFooter {
            header: header.clone(),
            footer: footer.clone(),
        }));
    }
    for (uuid, bar) in &mirror.boss_bars {
        packets.push(Packet::BossBar(play::BossBar {
            uuid: *uuid,
            action: play::BossBarAction::Add {
                title: bar.title.clone(),
                health: bar.health,
                color: bar.color,
                division: bar.division,
                flags: bar.flags,
            },
        }));
    }
    packets.push(Packet::SpawnPosition(play::SpawnPosition {
        position: mirror.spawn_position,
    }));
    packets.push(Packet::TimeUpdate(play::TimeUpdate {
        world_age: mirror.world_age,
        time_of_day: mirror.time_of_day,
    }));
    if mirror.raining {
        packets.push(Packet::ChangeGameState(play::ChangeGameState {
            reason: play::game_state::RAIN_BEGIN,
            value: 0.0,
        }));
    }
    if mirror.fade_value != 0.0 {
        packets.push(Packet::ChangeGameState(play::ChangeGameState {
            reason: play::game_state::FADE_VALUE,
            value: mirror.fade_value,
        }));
    }
    if mirror.fade_time != 0.0 {
        packets.push(Packet::ChangeGameState(play::ChangeGameState {
            reason: play::game_state::FADE_TIME,
            value: mirror.fade_time,
        }));
    }

    if !mirror.unlocked_recipes.is_empty() {
        let recipes: Vec<i32> = mirror.unlocked_recipes.iter().copied().collect();
        packets.push(Packet::UnlockRecipes(play::UnlockRecipes {
            action: 0,
            crafting_book_open: mirror.crafting_book_open,
            filtering_craftable: mirror.filtering_craftable,
            recipes: recipes.clone(),
            all_recipes: recipes,
        }));
    }

    packets.push(Packet::PlayerPositionAndLook(play::PlayerPositionAndLook {
        x: mirror.player.x,
        y: mirror.player.y,
        z: mirror.player.z,
        yaw: mirror.player.yaw,
        pitch: mirror.player.pitch,
        flags: 0,
        teleport_id: 0,
    }));

    for (&eid, entity) in &mirror.entities {
        if eid == mirror.self_eid {
            // the client spawns itself; it only needs our metadata
            if !entity.metadata.0.is_empty() {
                packets.push(Packet::EntityMetadata(play::EntityMetadata {
                    entity_id: client_eid,
                    metadata: entity.metadata.clone(),
                }));
            }
            continue;
        }

        packets.push(spawn_packet(eid, entity));
        if !entity.metadata.0.is_empty() {
            packets.push(Packet::EntityMetadata(play::EntityMetadata {
                entity_id: eid,
                metadata: entity.metadata.clone(),
            }));
        }
        if !entity.properties.is_empty() {
            packets.push(Packet::EntityProperties(play::EntityProperties {
                entity_id: eid,
                properties: entity.properties.clone(),
            }));
        }
        for (&slot, item) in &entity.equipment {
            packets.push(Packet::EntityEquipment(play::EntityEquipment {
                entity_id: eid,
                slot,
                item: item.clone(),
            }));
        }
    }

    if let Some(camera) = mirror.camera {
        packets.push(Packet::Camera(play::Camera {
            entity_id: map_eid(camera),
        }));
    }
    for (&eid, entity) in &mirror.entities {
        if !entity.passengers.is_empty() {
            packets.push(Packet::SetPassengers(play::SetPassengers {
                vehicle_id: map_eid(eid),
                passengers: entity.passengers.iter().map(|&id| map_eid(id)).collect(),
            }));
        }
        if let Some(holder) = entity.attached_to {
            packets.push(Packet::AttachEntity(play::AttachEntity {
                attached_entity_id: map_eid(eid),
                holding_entity_id: map_eid(holder),
            }));
        }
    }

    for column in mirror.chunks.values() {
        for chunk in column.values() {
            packets.push(Packet::ChunkData(chunk.to_packet()));
        }
    }

    packets
}

fn ability_flags(mirror: &WorldMirror) -> u8 {
    use play::ability_flags::*;
    let mut flags = 0;
    if mirror.invulnerable {
        flags |= INVULNERABLE;
    }
    if mirror.flying {
        flags |= FLYING;
    }
    if mirror.allow_flying {
        flags |= ALLOW_FLYING;
    }
    if mirror.creative_mode {
        flags |= CREATIVE_MODE;
    }
    flags
}

fn spawn_packet(eid: i32, entity: &crate::world::entity::Entity) -> Packet {
    match &entity.kind {
        EntityKind::Object {
            uuid,
            object_type,
            data,
            position,
            velocity,
            yaw,
            pitch,
        } => Packet::SpawnObject(play::SpawnObject {
            entity_id: eid,
            uuid: *uuid,
            kind: *object_type,
            x: position.0,
            y: position.1,
            z: position.2,
            pitch: *pitch,
            yaw: *yaw,
            data: *data,
            velocity_x: velocity.0,
            velocity_y: velocity.1,
            velocity_z: velocity.2,
        }),
        EntityKind::Orb { position, count } => {
            Packet::SpawnExperienceOrb(play::SpawnExperienceOrb {
                entity_id: eid,
                x: position.0,
                y: position.1,
                z: position.2,
                count: *count,
            })
        }
        EntityKind::Global {
            global_type,
            position,
        } => Packet::SpawnGlobalEntity(play::SpawnGlobalEntity {
            entity_id: eid,
            kind: *global_type,
            x: position.0,
            y: position.1,
            z: position.2,
        }),
        EntityKind::Mob {
            uuid,
            mob_type,
            position,
            velocity,
            yaw,
            pitch,
            head_pitch,
        } => Packet::SpawnMob(play::SpawnMob {
            entity_id: eid,
            uuid: *uuid,
            kind: *mob_type,
            x: position.0,
            y: position.1,
            z: position.2,
            yaw: *yaw,
            pitch: *pitch,
            head_pitch: *head_pitch,
            velocity_x: velocity.0,
            velocity_y: velocity.1,
            velocity_z: velocity.2,
            metadata: entity.metadata.clone(),
        }),
        EntityKind::Painting {
            uuid,
            title,
            position,
            direction,
        } => Packet::SpawnPainting(play::SpawnPainting {
            entity_id: eid,
            uuid: *uuid,
            title: title.clone(),
            position: *position,
            direction: *direction,
        }),
        EntityKind::Player {
            uuid,
            position,
            yaw,
            pitch,
        } => Packet::SpawnPlayer(play::SpawnPlayer {
            entity_id: eid,
            uuid: *uuid,
            x: position.0,
            y: position.1,
            z: position.2,
            yaw: *yaw,
            pitch: *pitch,
            metadata: entity.metadata.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        protocol::{
            chat::ChatComponent,
            packet::server::play::{JoinGame, PlayerListEntry, PlayerListInfo, PlayerListItem},
            slot::{Item, Slot},
        },
        world::chunk::{Chunk, ChunkSection},
    };

    /// Builds the scenario-3 snapshot: one player list entry, an empty
    /// inventory, one full chunk of stone in section 0, a known
    /// position.
    fn seeded_mirror() -> WorldMirror {
        let mut mirror = WorldMirror::new();
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
        mirror
            .apply(&Packet::PlayerListItem(PlayerListItem {
                action: play::player_list_action::ADD,
                players: vec![PlayerListEntry {
                    uuid: 0xABCD,
                    info: PlayerListInfo::Add {
                        name: "self".into(),
                        properties: Vec::new(),
                        gamemode: 0,
                        ping: 1,
                        display_name: None,
                    },
                }],
            }))
            .unwrap();

        let mut chunk = Chunk::new(0, 0);
        let mut section = ChunkSection::empty(true);
        section.blocks.fill(1 << 4);
        chunk.sections[0] = Some(section);
        mirror.chunks.entry(0).or_default().insert(0, chunk);

        mirror
            .apply(&Packet::PlayerPositionAndLook(play::PlayerPositionAndLook {
                x: 8.5,
                y: 65.0,
                z: 8.5,
                yaw: 0.0,
                pitch: 0.0,
                flags: 0,
                teleport_id: 1,
            }))
            .unwrap();
        mirror
    }

    /// Remaps the local player's eid to zero so two mirrors that differ
    /// only in the self eid compare equal.
    fn normalized(mut mirror: WorldMirror) -> WorldMirror {
        if let Some(self_entity) = mirror.entities.remove(&mirror.self_eid) {
            mirror.entities.insert(0, self_entity);
        }
        mirror.self_eid = 0;
        mirror
    }

    #[test]
    fn replay_reconstructs_snapshot() {
        let mirror = seeded_mirror();
        let packets = emit_join_sequence(&mirror, CLIENT_EID, false);

        let mut replayed = WorldMirror::new();
        for packet in &packets {
            replayed.apply(packet).unwrap();
        }

        assert_eq!(normalized(replayed), normalized(mirror));
    }

    #[test]
    fn replay_starts_with_join_and_positions_before_chunks() {
        let mirror = seeded_mirror();
        let packets = emit_join_sequence(&mirror, CLIENT_EID, false);

        assert!(matches!(
            &packets[0],
            Packet::JoinGame(join) if join.entity_id == CLIENT_EID
        ));
        let position_index = packets
            .iter()
            .position(|p| matches!(p, Packet::PlayerPositionAndLook(_)))
            .expect("position present");
        let first_chunk_index = packets
            .iter()
            .position(|p| matches!(p, Packet::ChunkData(_)))
            .expect("chunk present");
        assert!(position_index < first_chunk_index);
    }

    #[test]
    fn respawn_mode_routes_through_sentinel_dimension() {
        let mirror = seeded_mirror();
        let packets = emit_join_sequence(&mirror, CLIENT_EID, true);
        match (&packets[0], &packets[1]) {
            (Packet::Respawn(first), Packet::Respawn(second)) => {
                assert_eq!(first.dimension, 1);
                assert_eq!(second.dimension, 0);
            }
            other => panic!("expected a respawn pair, got {other:?}"),
        }
    }

    #[test]
    fn inventory_replay_is_exactly_46_slots() {
        let mut mirror = seeded_mirror();
        mirror.inventory[36] = Slot(Some(Item {
            id: 1,
            count: 64,
            damage: 0,
            tag: None,
        }));
        let packets = emit_join_sequence(&mirror, CLIENT_EID, false);
        let window_items = packets
            .iter()
            .find_map(|p| match p {
                Packet::WindowItems(w) => Some(w),
                _ => None,
            })
            .expect("window items present");
        assert_eq!(window_items.window_id, 0);
        assert_eq!(window_items.slots.len(), 46);
        assert_eq!(window_items.slots[0], Slot::EMPTY);
        assert!(window_items.slots[36].0.is_some());
    }

    #[test]
    fn gamemode_hardcore_bit_is_stripped() {
        let mut mirror = seeded_mirror();
        mirror.gamemode = 0x8 | 0x1;
        let packets = emit_join_sequence(&mirror, CLIENT_EID, false);
        match &packets[0] {
            Packet::JoinGame(join) => assert_eq!(join.gamemode, 1),
            other => panic!("expected join game, got {other:?}"),
        }
    }

    #[test]
    fn health_omitted_until_initialized() {
        let mirror = seeded_mirror();
        assert!(!mirror.health_initialized);
        let packets = emit_join_sequence(&mirror, CLIENT_EID, false);
        assert!(!packets
            .iter()
            .any(|p| matches!(p, Packet::UpdateHealth(_))));
    }

    #[test]
    fn boss_bars_are_replayed() {
        let mut mirror = seeded_mirror();
        mirror.boss_bars.insert(
            7,
            crate::world::BossBar {
                title: ChatComponent::text("dragon"),
                health: 0.5,
                color: 2,
                division: 0,
                flags: 0,
            },
        );
        let packets = emit_join_sequence(&mirror, CLIENT_EID, false);
        assert!(packets.iter().any(|p| matches!(p, Packet::BossBar(_))));
    }
}
