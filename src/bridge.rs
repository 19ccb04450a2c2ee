//! The per-packet rewriting filter applied while a downstream client
//! is attached. The synthetic join gave the client its own entity id,
//! so every packet that names the local player has that id swapped.

use crate::{
    protocol::{
        metadata::MetadataValue,
        packet::{client, server},
    },
    world::WorldMirror,
};

/// Object type id of a firework rocket.
const FIREWORK_OBJECT_TYPE: i8 = 76;

/// Firework metadata index holding the boosting player's entity id.
const FIREWORK_SHOOTER_INDEX: u8 = 7;

/// Swaps the upstream self eid and the synthetic client eid on the
/// packets that carry either. The swap is its own inverse.
#[derive(Copy, Clone, Debug)]
pub struct EidRewriter {
    pub self_eid: i32,
    pub client_eid: i32,
}

/// What to do with a serverbound packet after filtering.
#[derive(Debug)]
pub enum ServerboundAction {
    Forward(client::play::Packet),
    /// Swallowed by the proxy (the session keeps its own keep-alive
    /// and teleport-confirm exchanges with upstream).
    Drop,
}

impl EidRewriter {
    pub fn new(self_eid: i32, client_eid: i32) -> Self {
        Self {
            self_eid,
            client_eid,
        }
    }

    fn map(&self, eid: i32) -> i32 {
        if eid == self.self_eid {
            self.client_eid
        } else if eid == self.client_eid {
            self.self_eid
        } else {
            eid
        }
    }

    /// Rewrites a clientbound packet in place before it is forwarded
    /// to the downstream.
    pub fn rewrite_clientbound(&self, packet: &mut server::play::Packet, mirror: &WorldMirror) {
        use server::play::Packet;
        match packet {
            Packet::Animation(p) => p.entity_id = self.map(p.entity_id),
            Packet::BlockBreakAnimation(p) => p.entity_id = self.map(p.entity_id),
            Packet::EntityRelativeMove(p) => p.entity_id = self.map(p.entity_id),
            Packet::EntityLookAndRelativeMove(p) => p.entity_id = self.map(p.entity_id),
            Packet::EntityLook(p) => p.entity_id = self.map(p.entity_id),
            Packet::UseBed(p) => p.entity_id = self.map(p.entity_id),
            Packet::RemoveEntityEffect(p) => p.entity_id = self.map(p.entity_id),
            Packet::EntityHeadLook(p) => p.entity_id = self.map(p.entity_id),
            Packet::Camera(p) => p.entity_id = self.map(p.entity_id),
            Packet::EntityVelocity(p) => p.entity_id = self.map(p.entity_id),
            Packet::EntityEquipment(p) => p.entity_id = self.map(p.entity_id),
            Packet::EntityTeleport(p) => p.entity_id = self.map(p.entity_id),
            Packet::EntityProperties(p) => p.entity_id = self.map(p.entity_id),
            Packet::EntityEffect(p) => p.entity_id = self.map(p.entity_id),
            Packet::EntityStatus(p) => p.entity_id = self.map(p.entity_id),
            Packet::EntityMetadata(p) => {
                // a firework's shooter field references the boosting
                // player by eid
                let is_firework = mirror
                    .entities
                    .get(&p.entity_id)
                    .and_then(|entity| entity.object_type())
                    == Some(FIREWORK_OBJECT_TYPE);
                if is_firework {
                    for entry in &mut p.metadata.0 {
                        if entry.index == FIREWORK_SHOOTER_INDEX {
                            if let MetadataValue::VarInt(shooter) = &mut entry.value {
                                *shooter = self.map(*shooter);
                            }
                        }
                    }
                }
            }
            Packet::SetPassengers(p) => {
                // the vehicle keeps its id; only riders are remapped
                for passenger in &mut p.passengers {
                    *passenger = self.map(*passenger);
                }
            }
            _ => {}
        }
    }

    /// Filters a serverbound packet, updating the mirror's view of the
    /// player where the packet carries movement.
    pub fn filter_serverbound(
        &self,
        packet: client::play::Packet,
        mirror: &mut WorldMirror,
    ) -> ServerboundAction {
        use client::play::Packet;
        match packet {
            Packet::TeleportConfirm(_) | Packet::KeepAlive(_) => ServerboundAction::Drop,
            Packet::PlayerPosition(ref p) => {
                mirror.track_player_position(p.x, p.y, p.z);
                ServerboundAction::Forward(packet)
            }
            Packet::PlayerPositionAndLook(ref p) => {
                mirror.track_player_position(p.x, p.y, p.z);
                mirror.track_player_look(p.yaw, p.pitch);
                ServerboundAction::Forward(packet)
            }
            Packet::PlayerLook(ref p) => {
                mirror.track_player_look(p.yaw, p.pitch);
                ServerboundAction::Forward(packet)
            }
            Packet::VehicleMove(ref p) => {
                mirror.track_player_position(p.x, p.y, p.z);
                if let Some(riding) = mirror.riding_eid {
                    if let Some(entity) = mirror.entities.get_mut(&riding) {
                        entity.set_position((p.x, p.y, p.z));
                    }
                }
                ServerboundAction::Forward(packet)
            }
            Packet::EntityAction(mut p) => {
                p.entity_id = self.map(p.entity_id);
                ServerboundAction::Forward(Packet::EntityAction(p))
            }
            Packet::HeldItemChange(ref p) => {
                mirror.held_item = p.slot as i8;
                ServerboundAction::Forward(packet)
            }
            other => ServerboundAction::Forward(other),
        }
    }
}

/// The tab-list update pushed to the downstream whenever the mirror's
/// gamemode changes while attached.
pub fn gamemode_update(self_uuid: u128, gamemode: u8) -> server::play::Packet {
    server::play::Packet::PlayerListItem(server::play::PlayerListItem {
        action: server::play::player_list_action::UPDATE_GAMEMODE,
        players: vec![server::play::PlayerListEntry {
            uuid: self_uuid,
            info: server::play::PlayerListInfo::UpdateGamemode {
                gamemode: i32::from(gamemode),
            },
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        protocol::{
            metadata::{Metadata, MetadataEntry},
            packet::server::play::{self as play, Packet},
            Encode, Encoder,
        },
        replay::CLIENT_EID,
        world::{
            entity::{Entity, EntityKind},
            WorldMirror,
        },
    };

    fn rewriter() -> EidRewriter {
        EidRewriter::new(1, CLIENT_EID)
    }

    fn encoded(packet: &Packet) -> Vec<u8> {
        let mut buf = Vec::new();
        packet.encode(&mut Encoder::new(&mut buf));
        buf
    }

    #[test]
    fn relative_move_swaps_self_eid_only() {
        let mirror = WorldMirror::new();
        let make = |eid| {
            Packet::EntityRelativeMove(play::EntityRelativeMove {
                entity_id: eid,
                delta_x: 0,
                delta_y: 0,
                delta_z: 0,
                on_ground: true,
            })
        };

        let mut packet = make(1);
        rewriter().rewrite_clientbound(&mut packet, &mirror);
        assert_eq!(encoded(&packet), encoded(&make(CLIENT_EID)));

        let mut unrelated = make(77);
        rewriter().rewrite_clientbound(&mut unrelated, &mirror);
        assert_eq!(encoded(&unrelated), encoded(&make(77)));
    }

    #[test]
    fn rewrite_is_an_involution() {
        let mirror = WorldMirror::new();
        for eid in [1, CLIENT_EID, 500] {
            let mut packet = Packet::EntityStatus(play::EntityStatus {
                entity_id: eid,
                status: 2,
            });
            let original = encoded(&packet);
            rewriter().rewrite_clientbound(&mut packet, &mirror);
            rewriter().rewrite_clientbound(&mut packet, &mirror);
            assert_eq!(encoded(&packet), original, "eid {eid}");
        }
    }

    #[test]
    fn firework_shooter_is_rewritten() {
        let mut mirror = WorldMirror::new();
        mirror.entities.insert(
            40,
            Entity::new(EntityKind::Object {
                uuid: 0,
                object_type: FIREWORK_OBJECT_TYPE,
                data: 0,
                position: (0.0, 0.0, 0.0),
                velocity: (0, 0, 0),
                yaw: 0.0,
                pitch: 0.0,
            }),
        );

        let mut packet = Packet::EntityMetadata(play::EntityMetadata {
            entity_id: 40,
            metadata: Metadata(vec![MetadataEntry {
                index: FIREWORK_SHOOTER_INDEX,
                value: MetadataValue::VarInt(1),
            }]),
        });
        rewriter().rewrite_clientbound(&mut packet, &mirror);
        match packet {
            Packet::EntityMetadata(p) => {
                assert_eq!(p.entity_id, 40);
                assert_eq!(p.metadata.0[0].value, MetadataValue::VarInt(CLIENT_EID));
            }
            other => panic!("unexpected packet {other:?}"),
        }
    }

    #[test]
    fn non_firework_metadata_untouched() {
        let mut mirror = WorldMirror::new();
        mirror.entities.insert(
            41,
            Entity::new(EntityKind::Mob {
                uuid: 0,
                mob_type: 54,
                position: (0.0, 0.0, 0.0),
                velocity: (0, 0, 0),
                yaw: 0.0,
                pitch: 0.0,
                head_pitch: 0.0,
            }),
        );
        let mut packet = Packet::EntityMetadata(play::EntityMetadata {
            entity_id: 41,
            metadata: Metadata(vec![MetadataEntry {
                index: FIREWORK_SHOOTER_INDEX,
                value: MetadataValue::VarInt(1),
            }]),
        });
        rewriter().rewrite_clientbound(&mut packet, &mirror);
        match packet {
            Packet::EntityMetadata(p) => {
                assert_eq!(p.metadata.0[0].value, MetadataValue::VarInt(1));
            }
            other => panic!("unexpected packet {other:?}"),
        }
    }

    #[test]
    fn passengers_rewritten_vehicle_kept() {
        let mirror = WorldMirror::new();
        let mut packet = Packet::SetPassengers(play::SetPassengers {
            vehicle_id: 1,
            passengers: vec![1, 30],
        });
        rewriter().rewrite_clientbound(&mut packet, &mirror);
        match packet {
            Packet::SetPassengers(p) => {
                assert_eq!(p.vehicle_id, 1);
                assert_eq!(p.passengers, vec![CLIENT_EID, 30]);
            }
            other => panic!("unexpected packet {other:?}"),
        }
    }

    #[test]
    fn serverbound_keep_alive_and_teleport_confirm_dropped() {
        let mut mirror = WorldMirror::new();
        assert!(matches!(
            rewriter().filter_serverbound(
                client::play::Packet::KeepAlive(client::play::KeepAlive { id: 5 }),
                &mut mirror
            ),
            ServerboundAction::Drop
        ));
        assert!(matches!(
            rewriter().filter_serverbound(
                client::play::Packet::TeleportConfirm(client::play::TeleportConfirm {
                    teleport_id: 3
                }),
                &mut mirror
            ),
            ServerboundAction::Drop
        ));
    }

    #[test]
    fn serverbound_movement_updates_mirror() {
        let mut mirror = WorldMirror::new();
        let action = rewriter().filter_serverbound(
            client::play::Packet::PlayerPositionAndLook(client::play::PlayerPositionAndLook {
                x: 10.0,
                y: 64.0,
                z: -10.0,
                yaw: 90.0,
                pitch: -5.0,
                on_ground: true,
            }),
            &mut mirror,
        );
        assert!(matches!(action, ServerboundAction::Forward(_)));
        assert_eq!(mirror.player.x, 10.0);
        assert_eq!(mirror.player.yaw, 90.0);
    }

    #[test]
    fn serverbound_entity_action_swapped() {
        let mut mirror = WorldMirror::new();
        let action = rewriter().filter_serverbound(
            client::play::Packet::EntityAction(client::play::EntityAction {
                entity_id: CLIENT_EID,
                action: 0,
                jump_boost: 0,
            }),
            &mut mirror,
        );
        match action {
            ServerboundAction::Forward(client::play::Packet::EntityAction(p)) => {
                assert_eq!(p.entity_id, 1);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }
}
