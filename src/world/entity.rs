//! Entities as cached by the mirror. The tag mirrors which spawn
//! packet produced the entity, since that decides how it is
//! re-spawned for a fresh downstream.

use crate::{
    position::BlockPosition,
    protocol::{metadata::Metadata, packet::server::play::EntityProperty, slot::Slot},
};
use ahash::AHashMap;

#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub kind: EntityKind,
    pub metadata: Metadata,
    pub properties: Vec<EntityProperty>,
    pub equipment: AHashMap<i32, Slot>,
    pub passengers: Vec<i32>,
    /// Holding entity id from an attach packet (leashes), if any.
    pub attached_to: Option<i32>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EntityKind {
    Object {
        uuid: u128,
        object_type: i8,
        data: i32,
        position: (f64, f64, f64),
        velocity: (i16, i16, i16),
        yaw: f32,
        pitch: f32,
    },
    Orb {
        position: (f64, f64, f64),
        count: i16,
    },
    Global {
        global_type: u8,
        position: (f64, f64, f64),
    },
    Mob {
        uuid: u128,
        mob_type: i32,
        position: (f64, f64, f64),
        velocity: (i16, i16, i16),
        yaw: f32,
        pitch: f32,
        head_pitch: f32,
    },
    Painting {
        uuid: u128,
        title: String,
        position: BlockPosition,
        direction: u8,
    },
    Player {
        uuid: u128,
        position: (f64, f64, f64),
        yaw: f32,
        pitch: f32,
    },
}

impl Entity {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            metadata: Metadata::default(),
            properties: Vec::new(),
            equipment: AHashMap::new(),
            passengers: Vec::new(),
            attached_to: None,
        }
    }

    pub fn position(&self) -> Option<(f64, f64, f64)> {
        match &self.kind {
            EntityKind::Object { position, .. }
            | EntityKind::Orb { position, .. }
            | EntityKind::Global { position, .. }
            | EntityKind::Mob { position, .. }
            | EntityKind::Player { position, .. } => Some(*position),
            EntityKind::Painting { .. } => None,
        }
    }

    pub fn set_position(&mut self, new: (f64, f64, f64)) {
        match &mut self.kind {
            EntityKind::Object { position, .. }
            | EntityKind::Orb { position, .. }
            | EntityKind::Global { position, .. }
            | EntityKind::Mob { position, .. }
            | EntityKind::Player { position, .. } => *position = new,
            EntityKind::Painting { .. } => {}
        }
    }

    pub fn move_relative(&mut self, delta_x: i16, delta_y: i16, delta_z: i16) {
        if let Some((x, y, z)) = self.position() {
            // fixed-point deltas: 1/4096 of a block
            self.set_position((
                x + f64::from(delta_x) / 4096.0,
                y + f64::from(delta_y) / 4096.0,
                z + f64::from(delta_z) / 4096.0,
            ));
        }
    }

    pub fn set_look(&mut self, new_yaw: f32, new_pitch: f32) {
        match &mut self.kind {
            EntityKind::Object { yaw, pitch, .. }
            | EntityKind::Mob { yaw, pitch, .. }
            | EntityKind::Player { yaw, pitch, .. } => {
                *yaw = new_yaw;
                *pitch = new_pitch;
            }
            _ => {}
        }
    }

    pub fn set_velocity(&mut self, new: (i16, i16, i16)) {
        match &mut self.kind {
            EntityKind::Object { velocity, .. } | EntityKind::Mob { velocity, .. } => {
                *velocity = new;
            }
            _ => {}
        }
    }

    /// Object type of a spawned object entity, if this is one.
    pub fn object_type(&self) -> Option<i8> {
        match &self.kind {
            EntityKind::Object { object_type, .. } => Some(*object_type),
            _ => None,
        }
    }
}
