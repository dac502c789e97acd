//! # Presence Protocol - Shared Wire Types
//!
//! Message and value types exchanged between the presence relay and its
//! clients. Both sides depend on this crate, so the pose convention
//! (position + Euler rotation, XYZ order) and the JSON envelope are agreed
//! by construction rather than negotiated at runtime.
//!
//! ## Message Flow
//!
//! 1. The relay accepts a WebSocket connection and assigns a [`ParticipantId`]
//! 2. The relay announces the identity with a `session` event
//! 3. The client sends `move` events carrying its latest [`Pose`]
//! 4. The relay rebroadcasts the full registry snapshot to everyone as a
//!    `move` event in the other direction
//!
//! All frames are JSON text with an `{"event": ..., "data": ...}` envelope.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Unique identifier for a connected participant.
///
/// Assigned by the relay when a connection is accepted and valid only for
/// the lifetime of that connection. A client that reconnects receives a
/// fresh identity; identities are never negotiated by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ParticipantId(pub Uuid);

impl ParticipantId {
    /// Creates a new random participant ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a participant ID from its string representation.
    ///
    /// # Arguments
    ///
    /// * `s` - A string slice containing a valid UUID
    ///
    /// # Returns
    ///
    /// Returns `Ok(ParticipantId)` if the string is a valid UUID, otherwise
    /// `Err(uuid::Error)` with details about the parsing failure.
    pub fn from_str(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::str::FromStr for ParticipantId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s)
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A participant's position and orientation at a point in time.
///
/// `rotation` is a set of Euler angles in radians, applied in XYZ order.
/// A pose update fully replaces the previous record for its participant;
/// there are no partial or delta updates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position as (x, y, z)
    pub position: [f64; 3],
    /// Orientation as Euler angles (x, y, z), radians
    pub rotation: [f64; 3],
}

impl Pose {
    /// Creates a new pose from position and rotation triples.
    pub fn new(position: [f64; 3], rotation: [f64; 3]) -> Self {
        Self { position, rotation }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0; 3],
        }
    }
}

/// Immutable copy of the relay's registry at one instant.
///
/// Contains exactly one entry per currently-connected participant that has
/// reported at least one pose. Clients replace their local mirror with this
/// wholesale and filter out their own identity at render time.
pub type RegistrySnapshot = HashMap<ParticipantId, Pose>;

/// A pose update sent by a client.
///
/// The `id` must match the identity the relay assigned to the sending
/// connection; the relay drops mismatching updates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseUpdate {
    /// The sender's assigned identity
    pub id: ParticipantId,
    /// Position as (x, y, z)
    pub position: [f64; 3],
    /// Orientation as Euler angles (x, y, z), radians
    pub rotation: [f64; 3],
}

impl PoseUpdate {
    /// The pose carried by this update, without the identity.
    pub fn pose(&self) -> Pose {
        Pose {
            position: self.position,
            rotation: self.rotation,
        }
    }
}

/// A message sent from a client to the relay.
///
/// # Examples
///
/// ```json
/// {
///   "event": "move",
///   "data": {
///     "id": "550e8400-e29b-41d4-a716-446655440000",
///     "position": [1.0, 0.0, 0.0],
///     "rotation": [0.0, 0.0, 0.0]
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// The sender's latest pose. Fire-and-forget; no acknowledgement.
    Move(PoseUpdate),
}

/// A message sent from the relay to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Sent once, immediately after the connection is accepted, announcing
    /// the identity the relay assigned to this connection.
    Session {
        /// The identity assigned to the receiving connection
        id: ParticipantId,
    },
    /// The full registry snapshot, sent to every connection after each
    /// registry mutation. Includes the recipient's own entry; clients skip
    /// their own identity when rendering.
    Move(RegistrySnapshot),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_id_round_trips_through_string() {
        let id = ParticipantId::new();
        let parsed = ParticipantId::from_str(&id.to_string()).expect("valid uuid string");
        assert_eq!(id, parsed);
    }

    #[test]
    fn client_move_envelope_shape() {
        let id = ParticipantId::new();
        let event = ClientEvent::Move(PoseUpdate {
            id,
            position: [1.0, 0.0, 0.0],
            rotation: [0.0, 0.5, 0.0],
        });

        let json = serde_json::to_value(&event).expect("serializes");
        assert_eq!(json["event"], "move");
        assert_eq!(json["data"]["id"], id.to_string());
        assert_eq!(json["data"]["position"][0], 1.0);

        let back: ClientEvent = serde_json::from_value(json).expect("deserializes");
        assert_eq!(back, event);
    }

    #[test]
    fn server_snapshot_uses_identity_keys() {
        let id = ParticipantId::new();
        let mut snapshot = RegistrySnapshot::new();
        snapshot.insert(id, Pose::new([2.0, 1.0, 0.0], [0.0, 0.0, 0.0]));

        let json = serde_json::to_value(&ServerEvent::Move(snapshot.clone())).expect("serializes");
        assert_eq!(json["event"], "move");
        assert_eq!(json["data"][id.to_string()]["position"][0], 2.0);

        let back: ServerEvent = serde_json::from_value(json).expect("deserializes");
        assert_eq!(back, ServerEvent::Move(snapshot));
    }

    #[test]
    fn session_event_carries_assigned_identity() {
        let id = ParticipantId::new();
        let json = serde_json::to_string(&ServerEvent::Session { id }).expect("serializes");
        let back: ServerEvent = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(back, ServerEvent::Session { id });
    }

    #[test]
    fn malformed_envelope_is_rejected() {
        let missing_data = r#"{"event":"move"}"#;
        assert!(serde_json::from_str::<ClientEvent>(missing_data).is_err());

        let wrong_types = r#"{"event":"move","data":{"id":"not-a-uuid","position":[0,0,0],"rotation":[0,0,0]}}"#;
        assert!(serde_json::from_str::<ClientEvent>(wrong_types).is_err());
    }
}
