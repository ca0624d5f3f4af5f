//! Network message types and serialization.
//!
//! Messages travel as JSON objects carrying a `"type"` tag (`register`,
//! `action`, `frame`, `server_shutdown`). Decoding validates the payload for
//! known tags and maps any other tag to [`Message::Unrecognized`].

use std::collections::HashMap;
use std::fmt;

use serde::de::{self, DeserializeOwned, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Player identifier as assigned by the server operator.
pub type PlayerId = u32;

/// Object kind used for player entities.
pub const PLAYER_KIND: i64 = -1;

// ---------------------------------------------------------------------------
// Top-level enum
// ---------------------------------------------------------------------------

/// Top-level network message.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Client announces which player it controls.
    Register(Register),
    /// Client reports the input for the current tick.
    Action(PlayerAction),
    /// Server sends one world snapshot.
    Frame(Frame),
    /// A `frame` whose body failed validation, with the reason. Only the
    /// tick is lost; the connection stays usable.
    #[serde(skip)]
    InvalidFrame(String),
    /// Server is going away; no further messages follow.
    ServerShutdown,
    /// Any tag this client does not understand.
    Unrecognized,
}

// ---------------------------------------------------------------------------
// Payload structs
// ---------------------------------------------------------------------------

/// Client registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Register {
    /// Player this connection controls.
    pub player_id: PlayerId,
}

/// Client input for one tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerAction {
    /// Player the action belongs to.
    pub player_id: PlayerId,
    /// The sampled input.
    pub action: Action,
}

/// One server tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Frame {
    /// World size `(w, h)`.
    pub size: (u32, u32),
    /// World state at this tick.
    pub info: WorldSnapshot,
}

/// Server-authoritative world state for a single tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorldSnapshot {
    /// Player positions in world coordinates (y grows downward).
    pub positions: HashMap<PlayerId, (f64, f64)>,
    /// Player facing angles in radians.
    #[serde(default)]
    pub angles: HashMap<PlayerId, f64>,
    /// Renderable objects in draw order.
    #[serde(default)]
    pub objects: Vec<ObjectRecord>,
    /// Food held per player.
    #[serde(default)]
    pub food: HashMap<PlayerId, f64>,
    /// Wood held per player.
    #[serde(default)]
    pub wood: HashMap<PlayerId, f64>,
    /// Stone held per player.
    #[serde(default)]
    pub stone: HashMap<PlayerId, f64>,
}

/// One renderable object: `[kind, x, y, extra, ...]` on the wire.
///
/// For players (`kind == -1`) `extra` is the current health. Fields past
/// `extra` are kind-specific and kept as-is for the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    pub kind: i64,
    pub x: f64,
    pub y: f64,
    pub extra: f64,
    pub trailing: Vec<Value>,
}

impl ObjectRecord {
    pub fn new(kind: i64, x: f64, y: f64, extra: f64) -> Self {
        Self {
            kind,
            x,
            y,
            extra,
            trailing: Vec::new(),
        }
    }

    pub fn is_player(&self) -> bool {
        self.kind == PLAYER_KIND
    }

    /// Health of a player object, `None` for anything else.
    pub fn health(&self) -> Option<f64> {
        self.is_player().then_some(self.extra)
    }
}

impl Serialize for ObjectRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(4 + self.trailing.len()))?;
        seq.serialize_element(&self.kind)?;
        seq.serialize_element(&self.x)?;
        seq.serialize_element(&self.y)?;
        seq.serialize_element(&self.extra)?;
        for value in &self.trailing {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for ObjectRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = ObjectRecord;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object record [kind, x, y, extra, ...]")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<ObjectRecord, A::Error> {
                let kind = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let x = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                let y = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(2, &self))?;
                let extra = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(3, &self))?;
                let mut trailing = Vec::new();
                while let Some(value) = seq.next_element::<Value>()? {
                    trailing.push(value);
                }
                Ok(ObjectRecord {
                    kind,
                    x,
                    y,
                    extra,
                    trailing,
                })
            }
        }

        deserializer.deserialize_seq(RecordVisitor)
    }
}

/// Wire shape of an [`Action`].
type ActionTuple = (u8, u8, u8, bool, f64);

/// Sampled player input: `[ax, ay, active, action, angle]` on the wire.
///
/// `ax`/`ay` are biased around 1: 0 is the negative direction, 2 the positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "ActionTuple", into = "ActionTuple")]
pub struct Action {
    /// Horizontal movement, 0..=2.
    pub ax: u8,
    /// Vertical movement, 0..=2.
    pub ay: u8,
    /// Selected ability, 0 (none) ..= 9.
    pub active: u8,
    /// Primary action (attack) held.
    pub action: bool,
    /// Aim angle in radians.
    pub angle: f64,
}

impl Action {
    /// No movement, no ability, no attack.
    pub const NEUTRAL: Action = Action {
        ax: 1,
        ay: 1,
        active: 0,
        action: false,
        angle: 0.0,
    };
}

impl Default for Action {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl From<ActionTuple> for Action {
    fn from((ax, ay, active, action, angle): ActionTuple) -> Self {
        Self {
            ax,
            ay,
            active,
            action,
            angle,
        }
    }
}

impl From<Action> for ActionTuple {
    fn from(a: Action) -> Self {
        (a.ax, a.ay, a.active, a.action, a.angle)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during message deserialization.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The payload is not a JSON object.
    #[error("message is not an object")]
    NotAnObject,

    /// The payload is not valid JSON, or a known message has the wrong shape.
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Serialization helpers
// ---------------------------------------------------------------------------

/// Serialize a [`Message`] into a JSON payload.
pub fn serialize_message(msg: &Message) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(msg)
}

/// Deserialize a JSON payload into a [`Message`].
///
/// Objects whose `"type"` is missing or unknown become
/// [`Message::Unrecognized`]. A `frame` with a malformed body becomes
/// [`Message::InvalidFrame`]; other known tags must carry a well-formed body.
pub fn deserialize_message(data: &[u8]) -> Result<Message, MessageError> {
    let value: Value = serde_json::from_slice(data)?;
    let tag = match &value {
        Value::Object(map) => map.get("type").and_then(Value::as_str).map(str::to_owned),
        _ => return Err(MessageError::NotAnObject),
    };

    let msg = match tag.as_deref() {
        Some("register") => Message::Register(body(value)?),
        Some("action") => Message::Action(body(value)?),
        Some("frame") => match body::<Frame>(value) {
            Ok(frame) => Message::Frame(frame),
            Err(e) => {
                tracing::debug!(error = %e, "frame failed validation");
                Message::InvalidFrame(e.to_string())
            }
        },
        Some("server_shutdown") => Message::ServerShutdown,
        other => {
            tracing::debug!(tag = ?other, "ignoring unrecognized message");
            Message::Unrecognized
        }
    };
    Ok(msg)
}

fn body<T: DeserializeOwned>(value: Value) -> Result<T, MessageError> {
    Ok(serde_json::from_value(value)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(msg: &Message) -> Message {
        let bytes = serialize_message(msg).unwrap();
        deserialize_message(&bytes).unwrap()
    }

    fn sample_snapshot() -> WorldSnapshot {
        let mut snapshot = WorldSnapshot::default();
        snapshot.positions.insert(3, (400.0, 400.0));
        snapshot.positions.insert(4, (120.5, 990.25));
        snapshot.angles.insert(3, 1.25);
        snapshot.food.insert(3, 12.0);
        snapshot.wood.insert(3, 4.0);
        snapshot.stone.insert(3, 0.0);
        snapshot.objects.push(ObjectRecord::new(-1, 420.0, 400.0, 15.0));
        let mut tree = ObjectRecord::new(2, 10.0, 20.0, 0.5);
        tree.trailing = vec![Value::from(3), Value::from("oak"), Value::from(true)];
        snapshot.objects.push(tree);
        snapshot
    }

    #[test]
    fn test_register_roundtrip() {
        let msg = Message::Register(Register { player_id: 3 });
        assert_eq!(roundtrip(&msg), msg);
    }

    #[test]
    fn test_action_roundtrip() {
        let msg = Message::Action(PlayerAction {
            player_id: 9,
            action: Action {
                ax: 0,
                ay: 2,
                active: 7,
                action: true,
                angle: -2.5,
            },
        });
        assert_eq!(roundtrip(&msg), msg);
    }

    #[test]
    fn test_frame_roundtrip() {
        let msg = Message::Frame(Frame {
            size: (800, 800),
            info: sample_snapshot(),
        });
        assert_eq!(roundtrip(&msg), msg);
    }

    #[test]
    fn test_server_shutdown_roundtrip() {
        assert_eq!(roundtrip(&Message::ServerShutdown), Message::ServerShutdown);
    }

    #[test]
    fn test_action_is_a_five_tuple_on_the_wire() {
        let msg = Message::Action(PlayerAction {
            player_id: 3,
            action: Action::NEUTRAL,
        });
        let value: Value = serde_json::from_slice(&serialize_message(&msg).unwrap()).unwrap();
        assert_eq!(value["type"], "action");
        assert_eq!(value["player_id"], 3);
        assert_eq!(value["action"], serde_json::json!([1, 1, 0, false, 0.0]));
    }

    #[test]
    fn test_decodes_server_frame_json() {
        let raw = br#"{
            "type": "frame",
            "size": [800, 600],
            "info": {
                "positions": {"3": [400, 300.5]},
                "angles": {"3": 0.5},
                "objects": [[-1, 420, 400, 15], [5, 1.5, 2.5, 0, "extra"]],
                "food": {"3": 2},
                "wood": {"3": 7.5},
                "stone": {}
            }
        }"#;
        let Message::Frame(frame) = deserialize_message(raw).unwrap() else {
            panic!("expected a frame");
        };
        assert_eq!(frame.size, (800, 600));
        assert_eq!(frame.info.positions[&3], (400.0, 300.5));
        assert_eq!(frame.info.objects[0], ObjectRecord::new(-1, 420.0, 400.0, 15.0));
        assert_eq!(frame.info.objects[1].trailing, vec![Value::from("extra")]);
        assert_eq!(frame.info.food[&3], 2.0);
        assert!(frame.info.stone.is_empty());
    }

    #[test]
    fn test_missing_optional_maps_default_to_empty() {
        let raw = br#"{"type":"frame","size":[700,700],"info":{"positions":{"1":[1,2]}}}"#;
        let Message::Frame(frame) = deserialize_message(raw).unwrap() else {
            panic!("expected a frame");
        };
        assert!(frame.info.objects.is_empty());
        assert!(frame.info.food.is_empty());
    }

    #[test]
    fn test_unknown_tag_is_unrecognized() {
        let raw = br#"{"type":"chat","text":"hi"}"#;
        assert_eq!(deserialize_message(raw).unwrap(), Message::Unrecognized);
    }

    #[test]
    fn test_missing_tag_is_unrecognized() {
        let raw = br#"{"player_id": 1}"#;
        assert_eq!(deserialize_message(raw).unwrap(), Message::Unrecognized);
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(matches!(
            deserialize_message(b"[1, 2, 3]"),
            Err(MessageError::NotAnObject)
        ));
    }

    #[test]
    fn test_corrupted_payload_rejected() {
        assert!(matches!(
            deserialize_message(&[0xFF, 0x00, 0x13]),
            Err(MessageError::Json(_))
        ));
    }

    #[test]
    fn test_known_tag_with_bad_body_rejected() {
        let raw = br#"{"type":"register","player_id":"three"}"#;
        assert!(deserialize_message(raw).is_err());
    }

    #[test]
    fn test_malformed_frame_bodies_are_invalid_frames() {
        let bodies = [
            // three-field object record
            r#"{"positions":{},"objects":[[7,1,2]]}"#,
            // string health
            r#"{"positions":{},"objects":[[-1,1,2,"full"]]}"#,
            // float kind
            r#"{"positions":{},"objects":[[1.5,1,2,3]]}"#,
            // positions missing
            r#"{"objects":[]}"#,
        ];
        for info in bodies {
            let raw = format!(r#"{{"type":"frame","size":[800,800],"info":{info}}}"#);
            assert!(
                matches!(deserialize_message(raw.as_bytes()), Ok(Message::InvalidFrame(_))),
                "{info}"
            );
        }
    }

    #[test]
    fn test_invalid_frame_is_not_sent() {
        assert!(serialize_message(&Message::InvalidFrame("bad".into())).is_err());
    }

    #[test]
    fn test_player_health_accessor() {
        assert_eq!(ObjectRecord::new(-1, 0.0, 0.0, 12.0).health(), Some(12.0));
        assert_eq!(ObjectRecord::new(4, 0.0, 0.0, 12.0).health(), None);
    }
}
