//! Client/server wire protocol: length-prefixed framing, message types, and
//! the framed TCP channel the client session talks through.

pub mod channel;
pub mod framing;
pub mod messages;

pub use channel::{
    ChannelError, CloseReason, ConnectError, FramedChannel, Received, connect, connect_with, dial,
};
pub use framing::{FrameConfig, FrameError, encode_frame, read_frame, write_frame};
pub use messages::{
    Action, Frame, Message, MessageError, ObjectRecord, PLAYER_KIND, PlayerAction, PlayerId,
    Register, WorldSnapshot, deserialize_message, serialize_message,
};
