//! Message shapes and the smart constructors that enforce their invariants.
//!
//! A [`Message`] pairs a wire [`Header`] (what actually gets serialized)
//! with transient [`Meta`] (peer, direction, timestamp — never serialized,
//! set by the transport on the way in and the producer on the way out) and
//! a [`Body`] carrying the fields specific to its [`MessageTag`].
//!
//! All variants are immutable once emitted except for the direction/peer
//! bookkeeping the transport performs ([`Message::set_incoming`],
//! [`Message::set_node`]) and payload rebinding via
//! [`Message::clone_data_buffers`].

use std::time::SystemTime;

use crate::error::{ConstructionError, StateError};
use crate::flags::Flags;
use crate::limits::{MAX_PAYLOAD, MESSAGE_ID_UNASSIGNED, PEER_BROADCAST};
use crate::payload::Payload;
use crate::tag::MessageTag;

/// Whether a message was produced locally (outgoing) or read off the wire
/// (incoming). Transient — never serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// The wire header present on every message: `[tag][messageId][flags]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub message_id: i64,
    pub flags: Flags,
}

/// Transient addressing/bookkeeping metadata. Never serialized — set by
/// the transport on receive and by the producer on send.
#[derive(Debug, Clone)]
pub struct Meta {
    pub peer: i16,
    pub direction: Direction,
    pub timestamp: Option<SystemTime>,
}

/// One entry inlined inside a `BACKUP_PACKET`. Carries no peer of its own —
/// see [`Message::backups`] for why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub line: u64,
    pub version: u64,
    pub data: Payload,
}

/// The fields specific to a message's shape. Several [`MessageTag`]s share
/// one `Body` shape (e.g. `GET`/`GETX` both carry [`Body::Line`], `PUT` and
/// `BACKUP` both carry [`Body::Put`]) — the tag, not the body, is what
/// drives wire dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// `ACK`.
    Empty,
    /// `GET`, `GETX`, `DEL`, `INVACK`, `NOT_FOUND`, `MSGACK`, `TIMEOUT`.
    Line { line: u64 },
    /// `INV`.
    Invalidate { line: u64, previous_owner: i16 },
    /// `PUT`, `BACKUP`.
    Put { line: u64, version: u64, data: Payload },
    /// `PUTX`.
    PutX {
        line: u64,
        version: u64,
        sharers: Vec<i16>,
        data: Payload,
    },
    /// `CHNGD_OWNR`.
    ChangedOwner {
        line: u64,
        certain: bool,
        new_owner: i16,
    },
    /// `BACKUPACK`.
    BackupAck { line: u64, version: u64 },
    /// `BACKUP_PACKET`.
    BackupPacket { id: u64, entries: Vec<BackupEntry> },
    /// `BACKUP_PACKETACK`.
    BackupPacketAck { id: u64 },
    /// `MSG`.
    Msg { line: u64, data: Vec<u8> },
}

impl Body {
    /// Build a `PUTX` body, rejecting a sharer array over the wire maximum
    /// at construction time (§8 scenario 5).
    pub fn put_x(
        line: u64,
        version: u64,
        sharers: Vec<i16>,
        data: Payload,
    ) -> Result<Body, ConstructionError> {
        if sharers.len() > MAX_PAYLOAD {
            return Err(ConstructionError::TooManySharers(sharers.len()));
        }
        Ok(Body::PutX {
            line,
            version,
            sharers,
            data,
        })
    }

    /// Build a `MSG` body, rejecting inline data over the wire maximum at
    /// construction time.
    pub fn msg(line: u64, data: Vec<u8>) -> Result<Body, ConstructionError> {
        if data.len() > MAX_PAYLOAD {
            return Err(ConstructionError::InlineDataTooLarge(data.len()));
        }
        Ok(Body::Msg { line, data })
    }

    /// The tags allowed to carry this body shape, for error messages.
    fn expected_tags(&self) -> &'static [MessageTag] {
        match self {
            Body::Empty => &[MessageTag::Ack],
            Body::Line { .. } => &[
                MessageTag::Get,
                MessageTag::GetX,
                MessageTag::Del,
                MessageTag::InvAck,
                MessageTag::NotFound,
                MessageTag::MsgAck,
                MessageTag::Timeout,
            ],
            Body::Invalidate { .. } => &[MessageTag::Inv],
            Body::Put { .. } => &[MessageTag::Put, MessageTag::Backup],
            Body::PutX { .. } => &[MessageTag::PutX],
            Body::ChangedOwner { .. } => &[MessageTag::ChngdOwnr],
            Body::BackupAck { .. } => &[MessageTag::BackupAck],
            Body::BackupPacket { .. } => &[MessageTag::BackupPacket],
            Body::BackupPacketAck { .. } => &[MessageTag::BackupPacketAck],
            Body::Msg { .. } => &[MessageTag::Msg],
        }
    }

    fn matches_tag(&self, tag: MessageTag) -> bool {
        self.expected_tags().contains(&tag)
    }

    /// The `line` this body carries, if its shape has one. `Empty`,
    /// `BackupPacket`, and `BackupPacketAck` have none — per invariant 6
    /// they are distinguished by tag, not by a sentinel line value, because
    /// the field simply does not exist on those shapes.
    pub fn line_value(&self) -> Option<u64> {
        match self {
            Body::Line { line } => Some(*line),
            Body::Invalidate { line, .. } => Some(*line),
            Body::Put { line, .. } => Some(*line),
            Body::PutX { line, .. } => Some(*line),
            Body::ChangedOwner { line, .. } => Some(*line),
            Body::BackupAck { line, .. } => Some(*line),
            Body::Msg { line, .. } => Some(*line),
            Body::Empty | Body::BackupPacket { .. } | Body::BackupPacketAck { .. } => None,
        }
    }
}

/// A fully-typed Galaxy wire message: tag, serialized header, transient
/// metadata, and body.
#[derive(Debug, Clone)]
pub struct Message {
    pub tag: MessageTag,
    pub header: Header,
    pub meta: Meta,
    pub body: Body,
}

impl Message {
    /// **Unicast request** (§4.1): outgoing, non-response, `REPLY_REQUIRED`
    /// defaulted per the REQUIRES_RESPONSE set, `BROADCAST` set iff
    /// `peer == -1`.
    pub fn unicast_request(
        peer: i16,
        tag: MessageTag,
        body: Body,
    ) -> Result<Message, ConstructionError> {
        if !body.matches_tag(tag) {
            return Err(ConstructionError::UnexpectedTag {
                tag,
                expected: body.expected_tags(),
            });
        }
        let mut flags = Flags::empty();
        if peer == PEER_BROADCAST {
            flags |= Flags::BROADCAST;
        }
        if tag.requires_response_by_default() {
            flags |= Flags::REPLY_REQUIRED;
        }
        let message = Message {
            tag,
            header: Header {
                message_id: MESSAGE_ID_UNASSIGNED,
                flags,
            },
            meta: Meta {
                peer,
                direction: Direction::Outgoing,
                timestamp: None,
            },
            body,
        };
        message.check_invariants()?;
        Ok(message)
    }

    /// **GET-restricted constructor** (§4.1): a unicast request, but only
    /// for `GET`/`GETX`.
    pub fn get_request(peer: i16, tag: MessageTag, line: u64) -> Result<Message, ConstructionError> {
        if !matches!(tag, MessageTag::Get | MessageTag::GetX) {
            return Err(ConstructionError::UnexpectedTag {
                tag,
                expected: &[MessageTag::Get, MessageTag::GetX],
            });
        }
        Message::unicast_request(peer, tag, Body::Line { line })
    }

    /// **Broadcast request** (§4.1): outgoing, non-response, `BROADCAST`
    /// clear (the peer list is carried by the transport, not the message),
    /// `peer` field set to `-1`.
    pub fn broadcast_request(tag: MessageTag, body: Body) -> Result<Message, ConstructionError> {
        if !body.matches_tag(tag) {
            return Err(ConstructionError::UnexpectedTag {
                tag,
                expected: body.expected_tags(),
            });
        }
        let mut flags = Flags::empty();
        if tag.requires_response_by_default() {
            flags |= Flags::REPLY_REQUIRED;
        }
        let message = Message {
            tag,
            header: Header {
                message_id: MESSAGE_ID_UNASSIGNED,
                flags,
            },
            meta: Meta {
                peer: PEER_BROADCAST,
                direction: Direction::Outgoing,
                timestamp: None,
            },
            body,
        };
        message.check_invariants()?;
        Ok(message)
    }

    /// **Response** (§4.1): outgoing, copies `messageId`/peer from
    /// `request`, sets `RESPONSE`, clears `REPLY_REQUIRED` and `BROADCAST`.
    /// Asserts line equality between request and response for subtypes
    /// that carry a line.
    pub fn response_to(
        request: &Message,
        tag: MessageTag,
        body: Body,
    ) -> Result<Message, ConstructionError> {
        if !body.matches_tag(tag) {
            return Err(ConstructionError::UnexpectedTag {
                tag,
                expected: body.expected_tags(),
            });
        }
        if request.header.message_id < 0 {
            return Err(ConstructionError::NegativeResponseMessageId(
                request.header.message_id,
            ));
        }
        if let (Some(request_line), Some(response_line)) =
            (request.body.line_value(), body.line_value())
        {
            if request_line != response_line {
                return Err(ConstructionError::LineMismatch {
                    request_line,
                    response_line,
                });
            }
        }
        let message = Message {
            tag,
            header: Header {
                message_id: request.header.message_id,
                flags: Flags::RESPONSE,
            },
            meta: Meta {
                peer: request.meta.peer,
                direction: Direction::Outgoing,
                timestamp: None,
            },
            body,
        };
        message.check_invariants()?;
        Ok(message)
    }

    /// The synthetic `TIMEOUT` response the transport generates to wake a
    /// waiter whose request expired (§4.4). Pairs by messageId like any
    /// other response.
    pub fn timeout_for(request: &Message, line: u64) -> Result<Message, ConstructionError> {
        Message::response_to(request, MessageTag::Timeout, Body::Line { line })
    }

    /// Invariants 1 and 2: a `RESPONSE` message has `BROADCAST` clear and a
    /// non-negative `messageId`; a `BROADCAST` message addresses peer -1.
    fn check_invariants(&self) -> Result<(), ConstructionError> {
        let flags = self.header.flags;
        if flags.contains(Flags::RESPONSE) {
            if flags.contains(Flags::BROADCAST) {
                return Err(ConstructionError::BroadcastPeerMismatch(self.meta.peer));
            }
            if self.header.message_id < 0 {
                return Err(ConstructionError::NegativeResponseMessageId(
                    self.header.message_id,
                ));
            }
        }
        if flags.contains(Flags::BROADCAST) && self.meta.peer != PEER_BROADCAST {
            return Err(ConstructionError::BroadcastPeerMismatch(self.meta.peer));
        }
        Ok(())
    }

    fn ensure_outgoing(&self, method: &'static str) -> Result<(), StateError> {
        if self.meta.direction != Direction::Outgoing {
            return Err(StateError::NotOutgoing { method });
        }
        Ok(())
    }

    /// Mark this message as received. Called by the transport after decode.
    pub fn set_incoming(&mut self) {
        self.meta.direction = Direction::Incoming;
    }

    pub fn set_timestamp(&mut self, at: SystemTime) {
        self.meta.timestamp = Some(at);
    }

    /// Assigned by the transport from its monotonic counter on first
    /// emission of a non-response request; responses inherit the request's
    /// id instead of calling this.
    pub fn set_message_id(&mut self, id: i64) {
        self.header.message_id = id;
    }

    /// `setBroadcast` (§4.3): direction-sensitive, only meaningful outgoing.
    pub fn set_broadcast(&mut self, value: bool) -> Result<(), StateError> {
        self.ensure_outgoing("set_broadcast")?;
        self.header.flags.set(Flags::BROADCAST, value);
        Ok(())
    }

    /// `setReplyRequired` (§4.3): direction-sensitive, only meaningful
    /// outgoing. This is how a producer clears the default for a
    /// fire-and-forget send on a tag outside REQUIRES_RESPONSE.
    pub fn set_reply_required(&mut self, value: bool) -> Result<(), StateError> {
        self.ensure_outgoing("set_reply_required")?;
        self.header.flags.set(Flags::REPLY_REQUIRED, value);
        Ok(())
    }

    /// Builder-style variant of [`Message::set_reply_required`] for chaining
    /// onto a freshly built message.
    pub fn with_reply_required(mut self, value: bool) -> Result<Self, StateError> {
        self.set_reply_required(value)?;
        Ok(self)
    }

    /// `setNode` (§4.3): mutate the destination peer; on outgoing messages
    /// re-derive `BROADCAST` (set iff `peer == -1`). `BACKUP_PACKET`
    /// contained entries have no peer of their own (see [`Message::backups`]),
    /// so there is nothing further to propagate — invariant 5 holds by
    /// construction.
    pub fn set_node(&mut self, peer: i16) {
        self.meta.peer = peer;
        if self.meta.direction == Direction::Outgoing {
            self.header
                .flags
                .set(Flags::BROADCAST, peer == PEER_BROADCAST);
        }
    }

    pub fn peer(&self) -> i16 {
        self.meta.peer
    }

    pub fn direction(&self) -> Direction {
        self.meta.direction
    }

    pub fn timestamp(&self) -> Option<SystemTime> {
        self.meta.timestamp
    }

    pub fn message_id(&self) -> i64 {
        self.header.message_id
    }

    pub fn flags(&self) -> Flags {
        self.header.flags
    }

    pub fn is_response(&self) -> bool {
        self.header.flags.contains(Flags::RESPONSE)
    }

    pub fn is_broadcast(&self) -> bool {
        self.header.flags.contains(Flags::BROADCAST)
    }

    pub fn is_reply_required(&self) -> bool {
        self.header.flags.contains(Flags::REPLY_REQUIRED)
    }

    /// Deep-copy every payload buffer this message carries into
    /// independently-owned storage. The primitive the transport invokes
    /// when it cannot complete a send synchronously and must queue the
    /// message past the producer's stability guarantee.
    pub fn clone_data_buffers(&self) -> Message {
        let mut cloned = self.clone();
        match &mut cloned.body {
            Body::Put { data, .. } => *data = data.to_owned_copy(),
            Body::PutX { data, .. } => *data = data.to_owned_copy(),
            Body::BackupPacket { entries, .. } => {
                for entry in entries.iter_mut() {
                    entry.data = entry.data.to_owned_copy();
                }
            }
            Body::Empty
            | Body::Line { .. }
            | Body::Invalidate { .. }
            | Body::ChangedOwner { .. }
            | Body::BackupAck { .. }
            | Body::BackupPacketAck { .. }
            | Body::Msg { .. } => {}
        }
        cloned
    }

    /// Synthesize the contained `BACKUP` messages of a `BACKUP_PACKET`
    /// (§8 scenario 3). Each inherits this packet's current peer, so a
    /// prior [`Message::set_node`] call is reflected without any separate
    /// bookkeeping (invariant 5).
    pub fn backups(&self) -> Vec<Message> {
        match &self.body {
            Body::BackupPacket { entries, .. } => entries
                .iter()
                .map(|entry| Message {
                    tag: MessageTag::Backup,
                    header: Header {
                        message_id: MESSAGE_ID_UNASSIGNED,
                        flags: Flags::empty(),
                    },
                    meta: self.meta.clone(),
                    body: Body::Put {
                        line: entry.line,
                        version: entry.version,
                        data: entry.data.clone(),
                    },
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_payload(byte: u8) -> Payload {
        Payload::fresh(vec![byte; 4]).unwrap()
    }

    #[test]
    fn unicast_request_sets_expected_flags() {
        let m = Message::unicast_request(5, MessageTag::Get, Body::Line { line: 0x100 }).unwrap();
        assert!(!m.is_response());
        assert!(!m.is_broadcast());
        assert!(m.is_reply_required(), "GET is in REQUIRES_RESPONSE");
        assert_eq!(m.peer(), 5);
        assert_eq!(m.message_id(), MESSAGE_ID_UNASSIGNED);
    }

    #[test]
    fn unicast_peer_broadcast_sentinel_sets_broadcast_flag() {
        let m = Message::unicast_request(-1, MessageTag::Del, Body::Line { line: 1 }).unwrap();
        assert!(m.is_broadcast());
        assert!(!m.is_reply_required(), "DEL is outside REQUIRES_RESPONSE");
    }

    #[test]
    fn broadcast_request_clears_broadcast_flag_but_sets_peer_sentinel() {
        let m = Message::broadcast_request(MessageTag::Inv, Body::Invalidate { line: 9, previous_owner: 3 }).unwrap();
        assert!(!m.is_broadcast(), "peer list is carried by the transport");
        assert_eq!(m.peer(), -1);
        assert!(m.is_reply_required());
    }

    #[test]
    fn get_request_rejects_non_get_tags() {
        let err = Message::get_request(1, MessageTag::Put, 1).unwrap_err();
        assert!(matches!(err, ConstructionError::UnexpectedTag { .. }));
    }

    #[test]
    fn response_copies_message_id_and_peer() {
        let mut request = Message::unicast_request(5, MessageTag::Get, Body::Line { line: 0x100 }).unwrap();
        request.set_message_id(42);
        let response = Message::response_to(&request, MessageTag::Put, Body::Put {
            line: 0x100,
            version: 7,
            data: small_payload(1),
        }).unwrap();
        assert_eq!(response.message_id(), 42);
        assert_eq!(response.peer(), 5);
        assert!(response.is_response());
        assert!(!response.is_reply_required());
        assert!(!response.is_broadcast());
    }

    #[test]
    fn response_rejects_unassigned_request_id() {
        let request = Message::unicast_request(5, MessageTag::Get, Body::Line { line: 1 }).unwrap();
        let err = Message::response_to(&request, MessageTag::NotFound, Body::Line { line: 1 }).unwrap_err();
        assert_eq!(err, ConstructionError::NegativeResponseMessageId(-1));
    }

    #[test]
    fn response_rejects_line_mismatch() {
        let mut request = Message::unicast_request(5, MessageTag::Get, Body::Line { line: 1 }).unwrap();
        request.set_message_id(1);
        let err = Message::response_to(&request, MessageTag::NotFound, Body::Line { line: 2 }).unwrap_err();
        assert_eq!(err, ConstructionError::LineMismatch { request_line: 1, response_line: 2 });
    }

    #[test]
    fn put_x_rejects_too_many_sharers() {
        let sharers = vec![0i16; MAX_PAYLOAD + 5000];
        let err = Body::put_x(1, 1, sharers, small_payload(1)).unwrap_err();
        assert!(matches!(err, ConstructionError::TooManySharers(_)));
    }

    #[test]
    fn set_broadcast_rejected_on_incoming_message() {
        let mut m = Message::unicast_request(5, MessageTag::Get, Body::Line { line: 1 }).unwrap();
        m.set_incoming();
        let err = m.set_broadcast(true).unwrap_err();
        assert_eq!(err, StateError::NotOutgoing { method: "set_broadcast" });
    }

    #[test]
    fn set_node_rederives_broadcast_flag() {
        let mut m = Message::unicast_request(5, MessageTag::Del, Body::Line { line: 1 }).unwrap();
        assert!(!m.is_broadcast());
        m.set_node(-1);
        assert!(m.is_broadcast());
        m.set_node(8);
        assert!(!m.is_broadcast());
    }

    #[test]
    fn backup_packet_entries_report_packet_peer_after_set_node() {
        let entries = vec![
            BackupEntry { line: 1, version: 1, data: small_payload(1) },
            BackupEntry { line: 2, version: 1, data: small_payload(2) },
        ];
        let mut packet = Message::unicast_request(3, MessageTag::BackupPacket, Body::BackupPacket { id: 99, entries }).unwrap();
        packet.set_node(7);
        let backups = packet.backups();
        assert_eq!(backups.len(), 2);
        for b in &backups {
            assert_eq!(b.peer(), 7);
            assert_eq!(b.tag, MessageTag::Backup);
        }
    }

    #[test]
    fn clone_data_buffers_is_independent_of_original() {
        let m = Message::unicast_request(1, MessageTag::Put, Body::Put {
            line: 1,
            version: 1,
            data: Payload::borrowed(vec![1, 2, 3]).unwrap(),
        }).unwrap();
        let cloned = m.clone_data_buffers();
        match (&m.body, &cloned.body) {
            (Body::Put { data: a, .. }, Body::Put { data: b, .. }) => {
                assert_eq!(a, b);
                assert_eq!(b.ownership(), crate::payload::Ownership::Fresh);
            }
            _ => unreachable!(),
        }
    }
}
