//! Error kinds for the wire-messaging core.
//!
//! Three kinds, per the protocol's error taxonomy: a truncated or malformed
//! frame is a [`FramingError`] (the transport's problem — reset the
//! connection); a caller building an invalid `Message` hits a
//! [`ConstructionError`] (a programming error — fail fast); mutating a
//! direction-sensitive field on the wrong kind of message is a
//! [`StateError`] (also a programming error). Nothing here is retried —
//! retries are a transport concern driven by REPLY_REQUIRED + TIMEOUT.

use thiserror::Error;

/// Errors surfaced while decoding bytes off the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("unknown message tag byte: {0}")]
    UnknownTag(u8),

    #[error("truncated frame: needed {needed} bytes, had {available}")]
    Truncated { needed: usize, available: usize },

    #[error("invalid flag bits: 0x{0:02x}")]
    InvalidFlags(u8),

    #[error("payload length {0} exceeds maximum {}", crate::limits::MAX_PAYLOAD)]
    PayloadTooLarge(usize),

    #[error("declared length {declared} does not match remaining bytes {available}")]
    InconsistentLength { declared: usize, available: usize },
}

/// Errors raised by a smart constructor when the requested message shape
/// violates an invariant of §4.1.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    #[error("tag {tag:?} does not accept this constructor; expected one of {expected:?}")]
    UnexpectedTag {
        tag: crate::tag::MessageTag,
        expected: &'static [crate::tag::MessageTag],
    },

    #[error("response messageId must be non-negative, got {0}")]
    NegativeResponseMessageId(i64),

    #[error("sharer count {0} exceeds maximum {}", crate::limits::MAX_PAYLOAD)]
    TooManySharers(usize),

    #[error("inline data length {0} exceeds maximum {}", crate::limits::MAX_PAYLOAD)]
    InlineDataTooLarge(usize),

    #[error("payload buffer length {0} exceeds maximum {}", crate::limits::MAX_PAYLOAD)]
    PayloadTooLarge(usize),

    #[error("response line {response_line} does not match request line {request_line}")]
    LineMismatch { request_line: u64, response_line: u64 },

    #[error("broadcast request message must address peer -1, got {0}")]
    BroadcastPeerMismatch(i16),
}

/// Errors raised when a direction-sensitive setter is called on a message
/// whose direction forbids it (e.g. `set_broadcast` on an incoming message).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("{method} may only be called on an outgoing message")]
    NotOutgoing { method: &'static str },
}
