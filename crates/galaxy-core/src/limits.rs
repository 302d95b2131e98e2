//! Wire-format constants.
//!
//! These are protocol limits, not deployment configuration — changing any
//! of them is a breaking wire-format change, not a config file edit. See
//! `DESIGN.md` for why this crate has no `*Config` analog to
//! `summit-core::config`.

use static_assertions::const_assert_eq;

/// Maximum length, in bytes, of any length-prefixed field on the wire:
/// a `PUT`/`PUTX`/`BACKUP` payload buffer, a `PUTX` sharer array, or `MSG`
/// inline data. Encoded as an unsigned 16-bit length prefix.
///
/// The original source's check reads `size >= (2 << 16)`, i.e. 131072 —
/// twice the value a 16-bit length prefix can actually address. Treated
/// here as a bug in the original and tightened to the documented bound.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// Byte length of the common header present on every message:
/// `[tag:1][messageId:8][flags:1]`.
pub const COMMON_HEADER_LEN: usize = 10;

const_assert_eq!(MAX_PAYLOAD, 65535);

/// Sentinel value meaning "no peer" / "broadcast" for a 16-bit peer field.
pub const PEER_BROADCAST: i16 = -1;

/// Sentinel value meaning "unassigned" for a 64-bit message id.
pub const MESSAGE_ID_UNASSIGNED: i64 = -1;
