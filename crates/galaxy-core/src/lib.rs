//! Wire-level message algebra and framing for the Galaxy cache-coherence
//! fabric: the closed set of message types, their shapes and construction
//! invariants, both wire encodings, and request/response pairing. No
//! transport, no cache storage, no network I/O — those are built on top
//! of this crate, not inside it.

pub mod codec;
pub mod error;
pub mod flags;
pub mod limits;
pub mod message;
pub mod pairing;
pub mod payload;
pub mod tag;

pub use codec::{decode_flat, decode_vector, encode_flat, encode_vector, size, size1, VectorFrame};
pub use error::{ConstructionError, FramingError, StateError};
pub use flags::Flags;
pub use message::{BackupEntry, Body, Direction, Header, Message, Meta};
pub use pairing::{pair, pairing_key};
pub use payload::{Ownership, Payload};
pub use tag::MessageTag;
