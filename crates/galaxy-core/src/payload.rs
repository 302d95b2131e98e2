//! Payload buffers and the producer/transport ownership contract.
//!
//! The contract (§4.2, §5): buffer 0 of an outgoing message is "fresh" —
//! the transport may mutate or consume it. Any later buffer is borrowed
//! from cache-managed storage and must be copied before the transport
//! defers the send. [`Ownership`] makes that distinction a type-level tag
//! instead of an implicit convention the transport has to remember.

use bytes::Bytes;

use crate::error::ConstructionError;
use crate::limits::MAX_PAYLOAD;

/// Who owns the backing storage of a [`Payload`], and therefore whether the
/// transport may hold onto it past the synchronous send call without
/// copying first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Independently owned; safe to hold, mutate, or consume.
    Fresh,
    /// Backed by storage the producer (cache) only guarantees is stable for
    /// the duration of the send call. Must be deep-copied
    /// ([`Payload::to_owned_copy`]) before being queued.
    Borrowed,
}

/// One opaque payload buffer carried by a message (e.g. a `PUT`'s data, or
/// one entry's data inside a `BACKUP_PACKET`).
#[derive(Debug, Clone)]
pub struct Payload {
    bytes: Bytes,
    ownership: Ownership,
}

impl Payload {
    /// Wrap bytes the caller owns outright — safe for the transport to hold
    /// or mutate past the send call.
    pub fn fresh(bytes: impl Into<Bytes>) -> Result<Self, ConstructionError> {
        Self::new(bytes.into(), Ownership::Fresh)
    }

    /// Wrap bytes borrowed from cache-managed storage — the transport must
    /// copy these before deferring the send.
    pub fn borrowed(bytes: impl Into<Bytes>) -> Result<Self, ConstructionError> {
        Self::new(bytes.into(), Ownership::Borrowed)
    }

    fn new(bytes: Bytes, ownership: Ownership) -> Result<Self, ConstructionError> {
        if bytes.len() > MAX_PAYLOAD {
            return Err(ConstructionError::PayloadTooLarge(bytes.len()));
        }
        Ok(Self { bytes, ownership })
    }

    /// Construct directly from an already-validated `Bytes`, skipping the
    /// length check. Used by the codec on decode, where the slice was cut
    /// from a frame whose total length was already bounded.
    pub(crate) fn from_wire(bytes: Bytes) -> Self {
        Self {
            bytes,
            ownership: Ownership::Borrowed,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Deep-copy this buffer into independently-owned storage, marking the
    /// result `Fresh`. This is what [`crate::message::Message::clone_data_buffers`]
    /// calls for each payload buffer.
    pub fn to_owned_copy(&self) -> Payload {
        Payload {
            bytes: Bytes::copy_from_slice(&self.bytes),
            ownership: Ownership::Fresh,
        }
    }
}

impl PartialEq for Payload {
    /// Content equality only — two buffers with the same bytes but
    /// different ownership tags are still "the same payload" for test and
    /// round-trip purposes. Ownership is a transport-handling hint, not
    /// part of the buffer's identity.
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Payload {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_rejects_oversized_buffer() {
        let big = vec![0u8; MAX_PAYLOAD + 1];
        assert_eq!(
            Payload::fresh(big),
            Err(ConstructionError::PayloadTooLarge(MAX_PAYLOAD + 1))
        );
    }

    #[test]
    fn max_payload_boundary_is_legal() {
        let exact = vec![0u8; MAX_PAYLOAD];
        assert!(Payload::fresh(exact).is_ok());
    }

    #[test]
    fn to_owned_copy_is_independent() {
        let original_data = Bytes::from(vec![1, 2, 3]);
        let p = Payload::borrowed(original_data.clone()).unwrap();
        let cloned = p.to_owned_copy();
        assert_eq!(cloned.ownership(), Ownership::Fresh);
        assert_eq!(cloned.bytes(), p.bytes());
        // Bytes is immutable once constructed, so "mutating the original"
        // means rebinding the producer's buffer — the clone is unaffected
        // because it owns a separate allocation.
        drop(p);
        assert_eq!(cloned.bytes().as_ref(), &[1, 2, 3][..]);
    }

    #[test]
    fn content_equality_ignores_ownership() {
        let a = Payload::fresh(vec![9, 9]).unwrap();
        let b = Payload::borrowed(vec![9, 9]).unwrap();
        assert_eq!(a, b);
    }
}
