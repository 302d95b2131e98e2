//! Wire encoding and decoding, in both forms (§6).
//!
//! The **flat** form is one contiguous byte stream: every length prefix
//! sits immediately before the bytes it describes, variant by variant,
//! just as a socket read would see it. The **vector** form batches every
//! length prefix into a single header buffer and returns the payload
//! buffers themselves by reference — built for scatter-gather writev-style
//! sends where a cache-owned buffer should never be copied onto a
//! single contiguous stream. The two are not interchangeable: flat bytes
//! decode only via [`decode_flat`], vector buffers only via [`decode_vector`].
//!
//! Every multi-byte integer on the wire is big-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::error::FramingError;
use crate::flags::Flags;
use crate::limits::{COMMON_HEADER_LEN, MAX_PAYLOAD};
use crate::message::{BackupEntry, Body, Header, Message, Meta, Direction};
use crate::payload::Payload;
use crate::tag::MessageTag;

/// A message's buffers, ready for a scatter-gather send: `header` holds the
/// tag, messageId, flags, fixed body fields, and every length prefix;
/// `payloads` holds the actual payload buffers in emission order, each
/// referenced rather than copied.
#[derive(Debug, Clone)]
pub struct VectorFrame {
    pub header: Bytes,
    pub payloads: Vec<Bytes>,
}

fn put_u16_len(buf: &mut BytesMut, len: usize) -> Result<(), FramingError> {
    if len > MAX_PAYLOAD {
        return Err(FramingError::PayloadTooLarge(len));
    }
    buf.put_u16(len as u16);
    Ok(())
}

fn take_len_prefixed(buf: &mut Bytes) -> Result<Bytes, FramingError> {
    if buf.len() < 2 {
        return Err(FramingError::Truncated { needed: 2, available: buf.len() });
    }
    let len = buf.get_u16() as usize;
    if buf.len() < len {
        return Err(FramingError::Truncated { needed: len, available: buf.len() });
    }
    Ok(buf.split_to(len))
}

fn require(buf: &Bytes, needed: usize) -> Result<(), FramingError> {
    if buf.len() < needed {
        return Err(FramingError::Truncated { needed, available: buf.len() });
    }
    Ok(())
}

fn write_common_header(buf: &mut BytesMut, tag: MessageTag, header: &Header) {
    buf.put_u8(tag.wire_byte());
    buf.put_i64(header.message_id);
    buf.put_u8(header.flags.to_wire_byte());
}

fn read_common_header(buf: &mut Bytes) -> Result<(MessageTag, Header), FramingError> {
    require(buf, COMMON_HEADER_LEN)?;
    let tag_byte = buf.get_u8();
    let message_id = buf.get_i64();
    let flags_byte = buf.get_u8();
    let tag = MessageTag::try_from(tag_byte)?;
    let flags = Flags::from_wire_byte(flags_byte).ok_or(FramingError::InvalidFlags(flags_byte))?;
    Ok((tag, Header { message_id, flags }))
}

fn fresh_meta() -> Meta {
    Meta {
        peer: crate::limits::PEER_BROADCAST,
        direction: Direction::Incoming,
        timestamp: None,
    }
}

/// Encode a message as one contiguous byte stream.
pub fn encode_flat(message: &Message) -> Result<Bytes, FramingError> {
    let mut buf = BytesMut::with_capacity(64);
    write_common_header(&mut buf, message.tag, &message.header);
    match &message.body {
        Body::Empty => {}
        Body::Line { line } => buf.put_u64(*line),
        Body::Invalidate { line, previous_owner } => {
            buf.put_u64(*line);
            buf.put_i16(*previous_owner);
        }
        Body::Put { line, version, data } => {
            buf.put_u64(*line);
            buf.put_u64(*version);
            put_u16_len(&mut buf, data.len())?;
            buf.put_slice(data.bytes());
        }
        Body::PutX { line, version, sharers, data } => {
            buf.put_u64(*line);
            buf.put_u64(*version);
            put_u16_len(&mut buf, sharers.len())?;
            for s in sharers {
                buf.put_i16(*s);
            }
            put_u16_len(&mut buf, data.len())?;
            buf.put_slice(data.bytes());
        }
        Body::ChangedOwner { line, certain, new_owner } => {
            buf.put_u64(*line);
            buf.put_u8(if *certain { 1 } else { 0 });
            buf.put_i16(*new_owner);
        }
        Body::BackupAck { line, version } => {
            buf.put_u64(*line);
            buf.put_u64(*version);
        }
        Body::BackupPacket { id, entries } => {
            buf.put_u64(*id);
            buf.put_u32(entries.len() as u32);
            for entry in entries {
                buf.put_u64(entry.line);
                buf.put_u64(entry.version);
                put_u16_len(&mut buf, entry.data.len())?;
                buf.put_slice(entry.data.bytes());
            }
        }
        Body::BackupPacketAck { id } => buf.put_u64(*id),
        Body::Msg { line, data } => {
            buf.put_u64(*line);
            put_u16_len(&mut buf, data.len())?;
            buf.put_slice(data);
        }
    }
    Ok(buf.freeze())
}

/// Decode a message from one contiguous byte stream, as produced by
/// [`encode_flat`]. Rejects truncated frames, unknown tags, and reserved
/// flag bits without panicking.
pub fn decode_flat(mut bytes: Bytes) -> Result<Message, FramingError> {
    let original_len = bytes.len();
    let (tag, header) = read_common_header(&mut bytes).map_err(|e| {
        debug!(error = %e, "rejecting malformed frame header");
        e
    })?;
    let body = match tag {
        MessageTag::Ack => Body::Empty,
        MessageTag::Get
        | MessageTag::GetX
        | MessageTag::Del
        | MessageTag::InvAck
        | MessageTag::NotFound
        | MessageTag::MsgAck
        | MessageTag::Timeout => {
            require(&bytes, 8)?;
            Body::Line { line: bytes.get_u64() }
        }
        MessageTag::Inv => {
            require(&bytes, 10)?;
            let line = bytes.get_u64();
            let previous_owner = bytes.get_i16();
            Body::Invalidate { line, previous_owner }
        }
        MessageTag::Put | MessageTag::Backup => {
            require(&bytes, 16)?;
            let line = bytes.get_u64();
            let version = bytes.get_u64();
            let data = take_len_prefixed(&mut bytes)?;
            Body::Put { line, version, data: Payload::from_wire(data) }
        }
        MessageTag::PutX => {
            require(&bytes, 16)?;
            let line = bytes.get_u64();
            let version = bytes.get_u64();
            require(&bytes, 2)?;
            let sharer_count = bytes.get_u16() as usize;
            require(&bytes, sharer_count * 2)?;
            let mut sharers = Vec::with_capacity(sharer_count);
            for _ in 0..sharer_count {
                sharers.push(bytes.get_i16());
            }
            let data = take_len_prefixed(&mut bytes)?;
            Body::PutX { line, version, sharers, data: Payload::from_wire(data) }
        }
        MessageTag::ChngdOwnr => {
            require(&bytes, 11)?;
            let line = bytes.get_u64();
            let certain = bytes.get_u8() != 0;
            let new_owner = bytes.get_i16();
            Body::ChangedOwner { line, certain, new_owner }
        }
        MessageTag::BackupAck => {
            require(&bytes, 16)?;
            let line = bytes.get_u64();
            let version = bytes.get_u64();
            Body::BackupAck { line, version }
        }
        MessageTag::BackupPacket => {
            require(&bytes, 8)?;
            let id = bytes.get_u64();
            require(&bytes, 4)?;
            let entry_count = bytes.get_u32() as usize;
            let mut entries = Vec::with_capacity(entry_count);
            for _ in 0..entry_count {
                require(&bytes, 16)?;
                let line = bytes.get_u64();
                let version = bytes.get_u64();
                let data = take_len_prefixed(&mut bytes)?;
                entries.push(BackupEntry { line, version, data: Payload::from_wire(data) });
            }
            Body::BackupPacket { id, entries }
        }
        MessageTag::BackupPacketAck => {
            require(&bytes, 8)?;
            Body::BackupPacketAck { id: bytes.get_u64() }
        }
        MessageTag::Msg => {
            require(&bytes, 8)?;
            let line = bytes.get_u64();
            let data = take_len_prefixed(&mut bytes)?;
            Body::Msg { line, data: data.to_vec() }
        }
    };
    if !bytes.is_empty() {
        return Err(FramingError::InconsistentLength {
            declared: original_len - bytes.len(),
            available: original_len,
        });
    }
    Ok(Message { tag, header, meta: fresh_meta(), body })
}

/// Encode a message as a header buffer plus its payload buffers, for a
/// scatter-gather send. Payload buffers are referenced, not copied.
pub fn encode_vector(message: &Message) -> Result<VectorFrame, FramingError> {
    let mut header = BytesMut::with_capacity(32);
    let mut payloads = Vec::new();
    write_common_header(&mut header, message.tag, &message.header);
    match &message.body {
        Body::Empty => {}
        Body::Line { line } => header.put_u64(*line),
        Body::Invalidate { line, previous_owner } => {
            header.put_u64(*line);
            header.put_i16(*previous_owner);
        }
        Body::Put { line, version, data } => {
            header.put_u64(*line);
            header.put_u64(*version);
            put_u16_len(&mut header, data.len())?;
            payloads.push(data.bytes().clone());
        }
        Body::PutX { line, version, sharers, data } => {
            header.put_u64(*line);
            header.put_u64(*version);
            put_u16_len(&mut header, sharers.len())?;
            for s in sharers {
                header.put_i16(*s);
            }
            put_u16_len(&mut header, data.len())?;
            payloads.push(data.bytes().clone());
        }
        Body::ChangedOwner { line, certain, new_owner } => {
            header.put_u64(*line);
            header.put_u8(if *certain { 1 } else { 0 });
            header.put_i16(*new_owner);
        }
        Body::BackupAck { line, version } => {
            header.put_u64(*line);
            header.put_u64(*version);
        }
        Body::BackupPacket { id, entries } => {
            // Unlike the flat form, which interleaves each entry's length
            // with its line/version header, the vector header batches every
            // entry's length after all the inlined line/version pairs —
            // this is the one variant where the two forms' header layouts
            // actually diverge (every other variant has at most one payload
            // buffer, so "inline" and "batched" land in the same place).
            header.put_u64(*id);
            header.put_u32(entries.len() as u32);
            for entry in entries {
                header.put_u64(entry.line);
                header.put_u64(entry.version);
            }
            for entry in entries {
                put_u16_len(&mut header, entry.data.len())?;
                payloads.push(entry.data.bytes().clone());
            }
        }
        Body::BackupPacketAck { id } => header.put_u64(*id),
        Body::Msg { line, data } => {
            // MSG carries zero payload buffers (§3, §6) — its `data` is a
            // length-prefixed inline field, the same as a PUTX sharer
            // array, not a scatter-gather buffer a transport would see in
            // `frame.payloads`.
            header.put_u64(*line);
            put_u16_len(&mut header, data.len())?;
            header.put_slice(data);
        }
    }
    Ok(VectorFrame { header: header.freeze(), payloads })
}

/// Decode a message from a header buffer plus its payload buffers, as
/// produced by [`encode_vector`]. The payload buffers are consumed in
/// emission order; a mismatched count is a [`FramingError::Truncated`].
pub fn decode_vector(mut header: Bytes, mut payloads: Vec<Bytes>) -> Result<Message, FramingError> {
    let mut payloads = payloads.drain(..);
    let mut next_payload = |len: usize| -> Result<Bytes, FramingError> {
        let buf = payloads.next().ok_or(FramingError::Truncated { needed: 1, available: 0 })?;
        if buf.len() != len {
            return Err(FramingError::InconsistentLength { declared: len, available: buf.len() });
        }
        Ok(buf)
    };

    let original_len = header.len();
    let (tag, hdr) = read_common_header(&mut header).map_err(|e| {
        debug!(error = %e, "rejecting malformed vector header");
        e
    })?;
    let body = match tag {
        MessageTag::Ack => Body::Empty,
        MessageTag::Get
        | MessageTag::GetX
        | MessageTag::Del
        | MessageTag::InvAck
        | MessageTag::NotFound
        | MessageTag::MsgAck
        | MessageTag::Timeout => {
            require(&header, 8)?;
            Body::Line { line: header.get_u64() }
        }
        MessageTag::Inv => {
            require(&header, 10)?;
            let line = header.get_u64();
            let previous_owner = header.get_i16();
            Body::Invalidate { line, previous_owner }
        }
        MessageTag::Put | MessageTag::Backup => {
            require(&header, 16)?;
            let line = header.get_u64();
            let version = header.get_u64();
            require(&header, 2)?;
            let len = header.get_u16() as usize;
            Body::Put { line, version, data: Payload::from_wire(next_payload(len)?) }
        }
        MessageTag::PutX => {
            require(&header, 16)?;
            let line = header.get_u64();
            let version = header.get_u64();
            require(&header, 2)?;
            let sharer_count = header.get_u16() as usize;
            require(&header, sharer_count * 2)?;
            let mut sharers = Vec::with_capacity(sharer_count);
            for _ in 0..sharer_count {
                sharers.push(header.get_i16());
            }
            require(&header, 2)?;
            let len = header.get_u16() as usize;
            Body::PutX { line, version, sharers, data: Payload::from_wire(next_payload(len)?) }
        }
        MessageTag::ChngdOwnr => {
            require(&header, 11)?;
            let line = header.get_u64();
            let certain = header.get_u8() != 0;
            let new_owner = header.get_i16();
            Body::ChangedOwner { line, certain, new_owner }
        }
        MessageTag::BackupAck => {
            require(&header, 16)?;
            let line = header.get_u64();
            let version = header.get_u64();
            Body::BackupAck { line, version }
        }
        MessageTag::BackupPacket => {
            require(&header, 8)?;
            let id = header.get_u64();
            require(&header, 4)?;
            let entry_count = header.get_u32() as usize;
            let mut line_versions = Vec::with_capacity(entry_count);
            for _ in 0..entry_count {
                require(&header, 16)?;
                let line = header.get_u64();
                let version = header.get_u64();
                line_versions.push((line, version));
            }
            let mut entries = Vec::with_capacity(entry_count);
            for (line, version) in line_versions {
                require(&header, 2)?;
                let len = header.get_u16() as usize;
                entries.push(BackupEntry { line, version, data: Payload::from_wire(next_payload(len)?) });
            }
            Body::BackupPacket { id, entries }
        }
        MessageTag::BackupPacketAck => {
            require(&header, 8)?;
            Body::BackupPacketAck { id: header.get_u64() }
        }
        MessageTag::Msg => {
            require(&header, 8)?;
            let line = header.get_u64();
            let data = take_len_prefixed(&mut header)?;
            Body::Msg { line, data: data.to_vec() }
        }
    };
    if !header.is_empty() {
        return Err(FramingError::InconsistentLength {
            declared: original_len - header.len(),
            available: original_len,
        });
    }
    if payloads.next().is_some() {
        return Err(FramingError::InconsistentLength { declared: 0, available: 1 });
    }
    Ok(Message { tag, header: hdr, meta: fresh_meta(), body })
}

/// Total encoded size in bytes, as [`encode_flat`] would produce — the
/// fixed header and body fields plus every length prefix plus every
/// payload buffer's own bytes.
pub fn size(message: &Message) -> usize {
    size1(message) + payload_lens(message).iter().sum::<usize>()
}

/// Encoded size excluding payload buffer bytes: the fixed header and body
/// fields plus a 2-byte length prefix per payload buffer, as the flat form
/// lays them out. Note this tracks every length-prefixed field the flat
/// encoding carries, including `MSG`'s inline `data` — which the vector
/// form writes into its header buffer too (§3: `MSG` has zero payload
/// buffers), unlike `PUT`/`PUTX`/`BACKUP_PACKET`, whose length-prefixed
/// field really does move to a separate gather buffer in that form.
pub fn size1(message: &Message) -> usize {
    let fixed = match &message.body {
        Body::Empty => 0,
        Body::Line { .. } => 8,
        Body::Invalidate { .. } => 10,
        Body::Put { .. } => 16,
        Body::PutX { sharers, .. } => 16 + 2 + sharers.len() * 2,
        Body::ChangedOwner { .. } => 11,
        Body::BackupAck { .. } => 16,
        Body::BackupPacket { entries, .. } => 8 + 4 + entries.len() * 16,
        Body::BackupPacketAck { .. } => 8,
        Body::Msg { .. } => 8,
    };
    COMMON_HEADER_LEN + fixed + payload_lens(message).len() * 2
}

/// Lengths of every length-prefixed field in the flat encoding, for
/// [`size`]/[`size1`]'s arithmetic. Not the same set as `encode_vector`'s
/// gather buffers — `MSG`'s entry here is inline in both wire forms.
fn payload_lens(message: &Message) -> Vec<usize> {
    match &message.body {
        Body::Put { data, .. } | Body::PutX { data, .. } => vec![data.len()],
        Body::BackupPacket { entries, .. } => entries.iter().map(|e| e.data.len()).collect(),
        Body::Msg { data, .. } => vec![data.len()],
        Body::Empty
        | Body::Line { .. }
        | Body::Invalidate { .. }
        | Body::ChangedOwner { .. }
        | Body::BackupAck { .. }
        | Body::BackupPacketAck { .. } => Vec::new(),
    }
}
