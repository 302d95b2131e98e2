//! Request/response pairing.
//!
//! Pairing is a relation over two messages, not a property either message
//! carries alone, and it is deliberately not the same relation as
//! [`PartialEq`] on [`Message`] bodies: two `GET`s for the same line from
//! the same peer are equal in content but do not "pair" with each other —
//! only a request and its eventual response do. [`pair`] decides the
//! relation directly; [`pairing_key`] gives a waiter table something
//! cheap to index by (messageId) without claiming that key alone is
//! sufficient — callers still need [`pair`] to confirm a candidate.

use crate::message::{Body, Header, Message};
use crate::tag::MessageTag;

/// Whether `a` and `b` are a request and its response. Order of arguments
/// does not matter. Per §4.3, the request/response relation only applies
/// across the producer/transport boundary: if `a` and `b` share a
/// direction, or share response-ness (both requests, or both responses),
/// structural identity is the only fallback, since nothing about
/// request/response semantics applies to either case.
pub fn pair(a: &Message, b: &Message) -> bool {
    if a.direction() == b.direction() || a.is_response() == b.is_response() {
        return same_identity(a, b);
    }
    if a.is_response() {
        pair_request_response(b, a)
    } else {
        pair_request_response(a, b)
    }
}

fn pair_request_response(request: &Message, response: &Message) -> bool {
    let response_id = response.message_id();
    if response_id < 0 {
        return false;
    }
    if request.message_id() != response_id {
        return false;
    }
    // A broadcast request (peer sentinel -1) has no single peer to match
    // against; any respondent's reply pairs with it. `Message::broadcast_request`
    // deliberately clears the BROADCAST flag itself (the peer list is
    // carried by the transport, not the message) and signals broadcast
    // through the peer sentinel instead, so this must key on the peer
    // value, not `is_broadcast()`.
    if request.peer() == crate::limits::PEER_BROADCAST {
        return true;
    }
    request.peer() == response.peer()
}

/// The index key a waiter table groups candidates by. Not a full
/// pairing test on its own — messages sharing a key still need [`pair`]
/// to confirm the relation (e.g. two unrelated broadcast responses can
/// share a `messageId` from different request generations long since
/// reused).
pub fn pairing_key(message: &Message) -> i64 {
    message.message_id()
}

fn same_identity(a: &Message, b: &Message) -> bool {
    a.tag == b.tag
        && a.peer() == b.peer()
        && header_eq(&a.header, &b.header)
        && body_eq(&a.body, &b.body)
}

fn header_eq(a: &Header, b: &Header) -> bool {
    a.message_id == b.message_id && a.flags == b.flags
}

fn body_eq(a: &Body, b: &Body) -> bool {
    a == b
}
