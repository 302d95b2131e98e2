//! The 8-bit flags byte carried on every message.

use bitflags::bitflags;

bitflags! {
    /// Wire flags byte. Three bits defined (§3); bits 3-7 are reserved and
    /// must be zero — a decoder that sees them set rejects the frame rather
    /// than silently accepting a future extension it doesn't understand.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u8 {
        /// This message is a reply to a prior request.
        const RESPONSE = 0b0000_0001;
        /// This message targets all nodes (addressed by sentinel peer -1).
        const BROADCAST = 0b0000_0010;
        /// The sender expects a matching response; the transport may retry
        /// until it arrives or times out.
        const REPLY_REQUIRED = 0b0000_0100;
    }
}

impl Flags {
    /// Parse a wire flags byte, rejecting any reserved bit being set.
    pub fn from_wire_byte(byte: u8) -> Option<Flags> {
        Flags::from_bits(byte)
    }

    /// The exact byte written to the wire.
    pub fn to_wire_byte(self) -> u8 {
        self.bits()
    }
}
