//! CANETH network protocol.
//!
//! One CAN frame per UDP datagram, encoded in a fixed 25 byte layout.

#![cfg_attr(not(test), no_std)]

pub mod datagram;

pub use datagram::{decode, encode, CanFrame, Datagram, MalformedFrame};

/// Magic tag opening every datagram.
pub const MAGIC: [u8; 8] = *b"ISO11898";

/// Protocol version identifier.
pub const PROTOCOL_VERSION: u8 = 1;

/// Frames carried per datagram.
pub const FRAME_COUNT: u8 = 1;

/// UDP port, used on both ends of the link.
pub const PORT: u16 = 4210;

/// Encoded datagram length.
pub const DATAGRAM_LEN: usize = 25;

/// Largest payload of a classic CAN frame.
pub const MAX_DATA_LEN: usize = 8;

/// Frame flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Flags(u8);

bitflags::bitflags! {
    impl Flags: u8 {
        const Remote = 1 << 1;
        const Extended = 1 << 0;
    }
}

impl Flags {
    /// Set flags from [`embedded_can::Frame`]
    pub fn from_frame(frame: &impl embedded_can::Frame) -> Self {
        let mut flags = Flags::empty();

        if frame.is_extended() {
            flags |= Flags::Extended
        }

        if frame.is_remote_frame() {
            flags |= Flags::Remote
        }

        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_can::{ExtendedId, Frame, StandardId};

    #[test]
    fn magic_is_ascii() {
        assert_eq!(&MAGIC, b"ISO11898");
        assert_eq!(MAGIC.len(), 8);
    }

    #[test]
    fn flags_from_frame() {
        let id = ExtendedId::new(0x18FF_50E5).unwrap();
        let frame = CanFrame::new(id, &[1, 2]).unwrap();
        assert_eq!(Flags::from_frame(&frame), Flags::Extended);

        let id = StandardId::new(0x7DF).unwrap();
        let frame = CanFrame::new_remote(id, 2).unwrap();
        assert_eq!(Flags::from_frame(&frame), Flags::Remote);
    }
}
