use crate::{
    Flags, DATAGRAM_LEN, FRAME_COUNT, MAGIC, MAX_DATA_LEN, PROTOCOL_VERSION,
};
use embedded_can::{ExtendedId, Id, StandardId};
use thiserror_no_std::Error;
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

/// Reasons a received datagram is not a CANETH frame.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum MalformedFrame {
    /// Fewer bytes than a full datagram.
    #[error("datagram too short: {len} bytes")]
    Truncated { len: usize },
    /// First eight bytes are not the protocol magic.
    #[error("magic tag mismatch")]
    Magic,
    /// Declared length does not fit a classic CAN payload.
    #[error("declared data length {dlc} exceeds 8")]
    DataLength { dlc: u8 },
}

/// Classic CAN frame as carried across the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct CanFrame {
    id: u32,
    dlc: u8,
    data: [u8; MAX_DATA_LEN],
    flags: Flags,
}

impl CanFrame {
    /// Data frame from a raw identifier, `None` when `data` is longer than 8
    /// bytes.
    pub fn from_raw(id: u32, data: &[u8], flags: Flags) -> Option<Self> {
        if data.len() > MAX_DATA_LEN {
            return None;
        }

        let mut can_data = [0u8; MAX_DATA_LEN];
        can_data[..data.len()].copy_from_slice(data);

        Some(CanFrame {
            id,
            dlc: data.len() as u8,
            data: can_data,
            flags,
        })
    }

    /// Remote frame from a raw identifier requesting `dlc` bytes.
    pub fn remote_from_raw(id: u32, dlc: usize, flags: Flags) -> Option<Self> {
        if dlc > MAX_DATA_LEN {
            return None;
        }

        Some(CanFrame {
            id,
            dlc: dlc as u8,
            data: [0; MAX_DATA_LEN],
            flags: flags | Flags::Remote,
        })
    }

    /// Copy any [`embedded_can::Frame`].
    pub fn from_frame(frame: &impl embedded_can::Frame) -> Option<Self> {
        if frame.dlc() > MAX_DATA_LEN {
            // only classic frames of up to 8 bytes
            return None;
        }

        let id = match frame.id() {
            Id::Standard(id) => id.as_raw() as u32,
            Id::Extended(id) => id.as_raw(),
        };
        let flags = Flags::from_frame(frame);

        if frame.is_remote_frame() {
            Self::remote_from_raw(id, frame.dlc(), flags)
        } else {
            let len = frame.dlc().min(frame.data().len());
            Self::from_raw(id, &frame.data()[..len], flags)
        }
    }

    /// Identifier as it appears on the wire, without the extended flag.
    pub fn raw_id(&self) -> u32 {
        self.id
    }

    /// Whether the raw identifier fits the 11 or 29 bits its flags allow.
    ///
    /// Decoding keeps out of range identifiers, so check this before handing
    /// a frame to a bus driver.
    pub fn id_in_range(&self) -> bool {
        if self.flags.contains(Flags::Extended) {
            self.id <= ExtendedId::MAX.as_raw()
        } else {
            self.id <= u32::from(StandardId::MAX.as_raw())
        }
    }

    /// Declared data length.
    pub fn declared_len(&self) -> u8 {
        self.dlc
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Payload storage including the zeroed tail past the declared length.
    pub fn payload(&self) -> &[u8; MAX_DATA_LEN] {
        &self.data
    }
}

impl embedded_can::Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        let (flags, id) = match id.into() {
            Id::Standard(id) => (Flags::empty(), id.as_raw() as u32),
            Id::Extended(id) => (Flags::Extended, id.as_raw()),
        };

        CanFrame::from_raw(id, data, flags)
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        let (flags, id) = match id.into() {
            Id::Standard(id) => (Flags::empty(), id.as_raw() as u32),
            Id::Extended(id) => (Flags::Extended, id.as_raw()),
        };

        CanFrame::remote_from_raw(id, dlc, flags)
    }

    fn is_extended(&self) -> bool {
        self.flags.contains(Flags::Extended)
    }

    fn is_remote_frame(&self) -> bool {
        self.flags.contains(Flags::Remote)
    }

    fn id(&self) -> Id {
        // wire identifiers are not range checked, excess bits are masked off
        if self.is_extended() {
            let raw = self.id & ExtendedId::MAX.as_raw();
            Id::Extended(ExtendedId::new(raw).unwrap_or(ExtendedId::ZERO))
        } else {
            let raw = (self.id & u32::from(StandardId::MAX.as_raw())) as u16;
            Id::Standard(StandardId::new(raw).unwrap_or(StandardId::ZERO))
        }
    }

    fn dlc(&self) -> usize {
        self.dlc as usize
    }

    fn data(&self) -> &[u8] {
        if self.is_remote_frame() {
            &[]
        } else {
            &self.data[..self.dlc as usize]
        }
    }
}

/// Complete CANETH datagram.
///
/// | Offset | Size | Field |
/// |---|---|---|
/// | 0 | 8 | magic |
/// | 8 | 1 | protocol version |
/// | 9 | 1 | frame count |
/// | 10 | 4 | identifier, little endian |
/// | 14 | 1 | declared length |
/// | 15 | 8 | payload, zero padded |
/// | 23 | 1 | extended flag |
/// | 24 | 1 | remote flag |
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    AsBytes,
    FromBytes,
    FromZeroes,
    Unaligned,
)]
#[repr(C)]
pub struct Datagram {
    magic: [u8; 8],
    version: u8,
    frame_count: u8,
    id: U32<LittleEndian>,
    dlc: u8,
    data: [u8; MAX_DATA_LEN],
    extended: u8,
    remote: u8,
}

impl Datagram {
    /// Encode a frame.
    pub fn from_frame(frame: &CanFrame) -> Self {
        let len = (frame.dlc as usize).min(MAX_DATA_LEN);

        let mut data = [0u8; MAX_DATA_LEN];
        data[..len].copy_from_slice(&frame.data[..len]);

        Datagram {
            magic: MAGIC,
            version: PROTOCOL_VERSION,
            frame_count: FRAME_COUNT,
            id: U32::new(frame.id),
            dlc: frame.dlc,
            data,
            extended: frame.flags.contains(Flags::Extended) as u8,
            remote: frame.flags.contains(Flags::Remote) as u8,
        }
    }

    /// View the leading [`DATAGRAM_LEN`] bytes of `bytes` as a datagram.
    pub fn parse(bytes: &[u8]) -> Result<Self, MalformedFrame> {
        let datagram = Datagram::read_from_prefix(bytes)
            .ok_or(MalformedFrame::Truncated { len: bytes.len() })?;

        if datagram.magic != MAGIC {
            return Err(MalformedFrame::Magic);
        }

        Ok(datagram)
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn frame_count(&self) -> u8 {
        self.frame_count
    }

    /// Rebuild the carried frame.
    pub fn to_frame(&self) -> Result<CanFrame, MalformedFrame> {
        let len = self.dlc as usize;
        if len > MAX_DATA_LEN {
            return Err(MalformedFrame::DataLength { dlc: self.dlc });
        }

        let mut flags = Flags::empty();
        flags.set(Flags::Extended, self.extended == 1);
        flags.set(Flags::Remote, self.remote == 1);

        let mut data = [0u8; MAX_DATA_LEN];
        data[..len].copy_from_slice(&self.data[..len]);

        Ok(CanFrame {
            id: self.id.get(),
            dlc: self.dlc,
            data,
            flags,
        })
    }

    pub fn to_bytes(&self) -> [u8; DATAGRAM_LEN] {
        let mut bytes = [0u8; DATAGRAM_LEN];
        bytes.copy_from_slice(self.as_bytes());
        bytes
    }
}

/// Encode `frame` into its 25 byte wire form.
pub fn encode(frame: &CanFrame) -> [u8; DATAGRAM_LEN] {
    Datagram::from_frame(frame).to_bytes()
}

/// Decode a received datagram. Bytes past [`DATAGRAM_LEN`] are ignored.
pub fn decode(bytes: &[u8]) -> Result<CanFrame, MalformedFrame> {
    Datagram::parse(bytes)?.to_frame()
}
