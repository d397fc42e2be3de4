//! Command Descriptor Block decoding and bus phase selection
//!
//! Only group-0 (6-byte) commands are interpreted, but CDBs of up to 10
//! bytes are accepted and stored verbatim.
//!
//! ```text
//!  byte |  7  |  6  5  |  4  3  2  1  0  |
//!  -----+-----+--------+-----------------+
//!    0  |        operation code          |
//!    1  | rsv |  LUN   |   LBA (20..16)  |
//!    2  |           LBA (15..8)          |
//!    3  |           LBA (7..0)           |
//!    4  |   transfer length (0 = 256)    |
//!    5  |            control             |
//! ```

use crate::error::{DevResult, ScsiDevError};
use byteorder::{BigEndian, ByteOrder};

/// Shortest accepted CDB
pub const MIN_CDB_LEN: usize = 6;
/// Longest accepted CDB
pub const MAX_CDB_LEN: usize = 10;

/// Supported operation codes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    TestUnitReady = 0x00,
    Recalibrate = 0x01,
    RequestSense = 0x03,
    Read6 = 0x08,
    Write6 = 0x0A,
    ModeSelect = 0x15,
    /// OMTI "assign drive parameters" vendor command
    OmtiConfig = 0xC2,
}

impl Opcode {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0x00 => Some(Opcode::TestUnitReady),
            0x01 => Some(Opcode::Recalibrate),
            0x03 => Some(Opcode::RequestSense),
            0x08 => Some(Opcode::Read6),
            0x0A => Some(Opcode::Write6),
            0x15 => Some(Opcode::ModeSelect),
            0xC2 => Some(Opcode::OmtiConfig),
            _ => None,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::TestUnitReady => "TEST UNIT READY",
            Opcode::Recalibrate => "RECALIBRATE",
            Opcode::RequestSense => "REQUEST SENSE",
            Opcode::Read6 => "READ(6)",
            Opcode::Write6 => "WRITE(6)",
            Opcode::ModeSelect => "MODE SELECT",
            Opcode::OmtiConfig => "OMTI CONFIG",
        }
    }
}

/// Bus phase that follows the command phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    StatusOnly,
    DataIn,
    DataOut,
}

/// Phase used for the OMTI configuration command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OmtiConfigMode {
    /// The geometry block is transferred in a data-out phase
    #[default]
    DataOut,
    /// Legacy controllers: no data phase, status only
    StatusOnly,
}

/// Map an opcode to the phase the bus must enter next
pub fn phase_for(opcode: Opcode, omti_mode: OmtiConfigMode) -> Phase {
    match opcode {
        Opcode::TestUnitReady | Opcode::Recalibrate => Phase::StatusOnly,
        Opcode::RequestSense | Opcode::Read6 => Phase::DataIn,
        Opcode::Write6 | Opcode::ModeSelect => Phase::DataOut,
        Opcode::OmtiConfig => match omti_mode {
            OmtiConfigMode::DataOut => Phase::DataOut,
            OmtiConfigMode::StatusOnly => Phase::StatusOnly,
        },
    }
}

/// A stored command descriptor block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cdb {
    bytes: [u8; MAX_CDB_LEN],
    len: usize,
}

impl Cdb {
    /// Copy a CDB, rejecting lengths outside 6..=10
    pub fn new(bytes: &[u8]) -> DevResult<Self> {
        if !(MIN_CDB_LEN..=MAX_CDB_LEN).contains(&bytes.len()) {
            return Err(ScsiDevError::InvalidCommandLength(bytes.len()));
        }
        let mut stored = [0u8; MAX_CDB_LEN];
        stored[..bytes.len()].copy_from_slice(bytes);
        Ok(Cdb {
            bytes: stored,
            len: bytes.len(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn opcode_byte(&self) -> u8 {
        self.bytes[0]
    }

    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::from_u8(self.bytes[0])
    }

    pub fn lun(&self) -> u8 {
        (self.bytes[1] & 0x60) >> 5
    }

    /// 21-bit logical block address
    pub fn lba(&self) -> u32 {
        BigEndian::read_u32(&self.bytes[0..4]) & 0x1F_FFFF
    }

    /// Raw transfer length byte
    pub fn transfer_length(&self) -> u8 {
        self.bytes[4]
    }

    /// Block count for READ/WRITE; a length of 0 means 256 blocks
    pub fn blocks(&self) -> usize {
        match self.bytes[4] {
            0 => 256,
            n => n as usize,
        }
    }

    /// Reserved bit 7 of byte 1
    pub fn reserved_bits(&self) -> u8 {
        self.bytes[1] & 0x80
    }

    pub fn control(&self) -> u8 {
        self.bytes[5]
    }
}
