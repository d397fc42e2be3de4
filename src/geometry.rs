//! OMTI drive parameter block (vendor command 0xC2)
//!
//! Hosts send the physical geometry of the attached drive before using it.
//! The emulated disk does not change its addressing based on it; the block
//! is only decoded for diagnostics.

use byteorder::{BigEndian, ByteOrder};
use std::fmt;

/// Size of a complete parameter block
pub const GEOMETRY_BLOCK_LEN: usize = 10;

/// Drive geometry as reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveGeometry {
    pub steps_per_write: u8,
    pub step_rate: u8,
    pub step_mode: u8,
    pub heads: u8,
    pub cylinders: u16,
    /// Write precompensation / reduced write current start cylinder (10 bits)
    pub precomp_cylinder: u16,
    /// Drive type (2 bits)
    pub drive_type: u8,
    pub hard_sectored: bool,
    pub sectors_per_track: u8,
}

impl DriveGeometry {
    /// Decode a parameter block; `None` if it is truncated
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < GEOMETRY_BLOCK_LEN {
            return None;
        }
        Some(DriveGeometry {
            steps_per_write: data[0],
            step_rate: data[1],
            step_mode: data[2],
            heads: data[3],
            cylinders: BigEndian::read_u16(&data[4..6]),
            precomp_cylinder: BigEndian::read_u16(&data[6..8]) & 0x03FF,
            drive_type: (data[8] >> 6) & 0x03,
            hard_sectored: data[8] & 0x01 != 0,
            sectors_per_track: data[9],
        })
    }

    /// Blocks implied by the geometry
    pub fn capacity_blocks(&self) -> u64 {
        u64::from(self.heads) * u64::from(self.cylinders) * u64::from(self.sectors_per_track)
    }
}

impl fmt::Display for DriveGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cyl, {} heads, {} spt ({}-sectored), type {}, precomp cyl {}, \
             step rate {} mode {}, {} steps/write",
            self.cylinders,
            self.heads,
            self.sectors_per_track,
            if self.hard_sectored { "hard" } else { "soft" },
            self.drive_type,
            self.precomp_cylinder,
            self.step_rate,
            self.step_mode,
            self.steps_per_write
        )
    }
}
