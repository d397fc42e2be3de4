//! SCSI hard disk target emulation
//!
//! This library emulates the command/response behaviour of a SCSI-1/SCSI-2
//! direct-access device as seen by legacy host adapters. A bus model feeds
//! it Command Descriptor Blocks; the disk selects the following bus phase,
//! moves data to or from a flat 512-byte-block image, and reports status
//! and deferred sense.
//!
//! # Example
//!
//! ```no_run
//! use scsi_hd_target::{HardDisk, Phase};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut disk = HardDisk::open("disk.img")?;
//!
//! // READ(6): one block at LBA 0
//! let phase = disk.decode(&[0x08, 0x00, 0x00, 0x00, 0x01, 0x00])?;
//! assert_eq!(phase, Phase::DataIn);
//!
//! let mut block = [0u8; 512];
//! let n = disk.transfer_in(&mut block)?;
//! let status = disk.status()?;
//! println!("read {} bytes, status {:#04x}", n, status);
//! # Ok(())
//! # }
//! ```

pub mod cdb;
pub mod device;
pub mod disk;
pub mod error;
pub mod geometry;
pub mod sense;
pub mod store;

pub use cdb::{Cdb, OmtiConfigMode, Opcode, Phase};
pub use device::ScsiDevice;
pub use disk::{CommandState, HardDisk, HardDiskBuilder, IoFaultPolicy};
pub use error::{DevResult, ErrorTier, ScsiDevError};
pub use geometry::DriveGeometry;
pub use sense::{result_code, scsi_status};
pub use store::{BlockStore, FileImage, MemoryImage, StoreError, BLOCK_SIZE};

/// Version of this library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
