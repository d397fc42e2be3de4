//! Bus-facing device interface
//!
//! A SCSI bus model holds its targets as `Box<dyn ScsiDevice>` and drives
//! them through the command, data and status phases.

use crate::cdb::Phase;
use crate::disk::HardDisk;
use crate::error::DevResult;
use crate::store::BlockStore;

/// A target device attached to the emulated SCSI bus
pub trait ScsiDevice {
    /// Command phase: accept a CDB and select the next phase
    fn handle_cmd(&mut self, cdb: &[u8]) -> DevResult<Phase>;

    /// Data-in phase: fill `buf`, returning the number of bytes produced
    fn handle_data_in(&mut self, buf: &mut [u8]) -> DevResult<usize>;

    /// Data-out phase: consume the bytes sent by the initiator
    fn handle_data_out(&mut self, data: &[u8]) -> DevResult<()>;

    /// Status phase: return the completion status byte
    fn handle_status(&mut self) -> DevResult<u8>;

    /// Bus reset
    fn reset(&mut self) {}
}

impl<S: BlockStore> ScsiDevice for HardDisk<S> {
    fn handle_cmd(&mut self, cdb: &[u8]) -> DevResult<Phase> {
        self.decode(cdb)
    }

    fn handle_data_in(&mut self, buf: &mut [u8]) -> DevResult<usize> {
        self.transfer_in(buf)
    }

    fn handle_data_out(&mut self, data: &[u8]) -> DevResult<()> {
        self.transfer_out(data)
    }

    fn handle_status(&mut self) -> DevResult<u8> {
        self.status()
    }

    fn reset(&mut self) {
        HardDisk::reset(self)
    }
}
