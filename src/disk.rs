//! Emulated SCSI hard disk
//!
//! The bus layer drives one command at a time through the disk:
//!
//! 1. [`HardDisk::decode`] stores the CDB and selects the next phase.
//! 2. In a data-in phase, [`HardDisk::transfer_in`] is called zero or more
//!    times; in a data-out phase, [`HardDisk::transfer_out`] exactly once.
//! 3. [`HardDisk::status`] closes the command and returns the status byte.
//!
//! Errors from write-class commands are not returned to the bus layer.
//! They are recorded as a deferred result and surface as check-condition
//! status and through REQUEST SENSE.

use std::path::{Path, PathBuf};

use crate::cdb::{phase_for, Cdb, OmtiConfigMode, Opcode, Phase};
use crate::error::{DevResult, ScsiDevError};
use crate::geometry::DriveGeometry;
use crate::sense::{result_code, status_byte, DeferredResult, SenseData, SENSE_LENGTH};
use crate::store::{BlockStore, FileImage, StoreError, BLOCK_SIZE};

/// What a READ does when the backing store fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoFaultPolicy {
    /// Return a fatal [`ScsiDevError::StorageFault`]
    #[default]
    Fatal,
    /// Return zeroes and report an uncorrectable data error to the initiator
    Report,
}

/// Command sequencing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    /// Ready for a new command
    Idle,
    /// A command was decoded and its data phase has not finished
    AwaitingData(Phase),
    /// Only the status phase remains
    AwaitingStatus,
}

/// Builder for configuring a [`HardDisk`]
#[derive(Debug, Clone, Default)]
pub struct HardDiskBuilder {
    image: Option<PathBuf>,
    read_only: bool,
    omti_mode: OmtiConfigMode,
    io_fault_policy: IoFaultPolicy,
}

impl HardDiskBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the image file used by [`open`](Self::open)
    pub fn image<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.image = Some(path.as_ref().to_path_buf());
        self
    }

    /// Open the image read-only even if it is writable
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Select the phase used by the OMTI configuration command
    pub fn omti_config_mode(mut self, mode: OmtiConfigMode) -> Self {
        self.omti_mode = mode;
        self
    }

    /// Select how READ handles backing store failures
    pub fn io_fault_policy(mut self, policy: IoFaultPolicy) -> Self {
        self.io_fault_policy = policy;
        self
    }

    /// Build the disk over an existing store
    pub fn build<S: BlockStore>(self, store: S) -> HardDisk<S> {
        if !store.is_writable() {
            log::info!("Disk attached write-protected");
        }
        HardDisk {
            store,
            cdb: None,
            deferred: DeferredResult::default(),
            state: CommandState::Idle,
            read_fault: false,
            omti_mode: self.omti_mode,
            io_fault_policy: self.io_fault_policy,
        }
    }

    /// Open the configured image file and build the disk
    pub fn open(self) -> DevResult<HardDisk<FileImage>> {
        let path = self
            .image
            .clone()
            .ok_or_else(|| ScsiDevError::Config("no disk image configured".to_string()))?;
        let image = if self.read_only {
            FileImage::open_read_only(&path)?
        } else {
            FileImage::open(&path)?
        };
        Ok(self.build(image))
    }
}

/// SCSI direct-access device backed by a [`BlockStore`]
#[derive(Debug)]
pub struct HardDisk<S: BlockStore> {
    store: S,
    cdb: Option<Cdb>,
    deferred: DeferredResult,
    state: CommandState,
    /// A READ failed under [`IoFaultPolicy::Report`]
    read_fault: bool,
    omti_mode: OmtiConfigMode,
    io_fault_policy: IoFaultPolicy,
}

impl HardDisk<FileImage> {
    /// Create a builder for configuring a disk
    pub fn builder() -> HardDiskBuilder {
        HardDiskBuilder::new()
    }

    /// Open an image file with the default configuration
    pub fn open<P: AsRef<Path>>(path: P) -> DevResult<Self> {
        HardDiskBuilder::new().image(path).open()
    }
}

impl<S: BlockStore> HardDisk<S> {
    /// Create a disk over `store` with the default configuration
    pub fn new(store: S) -> Self {
        HardDiskBuilder::new().build(store)
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    pub fn deferred_result(&self) -> u8 {
        self.deferred.code()
    }

    pub fn is_writable(&self) -> bool {
        self.store.is_writable()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Flush the backing store
    pub fn flush(&mut self) -> DevResult<()> {
        self.store
            .flush()
            .map_err(|e| ScsiDevError::StorageFault(e.to_string()))
    }

    /// Bus reset: abandon the current command
    ///
    /// The deferred result survives a reset.
    pub fn reset(&mut self) {
        if self.state != CommandState::Idle {
            log::debug!("SCSI HD: bus reset in state {:?}", self.state);
        }
        self.state = CommandState::Idle;
        self.read_fault = false;
    }

    /// Decode a CDB and return the phase the bus must enter next
    pub fn decode(&mut self, bytes: &[u8]) -> DevResult<Phase> {
        let cdb = Cdb::new(bytes).inspect_err(|_| {
            log::debug!("SCSI HD: rejecting {}-byte command", bytes.len());
        })?;
        if self.state != CommandState::Idle {
            log::error!(
                "SCSI HD: command {:02X} received while in state {:?}",
                cdb.opcode_byte(),
                self.state
            );
            return Err(ScsiDevError::CommandSequence {
                operation: "decode",
                state: self.state,
            });
        }
        let Some(opcode) = cdb.opcode() else {
            log::error!("SCSI HD: unsupported command 0x{:02X}", cdb.opcode_byte());
            return Err(ScsiDevError::UnsupportedCommand(cdb.opcode_byte()));
        };

        log::debug!(
            "SCSI HD: {} lun {} cdb {}",
            opcode.mnemonic(),
            cdb.lun(),
            hex::encode(cdb.as_bytes())
        );

        let phase = phase_for(opcode, self.omti_mode);
        self.cdb = Some(cdb);
        self.read_fault = false;
        self.state = match phase {
            Phase::StatusOnly => CommandState::AwaitingStatus,
            Phase::DataIn | Phase::DataOut => CommandState::AwaitingData(phase),
        };
        Ok(phase)
    }

    fn current_cdb(&self, operation: &'static str) -> DevResult<Cdb> {
        self.cdb.ok_or(ScsiDevError::CommandSequence {
            operation,
            state: self.state,
        })
    }

    fn expect_state(&self, operation: &'static str, allowed: &[CommandState]) -> DevResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            log::error!("SCSI HD: {} called in state {:?}", operation, self.state);
            Err(ScsiDevError::CommandSequence {
                operation,
                state: self.state,
            })
        }
    }

    /// Fill `buf` for a data-in phase, returning the number of bytes produced
    pub fn transfer_in(&mut self, buf: &mut [u8]) -> DevResult<usize> {
        self.expect_state("transfer_in", &[CommandState::AwaitingData(Phase::DataIn)])?;
        let cdb = self.current_cdb("transfer_in")?;

        match cdb.opcode() {
            Some(Opcode::RequestSense) => Ok(self.request_sense(&cdb, buf)),
            Some(Opcode::Read6) => self.read6(&cdb, buf),
            _ => {
                log::error!(
                    "SCSI HD: data-in phase for command 0x{:02X}",
                    cdb.opcode_byte()
                );
                Err(ScsiDevError::ContractViolation(format!(
                    "data-in for command 0x{:02X}",
                    cdb.opcode_byte()
                )))
            }
        }
    }

    fn request_sense(&self, cdb: &Cdb, buf: &mut [u8]) -> usize {
        let lun = cdb.lun();
        let requested = match cdb.transfer_length() {
            0 => 4,
            n => n as usize,
        };
        let len = requested.min(buf.len()).min(SENSE_LENGTH);

        if lun != 0 {
            log::debug!("SCSI HD: lun {} sense, reporting drive not ready", lun);
        } else if self.deferred.is_pending() {
            log::debug!(
                "SCSI HD: sense reports deferred result 0x{:02X}",
                self.deferred.code()
            );
        }

        let sense = SenseData::build(lun, self.deferred);
        buf[..len].copy_from_slice(&sense[..len]);
        len
    }

    fn read6(&mut self, cdb: &Cdb, buf: &mut [u8]) -> DevResult<usize> {
        let lun = cdb.lun();
        let lba = cdb.lba();
        let blocks = cdb.blocks();

        if cdb.transfer_length() == 0 {
            log::debug!("SCSI HD: transfer length 0 -> 256 blocks");
        }
        if cdb.reserved_bits() != 0 {
            log::debug!(
                "SCSI HD: lun {} read {} blocks at lba {}: byte 1 reserved bits set: 0x{:02X}",
                lun,
                blocks,
                lba,
                cdb.reserved_bits()
            );
        } else {
            log::debug!("SCSI HD: lun {} read {} blocks at lba {}", lun, blocks, lba);
        }

        let len = (blocks * BLOCK_SIZE).min(buf.len());
        let out = &mut buf[..len];

        if lun != 0 {
            log::debug!("SCSI HD: placeholder data for unavailable lun {}", lun);
            out.fill(0);
            return Ok(len);
        }

        match self.store.read_blocks(lba, out) {
            Ok(()) => Ok(len),
            Err(e) => match self.io_fault_policy {
                IoFaultPolicy::Fatal => {
                    log::error!("SCSI HD: read of {} blocks at lba {} failed: {}", blocks, lba, e);
                    Err(ScsiDevError::StorageFault(e.to_string()))
                }
                IoFaultPolicy::Report => {
                    log::warn!("SCSI HD: read of {} blocks at lba {} failed: {}", blocks, lba, e);
                    out.fill(0);
                    self.deferred.set(result_code::UNCORRECTABLE_DATA);
                    self.read_fault = true;
                    Ok(len)
                }
            },
        }
    }

    /// Apply the payload of a data-out phase
    pub fn transfer_out(&mut self, data: &[u8]) -> DevResult<()> {
        self.expect_state("transfer_out", &[CommandState::AwaitingData(Phase::DataOut)])?;
        let cdb = self.current_cdb("transfer_out")?;

        match cdb.opcode() {
            Some(Opcode::ModeSelect) => {
                log::debug!("SCSI HD: mode select ignored ({} bytes)", data.len());
                self.deferred.clear();
            }
            Some(Opcode::Write6) => self.write6(&cdb, data)?,
            Some(Opcode::OmtiConfig) => {
                self.omti_config(data);
                self.deferred.clear();
            }
            _ => {
                log::error!(
                    "SCSI HD: data-out phase for command 0x{:02X}",
                    cdb.opcode_byte()
                );
                return Err(ScsiDevError::ContractViolation(format!(
                    "data-out for command 0x{:02X}",
                    cdb.opcode_byte()
                )));
            }
        }

        self.state = CommandState::AwaitingStatus;
        Ok(())
    }

    fn write6(&mut self, cdb: &Cdb, data: &[u8]) -> DevResult<()> {
        let lun = cdb.lun();
        let lba = cdb.lba();
        let blocks = cdb.blocks();
        let len = (blocks * BLOCK_SIZE).min(data.len());

        if len != data.len() {
            log::error!(
                "SCSI HD: write of {} blocks got {} bytes of data",
                blocks,
                data.len()
            );
            return Err(ScsiDevError::ContractViolation(format!(
                "write of {} blocks got {} bytes",
                blocks,
                data.len()
            )));
        }

        log::debug!("SCSI HD: lun {} write {} blocks at lba {}", lun, blocks, lba);

        if lun != 0 {
            log::debug!("SCSI HD: write to unavailable lun {}", lun);
            self.deferred.set(result_code::GENERIC_FAILURE);
            return Ok(());
        }
        if !self.store.is_writable() {
            log::warn!("SCSI HD: write at lba {} rejected, disk is write-protected", lba);
            self.deferred.set(result_code::WRITE_PROTECTED);
            return Ok(());
        }

        let code = match self.store.write_blocks(lba, data) {
            Ok(()) => result_code::SUCCESS,
            Err(e) => {
                log::warn!("SCSI HD: write of {} blocks at lba {} failed: {}", blocks, lba, e);
                match e {
                    StoreError::Seek { .. } => result_code::SEEK_ERROR,
                    StoreError::ReadOnly => result_code::WRITE_PROTECTED,
                    StoreError::ShortRead { .. }
                    | StoreError::ShortWrite { .. }
                    | StoreError::Flush(_) => result_code::WRITE_FAULT,
                }
            }
        };
        self.deferred.set(code);
        Ok(())
    }

    fn omti_config(&self, data: &[u8]) {
        match DriveGeometry::parse(data) {
            Some(geometry) => log::debug!("SCSI HD: OMTI config: {}", geometry),
            None => log::debug!(
                "SCSI HD: truncated OMTI config ignored ({} bytes: {})",
                data.len(),
                hex::encode(data)
            ),
        }
    }

    /// Close the command and return its status byte
    pub fn status(&mut self) -> DevResult<u8> {
        self.expect_state(
            "status",
            &[
                CommandState::AwaitingStatus,
                CommandState::AwaitingData(Phase::DataIn),
            ],
        )?;
        let cdb = self.current_cdb("status")?;
        let lun = cdb.lun();

        let status = match cdb.opcode() {
            Some(Opcode::TestUnitReady) => {
                if lun != 0 {
                    log::debug!("SCSI HD: lun {} test, lun not available; check condition", lun);
                }
                status_byte(lun, lun != 0)
            }
            Some(Opcode::RequestSense) => {
                log::debug!("SCSI HD: lun {} request sense", lun);
                status_byte(lun, false)
            }
            Some(Opcode::Read6) => {
                if lun != 0 {
                    log::debug!("SCSI HD: lun {} not available; check condition", lun);
                }
                status_byte(lun, lun != 0 || self.read_fault)
            }
            Some(Opcode::Write6) => status_byte(lun, self.deferred.is_pending()),
            Some(Opcode::Recalibrate | Opcode::ModeSelect | Opcode::OmtiConfig) => {
                status_byte(lun, false)
            }
            None => {
                log::error!(
                    "SCSI HD: unimplemented status for 0x{:02X}",
                    cdb.opcode_byte()
                );
                return Err(ScsiDevError::ContractViolation(format!(
                    "status for command 0x{:02X}",
                    cdb.opcode_byte()
                )));
            }
        };

        self.state = CommandState::Idle;
        self.read_fault = false;
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sense::scsi_status;
    use crate::store::MemoryImage;

    /// Store whose every access fails
    struct FailingStore {
        fail_seek: bool,
    }

    impl BlockStore for FailingStore {
        fn read_blocks(&mut self, lba: u32, buf: &mut [u8]) -> Result<(), StoreError> {
            Err(StoreError::ShortRead {
                lba,
                expected: buf.len(),
                source: std::io::ErrorKind::UnexpectedEof.into(),
            })
        }

        fn write_blocks(&mut self, lba: u32, data: &[u8]) -> Result<(), StoreError> {
            if self.fail_seek {
                Err(StoreError::Seek {
                    lba,
                    source: std::io::ErrorKind::InvalidInput.into(),
                })
            } else {
                Err(StoreError::ShortWrite {
                    lba,
                    expected: data.len(),
                    source: std::io::ErrorKind::WriteZero.into(),
                })
            }
        }

        fn is_writable(&self) -> bool {
            true
        }
    }

    fn disk(blocks: usize) -> HardDisk<MemoryImage> {
        HardDisk::new(MemoryImage::new(blocks))
    }

    fn run_status_only(disk: &mut HardDisk<impl BlockStore>, cdb: &[u8]) -> u8 {
        assert_eq!(disk.decode(cdb).unwrap(), Phase::StatusOnly);
        disk.status().unwrap()
    }

    fn run_write(disk: &mut HardDisk<impl BlockStore>, cdb: &[u8], data: &[u8]) -> u8 {
        assert_eq!(disk.decode(cdb).unwrap(), Phase::DataOut);
        disk.transfer_out(data).unwrap();
        disk.status().unwrap()
    }

    fn request_sense(disk: &mut HardDisk<impl BlockStore>, lun: u8) -> Vec<u8> {
        let mut buf = [0u8; 32];
        disk.decode(&[0x03, lun << 5, 0, 0, 17, 0]).unwrap();
        let n = disk.transfer_in(&mut buf).unwrap();
        assert_eq!(disk.status().unwrap(), scsi_status::GOOD);
        buf[..n].to_vec()
    }

    #[test]
    fn test_test_unit_ready() {
        let mut disk = disk(8);
        assert_eq!(run_status_only(&mut disk, &[0x00, 0, 0, 0, 0, 0]), scsi_status::GOOD);
        assert_eq!(run_status_only(&mut disk, &[0x00, 1 << 5, 0, 0, 0, 0]), (1 << 5) | 2);
        assert_eq!(disk.state(), CommandState::Idle);
    }

    #[test]
    fn test_recalibrate() {
        let mut disk = disk(8);
        assert_eq!(run_status_only(&mut disk, &[0x01, 0x20, 0, 0, 0, 0]), scsi_status::GOOD);
    }

    #[test]
    fn test_invalid_length_leaves_state() {
        let mut disk = disk(8);
        disk.decode(&[0x08, 0, 0, 0, 1, 0]).unwrap();
        let err = disk.decode(&[0x00, 0, 0]).unwrap_err();
        assert!(matches!(err, ScsiDevError::InvalidCommandLength(3)));
        assert_eq!(disk.state(), CommandState::AwaitingData(Phase::DataIn));
        let mut buf = vec![0u8; BLOCK_SIZE];
        assert_eq!(disk.transfer_in(&mut buf).unwrap(), BLOCK_SIZE);
    }

    #[test]
    fn test_unsupported_opcode_is_fatal() {
        let mut disk = disk(8);
        let err = disk.decode(&[0x12, 0, 0, 0, 36, 0]).unwrap_err();
        assert!(matches!(err, ScsiDevError::UnsupportedCommand(0x12)));
        assert!(err.is_fatal());
        assert_eq!(disk.state(), CommandState::Idle);
    }

    #[test]
    fn test_request_sense_lengths() {
        let mut disk = disk(8);
        let mut buf = [0xFFu8; 64];

        disk.decode(&[0x03, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(disk.transfer_in(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], &[0x80, 0, 0, 0]);
        disk.status().unwrap();

        disk.decode(&[0x03, 0, 0, 0, 20, 0]).unwrap();
        assert_eq!(disk.transfer_in(&mut buf).unwrap(), SENSE_LENGTH);
        disk.status().unwrap();

        disk.decode(&[0x03, 0, 0, 0, 20, 0]).unwrap();
        assert_eq!(disk.transfer_in(&mut buf[..8]).unwrap(), 8);
        disk.status().unwrap();
    }

    #[test]
    fn test_request_sense_absent_lun() {
        let mut disk = disk(8);
        let sense = request_sense(&mut disk, 2);
        assert_eq!(sense[0], result_code::DRIVE_NOT_READY);
        assert_eq!(sense[1], 2 << 5);
    }

    #[test]
    fn test_read_zero_length_is_256_blocks() {
        let mut disk = disk(300);
        let mut buf = vec![0u8; 256 * BLOCK_SIZE + 100];
        disk.decode(&[0x08, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(disk.transfer_in(&mut buf).unwrap(), 131072);
        assert_eq!(disk.status().unwrap(), scsi_status::GOOD);
    }

    #[test]
    fn test_read_clamped_to_buffer() {
        let mut disk = disk(8);
        let mut buf = vec![0u8; 700];
        disk.decode(&[0x08, 0, 0, 0, 4, 0]).unwrap();
        assert_eq!(disk.transfer_in(&mut buf).unwrap(), 700);
        // repeated data-in recomputes from the stored CDB
        assert_eq!(disk.transfer_in(&mut buf[..100]).unwrap(), 100);
        assert_eq!(disk.status().unwrap(), scsi_status::GOOD);
    }

    #[test]
    fn test_read_absent_lun_gives_zeroes() {
        let mut disk = HardDisk::new(MemoryImage::from_bytes(vec![0xAA; 4 * BLOCK_SIZE]));
        let mut buf = vec![0x55u8; 2 * BLOCK_SIZE];
        disk.decode(&[0x08, 3 << 5, 0, 0, 1, 0]).unwrap();
        assert_eq!(disk.transfer_in(&mut buf).unwrap(), BLOCK_SIZE);
        assert!(buf[..BLOCK_SIZE].iter().all(|&b| b == 0));
        assert!(buf[BLOCK_SIZE..].iter().all(|&b| b == 0x55));
        assert_eq!(disk.status().unwrap(), (3 << 5) | 2);
    }

    #[test]
    fn test_read_failure_is_fatal_by_default() {
        let mut disk = HardDisk::new(FailingStore { fail_seek: false });
        let mut buf = vec![0u8; BLOCK_SIZE];
        disk.decode(&[0x08, 0, 0, 0, 1, 0]).unwrap();
        let err = disk.transfer_in(&mut buf).unwrap_err();
        assert!(matches!(err, ScsiDevError::StorageFault(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_read_failure_reported() {
        let mut disk = HardDiskBuilder::new()
            .io_fault_policy(IoFaultPolicy::Report)
            .build(FailingStore { fail_seek: false });
        let mut buf = vec![0xFFu8; BLOCK_SIZE];
        disk.decode(&[0x08, 0, 0, 0, 1, 0]).unwrap();
        assert_eq!(disk.transfer_in(&mut buf).unwrap(), BLOCK_SIZE);
        assert!(buf.iter().all(|&b| b == 0));
        assert_eq!(disk.status().unwrap(), scsi_status::CHECK_CONDITION);
        assert_eq!(request_sense(&mut disk, 0)[0], result_code::UNCORRECTABLE_DATA);
    }

    #[test]
    fn test_write_then_read() {
        let mut disk = disk(16);
        let data: Vec<u8> = (0..2 * BLOCK_SIZE).map(|i| (i % 251) as u8).collect();
        assert_eq!(run_write(&mut disk, &[0x0A, 0, 0, 5, 2, 0], &data), scsi_status::GOOD);
        assert_eq!(disk.deferred_result(), result_code::SUCCESS);

        let mut buf = vec![0u8; 2 * BLOCK_SIZE];
        disk.decode(&[0x08, 0, 0, 5, 2, 0]).unwrap();
        assert_eq!(disk.transfer_in(&mut buf).unwrap(), data.len());
        assert_eq!(buf, data);
        disk.status().unwrap();
    }

    #[test]
    fn test_write_absent_lun() {
        let mut disk = disk(4);
        let status = run_write(&mut disk, &[0x0A, 1 << 5, 0, 0, 1, 0], &[0x11; BLOCK_SIZE]);
        assert_eq!(status, (1 << 5) | 2);
        assert_eq!(disk.deferred_result(), result_code::GENERIC_FAILURE);
        assert!(disk.store().as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_protected() {
        let mut disk = HardDisk::new(MemoryImage::new(4).with_writable(false));
        let status = run_write(&mut disk, &[0x0A, 0, 0, 1, 1, 0], &[0x11; BLOCK_SIZE]);
        assert_eq!(status, scsi_status::CHECK_CONDITION);
        assert!(disk.store().as_bytes().iter().all(|&b| b == 0));
        assert_eq!(request_sense(&mut disk, 0)[0], result_code::WRITE_PROTECTED);
        // not cleared by REQUEST SENSE
        assert_eq!(disk.deferred_result(), result_code::WRITE_PROTECTED);
    }

    #[test]
    fn test_write_seek_and_short_write() {
        let mut disk = HardDisk::new(FailingStore { fail_seek: true });
        run_write(&mut disk, &[0x0A, 0, 0, 0, 1, 0], &[0u8; BLOCK_SIZE]);
        assert_eq!(disk.deferred_result(), result_code::SEEK_ERROR);

        let mut disk = HardDisk::new(FailingStore { fail_seek: false });
        run_write(&mut disk, &[0x0A, 0, 0, 0, 1, 0], &[0u8; BLOCK_SIZE]);
        assert_eq!(disk.deferred_result(), result_code::WRITE_FAULT);
    }

    #[test]
    fn test_write_with_oversized_buffer() {
        let mut disk = disk(4);
        disk.decode(&[0x0A, 0, 0, 0, 1, 0]).unwrap();
        let err = disk.transfer_out(&[0u8; 2 * BLOCK_SIZE]).unwrap_err();
        assert!(matches!(err, ScsiDevError::ContractViolation(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_mode_select_clears_deferred() {
        let mut disk = HardDisk::new(MemoryImage::new(4).with_writable(false));
        run_write(&mut disk, &[0x0A, 0, 0, 0, 1, 0], &[0u8; BLOCK_SIZE]);
        assert_eq!(disk.deferred_result(), result_code::WRITE_PROTECTED);
        assert_eq!(run_write(&mut disk, &[0x15, 0, 0, 0, 12, 0], &[0u8; 12]), scsi_status::GOOD);
        assert_eq!(disk.deferred_result(), result_code::SUCCESS);
    }

    #[test]
    fn test_omti_config() {
        let mut disk = disk(4);
        assert_eq!(run_write(&mut disk, &[0xC2, 0, 0, 0, 0, 0], &[1, 2, 3, 4, 5]), scsi_status::GOOD);
        assert_eq!(disk.deferred_result(), result_code::SUCCESS);

        let block = [1, 3, 0, 4, 0x01, 0x32, 0, 0x80, 0x01, 17];
        assert_eq!(run_write(&mut disk, &[0xC2, 0, 0, 0, 10, 0], &block), scsi_status::GOOD);
    }

    #[test]
    fn test_omti_config_status_only_mode() {
        let mut disk = HardDiskBuilder::new()
            .omti_config_mode(OmtiConfigMode::StatusOnly)
            .build(MemoryImage::new(4));
        assert_eq!(run_status_only(&mut disk, &[0xC2, 0, 0, 0, 0, 0]), scsi_status::GOOD);
    }

    #[test]
    fn test_command_sequencing() {
        let mut disk = disk(4);
        let mut buf = [0u8; 16];

        assert!(matches!(
            disk.status(),
            Err(ScsiDevError::CommandSequence { operation: "status", .. })
        ));
        assert!(matches!(
            disk.transfer_in(&mut buf),
            Err(ScsiDevError::CommandSequence { .. })
        ));

        disk.decode(&[0x0A, 0, 0, 0, 1, 0]).unwrap();
        assert!(matches!(
            disk.decode(&[0x00, 0, 0, 0, 0, 0]),
            Err(ScsiDevError::CommandSequence { operation: "decode", .. })
        ));
        assert!(disk.status().is_err());
        assert!(disk.transfer_in(&mut buf).is_err());

        disk.reset();
        assert_eq!(disk.state(), CommandState::Idle);
        assert_eq!(run_status_only(&mut disk, &[0x00, 0, 0, 0, 0, 0]), scsi_status::GOOD);
    }

    #[test]
    fn test_status_without_data_in() {
        let mut disk = disk(4);
        disk.decode(&[0x08, 0, 0, 0, 1, 0]).unwrap();
        assert_eq!(disk.status().unwrap(), scsi_status::GOOD);
        assert_eq!(disk.state(), CommandState::Idle);
    }
}
