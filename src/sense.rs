//! Completion status and deferred sense reporting
//!
//! The disk keeps a single deferred result code from the last data-out
//! command. It is reported to the initiator through the check-condition
//! status of that command and through byte 0 of the next REQUEST SENSE.

/// SCSI status byte values
pub mod scsi_status {
    pub const GOOD: u8 = 0x00;
    pub const CHECK_CONDITION: u8 = 0x02;
}

/// Deferred result codes reported in sense byte 0
pub mod result_code {
    pub const SUCCESS: u8 = 0x00;
    pub const GENERIC_FAILURE: u8 = 0x01;
    pub const WRITE_FAULT: u8 = 0x03;
    pub const DRIVE_NOT_READY: u8 = 0x04;
    pub const UNCORRECTABLE_DATA: u8 = 0x11;
    pub const SEEK_ERROR: u8 = 0x15;
    pub const WRITE_PROTECTED: u8 = 0x17;
}

/// Length of the sense payload
pub const SENSE_LENGTH: usize = 17;

/// Sense payload returned when nothing is pending
pub const SENSE_TEMPLATE: [u8; SENSE_LENGTH] = [
    0x80, // error code
    0x00, // sense key
    0x00, 0x00, 0x00, // additional information
    0x00, // additional sense length
    0x00, 0x00, 0x00, 0x00, // command specific information
    0x00, // ASC
    0x00, // ASCQ
    0x00, // FRU code
    0x00, 0x00, 0x00, 0x00, // sense key specific
];

/// Place a LUN in bits 5-6 of a status or sense byte
pub fn lun_bits(lun: u8) -> u8 {
    (lun & 0x03) << 5
}

/// Build a completion status byte
pub fn status_byte(lun: u8, check_condition: bool) -> u8 {
    if check_condition {
        lun_bits(lun) | scsi_status::CHECK_CONDITION
    } else {
        scsi_status::GOOD
    }
}

/// Result of the most recent write-class command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeferredResult(u8);

impl DeferredResult {
    pub fn code(self) -> u8 {
        self.0
    }

    pub fn is_pending(self) -> bool {
        self.0 != result_code::SUCCESS
    }

    pub fn set(&mut self, code: u8) {
        self.0 = code;
    }

    pub fn clear(&mut self) {
        self.0 = result_code::SUCCESS;
    }
}

/// Sense payload builder
pub struct SenseData;

impl SenseData {
    /// Build the sense bytes for a REQUEST SENSE addressed to `lun`
    ///
    /// Each call returns a private copy of [`SENSE_TEMPLATE`]. An absent
    /// LUN reports drive-not-ready; LUN 0 reports the deferred result.
    pub fn build(lun: u8, deferred: DeferredResult) -> [u8; SENSE_LENGTH] {
        let mut data = SENSE_TEMPLATE;
        if lun != 0 {
            data[0] = result_code::DRIVE_NOT_READY;
            data[1] |= lun_bits(lun);
        } else if deferred.is_pending() {
            data[0] = deferred.code();
            data[1] |= lun_bits(lun);
        }
        data
    }
}
