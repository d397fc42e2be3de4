//! Error types for SCSI hard-disk target operations

use std::path::PathBuf;

use thiserror::Error;

use crate::disk::CommandState;

/// How severe a failure is for the emulated device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorTier {
    /// Reported to the initiator; the device keeps running
    ProtocolRecoverable,
    /// The host could not service a storage request
    HostIoFatal,
    /// The bus layer broke the command contract
    ContractFatal,
}

/// SCSI hard-disk target errors
#[derive(Debug, Error)]
pub enum ScsiDevError {
    #[error("Invalid command length: {0} (expected 6 to 10 bytes)")]
    InvalidCommandLength(usize),

    #[error("Device unavailable: cannot open image {}: {source}", path.display())]
    DeviceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported command: opcode 0x{0:02X}")]
    UnsupportedCommand(u8),

    #[error("Contract violation: {0}")]
    ContractViolation(String),

    #[error("Command sequence error: {operation} called in state {state:?}")]
    CommandSequence {
        operation: &'static str,
        state: CommandState,
    },

    #[error("Storage fault: {0}")]
    StorageFault(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScsiDevError {
    /// Classify the error
    pub fn tier(&self) -> ErrorTier {
        match self {
            ScsiDevError::InvalidCommandLength(_) => ErrorTier::ProtocolRecoverable,
            ScsiDevError::StorageFault(_)
            | ScsiDevError::DeviceUnavailable { .. }
            | ScsiDevError::Io(_) => ErrorTier::HostIoFatal,
            ScsiDevError::UnsupportedCommand(_)
            | ScsiDevError::ContractViolation(_)
            | ScsiDevError::CommandSequence { .. }
            | ScsiDevError::Config(_) => ErrorTier::ContractFatal,
        }
    }

    /// Whether the emulated device must stop after this error
    pub fn is_fatal(&self) -> bool {
        self.tier() != ErrorTier::ProtocolRecoverable
    }
}

/// Result type for device operations
pub type DevResult<T> = Result<T, ScsiDevError>;
