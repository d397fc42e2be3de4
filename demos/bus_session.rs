//! Drive an emulated hard disk the way a SCSI bus controller would
//!
//! Usage: `cargo run --example bus_session [IMAGE]`
//!
//! Without an image path the disk is backed by a 1 MB in-memory image.

use scsi_hd_target::{
    result_code, BlockStore, HardDisk, MemoryImage, Phase, ScsiDevice, BLOCK_SIZE,
};

/// Run one command through all its phases and return the status byte
fn run_command(
    dev: &mut dyn ScsiDevice,
    cdb: &[u8],
    data_out: &[u8],
    data_in: &mut Vec<u8>,
) -> Result<u8, Box<dyn std::error::Error>> {
    match dev.handle_cmd(cdb)? {
        Phase::StatusOnly => {}
        Phase::DataIn => {
            let n = dev.handle_data_in(data_in)?;
            data_in.truncate(n);
        }
        Phase::DataOut => dev.handle_data_out(data_out)?,
    }
    Ok(dev.handle_status()?)
}

fn session<S: BlockStore + 'static>(disk: HardDisk<S>) -> Result<(), Box<dyn std::error::Error>> {
    let mut dev: Box<dyn ScsiDevice> = Box::new(disk);

    let status = run_command(dev.as_mut(), &[0x00, 0, 0, 0, 0, 0], &[], &mut Vec::new())?;
    println!("TEST UNIT READY (lun 0): status {:#04x}", status);

    let status = run_command(dev.as_mut(), &[0x00, 0x20, 0, 0, 0, 0], &[], &mut Vec::new())?;
    println!("TEST UNIT READY (lun 1): status {:#04x}", status);

    let pattern: Vec<u8> = (0..BLOCK_SIZE).map(|i| (i & 0xFF) as u8).collect();
    let status = run_command(dev.as_mut(), &[0x0A, 0, 0, 1, 1, 0], &pattern, &mut Vec::new())?;
    println!("WRITE(6) lba 1: status {:#04x}", status);

    let mut sense = vec![0u8; 17];
    run_command(dev.as_mut(), &[0x03, 0, 0, 0, 17, 0], &[], &mut sense)?;
    match sense[0] {
        0x80 => println!("REQUEST SENSE: no sense"),
        result_code::WRITE_PROTECTED => println!("REQUEST SENSE: write protected"),
        code => println!("REQUEST SENSE: result {:#04x}", code),
    }

    let mut block = vec![0u8; BLOCK_SIZE];
    let status = run_command(dev.as_mut(), &[0x08, 0, 0, 1, 1, 0], &[], &mut block)?;
    println!(
        "READ(6) lba 1: status {:#04x}, {} bytes, matches write: {}",
        status,
        block.len(),
        block == pattern
    );

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    match std::env::args().nth(1) {
        Some(path) => {
            let disk = HardDisk::open(&path)?;
            println!("Attached {} (writable: {})", path, disk.is_writable());
            session(disk)
        }
        None => {
            println!("Attached 1 MB in-memory image");
            session(HardDisk::new(MemoryImage::new(2048)))
        }
    }
}
