use thiserror::Error;
use tracing::info;

use crate::{ports::ByteStore, types::Domain};

pub const TEMPR_0: u16 = 0x20;
pub const TEMPR_1: u16 = 0x21;
pub const HUMID_0: u16 = 0x22;
pub const HUMID_1: u16 = 0x23;
pub const LIGHT_0: u16 = 0x24;
pub const LIGHT_1: u16 = 0x25;
pub const PACKET_0: u16 = 0x26;
pub const PACKET_1: u16 = 0x27;
pub const PACKET_2: u16 = 0x28;

pub const ERASED: u8 = 0xFF;

pub const STORE_SIZE: usize = 256;

/// First-boot contents: 75 F in Auto, 40 % with the humidifier off, lights in
/// Auto, and an empty cached packet.
pub const DEFAULTS: [(u16, u8); 9] = [
    (TEMPR_0, 0x75),
    (TEMPR_1, 0x00),
    (HUMID_0, 0x40),
    (HUMID_1, 0x00),
    (LIGHT_0, 0x00),
    (LIGHT_1, 0x00),
    (PACKET_0, 0x00),
    (PACKET_1, 0x00),
    (PACKET_2, 0x00),
];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("address 0x{0:X} is outside the store")]
    OutOfRange(u16),
    #[error("store image is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("store image holds {found} bytes, expected {expected}")]
    Size { found: usize, expected: usize },
}

pub fn image_index(address: u16) -> Result<usize, StorageError> {
    let index = usize::from(address);
    if index < STORE_SIZE {
        Ok(index)
    } else {
        Err(StorageError::OutOfRange(address))
    }
}

pub fn erased_image() -> Vec<u8> {
    vec![ERASED; STORE_SIZE]
}

pub fn parse_image(raw: &str) -> Result<Vec<u8>, StorageError> {
    let bytes: Vec<u8> = serde_json::from_str(raw)?;
    if bytes.len() != STORE_SIZE {
        return Err(StorageError::Size {
            found: bytes.len(),
            expected: STORE_SIZE,
        });
    }
    Ok(bytes)
}

pub fn encode_image(bytes: &[u8]) -> Result<String, StorageError> {
    Ok(serde_json::to_string(bytes)?)
}

pub fn record_address(domain: Domain) -> u16 {
    match domain {
        Domain::Temperature => TEMPR_0,
        Domain::Humidity => HUMID_0,
        Domain::Lighting => LIGHT_0,
    }
}

pub fn initialize_defaults<S: ByteStore>(store: &mut S) -> bool {
    if store.read(TEMPR_0) != ERASED {
        return false;
    }

    for (address, value) in DEFAULTS {
        store.write(address, value);
    }
    info!("store was uninitialized, wrote first-boot defaults");
    true
}

pub fn load_record<S: ByteStore>(store: &S, domain: Domain) -> [u8; 2] {
    let base = record_address(domain);
    [store.read(base), store.read(base + 1)]
}

pub fn commit_record<S: ByteStore>(store: &mut S, domain: Domain, bytes: [u8; 2]) {
    let base = record_address(domain);
    store.update(base, bytes[0]);
    store.update(base + 1, bytes[1]);
}

pub fn load_cached_packet<S: ByteStore>(store: &S) -> [u8; 3] {
    [
        store.read(PACKET_0),
        store.read(PACKET_1),
        store.read(PACKET_2),
    ]
}

pub fn cache_packet<S: ByteStore>(store: &mut S, bytes: [u8; 3]) {
    store.update(PACKET_0, bytes[0]);
    store.update(PACKET_1, bytes[1]);
    store.update(PACKET_2, bytes[2]);
}
