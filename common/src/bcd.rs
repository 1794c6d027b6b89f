use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BcdError {
    #[error("byte 0x{byte:02X} is not a valid BCD digit pair")]
    Corrupt { byte: u8 },
}

/// Values above 99 saturate to 99.
pub fn encode(value: u8) -> u8 {
    let value = value.min(99);
    from_digits(value / 10, value % 10)
}

pub fn decode(byte: u8) -> Result<u8, BcdError> {
    let (high, low) = digits(byte);
    if high > 9 || low > 9 {
        return Err(BcdError::Corrupt { byte });
    }
    Ok(high * 10 + low)
}

pub fn is_valid(byte: u8) -> bool {
    decode(byte).is_ok()
}

pub fn digits(byte: u8) -> (u8, u8) {
    (byte >> 4, byte & 0x0F)
}

pub fn from_digits(high: u8, low: u8) -> u8 {
    ((high & 0x0F) << 4) | (low & 0x0F)
}
