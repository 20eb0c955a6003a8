use crate::CLIError;
use std::str::FromStr;

pub fn is_hex_str(s: &str) -> bool {
    s.len() % 2 == 0 && s.chars().all(|c| c.is_digit(16))
}
pub fn is_128_bit_hex_str_validator(input: String) -> Result<(), String> {
    if input.len() == 32 && is_hex_str(&input) {
        Ok(())
    } else {
        Err(format!("'{}' is not a 128-bit hex string", &input))
    }
}
pub fn is_hex_validator(input: String) -> Result<(), String> {
    if is_hex_str(&input) {
        Ok(())
    } else {
        Err(format!("'{}' is not a hex string", &input))
    }
}
pub fn is_u16_validator(input: String) -> Result<(), String> {
    match parse_u16(&input) {
        Some(_) => Ok(()),
        None => Err(format!("'{}' is not a 16-bit unsigned integer", &input)),
    }
}
/// Decimal, or hex with a `0x` prefix.
pub fn parse_u16(input: &str) -> Option<u16> {
    match input.strip_prefix("0x") {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => u16::from_str(input).ok(),
    }
}
pub fn hex_str_to_bytes<T: Default + AsMut<[u8]>>(s: &str) -> Option<T> {
    let mut out = T::default();
    if s.len() != out.as_mut().len() * 2 || out.as_mut().is_empty() {
        None
    } else {
        hex::decode_to_slice(s, out.as_mut()).ok()?;
        Some(out)
    }
}
pub fn bad_value(message: String) -> CLIError {
    CLIError::Clap(clap::Error::with_description(
        &message,
        clap::ErrorKind::InvalidValue,
    ))
}
