//! `0x`-prefixed hex quantities as used by Ethereum JSON-RPC.

use ethers::types::U256;

use crate::error::{IngestError, Result};

pub fn encode(n: u64) -> String {
    format!("{:#x}", n)
}

pub fn decode(s: &str) -> Result<u64> {
    let digits = hex_digits(s)?;
    u64::from_str_radix(digits, 16).map_err(|_| IngestError::MalformedHex(s.to_string()))
}

/// Decodes a full 256-bit quantity such as `value` or `gasPrice`.
pub fn decode_u256(s: &str) -> Result<U256> {
    let digits = hex_digits(s)?;
    U256::from_str_radix(digits, 16).map_err(|_| IngestError::MalformedHex(s.to_string()))
}

pub fn decode_u32(s: &str) -> Result<u32> {
    let n = decode(s)?;
    u32::try_from(n).map_err(|_| IngestError::MalformedHex(s.to_string()))
}

fn hex_digits(s: &str) -> Result<&str> {
    match s.strip_prefix("0x") {
        Some(digits) if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit()) => {
            Ok(digits)
        }
        _ => Err(IngestError::MalformedHex(s.to_string())),
    }
}
