//! Line protocol matching the firmware.

#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};

/// Marker on lines sent from the bridge to the Uno
pub const RGB_MARKER: &str = "<RGB>";

/// Marker on lines sent from the Uno to the bridge
pub const TANK_MARKER: &str = "<TANK>";

/// Length of the tank status characteristic value
pub const STATUS_LEN: usize = 6;

/// Colour channels exposed by the ColorControl service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

/// Build a tank status line as the Uno prints it.
pub fn build_tank_line(tanks: [i32; 3]) -> String {
    format!("{}{},{},{}\n", TANK_MARKER, tanks[0], tanks[1], tanks[2])
}

/// Parse an RGB line received from the bridge (delimiter already removed).
pub fn parse_rgb_line(line: &str) -> Result<[u8; 3]> {
    let body = line
        .trim_end_matches('\r')
        .strip_prefix(RGB_MARKER)
        .ok_or_else(|| anyhow!("Missing {} marker in {:?}", RGB_MARKER, line))?;

    let fields: Vec<&str> = body.split(',').collect();
    if fields.len() != 3 {
        bail!("Expected 3 fields, got {} in {:?}", fields.len(), line);
    }

    let mut rgb = [0u8; 3];
    for (slot, field) in rgb.iter_mut().zip(fields) {
        *slot = field
            .trim()
            .parse()
            .map_err(|e| anyhow!("Bad field {:?}: {}", field, e))?;
    }
    Ok(rgb)
}

/// Value written to a channel characteristic: the decimal text the app sends.
pub fn channel_value(value: i32) -> Vec<u8> {
    value.to_string().into_bytes()
}

/// Parse a tank status notification into its three two-digit hex fields.
pub fn parse_status(payload: &[u8]) -> Result<[u8; 3]> {
    if payload.len() != STATUS_LEN {
        bail!("Expected {} bytes, got {}: {:02x?}", STATUS_LEN, payload.len(), payload);
    }

    let text = std::str::from_utf8(payload)?;
    let mut tanks = [0u8; 3];
    for (i, tank) in tanks.iter_mut().enumerate() {
        *tank = u8::from_str_radix(&text[i * 2..i * 2 + 2], 16)?;
    }
    Ok(tanks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_tank_line() {
        assert_eq!(build_tank_line([1, 0, 1]), "<TANK>1,0,1\n");
    }

    #[test]
    fn test_parse_rgb_line() {
        assert_eq!(parse_rgb_line("<RGB>255,128,0").unwrap(), [255, 128, 0]);
        assert_eq!(parse_rgb_line("<RGB>1,2,3\r").unwrap(), [1, 2, 3]);
        assert!(parse_rgb_line("<TANK>1,2,3").is_err());
        assert!(parse_rgb_line("<RGB>1,2").is_err());
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status(b"010001").unwrap(), [1, 0, 1]);
        assert_eq!(parse_status(b"0A00FF").unwrap(), [10, 0, 255]);
        assert!(parse_status(b"0100").is_err());
    }
}
