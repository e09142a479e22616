//! 32-bit ARGB colors and the KML `AABBGGRR` wire encoding.
//!
//! Colors are stored in the engine's native ARGB order. KML writes the same
//! four channels as eight hex digits in alpha, blue, green, red order, so
//! every value crossing the KML boundary goes through [`Argb::from_kml_hex`]
//! or [`Argb::to_kml_hex`].

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A color packed as `0xAARRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Argb(pub u32);

/// Color given to lands whose KML style carries no fill color.
pub const DEFAULT_LAND_COLOR: Argb = Argb(0xFF2E_7D32);

impl Argb {
    pub const fn from_channels(alpha: u8, red: u8, green: u8, blue: u8) -> Self {
        Self((alpha as u32) << 24 | (red as u32) << 16 | (green as u32) << 8 | blue as u32)
    }

    pub const fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn blue(self) -> u8 {
        self.0 as u8
    }

    /// The same color with the alpha channel forced to `0xFF`.
    pub const fn opaque(self) -> Self {
        Self(self.0 | 0xFF00_0000)
    }

    /// Parse a KML color (`AABBGGRR`, case-insensitive, optional leading `#`).
    pub fn from_kml_hex(value: &str) -> Result<Self, CoreError> {
        let raw = parse_hex8(value)?;
        let [alpha, blue, green, red] = raw.to_be_bytes();
        Ok(Self::from_channels(alpha, red, green, blue))
    }

    /// Render as a lowercase KML color string (`AABBGGRR`).
    pub fn to_kml_hex(self) -> String {
        format!(
            "{:02x}{:02x}{:02x}{:02x}",
            self.alpha(),
            self.blue(),
            self.green(),
            self.red()
        )
    }

    /// Parse an ARGB hex string (`AARRGGBB`, optional leading `#`).
    pub fn from_hex(value: &str) -> Result<Self, CoreError> {
        parse_hex8(value).map(Self)
    }

    /// Render as an uppercase ARGB hex string (`AARRGGBB`).
    pub fn to_hex(self) -> String {
        format!("{:08X}", self.0)
    }
}

impl Default for Argb {
    fn default() -> Self {
        DEFAULT_LAND_COLOR
    }
}

impl std::fmt::Display for Argb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

fn parse_hex8(value: &str) -> Result<u32, CoreError> {
    let hex = value.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if hex.len() != 8 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CoreError::Validation(format!(
            "Invalid color '{value}'. Must be 8 hex digits"
        )));
    }
    u32::from_str_radix(hex, 16)
        .map_err(|e| CoreError::Validation(format!("Invalid color '{value}': {e}")))
}
