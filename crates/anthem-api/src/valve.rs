//! Valve command codec.
//!
//! Every valve is driven by a 4-byte command word, sent as 8 uppercase hex
//! characters:
//!
//! ```text
//! [valve prefix][temperature][flow][mode]
//!      0x01          0x26     0x64   0x01     => "01266401"
//! ```
//!
//! Two generations of the protocol disagree on how temperature and flow are
//! packed into their bytes, so the packing is a [`CommandEncoding`] chosen
//! once per session:
//!
//! | encoding | temperature byte            | flow byte      |
//! |----------|----------------------------------|--------------------|
//! | `Legacy` | whole degrees Celsius, truncated | percent, truncated |
//! | `Scaled` | `(°C - 25.6) * 10`, clamped      | `percent * 2`      |
//!
//! Encoding validates its inputs; decoding is total over well-formed hex and
//! reports bytes it does not recognise as [`Coded::Unknown`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::Error;

// ── Domain limits and defaults ──────────────────────────────────────

pub const TEMPERATURE_MIN_C: f64 = 15.0;
pub const TEMPERATURE_MAX_C: f64 = 49.0;
pub const FLOW_MIN_PERCENT: f64 = 0.0;
pub const FLOW_MAX_PERCENT: f64 = 100.0;

/// Temperature used when the caller does not pick one.
pub const DEFAULT_TEMPERATURE_C: f64 = 37.7;
/// Flow used when the caller does not pick one.
pub const DEFAULT_FLOW_PERCENT: f64 = 100.0;

/// Settings carried by a pause command when none are supplied.
pub const PAUSE_TEMPERATURE_C: f64 = 38.0;
pub const PAUSE_FLOW_PERCENT: f64 = 50.0;

/// Offset of the scaled temperature byte, in degrees Celsius.
const SCALED_TEMPERATURE_OFFSET_C: f64 = 25.6;

// ── Valve prefix ────────────────────────────────────────────────────

/// Which physical valve a command word addresses.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ValvePrefix {
    Primary,
    Secondary1,
    Secondary2,
    Secondary3,
    Secondary4,
    Secondary5,
    Secondary6,
    Secondary7,
}

impl ValvePrefix {
    pub const ALL: [Self; 8] = [
        Self::Primary,
        Self::Secondary1,
        Self::Secondary2,
        Self::Secondary3,
        Self::Secondary4,
        Self::Secondary5,
        Self::Secondary6,
        Self::Secondary7,
    ];

    pub fn byte(self) -> u8 {
        match self {
            Self::Primary => 0x01,
            Self::Secondary1 => 0x11,
            Self::Secondary2 => 0x21,
            Self::Secondary3 => 0x31,
            Self::Secondary4 => 0x41,
            Self::Secondary5 => 0x51,
            Self::Secondary6 => 0x61,
            Self::Secondary7 => 0x71,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.byte() == byte)
    }

    /// Key of this valve inside the `gcsValveControlModel` request object.
    pub fn wire_key(self) -> &'static str {
        match self {
            Self::Primary => "primaryValve1",
            Self::Secondary1 => "secondaryValve1",
            Self::Secondary2 => "secondaryValve2",
            Self::Secondary3 => "secondaryValve3",
            Self::Secondary4 => "secondaryValve4",
            Self::Secondary5 => "secondaryValve5",
            Self::Secondary6 => "secondaryValve6",
            Self::Secondary7 => "secondaryValve7",
        }
    }
}

// ── Valve mode ──────────────────────────────────────────────────────

/// Outlet state byte.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ValveMode {
    Off,
    Shower,
    TubFiller,
    TubHandheld,
    /// Water stops but the shower session stays open.
    Stop,
}

impl ValveMode {
    pub fn byte(self) -> u8 {
        match self {
            Self::Off => 0x00,
            Self::Shower => 0x01,
            Self::TubFiller => 0x02,
            Self::TubHandheld => 0x03,
            Self::Stop => 0x40,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        [
            Self::Off,
            Self::Shower,
            Self::TubFiller,
            Self::TubHandheld,
            Self::Stop,
        ]
        .into_iter()
        .find(|m| m.byte() == byte)
    }
}

// ── Outlet ──────────────────────────────────────────────────────────

/// Logical water exit, as a user thinks about it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Outlet {
    Showerhead,
    TubFiller,
    Handshower,
    TubHandheld,
}

impl Outlet {
    /// Mode byte that opens this outlet. Showerhead and handshower share one.
    pub fn mode(self) -> ValveMode {
        match self {
            Self::Showerhead | Self::Handshower => ValveMode::Shower,
            Self::TubFiller => ValveMode::TubFiller,
            Self::TubHandheld => ValveMode::TubHandheld,
        }
    }
}

// ── Coded ───────────────────────────────────────────────────────────

/// A decoded byte that may or may not match a known enumeration member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coded<T> {
    Known(T),
    Unknown(u8),
}

impl<T: Copy> Coded<T> {
    pub fn known(&self) -> Option<T> {
        match self {
            Self::Known(v) => Some(*v),
            Self::Unknown(_) => None,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Coded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(v) => v.fmt(f),
            Self::Unknown(b) => write!(f, "0x{b:02X}"),
        }
    }
}

impl<T: Serialize> Serialize for Coded<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Known(v) => v.serialize(serializer),
            Self::Unknown(b) => serializer.collect_str(&format_args!("0x{b:02X}")),
        }
    }
}

// ── Command word ────────────────────────────────────────────────────

/// Four raw bytes: prefix, temperature, flow, mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CommandWord([u8; 4]);

impl CommandWord {
    /// All-zero word; closes the valve.
    pub const OFF: Self = Self([0; 4]);

    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 4] {
        self.0
    }

    pub fn is_off(&self) -> bool {
        *self == Self::OFF
    }
}

impl fmt::Display for CommandWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{a:02X}{b:02X}{c:02X}{d:02X}")
    }
}

impl FromStr for CommandWord {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 8 {
            return Err(Error::Validation {
                field: "command word",
                message: format!("expected 8 hex characters, got {}", s.chars().count()),
            });
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::Validation {
                field: "command word",
                message: format!("'{s}' contains non-hex characters"),
            });
        }

        let mut bytes = [0u8; 4];
        for (slot, chunk) in bytes.iter_mut().zip(s.as_bytes().chunks(2)) {
            let pair = std::str::from_utf8(chunk).map_err(|e| Error::Validation {
                field: "command word",
                message: e.to_string(),
            })?;
            *slot = u8::from_str_radix(pair, 16).map_err(|e| Error::Validation {
                field: "command word",
                message: format!("'{s}': {e}"),
            })?;
        }
        Ok(Self(bytes))
    }
}

impl Serialize for CommandWord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ── Decoded command ─────────────────────────────────────────────────

/// Human-level view of a command word.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DecodedCommand {
    pub valve: Coded<ValvePrefix>,
    pub temperature_celsius: f64,
    pub flow_percent: f64,
    pub mode: Coded<ValveMode>,
}

// ── Encoding strategy ───────────────────────────────────────────────

/// How temperature and flow are packed into their bytes.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum CommandEncoding {
    /// Whole degrees Celsius and whole percent.
    #[default]
    Legacy,
    /// Tenths of a degree above 25.6 °C and half-percent steps.
    Scaled,
}

impl CommandEncoding {
    /// Encode a command, rejecting temperature or flow outside the valve's range.
    pub fn encode(
        self,
        temperature_celsius: f64,
        flow_percent: f64,
        mode: ValveMode,
        valve: ValvePrefix,
    ) -> Result<CommandWord, Error> {
        check_range(
            "temperature",
            temperature_celsius,
            TEMPERATURE_MIN_C,
            TEMPERATURE_MAX_C,
            "°C",
        )?;
        check_range(
            "flow",
            flow_percent,
            FLOW_MIN_PERCENT,
            FLOW_MAX_PERCENT,
            "%",
        )?;

        Ok(CommandWord([
            valve.byte(),
            self.temperature_byte(temperature_celsius),
            self.flow_byte(flow_percent),
            mode.byte(),
        ]))
    }

    /// Command that opens `outlet` at the given settings.
    pub fn outlet(
        self,
        outlet: Outlet,
        temperature_celsius: f64,
        flow_percent: f64,
        valve: ValvePrefix,
    ) -> Result<CommandWord, Error> {
        self.encode(temperature_celsius, flow_percent, outlet.mode(), valve)
    }

    /// Stop water on `valve` while keeping its session and settings.
    pub fn pause(
        self,
        temperature_celsius: f64,
        flow_percent: f64,
        valve: ValvePrefix,
    ) -> Result<CommandWord, Error> {
        self.encode(temperature_celsius, flow_percent, ValveMode::Stop, valve)
    }

    pub fn decode(self, word: CommandWord) -> DecodedCommand {
        let [prefix, temperature, flow, mode] = word.bytes();
        DecodedCommand {
            valve: ValvePrefix::from_byte(prefix).map_or(Coded::Unknown(prefix), Coded::Known),
            temperature_celsius: self.temperature_from_byte(temperature),
            flow_percent: self.flow_from_byte(flow),
            mode: ValveMode::from_byte(mode).map_or(Coded::Unknown(mode), Coded::Known),
        }
    }

    /// Parse and decode an 8-character hex word.
    pub fn decode_hex(self, hex: &str) -> Result<DecodedCommand, Error> {
        Ok(self.decode(hex.parse()?))
    }

    fn temperature_byte(self, celsius: f64) -> u8 {
        match self {
            Self::Legacy => truncate(celsius),
            Self::Scaled => saturate((celsius - SCALED_TEMPERATURE_OFFSET_C) * 10.0),
        }
    }

    fn flow_byte(self, percent: f64) -> u8 {
        match self {
            Self::Legacy => truncate(percent),
            Self::Scaled => saturate(percent * 2.0),
        }
    }

    fn temperature_from_byte(self, byte: u8) -> f64 {
        match self {
            Self::Legacy => f64::from(byte),
            Self::Scaled => f64::from(byte) / 10.0 + SCALED_TEMPERATURE_OFFSET_C,
        }
    }

    fn flow_from_byte(self, byte: u8) -> f64 {
        match self {
            Self::Legacy => f64::from(byte),
            Self::Scaled => f64::from(byte) / 2.0,
        }
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64, unit: &str) -> Result<(), Error> {
    if value < min {
        return Err(Error::Validation {
            field,
            message: format!("{value} is below the minimum of {min}{unit}"),
        });
    }
    if value > max {
        return Err(Error::Validation {
            field,
            message: format!("{value} is above the maximum of {max}{unit}"),
        });
    }
    if value.is_nan() {
        return Err(Error::Validation {
            field,
            message: "value is not a number".into(),
        });
    }
    Ok(())
}

/// Round to the nearest integer and clamp into a byte.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
fn saturate(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Drop the fractional part and clamp into a byte.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
fn truncate(value: f64) -> u8 {
    value.trunc().clamp(0.0, 255.0) as u8
}

// ── Valve control payload ───────────────────────────────────────────

/// One command word per valve, serialized with every valve key present.
///
/// Valves that were never set are sent as [`CommandWord::OFF`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValveControl {
    words: BTreeMap<ValvePrefix, CommandWord>,
}

impl ValveControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Control a single valve; all others are sent as off.
    pub fn single(valve: ValvePrefix, word: CommandWord) -> Self {
        Self::new().with(valve, word)
    }

    pub fn with(mut self, valve: ValvePrefix, word: CommandWord) -> Self {
        self.words.insert(valve, word);
        self
    }

    pub fn get(&self, valve: ValvePrefix) -> CommandWord {
        self.words.get(&valve).copied().unwrap_or(CommandWord::OFF)
    }
}

impl Serialize for ValveControl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(ValvePrefix::ALL.len()))?;
        for valve in ValvePrefix::ALL {
            map.serialize_entry(valve.wire_key(), &self.get(valve))?;
        }
        map.end()
    }
}
