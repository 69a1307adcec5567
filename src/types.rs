use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

/// Temperature stored as Celsius internally.
/// The Airstage API carries temperatures as tenths of a degree Celsius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temperature(f64);

impl Temperature {
    pub fn from_celsius(c: f64) -> Self {
        Self(c)
    }

    pub fn from_fahrenheit(f: f64) -> Self {
        Self((f - 32.0) * (5.0 / 9.0))
    }

    pub fn from_scale(value: f64, scale: TemperatureScale) -> Self {
        match scale {
            TemperatureScale::Celsius => Self::from_celsius(value),
            TemperatureScale::Fahrenheit => Self::from_fahrenheit(value),
        }
    }

    /// Parse a vendor tenths-of-a-degree code such as `"225"`.
    pub fn from_vendor_code(code: &str) -> Option<Self> {
        let tenths: f64 = code.trim().parse().ok()?;
        tenths.is_finite().then(|| Self(tenths / 10.0))
    }

    pub fn celsius(&self) -> f64 {
        self.0
    }

    pub fn fahrenheit(&self) -> f64 {
        self.0 * (9.0 / 5.0) + 32.0
    }

    pub fn in_scale(&self, scale: TemperatureScale) -> f64 {
        match scale {
            TemperatureScale::Celsius => self.celsius(),
            TemperatureScale::Fahrenheit => self.fahrenheit(),
        }
    }

    pub fn to_vendor_code(&self) -> String {
        ((self.0 * 10.0).round() as i64).to_string()
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}\u{00b0}C", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureScale {
    Celsius,
    Fahrenheit,
}

impl TemperatureScale {
    pub fn as_vendor_str(&self) -> &'static str {
        match self {
            TemperatureScale::Celsius => "C",
            TemperatureScale::Fahrenheit => "F",
        }
    }

    pub fn from_vendor_str(s: &str) -> Option<Self> {
        match s {
            "C" => Some(TemperatureScale::Celsius),
            "F" => Some(TemperatureScale::Fahrenheit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub const ALL: [Toggle; 2] = [Toggle::On, Toggle::Off];

    pub fn as_vendor_code(&self) -> &'static str {
        match self {
            Toggle::On => "1",
            Toggle::Off => "0",
        }
    }

    pub fn from_vendor_code(s: &str) -> Option<Self> {
        match s {
            "1" => Some(Toggle::On),
            "0" => Some(Toggle::Off),
            _ => None,
        }
    }

    pub fn is_on(&self) -> bool {
        matches!(self, Toggle::On)
    }
}

impl From<bool> for Toggle {
    fn from(on: bool) -> Self {
        if on { Toggle::On } else { Toggle::Off }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    Auto,
    Cool,
    Dry,
    Fan,
    Heat,
}

impl OperationMode {
    pub const ALL: [OperationMode; 5] = [
        OperationMode::Auto,
        OperationMode::Cool,
        OperationMode::Dry,
        OperationMode::Fan,
        OperationMode::Heat,
    ];

    pub fn as_vendor_code(&self) -> &'static str {
        match self {
            OperationMode::Auto => "0",
            OperationMode::Cool => "1",
            OperationMode::Dry => "2",
            OperationMode::Fan => "3",
            OperationMode::Heat => "4",
        }
    }

    pub fn from_vendor_code(s: &str) -> Option<Self> {
        match s {
            "0" => Some(OperationMode::Auto),
            "1" => Some(OperationMode::Cool),
            "2" => Some(OperationMode::Dry),
            "3" => Some(OperationMode::Fan),
            "4" => Some(OperationMode::Heat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanSpeed {
    Auto,
    Quiet,
    Low,
    Medium,
    High,
}

impl FanSpeed {
    pub const ALL: [FanSpeed; 5] = [
        FanSpeed::Auto,
        FanSpeed::Quiet,
        FanSpeed::Low,
        FanSpeed::Medium,
        FanSpeed::High,
    ];

    pub fn as_vendor_code(&self) -> &'static str {
        match self {
            FanSpeed::Auto => "0",
            FanSpeed::Quiet => "2",
            FanSpeed::Low => "5",
            FanSpeed::Medium => "8",
            FanSpeed::High => "11",
        }
    }

    pub fn from_vendor_code(s: &str) -> Option<Self> {
        match s {
            "0" => Some(FanSpeed::Auto),
            "2" => Some(FanSpeed::Quiet),
            "5" => Some(FanSpeed::Low),
            "8" => Some(FanSpeed::Medium),
            "11" => Some(FanSpeed::High),
            _ => None,
        }
    }
}

/// Vertical louver position, 1 (top) through 4 (bottom).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VerticalDirection(u8);

impl VerticalDirection {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 4;

    pub fn new(position: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX)
            .contains(&position)
            .then_some(Self(position))
    }

    pub fn position(&self) -> u8 {
        self.0
    }

    pub fn as_vendor_code(&self) -> String {
        self.0.to_string()
    }

    pub fn from_vendor_code(s: &str) -> Option<Self> {
        s.parse().ok().and_then(Self::new)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Online,
    Offline,
}

impl ConnectionStatus {
    pub fn from_vendor_str(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("online") {
            Some(ConnectionStatus::Online)
        } else if s.eq_ignore_ascii_case("offline") {
            Some(ConnectionStatus::Offline)
        } else {
            None
        }
    }
}

/// Last fetched state of one indoor unit. Parameter values are kept as the
/// raw strings the API returned; decoding happens on read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceSnapshot {
    pub device_id: String,
    pub name: Option<String>,
    pub connection_status: Option<String>,
    pub parameters: BTreeMap<String, String>,
}

impl DeviceSnapshot {
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    pub fn connection(&self) -> Option<ConnectionStatus> {
        self.connection_status
            .as_deref()
            .and_then(ConnectionStatus::from_vendor_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProfile {
    pub temperature_scale: Option<TemperatureScale>,
    pub email: Option<String>,
    /// Every attribute of the `user` object as returned by the API.
    pub attributes: Map<String, Value>,
}

/// Events emitted when a device snapshot is replaced by a newer fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    DeviceDiscovered {
        device_id: String,
        name: Option<String>,
    },
    DeviceNameChanged {
        device_id: String,
        name: Option<String>,
    },
    ConnectionStatusChanged {
        device_id: String,
        status: Option<String>,
    },
    ParameterChanged {
        device_id: String,
        name: String,
        old: Option<String>,
        new: Option<String>,
    },
}
