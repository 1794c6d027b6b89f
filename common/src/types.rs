use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Domain {
    Temperature,
    Humidity,
    Lighting,
}

impl Domain {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Temperature => "TEMPERATURE",
            Self::Humidity => "HUMIDITY",
            Self::Lighting => "LIGHTING",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Temperature => Self::Humidity,
            Self::Humidity => Self::Lighting,
            Self::Lighting => Self::Temperature,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TemperatureMode {
    Auto,
    Fan,
    Heat,
    Cool,
}

impl TemperatureMode {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Auto,
            1 => Self::Fan,
            2 => Self::Heat,
            _ => Self::Cool,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Self::Auto => 0,
            Self::Fan => 1,
            Self::Heat => 2,
            Self::Cool => 3,
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Auto => Self::Fan,
            Self::Fan => Self::Heat,
            Self::Heat => Self::Cool,
            Self::Cool => Self::Auto,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::Fan => "FAN",
            Self::Heat => "HEAT",
            Self::Cool => "COOL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LightMode {
    Auto,
    Off,
    On,
}

impl LightMode {
    /// The unused fourth encoding is read back as `Off`: neither light bit is
    /// set for it on the wire.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Auto,
            2 => Self::On,
            _ => Self::Off,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Self::Auto => 0,
            Self::Off => 1,
            Self::On => 2,
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Off => Self::On,
            Self::On => Self::Auto,
            Self::Auto => Self::Off,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::Off => "OFF",
            Self::On => "ON",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Mode,
    Field,
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Peer {
    Imp,
    Xbee,
}

impl Peer {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Imp => "imp",
            Self::Xbee => "xbee",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SensedValues {
    pub temperature: u8,
    pub humidity: u8,
}
