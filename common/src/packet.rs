//! ```text
//! byte0  bools        7 LightAuto  6 LightOn  5 Cooler  4 Heater
//!                     3 Fan        2 reserved 1 AutoTemp 0 reserved
//! byte1  temperature  7 StatusQuery, 6..0 setpoint
//! byte2  humidity     7 Humidifier,  6..0 setpoint
//! ```

use serde::Serialize;

use crate::{
    model::ControlModel,
    types::{LightMode, TemperatureMode},
};

pub const IMP_MAGIC: [u8; 2] = [0xA9, 0x65];
pub const XBEE_INBOUND_MAGIC: u8 = 0xE3;
pub const XBEE_OUTBOUND_MAGIC: u8 = 0xD4;

/// Byte a peer link yields when nothing arrived in time. Also rejected when it
/// arrives as real payload.
pub const TIMEOUT_BYTE: u8 = 0xFF;

pub const LIGHT_AUTO: u8 = 0x80;
pub const LIGHT_ON: u8 = 0x40;
pub const COOLER_ON: u8 = 0x20;
pub const HEATER_ON: u8 = 0x10;
pub const FAN_ON: u8 = 0x08;
/// Left unused: the sensor board has no consumer for it.
pub const RESERVED_BOOL: u8 = 0x04;
pub const AUTO_TEMP: u8 = 0x02;

pub const STATUS_QUERY: u8 = 0x80;
pub const HUMIDIFIER_ENABLED: u8 = 0x80;
pub const VALUE_MASK: u8 = 0x7F;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WirePacket {
    pub bools: u8,
    pub temperature: u8,
    pub humidity: u8,
}

impl WirePacket {
    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Self {
            bools: bytes[0],
            temperature: bytes[1],
            humidity: bytes[2],
        }
    }

    pub fn to_bytes(self) -> [u8; 3] {
        [self.bools, self.temperature, self.humidity]
    }

    pub fn is_status_query(self) -> bool {
        self.temperature & STATUS_QUERY != 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketFields {
    pub light_auto: bool,
    pub light_on: bool,
    pub cooler_on: bool,
    pub heater_on: bool,
    pub fan_on: bool,
    pub auto_temp: bool,
    pub status_query: bool,
    pub humidifier_enabled: bool,
    pub temperature: u8,
    pub humidity: u8,
}

impl PacketFields {
    /// First set bit wins: AutoTemp, Fan, Heat, then Cool. Cool is also the
    /// result when no mode bit is set.
    pub fn temperature_mode(&self) -> TemperatureMode {
        if self.auto_temp {
            TemperatureMode::Auto
        } else if self.fan_on {
            TemperatureMode::Fan
        } else if self.heater_on {
            TemperatureMode::Heat
        } else {
            TemperatureMode::Cool
        }
    }

    pub fn light_mode(&self) -> LightMode {
        if self.light_on {
            LightMode::On
        } else if self.light_auto {
            LightMode::Auto
        } else {
            LightMode::Off
        }
    }
}

pub fn to_wire(model: &ControlModel) -> WirePacket {
    let mode = model.temperature_mode;
    let mut bools = 0;
    if model.light_mode == LightMode::Auto {
        bools |= LIGHT_AUTO;
    }
    if model.light_mode == LightMode::On {
        bools |= LIGHT_ON;
    }
    if mode == TemperatureMode::Cool {
        bools |= COOLER_ON;
    }
    if mode == TemperatureMode::Heat {
        bools |= HEATER_ON;
    }
    if mode == TemperatureMode::Fan {
        bools |= FAN_ON;
    }
    if mode == TemperatureMode::Auto {
        bools |= AUTO_TEMP;
    }

    let mut humidity = model.humidity_setpoint & VALUE_MASK;
    if model.humidifier_enabled {
        humidity |= HUMIDIFIER_ENABLED;
    }

    WirePacket {
        bools,
        temperature: model.temperature_setpoint & VALUE_MASK,
        humidity,
    }
}

pub fn from_wire(packet: WirePacket) -> PacketFields {
    let bools = packet.bools;
    PacketFields {
        light_auto: bools & LIGHT_AUTO != 0,
        light_on: bools & LIGHT_ON != 0,
        cooler_on: bools & COOLER_ON != 0,
        heater_on: bools & HEATER_ON != 0,
        fan_on: bools & FAN_ON != 0,
        auto_temp: bools & AUTO_TEMP != 0,
        status_query: packet.is_status_query(),
        humidifier_enabled: packet.humidity & HUMIDIFIER_ENABLED != 0,
        temperature: packet.temperature & VALUE_MASK,
        humidity: packet.humidity & VALUE_MASK,
    }
}
