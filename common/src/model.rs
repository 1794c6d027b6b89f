use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::{
    bcd,
    packet::{self, WirePacket},
    ports::ByteStore,
    store::{self, HUMID_0, HUMID_1, LIGHT_0, TEMPR_0, TEMPR_1},
    types::{LightMode, TemperatureMode},
};

pub const MIN_TEMPERATURE_F: u8 = 60;
pub const MAX_TEMPERATURE_F: u8 = 90;
pub const MAX_HUMIDITY: u8 = 99;

const MODE_SHIFT: u8 = 6;
const HUMIDIFIER_BIT: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlModel {
    #[serde(rename = "temperatureMode")]
    pub temperature_mode: TemperatureMode,
    #[serde(rename = "temperatureSetpoint")]
    pub temperature_setpoint: u8,
    #[serde(rename = "humiditySetpoint")]
    pub humidity_setpoint: u8,
    #[serde(rename = "humidifierEnabled")]
    pub humidifier_enabled: bool,
    #[serde(rename = "lightMode")]
    pub light_mode: LightMode,
}

impl Default for ControlModel {
    fn default() -> Self {
        Self {
            temperature_mode: TemperatureMode::Auto,
            temperature_setpoint: 75,
            humidity_setpoint: 40,
            humidifier_enabled: false,
            light_mode: LightMode::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("storage corrupt at 0x{address:02X}: read 0x{byte:02X}")]
pub struct StorageFault {
    pub address: u16,
    pub byte: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivation {
    pub model: ControlModel,
    pub packet: WirePacket,
    pub faults: Vec<StorageFault>,
}

pub fn encode_temperature(setpoint: u8, mode: TemperatureMode) -> [u8; 2] {
    [bcd::encode(setpoint), mode.bits() << MODE_SHIFT]
}

pub fn encode_humidity(setpoint: u8, humidifier_enabled: bool) -> [u8; 2] {
    let settings = if humidifier_enabled { HUMIDIFIER_BIT } else { 0 };
    [bcd::encode(setpoint), settings]
}

pub fn encode_lighting(mode: LightMode) -> [u8; 2] {
    [mode.bits() << MODE_SHIFT, 0]
}

pub fn temperature_mode_of(settings: u8) -> TemperatureMode {
    TemperatureMode::from_bits(settings >> MODE_SHIFT)
}

pub fn humidifier_enabled_of(settings: u8) -> bool {
    settings & HUMIDIFIER_BIT != 0
}

pub fn light_mode_of(settings: u8) -> LightMode {
    LightMode::from_bits(settings >> MODE_SHIFT)
}

/// A value byte that is not valid BCD is reported as a fault and the
/// corresponding setpoint keeps its value from `last_known`.
pub fn derive_from_store<S: ByteStore>(store: &mut S, last_known: &ControlModel) -> Derivation {
    let mut faults = Vec::new();

    let temperature_setpoint = decode_value(store, TEMPR_0, &mut faults)
        .unwrap_or(last_known.temperature_setpoint);
    let humidity_setpoint =
        decode_value(store, HUMID_0, &mut faults).unwrap_or(last_known.humidity_setpoint);

    let model = ControlModel {
        temperature_mode: temperature_mode_of(store.read(TEMPR_1)),
        temperature_setpoint,
        humidity_setpoint,
        humidifier_enabled: humidifier_enabled_of(store.read(HUMID_1)),
        light_mode: light_mode_of(store.read(LIGHT_0)),
    };

    let packet = packet::to_wire(&model);
    store::cache_packet(store, packet.to_bytes());

    Derivation {
        model,
        packet,
        faults,
    }
}

pub fn apply_incoming_packet<S: ByteStore>(store: &mut S, incoming: WirePacket) -> ControlModel {
    let fields = packet::from_wire(incoming);

    let model = ControlModel {
        temperature_mode: fields.temperature_mode(),
        temperature_setpoint: fields
            .temperature
            .clamp(MIN_TEMPERATURE_F, MAX_TEMPERATURE_F),
        humidity_setpoint: fields.humidity.min(MAX_HUMIDITY),
        humidifier_enabled: fields.humidifier_enabled,
        light_mode: fields.light_mode(),
    };

    let temperature = encode_temperature(model.temperature_setpoint, model.temperature_mode);
    let humidity = encode_humidity(model.humidity_setpoint, model.humidifier_enabled);
    let lighting = encode_lighting(model.light_mode);

    store.update(TEMPR_0, temperature[0]);
    store.update(TEMPR_1, temperature[1]);
    store.update(HUMID_0, humidity[0]);
    store.update(HUMID_1, humidity[1]);
    store.update(LIGHT_0, lighting[0]);

    debug!(?model, "applied incoming packet to records");
    model
}

fn decode_value<S: ByteStore>(
    store: &S,
    address: u16,
    faults: &mut Vec<StorageFault>,
) -> Option<u8> {
    let byte = store.read(address);
    match bcd::decode(byte) {
        Ok(value) => Some(value),
        Err(_) => {
            faults.push(StorageFault { address, byte });
            None
        }
    }
}
