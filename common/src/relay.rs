//! Reduced auxiliary relay board reachable from the cloud bridge.
//!
//! It speaks a two-byte exchange: byte0 carries an origin flag in bit 0 and
//! six relay flags in bits 6..1; byte1 is either a status query (bit 7) or a
//! raw Fahrenheit temperature.

use tracing::debug;

use crate::model::{MAX_TEMPERATURE_F, MIN_TEMPERATURE_F};

pub const ORIGIN_REMOTE: u8 = 0x01;
pub const LIGHTS: u8 = 0x40;
pub const LIGHTS_AUTO: u8 = 0x20;
pub const COOLER: u8 = 0x10;
pub const HEATER: u8 = 0x08;
pub const FAN: u8 = 0x04;
pub const AUTO_TEMP: u8 = 0x02;
pub const STATUS_QUERY: u8 = 0x80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxRelay {
    lights_on: bool,
    lights_auto: bool,
    cooler_on: bool,
    heater_on: bool,
    fan_on: bool,
    auto_temp: bool,
    temperature_f: u8,
}

impl Default for AuxRelay {
    fn default() -> Self {
        Self {
            lights_on: true,
            lights_auto: false,
            cooler_on: false,
            heater_on: false,
            fan_on: false,
            auto_temp: false,
            temperature_f: 72,
        }
    }
}

impl AuxRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exchange(&mut self, request: [u8; 2]) -> Option<[u8; 2]> {
        let [flags, value] = request;
        if flags & ORIGIN_REMOTE == 0 {
            return None;
        }

        if value & STATUS_QUERY != 0 {
            return Some(self.status());
        }

        self.lights_on = flags & LIGHTS != 0;
        self.lights_auto = flags & LIGHTS_AUTO != 0;
        self.cooler_on = flags & COOLER != 0;
        self.heater_on = flags & HEATER != 0;
        self.fan_on = flags & FAN != 0;
        self.auto_temp = flags & AUTO_TEMP != 0;
        if (MIN_TEMPERATURE_F..=MAX_TEMPERATURE_F).contains(&value) {
            self.temperature_f = value;
        }
        debug!(relay = ?self, "aux relay updated");
        None
    }

    pub fn status(&self) -> [u8; 2] {
        let mut flags = ORIGIN_REMOTE;
        for (on, bit) in [
            (self.lights_on, LIGHTS),
            (self.lights_auto, LIGHTS_AUTO),
            (self.cooler_on, COOLER),
            (self.heater_on, HEATER),
            (self.fan_on, FAN),
            (self.auto_temp, AUTO_TEMP),
        ] {
            if on {
                flags |= bit;
            }
        }
        [flags, self.temperature_f]
    }

    pub fn lights_output(&self) -> bool {
        self.lights_on
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_reports_power_on_state() {
        let mut relay = AuxRelay::new();
        assert_eq!(
            relay.exchange([ORIGIN_REMOTE, STATUS_QUERY]),
            Some([ORIGIN_REMOTE | LIGHTS, 72])
        );
    }

    #[test]
    fn command_replaces_every_flag() {
        let mut relay = AuxRelay::new();

        assert_eq!(relay.exchange([ORIGIN_REMOTE | COOLER | AUTO_TEMP, 68]), None);

        assert!(!relay.lights_output());
        assert_eq!(relay.status(), [ORIGIN_REMOTE | COOLER | AUTO_TEMP, 68]);
    }

    #[test]
    fn out_of_range_temperature_is_ignored() {
        let mut relay = AuxRelay::new();
        relay.exchange([ORIGIN_REMOTE | LIGHTS, 95]);
        assert_eq!(relay.status()[1], 72);
    }

    #[test]
    fn requests_from_the_sensor_side_are_ignored() {
        let mut relay = AuxRelay::new();
        assert_eq!(relay.exchange([COOLER, STATUS_QUERY]), None);
        assert_eq!(relay.exchange([COOLER, 70]), None);
        assert!(relay.lights_output());
        assert_eq!(relay, AuxRelay::new());
    }
}
