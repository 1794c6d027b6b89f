use crate::{
    bcd,
    model::{humidifier_enabled_of, light_mode_of, temperature_mode_of},
    ports::{ButtonPort, Clock},
    types::{Button, Domain},
};

const MODE_SHIFT: u8 = 6;
const HUMIDIFIER_BIT: u8 = 0x80;
const HUMIDITY_STEP: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditLevel {
    Browsing,
    SelectingField,
    AdjustingValue,
}

impl EditLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Browsing => "BROWSING",
            Self::SelectingField => "SELECTING_FIELD",
            Self::AdjustingValue => "ADJUSTING_VALUE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueButton {
    Increment,
    Decrement,
}

/// Edit session for the selected domain. Mutations only touch the working
/// copy; it reaches the store through [`EditState::take_commit`] once the
/// user leaves edit mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditState {
    domain: Domain,
    level: EditLevel,
    working: [u8; 2],
    dirty: bool,
}

impl EditState {
    pub fn new(domain: Domain, working: [u8; 2]) -> Self {
        Self {
            domain,
            level: EditLevel::Browsing,
            working,
            dirty: false,
        }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn level(&self) -> EditLevel {
        self.level
    }

    pub fn working(&self) -> [u8; 2] {
        self.working
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_browsing(&self) -> bool {
        self.level == EditLevel::Browsing
    }

    pub fn select(&mut self, domain: Domain, working: [u8; 2]) {
        *self = Self::new(domain, working);
    }

    pub fn refresh(&mut self, working: [u8; 2]) -> bool {
        if self.is_browsing() && !self.dirty {
            self.working = working;
            true
        } else {
            false
        }
    }

    /// Field button: temperature and humidity cycle through both edit levels,
    /// lighting only toggles in and out of its single field.
    pub fn advance_field(&mut self) -> EditLevel {
        self.level = match (self.domain, self.level) {
            (Domain::Lighting, EditLevel::Browsing) => EditLevel::SelectingField,
            (Domain::Lighting, _) => EditLevel::Browsing,
            (_, EditLevel::Browsing) => EditLevel::SelectingField,
            (_, EditLevel::SelectingField) => EditLevel::AdjustingValue,
            (_, EditLevel::AdjustingValue) => EditLevel::Browsing,
        };
        self.level
    }

    pub fn adjust(&mut self, button: ValueButton) -> bool {
        if self.is_browsing() {
            return false;
        }

        self.working = match self.domain {
            Domain::Temperature => adjust_temperature(self.working, self.level, button),
            Domain::Humidity => adjust_humidity(self.working, self.level, button),
            Domain::Lighting => {
                let next = light_mode_of(self.working[0]).next();
                [next.bits() << MODE_SHIFT, self.working[1]]
            }
        };
        self.dirty = true;
        true
    }

    pub fn take_commit(&mut self) -> Option<(Domain, [u8; 2])> {
        if self.is_browsing() && self.dirty {
            self.dirty = false;
            Some((self.domain, self.working))
        } else {
            None
        }
    }
}

fn adjust_temperature(working: [u8; 2], level: EditLevel, button: ValueButton) -> [u8; 2] {
    let (mut high, mut low) = bcd::digits(working[0]);
    let mut mode = temperature_mode_of(working[1]);

    if level == EditLevel::SelectingField {
        mode = mode.next();
    } else {
        match button {
            ValueButton::Increment => {
                low = low.wrapping_add(1);
                if low > 9 {
                    low = 0;
                    high = high.wrapping_add(1);
                }
                // Past 90 wraps to 60.
                if high == 9 && low > 0 {
                    high = 6;
                    low = 0;
                }
            }
            ValueButton::Decrement => {
                low = low.wrapping_sub(1);
                if low > 9 {
                    low = 9;
                    high = high.wrapping_sub(1);
                }
                // Anything in the 50s wraps to 90.
                if high == 5 {
                    high = 9;
                    low = 0;
                }
            }
        }
    }

    [bcd::from_digits(high, low), mode.bits() << MODE_SHIFT]
}

fn adjust_humidity(working: [u8; 2], level: EditLevel, button: ValueButton) -> [u8; 2] {
    let (mut high, mut low) = bcd::digits(working[0]);
    let mut enabled = humidifier_enabled_of(working[1]);

    if level == EditLevel::SelectingField {
        enabled = !enabled;
    } else {
        match button {
            ValueButton::Increment => {
                low = low.wrapping_add(HUMIDITY_STEP);
                if low > 9 {
                    low = 0;
                    high = high.wrapping_add(1);
                }
                if high == 10 {
                    high = 0;
                }
            }
            ValueButton::Decrement => {
                low = low.wrapping_sub(HUMIDITY_STEP);
                if low > 9 {
                    low = 5;
                    high = high.wrapping_sub(1);
                }
                if high > 9 {
                    high = 9;
                }
            }
        }
    }

    let settings = if enabled { HUMIDIFIER_BIT } else { 0 };
    [bcd::from_digits(high, low), settings]
}

/// Samples `button` and, if it is down, waits for release before reporting a
/// single press. The wait gives up after `release_timeout_ms` so a stuck
/// contact cannot stall the loop.
pub fn debounced_press<B, C>(buttons: &mut B, clock: &mut C, button: Button, release_timeout_ms: u64) -> bool
where
    B: ButtonPort,
    C: Clock,
{
    if !buttons.is_pressed(button) {
        return false;
    }

    let start = clock.now_ms();
    while buttons.is_pressed(button) {
        if clock.elapsed_since(start) >= release_timeout_ms {
            break;
        }
        clock.delay_ms(1);
    }
    true
}
