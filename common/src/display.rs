use crate::{
    bcd,
    edit::EditLevel,
    model::{humidifier_enabled_of, light_mode_of, temperature_mode_of},
    ports::DisplayPort,
    types::{Domain, LightMode, SensedValues, TemperatureMode},
};

pub const LINE_WIDTH: usize = 24;

/// Square wave driving the blink of the field being edited. The field is
/// hidden for the first half of every period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlinkClock {
    period: u8,
    counter: u8,
    visible: bool,
}

impl BlinkClock {
    pub fn new(period: u8) -> Self {
        let period = period.max(2);
        Self {
            period,
            counter: period,
            visible: false,
        }
    }

    pub fn tick(&mut self) {
        self.counter -= 1;
        if self.counter == 0 {
            self.counter = self.period;
            self.visible = false;
        } else if self.counter == self.period / 2 {
            self.visible = true;
        }
    }

    pub fn visible(&self) -> bool {
        self.visible
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScreenView {
    pub domain: Domain,
    pub level: EditLevel,
    pub working: [u8; 2],
    pub sensed: SensedValues,
    pub blink_visible: bool,
}

pub type Screen = [String; 2];

pub fn temperature_mode_label(mode: TemperatureMode) -> &'static str {
    match mode {
        TemperatureMode::Auto => "Auto",
        TemperatureMode::Fan => " Fan",
        TemperatureMode::Heat => " Hot",
        TemperatureMode::Cool => "Cold",
    }
}

pub fn humidifier_label(enabled: bool) -> &'static str {
    if enabled {
        " On"
    } else {
        "Off"
    }
}

pub fn light_mode_label(mode: LightMode) -> &'static str {
    match mode {
        LightMode::Auto => "Auto",
        LightMode::Off => " Off",
        LightMode::On => " On ",
    }
}

pub fn render(view: &ScreenView) -> Screen {
    let hide_field = !view.blink_visible && view.level == EditLevel::SelectingField;
    let hide_value = !view.blink_visible && view.level == EditLevel::AdjustingValue;

    match view.domain {
        Domain::Temperature => {
            let mode = blank_if(
                temperature_mode_label(temperature_mode_of(view.working[1])),
                hide_field,
            );
            [
                line(&format!("T        Type: {mode}")),
                line(&format!(
                    "   Actual/Set: {:02}/{} F",
                    view.sensed.temperature,
                    setpoint_digits(view.working[0], hide_value)
                )),
            ]
        }
        Domain::Humidity => {
            let state = blank_if(
                humidifier_label(humidifier_enabled_of(view.working[1])),
                hide_field,
            );
            [
                line(&format!("H     Humidifier: {state}")),
                line(&format!(
                    " Hum Actual/Set: {:02}/{}%",
                    view.sensed.humidity,
                    setpoint_digits(view.working[0], hide_value)
                )),
            ]
        }
        Domain::Lighting => {
            let mode = blank_if(light_mode_label(light_mode_of(view.working[0])), hide_field);
            [line("L"), line(&format!("    Lighting: {mode}"))]
        }
    }
}

pub fn render_corruption(address: u16) -> Screen {
    [
        line("Data corruption during"),
        line(&format!("read! addr: 0x{address:X}")),
    ]
}

pub fn show<D: DisplayPort>(display: &mut D, screen: &Screen) {
    for (row, text) in screen.iter().enumerate() {
        display.write_line(row, text);
    }
}

fn setpoint_digits(byte: u8, hidden: bool) -> String {
    if hidden {
        return "  ".to_string();
    }
    let (high, low) = bcd::digits(byte);
    [high, low].into_iter().map(digit_char).collect()
}

fn digit_char(digit: u8) -> char {
    char::from_digit(u32::from(digit), 10).unwrap_or('?')
}

fn blank_if(text: &'static str, hidden: bool) -> String {
    if hidden {
        " ".repeat(text.len())
    } else {
        text.to_string()
    }
}

fn line(text: &str) -> String {
    let mut padded: String = text.chars().take(LINE_WIDTH).collect();
    while padded.len() < LINE_WIDTH {
        padded.push(' ');
    }
    padded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{encode_humidity, encode_lighting, encode_temperature};
    use pretty_assertions::assert_eq;

    fn view(domain: Domain, working: [u8; 2]) -> ScreenView {
        ScreenView {
            domain,
            level: EditLevel::Browsing,
            working,
            sensed: SensedValues {
                temperature: 71,
                humidity: 38,
            },
            blink_visible: false,
        }
    }

    #[test]
    fn renders_temperature_screen() {
        let screen = render(&view(
            Domain::Temperature,
            encode_temperature(75, TemperatureMode::Cool),
        ));

        assert_eq!(screen[0].trim_end(), "T        Type: Cold");
        assert_eq!(screen[1].trim_end(), "   Actual/Set: 71/75 F");
        assert!(screen.iter().all(|row| row.len() == LINE_WIDTH));
    }

    #[test]
    fn renders_humidity_and_lighting_screens() {
        let humidity = render(&view(Domain::Humidity, encode_humidity(45, true)));
        assert_eq!(humidity[0].trim_end(), "H     Humidifier:  On");
        assert_eq!(humidity[1].trim_end(), " Hum Actual/Set: 38/45%");

        let lighting = render(&view(Domain::Lighting, encode_lighting(LightMode::Auto)));
        assert_eq!(lighting[0].trim_end(), "L");
        assert_eq!(lighting[1].trim_end(), "    Lighting: Auto");
    }

    #[test]
    fn edited_field_blinks() {
        let mut hidden = view(Domain::Temperature, encode_temperature(75, TemperatureMode::Auto));
        hidden.level = EditLevel::AdjustingValue;
        assert_eq!(render(&hidden)[1].trim_end(), "   Actual/Set: 71/   F");
        assert_eq!(render(&hidden)[0].trim_end(), "T        Type: Auto");

        hidden.blink_visible = true;
        assert_eq!(render(&hidden)[1].trim_end(), "   Actual/Set: 71/75 F");

        hidden.level = EditLevel::SelectingField;
        hidden.blink_visible = false;
        assert_eq!(render(&hidden)[0].trim_end(), "T        Type:");
    }

    #[test]
    fn corrupt_digits_are_marked() {
        let screen = render(&view(Domain::Temperature, [0x7C, 0x00]));
        assert_eq!(screen[1].trim_end(), "   Actual/Set: 71/7? F");
    }

    #[test]
    fn corruption_notice_names_the_address() {
        let screen = render_corruption(0x20);
        assert_eq!(screen[0].trim_end(), "Data corruption during");
        assert_eq!(screen[1].trim_end(), "read! addr: 0x20");
    }

    #[test]
    fn blink_is_half_hidden_half_visible() {
        let mut blink = BlinkClock::new(4);
        let mut phases = Vec::new();
        for _ in 0..8 {
            blink.tick();
            phases.push(blink.visible());
        }
        assert_eq!(
            phases,
            vec![false, true, true, false, false, true, true, false]
        );
    }
}
