use crate::types::{Button, Peer};

pub trait ByteStore {
    fn read(&self, address: u16) -> u8;

    fn write(&mut self, address: u16, value: u8);

    /// Writes only when the stored byte differs, to limit cell wear.
    fn update(&mut self, address: u16, value: u8) {
        if self.read(address) != value {
            self.write(address, value);
        }
    }
}

pub trait Clock {
    fn now_ms(&self) -> u64;

    fn delay_ms(&mut self, ms: u64);

    fn elapsed_since(&self, start_ms: u64) -> u64 {
        self.now_ms().saturating_sub(start_ms)
    }
}

pub trait SerialMux {
    fn select(&mut self, peer: Peer);

    /// Returns a received byte from the selected peer if one is waiting.
    fn try_read(&mut self) -> Option<u8>;

    fn write(&mut self, byte: u8);
}

pub trait ButtonPort {
    fn is_pressed(&mut self, button: Button) -> bool;
}

pub trait DisplayPort {
    fn write_line(&mut self, row: usize, text: &str);
}
