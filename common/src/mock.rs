use std::collections::VecDeque;

use crate::{
    ports::{ButtonPort, ByteStore, Clock, DisplayPort, SerialMux},
    store::{ERASED, STORE_SIZE},
    types::{Button, Peer},
};

#[derive(Debug, Clone)]
pub struct MemoryStore {
    bytes: Vec<u8>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            bytes: vec![ERASED; STORE_SIZE],
            writes: 0,
        }
    }

    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn reset_writes(&mut self) {
        self.writes = 0;
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteStore for MemoryStore {
    fn read(&self, address: u16) -> u8 {
        self.bytes.get(address as usize).copied().unwrap_or(ERASED)
    }

    fn write(&mut self, address: u16, value: u8) {
        if let Some(cell) = self.bytes.get_mut(address as usize) {
            *cell = value;
            self.writes += 1;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeClock {
    now_ms: u64,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, ms: u64) {
        self.now_ms = self.now_ms.saturating_add(ms);
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn delay_ms(&mut self, ms: u64) {
        self.advance(ms);
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockMux {
    selected: Option<Peer>,
    selections: usize,
    imp_rx: VecDeque<u8>,
    xbee_rx: VecDeque<u8>,
    imp_tx: Vec<u8>,
    xbee_tx: Vec<u8>,
}

impl MockMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&mut self, peer: Peer, bytes: &[u8]) {
        match peer {
            Peer::Imp => self.imp_rx.extend(bytes),
            Peer::Xbee => self.xbee_rx.extend(bytes),
        }
    }

    pub fn sent(&self, peer: Peer) -> &[u8] {
        match peer {
            Peer::Imp => &self.imp_tx,
            Peer::Xbee => &self.xbee_tx,
        }
    }

    pub fn pending(&self, peer: Peer) -> usize {
        match peer {
            Peer::Imp => self.imp_rx.len(),
            Peer::Xbee => self.xbee_rx.len(),
        }
    }

    pub fn clear_sent(&mut self) {
        self.imp_tx.clear();
        self.xbee_tx.clear();
    }

    pub fn selected(&self) -> Option<Peer> {
        self.selected
    }

    pub fn selections(&self) -> usize {
        self.selections
    }
}

impl SerialMux for MockMux {
    fn select(&mut self, peer: Peer) {
        self.selected = Some(peer);
        self.selections += 1;
    }

    fn try_read(&mut self) -> Option<u8> {
        match self.selected? {
            Peer::Imp => self.imp_rx.pop_front(),
            Peer::Xbee => self.xbee_rx.pop_front(),
        }
    }

    fn write(&mut self, byte: u8) {
        match self.selected {
            Some(Peer::Imp) => self.imp_tx.push(byte),
            Some(Peer::Xbee) => self.xbee_tx.push(byte),
            None => {}
        }
    }
}

/// Replays queued presses. Each press reads as held for `hold_samples`
/// samples and released on the next one. A press whose button is not
/// sampled before the sampling order repeats is lost.
#[derive(Debug, Clone)]
pub struct ScriptedButtons {
    queue: VecDeque<Button>,
    held: Option<(Button, u32)>,
    hold_samples: u32,
    missed: Vec<Button>,
}

impl ScriptedButtons {
    pub fn new() -> Self {
        Self::with_hold(1)
    }

    pub fn with_hold(hold_samples: u32) -> Self {
        Self {
            queue: VecDeque::new(),
            held: None,
            hold_samples: hold_samples.max(1),
            missed: Vec::new(),
        }
    }

    pub fn press(&mut self, button: Button) {
        self.queue.push_back(button);
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.held.is_none()
    }
}

impl Default for ScriptedButtons {
    fn default() -> Self {
        Self::new()
    }
}

impl ButtonPort for ScriptedButtons {
    fn is_pressed(&mut self, button: Button) -> bool {
        if self.held.is_none() {
            self.held = self.queue.pop_front().map(|next| (next, self.hold_samples));
            self.missed.clear();
        }
        let Some((held, remaining)) = self.held else {
            return false;
        };

        if held != button {
            if remaining == self.hold_samples {
                if self.missed.contains(&button) {
                    self.held = None;
                    return self.is_pressed(button);
                }
                self.missed.push(button);
            }
            return false;
        }

        if remaining > 0 {
            self.held = Some((held, remaining - 1));
            true
        } else {
            self.held = None;
            false
        }
    }
}

/// Button that never releases, for exercising the release-wait bound.
#[derive(Debug, Clone, Copy)]
pub struct StuckButton(pub Button);

impl ButtonPort for StuckButton {
    fn is_pressed(&mut self, button: Button) -> bool {
        button == self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingDisplay {
    lines: [String; 2],
    writes: usize,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&self, row: usize) -> &str {
        self.lines.get(row).map(String::as_str).unwrap_or("")
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl DisplayPort for RecordingDisplay {
    fn write_line(&mut self, row: usize, text: &str) {
        if let Some(line) = self.lines.get_mut(row) {
            *line = text.to_string();
            self.writes += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_press_is_seen_once_then_released() {
        let mut buttons = ScriptedButtons::new();
        buttons.press(Button::Field);

        assert!(!buttons.is_pressed(Button::Mode));
        assert!(buttons.is_pressed(Button::Field));
        assert!(!buttons.is_pressed(Button::Field));
        assert!(buttons.is_idle());
    }

    #[test]
    fn unsampled_press_lapses_when_sampling_repeats() {
        let mut buttons = ScriptedButtons::new();
        buttons.press(Button::Increment);
        buttons.press(Button::Mode);

        assert!(!buttons.is_pressed(Button::Mode));
        assert!(!buttons.is_pressed(Button::Field));
        assert!(buttons.is_pressed(Button::Mode));
        assert!(!buttons.is_pressed(Button::Mode));
        assert!(buttons.is_idle());
    }

    #[test]
    fn mux_routes_bytes_to_selected_peer() {
        let mut mux = MockMux::new();
        mux.inject(Peer::Xbee, &[0xE3]);

        mux.select(Peer::Imp);
        assert_eq!(mux.try_read(), None);
        mux.write(0x01);

        mux.select(Peer::Xbee);
        assert_eq!(mux.try_read(), Some(0xE3));
        mux.write(0x02);

        assert_eq!(mux.sent(Peer::Imp), &[0x01]);
        assert_eq!(mux.sent(Peer::Xbee), &[0x02]);
    }

    #[test]
    fn store_ignores_out_of_range_writes() {
        let mut store = MemoryStore::new();
        store.write(STORE_SIZE as u16, 0x00);

        assert_eq!(store.writes(), 0);
        assert_eq!(store.read(STORE_SIZE as u16), ERASED);
    }
}
