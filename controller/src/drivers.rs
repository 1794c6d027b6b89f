use std::{
    collections::VecDeque,
    io::BufRead,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::{Duration, Instant},
};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use homectl_common::{
    store::{self, STORE_SIZE},
    Button, ButtonPort, ByteStore, Clock, DisplayPort, Peer, SerialMux,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct FileStore {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl FileStore {
    pub fn new(path: PathBuf, mut bytes: Vec<u8>) -> Self {
        bytes.resize(STORE_SIZE, store::ERASED);
        Self { path, bytes }
    }

    fn flush(&self) {
        let result = store::encode_image(&self.bytes)
            .map_err(anyhow::Error::from)
            .and_then(|payload| {
                if let Some(parent) = self.path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&self.path, payload)?;
                Ok(())
            });
        if let Err(err) = result {
            warn!(path = %self.path.display(), "failed to flush store image: {err:#}");
        }
    }
}

impl ByteStore for FileStore {
    fn read(&self, address: u16) -> u8 {
        store::image_index(address)
            .map(|index| self.bytes[index])
            .unwrap_or(store::ERASED)
    }

    fn write(&mut self, address: u16, value: u8) {
        match store::image_index(address) {
            Ok(index) => {
                self.bytes[index] = value;
                self.flush();
            }
            Err(err) => warn!("dropped store write: {err}"),
        }
    }
}

pub struct Bridge {
    inbound: Mutex<VecDeque<u8>>,
    outbound: mpsc::UnboundedSender<u8>,
    connected: AtomicBool,
}

impl Bridge {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<u8>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let bridge = Arc::new(Self {
            inbound: Mutex::new(VecDeque::new()),
            outbound,
            connected: AtomicBool::new(false),
        });
        (bridge, rx)
    }

    pub fn push_inbound(&self, bytes: &[u8]) {
        lock(&self.inbound).extend(bytes.iter().copied());
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
        if !connected {
            lock(&self.inbound).clear();
        }
    }

    fn pop_inbound(&self) -> Option<u8> {
        lock(&self.inbound).pop_front()
    }

    /// Bytes sent while nobody is connected are lost, as on an open UART.
    fn send(&self, byte: u8) {
        if self.connected.load(Ordering::Relaxed) {
            let _ = self.outbound.send(byte);
        }
    }
}

pub struct TcpMux {
    imp: Arc<Bridge>,
    xbee: Arc<Bridge>,
    selected: Peer,
}

impl TcpMux {
    pub fn new(imp: Arc<Bridge>, xbee: Arc<Bridge>) -> Self {
        Self {
            imp,
            xbee,
            selected: Peer::Imp,
        }
    }

    fn bridge(&self) -> &Bridge {
        match self.selected {
            Peer::Imp => &self.imp,
            Peer::Xbee => &self.xbee,
        }
    }
}

impl SerialMux for TcpMux {
    fn select(&mut self, peer: Peer) {
        self.selected = peer;
    }

    fn try_read(&mut self) -> Option<u8> {
        self.bridge().pop_inbound()
    }

    fn write(&mut self, byte: u8) {
        self.bridge().send(byte);
    }
}

pub type ButtonQueue = Arc<Mutex<VecDeque<Button>>>;

pub fn button_for_key(key: char) -> Option<Button> {
    match key.to_ascii_lowercase() {
        'm' => Some(Button::Mode),
        'f' => Some(Button::Field),
        '+' | '=' => Some(Button::Increment),
        '-' | '_' => Some(Button::Decrement),
        _ => None,
    }
}

pub fn read_keys<R: BufRead>(reader: R, queue: &ButtonQueue) {
    for line in reader.lines() {
        match line {
            Ok(line) => lock(queue).extend(line.chars().filter_map(button_for_key)),
            Err(err) => {
                warn!("key input error: {err}");
                break;
            }
        }
    }
}

/// Replays queued key presses as a press followed by a release. A key whose
/// button the loop does not sample before its sampling order repeats is
/// dropped, like a front-panel press nobody polled.
pub struct KeyButtons {
    queue: ButtonQueue,
    pending: Option<Button>,
    down: Option<Button>,
    missed: Vec<Button>,
}

impl KeyButtons {
    pub fn new(queue: ButtonQueue) -> Self {
        Self {
            queue,
            pending: None,
            down: None,
            missed: Vec::new(),
        }
    }
}

impl ButtonPort for KeyButtons {
    fn is_pressed(&mut self, button: Button) -> bool {
        if self.down == Some(button) {
            self.down = None;
            return false;
        }
        if self.pending.is_none() {
            self.pending = lock(&self.queue).pop_front();
            self.missed.clear();
        }
        let Some(pending) = self.pending else {
            return false;
        };

        if pending == button {
            self.pending = None;
            self.down = Some(button);
            return true;
        }
        if self.missed.contains(&button) {
            debug!(key = ?pending, "dropped key press nobody sampled");
            self.pending = None;
            return self.is_pressed(button);
        }
        self.missed.push(button);
        false
    }
}

#[derive(Default)]
pub struct LogDisplay {
    lines: [String; 2],
}

impl DisplayPort for LogDisplay {
    fn write_line(&mut self, row: usize, text: &str) {
        let Some(line) = self.lines.get_mut(row) else {
            return;
        };
        if line.as_str() != text {
            *line = text.to_string();
            info!(row, text = text.trim_end(), "display");
        }
    }
}

pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn delay_ms(&mut self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homectl_common::{
        edit::debounced_press,
        mock::{FakeClock, MemoryStore, MockMux, RecordingDisplay},
        store::TEMPR_0,
        Controller, Domain, Peripherals, RuntimeConfig,
    };

    #[test]
    fn file_store_flushes_every_write() {
        let path = std::env::temp_dir()
            .join(format!("homectl-store-{}", std::process::id()))
            .join("eeprom.json");
        let mut file_store = FileStore::new(path.clone(), Vec::new());

        file_store.write(TEMPR_0, 0x72);

        let raw = std::fs::read_to_string(&path).unwrap();
        let image = store::parse_image(&raw).unwrap();
        assert_eq!(image[usize::from(TEMPR_0)], 0x72);
        assert_eq!(FileStore::new(path.clone(), image).read(TEMPR_0), 0x72);
        assert_eq!(file_store.read(0x1FF), store::ERASED);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn mux_reads_only_the_selected_bridge() {
        let (imp, _imp_rx) = Bridge::new();
        let (xbee, _xbee_rx) = Bridge::new();
        imp.push_inbound(&[0xA9]);
        xbee.push_inbound(&[0xE3]);
        let mut mux = TcpMux::new(imp, xbee);

        mux.select(Peer::Xbee);
        assert_eq!(mux.try_read(), Some(0xE3));
        assert_eq!(mux.try_read(), None);
        mux.select(Peer::Imp);
        assert_eq!(mux.try_read(), Some(0xA9));
    }

    #[test]
    fn writes_reach_only_a_connected_peer() {
        let (imp, mut imp_rx) = Bridge::new();
        let (xbee, _xbee_rx) = Bridge::new();
        let mut mux = TcpMux::new(imp.clone(), xbee);

        mux.write(0x01);
        assert!(imp_rx.try_recv().is_err());

        imp.set_connected(true);
        mux.write(0x02);
        assert_eq!(imp_rx.try_recv().unwrap(), 0x02);
    }

    #[test]
    fn key_presses_are_debounced_once_each() {
        let queue = ButtonQueue::default();
        lock(&queue).extend([Button::Field, Button::Field]);
        let mut buttons = KeyButtons::new(queue);
        let mut clock = FakeClock::new();

        assert!(!debounced_press(&mut buttons, &mut clock, Button::Mode, 100));
        assert!(debounced_press(&mut buttons, &mut clock, Button::Field, 100));
        assert!(debounced_press(&mut buttons, &mut clock, Button::Field, 100));
        assert!(!debounced_press(&mut buttons, &mut clock, Button::Field, 100));
        assert_eq!(clock.now_ms(), 0);
    }

    #[test]
    fn stray_value_key_does_not_jam_navigation() {
        let queue = ButtonQueue::default();
        lock(&queue).extend([Button::Increment, Button::Mode]);
        let mut controller = Controller::new(
            RuntimeConfig::default(),
            Peripherals {
                store: MemoryStore::new(),
                mux: MockMux::new(),
                buttons: KeyButtons::new(queue.clone()),
                display: RecordingDisplay::new(),
                clock: FakeClock::new(),
            },
        );

        for _ in 0..3 {
            controller.poll_once();
        }

        assert_eq!(controller.state().edit.domain(), Domain::Humidity);
        assert!(lock(&queue).is_empty());
    }

    #[test]
    fn key_lines_fill_the_queue_in_order() {
        let queue = ButtonQueue::default();

        read_keys("m+\nx f\n-".as_bytes(), &queue);

        assert_eq!(
            lock(&queue).iter().copied().collect::<Vec<_>>(),
            vec![Button::Mode, Button::Increment, Button::Field, Button::Decrement]
        );
    }

    #[test]
    fn keys_map_to_buttons() {
        assert_eq!(button_for_key('M'), Some(Button::Mode));
        assert_eq!(button_for_key('+'), Some(Button::Increment));
        assert_eq!(button_for_key('x'), None);
    }
}
