use tracing::{debug, warn};

use crate::{
    config::{LoopConfig, RuntimeConfig},
    display::{self, BlinkClock, ScreenView},
    edit::{debounced_press, EditState, ValueButton},
    link::{ImpOutcome, LinkRouter, XbeeOutcome},
    model::{self, ControlModel, StorageFault},
    packet::WirePacket,
    ports::{ButtonPort, ByteStore, Clock, DisplayPort, SerialMux},
    store,
    types::{Button, Domain, SensedValues},
};

#[derive(Debug)]
pub struct Peripherals<S, M, B, D, C> {
    pub store: S,
    pub mux: M,
    pub buttons: B,
    pub display: D,
    pub clock: C,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorruptionNotice {
    pub address: u16,
    pub until_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ControllerState {
    pub edit: EditState,
    pub model: ControlModel,
    pub packet: WirePacket,
    pub sensed: SensedValues,
    pub blink: BlinkClock,
    pub faults: Vec<StorageFault>,
    pub notice: Option<CorruptionNotice>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub committed: Option<Domain>,
    pub faults: Vec<StorageFault>,
    pub imp: ImpOutcome,
    pub xbee: XbeeOutcome,
}

pub struct Controller<S, M, B, D, C> {
    config: RuntimeConfig,
    router: LinkRouter,
    io: Peripherals<S, M, B, D, C>,
    state: ControllerState,
}

impl<S, M, B, D, C> Controller<S, M, B, D, C>
where
    S: ByteStore,
    M: SerialMux,
    B: ButtonPort,
    D: DisplayPort,
    C: Clock,
{
    pub fn new(mut config: RuntimeConfig, mut io: Peripherals<S, M, B, D, C>) -> Self {
        config.sanitize();
        store::initialize_defaults(&mut io.store);

        let working = store::load_record(&io.store, Domain::Temperature);
        let derived = model::derive_from_store(&mut io.store, &ControlModel::default());

        let state = ControllerState {
            edit: EditState::new(Domain::Temperature, working),
            model: derived.model,
            packet: derived.packet,
            sensed: SensedValues::default(),
            blink: BlinkClock::new(config.control.blink_period_passes),
            faults: Vec::new(),
            notice: None,
        };

        Self {
            router: LinkRouter::new(config.link.clone()),
            config,
            io,
            state,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn peripherals(&self) -> &Peripherals<S, M, B, D, C> {
        &self.io
    }

    pub fn peripherals_mut(&mut self) -> &mut Peripherals<S, M, B, D, C> {
        &mut self.io
    }

    pub fn into_peripherals(self) -> Peripherals<S, M, B, D, C> {
        self.io
    }

    pub fn poll_once(&mut self) -> PassReport {
        run_pass(
            &mut self.state,
            &mut self.io,
            &mut self.router,
            &self.config.control,
        )
    }

    pub fn run_while(&mut self, mut keep_running: impl FnMut() -> bool) {
        while keep_running() {
            self.poll_once();
        }
    }
}

pub fn run_pass<S, M, B, D, C>(
    state: &mut ControllerState,
    io: &mut Peripherals<S, M, B, D, C>,
    router: &mut LinkRouter,
    config: &LoopConfig,
) -> PassReport
where
    S: ByteStore,
    M: SerialMux,
    B: ButtonPort,
    D: DisplayPort,
    C: Clock,
{
    let Peripherals {
        store,
        mux,
        buttons,
        display,
        clock,
    } = io;
    let release_timeout = config.button_release_timeout_ms;

    let mut switch_domain = false;
    if state.edit.is_browsing() && debounced_press(buttons, clock, Button::Mode, release_timeout) {
        switch_domain = true;
    } else if debounced_press(buttons, clock, Button::Field, release_timeout) {
        let level = state.edit.advance_field();
        debug!(level = level.as_str(), "edit level changed");
    }

    let committed = state.edit.take_commit().map(|(domain, bytes)| {
        store::commit_record(store, domain, bytes);
        debug!(domain = domain.as_str(), ?bytes, "committed working copy");
        domain
    });

    if switch_domain {
        let domain = state.edit.domain().next();
        state.edit.select(domain, store::load_record(store, domain));
        debug!(domain = domain.as_str(), "domain selected");
    } else {
        state
            .edit
            .refresh(store::load_record(store, state.edit.domain()));
    }

    if !state.edit.is_browsing() {
        if debounced_press(buttons, clock, Button::Increment, release_timeout) {
            state.edit.adjust(ValueButton::Increment);
        } else if debounced_press(buttons, clock, Button::Decrement, release_timeout) {
            state.edit.adjust(ValueButton::Decrement);
        }
    }

    let derived = model::derive_from_store(store, &state.model);
    state.model = derived.model;
    state.packet = derived.packet;
    record_faults(state, &derived.faults, clock.now_ms(), config);

    let screen = match state.notice {
        Some(notice) if clock.now_ms() < notice.until_ms => display::render_corruption(notice.address),
        _ => display::render(&ScreenView {
            domain: state.edit.domain(),
            level: state.edit.level(),
            working: state.edit.working(),
            sensed: state.sensed,
            blink_visible: state.blink.visible(),
        }),
    };
    display::show(display, &screen);
    state.blink.tick();

    let mut outgoing = state.packet;
    let imp = router.service_imp(store, mux, clock, &mut state.model);
    match imp {
        ImpOutcome::StatusReported(packet) => state.packet = packet,
        ImpOutcome::CommandApplied { command, shared } => {
            outgoing = command;
            state.packet = shared;
        }
        ImpOutcome::Idle => {}
    }

    let xbee = router.service_xbee(mux, clock, outgoing);
    if let XbeeOutcome::SensorReport(sensed) = xbee {
        state.sensed = sensed;
    }

    clock.delay_ms(config.pass_delay_ms);

    PassReport {
        committed,
        faults: derived.faults,
        imp,
        xbee,
    }
}

fn record_faults(state: &mut ControllerState, faults: &[StorageFault], now_ms: u64, config: &LoopConfig) {
    for fault in faults {
        if state.faults.contains(fault) {
            continue;
        }
        warn!(address = fault.address, byte = fault.byte, "{fault}");
        state.notice = Some(CorruptionNotice {
            address: fault.address,
            until_ms: now_ms.saturating_add(config.corruption_notice_ms),
        });
    }
    if faults.is_empty() {
        state.notice = None;
    }
    state.faults = faults.to_vec();
}
