//! Every receive is bounded by a per-byte timeout measured on the injected
//! clock, so a silent peer costs at most one timeout per pass.

use tracing::{debug, info};

use crate::{
    config::LinkConfig,
    model::{self, ControlModel},
    packet::{WirePacket, IMP_MAGIC, TIMEOUT_BYTE, VALUE_MASK, XBEE_INBOUND_MAGIC, XBEE_OUTBOUND_MAGIC},
    ports::{ByteStore, Clock, SerialMux},
    types::{Peer, SensedValues},
};

const POLL_INTERVAL_MS: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpOutcome {
    Idle,
    StatusReported(WirePacket),
    /// `command` is the packet as received and relayed; `shared` is the wire
    /// packet re-derived from the updated records.
    CommandApplied {
        command: WirePacket,
        shared: WirePacket,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XbeeOutcome {
    Idle,
    SensorReport(SensedValues),
}

#[derive(Debug, Clone)]
pub struct LinkRouter {
    config: LinkConfig,
    selected: Option<Peer>,
}

impl LinkRouter {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            selected: None,
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn service_imp<S, M, C>(
        &mut self,
        store: &mut S,
        mux: &mut M,
        clock: &mut C,
        model: &mut ControlModel,
    ) -> ImpOutcome
    where
        S: ByteStore,
        M: SerialMux,
        C: Clock,
    {
        if !self.sync_imp(mux, clock) {
            return ImpOutcome::Idle;
        }

        let Some(packet) = self.read_packet(mux, clock) else {
            debug!("imp frame abandoned after magic");
            return ImpOutcome::Idle;
        };

        if packet.is_status_query() {
            let derived = model::derive_from_store(store, model);
            *model = derived.model;
            self.write_bytes(mux, clock, Peer::Imp, &derived.packet.to_bytes());
            debug!(packet = ?derived.packet, "answered imp status query");
            return ImpOutcome::StatusReported(derived.packet);
        }

        let applied = model::apply_incoming_packet(store, packet);
        let derived = model::derive_from_store(store, &applied);
        *model = derived.model;
        self.write_bytes(mux, clock, Peer::Xbee, &packet.to_bytes());
        info!(command = ?packet, "applied imp command and relayed it to xbee");

        ImpOutcome::CommandApplied {
            command: packet,
            shared: derived.packet,
        }
    }

    pub fn service_xbee<M, C>(&mut self, mux: &mut M, clock: &mut C, outgoing: WirePacket) -> XbeeOutcome
    where
        M: SerialMux,
        C: Clock,
    {
        let timeout = self.config.xbee_byte_timeout_ms;
        if self.read_byte(mux, clock, Peer::Xbee, timeout) != Some(XBEE_INBOUND_MAGIC) {
            return XbeeOutcome::Idle;
        }

        let Some(temperature) = self.read_payload_byte(mux, clock, Peer::Xbee, timeout) else {
            return XbeeOutcome::Idle;
        };
        let Some(humidity) = self.read_payload_byte(mux, clock, Peer::Xbee, timeout) else {
            return XbeeOutcome::Idle;
        };

        let sensed = SensedValues {
            temperature: temperature & VALUE_MASK,
            humidity: humidity & VALUE_MASK,
        };

        let [bools, temperature, humidity] = outgoing.to_bytes();
        self.write_bytes(
            mux,
            clock,
            Peer::Xbee,
            &[XBEE_OUTBOUND_MAGIC, bools, temperature, humidity],
        );
        debug!(?sensed, "xbee sensor report");

        XbeeOutcome::SensorReport(sensed)
    }

    fn sync_imp<M: SerialMux, C: Clock>(&mut self, mux: &mut M, clock: &mut C) -> bool {
        let timeout = self.config.imp_byte_timeout_ms;
        let mut matched = 0;

        for _ in 0..self.config.sync_scan_limit {
            let Some(byte) = self.read_byte(mux, clock, Peer::Imp, timeout) else {
                return false;
            };

            if byte == IMP_MAGIC[matched] {
                matched += 1;
                if matched == IMP_MAGIC.len() {
                    return true;
                }
            } else {
                matched = usize::from(byte == IMP_MAGIC[0]);
            }
        }

        false
    }

    fn read_packet<M: SerialMux, C: Clock>(&mut self, mux: &mut M, clock: &mut C) -> Option<WirePacket> {
        let timeout = self.config.imp_byte_timeout_ms;
        let bools = self.read_payload_byte(mux, clock, Peer::Imp, timeout)?;
        let temperature = self.read_payload_byte(mux, clock, Peer::Imp, timeout)?;
        let humidity = self.read_payload_byte(mux, clock, Peer::Imp, timeout)?;
        Some(WirePacket {
            bools,
            temperature,
            humidity,
        })
    }

    fn read_payload_byte<M: SerialMux, C: Clock>(
        &mut self,
        mux: &mut M,
        clock: &mut C,
        peer: Peer,
        timeout_ms: u64,
    ) -> Option<u8> {
        self.read_byte(mux, clock, peer, timeout_ms)
            .filter(|byte| *byte != TIMEOUT_BYTE)
    }

    fn read_byte<M: SerialMux, C: Clock>(
        &mut self,
        mux: &mut M,
        clock: &mut C,
        peer: Peer,
        timeout_ms: u64,
    ) -> Option<u8> {
        self.select(mux, clock, peer);

        let start = clock.now_ms();
        loop {
            if let Some(byte) = mux.try_read() {
                return Some(byte);
            }
            if clock.elapsed_since(start) >= timeout_ms {
                return None;
            }
            clock.delay_ms(POLL_INTERVAL_MS);
        }
    }

    fn write_bytes<M: SerialMux, C: Clock>(&mut self, mux: &mut M, clock: &mut C, peer: Peer, bytes: &[u8]) {
        self.select(mux, clock, peer);
        for byte in bytes {
            mux.write(*byte);
        }
    }

    fn select<M: SerialMux, C: Clock>(&mut self, mux: &mut M, clock: &mut C, peer: Peer) {
        if self.selected == Some(peer) {
            return;
        }
        mux.select(peer);
        clock.delay_ms(self.config.mux_settle_ms);
        self.selected = Some(peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mock::{FakeClock, MemoryStore, MockMux},
        store::{initialize_defaults, load_record},
        types::{Domain, LightMode, TemperatureMode},
    };
    use pretty_assertions::assert_eq;

    struct Rig {
        router: LinkRouter,
        store: MemoryStore,
        mux: MockMux,
        clock: FakeClock,
        model: ControlModel,
    }

    impl Rig {
        fn new() -> Self {
            let mut store = MemoryStore::new();
            initialize_defaults(&mut store);
            let model = model::derive_from_store(&mut store, &ControlModel::default()).model;
            store.reset_writes();

            Self {
                router: LinkRouter::new(LinkConfig::default()),
                store,
                mux: MockMux::new(),
                clock: FakeClock::new(),
                model,
            }
        }

        fn imp(&mut self) -> ImpOutcome {
            self.router
                .service_imp(&mut self.store, &mut self.mux, &mut self.clock, &mut self.model)
        }

        fn xbee(&mut self, outgoing: WirePacket) -> XbeeOutcome {
            self.router
                .service_xbee(&mut self.mux, &mut self.clock, outgoing)
        }
    }

    #[test]
    fn status_query_answers_with_shared_packet_without_writing() {
        let mut rig = Rig::new();
        rig.mux.inject(Peer::Imp, &[0xA9, 0x65, 0x12, 0x80, 0x34]);

        let outcome = rig.imp();

        let expected = WirePacket::from_bytes([0x82, 75, 40]);
        assert_eq!(outcome, ImpOutcome::StatusReported(expected));
        assert_eq!(rig.mux.sent(Peer::Imp), &[0x82, 75, 40]);
        assert_eq!(rig.mux.sent(Peer::Xbee), &[] as &[u8]);
        assert_eq!(rig.store.writes(), 0);
    }

    #[test]
    fn command_is_persisted_and_relayed_verbatim() {
        let mut rig = Rig::new();
        rig.mux.inject(Peer::Imp, &[0xA9, 0x65, 0x44, 0x4B, 0x28]);

        let outcome = rig.imp();

        assert_eq!(
            outcome,
            ImpOutcome::CommandApplied {
                command: WirePacket::from_bytes([0x44, 0x4B, 0x28]),
                shared: WirePacket::from_bytes([0x60, 75, 40]),
            }
        );
        assert_eq!(rig.mux.sent(Peer::Xbee), &[0x44, 0x4B, 0x28]);
        assert_eq!(rig.mux.sent(Peer::Imp), &[] as &[u8]);
        assert_eq!(load_record(&rig.store, Domain::Temperature), [0x75, 0xC0]);
        assert_eq!(load_record(&rig.store, Domain::Humidity), [0x40, 0x00]);
        assert_eq!(load_record(&rig.store, Domain::Lighting)[0], 0x80);
        assert_eq!(rig.model.light_mode, LightMode::On);
        assert_eq!(rig.model.temperature_mode, TemperatureMode::Cool);
    }

    #[test]
    fn sync_skips_leading_noise() {
        let mut rig = Rig::new();
        rig.mux
            .inject(Peer::Imp, &[0x00, 0xA9, 0xA9, 0x65, 0x02, 0x80, 0x00]);

        assert!(matches!(rig.imp(), ImpOutcome::StatusReported(_)));
    }

    #[test]
    fn gives_up_sync_after_scan_limit() {
        let mut rig = Rig::new();
        rig.mux.inject(Peer::Imp, &[0x11; 20]);

        assert_eq!(rig.imp(), ImpOutcome::Idle);
        assert_eq!(rig.mux.pending(Peer::Imp), 20 - 8);
    }

    #[test]
    fn truncated_frame_is_abandoned_without_writes() {
        let mut rig = Rig::new();
        rig.mux.inject(Peer::Imp, &[0xA9, 0x65, 0x44]);

        assert_eq!(rig.imp(), ImpOutcome::Idle);
        assert_eq!(rig.store.writes(), 0);
        assert_eq!(rig.mux.sent(Peer::Xbee), &[] as &[u8]);
    }

    #[test]
    fn timeout_byte_in_payload_aborts_the_exchange() {
        let mut rig = Rig::new();
        rig.mux.inject(Peer::Imp, &[0xA9, 0x65, 0x44, 0xFF, 0x28]);

        assert_eq!(rig.imp(), ImpOutcome::Idle);
        assert_eq!(rig.store.writes(), 0);
    }

    #[test]
    fn silent_imp_costs_one_timeout() {
        let mut rig = Rig::new();

        assert_eq!(rig.imp(), ImpOutcome::Idle);

        let config = LinkConfig::default();
        assert!(rig.clock.now_ms() <= config.mux_settle_ms + config.imp_byte_timeout_ms);
        assert_eq!(rig.store.writes(), 0);
    }

    #[test]
    fn sensor_report_updates_sensed_values_and_is_answered() {
        let mut rig = Rig::new();
        rig.mux.inject(Peer::Xbee, &[0xE3, 0x80 | 71, 38]);
        let outgoing = WirePacket::from_bytes([0x82, 75, 40]);

        let outcome = rig.xbee(outgoing);

        assert_eq!(
            outcome,
            XbeeOutcome::SensorReport(SensedValues {
                temperature: 71,
                humidity: 38
            })
        );
        assert_eq!(rig.mux.sent(Peer::Xbee), &[0xD4, 0x82, 75, 40]);
    }

    #[test]
    fn xbee_ignores_frames_without_magic() {
        let mut rig = Rig::new();
        rig.mux.inject(Peer::Xbee, &[0x42, 70, 40]);

        assert_eq!(rig.xbee(WirePacket::default()), XbeeOutcome::Idle);
        assert_eq!(rig.mux.sent(Peer::Xbee), &[] as &[u8]);
        assert_eq!(rig.mux.pending(Peer::Xbee), 2);
    }

    #[test]
    fn silent_xbee_is_bounded_by_its_timeout() {
        let mut rig = Rig::new();

        assert_eq!(rig.xbee(WirePacket::default()), XbeeOutcome::Idle);

        let config = LinkConfig::default();
        assert!(rig.clock.now_ms() <= config.mux_settle_ms + config.xbee_byte_timeout_ms);
    }

    #[test]
    fn settles_only_when_switching_peers() {
        let mut rig = Rig::new();
        rig.mux.inject(Peer::Imp, &[0xA9, 0x65, 0x02, 0x80, 0x00]);

        rig.imp();

        assert_eq!(rig.mux.selections(), 1);
    }
}
