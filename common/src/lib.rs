pub mod bcd;
pub mod config;
pub mod controller;
pub mod display;
pub mod edit;
pub mod link;
pub mod mock;
pub mod model;
pub mod packet;
pub mod ports;
pub mod relay;
pub mod store;
pub mod types;

pub use config::{LinkConfig, LoopConfig, RuntimeConfig};
pub use controller::{Controller, ControllerState, PassReport, Peripherals};
pub use link::{ImpOutcome, LinkRouter, XbeeOutcome};
pub use model::{ControlModel, StorageFault};
pub use packet::{PacketFields, WirePacket};
pub use ports::{ButtonPort, ByteStore, Clock, DisplayPort, SerialMux};
pub use store::StorageError;
pub use types::{Button, Domain, LightMode, Peer, SensedValues, TemperatureMode};
