pub mod config;
pub mod interface;
pub mod packet;
pub mod scenario;

pub use config::SimConfig;
pub use interface::{SystemContext, TransportProtocol};
pub use packet::{ACK_FILLER, NOT_IN_USE, PAYLOAD_SIZE, Packet};
pub use scenario::{SimConfigOverride, TestAction, TestAssertion, TestScenario};
