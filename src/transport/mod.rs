//! Device links: serial ports, TCP sockets and serial port discovery

pub mod discovery;
pub mod serial;
pub mod tcp;
pub mod traits;

pub use discovery::{DiscoveryConfig, SerialDiscovery};
pub use tcp::TcpConnector;
pub use traits::{TransportConnector, TransportStream};
