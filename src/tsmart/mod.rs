pub mod codec;
pub mod discovery;
pub mod transport;

/// Port the T-Smart controller listens and replies on.
pub const DEFAULT_UDP_PORT: u16 = 1337;

/// Largest datagram read from the device.
pub const MAX_DATAGRAM_LEN: usize = 64;

/// Snapshot of the controller decoded from one control-read reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceState {
    /// Degrees Celsius, 0.1 resolution.
    pub current_temperature: f64,
    /// Target temperature, degrees Celsius, 0.1 resolution.
    pub set_point: f64,
    /// Raw device mode, not interpreted.
    pub mode: u8,
    pub heating: bool,
    /// Relay power.
    pub power: bool,
}

/// The three request kinds the controller understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Discovery,
    // Part of the protocol, never sent by the poll loop.
    #[allow(dead_code)]
    ConfigurationRead,
    ControlRead,
}
