mod connection_monitor;

pub use connection_monitor::*;
