// Adapters layer: concrete implementations for the outside world (serial device, HTTP server, state hook).

pub mod hook;
pub mod http;
pub mod serial;
