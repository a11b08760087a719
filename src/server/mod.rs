// Server module entry point
// Listener setup, connection serving, and shutdown signals

pub mod connection;
pub mod listener;
pub mod signal;

pub use listener::create_reusable_listener;
pub use signal::{start_signal_handler, SignalHandler};
