// Windowed indicator state machines
pub mod indicators;
pub mod rolling;

pub use rolling::RollingWindow;
