//! Device Dispatcher — outbound command queue and device-control seam.

pub mod dispatcher;
pub mod error;

pub use dispatcher::{
    close_field_inlet, close_regulator, stop_pump, DeviceAction, DeviceCommand, DeviceControl,
    DeviceDispatcher, DeviceType, DispatchPhase, DispatchStats, QueuedCommand,
};
pub use error::DispatchError;
