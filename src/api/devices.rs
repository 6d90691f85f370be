//! Default device/sensor collaborators for the HTTP control surface and the
//! `simulate` CLI subcommand.
//!
//! The real sensor API and device-control callback are host-supplied. These
//! are safe, explicit stand-ins: the sensor stub always falls through to
//! cache/config, the device-control stub acks every command and logs it, so
//! `serve`/`simulate` are runnable out of the box without a real SCADA
//! integration wired in.

use async_trait::async_trait;
use tracing::info;

use crate::dispatch::{DeviceCommand, DeviceControl};
use crate::waterlevel::{RawSensorReading, SensorApi, SensorApiError};

/// Always returns no readings, so the Water-Level Source's fallback chain
/// resolves everything from cache or config defaults.
pub struct EmptySensorApi;

#[async_trait]
impl SensorApi for EmptySensorApi {
    async fn fetch(&self, _farm_id: &str) -> Result<Vec<RawSensorReading>, SensorApiError> {
        Ok(Vec::new())
    }
}

/// Logs every command and reports success. Stands in for a real SCADA/PLC
/// callback until one is wired in by the host application.
pub struct LoggingDeviceControl;

#[async_trait]
impl DeviceControl for LoggingDeviceControl {
    async fn actuate(&self, cmd: &DeviceCommand) -> bool {
        info!(
            device_type = ?cmd.device_type,
            device_id = %cmd.device_id,
            action = ?cmd.action,
            value = ?cmd.value,
            "device command (logging stub)"
        );
        true
    }
}
