//! Device Dispatcher error taxonomy.

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("device control callback reported failure for {device_type} {device_id}")]
    CallbackFailed {
        device_type: String,
        device_id: String,
    },
}
