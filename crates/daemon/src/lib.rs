//! DeviceHub agent support: configuration loading and telemetry wiring shared
//! by the `devicehub` daemon and the operator CLI

pub mod settings;
pub mod telemetry;
