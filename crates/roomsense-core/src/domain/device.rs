//! Device classes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Device type tag stamped on every telemetry record.
pub const SENSOR_DEVICE_TYPE: &str = "ESP32-Sensor";

/// Credential から導かれる役割。どのエンドポイントを使えるかを決める。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Sensor,
    Camera,
}

impl DeviceClass {
    pub const ALL: [DeviceClass; 2] = [DeviceClass::Sensor, DeviceClass::Camera];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Sensor => "sensor",
            DeviceClass::Camera => "camera",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
