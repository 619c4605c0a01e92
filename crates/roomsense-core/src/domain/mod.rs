//! Domain model (ids, device classes, telemetry, media, errors).

pub mod device;
pub mod errors;
pub mod ids;
pub mod media;
pub mod telemetry;

pub use device::{DeviceClass, SENSOR_DEVICE_TYPE};
pub use errors::{ErrorKind, GatewayError};
pub use ids::{IdMarker, RecordId};
pub use media::{LatestImage, MediaAsset, MediaEntry, MediaFileName};
pub use telemetry::{RecordView, TelemetryAggregate, TelemetryReading, TelemetryRecord};
