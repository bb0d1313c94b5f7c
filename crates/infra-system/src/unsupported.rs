// HID access on platforms without a hidraw adapter: no devices are ever found
use async_trait::async_trait;
use tracing::warn;

use devicehub_core::domain::DeviceIdentity;
use devicehub_core::port::{DeviceError, HidDevice, HidDeviceInfo, HidEnumerator};

#[derive(Default)]
pub struct UnsupportedHid;

#[async_trait]
impl HidEnumerator for UnsupportedHid {
    async fn enumerate(&self) -> Result<Vec<HidDeviceInfo>, DeviceError> {
        Ok(Vec::new())
    }

    async fn find(
        &self,
        identity: DeviceIdentity,
    ) -> Result<Option<Box<dyn HidDevice>>, DeviceError> {
        warn!(device = %identity, "HID scales are only supported on Linux");
        Ok(None)
    }
}
