// Linux hidraw adapter
// Enumerates through sysfs, reads reports through a non-blocking /dev/hidrawN
use async_trait::async_trait;
use nix::fcntl::OFlag;
use std::fs::{File, OpenOptions};
use std::io::Read;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::unix::AsyncFd;
use tokio::time::timeout;
use tracing::{debug, warn};

use devicehub_core::domain::DeviceIdentity;
use devicehub_core::port::{
    DeviceError, HidDevice, HidDeviceInfo, HidEnumerator, HidReport, ReadStatus,
};

const SYSFS_HIDRAW: &str = "/sys/class/hidraw";
const DEV_DIR: &str = "/dev";

/// HID usage page for point-of-sale scales
const SCALE_USAGE_PAGE: u32 = 0x8D;

/// Largest report we expect from a scale, report ID included
const REPORT_BUFFER_LEN: usize = 64;

/// struct hidraw_devinfo from linux/hidraw.h
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct HidrawDevinfo {
    pub bustype: u32,
    pub vendor: i16,
    pub product: i16,
}

nix::ioctl_read!(hidraw_get_info, b'H', 0x03, HidrawDevinfo);

/// What a report descriptor tells us about a device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DescriptorSummary {
    pub is_scale: bool,
    pub uses_report_ids: bool,
}

/// Walk the short items of a HID report descriptor
pub fn scan_descriptor(descriptor: &[u8]) -> DescriptorSummary {
    const LONG_ITEM: u8 = 0xFE;
    const USAGE_PAGE: u8 = 0x04;
    const REPORT_ID: u8 = 0x84;

    let mut summary = DescriptorSummary::default();
    let mut i = 0;
    while i < descriptor.len() {
        let prefix = descriptor[i];
        if prefix == LONG_ITEM {
            let size = descriptor.get(i + 1).copied().unwrap_or(0) as usize;
            i += 3 + size;
            continue;
        }

        let size = match prefix & 0x03 {
            3 => 4,
            n => n as usize,
        };
        let value = descriptor
            .get(i + 1..i + 1 + size)
            .map(|bytes| {
                bytes
                    .iter()
                    .rev()
                    .fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
            })
            .unwrap_or(0);

        match prefix & 0xFC {
            USAGE_PAGE if value == SCALE_USAGE_PAGE => summary.is_scale = true,
            REPORT_ID => summary.uses_report_ids = true,
            _ => {}
        }
        i += 1 + size;
    }
    summary
}

/// Parse `HID_ID` and `HID_NAME` out of a hid device uevent file
pub fn parse_uevent(uevent: &str) -> Option<(DeviceIdentity, String)> {
    let mut identity = None;
    let mut name = String::new();
    for line in uevent.lines() {
        if let Some(id) = line.strip_prefix("HID_ID=") {
            // bus:vendor:product, each hex
            let mut parts = id.split(':').skip(1);
            let vendor = u32::from_str_radix(parts.next()?, 16).ok()?;
            let product = u32::from_str_radix(parts.next()?, 16).ok()?;
            identity = Some(DeviceIdentity::new(vendor as u16, product as u16));
        } else if let Some(value) = line.strip_prefix("HID_NAME=") {
            name = value.to_string();
        }
    }
    identity.map(|id| (id, name))
}

/// Split a raw hidraw read into report ID and payload
pub fn split_report(buf: &[u8], uses_report_ids: bool) -> HidReport {
    if buf.is_empty() {
        return HidReport::empty(ReadStatus::NoData);
    }
    if uses_report_ids {
        HidReport::success(buf[0], buf[1..].to_vec())
    } else {
        HidReport::success(0, buf.to_vec())
    }
}

struct Candidate {
    info: HidDeviceInfo,
    uses_report_ids: bool,
}

/// Enumerates HID devices exposed through hidraw
pub struct HidrawEnumerator {
    sysfs_root: PathBuf,
    dev_dir: PathBuf,
}

impl Default for HidrawEnumerator {
    fn default() -> Self {
        Self::new(SYSFS_HIDRAW, DEV_DIR)
    }
}

impl HidrawEnumerator {
    pub fn new(sysfs_root: impl Into<PathBuf>, dev_dir: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
            dev_dir: dev_dir.into(),
        }
    }

    async fn candidates(&self) -> Result<Vec<Candidate>, DeviceError> {
        let mut entries = tokio::fs::read_dir(&self.sysfs_root)
            .await
            .map_err(|e| DeviceError::Enumeration(format!("{}: {}", self.sysfs_root.display(), e)))?;

        let mut found = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DeviceError::Enumeration(e.to_string()))?
        {
            let node = entry.file_name().to_string_lossy().to_string();
            match self.describe(&entry.path(), &node).await {
                Some(candidate) => found.push(candidate),
                None => debug!(node, "Skipping hidraw node without HID identity"),
            }
        }
        found.sort_by(|a, b| a.info.path.cmp(&b.info.path));
        Ok(found)
    }

    async fn describe(&self, sys_path: &Path, node: &str) -> Option<Candidate> {
        let device = sys_path.join("device");
        let uevent = tokio::fs::read_to_string(device.join("uevent")).await.ok()?;
        let (identity, name) = parse_uevent(&uevent)?;
        let descriptor = tokio::fs::read(device.join("report_descriptor"))
            .await
            .unwrap_or_default();
        let summary = scan_descriptor(&descriptor);
        let manufacturer = tokio::fs::read_to_string(device.join("../../manufacturer"))
            .await
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        Some(Candidate {
            info: HidDeviceInfo {
                identity,
                path: self.dev_dir.join(node).to_string_lossy().to_string(),
                product: name,
                manufacturer,
                is_scale: summary.is_scale,
            },
            uses_report_ids: summary.uses_report_ids,
        })
    }
}

#[async_trait]
impl HidEnumerator for HidrawEnumerator {
    async fn enumerate(&self) -> Result<Vec<HidDeviceInfo>, DeviceError> {
        Ok(self.candidates().await?.into_iter().map(|c| c.info).collect())
    }

    async fn find(
        &self,
        identity: DeviceIdentity,
    ) -> Result<Option<Box<dyn HidDevice>>, DeviceError> {
        let mut matches: Vec<Candidate> = self
            .candidates()
            .await?
            .into_iter()
            .filter(|c| c.info.identity == identity)
            .collect();
        // Composite devices expose several nodes; prefer the scale interface
        matches.sort_by_key(|c| !c.info.is_scale);

        Ok(matches.into_iter().next().map(|c| {
            Box::new(HidrawDevice {
                info: c.info,
                uses_report_ids: c.uses_report_ids,
                fd: None,
            }) as Box<dyn HidDevice>
        }))
    }
}

/// An attached hidraw node
pub struct HidrawDevice {
    info: HidDeviceInfo,
    uses_report_ids: bool,
    fd: Option<AsyncFd<File>>,
}

impl HidrawDevice {
    fn verify_identity(&self, file: &File) -> Result<(), DeviceError> {
        let mut raw = HidrawDevinfo::default();
        // SAFETY: the fd is open for the duration of the call and `raw` matches
        // the kernel's struct hidraw_devinfo layout
        unsafe { hidraw_get_info(file.as_raw_fd(), &mut raw) }
            .map_err(|e| DeviceError::Io(format!("HIDIOCGRAWINFO: {}", e)))?;

        let actual = DeviceIdentity::new(raw.vendor as u16, raw.product as u16);
        if actual != self.info.identity {
            return Err(DeviceError::NotConnected(format!(
                "{} is now {} (expected {})",
                self.info.path, actual, self.info.identity
            )));
        }
        Ok(())
    }
}

async fn read_nonblocking(fd: &AsyncFd<File>, buf: &mut [u8]) -> std::io::Result<usize> {
    loop {
        let mut guard = fd.readable().await?;
        match guard.try_io(|inner| inner.get_ref().read(buf)) {
            Ok(result) => return result,
            Err(_would_block) => continue,
        }
    }
}

#[async_trait]
impl HidDevice for HidrawDevice {
    async fn open(&mut self) -> Result<(), DeviceError> {
        if self.fd.is_some() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(OFlag::O_NONBLOCK.bits())
            .open(&self.info.path)
            .map_err(|e| DeviceError::Io(format!("{}: {}", self.info.path, e)))?;
        self.verify_identity(&file)?;

        let fd = AsyncFd::new(file).map_err(|e| DeviceError::Io(e.to_string()))?;
        self.fd = Some(fd);
        debug!(path = %self.info.path, "Opened scale");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.fd.is_some() && Path::new(&self.info.path).exists()
    }

    async fn read_report(&mut self, read_timeout: Duration) -> Result<HidReport, DeviceError> {
        let Some(fd) = self.fd.as_ref() else {
            return Err(DeviceError::NotConnected(self.info.path.clone()));
        };

        let mut buf = [0u8; REPORT_BUFFER_LEN];
        match timeout(read_timeout, read_nonblocking(fd, &mut buf)).await {
            Ok(Ok(len)) => Ok(split_report(&buf[..len], self.uses_report_ids)),
            Ok(Err(e)) => {
                warn!(path = %self.info.path, error = %e, "Scale read failed");
                Err(DeviceError::Io(e.to_string()))
            }
            Err(_) => Ok(HidReport::empty(ReadStatus::TimedOut)),
        }
    }

    async fn close(&mut self) {
        if self.fd.take().is_some() {
            debug!(path = %self.info.path, "Closed scale");
        }
    }
}
