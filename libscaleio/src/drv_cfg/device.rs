//! Channel to the local SDC kernel driver.
//!
//! Each query opens the device node, issues one ioctl, and closes the handle
//! when the [`File`] drops, on success and error alike.  Calls block; from
//! async code run them under `tokio::task::spawn_blocking`.

use std::fs::File;
use std::io::ErrorKind;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use crate::drv_cfg::codec::{ConfiguredCluster, DeviceQuery, DeviceQueryResult};
use crate::error::ScaleioError;
use crate::telemetry::TimeSpent;

/// Device node exposed by the SDC kernel module.
pub const DEFAULT_DEVICE: &str = "/dev/scini";
/// GUID reported in mock mode.
pub const MOCK_GUID: &str = "9E56672F-2F4B-4A42-BFF4-88B6846FBFDA";
/// System id reported in mock mode.
pub const MOCK_SYSTEM: &str = "000000000001";

mod ioctl {
    use crate::drv_cfg::codec::{QUERY_GUID_OP, QUERY_MDMS_OP, RESCAN_OP};

    nix::ioctl_readwrite_bad!(query_guid, QUERY_GUID_OP, u8);
    nix::ioctl_readwrite_bad!(query_mdms, QUERY_MDMS_OP, u8);
    nix::ioctl_readwrite_bad!(rescan, RESCAN_OP, u8);
}

/// Handle factory for the SDC driver device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceChannel {
    path: PathBuf,
    mock: bool,
}

impl Default for DeviceChannel {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE)
    }
}

impl DeviceChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mock: false,
        }
    }

    /// In mock mode the GUID and cluster queries return fixed values without
    /// touching the device. Rescan is never mocked.
    pub fn with_mock_mode(mut self, mock: bool) -> Self {
        self.mock = mock;
        self
    }

    /// `SCINI_DEVICE` overrides the device path; `SCINI_MOCK_MODE=true`
    /// enables mock mode.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = lookup("SCINI_DEVICE").unwrap_or_else(|| DEFAULT_DEVICE.to_owned());
        let mock = lookup("SCINI_MOCK_MODE").is_some_and(|v| v == "true");
        Self::new(path).with_mock_mode(mock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_mock(&self) -> bool {
        self.mock
    }

    /// True in mock mode, or when the device node exists and is not a
    /// directory.
    pub fn is_driver_present(&self) -> bool {
        if self.mock {
            return true;
        }
        std::fs::metadata(&self.path).is_ok_and(|m| !m.is_dir())
    }

    /// GUID of the locally installed SDC, upper-case.
    pub fn query_local_guid(&self) -> Result<String, ScaleioError> {
        let _timer = TimeSpent::start("QueryGUID");
        if self.mock {
            return Ok(MOCK_GUID.to_owned());
        }
        match self.query(DeviceQuery::Guid)? {
            DeviceQueryResult::Guid(guid) => Ok(guid),
            other => Err(unexpected(DeviceQuery::Guid, &other)),
        }
    }

    /// MDM clusters the local SDC is configured against.
    pub fn query_configured_clusters(&self) -> Result<Vec<ConfiguredCluster>, ScaleioError> {
        let _timer = TimeSpent::start("QuerySystems");
        if self.mock {
            return Ok(vec![ConfiguredCluster {
                system_id: MOCK_SYSTEM.to_owned(),
                sdc_id: MOCK_GUID.to_owned(),
            }]);
        }
        match self.query(DeviceQuery::Clusters)? {
            DeviceQueryResult::Clusters(clusters) => Ok(clusters),
            other => Err(unexpected(DeviceQuery::Clusters, &other)),
        }
    }

    /// Ask the driver to rescan for volumes; returns the raw result code.
    pub fn trigger_rescan(&self) -> Result<String, ScaleioError> {
        let _timer = TimeSpent::start("QueryRescan");
        match self.query(DeviceQuery::Rescan)? {
            DeviceQueryResult::Rescan(code) => Ok(code),
            other => Err(unexpected(DeviceQuery::Rescan, &other)),
        }
    }

    /// Open the device, run `query`, and decode the reply. Ignores mock mode.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn query(&self, query: DeviceQuery) -> Result<DeviceQueryResult, ScaleioError> {
        let file = self.open()?;
        let mut buf = query.request_buffer();

        let fd = file.as_raw_fd();
        let data = buf.as_mut_ptr();
        // SAFETY: `buf` is sized by `request_buffer` to the full structure the
        // driver writes for this op-code, and outlives the call.
        let res = unsafe {
            match query {
                DeviceQuery::Guid => ioctl::query_guid(fd, data),
                DeviceQuery::Clusters => ioctl::query_mdms(fd, data),
                DeviceQuery::Rescan => ioctl::rescan(fd, data),
            }
        };
        res.map_err(|errno| ScaleioError::Device(format!("{} ioctl: {errno}", query.name())))?;
        debug!(op = query.op_code(), "ioctl complete");

        query.decode(&buf).inspect_err(|e| {
            warn!(error = %e, "driver rejected {}", query.name());
        })
    }

    fn open(&self) -> Result<File, ScaleioError> {
        let absent = || ScaleioError::DriverAbsent(self.path.display().to_string());
        match std::fs::metadata(&self.path) {
            Ok(m) if m.is_dir() => return Err(absent()),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(absent()),
            Err(e) => return Err(ScaleioError::device(e)),
        }
        File::open(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => absent(),
            _ => ScaleioError::Device(format!("open {}: {e}", self.path.display())),
        })
    }
}

fn unexpected(query: DeviceQuery, got: &DeviceQueryResult) -> ScaleioError {
    ScaleioError::ProtocolViolation(format!("{} decoded as {got:?}", query.name()))
}
