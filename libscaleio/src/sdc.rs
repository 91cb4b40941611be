//! SDC facade.
//!
//! Lookups match on an explicit [`SdcLookup`] key instead of a field name
//! string, and failed fetches propagate their error instead of handing back
//! an empty object.

use crate::client::Client;
use crate::drv_cfg::DeviceChannel;
use crate::error::ScaleioError;
use crate::system::System;
use crate::telemetry::TimeSpent;
use crate::types::{
    ChangeSdcNameParam, Link, REL_SDC_STATISTICS, REL_SDC_VOLUME, SdcInfo, SdcStatistics,
    VolumeInfo,
};
use crate::volume::Volume;

/// An SDC together with the client used to reach it.
#[derive(Debug, Clone)]
pub struct Sdc {
    client: Client,
    pub info: SdcInfo,
}

/// Attribute used by [`System::find_sdc`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdcLookup {
    Id(String),
    Name(String),
    Guid(String),
    Ip(String),
}

impl SdcLookup {
    pub fn matches(&self, sdc: &SdcInfo) -> bool {
        match self {
            Self::Id(v) => sdc.id == *v,
            Self::Name(v) => sdc.name == *v,
            // The driver reports GUIDs upper-case, the gateway may not.
            Self::Guid(v) => sdc.sdc_guid.eq_ignore_ascii_case(v),
            Self::Ip(v) => sdc.sdc_ip == *v,
        }
    }
}

/// Build the relationship link for `rel` from the SDC id.
///
/// Unknown relationships yield a link with an empty `href`.
pub fn sdc_link(sdc: &SdcInfo, rel: &str) -> Link {
    let href = match rel {
        REL_SDC_STATISTICS => format!("/api/instances/Sdc::{}/relationships/Statistics", sdc.id),
        REL_SDC_VOLUME => format!("/api/instances/Sdc::{}/relationships/Volume", sdc.id),
        _ => String::new(),
    };
    Link {
        rel: rel.to_owned(),
        href,
    }
}

impl Sdc {
    pub fn new(client: Client, info: SdcInfo) -> Self {
        Self { client, info }
    }

    pub async fn get_statistics(&self) -> Result<SdcStatistics, ScaleioError> {
        let _timer = TimeSpent::start("GetStatistics");
        let link = sdc_link(&self.info, REL_SDC_STATISTICS);
        self.client.get(&link.href).await
    }

    /// Volumes mapped to this SDC.
    pub async fn get_volumes(&self) -> Result<Vec<VolumeInfo>, ScaleioError> {
        let _timer = TimeSpent::start("GetVolume");
        let link = sdc_link(&self.info, REL_SDC_VOLUME);
        self.client.get(&link.href).await
    }

    /// Like [`Sdc::get_volumes`], wrapped as [`Volume`] facades.
    pub async fn find_volumes(&self) -> Result<Vec<Volume>, ScaleioError> {
        let _timer = TimeSpent::start("FindVolumes");
        Ok(self
            .get_volumes()
            .await?
            .into_iter()
            .map(|v| Volume::new(self.client.clone(), v))
            .collect())
    }
}

impl System {
    pub async fn get_sdcs(&self) -> Result<Vec<SdcInfo>, ScaleioError> {
        let _timer = TimeSpent::start("GetSdc");
        let path = format!("/api/instances/System::{}/relationships/Sdc", self.info.id);
        self.client.get(&path).await
    }

    pub async fn get_sdc_by_id(&self, id: &str) -> Result<Sdc, ScaleioError> {
        let _timer = TimeSpent::start("GetSdcById");
        let info = self.client.get(&format!("/api/instances/Sdc::{id}")).await?;
        Ok(Sdc::new(self.client.clone(), info))
    }

    /// Rename an SDC and return it as the gateway reports it afterwards.
    pub async fn change_sdc_name(&self, id: &str, name: &str) -> Result<Sdc, ScaleioError> {
        let _timer = TimeSpent::start("ChangeSdcName");
        let path = format!("/api/instances/Sdc::{id}/action/setSdcName");
        let body = ChangeSdcNameParam {
            sdc_name: name.to_owned(),
        };
        let info = self.client.post(&path, &body).await?;
        Ok(Sdc::new(self.client.clone(), info))
    }

    pub async fn find_sdc(&self, lookup: &SdcLookup) -> Result<Sdc, ScaleioError> {
        let _timer = TimeSpent::start("FindSdc");
        self.get_sdcs()
            .await?
            .into_iter()
            .find(|s| lookup.matches(s))
            .map(|info| Sdc::new(self.client.clone(), info))
            .ok_or_else(|| ScaleioError::NotFound(format!("SDC {lookup:?}")))
    }

    /// The REST view of the SDC running on this host, found through the
    /// GUID the local driver reports.
    pub async fn find_local_sdc(&self, device: &DeviceChannel) -> Result<Sdc, ScaleioError> {
        let device = device.clone();
        let guid = tokio::task::spawn_blocking(move || device.query_local_guid())
            .await
            .map_err(ScaleioError::device)??;
        self.find_sdc(&SdcLookup::Guid(guid)).await
    }
}
