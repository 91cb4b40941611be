//! Volume mapping actions.

use crate::client::Client;
use crate::error::ScaleioError;
use crate::telemetry::TimeSpent;
use crate::types::{MapVolumeSdcParam, SetMappedSdcLimitsParam, UnmapVolumeSdcParam, VolumeInfo};

/// A volume together with the client used to reach it.
#[derive(Debug, Clone)]
pub struct Volume {
    client: Client,
    pub info: VolumeInfo,
}

impl Volume {
    pub fn new(client: Client, info: VolumeInfo) -> Self {
        Self { client, info }
    }

    fn action_path(&self, action: &str) -> String {
        format!("/api/instances/Volume::{}/action/{action}", self.info.id)
    }

    pub async fn map_sdc(&self, param: &MapVolumeSdcParam) -> Result<(), ScaleioError> {
        let _timer = TimeSpent::start("MapVolumeSdc");
        self.client.post(&self.action_path("addMappedSdc"), param).await
    }

    pub async fn unmap_sdc(&self, param: &UnmapVolumeSdcParam) -> Result<(), ScaleioError> {
        let _timer = TimeSpent::start("UnmapVolumeSdc");
        self.client
            .post(&self.action_path("removeMappedSdc"), param)
            .await
    }

    pub async fn set_mapped_sdc_limits(
        &self,
        param: &SetMappedSdcLimitsParam,
    ) -> Result<(), ScaleioError> {
        let _timer = TimeSpent::start("SetMappedSdcLimits");
        self.client
            .post(&self.action_path("setMappedSdcLimits"), param)
            .await
    }
}
