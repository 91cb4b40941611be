//! System (MDM cluster) facade and the entry point to the other facades.

use tracing::debug;

use crate::client::Client;
use crate::error::ScaleioError;
use crate::telemetry::TimeSpent;
use crate::types::SystemInfo;

pub const SYSTEM_INSTANCES_PATH: &str = "/api/types/System/instances";

/// A system together with the client used to reach it.
#[derive(Debug, Clone)]
pub struct System {
    pub(crate) client: Client,
    pub info: SystemInfo,
}

impl System {
    pub fn new(client: Client, info: SystemInfo) -> Self {
        Self { client, info }
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl Client {
    /// All systems managed by this gateway.
    pub async fn get_systems(&self) -> Result<Vec<SystemInfo>, ScaleioError> {
        let _timer = TimeSpent::start("GetSystems");
        self.get(SYSTEM_INSTANCES_PATH).await
    }

    /// The system whose id or name equals `id_or_name`.
    pub async fn find_system(&self, id_or_name: &str) -> Result<System, ScaleioError> {
        let _timer = TimeSpent::start("FindSystem");
        let systems = self.get_systems().await?;
        debug!(count = systems.len(), "systems listed");
        systems
            .into_iter()
            .find(|s| s.id == id_or_name || s.name == id_or_name)
            .map(|info| System::new(self.clone(), info))
            .ok_or_else(|| ScaleioError::NotFound(format!("system {id_or_name:?}")))
    }
}
