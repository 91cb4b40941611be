//! User listing.

use crate::error::ScaleioError;
use crate::system::System;
use crate::telemetry::TimeSpent;
use crate::types::User;

impl System {
    /// Users defined on this system.
    pub async fn get_users(&self) -> Result<Vec<User>, ScaleioError> {
        let _timer = TimeSpent::start("GetUser");
        let path = format!("/api/instances/System::{}/relationships/User", self.info.id);
        self.client.get(&path).await
    }
}
