//! Protection domain facade.

use tracing::info;

use crate::client::Client;
use crate::error::ScaleioError;
use crate::system::System;
use crate::telemetry::TimeSpent;
use crate::types::{
    CreatedResp, EmptyPayload, ProtectionDomainInfo, ProtectionDomainParam,
    REL_SYSTEM_PROTECTION_DOMAIN, REL_SELF, get_link,
};

pub const PROTECTION_DOMAIN_INSTANCES_PATH: &str = "/api/types/ProtectionDomain/instances";

/// A protection domain together with the client used to reach it.
#[derive(Debug, Clone)]
pub struct ProtectionDomain {
    client: Client,
    pub info: ProtectionDomainInfo,
}

impl ProtectionDomain {
    pub fn new(client: Client, info: ProtectionDomainInfo) -> Self {
        Self { client, info }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Key used by [`System::find_protection_domain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtectionDomainLookup {
    Id(String),
    Name(String),
    /// Fetch the object at this href directly; whatever it returns matches.
    Href(String),
}

impl System {
    /// Create a protection domain and return its id.
    pub async fn create_protection_domain(&self, name: &str) -> Result<String, ScaleioError> {
        let _timer = TimeSpent::start("CreateProtectionDomain");
        let body = ProtectionDomainParam {
            name: name.to_owned(),
        };
        let created: CreatedResp = self
            .client
            .post(PROTECTION_DOMAIN_INSTANCES_PATH, &body)
            .await?;
        info!(name, id = %created.id, "protection domain created");
        Ok(created.id)
    }

    /// Delete the protection domain called `name`.
    pub async fn delete_protection_domain(&self, name: &str) -> Result<(), ScaleioError> {
        let _timer = TimeSpent::start("DeleteProtectionDomain");
        let domain = self
            .find_protection_domain(&ProtectionDomainLookup::Name(name.to_owned()))
            .await?;
        let link = get_link(&domain.info.links, REL_SELF)?;
        let path = format!("{}/action/removeProtectionDomain", link.href);
        self.client.post::<_, ()>(&path, &EmptyPayload {}).await?;
        info!(name, "protection domain deleted");
        Ok(())
    }

    /// List protection domains of this system, or fetch the single one at
    /// `href`.
    pub async fn get_protection_domains(
        &self,
        href: Option<&str>,
    ) -> Result<Vec<ProtectionDomainInfo>, ScaleioError> {
        let _timer = TimeSpent::start("GetProtectionDomain");
        match href {
            Some(href) => Ok(vec![self.client.get(href).await?]),
            None => {
                let link = get_link(&self.info.links, REL_SYSTEM_PROTECTION_DOMAIN)?;
                self.client.get(&link.href).await
            }
        }
    }

    pub async fn find_protection_domain(
        &self,
        lookup: &ProtectionDomainLookup,
    ) -> Result<ProtectionDomain, ScaleioError> {
        let _timer = TimeSpent::start("FindProtectionDomain");
        let href = match lookup {
            ProtectionDomainLookup::Href(h) => Some(h.as_str()),
            _ => None,
        };
        self.get_protection_domains(href)
            .await?
            .into_iter()
            .find(|pd| match lookup {
                ProtectionDomainLookup::Id(id) => pd.id == *id,
                ProtectionDomainLookup::Name(name) => pd.name == *name,
                ProtectionDomainLookup::Href(_) => true,
            })
            .map(|info| ProtectionDomain::new(self.client.clone(), info))
            .ok_or_else(|| ScaleioError::NotFound(format!("protection domain {lookup:?}")))
    }
}
