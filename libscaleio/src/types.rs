//! REST data model: cluster objects, request parameters, and links.
//!
//! Field names follow the gateway's camelCase JSON.  Unknown fields are
//! ignored on decode, so only the attributes the facades use are modelled.

use std::collections::HashMap;

use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::error::ScaleioError;

// ---------------------------------------------------------------------------
// Header contribution
// ---------------------------------------------------------------------------

/// Request bodies that need extra HTTP headers beyond `Accept`/`Content-Type`.
///
/// The default contributes nothing, so plain parameter types only need an
/// empty `impl`.
pub trait HeaderContributor {
    fn extra_headers(&self) -> Vec<(HeaderName, HeaderValue)> {
        Vec::new()
    }
}

impl HeaderContributor for serde_json::Value {}

/// Wraps a body together with headers it must travel with.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct WithHeaders<B> {
    body: B,
    #[serde(skip)]
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl<B> WithHeaders<B> {
    pub fn new(body: B) -> Self {
        Self {
            body,
            headers: Vec::new(),
        }
    }

    /// Attach a header. Names and values are validated here rather than at
    /// send time.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, ScaleioError> {
        let name = HeaderName::try_from(name)
            .map_err(|e| ScaleioError::InvalidArgument(format!("header name {name:?}: {e}")))?;
        let value = HeaderValue::try_from(value)
            .map_err(|e| ScaleioError::InvalidArgument(format!("header value for {name}: {e}")))?;
        self.headers.push((name, value));
        Ok(self)
    }
}

impl<B> HeaderContributor for WithHeaders<B> {
    fn extra_headers(&self) -> Vec<(HeaderName, HeaderValue)> {
        self.headers.clone()
    }
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// Hypermedia link attached to most gateway objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
}

/// Relationship names used with [`crate::sdc::sdc_link`].
pub const REL_SDC_STATISTICS: &str = "/api/Sdc/relationship/Statistics";
pub const REL_SDC_VOLUME: &str = "/api/Sdc/relationship/Volume";
pub const REL_SYSTEM_PROTECTION_DOMAIN: &str = "/api/System/relationship/ProtectionDomain";
pub const REL_SELF: &str = "self";

/// Find the link with relation `rel`.
pub fn get_link<'a>(links: &'a [Link], rel: &str) -> Result<&'a Link, ScaleioError> {
    links
        .iter()
        .find(|l| l.rel == rel)
        .ok_or_else(|| ScaleioError::NotFound(format!("link {rel:?}")))
}

// ---------------------------------------------------------------------------
// Cluster objects
// ---------------------------------------------------------------------------

/// A storage system (one MDM cluster).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemInfo {
    pub id: String,
    pub name: String,
    pub system_version_name: String,
    pub install_id: String,
    pub links: Vec<Link>,
}

/// A Storage Data Client as known to the cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SdcInfo {
    pub id: String,
    pub name: String,
    pub sdc_ip: String,
    pub sdc_guid: String,
    pub sdc_approved: bool,
    pub mdm_connection_state: String,
    pub system_id: String,
    pub links: Vec<Link>,
}

/// Counters reported by `/relationships/Statistics`; kept as raw JSON since
/// the set of counters differs between gateway versions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SdcStatistics {
    #[serde(flatten)]
    pub counters: HashMap<String, serde_json::Value>,
}

impl SdcStatistics {
    pub fn counter(&self, name: &str) -> Option<u64> {
        self.counters.get(name).and_then(serde_json::Value::as_u64)
    }
}

/// Per-SDC mapping of a volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MappedSdcInfo {
    pub sdc_id: String,
    pub sdc_ip: String,
    pub limit_iops: u64,
    pub limit_bw_in_mbps: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VolumeInfo {
    pub id: String,
    pub name: String,
    pub size_in_kb: u64,
    pub volume_type: String,
    pub storage_pool_id: String,
    pub mapped_sdc_info: Vec<MappedSdcInfo>,
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProtectionDomainInfo {
    pub id: String,
    pub name: String,
    pub system_id: String,
    pub protection_domain_state: String,
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    pub id: String,
    pub name: String,
    pub user_role: String,
    pub system_id: String,
    pub links: Vec<Link>,
}

// ---------------------------------------------------------------------------
// Request parameters
// ---------------------------------------------------------------------------

/// `{}` body for actions that take no arguments.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EmptyPayload {}

impl HeaderContributor for EmptyPayload {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectionDomainParam {
    pub name: String,
}

impl HeaderContributor for ProtectionDomainParam {}

/// Reply to an object-creating POST.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreatedResp {
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSdcNameParam {
    pub sdc_name: String,
}

impl HeaderContributor for ChangeSdcNameParam {}

/// The gateway expects boolean flags on mapping actions as `"TRUE"`/`"FALSE"`.
fn gateway_bool(b: bool) -> String {
    let flag = if b { "TRUE" } else { "FALSE" };
    flag.to_owned()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapVolumeSdcParam {
    pub sdc_id: String,
    pub allow_multiple_mappings: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub all_sdcs: String,
}

impl MapVolumeSdcParam {
    pub fn new(sdc_id: impl Into<String>, allow_multiple_mappings: bool) -> Self {
        Self {
            sdc_id: sdc_id.into(),
            allow_multiple_mappings: gateway_bool(allow_multiple_mappings),
            all_sdcs: String::new(),
        }
    }
}

impl HeaderContributor for MapVolumeSdcParam {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmapVolumeSdcParam {
    pub sdc_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ignore_scsi_initiators: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub all_sdcs: String,
}

impl UnmapVolumeSdcParam {
    pub fn new(sdc_id: impl Into<String>) -> Self {
        Self {
            sdc_id: sdc_id.into(),
            ignore_scsi_initiators: String::new(),
            all_sdcs: String::new(),
        }
    }
}

impl HeaderContributor for UnmapVolumeSdcParam {}

/// Limits are sent as decimal strings; absent fields leave the current
/// limit untouched.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetMappedSdcLimitsParam {
    pub sdc_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth_limit_in_kbps: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iops_limit: Option<String>,
}

impl HeaderContributor for SetMappedSdcLimitsParam {}
