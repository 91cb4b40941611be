//! Byte-level codec for the SDC driver's ioctl ABI.
//!
//! Every query hands the driver a fixed-size buffer which it fills in place.
//! All integers are in native byte order.  Offsets below are the driver's,
//! written out explicitly instead of relying on `repr(C)` padding.
//!
//! # GUID buffer (`GUID_BUF_LEN` = 32)
//!
//! ```text
//! 0..8    return code (byte 0 significant)
//! 8..24   raw 16-byte SDC GUID
//! 24..28  net id magic   (unused)
//! 28..32  net id time    (unused)
//! ```
//!
//! # Cluster list buffer (`CLUSTER_BUF_LEN` = 16 + 20 * 424)
//!
//! ```text
//! 0..8    return code
//! 8..10   record count, u16 (capacity on input, filled count on output)
//! 10..14  filler
//! 14..16  alignment padding
//! 16..    CLUSTER_CAPACITY records of CLUSTER_RECORD_LEN bytes
//! ```
//!
//! Each record:
//!
//! ```text
//! 0..4     filler
//! 4..8     MDM id, low half      8..12   MDM id, high half
//! 12..16   SDC id, low half      16..20  SDC id, high half
//! 20..24   install id, low half  24..28  install id, high half
//! 28..32   alignment padding
//! 32..40   socket address count, u64
//! 40..424  16 opaque 24-byte socket addresses
//! ```
//!
//! # Rescan buffer (`RESCAN_BUF_LEN` = 8)
//!
//! A single native-endian `i64`, whose low byte doubles as the return code.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ScaleioError;

// ---------------------------------------------------------------------------
// Op-codes
// ---------------------------------------------------------------------------

/// `_IOC` direction "none".
pub const IOC_NONE: u32 = 0;
/// Device class byte of the SDC driver.
pub const IOCTL_CLASS: u8 = b'a';

pub const CMD_RESCAN: u8 = 10;
pub const CMD_QUERY_MDMS: u8 = 12;
pub const CMD_QUERY_GUID: u8 = 14;

/// Pack an op-code as `(direction << 30) | (size << 16) | (class << 8) | command`.
pub const fn op_code(direction: u32, class: u8, command: u8, size: u32) -> u32 {
    (direction << 30) | (size << 16) | ((class as u32) << 8) | command as u32
}

/// Op-code with no direction and no size, the only form the driver uses.
pub const fn io(class: u8, command: u8) -> u32 {
    op_code(IOC_NONE, class, command, 0)
}

pub const QUERY_GUID_OP: u32 = io(IOCTL_CLASS, CMD_QUERY_GUID);
pub const QUERY_MDMS_OP: u32 = io(IOCTL_CLASS, CMD_QUERY_MDMS);
pub const RESCAN_OP: u32 = io(IOCTL_CLASS, CMD_RESCAN);

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Value of return-code byte 0 on success (`'A'`).
pub const RC_SUCCESS: u8 = 65;
pub const RC_LEN: usize = 8;

pub const GUID_OFFSET: usize = 8;
pub const GUID_LEN: usize = 16;
pub const GUID_BUF_LEN: usize = 32;

pub const COUNT_OFFSET: usize = 8;
pub const CLUSTER_HEADER_LEN: usize = 16;
/// Maximum number of clusters the driver can report in one query.
pub const CLUSTER_CAPACITY: usize = 20;
pub const SOCKET_ADDR_LEN: usize = 24;
pub const SOCKET_ADDR_SLOTS: usize = 16;
pub const CLUSTER_RECORD_LEN: usize = 40 + SOCKET_ADDR_SLOTS * SOCKET_ADDR_LEN;
pub const CLUSTER_BUF_LEN: usize = CLUSTER_HEADER_LEN + CLUSTER_CAPACITY * CLUSTER_RECORD_LEN;

pub const RESCAN_BUF_LEN: usize = 8;

const MDM_ID_LOW: usize = 4;
const MDM_ID_HIGH: usize = 8;
const SDC_ID_LOW: usize = 12;
const SDC_ID_HIGH: usize = 16;
const INSTALL_ID_LOW: usize = 20;
const INSTALL_ID_HIGH: usize = 24;
const NUM_SOCK_ADDRS: usize = 32;

// ---------------------------------------------------------------------------
// Queries and results
// ---------------------------------------------------------------------------

/// The three queries the driver answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceQuery {
    Guid,
    Clusters,
    Rescan,
}

impl DeviceQuery {
    pub const fn op_code(self) -> u32 {
        match self {
            Self::Guid => QUERY_GUID_OP,
            Self::Clusters => QUERY_MDMS_OP,
            Self::Rescan => RESCAN_OP,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Guid => "QueryGUID",
            Self::Clusters => "QuerySystems",
            Self::Rescan => "QueryRescan",
        }
    }

    /// Zeroed request buffer, with any input fields already set.
    pub fn request_buffer(self) -> Vec<u8> {
        match self {
            Self::Guid => vec![0; GUID_BUF_LEN],
            Self::Clusters => {
                let mut buf = vec![0; CLUSTER_BUF_LEN];
                put_u16(&mut buf, COUNT_OFFSET, CLUSTER_CAPACITY as u16);
                buf
            }
            Self::Rescan => vec![0; RESCAN_BUF_LEN],
        }
    }

    /// Validate the return code in `buf`, then decode the payload.
    pub fn decode(self, buf: &[u8]) -> Result<DeviceQueryResult, ScaleioError> {
        match self {
            Self::Guid => decode_guid(buf).map(DeviceQueryResult::Guid),
            Self::Clusters => decode_clusters(buf).map(DeviceQueryResult::Clusters),
            Self::Rescan => decode_rescan(buf).map(DeviceQueryResult::Rescan),
        }
    }
}

/// Decoded answer to a [`DeviceQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceQueryResult {
    /// Upper-case canonical GUID of the local SDC.
    Guid(String),
    /// Raw rescan result code, in decimal.
    Rescan(String),
    Clusters(Vec<ConfiguredCluster>),
}

/// One MDM cluster the local SDC is configured against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfiguredCluster {
    /// MDM cluster system id, 16 hex digits.
    pub system_id: String,
    /// Id of this SDC as known to that cluster.
    pub sdc_id: String,
}

/// Return-code byte extracted from a driver buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnCode(pub u8);

impl ReturnCode {
    pub fn read(buf: &[u8]) -> Result<Self, ScaleioError> {
        buf.first().copied().map(Self).ok_or_else(|| {
            ScaleioError::ProtocolViolation("empty driver buffer".into())
        })
    }

    pub fn is_success(self) -> bool {
        self.0 == RC_SUCCESS
    }

    /// Fail unless this is the success sentinel.
    pub fn check(self, query: DeviceQuery) -> Result<(), ScaleioError> {
        if self.is_success() {
            Ok(())
        } else {
            Err(ScaleioError::ProtocolViolation(format!(
                "{} failed, RC={}",
                query.name(),
                self.0
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Decoders
// ---------------------------------------------------------------------------

fn expect_len(buf: &[u8], len: usize, query: DeviceQuery) -> Result<(), ScaleioError> {
    if buf.len() == len {
        Ok(())
    } else {
        Err(ScaleioError::ProtocolViolation(format!(
            "{} buffer is {} bytes, expected {len}",
            query.name(),
            buf.len()
        )))
    }
}

pub fn decode_guid(buf: &[u8]) -> Result<String, ScaleioError> {
    expect_len(buf, GUID_BUF_LEN, DeviceQuery::Guid)?;
    ReturnCode::read(buf)?.check(DeviceQuery::Guid)?;

    let raw = &buf[GUID_OFFSET..GUID_OFFSET + GUID_LEN];
    let guid = Uuid::from_slice(raw).map_err(|e| ScaleioError::ProtocolViolation(e.to_string()))?;
    Ok(guid.hyphenated().to_string().to_uppercase())
}

pub fn decode_clusters(buf: &[u8]) -> Result<Vec<ConfiguredCluster>, ScaleioError> {
    expect_len(buf, CLUSTER_BUF_LEN, DeviceQuery::Clusters)?;
    ReturnCode::read(buf)?.check(DeviceQuery::Clusters)?;

    let count = get_u16(buf, COUNT_OFFSET) as usize;
    if count > CLUSTER_CAPACITY {
        return Err(ScaleioError::ProtocolViolation(format!(
            "driver reported {count} clusters, capacity is {CLUSTER_CAPACITY}"
        )));
    }

    Ok((0..count)
        .map(|i| {
            let start = CLUSTER_HEADER_LEN + i * CLUSTER_RECORD_LEN;
            ConfiguredCluster::from(ClusterRecord::read(&buf[start..start + CLUSTER_RECORD_LEN]))
        })
        .collect())
}

pub fn decode_rescan(buf: &[u8]) -> Result<String, ScaleioError> {
    expect_len(buf, RESCAN_BUF_LEN, DeviceQuery::Rescan)?;
    ReturnCode::read(buf)?.check(DeviceQuery::Rescan)?;
    Ok(get_i64(buf, 0).to_string())
}

// ---------------------------------------------------------------------------
// Cluster record
// ---------------------------------------------------------------------------

/// Numeric view of one cluster record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterRecord {
    pub mdm_id: u64,
    pub sdc_id: u64,
    pub install_id: u64,
    pub num_sock_addrs: u64,
}

impl ClusterRecord {
    /// Read from a `CLUSTER_RECORD_LEN` slice.
    pub fn read(rec: &[u8]) -> Self {
        let join = |high: usize, low: usize| {
            (u64::from(get_u32(rec, high)) << 32) | u64::from(get_u32(rec, low))
        };
        Self {
            mdm_id: join(MDM_ID_HIGH, MDM_ID_LOW),
            sdc_id: join(SDC_ID_HIGH, SDC_ID_LOW),
            install_id: join(INSTALL_ID_HIGH, INSTALL_ID_LOW),
            num_sock_addrs: get_u64(rec, NUM_SOCK_ADDRS),
        }
    }

    /// Write into a `CLUSTER_RECORD_LEN` slice, the way the driver fills it.
    pub fn write(&self, rec: &mut [u8]) {
        let split = |v: u64| ((v >> 32) as u32, v as u32);
        let (h, l) = split(self.mdm_id);
        put_u32(rec, MDM_ID_HIGH, h);
        put_u32(rec, MDM_ID_LOW, l);
        let (h, l) = split(self.sdc_id);
        put_u32(rec, SDC_ID_HIGH, h);
        put_u32(rec, SDC_ID_LOW, l);
        let (h, l) = split(self.install_id);
        put_u32(rec, INSTALL_ID_HIGH, h);
        put_u32(rec, INSTALL_ID_LOW, l);
        rec[NUM_SOCK_ADDRS..NUM_SOCK_ADDRS + 8]
            .copy_from_slice(&self.num_sock_addrs.to_ne_bytes());
    }
}

impl From<ClusterRecord> for ConfiguredCluster {
    fn from(r: ClusterRecord) -> Self {
        // Ids are opaque hex, high half first, not UUIDs.
        let hex = |v: u64| format!("{:08x}{:08x}", (v >> 32) as u32, v as u32);
        Self {
            system_id: hex(r.mdm_id),
            sdc_id: hex(r.sdc_id),
        }
    }
}

// ---------------------------------------------------------------------------
// Native-endian field access. Callers have already checked buffer lengths.
// ---------------------------------------------------------------------------

fn get_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_ne_bytes([buf[at], buf[at + 1]])
}

fn get_u32(buf: &[u8], at: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[at..at + 4]);
    u32::from_ne_bytes(b)
}

fn get_u64(buf: &[u8], at: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[at..at + 8]);
    u64::from_ne_bytes(b)
}

fn get_i64(buf: &[u8], at: usize) -> i64 {
    get_u64(buf, at) as i64
}

pub(crate) fn put_u16(buf: &mut [u8], at: usize, v: u16) {
    buf[at..at + 2].copy_from_slice(&v.to_ne_bytes());
}

fn put_u32(buf: &mut [u8], at: usize, v: u32) {
    buf[at..at + 4].copy_from_slice(&v.to_ne_bytes());
}
