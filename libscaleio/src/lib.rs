//! # libscaleio: client library for a ScaleIO / PowerFlex block-storage cluster
//!
//! Two independent halves:
//!
//! * an authenticated REST client for the cluster gateway, which negotiates
//!   the API version, attaches the session token to every call, and on a
//!   `401` logs in again and replays the request once;
//! * a local channel to the SDC kernel driver (`/dev/scini`) answering three
//!   fixed binary queries.
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`client`] | [`Client`]: login, version negotiation, authenticated dispatch. |
//! | [`session`] | [`SessionState`]: credentials, token, negotiated headers. |
//! | [`transport`] | [`HttpTransport`] trait and the `reqwest` implementation. |
//! | [`config`] | [`ClientOptions`] and environment loading. |
//! | [`error`] | [`ScaleioError`] and the server's [`ApiError`] body. |
//! | [`types`] | Data model for REST resources and request bodies. |
//! | [`telemetry`] | Optional per-operation timing hook. |
//! | [`drv_cfg`] | SDC driver ioctl codec and [`DeviceChannel`]. |
//! | [`system`], [`sdc`], [`volume`], [`protection_domain`], [`user`] | Thin resource facades. |

pub mod client;
pub mod config;
pub mod drv_cfg;
pub mod error;
pub mod protection_domain;
pub mod sdc;
pub mod session;
pub mod system;
pub mod telemetry;
pub mod transport;
pub mod types;
pub mod user;
pub mod volume;

pub use client::Client;
pub use config::ClientOptions;
pub use drv_cfg::{ConfiguredCluster, DeviceChannel};
pub use error::{ApiError, ScaleioError};
pub use protection_domain::{ProtectionDomain, ProtectionDomainLookup};
pub use sdc::{Sdc, SdcLookup};
pub use session::{ConnectionConfig, SessionState, SessionToken};
pub use system::System;
pub use transport::{HttpRequest, HttpResponse, HttpTransport};
pub use types::HeaderContributor;
pub use volume::Volume;
