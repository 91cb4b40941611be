//! Local queries against the SDC kernel driver.
//!
//! [`codec`] describes the driver's fixed binary buffers; [`device`] owns the
//! device node and issues the ioctls.  Nothing here touches the REST API.

pub mod codec;
pub mod device;

pub use codec::{ConfiguredCluster, DeviceQuery, DeviceQueryResult};
pub use device::DeviceChannel;
