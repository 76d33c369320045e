//! Background episode updates.
//!
//! [`UpdateJob`] does one pass of "refresh every subscription, announce what
//! is new". [`SchedulingHost`] decides when passes happen: periodically,
//! one registration per key, gated on [`Constraints`] read from a
//! [`DeviceState`].

mod constraints;
mod host;
mod job;
mod notify;

pub use constraints::{AlwaysReady, Constraints, DeviceState, SystemDeviceState};
pub use host::{HostError, PeriodicRequest, SchedulingHost};
pub use job::{PeriodicJob, UpdateJob, UPDATE_JOB_KEY};
pub use notify::{ChannelNotifier, LogNotifier, Notification, Notifier};
