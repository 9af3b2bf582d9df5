//! Multi-channel alert delivery.
//!
//! - `dispatcher`: one alert to one recipient over push, SMS and email concurrently
//! - `broadcast`: one alert to many recipients in throttled batches
//! - `recorder`: append-only audit of every dispatch
//! - `realtime`: best-effort in-app notices

pub mod alerts;
pub mod broadcast;
pub mod channels;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod inflight;
pub mod realtime;
pub mod recorder;
pub mod render;
pub mod settings;

#[cfg(test)]
pub(crate) mod test_support;

pub use broadcast::{BroadcastReport, BulkBroadcastScheduler};
pub use dispatcher::{AlertDispatcher, DispatchFailure, DispatchOutcome};
pub use error::{ChannelError, NotifierError};
pub use settings::DeliverySettings;
