#![forbid(unsafe_code)]
#![warn(clippy::all)]

mod error;
mod failure;
mod status;
mod wire;

pub use error::{SysmError, SysmResult};
pub use failure::{io_error_code, BackendFailure, FailureKind};
pub use status::{BackendId, StatusError, StatusRecord, STATUS_CONNECTED, STATUS_NOT_CONNECTED};
pub use wire::{AggregatedPayload, RelayEnvelope, ServerMessage, ServiceEntry};
