mod backend;
mod cancellation;
mod core;
mod reporter;
mod stats;
mod subscription;
mod types;

pub use backend::{Link, Probe, ProbeReport};
pub use cancellation::{stop_pair, StopHandle, StopToken};
pub use self::core::ConnectionSupervisor;
pub use stats::SupervisorStats;
pub use subscription::Subscription;
pub use types::*;

#[cfg(test)]
mod tests;
