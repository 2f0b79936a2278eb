pub mod executor;
pub mod icmp;
pub mod parser;
pub mod platform;
pub mod pool;
pub mod result;
pub mod service;
pub mod target;
pub mod tcp;

pub mod prelude {
    pub use super::executor::{ProbeExecutor, ProbeMethod};
    pub use super::platform::Platform;
    pub use super::pool::WorkerPool;
    pub use super::result::{FailureKind, ProbeResult};
    pub use super::service::{ProbeHandle, ProbeService};
    pub use super::target::{ProbeConfig, ValidationError};
}
