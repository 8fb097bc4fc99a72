//! @ai:module:intent Resilient request layer for AI image, text and speech providers
//! @ai:module:layer application
//! @ai:module:public_api config, error, providers, queue, request

pub mod config;
pub mod error;
pub mod providers;
pub mod queue;
pub mod request;

pub use config::AigenConfig;
pub use error::{ClassifiedError, ErrorDetails, ErrorKind, Result};
pub use providers::{Capability, ProviderClient, ProviderKind};
pub use queue::{DispatchMode, Scheduler, SchedulerConfig, SubmitHandle};
pub use request::{CallConfig, ExecuteOptions, RequestExecutor, ResponseBody, RetryPolicy};
