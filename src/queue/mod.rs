//! @ai:module:intent Serialized, rate-limit aware scheduling of provider calls
//! @ai:module:layer application
//! @ai:module:public_api Scheduler, SchedulerConfig, DispatchMode, SubmitHandle, RateLimitState, WindowPolicy

pub mod rate_limit;
pub mod scheduler;

pub use rate_limit::{RateLimitState, WindowPolicy};
pub use scheduler::{DispatchMode, Scheduler, SchedulerConfig, SubmitHandle};
