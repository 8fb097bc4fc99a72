//! @ai:module:intent Resilient per-call HTTP execution
//! @ai:module:layer infrastructure
//! @ai:module:public_api RequestExecutor, CallConfig, ExecuteOptions, ResponseBody, RetryPolicy, HttpTransport

pub mod backoff;
pub mod classify;
pub mod executor;
pub mod transport;

pub use backoff::RetryPolicy;
pub use classify::MAX_RETRY_AFTER;
pub use executor::{
    Attempt, AttemptOutcome, AuthScheme, CallConfig, ExecuteOptions, RequestExecutor, ResponseBody,
    DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT,
};
pub use transport::{
    FormPart, HttpRequest, HttpResponse, HttpTransport, RequestBody, ReqwestTransport,
    TransportError,
};
