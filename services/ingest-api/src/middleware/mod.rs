// Request context middleware
pub mod request_context;

pub use request_context::{request_context_middleware, ReqContext, RequestContext, X_REQUEST_ID};
