pub mod error;
pub mod requests;
pub mod responses;


pub use error::{PoolError, Result, RetryAction, TransportError, TransportErrorKind};
pub use requests::{MethodName, Request, RequestId, RpcArgs};
pub use responses::{Response, RpcResult, WireError};
