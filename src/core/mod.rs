//! The execution governor and its supporting types.

mod config;
mod context;
mod governor;
mod result;
mod runner;
mod stream;

pub use config::ExecConfig;
pub use context::{ExecStatus, ExecutionContext, FaultRecord};
pub use governor::{Governor, RunRequest};
pub use result::ExecutionReport;
pub use stream::{ExecutionStream, StreamItem};
