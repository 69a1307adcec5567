mod api;
mod client;
mod diff;
mod error;
mod logger;
mod protocol;
mod session;
mod types;

pub use client::{AirstageClient, AirstageClientBuilder, PollConfig};
pub use error::{Error, Result};
pub use logger::MessageLogMode;
pub use protocol::{hostname, RequestStatus};
pub use session::{AuthState, Session};
pub use types::*;
