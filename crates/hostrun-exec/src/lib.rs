//! hostrun-exec: Remote execution channels
//!
//! Provides the channel provider traits plus SSH and local implementations used to run
//! commands and upload files on a single host.

pub mod error;
pub mod keys;
pub mod local;
pub mod result;
pub mod ssh;
pub mod traits;

pub use error::ExecError;
pub use keys::{CredentialContext, KeyError};
pub use local::LocalProvider;
pub use result::{CommandResult, ConnectionInfo};
pub use ssh::SshProvider;
pub use traits::{ChannelProvider, RemoteChannel};
