//! Remote command execution, used to export router configuration.

pub mod ssh;

use async_trait::async_trait;

use crate::errors::Result;

pub use ssh::SshExec;

#[async_trait]
pub trait RemoteExec: Send + Sync {
    /// Fails with `DeviceUnreachable` when the host cannot be reached.
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn RemoteChannel>>;
}

#[async_trait]
pub trait RemoteChannel: Send {
    /// Run `command` and return its standard output.
    async fn exec(&mut self, command: &str) -> Result<Vec<u8>>;
}
