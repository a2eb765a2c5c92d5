//! Router management sessions.
//!
//! Queries never reuse a session: [`run_once`] opens one, runs a single command and closes it
//! again, whatever the outcome of the command. [`DeviceConnector`] is the seam between the
//! query layer and the wire; [`routeros::RouterOsConnector`] speaks the RouterOS API and tests
//! substitute an in-memory connector.

pub mod codec;
pub mod routeros;

use async_trait::async_trait;

use crate::errors::Result;
use crate::types::Record;

pub use routeros::RouterOsConnector;

/// Opens authenticated sessions to routers.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    /// Fails with `AuthenticationFailed` or `DeviceUnreachable`.
    async fn open(&self, host: &str) -> Result<Box<dyn DeviceSession>>;
}

/// An open, authenticated session.
#[async_trait]
pub trait DeviceSession: Send {
    /// Run one command and collect every row of the reply.
    async fn run(&mut self, command: &str) -> Result<Vec<Record>>;

    /// Close the session. Never fails; errors while closing are logged and dropped.
    async fn close(&mut self);
}

/// Open a session to `host`, run `command`, and close the session on every path.
pub async fn run_once(connector: &dyn DeviceConnector, host: &str, command: &str) -> Result<Vec<Record>> {
    let mut session = connector.open(host).await?;
    let rows = session.run(command).await;
    session.close().await;
    rows
}
