//! Test utilities: in-memory routers, a scripted ssh remote and test application builders.

use async_trait::async_trait;
use axum_test::TestServer;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

use crate::capability::CapabilityRule;
use crate::config::Config;
use crate::device::{DeviceConnector, DeviceSession};
use crate::errors::{Error, Result};
use crate::query::{IDENTITY_COMMAND, LEASE_COMMAND, NETWATCH_COMMAND, ROUTERBOARD_COMMAND};
use crate::remote::{RemoteChannel, RemoteExec};
use crate::types::{CapabilityName, Record};
use crate::{Application, BackgroundServices};

pub const TEST_ROUTER_HOST: &str = "192.168.100.1";
pub const TEST_EXPORT: &str = "# oct/16/2026 10:00:00 by RouterOS 6.44.5\n/system identity\nset name=TRS01\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFailure {
    /// Login rejected
    Auth,
    /// Connection refused
    Unreachable,
    /// Every command is rejected with a trap
    Command,
}

/// A router that answers each command with canned rows. Unknown commands return no rows.
#[derive(Clone, Default)]
pub struct StaticDevice {
    rows: HashMap<String, Vec<Record>>,
    failure: Option<DeviceFailure>,
    failing_commands: Vec<String>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl StaticDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, command: &str, rows: Vec<Value>) -> Self {
        let records = rows
            .into_iter()
            .map(|row| match row {
                Value::Object(record) => record,
                other => panic!("test rows must be objects, got {other}"),
            })
            .collect();
        self.rows.insert(command.to_string(), records);
        self
    }

    pub fn failing(mut self, failure: DeviceFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn failing_command(mut self, command: &str) -> Self {
        self.failing_commands.push(command.to_string());
        self
    }

    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceConnector for StaticDevice {
    async fn open(&self, host: &str) -> Result<Box<dyn DeviceSession>> {
        match self.failure {
            Some(DeviceFailure::Auth) => {
                return Err(Error::AuthenticationFailed { host: host.to_string() });
            }
            Some(DeviceFailure::Unreachable) => {
                return Err(Error::DeviceUnreachable {
                    host: host.to_string(),
                    reason: "connection refused".to_string(),
                });
            }
            _ => {}
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StaticSession {
            host: host.to_string(),
            device: self.clone(),
        }))
    }
}

struct StaticSession {
    host: String,
    device: StaticDevice,
}

#[async_trait]
impl DeviceSession for StaticSession {
    async fn run(&mut self, command: &str) -> Result<Vec<Record>> {
        let fails = self.device.failure == Some(DeviceFailure::Command)
            || self.device.failing_commands.iter().any(|c| c == command);
        if fails {
            return Err(Error::CommandFailed {
                host: self.host.clone(),
                command: command.to_string(),
                message: "no such command prefix".to_string(),
            });
        }
        Ok(self.device.rows.get(command).cloned().unwrap_or_default())
    }

    async fn close(&mut self) {
        self.device.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteFailure {
    Unreachable,
    Command,
}

/// An ssh remote whose every command prints the same export.
#[derive(Clone)]
pub struct ScriptedRemote {
    output: String,
    delay: Duration,
    failure: Option<RemoteFailure>,
    execs: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedRemote {
    pub fn new(output: &str) -> Self {
        Self {
            output: output.to_string(),
            delay: Duration::ZERO,
            failure: None,
            execs: Arc::default(),
            in_flight: Arc::default(),
            max_in_flight: Arc::default(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, failure: RemoteFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Commands that started executing.
    pub fn execs(&self) -> usize {
        self.execs.load(Ordering::SeqCst)
    }

    /// Highest number of commands that ran at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteExec for ScriptedRemote {
    async fn connect(&self, host: &str, _port: u16) -> Result<Box<dyn RemoteChannel>> {
        if self.failure == Some(RemoteFailure::Unreachable) {
            return Err(Error::DeviceUnreachable {
                host: host.to_string(),
                reason: "connection timed out".to_string(),
            });
        }
        Ok(Box::new(ScriptedChannel {
            host: host.to_string(),
            remote: self.clone(),
        }))
    }
}

struct ScriptedChannel {
    host: String,
    remote: ScriptedRemote,
}

#[async_trait]
impl RemoteChannel for ScriptedChannel {
    async fn exec(&mut self, command: &str) -> Result<Vec<u8>> {
        let remote = &self.remote;
        remote.execs.fetch_add(1, Ordering::SeqCst);
        let running = remote.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        remote.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if !remote.delay.is_zero() {
            tokio::time::sleep(remote.delay).await;
        }
        remote.in_flight.fetch_sub(1, Ordering::SeqCst);

        if remote.failure == Some(RemoteFailure::Command) {
            return Err(Error::CommandFailed {
                host: self.host.clone(),
                command: command.to_string(),
                message: "bad command name export".to_string(),
            });
        }
        Ok(remote.output.clone().into_bytes())
    }
}

pub fn sample_rules() -> Vec<CapabilityRule> {
    vec![
        CapabilityRule {
            name: CapabilityName::Tce,
            base_ip: "192.168.100".to_string(),
            start_octet: 50,
            end_octet: 70,
            base_mac: "93:FB".to_string(),
        },
        CapabilityRule {
            name: CapabilityName::Pwr,
            base_ip: "192.168.100".to_string(),
            start_octet: 80,
            end_octet: 90,
            base_mac: "00:0C".to_string(),
        },
    ]
}

/// A healthy TRS01 router with one lease of every interesting kind.
pub fn standard_device() -> StaticDevice {
    StaticDevice::new()
        .with_rows(IDENTITY_COMMAND, vec![json!({"name": "TRS01"})])
        .with_rows(
            ROUTERBOARD_COMMAND,
            vec![json!({
                ".id": "*0",
                "routerboard": true,
                "model": "RB750Gr3",
                "factory-firmware": "6.40.1",
                "current-firmware": "6.44.5",
                "upgrade-firmware": "6.44.5",
            })],
        )
        .with_rows(
            LEASE_COMMAND,
            vec![
                json!({
                    ".id": "*1",
                    "address": "192.168.100.61",
                    "mac-address": "E4:8D:8C:00:00:01",
                    "status": "bound",
                    "disabled": false,
                    "comment": "TCE 1",
                    "last-seen": "2m10s",
                }),
                // factory-default unit
                json!({
                    ".id": "*2",
                    "address": "192.168.100.62",
                    "mac-address": "93:FB:E5:3D:0E:BF",
                    "status": "bound",
                    "disabled": false,
                }),
                json!({
                    ".id": "*3",
                    "address": "192.168.100.81",
                    "mac-address": "00:1A:2B:3C:4D:5E",
                    "status": "waiting",
                    "disabled": false,
                }),
                json!({
                    ".id": "*4",
                    "address": "192.168.100.63",
                    "mac-address": "E4:8D:8C:00:00:03",
                    "status": "bound",
                    "disabled": true,
                }),
                json!({
                    ".id": "*5",
                    "mac-address": "E4:8D:8C:00:00:04",
                    "status": "waiting",
                    "disabled": false,
                }),
            ],
        )
        .with_rows(
            NETWATCH_COMMAND,
            vec![
                json!({"host": "8.8.8.8", "status": "up", "since": "oct/16/2026 09:00:00", "comment": "uplink"}),
                json!({"host": "10.0.0.254", "status": "down", "since": "oct/16/2026 09:30:00"}),
            ],
        )
}

pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.router.host = TEST_ROUTER_HOST.to_string();
    config.router.password = Some("test".to_string());
    config.capabilities = sample_rules();
    config
}

pub struct TestApp {
    pub server: TestServer,
    pub bg_services: BackgroundServices,
    pub device: StaticDevice,
    pub remote: ScriptedRemote,
    pub backup_dir: TempDir,
}

pub async fn create_test_app(device: StaticDevice) -> TestApp {
    create_test_app_with(device, ScriptedRemote::new(TEST_EXPORT), create_test_config()).await
}

pub async fn create_test_app_with(device: StaticDevice, remote: ScriptedRemote, mut config: Config) -> TestApp {
    let backup_dir = TempDir::new().expect("Failed to create backup directory");
    config.backup.path = backup_dir.path().to_path_buf();

    let app = Application::with_transports(config, Arc::new(device.clone()), Arc::new(remote.clone()))
        .await
        .expect("Failed to create application");
    let (server, bg_services) = app.into_test_server();

    TestApp {
        server,
        bg_services,
        device,
        remote,
        backup_dir,
    }
}
