//! Remote execution through the system `ssh` client.
//!
//! Host keys are accepted on first use and verified afterwards. Authentication is key based
//! (`BatchMode=yes`), either through the agent or the configured identity file.

use async_trait::async_trait;
use std::{path::PathBuf, process::Stdio, time::Duration};
use tokio::{net::TcpStream, process::Command, time::timeout};
use tracing::{debug, instrument};

use super::{RemoteChannel, RemoteExec};
use crate::config::RouterConfig;
use crate::errors::{Error, Result};

/// Exit status `ssh` reserves for its own failures (connection, authentication).
const SSH_FAILURE_STATUS: i32 = 255;

#[derive(Debug, Clone)]
pub struct SshExec {
    program: String,
    username: String,
    identity: Option<PathBuf>,
    connect_timeout: Duration,
}

impl SshExec {
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            program: "ssh".to_string(),
            username: config.username.clone(),
            identity: config.ssh_identity.clone(),
            connect_timeout: config.connect_timeout,
        }
    }
}

#[async_trait]
impl RemoteExec for SshExec {
    #[instrument(skip(self), err)]
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn RemoteChannel>> {
        let unreachable = |reason: String| Error::DeviceUnreachable {
            host: host.to_string(),
            reason,
        };
        timeout(self.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| unreachable(format!("ssh port {port} did not answer within {:?}", self.connect_timeout)))?
            .map_err(|e| unreachable(e.to_string()))?;

        Ok(Box::new(SshChannel {
            exec: self.clone(),
            host: host.to_string(),
            port,
        }))
    }
}

struct SshChannel {
    exec: SshExec,
    host: String,
    port: u16,
}

impl SshChannel {
    fn args(&self, command: &str) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            self.port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.exec.connect_timeout.as_secs().max(1)),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
        ];
        if let Some(identity) = &self.exec.identity {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args.push(format!("{}@{}", self.exec.username, self.host));
        args.push(command.to_string());
        args
    }
}

fn check_exit(host: &str, command: &str, code: Option<i32>, stderr: &[u8]) -> Result<()> {
    let stderr = String::from_utf8_lossy(stderr).trim().to_string();
    match code {
        Some(0) => Ok(()),
        Some(SSH_FAILURE_STATUS) => Err(Error::DeviceUnreachable {
            host: host.to_string(),
            reason: stderr,
        }),
        code => Err(Error::CommandFailed {
            host: host.to_string(),
            command: command.to_string(),
            message: match code {
                Some(code) => format!("exit status {code}: {stderr}"),
                None => format!("terminated by signal: {stderr}"),
            },
        }),
    }
}

#[async_trait]
impl RemoteChannel for SshChannel {
    #[instrument(skip(self), fields(host = %self.host))]
    async fn exec(&mut self, command: &str) -> Result<Vec<u8>> {
        let output = Command::new(&self.exec.program)
            .args(self.args(command))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Internal {
                operation: format!("spawn {}: {e}", self.exec.program),
            })?;

        check_exit(&self.host, command, output.status.code(), &output.stderr)?;
        debug!("{} returned {} bytes", command, output.stdout.len());
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_config;
    use tokio::net::TcpListener;

    fn channel(identity: Option<PathBuf>) -> SshChannel {
        let mut config = create_test_config().router;
        config.username = "backup".to_string();
        config.ssh_identity = identity;
        SshChannel {
            exec: SshExec::new(&config),
            host: "10.0.0.1".to_string(),
            port: 2222,
        }
    }

    #[test]
    fn test_args_without_identity() {
        let args = channel(None).args("/export compact");
        assert_eq!(args[..2], ["-p", "2222"]);
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(!args.contains(&"-i".to_string()));
        assert_eq!(args[args.len() - 2..], ["backup@10.0.0.1", "/export compact"]);
    }

    #[test]
    fn test_args_with_identity() {
        let args = channel(Some(PathBuf::from("/etc/mtquery/id_ed25519"))).args("/export compact");
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[i + 1], "/etc/mtquery/id_ed25519");
    }

    #[test]
    fn test_exit_status_mapping() {
        assert!(check_exit("r1", "/export", Some(0), b"").is_ok());
        assert!(matches!(
            check_exit("r1", "/export", Some(255), b"Permission denied (publickey)."),
            Err(Error::DeviceUnreachable { .. })
        ));
        match check_exit("r1", "/export", Some(1), b"bad command name") {
            Err(Error::CommandFailed { message, .. }) => assert!(message.contains("bad command name")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let exec = SshExec::new(&create_test_config().router);
        let err = exec.connect("127.0.0.1", port).await.err().unwrap();
        assert!(matches!(err, Error::DeviceUnreachable { .. }));
    }
}
