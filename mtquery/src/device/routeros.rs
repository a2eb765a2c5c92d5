//! RouterOS API client over plain TCP.

use async_trait::async_trait;
use bytes::BytesMut;
use std::time::Duration;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tracing::{debug, instrument, warn};

use super::codec::{self, Reply};
use super::{DeviceConnector, DeviceSession};
use crate::config::RouterConfig;
use crate::errors::{Error, Result};
use crate::types::Record;

/// Words longer than this are treated as a corrupt stream.
const MAX_WORD_LEN: usize = 16 * 1024 * 1024;

fn unreachable(host: &str, reason: impl ToString) -> Error {
    Error::DeviceUnreachable {
        host: host.to_string(),
        reason: reason.to_string(),
    }
}

/// Connects to the RouterOS API service with the configured credentials.
#[derive(Clone)]
pub struct RouterOsConnector {
    username: String,
    password: String,
    port: u16,
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl RouterOsConnector {
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone().unwrap_or_default(),
            port: config.api_port,
            connect_timeout: config.connect_timeout,
            command_timeout: config.command_timeout,
        }
    }
}

#[async_trait]
impl DeviceConnector for RouterOsConnector {
    #[instrument(skip(self), fields(port = self.port), err)]
    async fn open(&self, host: &str) -> Result<Box<dyn DeviceSession>> {
        let stream = timeout(self.connect_timeout, TcpStream::connect((host, self.port)))
            .await
            .map_err(|_| unreachable(host, format!("connection timed out after {:?}", self.connect_timeout)))?
            .map_err(|e| unreachable(host, e))?;

        let mut session = RouterOsSession {
            host: host.to_string(),
            stream,
            command_timeout: self.command_timeout,
        };

        let login = timeout(self.connect_timeout, session.login(&self.username, &self.password)).await;
        match login {
            Ok(Ok(())) => {
                debug!("Logged in to {}", host);
                Ok(Box::new(session))
            }
            Ok(Err(e)) => {
                session.close().await;
                Err(e)
            }
            Err(_) => {
                session.close().await;
                Err(unreachable(host, "login timed out"))
            }
        }
    }
}

async fn write_sentence<W: AsyncWrite + Unpin>(writer: &mut W, words: &[&str]) -> std::io::Result<()> {
    writer.write_all(&codec::encode_sentence(words)).await?;
    writer.flush().await
}

async fn read_word<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<String> {
    let first = reader.read_u8().await?;
    let size = codec::length_prefix_size(first)
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, format!("control byte {first:#x}")))?;

    let mut prefix = vec![first; size];
    if size > 1 {
        reader.read_exact(&mut prefix[1..]).await?;
    }
    let len = codec::decode_length(&prefix);
    if len > MAX_WORD_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("word of {len} bytes"),
        ));
    }

    let mut word = BytesMut::zeroed(len);
    reader.read_exact(&mut word).await?;
    Ok(String::from_utf8_lossy(&word).into_owned())
}

async fn read_sentence<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Vec<String>> {
    let mut words = Vec::new();
    loop {
        let word = read_word(reader).await?;
        if word.is_empty() {
            return Ok(words);
        }
        words.push(word);
    }
}

struct RouterOsSession {
    host: String,
    stream: TcpStream,
    command_timeout: Duration,
}

impl RouterOsSession {
    async fn next_reply(&mut self) -> Result<Reply> {
        let words = read_sentence(&mut self.stream)
            .await
            .map_err(|e| unreachable(&self.host, e))?;
        codec::parse_reply(&words).map_err(|e| unreachable(&self.host, e))
    }

    async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let name = format!("=name={username}");
        let password = format!("=password={password}");
        write_sentence(&mut self.stream, &["/login", &name, &password])
            .await
            .map_err(|e| unreachable(&self.host, e))?;

        loop {
            match self.next_reply().await? {
                Reply::Done(attrs) if attrs.contains_key("ret") => {
                    // pre-6.43 challenge/response login
                    warn!("{} requested legacy challenge login, which is not supported", self.host);
                    return Err(Error::AuthenticationFailed { host: self.host.clone() });
                }
                Reply::Done(_) => return Ok(()),
                Reply::Trap(message) => {
                    debug!("Login to {} rejected: {}", self.host, message);
                    return Err(Error::AuthenticationFailed { host: self.host.clone() });
                }
                Reply::Fatal(reason) => return Err(unreachable(&self.host, reason)),
                Reply::Row(_) | Reply::Empty => continue,
            }
        }
    }

    async fn collect(&mut self, command: &str) -> Result<Vec<Record>> {
        write_sentence(&mut self.stream, &[command])
            .await
            .map_err(|e| unreachable(&self.host, e))?;

        let mut rows = Vec::new();
        loop {
            match self.next_reply().await? {
                Reply::Row(row) => rows.push(row),
                Reply::Empty => continue,
                Reply::Done(_) => return Ok(rows),
                // the trailing !done is left unread; the session is closed right after
                Reply::Trap(message) => {
                    return Err(Error::CommandFailed {
                        host: self.host.clone(),
                        command: command.to_string(),
                        message,
                    });
                }
                Reply::Fatal(reason) => return Err(unreachable(&self.host, reason)),
            }
        }
    }
}

#[async_trait]
impl DeviceSession for RouterOsSession {
    #[instrument(skip(self), fields(host = %self.host))]
    async fn run(&mut self, command: &str) -> Result<Vec<Record>> {
        match timeout(self.command_timeout, self.collect(command)).await {
            Ok(result) => result,
            Err(_) => Err(Error::CommandFailed {
                host: self.host.clone(),
                command: command.to_string(),
                message: format!("no reply within {:?}", self.command_timeout),
            }),
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("Error closing session to {}: {}", self.host, e);
        }
    }
}
