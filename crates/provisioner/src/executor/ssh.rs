//! SSH transport built on libssh2.
//!
//! libssh2 is blocking, so every call runs on the blocking thread pool.
//! Host keys are not verified.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ssh2::{ExtendedData, Session};
use tracing::{debug, warn};

use super::{CommandOutput, RemoteExecutor, RemoteSession};
use crate::config::{Credentials, HostTarget};
use crate::error::ConnectionError;

/// Mode bits for uploaded documents.
const UPLOAD_MODE: i32 = 0o644;

/// Opens SSH sessions with the credentials carried by each [`HostTarget`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SshExecutor;

impl SshExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn connect(&self, target: &HostTarget) -> Result<Box<dyn RemoteSession>, ConnectionError> {
        let target = target.clone();
        let session = tokio::task::spawn_blocking(move || SshSession::open(&target))
            .await
            .map_err(|e| ConnectionError::Task(e.to_string()))??;
        Ok(Box::new(session))
    }
}

/// An authenticated SSH session.
pub struct SshSession {
    host: String,
    session: Arc<Mutex<Session>>,
}

impl SshSession {
    fn open(target: &HostTarget) -> Result<Self, ConnectionError> {
        let addr = format!("{}:{}", target.address, target.port);
        let socket = (target.address.as_str(), target.port)
            .to_socket_addrs()
            .map_err(|e| ConnectionError::Resolve {
                addr: addr.clone(),
                reason: e.to_string(),
            })?
            .next()
            .ok_or_else(|| ConnectionError::Resolve {
                addr: addr.clone(),
                reason: "no addresses".into(),
            })?;

        debug!(host = %target.address, %socket, "Dialing");
        let tcp = TcpStream::connect_timeout(&socket, target.connect_timeout).map_err(|source| {
            ConnectionError::Dial {
                addr: addr.clone(),
                source,
            }
        })?;

        let mut session = Session::new().map_err(|e| ConnectionError::Handshake {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;
        session.set_tcp_stream(tcp);
        session.set_timeout(millis(target.connect_timeout));
        session.handshake().map_err(|e| ConnectionError::Handshake {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;

        let auth = match &target.credentials {
            Credentials::Password(password) => {
                session.userauth_password(&target.username, password)
            }
            Credentials::KeyFile(path) => {
                std::fs::metadata(path).map_err(|source| ConnectionError::KeyFile {
                    path: path.clone(),
                    source,
                })?;
                session.userauth_pubkey_file(&target.username, None, path, None)
            }
        };
        auth.map_err(|e| ConnectionError::Authentication {
            username: target.username.clone(),
            reason: e.to_string(),
        })?;
        if !session.authenticated() {
            return Err(ConnectionError::Authentication {
                username: target.username.clone(),
                reason: "server did not accept credentials".into(),
            });
        }

        // 0 disables the libssh2 timeout
        session.set_timeout(target.command_timeout.map_or(0, millis));

        Ok(Self {
            host: target.address.clone(),
            session: Arc::new(Mutex::new(session)),
        })
    }
}

fn millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

fn run_command(session: &Mutex<Session>, command: &str) -> CommandOutput {
    let session = match session.lock() {
        Ok(guard) => guard,
        Err(_) => return CommandOutput::failure("", "session lock poisoned"),
    };

    let mut channel = match session.channel_session() {
        Ok(channel) => channel,
        Err(e) => return CommandOutput::failure("", format!("failed to open channel: {e}")),
    };

    if let Err(e) = channel.handle_extended_data(ExtendedData::Merge) {
        return CommandOutput::failure("", format!("failed to merge stderr: {e}"));
    }
    if let Err(e) = channel.exec(command) {
        return CommandOutput::failure("", format!("failed to start command: {e}"));
    }

    let mut raw = Vec::new();
    let read = channel.read_to_end(&mut raw);
    let output = String::from_utf8_lossy(&raw).into_owned();
    if let Err(e) = read {
        return CommandOutput::failure(output, format!("failed to read output: {e}"));
    }

    if let Err(e) = channel.wait_close() {
        return CommandOutput::failure(output, format!("channel close failed: {e}"));
    }

    match channel.exit_status() {
        Ok(0) => CommandOutput::success(output),
        Ok(code) => CommandOutput::failure(output, format!("exit status {code}")),
        Err(e) => CommandOutput::failure(output, format!("unknown exit status: {e}")),
    }
}

fn copy_file(session: &Mutex<Session>, remote_path: &str, contents: &[u8]) -> Result<(), String> {
    let session = session.lock().map_err(|_| "session lock poisoned".to_string())?;
    let size = u64::try_from(contents.len()).map_err(|e| e.to_string())?;

    let mut channel = session
        .scp_send(Path::new(remote_path), UPLOAD_MODE, size, None)
        .map_err(|e| e.to_string())?;
    channel.write_all(contents).map_err(|e| e.to_string())?;
    channel.send_eof().map_err(|e| e.to_string())?;
    channel.wait_eof().map_err(|e| e.to_string())?;
    channel.close().map_err(|e| e.to_string())?;
    channel.wait_close().map_err(|e| e.to_string())?;
    Ok(())
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn execute(&self, command: &str) -> CommandOutput {
        let session = Arc::clone(&self.session);
        let command = command.to_string();

        tokio::task::spawn_blocking(move || run_command(&session, &command))
            .await
            .unwrap_or_else(|e| CommandOutput::failure("", format!("command task failed: {e}")))
    }

    async fn upload(&self, remote_path: &str, contents: &[u8]) -> Result<(), String> {
        let session = Arc::clone(&self.session);
        let remote_path = remote_path.to_string();
        let contents = contents.to_vec();

        tokio::task::spawn_blocking(move || copy_file(&session, &remote_path, &contents))
            .await
            .map_err(|e| format!("upload task failed: {e}"))?
    }

    async fn close(self: Box<Self>) {
        let host = self.host.clone();
        let session = Arc::clone(&self.session);

        let result = tokio::task::spawn_blocking(move || {
            let session = session.lock().map_err(|_| "session lock poisoned".to_string())?;
            session
                .disconnect(None, "provisioning finished", None)
                .map_err(|e| e.to_string())
        })
        .await;

        match result {
            Ok(Ok(())) => debug!(%host, "SSH session closed"),
            Ok(Err(e)) => warn!(%host, error = %e, "SSH disconnect failed"),
            Err(e) => warn!(%host, error = %e, "SSH disconnect task failed"),
        }
    }
}
