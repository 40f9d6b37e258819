//! SSH transport binding.
//!
//! Drives the SFTP subsystem of an SSH connection via russh and
//! russh-sftp. The adapter keeps no remote file handles between calls:
//! each ranged operation opens the remote file, positions, transfers,
//! and closes it again, so the session's cursor remains the only stream
//! state anywhere.

use std::io::SeekFrom;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use russh::Disconnect;
use russh::client::{self, Config, Handle};
use russh::keys::{HashAlg, PublicKey};
use russh_sftp::client::SftpSession;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::protocol::{FileAttributes, OpenFlags, StatusCode};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::address::Endpoint;
use crate::attr::RemoteAttr;
use crate::client::{Connector, RemoteClient};
use crate::error::{StreamError, StreamResult};

/// Client handler for russh - handles server key verification.
struct ClientHandler;

impl client::Handler for ClientHandler {
    type Error = StreamError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        // TODO: known_hosts verification
        tracing::warn!(
            "Accepting server key without verification: {}",
            server_public_key.fingerprint(HashAlg::Sha256)
        );
        Ok(true)
    }
}

/// Connector establishing password-authenticated SFTP connections.
pub struct SshConnector {
    config: Arc<Config>,
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl SshConnector {
    pub fn new() -> Self {
        let config = Config {
            inactivity_timeout: Some(Duration::from_secs(300)),
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_max: 3,
            ..<_>::default()
        };
        Self {
            config: Arc::new(config),
        }
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self, endpoint: &Endpoint) -> StreamResult<Box<dyn RemoteClient>> {
        let addr = (endpoint.host.as_str(), endpoint.port);
        let mut handle = client::connect(self.config.clone(), addr, ClientHandler).await?;

        tracing::debug!(endpoint = %endpoint, "Connected, attempting authentication");

        // Single attempt; the adapter adds no retry on top of the
        // transport's own policy.
        let auth = handle
            .authenticate_password(&endpoint.user, &endpoint.credential)
            .await?;
        if !auth.success() {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "authentication rejected", "en")
                .await;
            return Err(StreamError::authentication(
                endpoint.user.clone(),
                endpoint.host.clone(),
            ));
        }

        let channel = handle.channel_open_session().await?;
        channel.request_subsystem(true, "sftp").await?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(remote_err)?;

        tracing::debug!(endpoint = %endpoint, "SFTP subsystem ready");

        Ok(Box::new(SshClient { handle, sftp }))
    }
}

/// One authenticated SFTP connection.
pub struct SshClient {
    handle: Handle<ClientHandler>,
    sftp: SftpSession,
}

fn remote_err(e: SftpError) -> StreamError {
    StreamError::remote(e.to_string())
}

fn io_err(e: std::io::Error) -> StreamError {
    StreamError::remote(e.to_string())
}

fn is_missing(e: &SftpError) -> bool {
    matches!(e, SftpError::Status(s) if s.status_code == StatusCode::NoSuchFile)
}

fn to_remote_attr(a: FileAttributes) -> RemoteAttr {
    RemoteAttr {
        size: a.size,
        permissions: a.permissions,
        uid: a.uid,
        gid: a.gid,
        atime: a.atime.map(from_epoch),
        mtime: a.mtime.map(from_epoch),
    }
}

fn from_epoch(secs: u32) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs as u64)
}

fn to_epoch(t: SystemTime) -> u32 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

impl SshClient {
    async fn metadata_of(&self, path: &str, follow: bool) -> StreamResult<Option<RemoteAttr>> {
        let result = if follow {
            self.sftp.metadata(path).await
        } else {
            self.sftp.symlink_metadata(path).await
        };
        match result {
            Ok(attrs) => Ok(Some(to_remote_attr(attrs))),
            Err(e) if is_missing(&e) => Ok(None),
            Err(e) => Err(remote_err(e)),
        }
    }

    /// Apply a single-field attribute change, carrying the remaining
    /// ownership fields along since the wire encodes uid and gid as a
    /// pair.
    async fn set_owner(&self, path: &str, uid: Option<u32>, gid: Option<u32>) -> StreamResult<()> {
        let current = self.sftp.metadata(path).await.map_err(remote_err)?;
        let attrs = FileAttributes {
            uid: uid.or(current.uid),
            gid: gid.or(current.gid),
            ..Default::default()
        };
        self.sftp.set_metadata(path, attrs).await.map_err(remote_err)
    }
}

#[async_trait]
impl RemoteClient for SshClient {
    async fn read_range(&mut self, path: &str, offset: u64, len: u32) -> StreamResult<Vec<u8>> {
        let mut file = match self.sftp.open_with_flags(path, OpenFlags::READ).await {
            Ok(f) => f,
            // A missing path reads as empty rather than erroring; the
            // stream layer reports absence through stat instead.
            Err(e) if is_missing(&e) => return Ok(Vec::new()),
            Err(e) => return Err(remote_err(e)),
        };
        file.seek(SeekFrom::Start(offset)).await.map_err(io_err)?;

        let mut buf = vec![0u8; len as usize];
        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..]).await.map_err(io_err)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        let _ = file.shutdown().await;
        Ok(buf)
    }

    async fn write_range(&mut self, path: &str, data: &[u8], offset: u64) -> StreamResult<()> {
        let mut file = self
            .sftp
            .open_with_flags(path, OpenFlags::CREATE | OpenFlags::WRITE)
            .await
            .map_err(remote_err)?;
        file.seek(SeekFrom::Start(offset)).await.map_err(io_err)?;
        file.write_all(data).await.map_err(io_err)?;
        file.shutdown().await.map_err(io_err)?;
        Ok(())
    }

    async fn replace(&mut self, path: &str, data: &[u8]) -> StreamResult<()> {
        let mut file = self
            .sftp
            .open_with_flags(
                path,
                OpenFlags::CREATE | OpenFlags::WRITE | OpenFlags::TRUNCATE,
            )
            .await
            .map_err(remote_err)?;
        file.write_all(data).await.map_err(io_err)?;
        file.shutdown().await.map_err(io_err)?;
        Ok(())
    }

    async fn stat(&mut self, path: &str) -> StreamResult<Option<RemoteAttr>> {
        self.metadata_of(path, true).await
    }

    async fn lstat(&mut self, path: &str) -> StreamResult<Option<RemoteAttr>> {
        self.metadata_of(path, false).await
    }

    async fn list(&mut self, path: &str) -> StreamResult<Vec<String>> {
        match self.sftp.read_dir(path).await {
            Ok(entries) => Ok(entries.map(|e| e.file_name()).collect()),
            Err(e) if is_missing(&e) => Err(StreamError::not_found(path)),
            Err(e) => Err(remote_err(e)),
        }
    }

    async fn mkdir(&mut self, path: &str, mode: u32, recursive: bool) -> StreamResult<()> {
        if recursive {
            let mut current = String::new();
            for part in path.trim_matches('/').split('/') {
                current.push('/');
                current.push_str(part);
                if current == path {
                    break;
                }
                // Intermediate components may already exist.
                let _ = self.sftp.create_dir(&current).await;
            }
        }
        self.sftp.create_dir(path).await.map_err(remote_err)?;
        if mode != 0 {
            let attrs = FileAttributes {
                permissions: Some(mode),
                ..Default::default()
            };
            self.sftp.set_metadata(path, attrs).await.map_err(remote_err)?;
        }
        Ok(())
    }

    async fn rmdir(&mut self, path: &str) -> StreamResult<()> {
        match self.sftp.remove_dir(path).await {
            Ok(()) => Ok(()),
            Err(e) if is_missing(&e) => Err(StreamError::not_found(path)),
            Err(e) => Err(remote_err(e)),
        }
    }

    async fn rename(&mut self, from: &str, to: &str) -> StreamResult<()> {
        match self.sftp.rename(from, to).await {
            Ok(()) => Ok(()),
            Err(e) if is_missing(&e) => Err(StreamError::not_found(from)),
            Err(e) => Err(remote_err(e)),
        }
    }

    async fn remove(&mut self, path: &str) -> StreamResult<()> {
        match self.sftp.remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if is_missing(&e) => Err(StreamError::not_found(path)),
            Err(e) => Err(remote_err(e)),
        }
    }

    async fn touch(
        &mut self,
        path: &str,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> StreamResult<()> {
        // touch creates the file when absent.
        if self.metadata_of(path, true).await?.is_none() {
            let mut file = self
                .sftp
                .open_with_flags(path, OpenFlags::CREATE | OpenFlags::WRITE)
                .await
                .map_err(remote_err)?;
            let _ = file.shutdown().await;
        }
        let now = SystemTime::now();
        let attrs = FileAttributes {
            atime: Some(to_epoch(atime.unwrap_or(now))),
            mtime: Some(to_epoch(mtime.unwrap_or(now))),
            ..Default::default()
        };
        self.sftp.set_metadata(path, attrs).await.map_err(remote_err)
    }

    async fn chown(&mut self, path: &str, uid: u32) -> StreamResult<()> {
        self.set_owner(path, Some(uid), None).await
    }

    async fn chgrp(&mut self, path: &str, gid: u32) -> StreamResult<()> {
        self.set_owner(path, None, Some(gid)).await
    }

    async fn chmod(&mut self, mode: u32, path: &str) -> StreamResult<()> {
        let attrs = FileAttributes {
            permissions: Some(mode),
            ..Default::default()
        };
        self.sftp.set_metadata(path, attrs).await.map_err(remote_err)
    }

    async fn current_dir(&mut self) -> StreamResult<String> {
        self.sftp.canonicalize(".").await.map_err(remote_err)
    }

    async fn disconnect(&mut self) {
        let _ = self
            .handle
            .disconnect(Disconnect::ByApplication, "session closed", "en")
            .await;
    }
}
