//! Remote protocol client boundary.
//!
//! The adapter never speaks the wire protocol itself; it drives a
//! [`RemoteClient`] obtained from a [`Connector`]. The production
//! implementation lives in [`ssh`]; [`memory`] provides an in-process
//! remote host for tests and examples.

pub mod memory;
pub mod ssh;

use async_trait::async_trait;
use std::time::SystemTime;

use crate::address::Endpoint;
use crate::attr::RemoteAttr;
use crate::error::StreamResult;

/// One authenticated connection to a remote server.
///
/// Exclusively owned by the session that opened it; the `&mut` receivers
/// make the no-sharing rule part of the signature. All operations are
/// synchronous request/response — a failed call is returned as-is, never
/// retried. Boolean remote statuses arrive here already translated into
/// `StreamResult`.
#[async_trait]
pub trait RemoteClient: Send {
    /// Read up to `len` bytes starting at absolute `offset`.
    /// Returns fewer bytes (possibly none) near end-of-file.
    async fn read_range(&mut self, path: &str, offset: u64, len: u32) -> StreamResult<Vec<u8>>;

    /// Write `data` at absolute `offset`, creating the file if absent.
    async fn write_range(&mut self, path: &str, data: &[u8], offset: u64) -> StreamResult<()>;

    /// Replace the whole remote object with `data`.
    async fn replace(&mut self, path: &str, data: &[u8]) -> StreamResult<()>;

    /// Attributes of `path`, dereferencing symlinks. `None` if absent.
    async fn stat(&mut self, path: &str) -> StreamResult<Option<RemoteAttr>>;

    /// Attributes of `path` without dereferencing symlinks.
    async fn lstat(&mut self, path: &str) -> StreamResult<Option<RemoteAttr>>;

    /// Entry names of the directory at `path`, in server order.
    async fn list(&mut self, path: &str) -> StreamResult<Vec<String>>;

    /// Create a directory. With `recursive`, missing parents are created.
    async fn mkdir(&mut self, path: &str, mode: u32, recursive: bool) -> StreamResult<()>;

    /// Remove an empty directory.
    async fn rmdir(&mut self, path: &str) -> StreamResult<()>;

    /// Rename `from` to `to` within this endpoint.
    async fn rename(&mut self, from: &str, to: &str) -> StreamResult<()>;

    /// Delete a file.
    async fn remove(&mut self, path: &str) -> StreamResult<()>;

    /// Set access and modification times, received in that order.
    /// `None` means "now".
    async fn touch(
        &mut self,
        path: &str,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> StreamResult<()>;

    /// Change the owner id.
    async fn chown(&mut self, path: &str, uid: u32) -> StreamResult<()>;

    /// Change the group id.
    async fn chgrp(&mut self, path: &str, gid: u32) -> StreamResult<()>;

    /// Change permission bits. The (mode, path) argument order is a
    /// compatibility contract inherited from the protocol client this
    /// adapter was built against — every other metadata call takes
    /// (path, value). Do not "fix" it; callers rely on the exact shape.
    async fn chmod(&mut self, mode: u32, path: &str) -> StreamResult<()>;

    /// Absolute remote working directory of this connection.
    async fn current_dir(&mut self) -> StreamResult<String>;

    /// Release the connection. The client is unusable afterwards.
    async fn disconnect(&mut self);
}

/// Produces authenticated [`RemoteClient`] connections.
///
/// One call performs connect plus a single authentication attempt — no
/// retry, mirroring the remote client's own policy. A rejected login
/// returns [`crate::StreamError::Authentication`] and leaves no dangling
/// connection behind.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> StreamResult<Box<dyn RemoteClient>>;
}
