//! Session lifecycle.
//!
//! A [`Session`] is one logical open handle: an exclusively owned,
//! authenticated connection plus a cursor. The cursor is the adapter's
//! sole piece of stream state — file contents are never cached locally,
//! and every transfer is an absolute-offset request against the remote.

use crate::address::{Endpoint, SftpUrl};
use crate::client::{Connector, RemoteClient};
use crate::error::StreamResult;

/// Flags accepted by [`Session::open`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    /// Resolve and surface the canonical opened path by querying the
    /// remote working directory after login.
    pub resolve_path: bool,
}

impl OpenFlags {
    pub fn resolve_path() -> Self {
        Self { resolve_path: true }
    }
}

/// One open handle onto a remote path.
pub struct Session {
    pub(crate) endpoint: Endpoint,
    pub(crate) path: String,
    pub(crate) canonical: Option<String>,
    pub(crate) cursor: u64,
    /// Directory snapshot, materialized on first enumeration.
    pub(crate) listing: Option<Vec<String>>,
    pub(crate) client: Box<dyn RemoteClient>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("path", &self.path)
            .field("canonical", &self.canonical)
            .field("cursor", &self.cursor)
            .field("listing", &self.listing)
            .field("client", &"<dyn RemoteClient>")
            .finish()
    }
}

impl Session {
    /// Open a session on `addr`.
    ///
    /// Parses the address, connects, and authenticates in a single
    /// attempt — a rejected login surfaces as
    /// [`crate::StreamError::Authentication`] with nothing else done.
    /// The mode string is recorded for diagnostics only; the remote
    /// side enforces access.
    pub async fn open(
        connector: &dyn Connector,
        addr: &str,
        mode: &str,
        flags: OpenFlags,
    ) -> StreamResult<Session> {
        let (endpoint, path) = SftpUrl::parse(addr)?.into_parts();
        let mut client = connector.connect(&endpoint).await?;

        let canonical = if flags.resolve_path {
            match client.current_dir().await {
                Ok(cwd) => Some(cwd),
                Err(e) => {
                    client.disconnect().await;
                    return Err(e);
                }
            }
        } else {
            None
        };

        tracing::debug!(endpoint = %endpoint, path = %path, mode = %mode, "session opened");

        Ok(Session {
            endpoint,
            path,
            canonical,
            cursor: 0,
            listing: None,
            client,
        })
    }

    /// The endpoint this session is connected to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The remote path this handle addresses.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Canonical opened path, present when the session was opened with
    /// [`OpenFlags::resolve_path`]. This surfaces the remote working
    /// directory reported at login.
    pub fn opened_path(&self) -> Option<&str> {
        self.canonical.as_deref()
    }

    /// Close the session, releasing the connection.
    ///
    /// Consuming `self` makes a double close unrepresentable; reopening
    /// means constructing a new session.
    pub async fn close(mut self) {
        self.client.disconnect().await;
        tracing::debug!(endpoint = %self.endpoint, path = %self.path, "session closed");
    }
}
