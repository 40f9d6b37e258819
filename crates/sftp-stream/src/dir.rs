//! Directory enumeration.
//!
//! A [`DirHandle`] reuses the session machinery with the cursor acting
//! as an entry index instead of a byte offset. The listing is fetched
//! once and never refreshed within the handle's lifetime: enumeration
//! sees a snapshot, not live remote state.

use crate::address::SftpUrl;
use crate::client::Connector;
use crate::error::{StreamError, StreamResult};
use crate::session::{OpenFlags, Session};

/// An open directory handle.
#[derive(Debug)]
pub struct DirHandle {
    session: Session,
}

impl DirHandle {
    /// Open a directory at `addr`.
    ///
    /// The path is probed before any enumeration session is opened — a
    /// one-shot stat of its own: an absent path is `NotFound`, a
    /// non-directory is `NotADirectory`, and in either case no
    /// enumeration session is attempted and the probe's connection is
    /// released.
    pub async fn open(connector: &dyn Connector, addr: &str) -> StreamResult<DirHandle> {
        let url = SftpUrl::parse(addr)?;

        let mut probe = connector.connect(url.endpoint()).await?;
        let result = probe.stat(url.path()).await;
        probe.disconnect().await;
        match result? {
            None => return Err(StreamError::not_found(url.path())),
            Some(attr) if !attr.is_dir() => {
                return Err(StreamError::not_a_directory(url.path()));
            }
            Some(_) => {}
        }

        let session = Session::open(connector, addr, "r", OpenFlags::default()).await?;
        Ok(DirHandle { session })
    }

    /// Next entry name, or `None` once the listing is exhausted.
    ///
    /// The first call materializes the full listing; subsequent calls
    /// only step the cursor. Remote changes made mid-enumeration are
    /// not reflected.
    pub async fn read_next(&mut self) -> StreamResult<Option<String>> {
        if self.session.listing.is_none() {
            let names = self.session.client.list(&self.session.path).await?;
            self.session.listing = Some(names);
        }
        let listing = self.session.listing.as_ref().expect("listing cached above");
        let index = self.session.cursor as usize;
        match listing.get(index) {
            Some(name) => {
                self.session.cursor += 1;
                Ok(Some(name.clone()))
            }
            None => Ok(None),
        }
    }

    /// Restart enumeration at the first entry of the original snapshot.
    /// The listing is not refetched.
    pub fn rewind(&mut self) {
        self.session.cursor = 0;
    }

    /// The remote path this handle enumerates.
    pub fn path(&self) -> &str {
        self.session.path()
    }

    /// Close the handle, releasing the connection.
    pub async fn close(self) {
        self.session.close().await;
    }
}
