//! In-memory remote host.
//!
//! A process-local stand-in for an SFTP server, used by tests and
//! examples. The host is shared; every [`MemoryConnector::connect`]
//! produces a fresh [`MemoryClient`] against it, and the host counts
//! connections, disconnects, and remote calls so tests can assert the
//! adapter's one-session-per-operation behavior.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use crate::address::Endpoint;
use crate::attr::RemoteAttr;
use crate::client::{Connector, RemoteClient};
use crate::error::{StreamError, StreamResult};

const S_IFDIR: u32 = 0o040000;
const S_IFREG: u32 = 0o100000;

#[derive(Debug, Clone)]
struct Meta {
    permissions: u32,
    uid: u32,
    gid: u32,
    atime: Option<SystemTime>,
    mtime: Option<SystemTime>,
}

impl Meta {
    fn file(mode: u32) -> Self {
        Self {
            permissions: S_IFREG | (mode & 0o7777),
            uid: 0,
            gid: 0,
            atime: None,
            mtime: Some(SystemTime::now()),
        }
    }

    fn directory(mode: u32) -> Self {
        Self {
            permissions: S_IFDIR | (mode & 0o7777),
            uid: 0,
            gid: 0,
            atime: None,
            mtime: Some(SystemTime::now()),
        }
    }
}

#[derive(Debug, Clone)]
enum Entry {
    File { data: Vec<u8>, meta: Meta },
    Directory { meta: Meta },
}

impl Entry {
    fn meta_mut(&mut self) -> &mut Meta {
        match self {
            Entry::File { meta, .. } => meta,
            Entry::Directory { meta } => meta,
        }
    }

    fn attr(&self) -> RemoteAttr {
        let (size, meta) = match self {
            Entry::File { data, meta } => (data.len() as u64, meta),
            Entry::Directory { meta } => (0, meta),
        };
        RemoteAttr {
            size: Some(size),
            permissions: Some(meta.permissions),
            uid: Some(meta.uid),
            gid: Some(meta.gid),
            atime: meta.atime,
            mtime: meta.mtime,
        }
    }
}

struct HostState {
    entries: HashMap<String, Entry>,
    accounts: HashMap<String, String>,
    cwd: String,
}

struct HostInner {
    state: RwLock<HostState>,
    connections: AtomicU64,
    disconnects: AtomicU64,
    remote_calls: AtomicU64,
}

/// Shared in-memory remote filesystem.
///
/// Cloning is cheap; clones address the same host.
#[derive(Clone)]
pub struct MemoryHost {
    inner: Arc<HostInner>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// Create an empty host with only the root directory.
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            "/".to_string(),
            Entry::Directory {
                meta: Meta::directory(0o755),
            },
        );
        Self {
            inner: Arc::new(HostInner {
                state: RwLock::new(HostState {
                    entries,
                    accounts: HashMap::new(),
                    cwd: "/".to_string(),
                }),
                connections: AtomicU64::new(0),
                disconnects: AtomicU64::new(0),
                remote_calls: AtomicU64::new(0),
            }),
        }
    }

    /// Register a user/credential pair accepted at login.
    pub fn allow(&self, user: impl Into<String>, credential: impl Into<String>) {
        let mut state = self.inner.state.write().expect("host lock");
        state.accounts.insert(user.into(), credential.into());
    }

    /// Set the working directory reported to connections.
    pub fn set_cwd(&self, cwd: impl Into<String>) {
        let mut state = self.inner.state.write().expect("host lock");
        state.cwd = cwd.into();
    }

    /// Place a file on the host, creating parent directories.
    pub fn insert_file(&self, path: &str, data: impl Into<Vec<u8>>) {
        let path = normalize(path);
        let mut state = self.inner.state.write().expect("host lock");
        ensure_parents(&mut state.entries, &path);
        state.entries.insert(
            path,
            Entry::File {
                data: data.into(),
                meta: Meta::file(0o644),
            },
        );
    }

    /// Create a directory on the host, creating parents.
    pub fn insert_dir(&self, path: &str) {
        let path = normalize(path);
        let mut state = self.inner.state.write().expect("host lock");
        ensure_parents(&mut state.entries, &path);
        state.entries.insert(
            path,
            Entry::Directory {
                meta: Meta::directory(0o755),
            },
        );
    }

    /// Current contents of a file, if present.
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        let state = self.inner.state.read().expect("host lock");
        match state.entries.get(&normalize(path)) {
            Some(Entry::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    /// Raw attributes of an entry, if present.
    pub fn attr(&self, path: &str) -> Option<RemoteAttr> {
        let state = self.inner.state.read().expect("host lock");
        state.entries.get(&normalize(path)).map(Entry::attr)
    }

    /// Number of successful logins so far.
    pub fn connections(&self) -> u64 {
        self.inner.connections.load(Ordering::SeqCst)
    }

    /// Number of released connections so far.
    pub fn disconnects(&self) -> u64 {
        self.inner.disconnects.load(Ordering::SeqCst)
    }

    /// Number of remote filesystem calls served so far.
    pub fn remote_calls(&self) -> u64 {
        self.inner.remote_calls.load(Ordering::SeqCst)
    }

    fn count_call(&self) {
        self.inner.remote_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Connector handing out [`MemoryClient`] connections to one host.
#[derive(Clone)]
pub struct MemoryConnector {
    host: MemoryHost,
}

impl MemoryConnector {
    pub fn new(host: MemoryHost) -> Self {
        Self { host }
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, endpoint: &Endpoint) -> StreamResult<Box<dyn RemoteClient>> {
        let ok = {
            let state = self.host.inner.state.read().expect("host lock");
            state.accounts.get(&endpoint.user) == Some(&endpoint.credential)
        };
        if !ok {
            return Err(StreamError::authentication(
                endpoint.user.clone(),
                endpoint.host.clone(),
            ));
        }
        self.host.inner.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryClient {
            host: self.host.clone(),
        }))
    }
}

/// One authenticated connection to a [`MemoryHost`].
pub struct MemoryClient {
    host: MemoryHost,
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn parent(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

fn ensure_parents(entries: &mut HashMap<String, Entry>, path: &str) {
    let mut current = String::new();
    for part in path.trim_matches('/').split('/') {
        current.push('/');
        current.push_str(part);
        if current == path {
            break;
        }
        entries.entry(current.clone()).or_insert(Entry::Directory {
            meta: Meta::directory(0o755),
        });
    }
}

impl MemoryClient {
    fn with_state<T>(&self, f: impl FnOnce(&mut HostState) -> StreamResult<T>) -> StreamResult<T> {
        self.host.count_call();
        let mut state = self
            .host
            .inner
            .state
            .write()
            .map_err(|_| StreamError::remote("host lock poisoned"))?;
        f(&mut state)
    }
}

#[async_trait]
impl RemoteClient for MemoryClient {
    async fn read_range(&mut self, path: &str, offset: u64, len: u32) -> StreamResult<Vec<u8>> {
        let path = normalize(path);
        self.with_state(|state| match state.entries.get(&path) {
            Some(Entry::File { data, .. }) => {
                let start = (offset as usize).min(data.len());
                let end = (start + len as usize).min(data.len());
                Ok(data[start..end].to_vec())
            }
            Some(Entry::Directory { .. }) => Err(StreamError::not_a_file(path.clone())),
            // An absent path reads as empty, the way the wrapped
            // protocol client surfaces a missing file to ranged reads.
            None => Ok(Vec::new()),
        })
    }

    async fn write_range(&mut self, path: &str, data: &[u8], offset: u64) -> StreamResult<()> {
        let path = normalize(path);
        self.with_state(|state| {
            ensure_parents(&mut state.entries, &path);
            let entry = state.entries.entry(path.clone()).or_insert(Entry::File {
                data: Vec::new(),
                meta: Meta::file(0o644),
            });
            match entry {
                Entry::File { data: file, meta } => {
                    let offset = offset as usize;
                    if offset + data.len() > file.len() {
                        file.resize(offset + data.len(), 0);
                    }
                    file[offset..offset + data.len()].copy_from_slice(data);
                    meta.mtime = Some(SystemTime::now());
                    Ok(())
                }
                Entry::Directory { .. } => Err(StreamError::not_a_file(path.clone())),
            }
        })
    }

    async fn replace(&mut self, path: &str, data: &[u8]) -> StreamResult<()> {
        let path = normalize(path);
        self.with_state(|state| {
            ensure_parents(&mut state.entries, &path);
            if let Some(Entry::Directory { .. }) = state.entries.get(&path) {
                return Err(StreamError::not_a_file(path.clone()));
            }
            state.entries.insert(
                path,
                Entry::File {
                    data: data.to_vec(),
                    meta: Meta::file(0o644),
                },
            );
            Ok(())
        })
    }

    async fn stat(&mut self, path: &str) -> StreamResult<Option<RemoteAttr>> {
        let path = normalize(path);
        self.with_state(|state| Ok(state.entries.get(&path).map(Entry::attr)))
    }

    async fn lstat(&mut self, path: &str) -> StreamResult<Option<RemoteAttr>> {
        // The in-memory host has no symlinks; lstat and stat coincide.
        self.stat(path).await
    }

    async fn list(&mut self, path: &str) -> StreamResult<Vec<String>> {
        let path = normalize(path);
        self.with_state(|state| {
            match state.entries.get(&path) {
                Some(Entry::Directory { .. }) => {}
                Some(_) => return Err(StreamError::not_a_directory(path.clone())),
                None => return Err(StreamError::not_found(path.clone())),
            }
            let mut names: Vec<String> = state
                .entries
                .keys()
                .filter(|k| *k != &path && parent(k) == path)
                .filter_map(|k| k.rsplit('/').next().map(str::to_string))
                .collect();
            names.sort();
            Ok(names)
        })
    }

    async fn mkdir(&mut self, path: &str, mode: u32, recursive: bool) -> StreamResult<()> {
        let path = normalize(path);
        self.with_state(|state| {
            if state.entries.contains_key(&path) {
                return Err(StreamError::remote(format!("mkdir failed: {path} exists")));
            }
            if recursive {
                ensure_parents(&mut state.entries, &path);
            } else if !matches!(state.entries.get(&parent(&path)), Some(Entry::Directory { .. }))
            {
                return Err(StreamError::remote(format!(
                    "mkdir failed: no parent for {path}"
                )));
            }
            state.entries.insert(
                path,
                Entry::Directory {
                    meta: Meta::directory(mode),
                },
            );
            Ok(())
        })
    }

    async fn rmdir(&mut self, path: &str) -> StreamResult<()> {
        let path = normalize(path);
        self.with_state(|state| {
            match state.entries.get(&path) {
                Some(Entry::Directory { .. }) => {}
                Some(_) => return Err(StreamError::not_a_directory(path.clone())),
                None => return Err(StreamError::not_found(path.clone())),
            }
            if state.entries.keys().any(|k| k != &path && parent(k) == path) {
                return Err(StreamError::remote(format!("directory not empty: {path}")));
            }
            state.entries.remove(&path);
            Ok(())
        })
    }

    async fn rename(&mut self, from: &str, to: &str) -> StreamResult<()> {
        let from = normalize(from);
        let to = normalize(to);
        self.with_state(|state| {
            if !state.entries.contains_key(&from) {
                return Err(StreamError::not_found(from.clone()));
            }
            if state.entries.contains_key(&to) {
                return Err(StreamError::remote(format!("rename failed: {to} exists")));
            }
            ensure_parents(&mut state.entries, &to);
            let moved: Vec<String> = state
                .entries
                .keys()
                .filter(|k| *k == &from || k.starts_with(&format!("{from}/")))
                .cloned()
                .collect();
            for old in moved {
                if let Some(entry) = state.entries.remove(&old) {
                    let new = format!("{to}{}", &old[from.len()..]);
                    state.entries.insert(new, entry);
                }
            }
            Ok(())
        })
    }

    async fn remove(&mut self, path: &str) -> StreamResult<()> {
        let path = normalize(path);
        self.with_state(|state| match state.entries.get(&path) {
            Some(Entry::File { .. }) => {
                state.entries.remove(&path);
                Ok(())
            }
            Some(Entry::Directory { .. }) => Err(StreamError::not_a_file(path.clone())),
            None => Err(StreamError::not_found(path.clone())),
        })
    }

    async fn touch(
        &mut self,
        path: &str,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> StreamResult<()> {
        let path = normalize(path);
        self.with_state(|state| {
            ensure_parents(&mut state.entries, &path);
            let entry = state.entries.entry(path).or_insert(Entry::File {
                data: Vec::new(),
                meta: Meta::file(0o644),
            });
            let now = SystemTime::now();
            let meta = entry.meta_mut();
            meta.atime = Some(atime.unwrap_or(now));
            meta.mtime = Some(mtime.unwrap_or(now));
            Ok(())
        })
    }

    async fn chown(&mut self, path: &str, uid: u32) -> StreamResult<()> {
        let path = normalize(path);
        self.with_state(|state| match state.entries.get_mut(&path) {
            Some(entry) => {
                entry.meta_mut().uid = uid;
                Ok(())
            }
            None => Err(StreamError::not_found(path.clone())),
        })
    }

    async fn chgrp(&mut self, path: &str, gid: u32) -> StreamResult<()> {
        let path = normalize(path);
        self.with_state(|state| match state.entries.get_mut(&path) {
            Some(entry) => {
                entry.meta_mut().gid = gid;
                Ok(())
            }
            None => Err(StreamError::not_found(path.clone())),
        })
    }

    async fn chmod(&mut self, mode: u32, path: &str) -> StreamResult<()> {
        let path = normalize(path);
        self.with_state(|state| match state.entries.get_mut(&path) {
            Some(entry) => {
                let meta = entry.meta_mut();
                meta.permissions = (meta.permissions & !0o7777) | (mode & 0o7777);
                Ok(())
            }
            None => Err(StreamError::not_found(path.clone())),
        })
    }

    async fn current_dir(&mut self) -> StreamResult<String> {
        self.with_state(|state| Ok(state.cwd.clone()))
    }

    async fn disconnect(&mut self) {
        self.host.inner.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint {
            host: "h".into(),
            port: 22,
            user: "u".into(),
            credential: "p".into(),
        }
    }

    #[tokio::test]
    async fn test_login_checks_credentials() {
        let host = MemoryHost::new();
        host.allow("u", "p");
        let connector = MemoryConnector::new(host.clone());

        assert!(connector.connect(&endpoint()).await.is_ok());
        assert_eq!(host.connections(), 1);

        let mut bad = endpoint();
        bad.credential = "wrong".into();
        let err = connector.connect(&bad).await.err().unwrap();
        assert!(matches!(err, StreamError::Authentication { .. }));
        assert_eq!(host.connections(), 1);
    }

    #[tokio::test]
    async fn test_read_write_roundtrip() {
        let host = MemoryHost::new();
        host.allow("u", "p");
        let connector = MemoryConnector::new(host.clone());
        let mut client = connector.connect(&endpoint()).await.unwrap();

        client.write_range("/f.txt", b"hello world", 0).await.unwrap();
        let data = client.read_range("/f.txt", 6, 5).await.unwrap();
        assert_eq!(data, b"world");
    }

    #[tokio::test]
    async fn test_read_missing_path_is_empty() {
        let host = MemoryHost::new();
        host.allow("u", "p");
        let connector = MemoryConnector::new(host.clone());
        let mut client = connector.connect(&endpoint()).await.unwrap();

        let data = client.read_range("/nope", 0, 16).await.unwrap();
        assert!(data.is_empty());
    }

    #[tokio::test]
    async fn test_list_sorted_names() {
        let host = MemoryHost::new();
        host.allow("u", "p");
        host.insert_file("/d/b.txt", "");
        host.insert_file("/d/a.txt", "");
        let connector = MemoryConnector::new(host.clone());
        let mut client = connector.connect(&endpoint()).await.unwrap();

        let names = client.list("/d").await.unwrap();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn test_mkdir_non_recursive_needs_parent() {
        let host = MemoryHost::new();
        host.allow("u", "p");
        let connector = MemoryConnector::new(host.clone());
        let mut client = connector.connect(&endpoint()).await.unwrap();

        assert!(client.mkdir("/a/b", 0o755, false).await.is_err());
        client.mkdir("/a/b", 0o755, true).await.unwrap();
        assert!(host.attr("/a/b").unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_rename_moves_children() {
        let host = MemoryHost::new();
        host.allow("u", "p");
        host.insert_file("/old/f.txt", "x");
        let connector = MemoryConnector::new(host.clone());
        let mut client = connector.connect(&endpoint()).await.unwrap();

        client.rename("/old", "/new").await.unwrap();
        assert!(host.file("/old/f.txt").is_none());
        assert_eq!(host.file("/new/f.txt").unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_call_counter() {
        let host = MemoryHost::new();
        host.allow("u", "p");
        let connector = MemoryConnector::new(host.clone());
        let mut client = connector.connect(&endpoint()).await.unwrap();

        assert_eq!(host.remote_calls(), 0);
        client.stat("/").await.unwrap();
        client.list("/").await.unwrap();
        assert_eq!(host.remote_calls(), 2);
        client.disconnect().await;
        assert_eq!(host.disconnects(), 1);
    }
}
