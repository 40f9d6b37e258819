//! Byte-stream operations over a [`Session`].
//!
//! Reads and writes go to the remote at the absolute offset held in the
//! session cursor; the cursor advances by what actually transferred.
//! Sizes are never cached — end-of-file checks stat the remote every
//! time.

use std::io::SeekFrom;

use crate::attr::NormalizedStat;
use crate::error::{StreamError, StreamResult};
use crate::session::Session;

impl Session {
    /// Read up to `count` bytes at the cursor, advancing it by the
    /// number of bytes actually returned. An empty result signals
    /// end-of-file; short reads near the end are not errors.
    pub async fn read(&mut self, count: u32) -> StreamResult<Vec<u8>> {
        let chunk = self
            .client
            .read_range(&self.path, self.cursor, count)
            .await?;
        self.cursor += chunk.len() as u64;
        Ok(chunk)
    }

    /// Write `data` at the cursor as an offset-write (never a blind
    /// append), advancing the cursor by `data.len()`. Returns the bytes
    /// written. Concurrent writers to the same path race at remote-call
    /// granularity; the adapter provides no locking.
    pub async fn write(&mut self, data: &[u8]) -> StreamResult<usize> {
        self.client
            .write_range(&self.path, data, self.cursor)
            .await?;
        self.cursor += data.len() as u64;
        Ok(data.len())
    }

    /// Reposition the cursor.
    ///
    /// `Current` adds the delta to the existing cursor; `End` queries the
    /// remote size first. A target before the start of the stream fails
    /// with [`StreamError::InvalidSeek`] and leaves the cursor unchanged.
    /// Returns the new cursor position.
    pub async fn seek(&mut self, pos: SeekFrom) -> StreamResult<u64> {
        let target: i64 = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(delta) => self.cursor as i64 + delta,
            SeekFrom::End(delta) => self.remote_size().await? as i64 + delta,
        };
        if target < 0 {
            return Err(StreamError::InvalidSeek(target));
        }
        self.cursor = target as u64;
        Ok(self.cursor)
    }

    /// Current cursor position. No remote call.
    pub fn tell(&self) -> u64 {
        self.cursor
    }

    /// True once the cursor has reached the remote size. The size is
    /// freshly queried on every call; a path with no remote metadata
    /// counts as size zero.
    pub async fn eof(&mut self) -> StreamResult<bool> {
        Ok(self.cursor >= self.remote_size().await?)
    }

    /// Truncate the remote object to `new_size` bytes.
    ///
    /// This is a read-then-rewrite: the prefix is fetched and the whole
    /// object rewritten with it. Not atomic — it races with concurrent
    /// writers exactly like [`Session::write`] — and costs a full
    /// round trip proportional to `new_size`.
    pub async fn truncate(&mut self, new_size: u64) -> StreamResult<()> {
        let mut prefix = Vec::new();
        while (prefix.len() as u64) < new_size {
            let want = (new_size - prefix.len() as u64).min(u32::MAX as u64) as u32;
            let chunk = self
                .client
                .read_range(&self.path, prefix.len() as u64, want)
                .await?;
            if chunk.is_empty() {
                break;
            }
            prefix.extend_from_slice(&chunk);
        }
        self.client.replace(&self.path, &prefix).await
    }

    /// Normalized metadata of the open path.
    pub async fn stat(&mut self) -> StreamResult<NormalizedStat> {
        let raw = self.client.stat(&self.path).await?;
        Ok(NormalizedStat::from_remote(raw))
    }

    /// Stream-cast for multiplexed I/O is not emulated.
    pub fn cast(&self) -> StreamResult<()> {
        Err(StreamError::Unsupported("stream cast"))
    }

    /// Flushing is meaningless here — writes hit the remote directly.
    pub fn flush(&self) -> StreamResult<()> {
        Err(StreamError::Unsupported("stream flush"))
    }

    /// Stream options are not emulated.
    pub fn set_option(&self, _option: u32) -> StreamResult<()> {
        Err(StreamError::Unsupported("stream options"))
    }

    async fn remote_size(&mut self) -> StreamResult<u64> {
        let raw = self.client.stat(&self.path).await?;
        Ok(NormalizedStat::from_remote(raw).size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::memory::{MemoryConnector, MemoryHost};
    use crate::session::OpenFlags;

    async fn session_on(host: &MemoryHost, addr: &str) -> Session {
        host.allow("u", "p");
        let connector = MemoryConnector::new(host.clone());
        Session::open(&connector, addr, "r+", OpenFlags::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_read_advances_by_bytes_returned() {
        let host = MemoryHost::new();
        host.insert_file("/f.bin", b"abcdef".to_vec());
        let mut s = session_on(&host, "sftp://u:p@h/f.bin").await;

        assert_eq!(s.read(4).await.unwrap(), b"abcd");
        assert_eq!(s.tell(), 4);
        // Short read at end-of-file, then empty.
        assert_eq!(s.read(10).await.unwrap(), b"ef");
        assert_eq!(s.tell(), 6);
        assert!(s.read(10).await.unwrap().is_empty());
        s.close().await;
    }

    #[tokio::test]
    async fn test_split_reads_match_single_read() {
        let host = MemoryHost::new();
        host.insert_file("/f.bin", b"0123456789".to_vec());

        let mut a = session_on(&host, "sftp://u:p@h/f.bin").await;
        let mut first = a.read(3).await.unwrap();
        first.extend(a.read(4).await.unwrap());

        let mut b = session_on(&host, "sftp://u:p@h/f.bin").await;
        let combined = b.read(7).await.unwrap();

        assert_eq!(first, combined);
        a.close().await;
        b.close().await;
    }

    #[tokio::test]
    async fn test_tell_after_write() {
        let host = MemoryHost::new();
        let mut s = session_on(&host, "sftp://u:p@h/new.txt").await;

        let before = s.tell();
        let written = s.write(b"hello").await.unwrap();
        assert_eq!(written, 5);
        assert_eq!(s.tell(), before + 5);
        s.close().await;
    }

    #[tokio::test]
    async fn test_seek_whence_variants() {
        let host = MemoryHost::new();
        host.insert_file("/f.bin", b"0123456789".to_vec());
        let mut s = session_on(&host, "sftp://u:p@h/f.bin").await;

        assert_eq!(s.seek(SeekFrom::Start(4)).await.unwrap(), 4);
        // Current is relative to the existing cursor, not zero.
        assert_eq!(s.seek(SeekFrom::Current(3)).await.unwrap(), 7);
        assert_eq!(s.seek(SeekFrom::Current(-2)).await.unwrap(), 5);
        assert_eq!(s.seek(SeekFrom::End(-4)).await.unwrap(), 6);
        s.close().await;
    }

    #[tokio::test]
    async fn test_negative_seek_leaves_cursor_unchanged() {
        let host = MemoryHost::new();
        host.insert_file("/f.bin", b"0123456789".to_vec());
        let mut s = session_on(&host, "sftp://u:p@h/f.bin").await;

        s.seek(SeekFrom::Start(5)).await.unwrap();
        let err = s.seek(SeekFrom::Current(-9)).await.unwrap_err();
        assert!(matches!(err, StreamError::InvalidSeek(-4)));
        assert_eq!(s.tell(), 5);

        let err = s.seek(SeekFrom::End(-11)).await.unwrap_err();
        assert!(matches!(err, StreamError::InvalidSeek(_)));
        assert_eq!(s.tell(), 5);
        s.close().await;
    }

    #[tokio::test]
    async fn test_eof_at_exact_size_boundary() {
        let host = MemoryHost::new();
        host.insert_file("/f.bin", b"0123456789".to_vec());
        let mut s = session_on(&host, "sftp://u:p@h/f.bin").await;

        s.seek(SeekFrom::Start(10)).await.unwrap();
        assert!(s.eof().await.unwrap());
        s.seek(SeekFrom::Start(9)).await.unwrap();
        assert!(!s.eof().await.unwrap());
        s.close().await;
    }

    #[tokio::test]
    async fn test_eof_queries_size_fresh() {
        let host = MemoryHost::new();
        host.insert_file("/f.bin", b"abc".to_vec());
        let mut s = session_on(&host, "sftp://u:p@h/f.bin").await;

        s.seek(SeekFrom::Start(3)).await.unwrap();
        assert!(s.eof().await.unwrap());
        // The file grows behind the adapter's back; no cached size.
        host.insert_file("/f.bin", b"abcdef".to_vec());
        assert!(!s.eof().await.unwrap());
        s.close().await;
    }

    #[tokio::test]
    async fn test_truncate_keeps_prefix() {
        let host = MemoryHost::new();
        host.insert_file("/f.bin", b"0123456789".to_vec());
        let mut s = session_on(&host, "sftp://u:p@h/f.bin").await;

        s.truncate(3).await.unwrap();
        assert_eq!(host.file("/f.bin").unwrap(), b"012");

        s.seek(SeekFrom::Start(0)).await.unwrap();
        assert_eq!(s.read(16).await.unwrap(), b"012");
        s.close().await;
    }

    #[tokio::test]
    async fn test_write_then_read_back() {
        let host = MemoryHost::new();
        let mut s = session_on(&host, "sftp://u:p@h/a.txt").await;

        assert_eq!(s.write(b"hello").await.unwrap(), 5);
        assert_eq!(s.tell(), 5);
        s.seek(SeekFrom::Start(0)).await.unwrap();
        assert_eq!(s.read(5).await.unwrap(), b"hello");
        assert!(s.eof().await.unwrap());
        s.close().await;
    }

    #[tokio::test]
    async fn test_stat_missing_path_is_empty_record() {
        let host = MemoryHost::new();
        let mut s = session_on(&host, "sftp://u:p@h/ghost").await;

        let stat = s.stat().await.unwrap();
        assert!(stat.is_empty());
        s.close().await;
    }

    #[tokio::test]
    async fn test_unsupported_stream_surface() {
        let host = MemoryHost::new();
        let s = session_on(&host, "sftp://u:p@h/f").await;

        assert!(matches!(s.cast(), Err(StreamError::Unsupported(_))));
        assert!(matches!(s.flush(), Err(StreamError::Unsupported(_))));
        assert!(matches!(s.set_option(1), Err(StreamError::Unsupported(_))));
        s.close().await;
    }
}
