//! Newline-delimited framing over an arbitrary byte stream

use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reassembles complete lines from chunks that ignore line boundaries.
///
/// A JSON-RPC frame never contains a raw newline (JSON escapes them inside
/// strings), so every `\n` ends a frame.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completes, without the `\n`
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            if self.pending.is_empty() {
                lines.push(String::from_utf8_lossy(head).into_owned());
            } else {
                self.pending.extend_from_slice(head);
                lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                self.pending.clear();
            }
            rest = &tail[1..];
        }

        self.pending.extend_from_slice(rest);
        lines
    }

    /// Drop the unterminated line and return it
    pub fn take_pending(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending)
    }
}

/// Reads frames from an async byte source.
///
/// Each call to [`FrameReader::next_lines`] performs one read and yields the
/// lines it completed, possibly none. A partial line left at end of stream is
/// discarded.
pub struct FrameReader<R> {
    reader: R,
    buffer: LineBuffer,
    chunk: Box<[u8]>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: LineBuffer::new(),
            chunk: vec![0u8; READ_CHUNK_SIZE].into_boxed_slice(),
        }
    }

    /// Read once. `Ok(None)` at end of stream.
    pub async fn next_lines(&mut self) -> std::io::Result<Option<Vec<String>>> {
        let n = self.reader.read(&mut self.chunk).await?;
        if n == 0 {
            let dropped = self.buffer.take_pending();
            if !dropped.is_empty() {
                tracing::debug!("Discarding {} bytes of unterminated frame at EOF", dropped.len());
            }
            return Ok(None);
        }
        Ok(Some(self.buffer.push(&self.chunk[..n])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed<C: AsRef<[u8]>>(chunks: &[C]) -> Vec<String> {
        let mut buffer = LineBuffer::new();
        chunks.iter().flat_map(|c| buffer.push(c.as_ref())).collect()
    }

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let lines = feed(&["{\"a\":1}\n{\"b\":2}\n"]);
        assert_eq!(lines, vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let lines = feed(&["{\"jsonrpc\":", "\"2.0\",", "\"id\":1}\n"]);
        assert_eq!(lines, vec!["{\"jsonrpc\":\"2.0\",\"id\":1}"]);
    }

    #[test]
    fn test_chunking_does_not_change_output() {
        let blob =
            "{\"id\":1}\n\n  \n{\"id\":2,\"s\":\"caf\u{e9}\"}\nnot json\n{\"id\":3}\n".as_bytes();
        let whole = feed(&[blob]);
        assert_eq!(whole.len(), 6);

        for size in 1..blob.len() {
            let chunks: Vec<&[u8]> = blob.chunks(size).collect();
            assert_eq!(feed(&chunks), whole, "chunk size {}", size);
        }

        for split in 0..=blob.len() {
            let (a, b) = blob.split_at(split);
            assert_eq!(feed(&[a, b]), whole, "split at {}", split);
        }
    }

    #[test]
    fn test_partial_line_is_retained() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"{\"id\":").is_empty());
        assert_eq!(buffer.push(b"7}\n{\"x"), vec!["{\"id\":7}"]);
        assert_eq!(buffer.take_pending(), b"{\"x");
        assert!(buffer.take_pending().is_empty());
    }

    #[test]
    fn test_empty_lines_are_emitted() {
        assert_eq!(feed(&["\n\n"]), vec!["", ""]);
    }

    #[tokio::test]
    async fn test_frame_reader_drops_trailing_partial() {
        let (mut tx, rx) = tokio::io::duplex(16);
        let writer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            tx.write_all(b"{\"id\":1}\n{\"id\":2}\n{\"id\":").await.unwrap();
        });

        let mut reader = FrameReader::new(rx);
        let mut lines = Vec::new();
        while let Some(batch) = reader.next_lines().await.unwrap() {
            lines.extend(batch);
        }
        writer.await.unwrap();

        assert_eq!(lines, vec!["{\"id\":1}", "{\"id\":2}"]);
    }

    #[tokio::test]
    async fn test_frame_reader_carries_partial_line_across_reads() {
        use tokio::io::AsyncWriteExt;
        let (mut tx, rx) = tokio::io::duplex(64);
        let mut reader = FrameReader::new(rx);

        tx.write_all(b"{\"id\":").await.unwrap();
        assert_eq!(reader.next_lines().await.unwrap(), Some(vec![]));
        tx.write_all(b"1}\n").await.unwrap();
        drop(tx);

        assert_eq!(reader.next_lines().await.unwrap(), Some(vec!["{\"id\":1}".to_string()]));
        assert_eq!(reader.next_lines().await.unwrap(), None);
    }
}
