//! Transfer engine: frame I/O shared by the sender and receiver roles,
//! grounded on `write_peer_message`/`read_peer_message` in
//! `src-tauri/src/runtime/lan/peer.rs` — adapted from that file's 4-byte
//! big-endian length prefix to the 16-byte ASCII decimal prefix spec §4.1
//! mandates, and generalized from a single JSON message to metadata
//! followed by an optional raw payload stream.

pub mod recv;
pub mod send;

use std::path::{Component, Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::codec::{decode_frame_metadata, encode_frame_header, FileFrame, LENGTH_PREFIX_WIDTH};
use crate::error::CoreError;

pub use recv::spawn_receiver;
pub use send::spawn_sender;

/// Chunk size used when streaming file payloads, picked to stay well
/// under a typical TCP socket buffer while avoiding a syscall per byte.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Write a [`FileFrame`]'s length-prefixed metadata blob to `stream`.
pub async fn write_frame(stream: &mut TcpStream, frame: &FileFrame) -> Result<(), CoreError> {
    let bytes = encode_frame_header(frame);
    stream.write_all(&bytes).await.map_err(CoreError::from)
}

/// Read one [`FileFrame`]'s length-prefixed metadata blob from `stream`.
/// Returns `Ok(None)` on a clean EOF before any bytes of the next frame
/// arrive — the signal that the sender has finished (spec §4.3: the
/// sender closes the stream once its queue is drained).
pub async fn read_frame(stream: &mut TcpStream, max_frame_bytes: u64) -> Result<Option<FileFrame>, CoreError> {
    let mut prefix = [0u8; LENGTH_PREFIX_WIDTH];
    match read_exact_or_eof(stream, &mut prefix).await? {
        false => return Ok(None),
        true => {}
    }

    let len = crate::codec::decode_length_prefix(&prefix, max_frame_bytes)?;
    let mut body = vec![0u8; len as usize];
    stream
        .read_exact(&mut body)
        .await
        .map_err(|e| CoreError::TruncatedTransfer(format!("frame metadata: {e}")))?;

    Ok(Some(decode_frame_metadata(&body)?))
}

/// Like `read_exact`, but returns `Ok(false)` instead of erroring when the
/// very first byte read hits EOF, and still reports a real error when EOF
/// lands mid-prefix (a genuinely truncated stream).
async fn read_exact_or_eof(stream: &mut TcpStream, buf: &mut [u8]) -> Result<bool, CoreError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream
            .read(&mut buf[filled..])
            .await
            .map_err(CoreError::from)?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(CoreError::TruncatedTransfer(
                "connection closed mid length-prefix".into(),
            ));
        }
        filled += n;
    }
    Ok(true)
}

/// Join `relative` onto `root`, rejecting anything that could escape it:
/// absolute paths, empty components, and `..` (spec §4.4 `UnsafePath`).
pub fn safe_join(root: &Path, relative: &str) -> Result<PathBuf, CoreError> {
    let relative = Path::new(relative);
    if relative.is_absolute() {
        return Err(CoreError::UnsafePath(format!(
            "absolute path in frame: {}",
            relative.display()
        )));
    }

    let mut joined = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(CoreError::UnsafePath(format!(
                    "path escapes destination root: {}",
                    relative.display()
                )));
            }
        }
    }
    Ok(joined)
}

fn wire_name(entry: &Path) -> String {
    entry
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn wire_type(is_dir: bool, entry: &Path) -> String {
    if is_dir {
        return "dir".to_string();
    }
    entry
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_join_accepts_nested_relative_path() {
        let root = Path::new("/tmp/dest");
        let joined = safe_join(root, "sub/dir/file.txt").unwrap();
        assert_eq!(joined, Path::new("/tmp/dest/sub/dir/file.txt"));
    }

    #[test]
    fn safe_join_rejects_parent_dir_escape() {
        let root = Path::new("/tmp/dest");
        assert!(safe_join(root, "../escape.txt").is_err());
        assert!(safe_join(root, "sub/../../escape.txt").is_err());
    }

    #[test]
    fn safe_join_rejects_absolute_path() {
        let root = Path::new("/tmp/dest");
        assert!(safe_join(root, "/etc/passwd").is_err());
    }

    #[test]
    fn wire_type_is_empty_for_extensionless_files() {
        assert_eq!(wire_type(false, Path::new("README")), "");
        assert_eq!(wire_type(false, Path::new("notes.txt")), "txt");
        assert_eq!(wire_type(true, Path::new("subdir")), "dir");
    }
}
