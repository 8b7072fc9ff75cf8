//! Sender role of the transfer engine (spec §4.4 "Sending").
//!
//! The initiator walks each enqueued path itself rather than pulling from
//! a `walkdir`-style iterator up front: directories are expanded lazily,
//! one level at a time, as their `FileFrame` is sent — so a deeply nested
//! tree never needs the whole listing in memory at once.

use std::collections::VecDeque;
use std::path::PathBuf;

use log::warn;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::codec::FileFrame;
use crate::error::CoreError;
use crate::supervisor::EventRecord;

use super::{wire_name, wire_type, write_frame, CHUNK_SIZE};

/// One entry waiting to be sent: its absolute local path and the
/// slash-joined relative path advertised to the peer as `fullPath`.
struct QueueEntry {
    local: PathBuf,
    wire_path: String,
}

/// Spawn the sender-role transfer task and return the queue it drains
/// enqueued local paths from, plus a handle the supervisor can await to
/// learn when the session ends (spec §4.7: `Transferring` lasts until the
/// transfer engine's task finishes, then the state machine moves on).
pub fn spawn_sender(
    stream: TcpStream,
    max_frame_bytes: u64,
    events: mpsc::Sender<EventRecord>,
    cancel: CancellationToken,
) -> (mpsc::UnboundedSender<PathBuf>, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run(stream, max_frame_bytes, events, cancel, rx));
    (tx, handle)
}

async fn run(
    mut stream: TcpStream,
    max_frame_bytes: u64,
    events: mpsc::Sender<EventRecord>,
    cancel: CancellationToken,
    mut incoming: mpsc::UnboundedReceiver<PathBuf>,
) {
    let mut pending: VecDeque<QueueEntry> = VecDeque::new();

    loop {
        if pending.is_empty() {
            tokio::select! {
                _ = cancel.cancelled() => return,
                item = incoming.recv() => match item {
                    Some(path) => pending.push_back(top_level_entry(path)),
                    None => return,
                },
            }
            continue;
        }

        if cancel.is_cancelled() {
            return;
        }

        while let Ok(path) = incoming.try_recv() {
            pending.push_back(top_level_entry(path));
        }

        let entry = pending.pop_front().unwrap();
        match send_entry(&mut stream, max_frame_bytes, &entry, &events).await {
            Ok(children) => {
                pending.extend(children);
            }
            Err(e) => {
                warn!("sender: failed on {}: {e}", entry.wire_path);
                let _ = events
                    .send(EventRecord::TransferError(entry.wire_path, e.to_string()))
                    .await;
            }
        }
    }
}

fn top_level_entry(local: PathBuf) -> QueueEntry {
    let wire_path = wire_name(&local);
    QueueEntry { local, wire_path }
}

/// Send one queue entry's `FileFrame` (and payload, if a file). Directories
/// return their immediate children, newly queued with `wire_path`-relative
/// names, instead of a payload.
async fn send_entry(
    stream: &mut TcpStream,
    max_frame_bytes: u64,
    entry: &QueueEntry,
    events: &mpsc::Sender<EventRecord>,
) -> Result<Vec<QueueEntry>, CoreError> {
    let metadata = fs::metadata(&entry.local)
        .await
        .map_err(CoreError::FilesystemError)?;
    let is_dir = metadata.is_dir();

    let frame = FileFrame {
        file_name: wire_name(&entry.local),
        file_type: wire_type(is_dir, &entry.local),
        file_size: if is_dir { 0 } else { metadata.len() },
        is_dir,
        full_path: entry.wire_path.clone(),
    };

    if !is_dir && frame.file_size > max_frame_bytes {
        return Err(CoreError::MalformedFrame(format!(
            "{} exceeds max_frame_bytes ({} > {})",
            entry.wire_path, frame.file_size, max_frame_bytes
        )));
    }

    write_frame(stream, &frame).await?;

    if is_dir {
        return list_children(entry).await;
    }

    stream_file_payload(stream, &entry.local, frame.file_size).await?;
    let _ = events
        .send(EventRecord::TransferComplete(entry.wire_path.clone()))
        .await;
    Ok(Vec::new())
}

async fn list_children(entry: &QueueEntry) -> Result<Vec<QueueEntry>, CoreError> {
    let mut children = Vec::new();
    let mut read_dir = fs::read_dir(&entry.local)
        .await
        .map_err(CoreError::FilesystemError)?;

    while let Some(child) = read_dir.next_entry().await.map_err(CoreError::FilesystemError)? {
        let name = child.file_name().to_string_lossy().into_owned();
        children.push(QueueEntry {
            local: child.path(),
            wire_path: format!("{}/{}", entry.wire_path, name),
        });
    }
    Ok(children)
}

async fn stream_file_payload(stream: &mut TcpStream, path: &std::path::Path, size: u64) -> Result<(), CoreError> {
    use tokio::io::AsyncWriteExt;

    let mut file = fs::File::open(path).await.map_err(CoreError::FilesystemError)?;
    let mut remaining = size;
    let mut buf = vec![0u8; CHUNK_SIZE];

    while remaining > 0 {
        let want = remaining.min(CHUNK_SIZE as u64) as usize;
        let n = file
            .read(&mut buf[..want])
            .await
            .map_err(CoreError::FilesystemError)?;
        if n == 0 {
            return Err(CoreError::TruncatedTransfer(format!(
                "{}: file shrank during read",
                path.display()
            )));
        }
        stream.write_all(&buf[..n]).await.map_err(CoreError::from)?;
        remaining -= n as u64;
    }
    Ok(())
}
