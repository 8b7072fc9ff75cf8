//! Receiver role of the transfer engine (spec §4.4 "Receiving").

use std::path::PathBuf;

use log::warn;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;
use crate::supervisor::EventRecord;

use super::{read_frame, safe_join, CHUNK_SIZE};

/// Spawn the receiver-role transfer task against an already-established
/// session stream, returning a handle the supervisor can await to learn
/// when the session ends (spec §4.7).
pub fn spawn_receiver(
    stream: TcpStream,
    dest_root: PathBuf,
    max_frame_bytes: u64,
    events: mpsc::Sender<EventRecord>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(stream, dest_root, max_frame_bytes, events, cancel))
}

async fn run(
    mut stream: TcpStream,
    dest_root: PathBuf,
    max_frame_bytes: u64,
    events: mpsc::Sender<EventRecord>,
    cancel: CancellationToken,
) {
    if let Err(e) = fs::create_dir_all(&dest_root).await {
        let _ = events
            .send(EventRecord::TransferError(
                dest_root.display().to_string(),
                format!("failed to create destination root: {e}"),
            ))
            .await;
        return;
    }

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return,
            frame = read_frame(&mut stream, max_frame_bytes) => frame,
        };

        let frame = match frame {
            Ok(Some(frame)) => frame,
            Ok(None) => return,
            Err(e) => {
                warn!("receiver: session ended with error: {e}");
                let _ = events
                    .send(EventRecord::TransferError("<session>".into(), e.to_string()))
                    .await;
                return;
            }
        };

        let relative = if frame.full_path.is_empty() {
            frame.file_name.clone()
        } else {
            frame.full_path.clone()
        };

        let target = match safe_join(&dest_root, &relative) {
            Ok(p) => p,
            Err(e) => {
                warn!("receiver: rejecting frame: {e}");
                let _ = events
                    .send(EventRecord::TransferError(relative, e.to_string()))
                    .await;
                // Fatal for the session (spec §7 UnsafePath): the
                // frame's payload bytes, if any, were never drained, so
                // the stream can no longer be parsed as frames.
                return;
            }
        };

        if frame.is_dir {
            if let Err(e) = fs::create_dir_all(&target).await {
                let _ = events
                    .send(EventRecord::TransferError(
                        relative,
                        format!("mkdir failed: {e}"),
                    ))
                    .await;
                // Fatal for the session (spec §7 FilesystemError).
                return;
            }
            continue;
        }

        match receive_file(&mut stream, &target, frame.file_size, &events).await {
            Ok(()) => {
                let _ = events.send(EventRecord::TransferComplete(relative)).await;
            }
            Err(e) => {
                warn!("receiver: {relative} failed: {e}");
                let _ = events
                    .send(EventRecord::TransferError(relative, e.to_string()))
                    .await;
                return;
            }
        }
    }
}

async fn receive_file(
    stream: &mut TcpStream,
    target: &std::path::Path,
    size: u64,
    events: &mpsc::Sender<EventRecord>,
) -> Result<(), CoreError> {
    use tokio::io::AsyncWriteExt;

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(CoreError::FilesystemError)?;
    }

    let mut file = fs::File::create(target)
        .await
        .map_err(CoreError::FilesystemError)?;

    let mut remaining = size;
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut received: u64 = 0;

    while remaining > 0 {
        let want = remaining.min(CHUNK_SIZE as u64) as usize;
        let n = stream
            .read(&mut buf[..want])
            .await
            .map_err(CoreError::from)?;
        if n == 0 {
            return Err(CoreError::TruncatedTransfer(format!(
                "{}: expected {size} bytes, got {received}",
                target.display()
            )));
        }
        file.write_all(&buf[..n])
            .await
            .map_err(CoreError::FilesystemError)?;
        received += n as u64;
        remaining -= n as u64;
        let _ = events.send(EventRecord::TransferProgress(received)).await;
    }
    Ok(())
}
