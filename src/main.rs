//! Thin terminal driver: reads commands from stdin, prints the supervisor's
//! event stream. Grounded loosely on `CLI/src/main.rs`'s shape (load
//! config, print a connection banner, drive everything from one
//! `#[tokio::main]` loop) but intentionally thin — no TUI, since spec §5
//! treats the interactive front-end as an external collaborator.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;
use lanshare::codec::PeerDescriptor;
use lanshare::config::{default_config_dir, Config};
use lanshare::{logging, spawn_supervisor, EventRecord};

#[tokio::main]
async fn main() -> Result<()> {
    let config_dir = default_config_dir();
    logging::setup_logger(&config_dir)?;

    let config = Config::load_from_dir(&config_dir)?;
    println!(
        "lanshare ready — discovery port {}, session port {}",
        config.discovery_port, config.session_port
    );
    println!("commands: list | select <n> | send <path> | quit");

    let handle_rt = tokio::runtime::Handle::current();
    let (handle, mut events) = spawn_supervisor(&handle_rt, config);
    handle.start().await;

    let mut discovered: Vec<PeerDescriptor> = Vec::new();
    let mut lines = spawn_stdin_reader();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if let EventRecord::PeerDiscovered(peer) = &event {
                    discovered.push(peer.clone());
                }
                print_event(&event);
            }
            line = lines.recv() => {
                let Some(line) = line else { break };
                let mut parts = line.trim().splitn(2, ' ');
                match parts.next().unwrap_or("") {
                    "list" => {
                        for (i, peer) in discovered.iter().enumerate() {
                            println!("  [{i}] {} ({}:{})", peer.name, peer.ip, peer.port);
                        }
                    }
                    "select" => {
                        if let Some(index) = parts.next().and_then(|s| s.trim().parse::<usize>().ok()) {
                            if let Some(peer) = discovered.get(index).cloned() {
                                handle.select_peer(peer).await;
                            } else {
                                println!("no such peer index: {index}");
                            }
                        }
                    }
                    "send" => {
                        if let Some(path) = parts.next() {
                            handle.enqueue_for_send(PathBuf::from(path.trim())).await;
                        }
                    }
                    "quit" | "exit" => {
                        handle.shutdown().await;
                        break;
                    }
                    "" => {}
                    other => println!("unrecognized command: {other}"),
                }
                io::stdout().flush()?;
            }
        }
    }

    Ok(())
}

/// Bridge blocking stdin reads onto an async channel so the main loop can
/// `select!` between stdin lines and supervisor events.
fn spawn_stdin_reader() -> tokio::sync::mpsc::Receiver<String> {
    let (tx, rx) = tokio::sync::mpsc::channel(8);
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        return;
                    }
                }
                Err(_) => return,
            }
        }
    });
    rx
}

fn print_event(event: &EventRecord) {
    match event {
        EventRecord::Log(level, message) => println!("[{level}] {message}"),
        EventRecord::PeerDiscovered(peer) => {
            println!("peer discovered: {} ({}:{})", peer.name, peer.ip, peer.port)
        }
        EventRecord::SessionEstablished(role) => println!("session established as {role:?}"),
        EventRecord::TransferProgress(bytes) => println!("... {bytes} bytes transferred"),
        EventRecord::TransferComplete(path) => println!("done: {path}"),
        EventRecord::TransferError(path, err) => println!("error on {path}: {err}"),
    }
}
