//! Per-user single-instance lock.
//!
//! The first process binds a loopback listener on a random port and records
//! the port in a lock file inside the per-user data directory. A later launch
//! reads the file, forwards its arguments to the recorded port and exits once
//! the owner acknowledges. A lock file whose port does not answer with the
//! expected acknowledgement is stale and gets taken over.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

const FORWARD_TIMEOUT: Duration = Duration::from_secs(2);
const ACK: &str = "inbox-shell:ack";

pub enum InstanceRole {
    Primary(PrimaryInstance),
    /// Arguments were handed to the running instance.
    Forwarded,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct LockRecord {
    port: u16,
    pid: u32,
}

/// Holds the lock until dropped; dropping removes the lock file if it still
/// names this instance.
pub struct PrimaryInstance {
    listener: TcpListener,
    lock_file: PathBuf,
    port: u16,
}

impl PrimaryInstance {
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().context("lock listener has no address")
    }

    /// Serves forwarded launches on a background thread for the rest of the process.
    pub fn listen<F>(&self, on_second_instance: F) -> Result<thread::JoinHandle<()>>
    where
        F: Fn(Vec<String>) + Send + 'static,
    {
        let listener = self
            .listener
            .try_clone()
            .context("failed to share single-instance listener")?;
        Ok(thread::spawn(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => match read_forwarded(stream) {
                        Ok(args) => {
                            info!("Second instance launched with {} argument(s)", args.len());
                            on_second_instance(args);
                        }
                        Err(err) => warn!("Ignoring malformed second-instance message: {:#}", err),
                    },
                    Err(err) => warn!("Single-instance listener error: {}", err),
                }
            }
        }))
    }
}

impl Drop for PrimaryInstance {
    fn drop(&mut self) {
        if read_lock(&self.lock_file).map(|addr| addr.port()) == Some(self.port)
            && let Err(err) = fs::remove_file(&self.lock_file)
        {
            warn!("Failed to remove lock file {:?}: {}", self.lock_file, err);
        }
    }
}

/// Takes the per-user lock at `lock_file`, or forwards `args` to whoever holds it.
pub fn acquire(lock_file: &Path, args: &[String]) -> Result<InstanceRole> {
    if let Some(addr) = read_lock(lock_file) {
        match forward(addr, args) {
            Ok(()) => return Ok(InstanceRole::Forwarded),
            Err(err) => debug!("Lock holder at {} is gone ({:#}), taking over", addr, err),
        }
    }

    let listener = TcpListener::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0))
        .context("failed to bind single-instance listener")?;
    let port = listener.local_addr().context("lock listener has no address")?.port();
    write_lock(lock_file, port)?;

    // Another launch may have recorded itself between our read and write.
    if let Some(addr) = read_lock(lock_file)
        && addr.port() != port
    {
        if forward(addr, args).is_ok() {
            return Ok(InstanceRole::Forwarded);
        }
        write_lock(lock_file, port)?;
    }

    debug!("Holding single-instance lock on port {}", port);
    Ok(InstanceRole::Primary(PrimaryInstance {
        listener,
        lock_file: lock_file.to_path_buf(),
        port,
    }))
}

fn read_lock(lock_file: &Path) -> Option<SocketAddr> {
    let content = fs::read_to_string(lock_file).ok()?;
    let record: LockRecord = serde_json::from_str(&content).ok()?;
    Some(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, record.port)))
}

fn write_lock(lock_file: &Path, port: u16) -> Result<()> {
    if let Some(parent) = lock_file.parent() {
        fs::create_dir_all(parent).context("failed to create lock directory")?;
    }
    let record = LockRecord {
        port,
        pid: std::process::id(),
    };
    let content = serde_json::to_string(&record).context("failed to encode lock record")?;
    let staging = lock_file.with_extension("lock.tmp");
    fs::write(&staging, content).context("failed to write lock file")?;
    fs::rename(&staging, lock_file).context("failed to replace lock file")?;
    Ok(())
}

/// Sends `args` to the running instance and waits for its acknowledgement.
pub fn forward(addr: SocketAddr, args: &[String]) -> Result<()> {
    let mut stream = TcpStream::connect_timeout(&addr, FORWARD_TIMEOUT)
        .context("nothing listens on the recorded port")?;
    stream.set_read_timeout(Some(FORWARD_TIMEOUT))?;

    let mut line = serde_json::to_string(args).context("failed to encode arguments")?;
    line.push('\n');
    stream
        .write_all(line.as_bytes())
        .context("failed to forward arguments")?;

    let mut reply = String::new();
    BufReader::new(&stream)
        .read_line(&mut reply)
        .context("running instance did not acknowledge")?;
    if reply.trim() != ACK {
        bail!("unexpected reply from running instance: {:?}", reply.trim());
    }
    Ok(())
}

fn read_forwarded(stream: TcpStream) -> Result<Vec<String>> {
    stream.set_read_timeout(Some(FORWARD_TIMEOUT))?;
    let mut line = String::new();
    BufReader::new(&stream).read_line(&mut line)?;
    let args: Vec<String> = serde_json::from_str(line.trim()).context("arguments are not a JSON list")?;
    let mut writer = &stream;
    writer.write_all(format!("{}\n", ACK).as_bytes())?;
    Ok(args)
}
