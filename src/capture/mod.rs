use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use socket2::{Domain, Socket, Type};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::Config;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to bind capture listener")]
    Bind(#[source] io::Error),
    #[error("failed to create capture directory {0}")]
    CreateDir(PathBuf, #[source] io::Error),
}

/// Finds the first `log<N>.flm` path under `dir` that doesn't already
/// exist, starting from `log0.flm`.
fn next_capture_path(dir: &Path) -> PathBuf {
    for n in 0.. {
        let candidate = dir.join(format!("log{n}.flm"));
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!("u32 space exhausted")
}

/// One accepted connection: reads raw bytes in `config.read_chunk_size`
/// chunks and appends them verbatim to a lazily created capture file. The
/// file is only created once the first byte arrives, so a connection that
/// opens and closes without sending data leaves no artifact.
pub struct Connection {
    stream: TcpStream,
    capture_dir: PathBuf,
    read_chunk_size: usize,
}

impl Connection {
    pub fn run(mut self) {
        let mut buf = vec![0u8; self.read_chunk_size];
        let mut file: Option<File> = None;
        loop {
            let n = match self.stream.read(&mut buf) {
                Ok(0) => {
                    debug!("connection closed (EOF)");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    error!(error = %e, "capture connection read failed");
                    break;
                }
            };
            let f = match &mut file {
                Some(f) => f,
                None => {
                    if let Err(e) = fs::create_dir_all(&self.capture_dir) {
                        error!(error = %e, dir = %self.capture_dir.display(), "failed to create capture directory");
                        break;
                    }
                    let path = next_capture_path(&self.capture_dir);
                    match File::create(&path) {
                        Ok(created) => {
                            info!(path = %path.display(), "capture file opened");
                            file = Some(created);
                            file.as_mut().unwrap()
                        }
                        Err(e) => {
                            error!(error = %e, path = %path.display(), "failed to create capture file");
                            break;
                        }
                    }
                }
            };
            if let Err(e) = f.write_all(&buf[..n]) {
                error!(error = %e, "capture file write failed");
                break;
            }
        }
    }
}

/// Accepts TCP connections on `config.capture_port` and spawns one thread
/// per connection running a [`Connection`]. The accept loop polls a
/// shutdown flag at `config.accept_timeout` intervals rather than blocking
/// forever, so a caller can request a clean stop.
pub struct Server {
    listener: TcpListener,
    config: Config,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    pub fn bind(config: Config) -> Result<Self, Error> {
        let addr: SocketAddr = ([0, 0, 0, 0], config.capture_port).into();
        let socket = Socket::new(Domain::IPV4, Type::STREAM, None).map_err(Error::Bind)?;
        socket.set_reuse_address(true).map_err(Error::Bind)?;
        socket.bind(&addr.into()).map_err(Error::Bind)?;
        socket.listen(config.listen_backlog).map_err(Error::Bind)?;
        socket.set_nonblocking(true).map_err(Error::Bind)?;
        let listener: TcpListener = socket.into();
        Ok(Self {
            listener,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Runs the accept loop until `shutdown_handle()` is set to `true`.
    pub fn serve(&self) {
        info!(port = self.config.capture_port, "capture server listening");
        while !self.shutdown.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    info!(%addr, "accepted capture connection");
                    let connection = Connection {
                        stream,
                        capture_dir: self.config.capture_dir.clone(),
                        read_chunk_size: self.config.read_chunk_size,
                    };
                    thread::spawn(move || connection.run());
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(self.config.accept_timeout);
                }
                Err(e) => {
                    error!(error = %e, "accept failed");
                }
            }
        }
        info!("capture server shutting down");
    }
}
