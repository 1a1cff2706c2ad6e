use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use crate::error::{IpcError, WaypickError};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpcCommand {
    Next { monitor: Option<String> },
    Pause,
    Resume,
    TogglePause,
    Reload,
    Status,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IpcResponse {
    Success { message: String },
    Error { message: String },
    Status {
        monitors: Vec<MonitorStatus>,
        paused: bool,
        backend: String,
        interval_secs: u64,
        next_change_secs: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub name: String,
    pub current_wallpaper: Option<String>,
}

pub fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("waypick.sock")
}

pub struct IpcClient {
    socket_path: PathBuf,
}

impl Default for IpcClient {
    fn default() -> Self {
        Self::new()
    }
}

impl IpcClient {
    pub fn new() -> Self {
        Self::with_socket_path(default_socket_path())
    }

    pub fn with_socket_path(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub fn send_command(&self, command: &IpcCommand) -> Result<IpcResponse> {
        let mut stream = UnixStream::connect(&self.socket_path).map_err(|source| {
            WaypickError::Ipc(IpcError::Connection {
                path: self.socket_path.clone(),
                source,
            })
        })?;

        let command_json = serde_json::to_string(command)?;
        stream
            .write_all(command_json.as_bytes())
            .and_then(|()| stream.shutdown(std::net::Shutdown::Write))
            .map_err(|_| WaypickError::Ipc(IpcError::DaemonUnresponsive))?;

        let mut response = String::new();
        stream
            .read_to_string(&mut response)
            .map_err(|_| WaypickError::Ipc(IpcError::DaemonUnresponsive))?;

        serde_json::from_str(&response).map_err(|_| WaypickError::Ipc(IpcError::InvalidMessage))
    }
}

pub struct IpcServer {
    socket_path: PathBuf,
}

impl Default for IpcServer {
    fn default() -> Self {
        Self::new()
    }
}

impl IpcServer {
    pub fn new() -> Self {
        Self::with_socket_path(default_socket_path())
    }

    pub fn with_socket_path(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn bind(&self) -> Result<UnixListener> {
        let bind_error = |source| {
            WaypickError::Ipc(IpcError::Connection {
                path: self.socket_path.clone(),
                source,
            })
        };

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(bind_error)?;
        }
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent).map_err(bind_error)?;
        }

        let listener = UnixListener::bind(&self.socket_path).map_err(bind_error)?;
        log::info!("IPC server listening on {:?}", self.socket_path);
        Ok(listener)
    }

    pub fn start<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(IpcCommand) -> IpcResponse + Send + Clone + 'static,
    {
        let listener = self.bind()?;
        Self::serve(listener, handler);
        Ok(())
    }

    pub fn serve<F>(listener: UnixListener, handler: F)
    where
        F: Fn(IpcCommand) -> IpcResponse + Send + Clone + 'static,
    {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let handler = handler.clone();
                    std::thread::spawn(move || {
                        if let Err(e) = Self::handle_connection(stream, &handler) {
                            log::error!("Error handling IPC connection: {}", e);
                        }
                    });
                }
                Err(e) => {
                    log::error!("Error accepting IPC connection: {}", e);
                }
            }
        }
    }

    fn handle_connection<F>(mut stream: UnixStream, handler: &F) -> Result<()>
    where
        F: Fn(IpcCommand) -> IpcResponse,
    {
        let mut command_json = String::new();
        stream
            .read_to_string(&mut command_json)
            .map_err(|_| WaypickError::Ipc(IpcError::DaemonUnresponsive))?;

        let response = match serde_json::from_str::<IpcCommand>(&command_json) {
            Ok(command) => {
                log::debug!("IPC command: {:?}", command);
                handler(command)
            }
            Err(e) => IpcResponse::Error {
                message: format!("Invalid command: {}", e),
            },
        };

        let response_json = serde_json::to_string(&response)?;
        stream
            .write_all(response_json.as_bytes())
            .map_err(|_| WaypickError::Ipc(IpcError::DaemonUnresponsive))?;

        Ok(())
    }
}
