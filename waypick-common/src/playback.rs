use std::fmt;
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::str::FromStr;

use crate::backend::BackendDescriptor;
use crate::command_builder::mpv_socket_path;
use crate::error::{ProcessError, ValidationError, WaypickError};
use crate::media::MonitorTarget;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackAction {
    Pause,
    Stop,
    Mute,
}

impl PlaybackAction {
    pub fn mpv_command(&self) -> &'static str {
        match self {
            PlaybackAction::Pause => "cycle pause",
            PlaybackAction::Stop => "quit",
            PlaybackAction::Mute => "cycle mute",
        }
    }
}

impl fmt::Display for PlaybackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackAction::Pause => "pause",
            PlaybackAction::Stop => "stop",
            PlaybackAction::Mute => "mute",
        };
        f.write_str(name)
    }
}

impl FromStr for PlaybackAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pause" => Ok(PlaybackAction::Pause),
            "stop" => Ok(PlaybackAction::Stop),
            "mute" => Ok(PlaybackAction::Mute),
            _ => Err(ValidationError::General {
                message: format!("Unknown playback action '{}'", s),
            }),
        }
    }
}

pub fn send_playback(
    backend: &BackendDescriptor,
    monitor: &MonitorTarget,
    action: PlaybackAction,
) -> Result<()> {
    backend.require("playback control", backend.capabilities.playback)?;
    let socket = mpv_socket_path(monitor);
    send_to_socket(Path::new(&socket), action)?;
    log::info!("Sent {} to {} on {}", action, backend.name, monitor);
    Ok(())
}

pub fn send_to_socket(socket: &Path, action: PlaybackAction) -> Result<()> {
    let socket_error = |source| {
        WaypickError::Process(ProcessError::Socket {
            path: socket.to_path_buf(),
            source,
        })
    };

    let mut stream = UnixStream::connect(socket).map_err(socket_error)?;
    stream
        .write_all(format!("{}\n", action.mpv_command()).as_bytes())
        .map_err(socket_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use crate::error::BackendError;
    use std::io::Read;
    use std::os::unix::net::UnixListener;
    use tempfile::tempdir;

    #[test]
    fn test_send_to_socket_writes_command_line() {
        let temp_dir = tempdir().unwrap();
        let socket = temp_dir.path().join("mpv-socket-DP-1");
        let listener = UnixListener::bind(&socket).unwrap();

        let reader = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = String::new();
            stream.read_to_string(&mut received).unwrap();
            received
        });

        send_to_socket(&socket, PlaybackAction::Mute).unwrap();
        assert_eq!(reader.join().unwrap(), "cycle mute\n");
    }

    #[test]
    fn test_send_to_missing_socket_fails() {
        let temp_dir = tempdir().unwrap();
        let err = send_to_socket(&temp_dir.path().join("absent"), PlaybackAction::Pause).unwrap_err();
        assert!(matches!(err, WaypickError::Process(ProcessError::Socket { .. })));
    }

    #[test]
    fn test_playback_requires_capable_backend() {
        let feh = BackendDescriptor::for_kind(BackendKind::Feh);
        let err = send_playback(&feh, &MonitorTarget::All, PlaybackAction::Stop).unwrap_err();
        assert!(matches!(err, WaypickError::Backend(BackendError::Unsupported { .. })));
    }

    #[test]
    fn test_action_commands() {
        assert_eq!(PlaybackAction::Pause.mpv_command(), "cycle pause");
        assert_eq!(PlaybackAction::Stop.mpv_command(), "quit");
        assert_eq!("MUTE".parse::<PlaybackAction>().unwrap(), PlaybackAction::Mute);
        assert!("rewind".parse::<PlaybackAction>().is_err());
    }
}
