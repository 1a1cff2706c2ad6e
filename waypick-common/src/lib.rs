pub mod backend;
pub mod command_builder;
pub mod dispatcher;
pub mod duration;
pub mod error;
pub mod executor;
pub mod ipc;
pub mod media;
pub mod playback;
pub mod scanner;
pub mod selector;
pub mod session;
pub mod state;
pub mod thumbnail;

pub use backend::{BackendCatalog, BackendDescriptor, BackendKind, Capabilities, LaunchStyle};
pub use command_builder::{CommandBuilder, DispatchOptions, DispatchTarget, Invocation, SwwwTransition};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use duration::parse_duration;
pub use error::{ErrorReporting, Result, WaypickError};
pub use executor::{CommandRunner, ProcessExecutor};
pub use ipc::{IpcClient, IpcCommand, IpcResponse, IpcServer, MonitorStatus};
pub use media::{FillMode, MediaFile, MonitorTarget};
pub use playback::{send_playback, PlaybackAction};
pub use scanner::ScanOptions;
pub use selector::RandomSelector;
pub use session::{SessionSettings, WallpaperSession};
pub use state::{WallpaperRecord, WallpaperState};
pub use thumbnail::{Thumbnail, ThumbnailCache};
