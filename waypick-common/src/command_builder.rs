use std::fmt;
use std::path::Path;

use crate::backend::{BackendDescriptor, BackendKind};
use crate::media::{FillMode, MediaFile, MonitorTarget};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Spawn and return without waiting; used for processes that keep the wallpaper alive.
    pub detach: bool,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            detach: false,
        }
    }

    pub fn detached(mut self) -> Self {
        self.detach = true;
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonRequirement {
    pub probe: Invocation,
    pub start: Invocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispatchPlan {
    /// Best-effort cleanup; failures are ignored.
    pub prelude: Vec<Invocation>,
    pub daemon: Option<DaemonRequirement>,
    /// Run in order; the first failure fails the dispatch.
    pub steps: Vec<Invocation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwwwTransition {
    pub transition_type: String,
    pub step: u32,
    pub angle: u32,
    pub duration: f32,
    pub fps: u32,
}

impl Default for SwwwTransition {
    fn default() -> Self {
        Self {
            transition_type: "any".to_string(),
            step: 90,
            angle: 0,
            duration: 2.0,
            fps: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOptions {
    pub color: String,
    pub swww: SwwwTransition,
    pub mpvpaper_sound: bool,
    pub post_command: Option<String>,
    pub no_post_command: bool,
    pub stop_other_backends: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            color: "#ffffff".to_string(),
            swww: SwwwTransition::default(),
            mpvpaper_sound: false,
            post_command: None,
            no_post_command: false,
            stop_other_backends: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchTarget {
    pub file: MediaFile,
    pub monitor: MonitorTarget,
    pub fill: FillMode,
    pub options: DispatchOptions,
}

pub fn mpv_socket_path(monitor: &MonitorTarget) -> String {
    format!("/tmp/mpv-socket-{}", monitor)
}

// pkill patterns are extended regexes matched against the whole command line.
fn escape_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if "\\.[]{}()*+?^$|".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub struct CommandBuilder;

impl CommandBuilder {
    // Build the plan for `target`. The monitor must already be degraded to
    // `All` for backends without per-monitor support.
    pub fn build(backend: &BackendDescriptor, target: &DispatchTarget) -> DispatchPlan {
        let path = target.file.path();
        let mut plan = match backend.kind {
            BackendKind::None => DispatchPlan::default(),
            BackendKind::Swaybg => Self::swaybg(path, target),
            BackendKind::Swww => Self::swww(path, target),
            BackendKind::Feh => Self::feh(path, target),
            BackendKind::Wallutils => Self::wallutils(path, target),
            BackendKind::Hyprpaper => Self::hyprpaper(path, target),
            BackendKind::Mpvpaper => Self::mpvpaper(path, target),
        };

        if target.options.stop_other_backends {
            let mut stops = Self::stop_other_backends(backend.kind);
            stops.append(&mut plan.prelude);
            plan.prelude = stops;
        }
        plan
    }

    pub fn stop_other_backends(keep: BackendKind) -> Vec<Invocation> {
        [
            (BackendKind::Swaybg, "swaybg"),
            (BackendKind::Mpvpaper, "mpvpaper"),
            (BackendKind::Swww, "swww-daemon"),
            (BackendKind::Hyprpaper, "hyprpaper"),
        ]
        .into_iter()
        .filter(|(kind, _)| *kind != keep)
        .map(|(_, process)| Invocation::new("killall", [process]))
        .collect()
    }

    fn swaybg(path: &Path, target: &DispatchTarget) -> DispatchPlan {
        let kill = match &target.monitor {
            MonitorTarget::All => Invocation::new("killall", ["swaybg"]),
            MonitorTarget::Named(name) => Invocation::new(
                "pkill",
                ["-f".to_string(), format!("^swaybg -o {}( |$)", escape_pattern(name))],
            ),
        };

        let mut args = Vec::new();
        if let MonitorTarget::Named(name) = &target.monitor {
            args.extend(["-o".to_string(), name.clone()]);
        }
        args.extend([
            "-i".to_string(),
            path.to_string_lossy().into_owned(),
            "-m".to_string(),
            target.fill.as_str().to_string(),
            "-c".to_string(),
            target.options.color.clone(),
        ]);

        DispatchPlan {
            prelude: vec![kill],
            daemon: None,
            steps: vec![Invocation::new("swaybg", args).detached()],
        }
    }

    fn swww(path: &Path, target: &DispatchTarget) -> DispatchPlan {
        let resize = match target.fill {
            FillMode::Fill | FillMode::Stretch => "crop",
            FillMode::Fit => "fit",
            FillMode::Center | FillMode::Tile => "no",
        };
        let transition = &target.options.swww;

        let mut args = vec![
            "img".to_string(),
            path.to_string_lossy().into_owned(),
            format!("--resize={}", resize),
            format!("--fill-color={}", target.options.color.trim_start_matches('#')),
            format!("--transition-type={}", transition.transition_type),
            format!("--transition-step={}", transition.step),
            format!("--transition-angle={}", transition.angle),
            format!("--transition-duration={}", transition.duration),
            format!("--transition-fps={}", transition.fps),
        ];
        if let MonitorTarget::Named(name) = &target.monitor {
            args.extend(["--outputs".to_string(), name.clone()]);
        }

        DispatchPlan {
            prelude: Vec::new(),
            daemon: Some(DaemonRequirement {
                probe: Invocation::new("swww", ["query"]),
                start: Invocation::new("swww-daemon", Vec::<String>::new()).detached(),
            }),
            steps: vec![Invocation::new("swww", args)],
        }
    }

    fn feh(path: &Path, target: &DispatchTarget) -> DispatchPlan {
        let mode = match target.fill {
            FillMode::Fill => "--bg-fill",
            FillMode::Stretch => "--bg-scale",
            FillMode::Fit => "--bg-max",
            FillMode::Center => "--bg-center",
            FillMode::Tile => "--bg-tile",
        };
        let args = vec![
            mode.to_string(),
            "--image-bg".to_string(),
            target.options.color.clone(),
            path.to_string_lossy().into_owned(),
        ];
        DispatchPlan {
            steps: vec![Invocation::new("feh", args)],
            ..DispatchPlan::default()
        }
    }

    fn wallutils(path: &Path, target: &DispatchTarget) -> DispatchPlan {
        let mode = match target.fill {
            FillMode::Fill | FillMode::Fit => "scale",
            FillMode::Stretch => "stretch",
            FillMode::Center => "center",
            FillMode::Tile => "tile",
        };
        let args = vec![
            "--mode".to_string(),
            mode.to_string(),
            path.to_string_lossy().into_owned(),
        ];
        DispatchPlan {
            steps: vec![Invocation::new("setwallpaper", args)],
            ..DispatchPlan::default()
        }
    }

    fn hyprpaper(path: &Path, target: &DispatchTarget) -> DispatchPlan {
        let path = path.to_string_lossy().into_owned();
        let monitor = target.monitor.name().unwrap_or("");
        DispatchPlan {
            prelude: Vec::new(),
            daemon: Some(DaemonRequirement {
                probe: Invocation::new("pidof", ["hyprpaper"]),
                start: Invocation::new("hyprpaper", Vec::<String>::new()).detached(),
            }),
            steps: vec![
                Invocation::new("hyprctl", ["hyprpaper", "unload", "all"]),
                Invocation::new("hyprctl", ["hyprpaper".to_string(), "preload".to_string(), path.clone()]),
                Invocation::new(
                    "hyprctl",
                    ["hyprpaper".to_string(), "wallpaper".to_string(), format!("{},{}", monitor, path)],
                ),
            ],
        }
    }

    fn mpvpaper(path: &Path, target: &DispatchTarget) -> DispatchPlan {
        let output = target.monitor.name().unwrap_or("*");
        let kill = Invocation::new(
            "pkill",
            ["-f".to_string(), format!("^mpvpaper( .*)? {}( |$)", escape_pattern(output))],
        );

        let mut mpv_options = vec![format!("input-ipc-server={}", mpv_socket_path(&target.monitor))];
        if !target.options.mpvpaper_sound {
            mpv_options.push("no-audio".to_string());
        }
        mpv_options.push("loop".to_string());
        match target.fill {
            FillMode::Fill => mpv_options.push("panscan=1.0".to_string()),
            FillMode::Fit => mpv_options.push("panscan=0.0".to_string()),
            FillMode::Stretch => mpv_options.push("keepaspect=no".to_string()),
            FillMode::Center | FillMode::Tile => {}
        }

        let args = vec![
            "-o".to_string(),
            mpv_options.join(" "),
            output.to_string(),
            path.to_string_lossy().into_owned(),
        ];

        DispatchPlan {
            prelude: vec![kill],
            daemon: None,
            steps: vec![Invocation::new("mpvpaper", args).detached()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(monitor: &str, fill: FillMode) -> DispatchTarget {
        DispatchTarget {
            file: MediaFile::new("/pics/sunset beach.jpg"),
            monitor: MonitorTarget::from(monitor),
            fill,
            options: DispatchOptions {
                color: "#1e1e2e".to_string(),
                stop_other_backends: false,
                ..DispatchOptions::default()
            },
        }
    }

    fn plan(kind: BackendKind, monitor: &str, fill: FillMode) -> DispatchPlan {
        CommandBuilder::build(&BackendDescriptor::for_kind(kind), &target(monitor, fill))
    }

    #[test]
    fn test_swaybg_named_monitor() {
        let plan = plan(BackendKind::Swaybg, "DP-1", FillMode::Tile);
        assert_eq!(plan.prelude, vec![Invocation::new("pkill", ["-f", "^swaybg -o DP-1( |$)"])]);
        assert_eq!(
            plan.steps,
            vec![Invocation::new(
                "swaybg",
                ["-o", "DP-1", "-i", "/pics/sunset beach.jpg", "-m", "tile", "-c", "#1e1e2e"]
            )
            .detached()]
        );
    }

    #[test]
    fn test_swaybg_all_monitors() {
        let plan = plan(BackendKind::Swaybg, "All", FillMode::Fill);
        assert_eq!(plan.prelude, vec![Invocation::new("killall", ["swaybg"])]);
        assert_eq!(
            plan.steps[0].args,
            vec!["-i", "/pics/sunset beach.jpg", "-m", "fill", "-c", "#1e1e2e"]
        );
    }

    #[test]
    fn test_swww_command() {
        let plan = plan(BackendKind::Swww, "HDMI-A-1", FillMode::Center);
        assert_eq!(plan.daemon.as_ref().unwrap().probe, Invocation::new("swww", ["query"]));
        assert!(plan.daemon.as_ref().unwrap().start.detach);
        assert_eq!(
            plan.steps,
            vec![Invocation::new(
                "swww",
                [
                    "img",
                    "/pics/sunset beach.jpg",
                    "--resize=no",
                    "--fill-color=1e1e2e",
                    "--transition-type=any",
                    "--transition-step=90",
                    "--transition-angle=0",
                    "--transition-duration=2",
                    "--transition-fps=60",
                    "--outputs",
                    "HDMI-A-1",
                ]
            )]
        );
    }

    #[test]
    fn test_swww_fill_mapping() {
        let resize = |fill| plan(BackendKind::Swww, "All", fill).steps[0].args[2].clone();
        assert_eq!(resize(FillMode::Fill), "--resize=crop");
        assert_eq!(resize(FillMode::Stretch), "--resize=crop");
        assert_eq!(resize(FillMode::Fit), "--resize=fit");
        assert_eq!(resize(FillMode::Tile), "--resize=no");
        assert!(!plan(BackendKind::Swww, "All", FillMode::Fill).steps[0]
            .args
            .contains(&"--outputs".to_string()));
    }

    #[test]
    fn test_feh_command() {
        let plan = plan(BackendKind::Feh, "All", FillMode::Fit);
        assert_eq!(
            plan.steps,
            vec![Invocation::new(
                "feh",
                ["--bg-max", "--image-bg", "#1e1e2e", "/pics/sunset beach.jpg"]
            )]
        );
        assert!(plan.daemon.is_none());
    }

    #[test]
    fn test_wallutils_command() {
        let plan = plan(BackendKind::Wallutils, "All", FillMode::Stretch);
        assert_eq!(
            plan.steps,
            vec![Invocation::new(
                "setwallpaper",
                ["--mode", "stretch", "/pics/sunset beach.jpg"]
            )]
        );
    }

    #[test]
    fn test_hyprpaper_commands() {
        let named = plan(BackendKind::Hyprpaper, "DP-2", FillMode::Fill);
        assert_eq!(named.steps.len(), 3);
        assert_eq!(named.steps[0].args, vec!["hyprpaper", "unload", "all"]);
        assert_eq!(named.steps[1].args, vec!["hyprpaper", "preload", "/pics/sunset beach.jpg"]);
        assert_eq!(
            named.steps[2].args,
            vec!["hyprpaper", "wallpaper", "DP-2,/pics/sunset beach.jpg"]
        );

        let all = plan(BackendKind::Hyprpaper, "All", FillMode::Fill);
        assert_eq!(all.steps[2].args[2], ",/pics/sunset beach.jpg");
    }

    #[test]
    fn test_mpvpaper_command() {
        let named = plan(BackendKind::Mpvpaper, "eDP-1", FillMode::Fill);
        assert_eq!(named.prelude, vec![Invocation::new("pkill", ["-f", "^mpvpaper( .*)? eDP-1( |$)"])]);
        assert_eq!(
            named.steps,
            vec![Invocation::new(
                "mpvpaper",
                [
                    "-o",
                    "input-ipc-server=/tmp/mpv-socket-eDP-1 no-audio loop panscan=1.0",
                    "eDP-1",
                    "/pics/sunset beach.jpg",
                ]
            )
            .detached()]
        );

        let all = plan(BackendKind::Mpvpaper, "All", FillMode::Center);
        assert_eq!(all.prelude, vec![Invocation::new("pkill", ["-f", "^mpvpaper( .*)? \\*( |$)"])]);
        assert_eq!(all.steps[0].args[1], "input-ipc-server=/tmp/mpv-socket-All no-audio loop");
        assert_eq!(all.steps[0].args[2], "*");
    }

    #[test]
    fn test_mpvpaper_with_sound() {
        let mut with_sound = target("All", FillMode::Stretch);
        with_sound.options.mpvpaper_sound = true;
        let plan = CommandBuilder::build(&BackendDescriptor::for_kind(BackendKind::Mpvpaper), &with_sound);
        assert_eq!(plan.steps[0].args[1], "input-ipc-server=/tmp/mpv-socket-All loop keepaspect=no");
    }

    #[test]
    fn test_stop_other_backends_prelude() {
        let mut stopping = target("All", FillMode::Fill);
        stopping.options.stop_other_backends = true;
        let plan = CommandBuilder::build(&BackendDescriptor::for_kind(BackendKind::Swww), &stopping);

        assert_eq!(
            plan.prelude,
            vec![
                Invocation::new("killall", ["swaybg"]),
                Invocation::new("killall", ["mpvpaper"]),
                Invocation::new("killall", ["hyprpaper"]),
            ]
        );
    }

    #[test]
    fn test_kill_patterns_escape_monitor_names() {
        assert_eq!(escape_pattern("DP-1"), "DP-1");
        assert_eq!(escape_pattern("*"), "\\*");
        assert_eq!(escape_pattern("HDMI.A(1)"), "HDMI\\.A\\(1\\)");

        let plan = plan(BackendKind::Swaybg, "HDMI.A(1)", FillMode::Fill);
        assert_eq!(plan.prelude[0].args[1], "^swaybg -o HDMI\\.A\\(1\\)( |$)");
    }

    #[cfg(unix)]
    #[test]
    fn test_mpvpaper_kill_pattern_spares_unrelated_processes() {
        use std::process::Command;
        use std::time::Duration;

        // A shell whose command line mentions mpvpaper but is not mpvpaper.
        let mut bystander = Command::new("sh")
            .args(["-c", "sleep 5", "waypick", "--backend", "mpvpaper", "*", "random"])
            .spawn()
            .unwrap();
        std::thread::sleep(Duration::from_millis(100));

        // pgrep takes the same pattern as pkill without signalling anything.
        let all = plan(BackendKind::Mpvpaper, "All", FillMode::Fill);
        let matched = Command::new("pgrep").args(&all.prelude[0].args).output();

        bystander.kill().unwrap();
        bystander.wait().unwrap();

        if let Ok(output) = matched {
            let pids = String::from_utf8_lossy(&output.stdout);
            let bystander_pid = bystander.id().to_string();
            assert!(pids.lines().all(|pid| pid.trim() != bystander_pid));
        }
    }

    #[test]
    fn test_invocation_display_quotes_spaces() {
        let invocation = Invocation::new("swaybg", ["-i", "/pics/sunset beach.jpg"]);
        assert_eq!(invocation.to_string(), "swaybg -i \"/pics/sunset beach.jpg\"");
    }
}
