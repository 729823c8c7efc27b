//! APPM process lifecycle
//!
//! The tool does not support concurrent instances, so a run first looks for
//! an already-running process and only spawns its own when none is found.
//! Spawned children are released on drop, never killed: the tool owns its own
//! shutdown (via the Close verb or its `-dontexit` behavior).

use std::path::{Path, PathBuf};
use std::time::Duration;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::AppmError;

/// Command line for a new APPM instance
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub exe_path: PathBuf,
    /// `-s` settings file, passed only when it exists on disk
    pub settings_path: Option<PathBuf>,
    /// `-M` legacy measurement file, passed only when it exists on disk
    pub measurement_path: Option<PathBuf>,
    /// When false the tool starts interactively and waits for the operator
    pub auto_start: bool,
    /// `-dontexit`: keep the tool open after the run finishes
    pub dont_exit: bool,
}

impl LaunchOptions {
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.auto_start {
            args.push("-auto".to_string());
        }
        if self.dont_exit {
            args.push("-dontexit".to_string());
        }
        if let Some(settings) = &self.settings_path {
            if settings.is_file() {
                args.push(format!("-s{}", settings.display()));
            }
        }
        if let Some(measurement) = &self.measurement_path {
            if measurement.is_file() {
                args.push(format!("-M{}", measurement.display()));
            }
        }

        args
    }
}

/// Handle to the running tool process.
///
/// Exactly one live handle exists per run: either a spawned child (owned) or
/// a discovered pre-existing instance (pid only).
#[derive(Debug)]
pub struct AppmProcess {
    child: Option<Child>,
    pid: u32,
}

impl AppmProcess {
    /// Look for an already-running instance by executable name
    pub fn find_running(exe_path: &Path) -> Option<AppmProcess> {
        let stem = exe_path.file_stem()?.to_string_lossy().to_ascii_lowercase();

        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::All, true);

        for (pid, process) in sys.processes() {
            let name = process.name().to_string_lossy().to_ascii_lowercase();
            let name = name.strip_suffix(".exe").unwrap_or(&name);
            if name == stem {
                debug!("Found running APPM instance, pid {}", pid);
                return Some(AppmProcess {
                    child: None,
                    pid: pid.as_u32(),
                });
            }
        }

        None
    }

    /// Spawn a new instance with the given command line
    pub fn launch(options: &LaunchOptions) -> Result<AppmProcess, AppmError> {
        if !options.exe_path.is_file() {
            return Err(AppmError::launch(format!(
                "executable not found at {}",
                options.exe_path.display()
            )));
        }

        let args = options.to_args();
        info!(
            "Executing: {} {}",
            options.exe_path.display(),
            args.join(" ")
        );

        let child = Command::new(&options.exe_path)
            .args(&args)
            .spawn()
            .map_err(|e| AppmError::launch(e.to_string()))?;

        let pid = child.id().unwrap_or(0);
        Ok(AppmProcess {
            child: Some(child),
            pid,
        })
    }

    pub fn id(&self) -> u32 {
        self.pid
    }

    /// True when this handle owns the child it spawned
    pub fn is_spawned(&self) -> bool {
        self.child.is_some()
    }

    /// Whether the process is still alive
    pub fn is_running(&mut self) -> bool {
        match &mut self.child {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => process_alive(self.pid),
        }
    }

    /// Wait for the process to exit.
    ///
    /// Returns the exit code for spawned children; discovered instances are
    /// re-checked once a second and yield `None` when they disappear.
    pub async fn wait(&mut self) -> Result<Option<i32>, AppmError> {
        match &mut self.child {
            Some(child) => {
                let status = child
                    .wait()
                    .await
                    .map_err(|e| AppmError::launch(format!("wait on APPM failed: {}", e)))?;
                debug!("APPM exited with {}", status);
                Ok(status.code())
            }
            None => {
                while process_alive(self.pid) {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                debug!("APPM process {} is gone", self.pid);
                Ok(None)
            }
        }
    }
}

fn process_alive(pid: u32) -> bool {
    let target = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
    sys.process(target).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_default_to_empty() {
        let options = LaunchOptions {
            exe_path: PathBuf::from("ApPointMapper.exe"),
            ..Default::default()
        };
        assert!(options.to_args().is_empty());
    }

    #[test]
    fn args_include_auto_and_dontexit() {
        let options = LaunchOptions {
            exe_path: PathBuf::from("ApPointMapper.exe"),
            auto_start: true,
            dont_exit: true,
            ..Default::default()
        };
        assert_eq!(options.to_args(), ["-auto", "-dontexit"]);
    }

    #[test]
    fn settings_flag_only_when_file_exists() {
        let settings = tempfile::NamedTempFile::new().unwrap();

        let options = LaunchOptions {
            exe_path: PathBuf::from("ApPointMapper.exe"),
            auto_start: true,
            settings_path: Some(settings.path().to_path_buf()),
            ..Default::default()
        };
        let args = options.to_args();
        assert_eq!(args[0], "-auto");
        assert_eq!(args[1], format!("-s{}", settings.path().display()));

        let missing = LaunchOptions {
            exe_path: PathBuf::from("ApPointMapper.exe"),
            auto_start: true,
            settings_path: Some(PathBuf::from("/no/such/file.appm")),
            ..Default::default()
        };
        assert_eq!(missing.to_args(), ["-auto"]);
    }

    #[test]
    fn measurement_flag_only_when_file_exists() {
        let measurement = tempfile::NamedTempFile::new().unwrap();

        let options = LaunchOptions {
            exe_path: PathBuf::from("ApPointMapper.exe"),
            measurement_path: Some(measurement.path().to_path_buf()),
            ..Default::default()
        };
        assert_eq!(
            options.to_args(),
            [format!("-M{}", measurement.path().display())]
        );
    }

    #[test]
    fn launch_fails_on_missing_executable() {
        let options = LaunchOptions {
            exe_path: PathBuf::from("/no/such/ApPointMapper.exe"),
            auto_start: true,
            ..Default::default()
        };
        let err = AppmProcess::launch(&options).unwrap_err();
        assert!(matches!(err, AppmError::Launch { .. }));
    }
}
