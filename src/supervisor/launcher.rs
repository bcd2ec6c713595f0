//! How the pipeline engine binary is invoked.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::{Error, Result};
use crate::topology::TopologyDescription;

/// Program plus leading arguments placed before the pipeline tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launcher {
    program: PathBuf,
    args: Vec<String>,
}

impl Launcher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// `gst-launch-1.0` from PATH, sending EOS on interrupt (`-e`).
    pub fn gst_launch() -> Self {
        let program =
            which::which("gst-launch-1.0").unwrap_or_else(|_| PathBuf::from("gst-launch-1.0"));
        Self::new(program).with_args(vec!["-e".to_string()])
    }

    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Full argv (after the program) for a topology.
    pub fn argv(&self, topology: &TopologyDescription) -> Vec<String> {
        let mut argv = self.args.clone();
        argv.extend(topology.to_launch_args());
        argv
    }

    /// Printable command line for logs and dry runs.
    pub fn command_line(&self, topology: &TopologyDescription) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line.push(' ');
        line.push_str(&topology.to_pipeline_string());
        line
    }

    /// Check the program runs at all.
    pub async fn check_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .is_ok_and(|s| s.success())
    }

    /// Spawn the engine with stderr piped for the monitor.
    pub(crate) fn spawn(&self, topology: &TopologyDescription) -> Result<Child> {
        let argv = self.argv(topology);
        debug!("Launching {} {:?}", self.program.display(), argv);
        Command::new(&self.program)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn {
                program: self.program.display().to_string(),
                source,
            })
    }
}

impl Default for Launcher {
    fn default() -> Self {
        Self::gst_launch()
    }
}
