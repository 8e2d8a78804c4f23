// src/exec/request.rs

use std::path::{Path, PathBuf};

use tokio::process::Command;

/// Per-invocation switches that affect spawning and classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestFlags {
    /// The caller asked the wrapped tool to replace existing output.
    pub overwrite: bool,
    /// Run through the platform shell instead of invoking the program directly.
    ///
    /// Off by default: in shell mode the arguments are joined into one command
    /// line and are subject to shell expansion.
    pub shell: bool,
}

/// Immutable description of one external program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    program: String,
    args: Vec<String>,
    cwd: PathBuf,
    flags: RequestFlags,
}

impl ProcessRequest {
    pub fn new<I, S>(program: impl Into<String>, args: I, cwd: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: cwd.into(),
            flags: RequestFlags::default(),
        }
    }

    pub fn with_flags(mut self, flags: RequestFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn flags(&self) -> RequestFlags {
        self.flags
    }

    /// Human-readable command line, for logs and dry runs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Build the `tokio` command for this request (pipes are configured by the
    /// runner).
    pub(crate) fn to_command(&self) -> Command {
        let mut cmd = if self.flags.shell {
            let line = self.command_line();
            if cfg!(windows) {
                let mut c = Command::new("cmd");
                c.arg("/C").arg(line);
                c
            } else {
                let mut c = Command::new("sh");
                c.arg("-c").arg(line);
                c
            }
        } else {
            let mut c = Command::new(&self.program);
            c.args(&self.args);
            c
        };
        cmd.current_dir(&self.cwd);
        cmd
    }
}
