use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Launch description for the worker process.
///
/// The worker is spawned once per connection with a fixed program and
/// argument list; everything else about its lifetime is owned by
/// [`WorkerProcess`](crate::WorkerProcess).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    /// Executable to run.
    pub program: PathBuf,
    /// Arguments passed verbatim.
    pub args: Vec<OsString>,
    /// Working directory. Inherited when `None`.
    pub current_dir: Option<PathBuf>,
    /// Extra environment variables layered over the inherited environment.
    pub env: Vec<(OsString, OsString)>,
}

impl WorkerSpec {
    /// Create a spec for `program` with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env: Vec::new(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    /// Run the worker from `dir`.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set an environment variable for the worker.
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.env
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Build the `std::process::Command` with all three streams piped.
    pub(crate) fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_args_and_env() {
        let spec = WorkerSpec::new("./backend")
            .arg("--mode")
            .args(["ndjson", "source.json"])
            .env("BACKEND_LANG", "en")
            .current_dir("/tmp");

        assert_eq!(spec.program, PathBuf::from("./backend"));
        assert_eq!(
            spec.args,
            vec![
                OsString::from("--mode"),
                OsString::from("ndjson"),
                OsString::from("source.json")
            ]
        );
        assert_eq!(
            spec.env,
            vec![(OsString::from("BACKEND_LANG"), OsString::from("en"))]
        );
        assert_eq!(spec.current_dir, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn command_uses_program_and_args() {
        let spec = WorkerSpec::new("worker").args(["a", "b"]);
        let command = spec.to_command();

        assert_eq!(command.get_program(), OsStr::new("worker"));
        let args: Vec<&OsStr> = command.get_args().collect();
        assert_eq!(args, vec![OsStr::new("a"), OsStr::new("b")]);
    }
}
