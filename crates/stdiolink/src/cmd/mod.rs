use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use stdiolink_frame::FrameConfig;
use stdiolink_session::SessionConfig;
use stdiolink_transport::WorkerSpec;

use crate::console::ConfirmPolicy;
use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod decode;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a worker and feed it commands from stdin, one per line.
    Run(RunArgs),
    /// Send one command, print its completion and quit.
    Call(CallArgs),
    /// Classify a captured worker output transcript.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Call(args) => call::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// Worker executable.
    #[arg(env = "STDIOLINK_BACKEND")]
    pub program: PathBuf,
    /// Arguments passed to the worker.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
    /// Drop worker output lines longer than this many bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_frame_size: Option<usize>,
}

impl WorkerArgs {
    pub fn spec(&self) -> WorkerSpec {
        WorkerSpec::new(&self.program).args(&self.args)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            frame: FrameConfig {
                max_frame_size: self.max_frame_size,
                ..FrameConfig::default()
            },
            ..SessionConfig::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct ConsoleArgs {
    /// Answer to "discard unsaved changes?" questions.
    #[arg(long, value_name = "ANSWER", default_value = "no")]
    pub confirm: ConfirmPolicy,
    /// Show progress only for operations running longer than this (e.g. 500ms, 0s).
    #[arg(long, default_value = "500ms")]
    pub popup_delay: String,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub console: ConsoleArgs,
    #[command(flatten)]
    pub worker: WorkerArgs,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Command as a JSON object with a "DO" key.
    #[arg(long, conflicts_with = "verb", required_unless_present = "verb")]
    pub json: Option<String>,
    /// Command verb.
    #[arg(long)]
    pub verb: Option<String>,
    /// Command parameter as KEY=VALUE; VALUE is JSON or a plain string.
    #[arg(long = "param", value_name = "KEY=VALUE", requires = "verb")]
    pub params: Vec<String>,
    /// Give up waiting for the completion after this long (e.g. 30s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
    #[command(flatten)]
    pub console: ConsoleArgs,
    #[command(flatten)]
    pub worker: WorkerArgs,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Transcript file; stdin when omitted.
    pub file: Option<PathBuf>,
    /// Treat lines longer than this many bytes as oversized.
    #[arg(long, value_name = "BYTES")]
    pub max_frame_size: Option<usize>,
    /// Exit non-zero if any line is malformed, unrecognized or oversized.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
