use std::io::{self, BufRead};
use std::thread;

use stdiolink_session::{BackendConnection, Command, Request, RequestHandle, SessionEvent};
use tracing::{debug, info};

use crate::cmd::{parse_duration, RunArgs};
use crate::console;
use crate::exit::{io_error, session_error, worker_exit_code, CliError, CliResult, INTERNAL, USAGE};
use crate::output::{print_completion, OutputFormat};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let popup_delay = parse_duration(&args.console.popup_delay)?;
    let collab = console::collaborators(popup_delay, args.console.confirm);
    let mut conn = BackendConnection::spawn_with_config(
        &args.worker.spec(),
        collab,
        args.worker.session_config(),
    )
    .map_err(|err| session_error("failed to start worker", err))?;
    info!(pid = conn.pid(), "worker running; reading commands from stdin");

    let interrupt = conn.handle();
    ctrlc::set_handler(move || {
        let _ = interrupt.cancel();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("failed to install Ctrl-C handler: {err}")))?;

    spawn_stdin_reader(conn.handle()).map_err(|err| io_error("failed to read stdin", err))?;

    loop {
        let events = conn
            .next_events(None)
            .map_err(|err| session_error("worker connection failed", err))?;
        for event in events {
            match event {
                SessionEvent::Completed(done) => print_completion(&done, format),
                SessionEvent::Rejected { verb, pending } => {
                    eprintln!("busy: '{verb}' not sent, '{pending}' is still running");
                }
                SessionEvent::Exited(state) => {
                    debug!(%state, "worker gone; leaving");
                    return Ok(worker_exit_code(state));
                }
                SessionEvent::Reported(_) | SessionEvent::Violation(_) => {}
            }
        }
    }
}

fn spawn_stdin_reader(handle: RequestHandle) -> io::Result<()> {
    thread::Builder::new()
        .name("stdiolink-input".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match parse_line(&line) {
                    Ok(Some(request)) => {
                        if handle.submit(request).is_err() {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => eprintln!("error: {err}"),
                }
            }
            let _ = handle.request_quit(false);
        })?;
    Ok(())
}

/// Turn one input line into a request.
///
/// `:cancel`, `:quit` and `:quit!` are control commands, a line starting
/// with `{` is a JSON command, anything else is a bare verb.
pub fn parse_line(line: &str) -> CliResult<Option<Request>> {
    let line = line.trim();
    match line {
        "" => Ok(None),
        ":cancel" => Ok(Some(Request::Cancel)),
        ":quit" => Ok(Some(Request::Quit { force: false })),
        ":quit!" => Ok(Some(Request::Quit { force: true })),
        _ if line.starts_with('{') => {
            let value = serde_json::from_str(line)
                .map_err(|err| CliError::new(USAGE, format!("invalid JSON command: {err}")))?;
            let command = Command::from_value(value)
                .map_err(|err| session_error("invalid command", err))?;
            Ok(Some(Request::Send(command)))
        }
        _ if line.starts_with(':') => Err(CliError::new(
            USAGE,
            format!("unknown control command: {line}"),
        )),
        _ => Ok(Some(Request::Send(Command::new(line)))),
    }
}
