use std::time::Duration;

use serde_json::Value;
use stdiolink_session::{BackendConnection, Command};
use tracing::warn;

use crate::cmd::{parse_duration, CallArgs};
use crate::console;
use crate::exit::{session_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_completion, OutputFormat};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let command = resolve_command(&args)?;
    let timeout = args.timeout.as_deref().map(parse_duration).transpose()?;
    let popup_delay = parse_duration(&args.console.popup_delay)?;

    let collab = console::collaborators(popup_delay, args.console.confirm);
    let mut conn = BackendConnection::spawn_with_config(
        &args.worker.spec(),
        collab,
        args.worker.session_config(),
    )
    .map_err(|err| session_error("failed to start worker", err))?;

    let verb = command.verb().to_string();
    let outcome = conn
        .send(command)
        .and_then(|()| conn.wait_for_completion(timeout));
    let done = match outcome {
        Ok(done) => done,
        Err(err) => {
            let _ = conn.kill();
            return Err(session_error(&format!("'{verb}' failed"), err));
        }
    };
    print_completion(&done, format);

    match conn.shutdown(SHUTDOWN_GRACE) {
        Ok(state) if !state.success() => warn!(%state, "worker did not exit cleanly"),
        Ok(_) => {}
        Err(err) => warn!(error = %err, "worker shutdown failed"),
    }
    Ok(SUCCESS)
}

fn resolve_command(args: &CallArgs) -> CliResult<Command> {
    if let Some(json) = &args.json {
        let value: Value = serde_json::from_str(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        return Command::from_value(value).map_err(|err| session_error("--json", err));
    }

    let Some(verb) = args.verb.as_deref().filter(|verb| !verb.is_empty()) else {
        return Err(CliError::new(USAGE, "one of --json or --verb is required"));
    };
    let mut command = Command::new(verb);
    for param in &args.params {
        let (key, value) = parse_param(param)?;
        command = command.with_param(key, value);
    }
    Ok(command)
}

fn parse_param(param: &str) -> CliResult<(String, Value)> {
    let Some((key, raw)) = param.split_once('=') else {
        return Err(CliError::new(
            USAGE,
            format!("--param expects KEY=VALUE, got '{param}'"),
        ));
    };
    if key.is_empty() {
        return Err(CliError::new(USAGE, format!("--param has an empty key: '{param}'")));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;

    use super::*;
    use crate::cmd::{ConsoleArgs, WorkerArgs};
    use crate::console::ConfirmPolicy;

    fn args(json: Option<&str>, verb: Option<&str>, params: &[&str]) -> CallArgs {
        CallArgs {
            json: json.map(str::to_string),
            verb: verb.map(str::to_string),
            params: params.iter().map(|p| p.to_string()).collect(),
            timeout: None,
            console: ConsoleArgs {
                confirm: ConfirmPolicy::No,
                popup_delay: "0s".to_string(),
            },
            worker: WorkerArgs {
                program: PathBuf::from("/bin/true"),
                args: Vec::new(),
                max_frame_size: None,
            },
        }
    }

    #[test]
    fn verb_with_params() {
        let command = resolve_command(&args(
            None,
            Some("LOAD"),
            &["PATH=plan.txt", "COUNT=3", "DRY=true"],
        ))
        .unwrap();
        assert_eq!(command.verb(), "LOAD");
        assert_eq!(command.params().get("PATH"), Some(&json!("plan.txt")));
        assert_eq!(command.params().get("COUNT"), Some(&json!(3)));
        assert_eq!(command.params().get("DRY"), Some(&json!(true)));
    }

    #[test]
    fn json_command() {
        let command = resolve_command(&args(Some(r#"{"DO":"SAVE","AS":"x"}"#), None, &[])).unwrap();
        assert_eq!(command.verb(), "SAVE");
        assert_eq!(command.params().get("AS"), Some(&json!("x")));
    }

    #[test]
    fn invalid_inputs_are_usage_errors() {
        assert_eq!(resolve_command(&args(Some("[1]"), None, &[])).unwrap_err().code, USAGE);
        assert_eq!(resolve_command(&args(Some("{"), None, &[])).unwrap_err().code, USAGE);
        assert_eq!(resolve_command(&args(None, None, &[])).unwrap_err().code, USAGE);
        assert_eq!(
            resolve_command(&args(None, Some("LOAD"), &["novalue"])).unwrap_err().code,
            USAGE
        );
        assert_eq!(parse_param("=1").unwrap_err().code, USAGE);
    }
}
