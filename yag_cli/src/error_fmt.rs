//! Human-readable error descriptions and structured JSON error formatting.

use yag_core::error::{
    BuildError, ProtocolError, SequenceFault, TransportError, ValidationError, YagError,
};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingTransport => {
                "What happened: No transport was provided to the laser core.\nLikely causes: The serial link failed to initialize or was not wired into the builder.\nHow to fix: Ensure the transport is created and passed via with_transport(...).".to_string()
            }
            BuildError::MissingPort => {
                "What happened: No serial port was configured.\nLikely causes: connection.port is empty and --port was not given.\nHow to fix: Set connection.port in the config or pass --port.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
            BuildError::Connect { port, reason } => format!(
                "What happened: Could not open {port} ({reason}).\nLikely causes: Wrong port name, cable unplugged, or the port is held by another program.\nHow to fix: Check the cable and connection.port, and close other serial terminals."
            ),
        };
    }

    if let Some(ve) = err.downcast_ref::<ValidationError>() {
        return validation_message(ve);
    }

    if let Some(ye) = err.downcast_ref::<YagError>() {
        return match ye {
            YagError::Validation(ve) => validation_message(ve),
            YagError::Transport(TransportError::Timeout) => {
                "What happened: The laser did not reply in time.\nLikely causes: Head powered off, wrong baud rate, or a loose RS-232 cable.\nHow to fix: Check power and cabling, or raise connection.timeout_ms in the config.".to_string()
            }
            YagError::Transport(te) => format!(
                "What happened: Serial link failure ({te}).\nLikely causes: Cable unplugged or USB adapter reset.\nHow to fix: Reconnect the cable and rerun."
            ),
            YagError::Protocol(ProtocolError::Rejected { command, raw }) => format!(
                "What happened: The laser refused {command:?} (replied {raw:?}).\nLikely causes: An interlock is active or the command is not valid in the current state.\nHow to fix: Run `yag status` and clear the reported interlocks."
            ),
            YagError::Protocol(pe) => format!(
                "What happened: Unexpected reply from the laser ({pe}).\nLikely causes: Firmware variant with a different reply format, or line noise.\nHow to fix: Re-run with --log-level=debug to see the raw exchange."
            ),
            YagError::Sequence(SequenceFault::RequiresDeactivate) => {
                "What happened: The laser is faulted.\nLikely causes: A previous activation or deactivation did not complete.\nHow to fix: Run `yag deactivate`, then activate again.".to_string()
            }
            YagError::Sequence(fault) => {
                let subsystem = fault
                    .subsystem()
                    .map_or_else(|| "unknown".to_string(), |s| s.to_string());
                format!(
                    "What happened: Sequence stopped at the {subsystem} ({fault}).\nLikely causes: Interlock active, missing cooling water, or the head did not respond.\nHow to fix: Inspect `yag status`, fix the cause, then run `yag deactivate` before retrying."
                )
            }
            YagError::WorkerStopped => {
                "What happened: The laser worker stopped.\nLikely causes: The connection was closed while a command was queued.\nHow to fix: Rerun the command.".to_string()
            }
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("unknown parameter") || lower.contains("expected") {
        return format!(
            "What happened: {msg}.\nLikely causes: Misspelled parameter name or value.\nHow to fix: Run `yag set --help` for the accepted names."
        );
    }

    if lower.contains("must") || lower.contains("config") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn validation_message(ve: &ValidationError) -> String {
    format!(
        "What happened: {ve}.\nLikely causes: Value outside the range the laser accepts.\nHow to fix: Choose a value between {} and {}.",
        ve.min, ve.max
    )
}

/// Short, stable name of the error kind for JSON output.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    if err.downcast_ref::<ValidationError>().is_some() {
        return "Validation";
    }
    match err.downcast_ref::<YagError>() {
        Some(YagError::Validation(_)) => "Validation",
        Some(YagError::Transport(TransportError::Timeout)) => "Timeout",
        Some(YagError::Transport(_)) => "Transport",
        Some(YagError::Protocol(_)) => "Protocol",
        Some(YagError::Sequence(_)) => "SequenceFault",
        Some(YagError::WorkerStopped) => "WorkerStopped",
        None => "Error",
    }
}

/// Stable exit codes per error kind; anything unclassified returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match reason_name(err) {
        "Validation" => 3,
        "Timeout" | "Transport" => 4,
        "Protocol" => 5,
        "SequenceFault" => 6,
        "Build" => 7,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let mut obj = json!({ "reason": reason_name(err), "message": humanize(err) });
    if let Some(YagError::Sequence(fault)) = err.downcast_ref::<YagError>() {
        if let Some(s) = fault.subsystem() {
            obj["subsystem"] = json!(s.to_string());
        }
    }
    obj.to_string()
}
