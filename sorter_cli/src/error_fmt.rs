//! Human-readable error descriptions and structured JSON error formatting.

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use sorter_core::error::{BuildError, SorterError};

    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingFeedback => {
                "What happened: No speed feedback was provided to the controller.\nLikely causes: The drive backend failed to initialize or was not wired into the builder.\nHow to fix: Ensure the line backend is created and passed via with_feedback(...).".to_string()
            }
            BuildError::MissingDrive => {
                "What happened: No line drive was provided to the controller.\nLikely causes: The drive backend failed to initialize or was not wired into the builder.\nHow to fix: Ensure the line backend is created and passed via with_drive(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid controller configuration ({msg}).\nLikely causes: Out-of-range values in [line] or [pid].\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<SorterError>() {
        return match se {
            SorterError::HardwareFault { code } => format!(
                "What happened: The line drive reported fault code {code} and the speed controller stopped.\nLikely causes: Drive overload, a tripped safety circuit, or a mechanical jam.\nHow to fix: Clear the fault at the drive, inspect the line, then start a new run."
            ),
            SorterError::Timeout => {
                "What happened: The line drive did not answer in time.\nLikely causes: Bus wiring, drive power, or an overloaded controller host.\nHow to fix: Check the drive connection and power, then rerun with --log-level=debug.".to_string()
            }
            SorterError::Config(msg) => format!(
                "What happened: Configuration is invalid ({msg}).\nLikely causes: Missing sections or out-of-range values.\nHow to fix: Edit the TOML config and try again."
            ),
            SorterError::Validation(msg) => format!(
                "What happened: A value was rejected ({msg}).\nLikely causes: A CLI override or config value outside the allowed range.\nHow to fix: Adjust the value and rerun."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from config loading
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read.\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Pass an existing file with --config. Original: {msg}"
        );
    }

    if lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid or incomplete.\nLikely causes: A missing [line] section, a misspelled key, or a malformed decimal.\nHow to fix: Edit the TOML config and try again. Original: {msg}"
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

/// Stable exit codes: 2 configuration, 3 drive fault, 4 timeout, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use sorter_core::error::{BuildError, SorterError};
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    match err.downcast_ref::<SorterError>() {
        Some(SorterError::Config(_) | SorterError::Validation(_)) => 2,
        Some(SorterError::HardwareFault { .. }) => 3,
        Some(SorterError::Timeout) => 4,
        Some(_) => 1,
        None => {
            let lower = err.to_string().to_ascii_lowercase();
            if lower.contains("invalid configuration") || lower.contains("read config") {
                2
            } else {
                1
            }
        }
    }
}

/// Stable reason name for JSON output.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    use sorter_core::error::SorterError;
    match err.downcast_ref::<SorterError>() {
        Some(SorterError::HardwareFault { .. }) => "HardwareFault",
        Some(SorterError::Timeout) => "Timeout",
        Some(SorterError::Config(_) | SorterError::Validation(_)) => "Config",
        _ if exit_code_for_error(err) == 2 => "Config",
        _ => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;
    use sorter_core::error::SorterError;

    let msg = humanize(err);
    if let Some(SorterError::HardwareFault { code }) = err.downcast_ref::<SorterError>() {
        return json!({ "reason": reason_name(err), "details": { "code": code }, "message": msg })
            .to_string();
    }
    json!({ "reason": reason_name(err), "message": msg }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sorter_core::error::SorterError;

    #[test]
    fn fault_has_exit_code_and_json_details() {
        let err = eyre::Report::new(SorterError::HardwareFault { code: 7 });
        assert_eq!(exit_code_for_error(&err), 3);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "HardwareFault");
        assert_eq!(v["details"]["code"], 7);
    }

    #[test]
    fn config_text_errors_map_to_config_code() {
        let err = eyre::eyre!("invalid configuration in \"x.toml\": missing field `line`");
        assert_eq!(exit_code_for_error(&err), 2);
        assert!(humanize(&err).contains("Configuration is invalid"));
    }
}
