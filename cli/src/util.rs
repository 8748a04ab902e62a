use agentmarket_core::MarketError;
use serde::Serialize;
use serde_json::json;

/// Exit code for a failed operation (the structured error went to stderr).
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for bad arguments or unreadable input.
pub const EXIT_USAGE: i32 = 4;

/// Print a usage error and exit. Used before any network call is made.
pub fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!("{}", pretty(&err));
    std::process::exit(EXIT_USAGE);
}

/// Print a successful result to stdout.
pub fn print_json<T: Serialize>(value: &T) -> i32 {
    println!("{}", pretty(value));
    0
}

/// Print a failed operation's structured error to stderr.
pub fn print_market_error(err: &MarketError) -> i32 {
    tracing::debug!(event = "command_failed", code = err.code(), error = %err);
    eprintln!("{}", pretty(&err.to_body()));
    EXIT_FAILURE
}

pub fn report<T: Serialize>(result: Result<T, MarketError>) -> i32 {
    match result {
        Ok(value) => print_json(&value),
        Err(err) => print_market_error(&err),
    }
}

fn pretty<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\":\"cli_error\",\"message\":\"{e}\"}}"))
}

/// Read JSON from a file path or stdin (when path is "-").
pub fn read_json_from_file(path: &str) -> Result<serde_json::Value, String> {
    let raw = if path == "-" {
        std::io::read_to_string(std::io::stdin())
            .map_err(|e| format!("Failed to read stdin: {e}"))?
    } else {
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read file '{path}': {e}"))?
    };
    serde_json::from_str(&raw).map_err(|e| format!("Invalid JSON in '{path}': {e}"))
}

/// Optional JSON object from a file; `None` path gives an empty object.
pub fn read_object(path: Option<&str>) -> serde_json::Map<String, serde_json::Value> {
    let Some(path) = path else {
        return serde_json::Map::new();
    };
    match read_json_from_file(path) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(_) => exit_error(
            &format!("'{path}' must contain a JSON object"),
            Some("Extra fields are merged into the stored document"),
        ),
        Err(e) => exit_error(&e, Some("Provide a valid JSON file or use '-' for stdin")),
    }
}

/// Shallow merge: top-level keys of `patch` replace those of `base`; a
/// `null` value removes the key.
pub fn merge_object(base: &mut serde_json::Value, patch: serde_json::Map<String, serde_json::Value>) {
    let Some(target) = base.as_object_mut() else {
        *base = serde_json::Value::Object(patch);
        return;
    };
    for (key, value) in patch {
        if value.is_null() {
            target.remove(&key);
        } else {
            target.insert(key, value);
        }
    }
}
