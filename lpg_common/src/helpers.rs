use std::env;

/// Read a boolean flag from the environment, falling back to `default` when the variable is
/// absent or holds something unrecognisable.
pub fn env_flag(name: &str, default: bool) -> bool {
    let value = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}
