//! QingLong environment write-back
//!
//! When running inside a QingLong container, refreshed cookies are written
//! back into the panel's `config.sh` so they survive a container restart.
//! A missing config file just means we are not running under QingLong.

use std::path::Path;

use tracing::{info, warn};

/// QingLong panel config file location inside its container
pub const QL_CONFIG_PATH: &str = "/ql/data/config/config.sh";

/// Update `export {name}="{value}"` in the default QingLong config.
/// Returns true when the file was rewritten.
pub fn update_env(name: &str, value: &str) -> bool {
    update_env_at(Path::new(QL_CONFIG_PATH), name, value)
}

/// Same, against an explicit path (testable).
pub fn update_env_at(path: &Path, name: &str, value: &str) -> bool {
    if !path.exists() {
        warn!("{:?} not found, skipping env write-back for {}", path, name);
        return false;
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("failed to read {:?}: {}", path, e);
            return false;
        }
    };

    let escaped = value.replace('"', "\\\"");
    let new_line = format!("export {}=\"{}\"", name, escaped);
    let prefix = format!("export {}=", name);

    let mut replaced = false;
    let mut lines: Vec<String> = content
        .lines()
        .map(|line| {
            if !replaced && line.trim_start().starts_with(&prefix) {
                replaced = true;
                new_line.clone()
            } else {
                line.to_string()
            }
        })
        .collect();

    if !replaced {
        lines.push(new_line);
    }

    let mut updated = lines.join("\n");
    updated.push('\n');

    match std::fs::write(path, updated) {
        Ok(()) => {
            info!("QingLong env {} updated", name);
            true
        }
        Err(e) => {
            warn!("failed to write {:?}: {}", path, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!update_env_at(&dir.path().join("config.sh"), "X", "1"));
    }

    #[test]
    fn replaces_existing_export_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.sh");
        std::fs::write(&path, "export FOO=\"old\"\nexport BAR=\"keep\"\n").unwrap();

        assert!(update_env_at(&path, "FOO", "new"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("export FOO=\"new\""));
        assert!(!content.contains("old"));
        assert!(content.contains("export BAR=\"keep\""));
    }

    #[test]
    fn appends_when_absent_and_escapes_quotes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.sh");
        std::fs::write(&path, "# qinglong\n").unwrap();

        assert!(update_env_at(&path, "NODESEEK_COOKIE", "a=\"b\""));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("export NODESEEK_COOKIE=\"a=\\\"b\\\"\""));
    }
}
