/// External automation script invocation
///
/// Runs `<executable> <script>` synchronously. Output is captured and dropped
/// unless the process fails, in which case stderr goes into the error.
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::ActuationError;

#[derive(Debug, Clone)]
pub struct ScriptRunner {
    executable: Option<PathBuf>,
}

impl ScriptRunner {
    pub fn new(executable: Option<PathBuf>) -> Self {
        Self { executable }
    }

    /// Run `script` with the configured executable and wait for it to exit
    pub fn run(&self, script: &Path) -> Result<(), ActuationError> {
        let executable = self
            .executable
            .as_deref()
            .ok_or(ActuationError::ExecutableMissing)?;

        tracing::debug!("Running {} {}", executable.display(), script.display());

        let output = Command::new(executable)
            .arg(script)
            .output()
            .map_err(|source| ActuationError::LaunchFailed {
                program: executable.display().to_string(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ActuationError::ScriptFailed {
                script: script.display().to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_executable_is_reported() {
        let runner = ScriptRunner::new(None);
        assert!(matches!(
            runner.run(Path::new("flee.ahk")),
            Err(ActuationError::ExecutableMissing)
        ));
    }

    #[test]
    fn test_unlaunchable_executable_is_reported() {
        let runner = ScriptRunner::new(Some(PathBuf::from(
            "/definitely/not/an/automation/executable",
        )));
        assert!(matches!(
            runner.run(Path::new("flee.ahk")),
            Err(ActuationError::LaunchFailed { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_decides_success() {
        let ok = ScriptRunner::new(Some(PathBuf::from("/bin/sh")));
        let dir = std::env::temp_dir();

        let good = dir.join(format!("encounter-scout-ok-{}.sh", std::process::id()));
        std::fs::write(&good, "exit 0\n").unwrap();
        assert!(ok.run(&good).is_ok());

        let bad = dir.join(format!("encounter-scout-bad-{}.sh", std::process::id()));
        std::fs::write(&bad, "echo broken >&2\nexit 3\n").unwrap();
        match ok.run(&bad) {
            Err(ActuationError::ScriptFailed { stderr, .. }) => assert_eq!(stderr, "broken"),
            other => panic!("expected ScriptFailed, got {:?}", other),
        }

        let _ = std::fs::remove_file(good);
        let _ = std::fs::remove_file(bad);
    }
}
