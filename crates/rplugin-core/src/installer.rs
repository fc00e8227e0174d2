//! Plugin installation through the project's pip

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::info;

use crate::error::{Result, RpluginError};

/// Runs `<python> -m pip install ...` for the bot project
pub struct PipInstaller {
    python: PathBuf,
}

impl PipInstaller {
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
        }
    }

    pub fn python(&self) -> &Path {
        &self.python
    }

    fn command_args(packages: &[String], extra_args: Option<&[String]>) -> Vec<String> {
        let mut args = vec!["-m".to_string(), "pip".to_string(), "install".to_string()];
        args.extend(packages.iter().cloned());
        if let Some(extra) = extra_args {
            args.extend(extra.iter().cloned());
        }
        args
    }

    /// Install `packages` and wait for pip to exit.
    ///
    /// pip's output is passed through to the terminal.
    pub async fn install(
        &self,
        packages: &[String],
        extra_args: Option<&[String]>,
    ) -> Result<ExitStatus> {
        let args = Self::command_args(packages, extra_args);
        info!(python = %self.python.display(), args = ?args, "running pip");

        let status = Command::new(&self.python)
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| RpluginError::Interpreter {
                message: format!("failed to run {}: {}", self.python.display(), e),
            })?;

        Ok(status)
    }

    /// [`Self::install`], turning a non-zero exit into an error
    pub async fn install_checked(
        &self,
        packages: &[String],
        extra_args: Option<&[String]>,
    ) -> Result<()> {
        let status = self.install(packages, extra_args).await?;
        if status.success() {
            Ok(())
        } else {
            Err(RpluginError::InstallFailed {
                code: status.code(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_args() {
        let packages = vec!["nonebot-plugin-status".to_string()];
        let extra = vec!["--upgrade".to_string()];

        assert_eq!(
            PipInstaller::command_args(&packages, Some(extra.as_slice())),
            vec!["-m", "pip", "install", "nonebot-plugin-status", "--upgrade"]
        );
        assert_eq!(
            PipInstaller::command_args(&packages, None),
            vec!["-m", "pip", "install", "nonebot-plugin-status"]
        );
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let installer = PipInstaller::new("/definitely/not/a/python");
        let err = installer
            .install(&["x".to_string()], None)
            .await
            .unwrap_err();
        assert!(matches!(err, RpluginError::Interpreter { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_install_passes_arguments_and_reports_status() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        let temp = TempDir::new().unwrap();
        let log = temp.path().join("args");
        let script = temp.path().join("python");
        fs::write(
            &script,
            format!(
                "#!/bin/sh\necho \"$@\" > '{}'\n[ \"$4\" = bad ] && exit 3\nexit 0\n",
                log.display()
            ),
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let installer = PipInstaller::new(&script);
        installer
            .install_checked(&["nonebot-plugin-status".to_string()], Some(&["-U".to_string()][..]))
            .await
            .unwrap();
        assert_eq!(
            fs::read_to_string(&log).unwrap().trim(),
            "-m pip install nonebot-plugin-status -U"
        );

        let err = installer
            .install_checked(&["bad".to_string()], None)
            .await
            .unwrap_err();
        assert!(matches!(err, RpluginError::InstallFailed { code: Some(3) }));
    }
}
