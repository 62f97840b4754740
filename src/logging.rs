use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

/// Initialise logging. In debug mode the level is `debug` and `RUST_LOG` may
/// override it; otherwise `info` is forced.
/// When `log_file` is set, output goes to that file instead of stderr. A log
/// file that cannot be opened falls back to stderr with a warning.
pub fn init(debug: bool, log_file: Option<PathBuf>) {
    let level = if debug { "debug" } else { "info" };

    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let Some(path) = log_file else {
        let _ = builder.try_init();
        return;
    };
    match file_appender(&path) {
        Ok(appender) => {
            let _ = builder.with_ansi(false).with_writer(appender).try_init();
        }
        Err(err) => {
            let _ = builder.try_init();
            tracing::warn!(
                path = %path.display(),
                error = %format!("{err:#}"),
                "log file unavailable; logging to stderr"
            );
        }
    }
}

fn file_appender(path: &Path) -> Result<RollingFileAppender> {
    let (dir, name) =
        split_log_path(path).ok_or_else(|| anyhow!("{} has no file name", path.display()))?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(&dir)
        .with_context(|| format!("open log file {}", path.display()))
}

fn split_log_path(path: &Path) -> Option<(PathBuf, String)> {
    let name = path.file_name()?.to_string_lossy().into_owned();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Some((dir, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_file_name_logs_to_current_dir() {
        assert_eq!(
            split_log_path(Path::new("overlay.log")),
            Some((PathBuf::from("."), "overlay.log".to_string()))
        );
        assert_eq!(split_log_path(Path::new("/")), None);
    }

    #[test]
    fn unusable_log_directory_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").expect("write blocker");

        let err = file_appender(&blocker.join("overlay.log")).unwrap_err();
        assert!(format!("{err:#}").contains("overlay.log"));
        assert!(file_appender(Path::new("/")).is_err());
    }

    #[test]
    fn log_file_is_created_in_missing_directories() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("overlay.log");
        file_appender(&path).expect("appender");
        assert!(path.exists());
    }
}
