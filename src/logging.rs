// File-based logging: `log` records go to stderr, and stderr is teed into a
// timestamped log file.
//
// Creates a new log file on every app launch:
//   <data dir>/com.qrpay.app/logs/qrpay-2026-03-01_14-30-00.log
//
// Keeps last 5 log files, deletes older ones.

use log::{info, warn};
use std::fs;
use std::io::{self, Write};
use std::os::unix::io::FromRawFd;
use std::path::{Path, PathBuf};
use std::sync::Once;

const LOG_PREFIX: &str = "qrpay-";
const KEEP_LOGS: usize = 5;

static INIT: Once = Once::new();

/// Initialize logging. Call once at app startup.
///
/// Installs env_logger (default level `info`, overridable with RUST_LOG) on
/// stderr, then redirects stderr through an OS-level pipe and a tee thread so
/// every record also lands in the log file. Safe to call more than once.
pub fn init(logs_dir: &Path) {
    INIT.call_once(|| {
        let _ = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("info"),
        )
        .format_timestamp_millis()
        .try_init();

        if let Err(e) = setup_file_tee(logs_dir) {
            warn!("Logging: Failed to initialize file logging: {}", e);
        }
    });
}

fn setup_file_tee(logs_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(logs_dir)?;

    rotate_logs(logs_dir, KEEP_LOGS - 1)?;

    let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    let log_file_path = logs_dir.join(format!("{}{}.log", LOG_PREFIX, timestamp));

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;

    info!("Logging: Writing to {}", log_file_path.display());

    // stderr fd -> pipe write end; tee thread copies the read end to the
    // original stderr and the log file.
    let mut pipe_fds = [0i32; 2];
    if unsafe { libc::pipe(pipe_fds.as_mut_ptr()) } != 0 {
        return Err("Failed to create pipe".into());
    }
    let read_fd = pipe_fds[0];
    let write_fd = pipe_fds[1];

    let original_stderr_fd = unsafe { libc::dup(2) };
    if original_stderr_fd < 0 {
        return Err("Failed to dup stderr".into());
    }

    if unsafe { libc::dup2(write_fd, 2) } < 0 {
        return Err("Failed to redirect stderr".into());
    }
    unsafe { libc::close(write_fd) };

    let read_file = unsafe { fs::File::from_raw_fd(read_fd) };
    let mut original_stderr = unsafe { fs::File::from_raw_fd(original_stderr_fd) };
    let mut log_writer = log_file;

    std::thread::spawn(move || {
        use std::io::{BufRead, BufReader};
        let reader = BufReader::new(read_file);
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    let _ = writeln!(original_stderr, "{}", line);
                    let _ = writeln!(log_writer, "{}", line);
                    let _ = log_writer.flush();
                }
                Err(_) => break,
            }
        }
    });

    Ok(())
}

/// Delete old log files, keeping the most recent `keep` files.
fn rotate_logs(logs_dir: &Path, keep: usize) -> Result<(), io::Error> {
    let mut log_files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();

    for entry in fs::read_dir(logs_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_ours = path.extension().and_then(|e| e.to_str()) == Some("log")
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(LOG_PREFIX))
                .unwrap_or(false);
        if !is_ours {
            continue;
        }
        if let Ok(metadata) = entry.metadata() {
            let modified = metadata.modified().unwrap_or(std::time::UNIX_EPOCH);
            log_files.push((path, modified));
        }
    }

    // Newest first; ties broken by name, which embeds the timestamp.
    log_files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));

    for (path, _) in log_files.iter().skip(keep) {
        info!("Logging: Removing old log {}", path.display());
        let _ = fs::remove_file(path);
    }

    Ok(())
}

/// Get the logs directory path.
pub fn logs_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("com.qrpay.app").join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_keeps_newest_and_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..7 {
            fs::write(dir.path().join(format!("qrpay-2026-01-0{}_00-00-00.log", i + 1)), "x").unwrap();
        }
        fs::write(dir.path().join("other.log"), "x").unwrap();
        fs::write(dir.path().join("qrpay-notes.txt"), "x").unwrap();

        rotate_logs(dir.path(), 4).unwrap();

        let mut remaining: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| n.starts_with(LOG_PREFIX) && n.ends_with(".log"))
            .collect();
        remaining.sort();
        assert_eq!(remaining.len(), 4);
        assert_eq!(remaining[0], "qrpay-2026-01-04_00-00-00.log");
        assert!(dir.path().join("other.log").exists());
        assert!(dir.path().join("qrpay-notes.txt").exists());
    }

    #[test]
    fn test_logs_dir_is_app_scoped() {
        if let Some(dir) = logs_dir() {
            assert!(dir.ends_with("com.qrpay.app/logs"));
        }
    }
}
