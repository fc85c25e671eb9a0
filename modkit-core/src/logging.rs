//! Logging setup.
//!
//! Library code logs through the `log` facade. [`init`] installs an
//! `env_logger` backend writing `[HH:MM:SS] [thread/LEVEL]: message` lines to
//! stderr and, once [`attach_file`] has been called, to the persistent log.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::Local;
use env_logger::{Builder, Env, Target};

/// Persistent log file, shared by every logging thread.
static LOG_FILE: Mutex<Option<File>> = Mutex::new(None);

fn with_log_file<R>(f: impl FnOnce(&mut Option<File>) -> R) -> R {
    let mut guard = match LOG_FILE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    f(&mut guard)
}

/// Writer that copies every line to stderr and the attached log file.
struct TeeWriter;

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        with_log_file(|file| {
            if let Some(file) = file {
                // A failing log file must not break stderr logging
                let _ = file.write_all(buf);
            }
        });
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        with_log_file(|file| match file {
            Some(file) => file.flush(),
            None => Ok(()),
        })
    }
}

/// Local wall-clock time as `HH:MM:SS`.
fn clock_time() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Install the logger. Defaults to `info`; `RUST_LOG` overrides.
///
/// Calling this more than once is harmless.
pub fn init() {
    let result = Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let thread = std::thread::current();
            writeln!(
                buf,
                "[{}] [{}/{}]: {}",
                clock_time(),
                thread.name().unwrap_or("main"),
                record.level(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(TeeWriter)))
        .try_init();

    if result.is_err() {
        log::debug!("Logger already installed");
    }
}

/// Open (truncating) the persistent log at `path` and copy all output to it.
pub fn attach_file(path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    with_log_file(|slot| *slot = Some(file));
    log::info!("Logging to {}", path.display());
    Ok(())
}

/// Stop copying output to the persistent log.
pub fn detach_file() {
    with_log_file(|slot| {
        if let Some(mut file) = slot.take() {
            let _ = file.flush();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_clock_time_format() {
        let time = clock_time();
        assert_eq!(time.len(), 8);
        assert_eq!(&time[2..3], ":");
        assert_eq!(&time[5..6], ":");
        assert!(time.chars().filter(|c| *c != ':').all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_attach_file_fails_for_missing_directory() {
        let dir = TempDir::new().unwrap();
        assert!(attach_file(&dir.path().join("missing/modkit.log")).is_err());
    }
}
