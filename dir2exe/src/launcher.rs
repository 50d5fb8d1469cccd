use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::{Child, Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::Error;

/// How long the loader waits for the main executable
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WaitPolicy {
    #[default]
    Forever,
    /// Kill the child once this much time has passed
    Timeout(Duration),
}

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run `program` with the working directory set to `cwd`, inheriting the
/// standard streams, and wait for it according to `wait`.
///
/// `args` is the loader's own argument vector. On Unix `args[0]` is passed
/// on as the child's program name; elsewhere only `args[1..]` is forwarded.
/// Returns the child's exit code, `128 + signal` if a Unix signal ended it.
pub fn launch(
    program: &Path,
    args: &[OsString],
    cwd: &Path,
    wait: WaitPolicy,
) -> Result<i32, Error> {
    let mut command = Command::new(program);
    command.current_dir(cwd);
    if let Some((arg0, rest)) = args.split_first() {
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.arg0(arg0);
        }
        #[cfg(not(unix))]
        let _ = arg0;
        command.args(rest);
    }

    info!("Launching {}", program.display());
    let mut child = spawn(&mut command).map_err(|source| Error::ChildLaunchFailure {
        path: program.to_path_buf(),
        source,
    })?;

    let status = match wait {
        WaitPolicy::Forever => child.wait(),
        WaitPolicy::Timeout(timeout) => match wait_timeout(&mut child, timeout) {
            Ok(Some(status)) => Ok(status),
            Ok(None) => {
                // Reap it so nothing in the root is still held open
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::ChildTimeout {
                    path: program.to_path_buf(),
                    timeout,
                });
            }
            Err(err) => Err(err),
        },
    }
    .map_err(|source| Error::ChildLaunchFailure {
        path: program.to_path_buf(),
        source,
    })?;

    debug!("{} exited with {}", program.display(), status);
    Ok(exit_code(status))
}

/// Spawn, retrying briefly while the freshly written executable is still
/// reported busy by the kernel
fn spawn(command: &mut Command) -> io::Result<Child> {
    let mut attempts = 0;
    loop {
        match command.spawn() {
            Err(err) if is_text_busy(&err) && attempts < 10 => {
                attempts += 1;
                thread::sleep(POLL_INTERVAL);
            }
            res => return res,
        }
    }
}

#[cfg(unix)]
fn is_text_busy(err: &io::Error) -> bool {
    // ETXTBSY
    err.raw_os_error() == Some(26)
}

#[cfg(not(unix))]
fn is_text_busy(_err: &io::Error) -> bool {
    false
}

fn wait_timeout(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(timeout - elapsed));
    }
}

/// Exit code to report for a finished child
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

#[cfg(all(test, unix))]
mod tests {
    use std::ffi::OsString;
    use std::path::Path;
    use std::time::Duration;

    use super::{launch, WaitPolicy};
    use crate::Error;

    fn sh_args(script: &str) -> Vec<OsString> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    #[test]
    fn exit_code_forwarded() {
        let code = launch(
            Path::new("/bin/sh"),
            &sh_args("exit 7"),
            Path::new("/"),
            WaitPolicy::Forever,
        )
        .unwrap();
        assert_eq!(code, 7);
    }

    #[test]
    fn working_directory() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("marker"), b"").unwrap();
        let code = launch(
            Path::new("/bin/sh"),
            &sh_args("test -f marker"),
            tmp.path(),
            WaitPolicy::Forever,
        )
        .unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn killed_by_signal() {
        let code = launch(
            Path::new("/bin/sh"),
            &sh_args("kill -9 $$"),
            Path::new("/"),
            WaitPolicy::Forever,
        )
        .unwrap();
        assert_eq!(code, 128 + 9);
    }

    #[test]
    fn timeout() {
        let res = launch(
            Path::new("/bin/sh"),
            &sh_args("sleep 5"),
            Path::new("/"),
            WaitPolicy::Timeout(Duration::from_millis(100)),
        );
        assert!(matches!(res, Err(Error::ChildTimeout { .. })));
    }

    #[test]
    fn missing_program() {
        let tmp = tempfile::tempdir().unwrap();
        let res = launch(
            &tmp.path().join("nope"),
            &[],
            tmp.path(),
            WaitPolicy::Forever,
        );
        assert!(matches!(res, Err(Error::ChildLaunchFailure { .. })));
    }
}
