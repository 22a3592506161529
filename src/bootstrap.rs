/*!
Service names and the companion topology daemon

The topology client talks to a daemon that is started on demand. Whether it
runs is checked through its pid file. After a start the check is repeated
according to a `RetryPolicy`.
*/

use crate::transport::MESSENGER_SERVICE_NAME_LENGTH;

use std::error;
use std::fmt;
use std::fs;
use std::io;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::result;
use std::thread;
use std::time::Duration;

/// The names a topology client uses on the transport
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceNames {
    /// `<base>.<pid>`, where replies and notifications are sent to
    pub client: String,
    /// `<base>_daemon`, the service and process name of the daemon
    pub daemon: String,
}

impl ServiceNames {
    /// Derives the names from the configured base service name.
    /// Panics if a name does not fit into a transport service name.
    pub fn derive(base: &str, pid: u32) -> ServiceNames {
        let names = ServiceNames {
            client: format!("{}.{}", base, pid),
            daemon: format!("{}_daemon", base),
        };
        for name in &[&names.client, &names.daemon] {
            assert!(
                name.len() + 1 < MESSENGER_SERVICE_NAME_LENGTH,
                "service name {} is too long ({} bytes allowed)",
                name,
                MESSENGER_SERVICE_NAME_LENGTH - 2
            );
        }
        names
    }
}

#[derive(Debug)]
pub enum Error {
    Spawn(io::Error),
    /// The daemon did not show up after the given number of checks
    NotStarted(u32),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Spawn(ref e) => write!(f, "Cannot start the topology daemon: {}", e),
            Error::NotStarted(checks) => {
                write!(f, "Topology daemon is not running after {} checks", checks)
            }
        }
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        "topology daemon bootstrap error"
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Spawn(e)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Checks for and starts the daemon
pub trait DaemonLauncher {
    fn is_running(&self, name: &str) -> bool;

    /// Starts the daemon without waiting for it
    fn spawn(&mut self) -> io::Result<()>;

    fn pause(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// How often and how patiently to check for a freshly started daemon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            retries: 50,
            backoff: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Spawned {
    AlreadyRunning,
    Started,
}

/// Starts the daemon called `name` unless it is running already
pub fn ensure_daemon(
    launcher: &mut dyn DaemonLauncher,
    name: &str,
    policy: RetryPolicy,
) -> Result<Spawned> {
    if launcher.is_running(name) {
        debug!("{} is already running", name);
        return Ok(Spawned::AlreadyRunning);
    }
    info!("Starting {}", name);
    launcher.spawn()?;
    for _ in 0..policy.retries {
        if launcher.is_running(name) {
            info!("{} is up", name);
            return Ok(Spawned::Started);
        }
        launcher.pause(policy.backoff);
    }
    Err(Error::NotStarted(policy.retries))
}

/// Starts the daemon as a child process with its stdio on the null device.
/// A child that exits, like a daemon forking into the background does, is
/// reaped on the next check.
#[derive(Debug)]
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<String>,
    pid_dir: PathBuf,
    child: RefCell<Option<Child>>,
}

impl ProcessLauncher {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(program: P, pid_dir: Q) -> ProcessLauncher {
        ProcessLauncher {
            program: program.as_ref().to_path_buf(),
            args: vec![],
            pid_dir: pid_dir.as_ref().to_path_buf(),
            child: RefCell::new(None),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> ProcessLauncher {
        self.args.push(arg.into());
        self
    }

    pub fn pid_file(&self, name: &str) -> PathBuf {
        self.pid_dir.join(format!("{}.pid", name))
    }

    fn read_pid(&self, name: &str) -> Option<u32> {
        let content = fs::read_to_string(self.pid_file(name)).ok()?;
        content.trim().parse::<u32>().ok().filter(|pid| *pid > 0)
    }

    fn reap(&self) {
        let mut slot = self.child.borrow_mut();
        let exited = match slot.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(Some(status)) => {
                    debug!("{:?} with pid {} exited with {}", self.program, child.id(), status);
                    true
                }
                Ok(None) => false,
                Err(e) => {
                    warn!("Cannot wait for {:?}: {}", self.program, e);
                    true
                }
            },
            None => false,
        };
        if exited {
            *slot = None;
        }
    }
}

#[cfg(unix)]
fn process_exists(pid: u32) -> bool {
    let pid = pid as libc::pid_t;
    if pid <= 0 {
        return false;
    }
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    // EPERM: alive, but owned by another user
    io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn process_exists(_: u32) -> bool {
    true
}

impl DaemonLauncher for ProcessLauncher {
    fn is_running(&self, name: &str) -> bool {
        self.reap();
        match self.read_pid(name) {
            Some(pid) => process_exists(pid),
            None => false,
        }
    }

    fn spawn(&mut self) -> io::Result<()> {
        self.reap();
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        debug!("Spawned {:?} with pid {}", self.program, child.id());
        *self.child.get_mut() = Some(child);
        Ok(())
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// A launcher whose daemon comes up a number of checks after the spawn.
    /// The counters are shared so that they stay observable after the
    /// launcher was handed over.
    #[derive(Debug, Default, Clone)]
    pub struct MockLauncher {
        pub running: bool,
        /// `None` for a daemon that never comes up
        pub up_after: Option<u32>,
        pub fail_spawn: bool,
        pub checks: Rc<Cell<u32>>,
        pub spawns: Rc<Cell<u32>>,
        spawned_at: Cell<u32>,
    }

    impl MockLauncher {
        pub fn running() -> MockLauncher {
            MockLauncher {
                running: true,
                ..Default::default()
            }
        }

        pub fn up_after(checks: u32) -> MockLauncher {
            MockLauncher {
                up_after: Some(checks),
                ..Default::default()
            }
        }

        /// A launcher whose daemon binary cannot be started
        pub fn failing() -> MockLauncher {
            MockLauncher {
                fail_spawn: true,
                ..Default::default()
            }
        }
    }

    impl DaemonLauncher for MockLauncher {
        fn is_running(&self, _: &str) -> bool {
            let checks = self.checks.get() + 1;
            self.checks.set(checks);
            if self.running {
                return true;
            }
            match self.up_after {
                Some(n) if self.spawns.get() > 0 => checks - self.spawned_at.get() >= n,
                _ => false,
            }
        }

        fn spawn(&mut self) -> io::Result<()> {
            if self.fail_spawn {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no such daemon"));
            }
            self.spawns.set(self.spawns.get() + 1);
            self.spawned_at.set(self.checks.get());
            Ok(())
        }

        fn pause(&self, _: Duration) {}
    }
}
