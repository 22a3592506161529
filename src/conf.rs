/*!
A parser for an INI file with the following structure:

```ini
[Application]
name=learning_switch

; All of the following is optional
[Topology]
service=topology
daemon=/usr/local/bin/topology
daemon_args=-d
pid_dir=/tmp/ofcore/pid
spawn_retries=50
spawn_backoff_ms=100

[Transactions]
sweep_interval_secs=60
stale_after_secs=60
```
*/

use crate::bootstrap::{ProcessLauncher, RetryPolicy};
use crate::transport::MESSENGER_SERVICE_NAME_LENGTH;

use ini::Ini;

use std::convert::From;
use std::default::Default;
use std::error;
use std::fmt;
use std::io;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;

const APP_SECTION: &str = "Application";
const NAME_KEY: &str = "name";

const TOPOLOGY_SECTION: &str = "Topology";
const SERVICE_KEY: &str = "service";
const DAEMON_KEY: &str = "daemon";
const DAEMON_ARGS_KEY: &str = "daemon_args";
const PID_DIR_KEY: &str = "pid_dir";
const RETRIES_KEY: &str = "spawn_retries";
const BACKOFF_KEY: &str = "spawn_backoff_ms";

const TRANSACTIONS_SECTION: &str = "Transactions";
const SWEEP_KEY: &str = "sweep_interval_secs";
const STALE_KEY: &str = "stale_after_secs";

/// The topology base gets `_daemon` or `.<pid>` appended
const DAEMON_SUFFIX: &str = "_daemon";
const MAX_PID_DIGITS: usize = 10;

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Ini(ini::ini::Error),
    ParseNumber(&'static str, &'static str, ParseIntError),
    InvalidServiceName(String),
    /// A topology base whose derived names do not fit
    InvalidTopologyService(String),
    MissingSection(&'static str),
    MissingEntry(&'static str, &'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref e) => write!(f, "{}", e),
            Error::Ini(ref e) => write!(f, "{}", e),
            Error::ParseNumber(s, k, ref e) => {
                write!(f, "Error on trying to parse [{}] {}: {}", s, k, e)
            }
            Error::InvalidServiceName(ref n) => write!(
                f,
                "Service name '{}' is empty or longer than {} bytes",
                n,
                MESSENGER_SERVICE_NAME_LENGTH - 2
            ),
            Error::InvalidTopologyService(ref n) => write!(
                f,
                "Topology service '{}' is empty or longer than {} bytes",
                n,
                MESSENGER_SERVICE_NAME_LENGTH - 2 - topology_suffix_length()
            ),
            Error::MissingSection(s) => write!(f, "The INI file does not have a [{}] section", s),
            Error::MissingEntry(s, k) => {
                write!(f, "The INI [{}] section does not have a '{}' key", s, k)
            }
        }
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(ioe) => ioe,
            _ => io::Error::new(io::ErrorKind::InvalidData, e),
        }
    }
}
impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        "INI configuration parser error"
    }
}

trait Section {
    type S;

    fn from_ini(conf: &Ini) -> Result<Self::S, Error>;
}

/// The application's own service, where the switch daemons send to
#[derive(Debug, Clone, PartialEq)]
pub struct Application {
    pub name: String,
}

/// Where to find the topology daemon and how to start it
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    /// Base of the client and daemon service names
    pub service: String,
    pub daemon: PathBuf,
    pub daemon_args: Vec<String>,
    pub pid_dir: PathBuf,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transactions {
    pub sweep_interval: Duration,
    /// Age at which an unanswered request is reported
    pub stale_after: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub application: Application,
    pub topology: Topology,
    pub transactions: Transactions,
}

fn check_service_name(name: &str) -> Result<(), Error> {
    // the derived client name needs room for ".<pid>"
    if name.is_empty() || name.len() + 1 >= MESSENGER_SERVICE_NAME_LENGTH {
        return Err(Error::InvalidServiceName(name.to_string()));
    }
    Ok(())
}

fn topology_suffix_length() -> usize {
    DAEMON_SUFFIX.len().max(1 + MAX_PID_DIGITS)
}

/// The client and daemon names derived from `base` must fit as well
fn check_topology_service(base: &str) -> Result<(), Error> {
    let longest = base.len() + topology_suffix_length();
    if base.is_empty() || longest + 1 >= MESSENGER_SERVICE_NAME_LENGTH {
        return Err(Error::InvalidTopologyService(base.to_string()));
    }
    Ok(())
}

fn parse_number<T>(section: &'static str, key: &'static str, value: &str) -> Result<T, Error>
where
    T: std::str::FromStr<Err = ParseIntError>,
{
    value
        .parse()
        .map_err(|e| Error::ParseNumber(section, key, e))
}

impl Section for Application {
    type S = Application;

    fn from_ini(conf: &Ini) -> Result<Self::S, Error> {
        debug!("Reading [{}] section", APP_SECTION);

        let app_section = conf
            .section(Some(APP_SECTION.to_owned()))
            .ok_or(Error::MissingSection(APP_SECTION))?;
        let name = app_section
            .get(NAME_KEY)
            .ok_or(Error::MissingEntry(APP_SECTION, NAME_KEY))?;
        check_service_name(name)?;

        let app = Application {
            name: name.to_string(),
        };
        debug!("Got {:?}", app);
        Ok(app)
    }
}

impl Topology {
    /// A launcher that starts the configured daemon binary
    pub fn launcher(&self) -> ProcessLauncher {
        self.daemon_args
            .iter()
            .fold(ProcessLauncher::new(&self.daemon, &self.pid_dir), |l, a| {
                l.arg(a.as_str())
            })
    }
}

impl Default for Topology {
    fn default() -> Self {
        Topology {
            service: "topology".to_string(),
            daemon: PathBuf::from("/usr/local/bin/topology"),
            daemon_args: vec![],
            pid_dir: PathBuf::from("/tmp/ofcore/pid"),
            retry: RetryPolicy::default(),
        }
    }
}

impl Section for Topology {
    type S = Topology;

    fn from_ini(conf: &Ini) -> Result<Self::S, Error> {
        debug!("Reading [{}] section", TOPOLOGY_SECTION);

        let mut topology = Topology::default();
        if let Some(section) = conf.section(Some(TOPOLOGY_SECTION.to_owned())) {
            if let Some(service) = section.get(SERVICE_KEY) {
                check_topology_service(service)?;
                topology.service = service.to_string();
            }
            if let Some(daemon) = section.get(DAEMON_KEY) {
                topology.daemon = PathBuf::from(daemon.to_string());
            }
            if let Some(args) = section.get(DAEMON_ARGS_KEY) {
                topology.daemon_args = args.split_whitespace().map(String::from).collect();
            }
            if let Some(pid_dir) = section.get(PID_DIR_KEY) {
                topology.pid_dir = PathBuf::from(pid_dir.to_string());
            }
            if let Some(retries) = section.get(RETRIES_KEY) {
                topology.retry.retries = parse_number(TOPOLOGY_SECTION, RETRIES_KEY, retries)?;
            }
            if let Some(backoff) = section.get(BACKOFF_KEY) {
                let ms = parse_number(TOPOLOGY_SECTION, BACKOFF_KEY, backoff)?;
                topology.retry.backoff = Duration::from_millis(ms);
            }
        }

        debug!("Got {:?}", topology);
        Ok(topology)
    }
}

impl Default for Transactions {
    fn default() -> Self {
        Transactions {
            sweep_interval: Duration::from_secs(60),
            stale_after: Duration::from_secs(60),
        }
    }
}

impl Section for Transactions {
    type S = Transactions;

    fn from_ini(conf: &Ini) -> Result<Self::S, Error> {
        debug!("Reading [{}] section", TRANSACTIONS_SECTION);

        let transactions = match conf.section(Some(TRANSACTIONS_SECTION.to_owned())) {
            Some(section) => {
                let mut transactions = Transactions::default();
                if let Some(sweep) = section.get(SWEEP_KEY) {
                    let secs = parse_number(TRANSACTIONS_SECTION, SWEEP_KEY, sweep)?;
                    transactions.sweep_interval = Duration::from_secs(secs);
                }
                if let Some(stale) = section.get(STALE_KEY) {
                    let secs = parse_number(TRANSACTIONS_SECTION, STALE_KEY, stale)?;
                    transactions.stale_after = Duration::from_secs(secs);
                }
                transactions
            }
            _ => Transactions::default(),
        };

        debug!("Got {:?}", transactions);
        Ok(transactions)
    }
}

impl Config {
    pub fn from_ini(conf: &Ini) -> Result<Config, Error> {
        Ok(Config {
            application: Application::from_ini(conf)?,
            topology: Topology::from_ini(conf)?,
            transactions: Transactions::from_ini(conf)?,
        })
    }
}

pub fn parse_file(path: &str) -> Result<Config, Error> {
    info!("Reading INI file {}", path);

    let conf = match Ini::load_from_file(path) {
        Ok(i) => i,
        Err(e) => {
            return Err(Error::Ini(e));
        }
    };

    Config::from_ini(&conf)
}
