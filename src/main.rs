/*!
Prepares the environment of an OpenFlow application.

Reads the application's INI file, derives the service names of its topology
client and makes sure the topology daemon is running.
*/

#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;

use ofcore::bootstrap::{ensure_daemon, ServiceNames, Spawned};
use ofcore::conf;

use std::io;
use std::process::{self, exit};

/// Reads command line arguments and calls the corresponding functions.
fn handle_cli_args() -> io::Result<()> {
    #[cfg(unix)]
    let unix_opts = "-s, --syslog      'Logs via syslog'
        ";
    #[cfg(not(unix))]
    let unix_opts = "";

    let usage = &format!(
        "{}-v...          'Repeat to set the level of verbosity'
        -c, --conf <ini>  'The INI configuration file.'",
        unix_opts
    );
    let matches = app_from_crate!().args_from_usage(usage).get_matches();

    let log_lvl = match matches.occurrences_of("v") {
        0 => log::Level::Error,
        1 => log::Level::Warn,
        2 => log::Level::Info,
        3 => log::Level::Debug,
        _ => log::Level::Trace,
    };

    if matches.is_present("syslog") {
        #[cfg(unix)]
        {
            let app_name = Some(crate_name!());
            syslog::init(syslog::Facility::LOG_USER, log_lvl.to_level_filter(), app_name)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
            log_panics::init();
        }
    }
    else {
        simple_logger::init_with_level(log_lvl)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    }

    let conf_path = matches
        .value_of("conf")
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "missing INI file"))?;
    let config = conf::parse_file(conf_path)?;

    let names = ServiceNames::derive(&config.topology.service, process::id());
    info!("Application service is {}", config.application.name);
    info!("Topology client {} uses {}", names.client, names.daemon);

    let mut launcher = config.topology.launcher();
    match ensure_daemon(&mut launcher, &names.daemon, config.topology.retry) {
        Ok(Spawned::AlreadyRunning) => info!("{} was running already", names.daemon),
        Ok(Spawned::Started) => info!("{} is started", names.daemon),
        Err(e) => return Err(io::Error::new(io::ErrorKind::Other, e)),
    }
    Ok(())
}

/// Entry function with top level error handling.
fn main() {
    if let Err(e) = handle_cli_args() {
        error!("{}", e);
        exit(1);
    }
}
