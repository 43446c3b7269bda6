// Copyright (C) 2021  Braiins Systems s.r.o.
//
// This file is part of Braiins Open-Source Initiative (BOSI).
//
// BOSI is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//
// Please, keep in mind that we may also license BOSI or any part thereof
// under a proprietary license. For more information on the terms and conditions
// of such proprietary license or if you have any other questions, please
// contact us at opensource@braiins.com.

use std::path::PathBuf;

use anyhow::Context;
use clap::{App, Arg};

const DEFAULT_CONF_PATH: &str = "progdn-rvi.conf";

struct Args {
    verbose: bool,
    conf: PathBuf,
    background: bool,
}

fn parse_args() -> Args {
    let matches = App::new("rvi-relay")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Transparent TCP relay that spoofs backend connections with the real PROXY-protocol visitor address")
        .arg(
            Arg::with_name("verbose")
                .long("verbose")
                .help("Enable logging (disabled by default)"),
        )
        .arg(
            Arg::with_name("conf")
                .long("conf")
                .takes_value(true)
                .value_name("PATH")
                .default_value(DEFAULT_CONF_PATH)
                .help("Configuration file path"),
        )
        .arg(
            Arg::with_name("background")
                .long("background")
                .help("Daemonize: detach from the controlling terminal"),
        )
        .get_matches();

    Args {
        verbose: matches.is_present("verbose"),
        conf: PathBuf::from(matches.value_of("conf").unwrap()),
        background: matches.is_present("background"),
    }
}

fn raise_fd_limit(log: &slog::Logger) -> anyhow::Result<()> {
    use rlimit::{getrlimit, setrlimit, Resource};

    let (_soft, hard) = getrlimit(Resource::NOFILE).context("reading RLIMIT_NOFILE")?;
    setrlimit(Resource::NOFILE, hard, hard).context("raising RLIMIT_NOFILE to the hard limit")?;
    slog::debug!(log, "raised RLIMIT_NOFILE"; "limit" => hard);
    Ok(())
}

fn daemonize() -> anyhow::Result<()> {
    daemonize::Daemonize::new()
        .start()
        .context("daemonizing (--background)")
}

fn main() -> anyhow::Result<()> {
    let args = parse_args();

    // Logging comes up before the config is loaded so a config error while
    // --verbose is set still reaches syslog, matching the original's log
    // setup ordering.
    let log = rvi_relay::logging::build(args.verbose);

    let config = rvi_relay::config::Config::load(&args.conf)
        .with_context(|| format!("loading configuration from {}", args.conf.display()))?;

    if args.background {
        daemonize()?;
    }

    raise_fd_limit(&log)?;

    let runtime = tokio::runtime::Runtime::new().context("starting the async runtime")?;
    runtime.block_on(async_main(config, log))
}

async fn async_main(config: rvi_relay::config::Config, log: slog::Logger) -> anyhow::Result<()> {
    let (trigger, tripwire) = rvi_relay::halt::new_trigger();
    tokio::spawn(rvi_relay::halt::wait_for_shutdown_signal(
        trigger,
        log.clone(),
    ));

    let drain_timeout = None; // unconditional wait, matching the original
    let run_log = log.clone();
    rvi_relay::run(config, run_log, tripwire).await?;

    rvi_relay::halt::drain(rvi_relay::session::live_count, drain_timeout, &log).await;
    slog::info!(log, "all sessions drained, exiting");
    Ok(())
}
