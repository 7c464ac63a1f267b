use anyhow::{anyhow, Context, Result};
use log::{error, info};
use std::{env, process, time::Duration};
use structopt::StructOpt;

use lxd_image_builder::{
    backends::LxcBackend, fetch::fetch, frontends::BuildFileFrontend, network::NetworkWait,
    services::SpecFrontend, Controller,
};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "lxd-image-builder",
    about = "Builds LXD images from YAML build files."
)]
struct Opt {
    /// The lxc binary used to talk to LXD.
    #[structopt(long, env = "LXC", default_value = "lxc")]
    lxc: String,

    /// Seconds to wait for a build container to get a global IPv4 address.
    #[structopt(long, default_value = "60")]
    network_timeout: u64,

    /// Seconds between network status checks.
    #[structopt(long, default_value = "1")]
    poll_interval: u64,

    #[structopt(long)]
    /// Keep building the remaining files after a failure.
    keep_going: bool,

    /// Build files to process, as paths or URLs.
    #[structopt(name = "SOURCE", required = true, min_values = 1)]
    sources: Vec<String>,
}

fn main() {
    if env::var_os("LOG").is_none() {
        env::set_var("LOG", "info");
    }
    pretty_env_logger::init_custom_env("LOG");

    let opt = Opt::from_args();

    if let Err(err) = run(opt) {
        error!("{:#}", err);
        process::exit(1);
    }
}

fn run(opt: Opt) -> Result<()> {
    if opt.poll_interval == 0 {
        return Err(anyhow!("--poll-interval must be at least one second"));
    }
    let network_wait = NetworkWait {
        timeout: Duration::from_secs(opt.network_timeout),
        interval: Duration::from_secs(opt.poll_interval),
    };

    let mut frontend = BuildFileFrontend::new();
    let mut controller = Controller::init(LxcBackend::new(opt.lxc.as_str()), network_wait);
    let mut failed = 0;

    for source in opt.sources.iter() {
        info!("processing: {}", source);

        let result = process_source(&mut frontend, &mut controller, source);
        match result {
            Ok(()) => info!("finished: {}", source),
            Err(err) if opt.keep_going => {
                error!("{}: {:#}", source, err);
                failed += 1;
            }
            Err(err) => return Err(err),
        }
    }

    if failed > 0 {
        return Err(anyhow!(
            "{} of {} builds failed",
            failed,
            opt.sources.len()
        ));
    }

    Ok(())
}

fn process_source(
    frontend: &mut BuildFileFrontend,
    controller: &mut Controller,
    source: &str,
) -> Result<()> {
    let document = fetch(source)?;
    let spec = frontend
        .build_spec(&document)
        .with_context(|| format!("parsing {}", source))?;

    controller
        .build(&spec)
        .with_context(|| format!("[{}] building from {}", spec.alias, source))?;

    Ok(())
}
