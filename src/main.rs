mod config;
mod prober;
mod scheduler;
mod target;
mod util;

use config::Cli;
use scheduler::Scheduler;
use target::{DnsLookup, ProbeTarget, TargetError, TargetResolver};

use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Duration;
use tracing::debug;

const PROBE_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log_level = cli.get_tracing_level().unwrap_or_else(|e| abort(e));

    // Diagnostics go to stderr, stdout is reserved for probe lines
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
                         .add_directive(format!("webping={}", log_level.as_str().to_lowercase()).parse()?))
        .init();

    let target = setup(&cli).await.unwrap_or_else(|e| abort(e));

    println!("{}", prober::banner(&target));

    debug!("pinned endpoint {} (dns server {})", target.socket_addr(), target.dns_ip);

    let scheduler = Scheduler::new(PROBE_INTERVAL)?;
    let target = &target;
    scheduler.run(move || async move {
        let outcome = prober::http::probe_http(target).await;
        debug!("outcome {:?} verdict {:?}", outcome.kind, outcome.verdict(target.expected_status));
        println!("{}", outcome.report_line(target.port, target.expected_status));
    }).await?;

    Ok(())
}

async fn setup(cli: &Cli) -> Result<ProbeTarget, TargetError> {
    let settings = cli.settings()?;
    let mut resolver = TargetResolver::new(DnsLookup::new(settings.dns_ip), StdRng::from_entropy());
    resolver.resolve(settings).await
}

/// Print a configuration error the way the probe reports it and exit before probing.
fn abort(e: TargetError) -> ! {
    println!("{}", e);
    if let Some(hint) = e.hint() {
        println!("{}", hint);
    }
    std::process::exit(1);
}
