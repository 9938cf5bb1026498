//! whois - command line WHOIS client
//!
//! Looks up one or more domains (or IP addresses), following registry
//! referrals, and prints the raw answer of the last server.

use anyhow::Context;
use std::env;
use std::process;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use whois_client::{
    CancellationToken, ConfigError, LookupConfig, LookupResult, WhoisClient, ZoneConfig,
};

#[tokio::main]
async fn main() {
    init_logging();

    let args: Vec<String> = env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return;
    }

    match run(&args).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Command line invocation
#[derive(Debug, Default)]
struct CliArgs {
    servers_path: Option<String>,
    server: Option<String>,
    timeout_secs: Option<u64>,
    follow: Option<usize>,
    targets: Vec<String>,
}

fn parse_args(args: &[String]) -> Result<CliArgs, ConfigError> {
    let mut cli = CliArgs::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--servers" | "-s" => cli.servers_path = Some(flag_value(&mut iter, arg)?),
            "--server" | "-H" => cli.server = Some(flag_value(&mut iter, arg)?),
            "--timeout" | "-t" => {
                let value = flag_value(&mut iter, arg)?;
                let secs = value
                    .parse()
                    .map_err(|e| ConfigError::invalid_value(arg, value.clone(), e))?;
                cli.timeout_secs = Some(secs);
            }
            "--follow" | "-f" => {
                let value = flag_value(&mut iter, arg)?;
                let follow = value
                    .parse()
                    .map_err(|e| ConfigError::invalid_value(arg, value.clone(), e))?;
                cli.follow = Some(follow);
            }
            flag if flag.starts_with('-') && flag.len() > 1 => {
                return Err(ConfigError::invalid(format!("unknown option '{}'", flag)));
            }
            target => cli.targets.push(target.to_string()),
        }
    }

    if cli.targets.is_empty() {
        return Err(ConfigError::invalid("no domain given (see --help)"));
    }

    Ok(cli)
}

fn flag_value<'a>(
    iter: &mut impl Iterator<Item = &'a String>,
    flag: &str,
) -> Result<String, ConfigError> {
    iter.next()
        .cloned()
        .ok_or_else(|| ConfigError::invalid(format!("option '{}' needs a value", flag)))
}

/// Run all lookups; returns whether every one succeeded
async fn run(args: &[String]) -> anyhow::Result<bool> {
    let cli = parse_args(args)?;

    let mut config = LookupConfig::from_env()?;
    if let Some(path) = cli.servers_path {
        config = config.with_servers_path(path);
    }
    if let Some(host) = cli.server {
        config = config.with_server(ZoneConfig::new(host));
    }
    if let Some(secs) = cli.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    if let Some(follow) = cli.follow {
        config = config.with_max_follow(follow);
    }

    let servers_path = config.servers_path.clone();
    let client = WhoisClient::new(config).with_context(|| {
        format!("failed to load WHOIS servers from {}", servers_path.display())
    })?;

    let active = client.config();
    tracing::info!(
        targets = cli.targets.len(),
        server_override = client.has_server_override(),
        timeout_secs = active.timeout.as_secs(),
        max_follow = active.max_follow,
        "Starting WHOIS lookups"
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling lookups");
            trigger.cancel();
        }
    });

    let results = client.lookup_batch(&cancel, &cli.targets).await;

    let mut all_ok = true;
    for (target, result) in cli.targets.iter().zip(results) {
        match result {
            Ok(result) => print_result(&result),
            Err(e) => {
                all_ok = false;
                eprintln!("{}", e);
                eprintln!("{}", e.user_message());
                tracing::debug!(input = %target, code = %e.code, "Lookup failed");
            }
        }
    }

    Ok(all_ok)
}

fn print_result(result: &LookupResult) {
    println!(
        "% {} via {} ({} hop{}, {} ms)",
        result.domain,
        result.referral_server,
        result.hops,
        if result.hops == 1 { "" } else { "s" },
        result.duration.as_millis()
    );
    println!();
    print!("{}", result.raw_data);
    if !result.raw_data.ends_with('\n') {
        println!();
    }
    println!();
}

fn print_help() {
    println!("whois {} - WHOIS client with referral following", whois_client::VERSION);
    println!();
    println!("Usage: whois [OPTIONS] <domain-or-ip>...");
    println!();
    println!("Options:");
    println!("  -s, --servers <path>   WHOIS server directory (default: ./servers.json)");
    println!("  -H, --server <host>    Query this server, ignoring the directory");
    println!("  -t, --timeout <secs>   Per-server timeout (default: 30)");
    println!("  -f, --follow <n>       Maximum referrals to follow (default: 10)");
    println!("  -h, --help             Show this help");
    println!();
    println!("Environment:");
    println!("  WHOIS_SERVERS_FILE, WHOIS_SERVER, WHOIS_TIMEOUT_SECS, WHOIS_MAX_FOLLOW,");
    println!("  WHOIS_MAX_RESPONSE, WHOIS_PORT, RUST_LOG");
}
