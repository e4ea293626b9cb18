use std::{env, path::PathBuf, process};

use anyhow::Context;
use log::LevelFilter;

use sounder::{
    benchmark::{ReductionPolicy, ThroughputBenchmark},
    config::{SounderConfig, SounderConfigLoadError},
    error::ProbeError,
    geo,
    latency::{self, fastest},
    server::{fetch_server_list, find_server, Server},
    transfer::{Direction, HttpTransport},
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_CONFIG_FILE: &str = "sounder.toml";

struct Args {
    server_id: Option<String>,
    num_closest: Option<usize>,
    trials: Option<u32>,
    algorithm: Option<ReductionPolicy>,
    config_path: Option<PathBuf>,
    list_servers: bool,
    quiet: bool,
    debug: bool,
    report: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut parsed = Args {
        server_id: None,
        num_closest: None,
        trials: None,
        algorithm: None,
        config_path: None,
        list_servers: false,
        quiet: false,
        debug: false,
        report: false,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-s" | "--server" => {
                let value = args.next().context("--server requires a server id")?;
                parsed.server_id = Some(value);
            }
            "--closest" => {
                let value = args.next().context("--closest requires a value")?;
                parsed.num_closest = Some(value.parse()?);
            }
            "--trials" => {
                let value = args.next().context("--trials requires a value")?;
                parsed.trials = Some(value.parse()?);
            }
            "--algo" => {
                let value = args.next().context("--algo requires average|max")?;
                parsed.algorithm = Some(value.parse().map_err(|e: String| anyhow::anyhow!(e))?);
            }
            "--config" => {
                let value = args.next().context("--config requires a path")?;
                parsed.config_path = Some(PathBuf::from(value));
            }
            "-l" | "--list" => parsed.list_servers = true,
            "-q" | "--quiet" => parsed.quiet = true,
            "-d" | "--debug" => parsed.debug = true,
            "--report" => parsed.report = true,
            "-v" | "--version" => {
                println!("sounder - Version: {VERSION}");
                process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            other => return Err(anyhow::anyhow!("unknown arg: {other}")),
        }
    }

    Ok(parsed)
}

fn print_help() {
    println!("sounder options:");
    println!("  -s, --server <id>      test against a specific server id");
    println!("  --closest <n>          geographically close candidates to latency-test");
    println!("  --trials <n>           latency trials per candidate");
    println!("  --algo <average|max>   sample reduction policy");
    println!("  --config <path>        config file (default {DEFAULT_CONFIG_FILE})");
    println!("  -l, --list             list known servers and exit");
    println!("  -q, --quiet            only output server and results");
    println!("  -d, --debug            per-sample logging");
    println!("  --report               machine-readable result line");
    println!("  -v, --version          print version");
}

fn print_server(server: &Server) {
    println!(
        "{:<4} | {} ({}, {})",
        server.id, server.sponsor, server.name, server.country
    );
}

fn load_config(path: &PathBuf) -> anyhow::Result<SounderConfig> {
    match SounderConfig::load(path) {
        Ok(config) => {
            // Save config to fill missing fields
            let _ = config.save(path);
            Ok(config)
        }
        Err(SounderConfigLoadError::Io(_)) => {
            // No config on disk yet; write the defaults back
            let default_config = SounderConfig::default();
            let _ = default_config.save(path);
            Ok(default_config)
        }
        Err(SounderConfigLoadError::Parse(parse_error)) => Err(parse_error.into()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args()?;
    let _ = dotenvy::dotenv();

    let filter = if args.debug {
        // Debug wins over quiet, same as turning both knobs on a dashboard.
        LevelFilter::Debug
    } else if args.quiet || args.report {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    env_logger::builder().filter_level(filter).init();

    let config_path = args
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let mut config = load_config(&config_path)?;

    if let Some(n) = args.num_closest {
        config.num_closest = n;
    }
    if let Some(trials) = args.trials {
        config.latency_trials = trials;
    }
    if let Some(algorithm) = args.algorithm {
        config.algorithm = algorithm;
    }
    config
        .validate()
        .map_err(ProbeError::InvalidArgument)
        .context("bad configuration")?;

    let transport = HttpTransport::new(&config)?;
    let directory = fetch_server_list(transport.client(), &config.directory_url).await?;

    if args.list_servers {
        for server in &directory.servers {
            print_server(server);
        }
        return Ok(());
    }

    let test_server = match &args.server_id {
        Some(id) => {
            // They asked for a server, skip selection but still measure
            // latency so the report has a ping.
            let found = find_server(id, &directory.servers)
                .with_context(|| format!("cannot locate server id '{id}' in the directory"))?;
            let measured = latency::latency(&transport, &found, config.latency_trials).await?;
            let mut chosen = found;
            chosen.avg_latency = Some(measured);
            chosen
        }
        None => {
            let candidates = geo::closest(
                config.num_closest,
                &directory.servers,
                directory.client.lat,
                directory.client.lon,
            );
            fastest(&transport, config.latency_trials, &candidates).await?
        }
    };
    print_server(&test_server);

    let benchmark = ThroughputBenchmark::from_config(&config);
    let download_mbps = benchmark
        .measure(&transport, &test_server, Direction::Download)
        .await?;
    let upload_mbps = benchmark
        .measure(&transport, &test_server, Direction::Upload)
        .await?;

    let ping = test_server.avg_latency.unwrap_or_default();
    if args.report {
        println!(
            "{},{:.2},{:.2},{:.2}",
            test_server.id,
            ping.as_secs_f64() * 1000.0,
            download_mbps,
            upload_mbps
        );
    } else {
        println!("Ping: {ping:?} | Download: {download_mbps:.2} Mbps | Upload: {upload_mbps:.2} Mbps");
    }

    Ok(())
}
