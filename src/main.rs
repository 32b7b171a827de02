use clap::{Parser, Subcommand};
use inetstack::config::{self, EffectiveConfig, StackConfig, DEFAULT_MTU};
use inetstack::driver::LoopbackNic;
use inetstack::telemetry::init_logging;
use inetstack::{Inet, Ipv4, Stack};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

/// Loopback driver sizing for `show` and `run`
const QUEUE_LEN: usize = 256;
const BUFFERS: usize = 1024;

/// Timer resolution of the run loop
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "inetstack")]
#[command(about = "IP-layer control plane for a single network interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate config.toml
    Validate {
        /// Path to config.toml
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Apply the configuration to a loopback stack and print its state
    Show {
        /// Path to config.toml
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Run the stack until interrupted
    Run {
        /// Path to config.toml
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { config } => {
            init_logging(None);
            cmd_validate(&config)
        }
        Commands::Show { config } => {
            init_logging(None);
            cmd_show(&config)
        }
        Commands::Run { config } => cmd_run(&config),
    };

    if let Err(e) = result {
        eprintln!("[ERROR] {}", e);
        std::process::exit(1);
    }
}

fn load_valid(config_path: &PathBuf) -> Result<StackConfig, String> {
    let cfg = config::load(config_path).map_err(|e| format!("Failed to load config: {}", e))?;

    let validation = config::validate(&cfg);
    validation.print_diagnostics();

    if validation.has_errors() {
        return Err("Validation failed".to_string());
    }
    Ok(cfg)
}

fn build_stack(cfg: &StackConfig) -> Result<Stack<Ipv4>, String> {
    let mac = cfg.link_addr().map_err(|e| e.to_string())?;
    let nic = LoopbackNic::new(
        &cfg.interface,
        mac,
        cfg.mtu.unwrap_or(DEFAULT_MTU),
        QUEUE_LEN,
        BUFFERS,
    );
    let mut stack = Stack::new(Box::new(nic));
    config::apply(cfg, &mut stack).map_err(|e| e.to_string())?;
    Ok(stack)
}

fn cmd_validate(config_path: &PathBuf) -> Result<(), String> {
    println!("[INFO] Validating {}...", config_path.display());
    load_valid(config_path)?;
    println!("[INFO] Configuration is valid");
    Ok(())
}

fn cmd_show(config_path: &PathBuf) -> Result<(), String> {
    let cfg = load_valid(config_path)?;

    let effective = EffectiveConfig::from_config(&cfg);
    let effective =
        toml::to_string_pretty(&effective).map_err(|e| format!("Failed to serialize: {}", e))?;
    println!("# Effective configuration\n{}", effective);

    let stack = build_stack(&cfg)?;
    print_state(&stack);
    Ok(())
}

fn print_state(stack: &Stack<Ipv4>) {
    println!("# Stack state");
    println!("interface   {} ({}, mtu {})", stack.ifname(), stack.link_addr(), stack.mtu());
    println!("configured  {}", stack.is_configured());
    println!("address     {}/{}", stack.ip_addr(), stack.netmask());
    println!("broadcast   {}", stack.broadcast_addr());
    println!("gateway     {}", stack.gateway());
    println!("dns         {}", stack.dns_addr());
    println!("domain      {}", stack.domain_name());

    let mut vips: Vec<_> = stack.virtual_ips().iter().collect();
    vips.sort();
    for vip in vips {
        println!("vip         {}", vip);
    }

    println!(
        "buffers     {}/{}",
        stack.buffers_available(),
        stack.buffers_total()
    );
    println!("tx queue    {}", stack.transmit_queue_available());
}

fn cmd_run(config_path: &PathBuf) -> Result<(), String> {
    let cfg = config::load(config_path).map_err(|e| format!("Failed to load config: {}", e))?;
    init_logging(cfg.log.as_ref());

    let validation = config::validate(&cfg);
    for warning in &validation.warnings {
        tracing::warn!("{}", warning);
    }
    if validation.has_errors() {
        for error in &validation.errors {
            tracing::error!("{}", error);
        }
        return Err("Validation failed".to_string());
    }

    let mut stack = build_stack(&cfg)?;
    let stats = stack.stats().clone();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to create runtime: {}", e))?;

    rt.block_on(async move {
        info!("{} running, press Ctrl-C to stop", stack.ifname());
        let mut ticker = tokio::time::interval(POLL_INTERVAL);

        loop {
            tokio::select! {
                _ = ticker.tick() => stack.poll(Instant::now()),
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down...");
                    break;
                }
            }
        }
    });

    for (name, value) in stats.export() {
        info!("{} = {}", name, value);
    }
    Ok(())
}
