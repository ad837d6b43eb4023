//! AI Gateway CLI — 配置校验、提供方探测与单次补全的命令行工具
//!
//! Usage:
//!   ai-gateway-cli validate [--config <path>]      Validate gateway configuration
//!   ai-gateway-cli providers [--config <path>]     List providers and probe availability
//!   ai-gateway-cli health [--config <path>]        Probe providers and print adapter status
//!   ai-gateway-cli models [--config <path>]        Show models per provider
//!   ai-gateway-cli complete <task> <input...>      Route one request through the gateway
//!   ai-gateway-cli version                         Show version information

use ai_gateway::provider::ScriptedProvider;
use ai_gateway::{Gateway, GatewayBuilder, GatewayConfig, ProcessOptions, SelectionStrategy};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "validate" => cmd_validate(&args[2..]),
        "providers" => cmd_providers(&args[2..]).await,
        "health" => cmd_health(&args[2..]).await,
        "models" => cmd_models(&args[2..]),
        "complete" => cmd_complete(&args[2..]).await,
        "version" | "--version" | "-V" => cmd_version(),
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"ai-gateway-cli — AI 路由网关命令行工具

USAGE:
    ai-gateway-cli <COMMAND> [OPTIONS]

COMMANDS:
    validate                    Validate configuration and list enabled providers
    providers                   List registered providers with a live probe
    health                      Probe providers and print adapter status
    models                      Show the model each provider runs per task type
    complete <task> <input...>  Route one request and print the response as JSON
    version                     Show version information
    help                        Show this help message

OPTIONS:
    --config <path>             YAML configuration file
    --strategy <name>           PRIORITY, PERFORMANCE, LOAD_BALANCED, ROUND_ROBIN, ...
    --provider <name>           Start with this provider instead of selecting one
    --no-cache                  Do not read or write the response cache
    --dry-run                   Use scripted providers; nothing leaves the process

ENVIRONMENT:
    AI_GATEWAY_CONFIG           Configuration file used when --config is absent
    USE_OLLAMA, USE_OPENAI, ... Provider toggles applied on top of the file
    RUST_LOG                    Log filter (default: warn)"#
    );
}

fn cmd_version() {
    println!("ai-gateway-cli {}", env!("CARGO_PKG_VERSION"));
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

/// Positional arguments with `--flag value` pairs and bare switches removed.
fn positionals(args: &[String]) -> Vec<&str> {
    const WITH_VALUE: [&str; 3] = ["--config", "--strategy", "--provider"];
    let mut out = Vec::new();
    let mut skip = false;
    for arg in args {
        if skip {
            skip = false;
            continue;
        }
        if WITH_VALUE.contains(&arg.as_str()) {
            skip = true;
            continue;
        }
        if arg.starts_with("--") {
            continue;
        }
        out.push(arg.as_str());
    }
    out
}

fn load_config(args: &[String]) -> GatewayConfig {
    let path = flag_value(args, "--config")
        .map(PathBuf::from)
        .or_else(|| std::env::var("AI_GATEWAY_CONFIG").ok().map(PathBuf::from));

    let loaded = match path {
        Some(path) => GatewayConfig::from_yaml_file(&path).and_then(|mut c| {
            c.apply_env()?;
            Ok(c)
        }),
        None => GatewayConfig::from_env(),
    };
    match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn build_gateway(args: &[String]) -> Gateway {
    let config = load_config(args);
    let built = if has_flag(args, "--dry-run") {
        // Scripted adapters need no credentials, so the config is not validated.
        let names: Vec<String> = config
            .enabled_providers()
            .into_iter()
            .map(|(name, _)| name.to_string())
            .collect();
        let mut builder = GatewayBuilder::with_config(config);
        for name in names {
            builder = builder.with_provider(Arc::new(ScriptedProvider::new(name)));
        }
        builder.build()
    } else {
        Gateway::from_config(config)
    };
    match built {
        Ok(gateway) => gateway,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_validate(args: &[String]) {
    let config = load_config(args);
    if let Err(e) = config.validate() {
        println!("FAIL");
        eprintln!("  {e}");
        std::process::exit(1);
    }
    println!("Configuration OK");
    println!("  default task type:  {}", config.default_task_type);
    println!("  fallback threshold: {}", config.fallback_threshold);
    println!(
        "  retry:              {} x {} ms",
        config.retry.max_retries, config.retry.delay_ms
    );
    println!(
        "  cache:              {} (ttl {}s)",
        if config.cache.enabled { "on" } else { "off" },
        config.cache.ttl_secs
    );
    println!("\nEnabled providers:");
    let enabled = config.enabled_providers();
    if enabled.is_empty() {
        println!("  (none)");
    }
    for (name, settings) in enabled {
        let kind = if settings.local { "local" } else { "remote" };
        println!("  {:<10} priority {:<3} {}", name, settings.priority, kind);
    }
}

async fn cmd_providers(args: &[String]) {
    let gateway = build_gateway(args);
    let infos = gateway.providers().await;
    if infos.is_empty() {
        println!("No providers registered.");
        return;
    }
    for info in infos {
        let mark = if info.available { "up" } else { "down" };
        println!("  {:<10} {}", info.name, mark);
    }
}

async fn cmd_health(args: &[String]) {
    let gateway = build_gateway(args);
    for info in gateway.providers().await {
        println!("{} ({})", info.name, if info.available { "up" } else { "down" });
        if let Some(status) = gateway.service_statuses().get(&info.name) {
            println!(
                "  requests {} ok {} consecutive failures {}",
                status.total_requests, status.successful_requests, status.consecutive_failures
            );
            if let Some(latency) = status.average_latency_ms {
                println!("  average latency {latency:.0} ms");
            }
            if let Some(ref err) = status.last_error {
                println!("  last error: {err}");
            }
        }
    }
    for (health, score) in gateway.providers_by_score() {
        println!(
            "  {:<10} score {:.3} success {:.2} latency {:.0} ms",
            health.name, score, health.success_rate, health.average_latency_ms
        );
    }
}

fn cmd_models(args: &[String]) {
    let gateway = build_gateway(args);
    for (provider, models) in gateway.available_models() {
        println!("  {:<10} {}", provider, models.join(", "));
    }
}

async fn cmd_complete(args: &[String]) {
    let pos = positionals(args);
    if pos.len() < 2 {
        eprintln!("Usage: ai-gateway-cli complete <task> <input...> [--strategy S] [--provider P]");
        std::process::exit(1);
    }
    let task_type = pos[0];
    let input = pos[1..].join(" ");

    let mut options = ProcessOptions::new().with_cache(!has_flag(args, "--no-cache"));
    if let Some(s) = flag_value(args, "--strategy") {
        match s.parse::<SelectionStrategy>() {
            Ok(strategy) => options = options.with_strategy(strategy),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    }
    if let Some(p) = flag_value(args, "--provider") {
        options = options.with_provider(p);
    }

    let gateway = build_gateway(args);
    let response = gateway.process(task_type, &input, &options).await;
    match serde_json::to_string_pretty(&response) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
    if !response.success {
        std::process::exit(2);
    }
}
