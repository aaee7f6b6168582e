//! CLI tool for TLS Advisor

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use colored::Colorize;
use std::path::PathBuf;

#[cfg(feature = "cli")]
use advisorlib::{
    report_json, report::render_text, report::CheckStatus, Advisor, AdvisorConfig, AdminServer,
};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "tls-advisor")]
#[command(
    about = "Diagnose and mitigate outbound HTTPS failures caused by outdated OpenSSL builds",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Run the TLS diagnostics and print the report
    Check {
        /// Output format (text or json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Serve the admin diagnostics page over HTTP
    Serve {
        /// Override the configured bind address
        #[arg(short, long)]
        bind: Option<String>,
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[cfg(feature = "cli")]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    match cli.command.unwrap_or(Commands::Check {
        format: "text".into(),
    }) {
        Commands::Check { format } => run_check(config, &format),
        Commands::Serve { bind, port } => run_serve(config, bind, port),
    }
}

#[cfg(feature = "cli")]
fn load_config(path: Option<&std::path::Path>) -> advisorlib::Result<AdvisorConfig> {
    match path {
        Some(path) => AdvisorConfig::from_toml_file(path),
        None => Ok(AdvisorConfig::default()),
    }
}

#[cfg(feature = "cli")]
fn run_check(config: AdvisorConfig, format: &str) {
    let advisor = Advisor::new(config);
    let report = advisor.diagnose();

    match format {
        "json" => match report_json(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("{} {}", "error:".red().bold(), e);
                std::process::exit(1);
            }
        },
        _ => {
            let now = advisor.store().now();
            if report.cannot_operate() {
                print!("{}", render_text(&report, now));
                std::process::exit(2);
            }
            for row in &report.rows {
                let tag = match row.status {
                    CheckStatus::Pass => "PASS".green().bold(),
                    CheckStatus::Fail => "FAIL".red().bold(),
                    CheckStatus::Warning => "WARN".yellow().bold(),
                };
                println!("[{}] {}", tag, row.message);
            }
            if let Some(rec) = &report.recommendation {
                let (title, body) = advisorlib::report::recommendation_text(rec, now);
                println!();
                println!("{}", title.bold());
                for paragraph in body {
                    println!("{}", paragraph);
                }
            }
            if let Some(backend) = &report.backend {
                println!();
                println!("TLS backend reported: {}", backend);
            }
        }
    }
}

#[cfg(feature = "cli")]
fn run_serve(mut config: AdvisorConfig, bind: Option<String>, port: Option<u16>) {
    if let Some(bind) = bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let server_config = config.server.clone();
    let advisor = std::sync::Arc::new(Advisor::new(config));
    let server = AdminServer::new(server_config, advisor);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{} failed to start runtime: {}", "error:".red().bold(), e);
            std::process::exit(1);
        }
    };
    if let Err(e) = runtime.block_on(server.run()) {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("tls-advisor was built without the 'cli' feature");
    std::process::exit(1);
}
