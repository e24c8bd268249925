//! `skyway-cli` – Skyway Command Line Interface
//!
//! This binary is the operator console for the skyway navigation engine.  It:
//!
//! 1. Checks for `~/.skyway/config.toml` and writes the defaults on first run.
//! 2. Loads the city (from `city_file`, or the built-in demo city).
//! 3. Drops the user into an **interactive REPL** with slash-commands
//!    (`/route`, `/spawn`, `/tick`, `/run`, `/contacts`, `/help`, …).
//! 4. Intercepts **Ctrl-C** to stop a running traffic loop and exit cleanly.

mod config;
mod repl;

use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use skyway_geometry::{CityModel, StaticCity};
use skyway_middleware::EventBus;

fn main() {
    // Keep the guard alive so pending spans flush on exit.
    let _telemetry = skyway_runtime::init_tracing("skyway");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!(
            "{}",
            "⚠  Ctrl-C received – stopping traffic and exiting …"
                .yellow()
                .bold()
        );
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; /run can only stop on its own");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            match config::save(&config::Config::default()) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    // ── City ──────────────────────────────────────────────────────────────
    let city = load_city(cfg.city_file.as_deref());
    println!(
        "  City: {} buildings within ({}, {}) – ({}, {})",
        city.buildings().len(),
        city.bounds.min_x,
        city.bounds.min_y,
        city.bounds.max_x,
        city.bounds.max_y
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start async runtime".red(), e);
            std::process::exit(1);
        }
    };

    println!();
    println!(
        "  Type {} for a list of commands.\n",
        "/help".bold().cyan()
    );

    // ── Interactive REPL ──────────────────────────────────────────────────
    let session = repl::Session::new(cfg, city, EventBus::default(), runtime, shutdown);
    repl::run(session);
}

/// Load the configured city, falling back to the demo city when the file is
/// missing or malformed.
fn load_city(path: Option<&str>) -> StaticCity {
    let Some(path) = path else {
        return config::demo_city();
    };
    match config::load_city(Path::new(path)) {
        Ok(city) => city,
        Err(e) => {
            println!("{}: {}", "City error".red(), e);
            println!("  Using the built-in demo city.");
            config::demo_city()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ______         __      __           "#.bold().cyan());
    println!("{}", r#"  / __/ /____ __ / | /| / /__ ___ __   "#.bold().cyan());
    println!("{}", r#" _\ \/  '_/ // / | |/ |/ / _ `/ // /   "#.bold().cyan());
    println!("{}", r#"/___/_/\_\\_, /  |__/|__/\_,_/\_, /    "#.bold().cyan());
    println!("{}", r#"          /___/               /___/     "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Skyway".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Jetpack Airspace Navigation & Collision Avoidance");
    println!();
}
