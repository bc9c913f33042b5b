//! circq Server Binary
//!
//! Menjalankan satu queue bersama di belakang TCP command service.
//!
//! Usage:
//!   cargo run --release --bin circq_server [OPTIONS]

use circq::network::{Server, ServerConfig};
use circq::trace::{init_tracing, init_tracing_verbose};
use tracing::error;

fn parse_size(value: &str) -> Option<usize> {
    let value = value.trim();
    let (digits, multiplier) = match value.chars().last() {
        Some('k') | Some('K') => (&value[..value.len() - 1], 1024),
        Some('m') | Some('M') => (&value[..value.len() - 1], 1024 * 1024),
        _ => (value, 1),
    };
    digits.parse::<usize>().ok()?.checked_mul(multiplier)
}

fn print_help() {
    println!("circq server - resizable circular byte queue over TCP\n");
    println!("Usage: circq_server [OPTIONS]\n");
    println!("Options:");
    println!("  -b, --bind <ADDR>          Bind address (default: 127.0.0.1:7878)");
    println!("  -c, --capacity <SIZE>      Configure queue at startup (e.g. 4096, 64K, 1M)");
    println!("      --max-capacity <SIZE>  Largest size CONFIGURE accepts (default: 64M)");
    println!("      --socket-buffer <SIZE> SO_SNDBUF/SO_RCVBUF per client (default: 256K)");
    println!("  -v, --verbose              Log every command");
    println!("  -h, --help                 Show this help");
}

fn parse_args() -> Result<ServerConfig, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ServerConfig::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = || -> Result<String, String> {
            i += 1;
            args.get(i)
                .cloned()
                .ok_or_else(|| format!("{} needs a value", flag))
        };

        match flag {
            "--bind" | "-b" => config.bind_addr = value()?,
            "--capacity" | "-c" => {
                let v = value()?;
                let size = parse_size(&v).ok_or_else(|| format!("bad capacity: {}", v))?;
                config.initial_capacity = Some(size);
            }
            "--max-capacity" => {
                let v = value()?;
                config.max_capacity =
                    parse_size(&v).ok_or_else(|| format!("bad max capacity: {}", v))?;
            }
            "--socket-buffer" => {
                let v = value()?;
                config.socket_buffer =
                    parse_size(&v).ok_or_else(|| format!("bad socket buffer: {}", v))?;
            }
            "--verbose" | "-v" => config.verbose = true,
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => return Err(format!("unknown option: {}", other)),
        }
        i += 1;
    }

    Ok(config)
}

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("❌ {}", msg);
            print_help();
            std::process::exit(2);
        }
    };

    if config.verbose {
        init_tracing_verbose();
    } else {
        init_tracing();
    }

    let server = match Server::bind(config) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "failed to start server");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        error!(error = %e, "server error");
        std::process::exit(1);
    }
}
