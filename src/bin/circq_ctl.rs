//! circq control client
//!
//! Kirim satu command ke server lalu tampilkan hasilnya.
//!
//! # Usage
//!
//! ```text
//! cargo run --bin circq_ctl -- --host 127.0.0.1:7878 configure 16
//! cargo run --bin circq_ctl -- push xyz
//! cargo run --bin circq_ctl -- pop 3
//! ```
//!
//! `pop` blocking sampai server punya cukup data. Exit code mengikuti errno
//! klasik device (EINVAL, ENOMEM, EFAULT, ...) jika server menolak command.

use circq::error::ClientError;
use circq::network::QueueClient;
use circq::trace::init_tracing;

enum Action {
    Configure(i64),
    Push(Vec<u8>),
    Pop(i64),
}

struct CtlConfig {
    host: String,
    action: Action,
}

fn usage() -> ! {
    eprintln!("Usage: circq_ctl [--host ADDR] <configure SIZE | push DATA | pop LENGTH>");
    std::process::exit(2);
}

fn parse_args() -> CtlConfig {
    let mut args = std::env::args().skip(1);
    let mut host = "127.0.0.1:7878".to_string();
    let mut action = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--host" | "-H" => host = args.next().unwrap_or_else(|| usage()),
            "configure" => {
                let size = args.next().and_then(|v| v.parse().ok());
                action = Some(Action::Configure(size.unwrap_or_else(|| usage())));
            }
            "push" => {
                let data = args.next().unwrap_or_else(|| usage());
                action = Some(Action::Push(data.into_bytes()));
            }
            "pop" => {
                let length = args.next().and_then(|v| v.parse().ok());
                action = Some(Action::Pop(length.unwrap_or_else(|| usage())));
            }
            _ => usage(),
        }
    }

    CtlConfig {
        host,
        action: action.unwrap_or_else(|| usage()),
    }
}

fn run(config: CtlConfig) -> Result<(), ClientError> {
    let mut client = QueueClient::connect(&config.host)?;

    match config.action {
        Action::Configure(size) => {
            client.configure(size)?;
            println!("configured: {} bytes", size);
        }
        Action::Push(data) => {
            client.enqueue(&data)?;
            println!("pushed: {} bytes", data.len());
        }
        Action::Pop(length) => {
            let data = client.dequeue(length)?;
            println!("data: {}", String::from_utf8_lossy(&data));
        }
    }

    Ok(())
}

fn main() {
    init_tracing();

    let config = parse_args();
    if let Err(e) = run(config) {
        eprintln!("❌ {}", e);
        let code = match e.queue_error() {
            #[cfg(unix)]
            Some(err) => err.errno(),
            _ => 1,
        };
        std::process::exit(code);
    }
}
