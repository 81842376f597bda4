//! Stub service for testing sidecar without a Python runtime
//!
//! Listens on `127.0.0.1:$FLASK_RUN_PORT` and serves the two routes the
//! supervisor relies on:
//!
//! - `GET /api/v1/server/hello/<name>` returns `{"message": "Hello, <name>!"}`
//! - `GET /api/v1/server/shutdown?key=<key>` exits when `key` matches
//!   `$FLASK_SERVER_ADMIN_KEY`, otherwise answers 403

use clap::{Arg, ArgAction, Command};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const HELLO_PREFIX: &str = "/api/v1/server/hello/";
const SHUTDOWN_PATH: &str = "/api/v1/server/shutdown";
const MAX_REQUEST_HEAD: usize = 16 * 1024;

#[derive(Clone)]
struct StubOptions {
    admin_key: Option<String>,
    ignore_shutdown: bool,
    exit_delay: Duration,
    exit_code: i32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Command::new("sidecar-stub")
        .about("Stub HTTP service for sidecar tests")
        .arg(
            Arg::new("port-env")
                .long("port-env")
                .value_name("NAME")
                .help("Variable holding the port")
                .default_value("FLASK_RUN_PORT"),
        )
        .arg(
            Arg::new("key-env")
                .long("key-env")
                .value_name("NAME")
                .help("Variable holding the admin key")
                .default_value("FLASK_SERVER_ADMIN_KEY"),
        )
        .arg(
            Arg::new("ignore-shutdown")
                .long("ignore-shutdown")
                .help("Accept shutdown requests but keep running")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("exit-delay-ms")
                .long("exit-delay-ms")
                .value_name("MS")
                .help("Delay between accepting a shutdown and exiting")
                .value_parser(clap::value_parser!(u64))
                .default_value("0"),
        )
        .arg(
            Arg::new("exit-code")
                .long("exit-code")
                .value_name("CODE")
                .help("Exit status after an accepted shutdown")
                .value_parser(clap::value_parser!(i32))
                .default_value("0"),
        )
        .arg(
            Arg::new("crash")
                .long("crash")
                .help("Exit with status 3 before listening")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("env-dump")
                .long("env-dump")
                .value_name("PATH")
                .help("Write the FLASK_* environment as JSON to PATH at startup"),
        )
        .get_matches();

    if let Some(path) = matches.get_one::<String>("env-dump") {
        let env: BTreeMap<String, String> = std::env::vars()
            .filter(|(name, _)| name.starts_with("FLASK_"))
            .collect();
        std::fs::write(path, serde_json::to_string_pretty(&env)?)?;
    }

    if matches.get_flag("crash") {
        eprintln!("sidecar-stub: crashing on request");
        std::process::exit(3);
    }

    let port_env = matches
        .get_one::<String>("port-env")
        .map_or("FLASK_RUN_PORT", String::as_str);
    let port: u16 = std::env::var(port_env)
        .map_err(|_| format!("{port_env} is not set"))?
        .parse()?;

    let key_env = matches
        .get_one::<String>("key-env")
        .map_or("FLASK_SERVER_ADMIN_KEY", String::as_str);
    let options = StubOptions {
        admin_key: std::env::var(key_env).ok().filter(|k| !k.is_empty()),
        ignore_shutdown: matches.get_flag("ignore-shutdown"),
        exit_delay: Duration::from_millis(
            matches.get_one::<u64>("exit-delay-ms").copied().unwrap_or(0),
        ),
        exit_code: matches.get_one::<i32>("exit-code").copied().unwrap_or(0),
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(serve(port, options))
}

async fn serve(port: u16, options: StubOptions) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    println!("sidecar-stub listening on http://127.0.0.1:{port}");

    loop {
        let (stream, _) = listener.accept().await?;
        let options = options.clone();
        tokio::spawn(async move {
            if let Err(err) = handle(stream, &options).await {
                eprintln!("sidecar-stub: connection error: {err}");
            }
        });
    }
}

async fn handle(mut stream: TcpStream, options: &StubOptions) -> std::io::Result<()> {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") && head.len() < MAX_REQUEST_HEAD {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
    }

    let head = String::from_utf8_lossy(&head);
    let mut parts = head.lines().next().unwrap_or_default().split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    println!("sidecar-stub: {method} {path}");

    if method != "GET" {
        return respond(&mut stream, 405, &json!({"message": "Method Not Allowed"})).await;
    }

    if let Some(name) = path.strip_prefix(HELLO_PREFIX) {
        let body = json!({"message": format!("Hello, {name}!")});
        return respond(&mut stream, 200, &body).await;
    }

    if path == SHUTDOWN_PATH {
        let presented = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(name, _)| *name == "key")
            .map(|(_, value)| value);

        let authorized = matches!(
            (presented, options.admin_key.as_deref()),
            (Some(given), Some(expected)) if given == expected
        );
        if !authorized {
            return respond(&mut stream, 403, &json!({"message": "Forbidden"})).await;
        }

        respond(&mut stream, 200, &json!({"message": "Server shutting down..."})).await?;
        if options.ignore_shutdown {
            println!("sidecar-stub: ignoring shutdown");
            return Ok(());
        }

        tokio::time::sleep(options.exit_delay).await;
        println!("sidecar-stub: exiting");
        std::process::exit(options.exit_code);
    }

    respond(&mut stream, 404, &json!({"message": "Not Found"})).await
}

async fn respond(
    stream: &mut TcpStream,
    status: u16,
    body: &serde_json::Value,
) -> std::io::Result<()> {
    let reason = match status {
        200 => "OK",
        403 => "FORBIDDEN",
        404 => "NOT FOUND",
        405 => "METHOD NOT ALLOWED",
        _ => "",
    };
    let body = body.to_string();
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await
}
