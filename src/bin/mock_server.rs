//! Development server: the full debugport API over a scripted mock bridge.
//!
//! Stands in for a real debugger host while developing automation clients
//! and exercising the API end to end.

use anyhow::Context;
use clap::Parser;
use debugport::api;
use debugport::bridge::mock::MockBridge;
use debugport::bridge::SharedBridge;
use debugport::http::{HttpServer, Router};
use std::net::SocketAddr;
use std::sync::mpsc;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on.
    #[clap(long, default_value = "127.0.0.1:27042")]
    listen: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let addr: SocketAddr = args.listen.parse().context("Invalid listen address")?;

    let bridge: SharedBridge = Arc::new(MockBridge::new());
    let mut router = Router::new();
    api::register_all(&mut router, &bridge);

    let mut server = HttpServer::new();
    server
        .start(&addr.ip().to_string(), addr.port(), Arc::new(router))
        .context("start server")?;
    println!("debugport mock server listening on {addr}");

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("install signal handler")?;

    rx.recv().ok();
    println!("shutting down");
    server.stop();
    Ok(())
}
