//! `tinyssb-node` binary entry point.
//!
//! ```bash
//! tinyssb-node --base-dir ./alice init
//! tinyssb-node --base-dir ./alice run
//! ```

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use clap::Parser;
use tinyssb_node::{
    cli::Command,
    error::NodeError,
    node::Node,
    Cli,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let cli = Cli::parse();
    if let Err(err) = dispatch(&cli) {
        tracing::error!(error = %err, "node command failed");
        return Err(Box::new(err));
    }
    Ok(())
}

fn dispatch(cli: &Cli) -> Result<(), NodeError> {
    match &cli.command {
        Command::Init => Node::init(&cli.base_dir),
        Command::Clean => Node::clean(&cli.base_dir),
        Command::Run { http } => run(&cli.base_dir, *http),
        Command::CleanRun { http } => {
            Node::clean(&cli.base_dir)?;
            Node::init(&cli.base_dir)?;
            run(&cli.base_dir, *http)
        }
        Command::Track { file_name } => track(&cli.base_dir, file_name),
    }
}

fn run(base_dir: &std::path::Path, http: bool) -> Result<(), NodeError> {
    if http {
        return Err(NodeError::HttpNotImplemented);
    }

    let node = Node::open(base_dir)?;
    let io_loop = node.spawn_io_loop()?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = Arc::clone(&stop);
    ctrlc::set_handler(move || stop_handler.store(true, Ordering::SeqCst))
        .expect("failed to install Ctrl-C handler");

    tracing::info!("node running, press Ctrl-C to stop");
    while !stop.load(Ordering::SeqCst) {
        std::thread::sleep(std::time::Duration::from_millis(200));
    }

    tracing::info!("shutting down");
    io_loop.shutdown();
    Ok(())
}

fn track(base_dir: &std::path::Path, file_name: &str) -> Result<(), NodeError> {
    let node = Node::open(base_dir)?;
    let (update_fid, emergency_fid) = node.version_manager().create_file(file_name)?;
    println!("update feed:    {}", hex::encode(update_fid));
    println!("emergency feed: {}", hex::encode(emergency_fid));
    Ok(())
}
