use std::error::Error;

use clap::Parser;
use dotenvy::dotenv;
use rust_mesh_chat::MeshNode;
use rust_mesh_chat::common::Command;
use rust_mesh_chat::config::{self, AppConfig};
use rust_mesh_chat::ui::ConsoleApp;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "rust_mesh_chat",
    version,
    about = "Peer-to-peer chat over a mesh of raw TCP connections"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    /// Address to listen on and advertise to peers
    #[arg(long)]
    address: Option<String>,
    /// Port to listen on (0 picks a free one)
    #[arg(long, short)]
    port: Option<u16>,
    /// Display name shown to other members
    #[arg(long, short)]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let app_config =
        config::load_config(&cli.config).with_overrides(cli.address, cli.port, cli.name);

    let shutdown = CancellationToken::new();
    let mut node = MeshNode::start(&app_config, shutdown.clone()).await?;
    let events = node
        .take_events()
        .ok_or("event stream already taken")?;

    join_bootstrap_chats(&app_config, &node).await;

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            log::info!("Received shutdown signal, stopping node...");
            ctrl_c.cancel();
        }
    });

    ConsoleApp::new(node.commands(), events)
        .run(shutdown.clone())
        .await;

    node.shutdown();
    node.wait().await;
    Ok(())
}

async fn join_bootstrap_chats(app_config: &AppConfig, node: &MeshNode) {
    let commands = node.commands();
    for entry in &app_config.bootstrap {
        log::info!(
            "Joining `{}` through bootstrap peer {}:{}",
            entry.chat,
            entry.address,
            entry.port
        );
        let command = Command::Join {
            address: entry.address.clone(),
            port: entry.port,
            chat: entry.chat.clone(),
        };
        if let Err(err) = commands.send(command).await {
            log::warn!("Failed to queue bootstrap join: {err}");
        }
    }
}
