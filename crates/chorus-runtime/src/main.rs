//! chorus: console daemon for CHORUS trusted research environments.
//! Single-process binary embedding cache, watcher and UDS server.

use clap::Parser;

mod cli;
mod client;
mod cmd_watch;
mod console;
mod daemon;
mod server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let socket_path = args.socket_path.unwrap_or_else(cli::default_socket_path);

    match args.command {
        cli::Command::Daemon(opts) => {
            let filter = std::env::var("CHORUS_LOG")
                .or_else(|_| std::env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string());
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
                .init();

            tracing::info!("chorus daemon starting");

            daemon::run_daemon(opts, &socket_path).await?;
        }
        cli::Command::Status => {
            client::cmd_status(&socket_path).await?;
        }
        cli::Command::ListFrames => {
            client::cmd_list_frames(&socket_path).await?;
        }
        cli::Command::Recent { kind } => {
            client::cmd_recent(&socket_path, &kind).await?;
        }
        cli::Command::OpenWorkbench {
            id,
            workspace,
            name,
        } => {
            let result = client::rpc_call(
                &socket_path,
                "open_workbench",
                serde_json::json!({ "id": id, "workspace_id": workspace, "name": name }),
            )
            .await?;
            println!("{}", client::format_status(&result));
        }
        cli::Command::OpenWebapp { id, name, url } => {
            let result = client::rpc_call(
                &socket_path,
                "open_webapp",
                serde_json::json!({ "id": id, "name": name, "url": url }),
            )
            .await?;
            println!("{}", client::format_status(&result));
        }
        cli::Command::Close { id } => {
            let result = client::rpc_call(
                &socket_path,
                "close_frame",
                serde_json::json!({ "id": id }),
            )
            .await?;
            println!("{}", client::format_status(&result));
        }
        cli::Command::Clear => {
            let result =
                client::rpc_call(&socket_path, "clear_all", serde_json::json!({})).await?;
            println!("{}", client::format_status(&result));
        }
        cli::Command::RemoveRecent { id, kind } => {
            let result = client::rpc_call(
                &socket_path,
                "remove_recent",
                serde_json::json!({ "id": id, "kind": kind }),
            )
            .await?;
            println!("{}", client::format_status(&result));
        }
        cli::Command::Watch { interval } => {
            cmd_watch::cmd_watch(&socket_path, interval).await?;
        }
    }

    Ok(())
}
