//! `chorus watch` — live-refresh view of frames and lifecycle states.

use std::time::Duration;

use crate::client::{format_frame_table, format_status, rpc_call};

/// Entry point for `chorus watch`.
pub async fn cmd_watch(socket_path: &str, interval: u64) -> anyhow::Result<()> {
    loop {
        // Clear screen + cursor home
        print!("\x1b[2J\x1b[H");

        match rpc_call(socket_path, "status", serde_json::json!({})).await {
            Ok(status) => {
                println!("{}", format_status(&status));
                println!();
                match rpc_call(socket_path, "list_frames", serde_json::json!({})).await {
                    Ok(frames) => {
                        let output = format_frame_table(&frames);
                        if output.is_empty() {
                            println!("(no cached frames)");
                        } else {
                            println!("{output}");
                        }
                    }
                    Err(e) => println!("Cannot list frames: {e}"),
                }
            }
            Err(e) => {
                println!("Cannot connect to daemon: {e}");
            }
        }

        println!("\n\x1b[2mchorus watch \u{2014} Ctrl-C to quit\x1b[0m");

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
            _ = tokio::signal::ctrl_c() => { break; }
        }
    }

    Ok(())
}
