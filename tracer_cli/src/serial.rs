//! Operator command surface on stdin/stdout.

use std::io::BufRead;

use crossbeam_channel::Receiver;
use eyre::{Result, WrapErr};
use tracer_core::{Command, Reply};

use crate::cli::json_mode;

/// Forward every recognised command character typed on stdin to the control loop.
pub fn spawn_stdin_reader() -> Result<Receiver<Command>> {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::Builder::new()
        .name("stdin-commands".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                for cmd in Command::parse_line(&line) {
                    if tx.send(cmd).is_err() {
                        return;
                    }
                }
            }
            tracing::debug!("stdin closed; no further commands");
        })
        .wrap_err("spawn stdin reader")?;
    println!("{}", Command::HELP);
    Ok(rx)
}

pub fn print_reply(cmd: Command, reply: Reply) {
    if json_mode() {
        println!(
            "{}",
            serde_json::json!({ "command": cmd.as_char().to_string(), "reply": reply.to_string() })
        );
    } else {
        println!("{reply}");
    }
}
