use std::io::BufRead;
use std::thread;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::common::{ChatEvent, Command, CommandError};

use super::render::render;

/// Terminal front-end: typed lines become commands, events become text.
pub struct ConsoleApp {
    command_sender: mpsc::Sender<Command>,
    event_receiver: mpsc::UnboundedReceiver<ChatEvent>,
}

impl ConsoleApp {
    pub fn new(
        command_sender: mpsc::Sender<Command>,
        event_receiver: mpsc::UnboundedReceiver<ChatEvent>,
    ) -> Self {
        Self {
            command_sender,
            event_receiver,
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut lines = spawn_stdin_reader();
        let mut stdin_open = true;
        println!("Type /help for commands.");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(event) = self.event_receiver.recv() => println!("{}", render(&event)),
                line = lines.recv(), if stdin_open => match line {
                    Some(line) => self.handle_line(&line).await,
                    None => {
                        log::info!("Console input closed; node keeps running until Ctrl-C");
                        stdin_open = false;
                    }
                },
            }
        }
    }

    async fn handle_line(&mut self, line: &str) {
        match line.parse::<Command>() {
            Ok(command) => {
                if let Err(err) = self.command_sender.send(command).await {
                    log::warn!("Failed to send command to orchestrator: {err}");
                }
            }
            Err(CommandError::Empty) => {}
            Err(err) => println!("error: {err}"),
        }
    }
}

/// Blocking stdin reads live on their own thread so shutdown never waits on
/// the terminal.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}
