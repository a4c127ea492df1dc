//! Operator console for the relay.

use log::{info, warn};
use shared::OperatorCommand;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Logs the manual control list shown at startup.
pub fn print_help() {
    info!("Manual controls (type these commands):");
    info!("- left: Move left");
    info!("- right: Move right");
    info!("- jump: Jump");
    info!("- slide: Slide");
    info!("- quit: Exit server");
}

/// Forwards parsed operator lines from `reader` until EOF, `quit`, or the
/// receiving side goes away. Blank lines are ignored.
pub async fn read_commands<R>(reader: R, commands: mpsc::Sender<OperatorCommand>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let Some(command) = OperatorCommand::parse(&line) else {
            continue;
        };

        let quit = command == OperatorCommand::Quit;
        if commands.send(command).await.is_err() || quit {
            break;
        }
    }

    Ok(())
}

/// Reads operator commands from standard input on a background task.
pub fn spawn_stdin(commands: mpsc::Sender<OperatorCommand>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = read_commands(tokio::io::stdin(), commands).await {
            warn!("Operator input closed: {}", e);
        }
    })
}
