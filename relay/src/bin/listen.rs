//! Diagnostic client: connects to a relay and prints every frame it receives.

use clap::Parser;
use futures::StreamExt;
use shared::DEFAULT_URL;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Relay address to connect to
    #[arg(short = 'u', long, default_value = DEFAULT_URL)]
    url: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Connecting to {}...", args.url);
    let (mut ws, _) = match connect_async(args.url.as_str()).await {
        Ok(connection) => connection,
        Err(tungstenite::Error::Io(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
            eprintln!("Could not connect to the relay. Make sure it is running.");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    println!("Connected to {}", args.url);
    println!("Waiting for messages... (Press Ctrl+C to stop)");

    loop {
        tokio::select! {
            message = ws.next() => match message {
                Some(Ok(Message::Text(text))) => println!("Received: {}", text.as_str()),
                Some(Ok(Message::Binary(data))) => {
                    println!("Received: {}", String::from_utf8_lossy(&data))
                }
                Some(Ok(Message::Close(_))) | None => {
                    println!("Connection closed by server.");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    eprintln!("Error: {}", e);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\nClient stopped.");
                let _ = ws.close(None).await;
                break;
            }
        }
    }

    Ok(())
}
