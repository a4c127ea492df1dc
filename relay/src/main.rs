use clap::Parser;
use relay::network::RelayServer;
use relay::operator;
use shared::{OperatorCommand, DEFAULT_PORT};
use tokio::sync::mpsc;

/// Command relay: broadcasts console commands to every connected game client.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);
    let server = RelayServer::bind(&address).await?;

    let (cmd_sender, cmd_receiver) = mpsc::channel::<OperatorCommand>(64);

    operator::print_help();
    operator::spawn_stdin(cmd_sender.clone());

    // Ctrl+C takes the same path as typing `quit`
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cmd_sender.send(OperatorCommand::Quit).await;
        }
    });

    server.run(cmd_receiver).await?;
    Ok(())
}
