use clap::Parser;
use client::game::RunnerState;
use client::input::LocalInput;
use client::network::CommandChannel;
use client::ChannelError;
use log::info;
use shared::ChannelConfig;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Relay address to connect to
    #[arg(short = 'u', long)]
    url: Option<String>,

    /// JSON file with channel settings; flags override its values
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Seconds to wait before each reconnect attempt
    #[arg(short = 'r', long)]
    reconnect_delay: Option<f32>,

    /// Do not connect on startup or resume
    #[arg(long)]
    no_autoconnect: bool,

    /// Only log errors from the command channel
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Host frames per second
    #[arg(short = 't', long, default_value = "60")]
    tick_rate: u32,
}

impl Args {
    fn channel_config(&self) -> Result<ChannelConfig, ChannelError> {
        let mut config = match &self.config {
            Some(path) => ChannelConfig::from_json_file(path)?,
            None => ChannelConfig::default(),
        };

        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        if let Some(delay) = self.reconnect_delay {
            config.reconnect_delay_secs = delay;
        }
        if self.no_autoconnect {
            config.autoconnect = false;
        }
        if self.quiet {
            config.enable_logging = false;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = args.channel_config()?;
    let tick_rate = args.tick_rate.max(1);

    info!("Relay: {}", config.url);
    info!("Local controls: type left/right/jump/slide/start or keypad 4/6/8/2");

    let mut runner = RunnerState::new();
    let mut channel = CommandChannel::new(config);
    let mut local_input = LocalInput::spawn(tokio::io::stdin());

    channel.start().await;

    let mut frame = interval(Duration::from_secs_f32(1.0 / tick_rate as f32));
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_frame = Instant::now();
    let mut last_report = runner.diagnostics();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = frame.tick() => {
                let now = Instant::now();
                let dt = (now - last_frame).as_secs_f32();
                last_frame = now;

                for line in local_input.drain() {
                    channel.process_command(&line, &mut runner);
                }
                channel.tick(&mut runner).await;
                runner.update(dt);

                let report = runner.diagnostics();
                if report.lane != last_report.lane
                    || report.jumping != last_report.jumping
                    || report.sliding != last_report.sliding
                    || report.scene != last_report.scene
                {
                    info!(
                        "Runner: scene={} lane={} jumping={} sliding={} distance={:.1}",
                        report.scene, report.lane, report.jumping, report.sliding, report.distance
                    );
                }
                last_report = report;
            }
            _ = &mut shutdown => {
                info!("Received Ctrl+C, shutting down gracefully...");
                break;
            }
        }
    }

    // Failures are already logged by the channel
    let _ = channel.disconnect().await;
    Ok(())
}
