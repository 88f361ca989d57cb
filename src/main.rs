use anyhow::Context;
use clap::Parser;
use sip_dialer::domain::audio::WavFile;
use sip_dialer::domain::call::TracingOutcomeSink;
use sip_dialer::interface::init_metrics;
use sip_dialer::{Config, SipDialer};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sip-dialer")]
#[command(about = "Place a SIP call and play a WAV file into it")]
struct Args {
    /// Number or sip: URI to call
    destination: String,

    /// Prompt to play once the call is answered
    wav_file: PathBuf,

    /// Configuration file (defaults to ./sip-dialer.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    info!(
        "Using SIP server {}:{} as '{}'",
        config.sip.server_host, config.sip.server_port, config.sip.username
    );

    init_metrics();

    let audio = WavFile::from_file(&args.wav_file)
        .with_context(|| format!("Failed to load {}", args.wav_file.display()))?
        .into_telephony_buffer();
    info!("Loaded {:?} of audio from {}", audio.duration(), args.wav_file.display());

    let timeout = config.call.setup_timeout();
    let dialer = SipDialer::new(config).with_sink(Arc::new(TracingOutcomeSink));
    let report = dialer.place_call(&args.destination, &audio, timeout).await;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.outcome.is_connected() {
        std::process::exit(1);
    }
    Ok(())
}
