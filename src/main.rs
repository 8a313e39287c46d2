use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pauz_voice::audio::{AudioPlayback, CaptureSource, MicCapture, SpeakerSink};
use pauz_voice::{
    AssistantBackend, AssistantClient, Config, FileTokenStore, SessionController, SessionState,
};

/// Pauz Voice - journaling voice assistant session runner
#[derive(Parser)]
#[command(name = "pauz-voice", version, about)]
struct Cli {
    /// Backend base URL (overrides config)
    #[arg(long, env = "PAUZ_API_URL")]
    api_url: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Open the session muted (responses shown as text only)
    #[arg(long)]
    muted: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Ask one typed question and play the spoken reply
    Ask {
        /// The question to send
        question: String,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,pauz_voice=info",
        1 => "info,pauz_voice=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Ask { question } => ask(&config, &question).await,
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
        };
    }

    run_session(&config, cli.muted).await
}

/// Run an interactive voice session until interrupted
async fn run_session(config: &Config, muted: bool) -> anyhow::Result<()> {
    let credentials = Arc::new(FileTokenStore::new(config.token_path.clone()));
    let client = AssistantClient::with_timeout(
        &config.api_base_url,
        credentials,
        config.request_timeout,
    )?;
    let playback = AudioPlayback::new()?;

    let controller = SessionController::new(
        Arc::new(MicCapture::new()),
        Arc::new(client),
        Arc::new(playback),
        config.session_options(),
    );

    tracing::info!(backend = %config.api_base_url, "starting voice session (ctrl-c to stop)");
    controller.open();
    if muted {
        controller.toggle_mute();
    }

    // Mirror the session state to the terminal until interrupted
    let mut last_state = SessionState::Idle;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            () = tokio::time::sleep(Duration::from_millis(200)) => {
                let state = controller.state();
                if state != last_state {
                    println!("[{}]", state_label(state));
                    if let Some(turn) = controller.turns().last() {
                        println!("  {:?}: {}", turn.speaker, turn.text);
                    }
                    last_state = state;
                }
                if !controller.voice_available() {
                    tracing::warn!("microphone unavailable - voice loop stopped");
                    break;
                }
            }
        }
    }

    controller.close();
    tracing::info!("session closed");
    Ok(())
}

const fn state_label(state: SessionState) -> &'static str {
    match state {
        SessionState::Idle => "idle",
        SessionState::Welcoming => "welcome",
        SessionState::Listening => "listening... speak now",
        SessionState::Thinking => "thinking...",
        SessionState::Speaking => "speaking",
        SessionState::Error => "connection issue, retrying...",
    }
}

/// Send one text question through the guidance endpoint
async fn ask(config: &Config, question: &str) -> anyhow::Result<()> {
    let credentials = Arc::new(FileTokenStore::new(config.token_path.clone()));
    let client = AssistantClient::with_timeout(
        &config.api_base_url,
        credentials,
        config.request_timeout,
    )?;

    let reply = client.send_text_query(question).await?;
    println!("{}", reply.text);

    if !reply.audio.is_empty() {
        let playback = AudioPlayback::new()?;
        playback.play(&reply.audio, &reply.mime_type).await?;
    }

    Ok(())
}

/// Test microphone input with a level meter
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let capture = MicCapture::new();
    capture.acquire()?;
    capture.start()?;

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;
        println!("[{:2}s] recording...", i + 1);
    }

    let clip = capture.stop();
    capture.release();

    println!("\n---");
    if clip.is_empty() {
        println!("No audio captured. Check:");
        println!("  1. Is your mic plugged in?");
        println!("  2. Run: pactl info | grep 'Default Source'");
        println!("  3. Run: arecord -l (to list devices)");
    } else {
        println!(
            "Captured {} bytes of {} - your mic is working!",
            clip.data.len(),
            clip.mime_type
        );
    }

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    // Generate 2 seconds of 440Hz sine wave, WAV-encoded at 24kHz
    let sample_rate = 24_000_u32;
    let frequency = 440.0_f32;
    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..sample_rate * 2)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    let wav = pauz_voice::audio::samples_to_wav(&samples, sample_rate)?;
    playback.play(&wav, "audio/wav").await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}
