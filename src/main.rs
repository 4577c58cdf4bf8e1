use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::EnvFilter;

use turnstile::session::forward_microphone;
use turnstile::voice::{AudioCapture, AudioPlayback, TextToSpeech, TranscriptionListener};
use turnstile::{Config, GeminiGenerator, TurnArbiter};

/// Time allowed for the close-stream message to reach the provider
const CLOSE_FLUSH: Duration = Duration::from_millis(200);

/// Turnstile - half-duplex voice agent
///
/// Starts a session immediately and runs until Enter or Ctrl+C.
#[derive(Parser)]
#[command(name = "turnstile", version, about)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, env = "TURNSTILE_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity; RUST_LOG wins when set
    let filter = match cli.verbose {
        0 => "info,turnstile=info",
        1 => "info,turnstile=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let Config {
        api_keys,
        stt,
        tts,
        llm,
        agent,
        session,
        retry,
    } = Config::load(cli.config.as_deref())?;

    tracing::info!(
        agent = %agent.name,
        stt_model = %stt.model,
        tts_model = %tts.model,
        llm_model = %llm.model,
        max_retries = retry.max_retries,
        "starting turnstile"
    );

    let generator = GeminiGenerator::new(
        api_keys.gemini,
        llm.model,
        agent.system_prompt,
        session.request_timeout,
        retry.clone(),
    )?;
    let synthesizer = TextToSpeech::new(
        SecretString::from(api_keys.deepgram.expose_secret().to_owned()),
        tts.model,
        session.request_timeout,
        retry,
    )?;
    let playback = AudioPlayback::new(session.audio_dir.clone())?;
    let mut capture = AudioCapture::new()?;

    let (listener, mut events) = TranscriptionListener::connect(&stt, &api_keys.deepgram).await?;

    let mut arbiter = TurnArbiter::new(generator, synthesizer, playback)
        .with_greeting(agent.greeting)
        .with_settle(session.settle);

    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
    capture.start(frames_tx)?;
    tokio::spawn(forward_microphone(
        frames_rx,
        listener.clone(),
        arbiter.subscribe_gate(),
        session.keep_alive,
    ));

    tracing::info!("session started - press Enter or Ctrl+C to stop");
    let enter = watch_for_enter(std::io::BufReader::new(std::io::stdin()));

    // Dropping the arbiter future is a hard stop, mid-turn included
    let outcome = tokio::select! {
        result = arbiter.run(&mut events) => result,
        () = stop_signal(enter) => {
            tracing::info!("stop requested");
            Ok(())
        }
    };

    capture.stop();
    listener.finish();
    tokio::time::sleep(CLOSE_FLUSH).await;

    tracing::debug!(
        history = %serde_json::to_string(arbiter.history()).unwrap_or_default(),
        "conversation"
    );

    outcome?;
    tracing::info!(turns = arbiter.history().len(), "finished");
    Ok(())
}

/// Read one line from `input` on a detached thread
///
/// The read cannot be cancelled, so it must not live on the runtime's
/// blocking pool: shutdown would wait for it. The sender is dropped without
/// firing on EOF or a read error.
fn watch_for_enter<R: BufRead + Send + 'static>(mut input: R) -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        if matches!(input.read_line(&mut line), Ok(n) if n > 0) {
            let _ = tx.send(());
        }
    });
    rx
}

/// Resolve once a line arrives; never resolve if input ended without one
async fn enter_pressed(enter: oneshot::Receiver<()>) {
    // No terminal attached: only Ctrl+C can stop the session
    if enter.await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Resolve when the operator presses Enter or sends Ctrl+C
async fn stop_signal(enter: oneshot::Receiver<()>) {
    tokio::select! {
        () = enter_pressed(enter) => {}
        _ = tokio::signal::ctrl_c() => {}
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};
    use std::time::Instant;

    use super::*;

    /// Reader that blocks far longer than any test
    struct Stalled;

    impl Read for Stalled {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            std::thread::sleep(Duration::from_secs(3600));
            Ok(0)
        }
    }

    #[tokio::test]
    async fn line_on_input_requests_stop() {
        let enter = watch_for_enter(Cursor::new(b"\n".to_vec()));
        tokio::time::timeout(Duration::from_secs(5), enter_pressed(enter))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn closed_input_never_requests_stop() {
        let enter = watch_for_enter(Cursor::new(Vec::new()));
        let waited = tokio::time::timeout(Duration::from_millis(50), enter_pressed(enter)).await;
        assert!(waited.is_err());
    }

    #[test]
    fn pending_read_does_not_hold_up_shutdown() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        // The session ends on another path while the read is still parked
        runtime.block_on(async {
            let enter = watch_for_enter(std::io::BufReader::new(Stalled));
            tokio::select! {
                () = enter_pressed(enter) => panic!("stalled input cannot request stop"),
                () = tokio::time::sleep(Duration::from_millis(20)) => {}
            }
        });

        let started = Instant::now();
        drop(runtime);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
