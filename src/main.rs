use anyhow::{Context, Result, bail};
use clap::Parser;
use owo_colors::OwoColorize;
use std::sync::Arc;
use talkback::audio::recorder::AudioSource;
use talkback::audio::wav::WavAudioSource;
use talkback::cli::{Cli, Commands};
use talkback::config::Config;
use talkback::convo::{ConversationLoop, HttpReplyClient, MockReplyClient, ReplyClient};
use talkback::events::{EventBus, PipelineEvent};
use talkback::pipeline::controller::{PipelineController, PipelineOptions};
use talkback::pipeline::state::PipelineState;
use talkback::stt::whisper::{WhisperConfig, WhisperTranscriber};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Devices) => list_audio_devices(),
        None => run_conversation(cli),
    }
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/talkback/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(path) = cli.config.as_deref() {
        if !path.exists() {
            return Err(talkback::TalkbackError::ConfigFileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        Config::load(path)?
    } else if let Some(path) = Config::default_path() {
        Config::load_or_default(&path)?
    } else {
        Config::default()
    }
    .with_env_overrides();

    // CLI flags win over file and environment
    if let Some(device) = &cli.device {
        config.audio.device = Some(device.clone());
    }
    if let Some(model) = &cli.model {
        config.stt.model_path = Some(model.clone());
    }
    if let Some(language) = &cli.language {
        config.stt.language = language.clone();
    }

    Ok(config)
}

fn list_audio_devices() -> Result<()> {
    #[cfg(feature = "cpal-audio")]
    {
        let devices = talkback::audio::capture::list_devices()?;
        if devices.is_empty() {
            eprintln!("No audio input devices found");
            std::process::exit(1);
        }
        println!("Available audio input devices:");
        for (idx, device) in devices.iter().enumerate() {
            println!("  [{}] {}", idx, device);
        }
        Ok(())
    }
    #[cfg(not(feature = "cpal-audio"))]
    {
        bail!("built without the cpal-audio feature; no devices to list")
    }
}

fn build_audio_source(cli: &Cli, config: &Config) -> Result<Box<dyn AudioSource>> {
    if let Some(path) = &cli.input {
        let source = WavAudioSource::from_path(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        return Ok(Box::new(source));
    }

    #[cfg(feature = "cpal-audio")]
    {
        let source = talkback::audio::capture::CpalAudioSource::new(config.audio.device.as_deref())?;
        Ok(Box::new(source))
    }
    #[cfg(not(feature = "cpal-audio"))]
    {
        let _ = config;
        bail!("built without the cpal-audio feature; use --input <file.wav>")
    }
}

fn build_reply_client(cli: &Cli, config: &Config) -> Result<Arc<dyn ReplyClient>> {
    if cli.no_reply {
        // Echo client keeps the conversation loop exercised without a key
        return Ok(Arc::new(MockReplyClient::new()));
    }

    let api_key = std::env::var(&config.reply.api_key_env).with_context(|| {
        format!(
            "reply generation needs an API key in ${} (or pass --no-reply)",
            config.reply.api_key_env
        )
    })?;

    let client = HttpReplyClient::new(config.reply.endpoint.clone(), api_key)
        .map_err(|e| anyhow::anyhow!("failed to build reply client: {e}"))?;
    Ok(Arc::new(client))
}

fn run_conversation(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    let Some(model_path) = config.stt.model_path.clone() else {
        bail!(
            "no speech model configured; pass --model <path> or set stt.model_path \
             in the config file"
        );
    };

    let transcriber = WhisperTranscriber::new(WhisperConfig {
        model_path,
        language: config.stt.language.clone(),
        threads: None,
    })?;
    let source = build_audio_source(&cli, &config)?;
    let reply_client = build_reply_client(&cli, &config)?;

    let finite_input = cli.input.is_some();
    let events = EventBus::new();
    let render = spawn_renderer(&events, cli.quiet);

    let mut controller =
        PipelineController::new(PipelineOptions::from_config(&config), events.clone());
    let transcript_rx = controller.start(source, Box::new(transcriber))?;

    let conversation = ConversationLoop::new(transcript_rx, reply_client, events.clone())
        .with_context_turns(config.reply.context_turns)
        .spawn();

    let entries = if finite_input {
        // Workers exit when the file runs dry; wait for replies, then
        // finalize the state machine.
        let entries = conversation.finish();
        shutdown(&mut controller)?;
        entries
    } else {
        if !cli.quiet {
            println!("{}", "Listening... press Enter to stop.".dimmed());
        }
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);

        shutdown(&mut controller)?;
        conversation.finish()
    };

    print_summary(&controller, entries.len(), cli.quiet);

    drop(controller);
    drop(events);
    let _ = render.join();

    Ok(())
}

/// Stop the pipeline, surfacing a worker failure as the process error.
fn shutdown(controller: &mut PipelineController) -> Result<()> {
    if controller.stop().is_err() {
        controller.join();
        if let PipelineState::Failed { reason } = controller.state() {
            bail!("pipeline failed: {reason}");
        }
    }
    if let PipelineState::Failed { reason } = controller.state() {
        bail!("pipeline failed: {reason}");
    }
    Ok(())
}

/// Render pipeline events to the terminal on a background thread.
fn spawn_renderer(
    events: &EventBus,
    quiet: bool,
) -> std::thread::JoinHandle<()> {
    let rx = events.subscribe();
    std::thread::spawn(move || {
        while let Ok(event) = rx.recv() {
            match event {
                PipelineEvent::TranscriptAvailable { text } => {
                    println!("{} {}", "you:".cyan(), text);
                }
                PipelineEvent::ReplyAvailable { text } => {
                    println!("{} {}", "bot:".green(), text);
                }
                PipelineEvent::WorkerError { worker, reason } => {
                    eprintln!("{}", format!("[{worker}] {reason}").red());
                }
                PipelineEvent::StateChanged { state } => {
                    if !quiet {
                        eprintln!("{}", format!("state: {state:?}").dimmed());
                    }
                }
            }
        }
    })
}

fn print_summary(controller: &PipelineController, entries: usize, quiet: bool) {
    if quiet {
        return;
    }
    let dropped = controller.dropped_blocks();
    if dropped > 0 {
        eprintln!(
            "{}",
            format!("warning: {dropped} audio blocks dropped (transcription too slow)").yellow()
        );
    }
    println!("{}", format!("Conversation ended: {entries} entries.").dimmed());
}
