//! vsai - multimodal AI assistant in the terminal

#[cfg(feature = "audio")]
mod audio;
#[cfg(feature = "audio")]
mod capture;
mod commands;
mod config;
mod history;
mod transcript;
mod utils;

use anyhow::anyhow;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;
use vsai_ai::{
    Message, Personality, Role, UserInput,
    providers::{SpeechTranscriber, google::GoogleProvider},
};
use vsai_chat::{
    ChatSession, Error as ChatError, HistoryStore, MemoryHistory, Services, SessionConfig,
    SessionHandle, Speaker,
};

use config::{Config, HistoryBackend};
use transcript::Transcript;

/// vsai - multimodal AI assistant
#[derive(Parser, Debug)]
#[command(name = "vsai")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Chat model (default: gemini-2.5-flash)
    #[arg(short, long)]
    model: Option<String>,

    /// Personality (friendly, professional, humorous)
    #[arg(short, long)]
    personality: Option<String>,

    /// Ground answers with web search and list sources
    #[arg(short, long)]
    search: bool,

    /// Account the chat history is stored under
    #[arg(short, long)]
    account: Option<String>,

    /// Speak answers aloud
    #[arg(long)]
    voice: bool,

    /// Attach an image to the first message
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Run in non-interactive mode with a single prompt
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Delete the stored history before starting
    #[arg(long)]
    clear_history: bool,

    /// Do not load or save history
    #[arg(long)]
    no_history: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose || std::env::var_os("RUST_LOG").is_some() {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("vsai=debug,vsai_chat=debug,vsai_ai=debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // Load config file; CLI args take precedence
    let mut cfg = Config::load();
    if args.model.is_some() {
        cfg.model = args.model.clone();
    }
    if args.personality.is_some() {
        cfg.personality = args.personality.clone();
    }
    if args.account.is_some() {
        cfg.account = args.account.clone();
    }
    if args.search {
        cfg.search = Some(true);
    }
    if args.no_history {
        cfg.history = Some(HistoryBackend::None);
    }

    let api_key = cfg.google_api_key().ok_or_else(|| {
        anyhow!("No Google API key. Set GOOGLE_API_KEY or add [api_keys] google to the config file")
    })?;
    let provider = Arc::new(GoogleProvider::new(api_key).with_models(cfg.model_set()));

    let session_config = SessionConfig {
        account: cfg.account(),
        personality: cfg.personality(),
        search_enabled: cfg.search.unwrap_or(false),
    };
    let mut session = ChatSession::new(
        session_config,
        Services::from_provider(provider.clone()),
        history_store(&cfg)?,
    );
    if let Some(speaker) = open_speaker(provider.clone()) {
        session = session.with_speaker(speaker);
    }
    if args.voice && session.speaker().is_none() {
        eprintln!("Speech output is unavailable; answers will not be spoken.");
    }

    if args.clear_history {
        session.clear_history().await?;
        eprintln!("Cleared history for {}.", session.account());
    }

    let loaded = match session.load_history().await {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!("Failed to load chat history: {}", e);
            eprintln!("Could not load history: {}", e);
            0
        }
    };

    let image = match args.image {
        Some(ref path) => Some(utils::image_data_uri(path)?),
        None => None,
    };

    let transcript = Transcript::new();
    let printer = spawn_printer(&session, transcript.clone());
    spawn_interrupt(session.handle(), session.speaker().cloned());

    let result = if let Some(prompt) = args.command {
        run_command(&session, &transcript, prompt, image, args.voice).await
    } else {
        run_interactive(&mut session, &transcript, provider, image, args.voice, loaded).await
    };

    printer.abort();
    result
}

fn history_store(cfg: &Config) -> anyhow::Result<Arc<dyn HistoryStore>> {
    Ok(match cfg.history.unwrap_or_default() {
        HistoryBackend::Local => Arc::new(history::LocalHistory::new(
            history::LocalHistory::default_dir(),
        )),
        HistoryBackend::Remote => {
            let base_url = cfg
                .api_base_url
                .clone()
                .ok_or_else(|| anyhow!("history = \"remote\" requires api_base_url"))?;
            Arc::new(history::RemoteHistory::new(base_url, cfg.api_token.clone()))
        }
        HistoryBackend::None => Arc::new(MemoryHistory::new()),
    })
}

#[cfg(feature = "audio")]
fn open_speaker(provider: Arc<GoogleProvider>) -> Option<Arc<Speaker>> {
    match audio::CpalOutput::open() {
        Ok(output) => Some(Arc::new(Speaker::new(
            provider,
            Arc::new(output),
            vsai_chat::AudioFormat::default(),
        ))),
        Err(e) => {
            tracing::warn!("Speech output disabled: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "audio"))]
fn open_speaker(_provider: Arc<GoogleProvider>) -> Option<Arc<Speaker>> {
    tracing::debug!("Built without the audio feature");
    None
}

/// Print streamed deltas as the store changes
fn spawn_printer(session: &ChatSession, transcript: Transcript) -> tokio::task::JoinHandle<()> {
    let mut receiver = session.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = transcript.on_event(&event, &mut std::io::stdout()) {
                        tracing::debug!("Failed to write output: {}", e);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Printer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Ctrl-C stops generation, then speech, and exits when nothing is running
fn spawn_interrupt(handle: SessionHandle, speaker: Option<Arc<Speaker>>) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if handle.is_running() {
                handle.stop_generation();
                if let Some(ref speaker) = speaker {
                    speaker.stop();
                }
                continue;
            }
            if speaker.as_ref().is_some_and(|s| s.stop()) {
                continue;
            }
            println!();
            std::process::exit(130);
        }
    });
}

/// Send one turn and write its terminal state
async fn send_turn(
    session: &ChatSession,
    transcript: &Transcript,
    input: UserInput,
    voice: bool,
) -> anyhow::Result<()> {
    let message = match session.send(input, voice).await {
        Ok(message) => message,
        Err(ChatError::EmptyInput) => return Ok(()),
        Err(e) => {
            println!("{}", e);
            return Ok(());
        }
    };

    transcript.finish(&message, &mut std::io::stdout())?;
    if let Some(ref image) = message.image {
        match utils::save_image(image, &utils::images_dir(), &message.id) {
            Ok(path) => println!("[Image saved to {}]", path.display()),
            Err(e) => println!("[Could not save image: {}]", e),
        }
    }
    println!();
    Ok(())
}

async fn run_command(
    session: &ChatSession,
    transcript: &Transcript,
    prompt: String,
    image: Option<String>,
    voice: bool,
) -> anyhow::Result<()> {
    let input = UserInput {
        text: prompt,
        image,
    };
    send_turn(session, transcript, input, voice).await?;

    // Let the last sentence finish before exiting
    if let Some(speaker) = session.speaker() {
        speaker.wait_for_idle().await;
    }
    Ok(())
}

/// Record until Enter, then transcribe the recording
#[cfg(feature = "audio")]
async fn listen(transcriber: &dyn SpeechTranscriber) -> anyhow::Result<String> {
    use base64::Engine;

    // The stream is not Send; it is dropped before the first await
    let wav = {
        let recording = capture::Recording::start()?;
        print!("Listening... press Enter when done. ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        recording.finish()?
    };
    let audio = base64::engine::general_purpose::STANDARD.encode(&wav);
    Ok(transcriber.transcribe("audio/wav", &audio).await?)
}

#[cfg(not(feature = "audio"))]
async fn listen(_transcriber: &dyn SpeechTranscriber) -> anyhow::Result<String> {
    Err(anyhow!("voice input needs a build with the audio feature"))
}

fn last_answer(session: &ChatSession) -> Option<Message> {
    session
        .messages()
        .into_iter()
        .rev()
        .find(|m| m.role == Role::Model && !m.text.is_empty())
}

async fn run_interactive(
    session: &mut ChatSession,
    transcript: &Transcript,
    transcriber: Arc<dyn SpeechTranscriber>,
    mut pending_image: Option<String>,
    mut voice: bool,
    loaded: usize,
) -> anyhow::Result<()> {
    use std::io;

    // Show minimal startup info (only if TTY)
    if io::IsTerminal::is_terminal(&io::stderr()) {
        eprintln!(
            "vsai ({}) account: {}",
            session.personality().name(),
            session.account()
        );
        eprintln!();
    }

    if loaded > 0 {
        let messages = session.messages();
        let recent = &messages[messages.len().saturating_sub(6)..];
        transcript::render_history(recent, &mut io::stdout())?;
        println!("[{} messages in history]\n", loaded);
    } else {
        println!("{}", commands::examples_message());
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        // Handle slash commands
        if let Some(result) =
            commands::execute_command(input, session.personality(), session.search_enabled())
        {
            match result {
                commands::CommandResult::Clear => match session.clear_history().await {
                    Ok(()) => println!("Cleared conversation."),
                    Err(e) => println!("Could not clear history: {}", e),
                },
                commands::CommandResult::Exit => break,
                commands::CommandResult::Message(msg) => println!("{}", msg),
                commands::CommandResult::SetPersonality(personality) => {
                    set_personality(session, personality);
                }
                commands::CommandResult::SetSearch(enabled) => {
                    session.set_search_enabled(enabled);
                    println!("Web search {}.", if enabled { "on" } else { "off" });
                }
                commands::CommandResult::Attach(path) => {
                    match utils::image_data_uri(std::path::Path::new(&path)) {
                        Ok(uri) => {
                            pending_image = Some(uri);
                            println!("Image attached to your next message.");
                        }
                        Err(e) => println!("{}", e),
                    }
                }
                commands::CommandResult::Voice => {
                    if session.speaker().is_none() {
                        println!("Speech output is unavailable.");
                    } else {
                        voice = !voice;
                        if !voice {
                            session.stop_speaking();
                        }
                        println!("Voice mode {}.", if voice { "on" } else { "off" });
                    }
                }
                commands::CommandResult::Speak => match last_answer(session) {
                    Some(message) => {
                        if session.speak(&message.text).await.is_none() {
                            println!("Speech output is unavailable.");
                        }
                    }
                    None => println!("Nothing to speak yet."),
                },
                commands::CommandResult::Stop => {
                    if !session.stop_speaking() {
                        println!("Nothing is playing.");
                    }
                }
                commands::CommandResult::Listen => {
                    session.stop_speaking();
                    match listen(transcriber.as_ref()).await {
                        Ok(text) => {
                            println!("> {}", text);
                            let input = UserInput {
                                text,
                                image: pending_image.take(),
                            };
                            send_turn(session, transcript, input, true).await?;
                        }
                        Err(e) => println!("Voice input failed: {}", e),
                    }
                }
                commands::CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                }
            }
            continue;
        }

        let input = UserInput {
            text: input.to_string(),
            image: pending_image.take(),
        };
        send_turn(session, transcript, input, voice).await?;
    }

    session.stop_speaking();
    Ok(())
}

fn set_personality(session: &mut ChatSession, personality: Personality) {
    session.set_personality(personality);
    println!("Personality set to: {}", personality.name());
}
