use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

use camille::assistant::{self, MEMORY_CLEARED, is_reset_command};
use camille::db::{self, ConversationRepo};
use camille::voice::{
    AudioCapture, SpeechHandle, SpeechToText, SpeechWorker, TextToSpeech, WakePhrases,
    calibrate_threshold, play_mp3, rms,
};
use camille::{
    Assistant, AvatarState, CompletionBackend, Config, DbPool, LlmProcessor, Memory,
    OpenAiClient, ProcessorSettings, ToolRegistry, UserMemoryManager,
};

/// Camille - voice-driven conversational assistant
#[derive(Parser)]
#[command(name = "camille", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable voice features and chat on the terminal instead
    #[arg(long, env = "CAMILLE_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Chat over stdin instead of voice
    Chat,
    /// Answer the setup questions on the terminal
    Setup,
    /// Start a fresh conversation on next launch
    NewConversation,
    /// List recent conversations
    Conversations {
        /// Number of conversations to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// List the tools offered to the model
    Tools,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,camille=info",
        1 => "info,camille=debug",
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

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load_with_options(cli.disable_voice)?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Chat => chat(&config).await,
            Command::Setup => camille::setup::run_setup(db::init(&config.db_path)?, &config.ai_name),
            Command::NewConversation => new_conversation(&config),
            Command::Conversations { limit } => list_conversations(&config, limit),
            Command::Tools => list_tools(&config),
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestTts { text } => test_tts(&config, &text).await,
        };
    }

    if !config.voice.enabled {
        tracing::info!("voice disabled, chatting on the terminal");
        return chat(&config).await;
    }

    run_voice(config).await
}

/// Wire the backend, tools, memory and user facts into a processor
async fn build_processor(
    config: &Config,
    pool: DbPool,
) -> anyhow::Result<(LlmProcessor, UserMemoryManager, Option<String>)> {
    let backend: Arc<dyn CompletionBackend> = Arc::new(OpenAiClient::new(&config.llm)?);
    let tools = Arc::new(ToolRegistry::with_builtins(&config.tools));
    let users = UserMemoryManager::new(pool.clone());
    let memory = Memory::open(pool, Arc::clone(&backend))?;

    let user_name = config.user_name.clone().or(users.user_name()?);
    let mut settings = ProcessorSettings::from_config(config).with_facts(users.facts_for_prompt()?);
    settings.user_name.clone_from(&user_name);

    tracing::info!(
        model = %config.llm.model,
        tools = tools.len(),
        conversation = %memory.conversation_id(),
        "assistant ready"
    );

    let processor = LlmProcessor::new(memory, backend, tools, settings).await?;
    Ok((processor, users, user_name))
}

/// Voice mode: assistant loop on its own thread, render loop here
async fn run_voice(config: Config) -> anyhow::Result<()> {
    let pool = db::init(&config.db_path)?;
    let (processor, users, user_name) = build_processor(&config, pool).await?;

    let transcriber = Arc::new(SpeechToText::new(&config.voice)?);
    let worker = SpeechWorker::spawn(Arc::new(TextToSpeech::new(&config.voice)?));
    let avatar = AvatarState::new();

    let assistant = Assistant::new(
        processor,
        users,
        worker.handle(),
        avatar.clone(),
        WakePhrases::new(config.voice.wake_phrases.clone()),
        user_name,
    );

    let running = Arc::new(AtomicBool::new(true));
    let voice_thread = std::thread::Builder::new().name("camille-voice".to_string()).spawn({
        let running = Arc::clone(&running);
        let voice = config.voice.clone();
        move || -> camille::Result<()> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(assistant::run_voice_loop(assistant, transcriber, &voice, running))
        }
    })?;

    if let Some(phrase) = config.voice.wake_phrases.first() {
        tracing::info!("{} ready - say \"{phrase}\"", config.ai_name);
    }

    render_loop(&avatar, &worker.handle(), &voice_thread).await;

    running.store(false, Ordering::Release);
    let joined = tokio::task::spawn_blocking(move || voice_thread.join()).await?;
    worker.stop().await;

    match joined {
        Ok(result) => result.map_err(Into::into),
        Err(_) => anyhow::bail!("voice thread panicked"),
    }
}

/// Observe avatar state until interrupted or the voice loop exits
async fn render_loop(
    avatar: &AvatarState,
    speech: &SpeechHandle,
    voice_thread: &std::thread::JoinHandle<camille::Result<()>>,
) {
    let mut states = avatar.subscribe();
    let mut ticker = tokio::time::interval(Duration::from_millis(50));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, shutting down");
                break;
            }
            _ = ticker.tick() => {
                avatar.sync_speaking(speech.is_speaking());

                if states.has_changed().unwrap_or(false) {
                    let layer = states.borrow_and_update().dominant();
                    tracing::info!(state = %layer, "avatar");
                }

                if voice_thread.is_finished() {
                    break;
                }
            }
        }
    }
}

/// Text chat over stdin
async fn chat(config: &Config) -> anyhow::Result<()> {
    let pool = db::init(&config.db_path)?;
    let (mut processor, users, _) = build_processor(config, pool).await?;

    if users.needs_setup()? {
        println!("Tip: run `camille setup` so {} can get to know you.\n", config.ai_name);
    }
    println!("Chatting with {}. Type 'exit' to quit.\n", config.ai_name);

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        if is_reset_command(line) {
            processor.clear_memory().await?;
            println!("{}: {MEMORY_CLEARED}\n", config.ai_name);
            continue;
        }

        match processor.process_input(line).await {
            Ok(reply) => println!("{}: {reply}\n", config.ai_name),
            Err(e) => eprintln!("error: {e}\n"),
        }
    }

    Ok(())
}

fn new_conversation(config: &Config) -> anyhow::Result<()> {
    let repo = ConversationRepo::new(db::init(&config.db_path)?);
    let conversation = repo.create()?;
    println!("Started conversation {}", conversation.id);
    Ok(())
}

fn list_conversations(config: &Config, limit: usize) -> anyhow::Result<()> {
    let repo = ConversationRepo::new(db::init(&config.db_path)?);
    let conversations = repo.list(limit)?;

    if conversations.is_empty() {
        println!("No conversations yet");
        return Ok(());
    }

    for conversation in conversations {
        let count = repo.message_count(&conversation.id)?;
        println!(
            "{}  {}  {} ({count} messages)",
            conversation.created_at.format("%Y-%m-%d %H:%M"),
            conversation.id,
            conversation.title.as_deref().unwrap_or("(untitled)"),
        );
    }
    Ok(())
}

fn list_tools(config: &Config) -> anyhow::Result<()> {
    let registry = ToolRegistry::with_builtins(&config.tools);
    for schema in registry.schemas() {
        println!("{}: {}", schema.name, schema.description);
        println!("  {}", serde_json::to_string(&schema.parameters)?);
    }
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Stay quiet for the first second, then speak!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    let mut threshold = None;
    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
        let threshold = *threshold.get_or_insert_with(|| calibrate_threshold(&samples));

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);
        let label = if energy < threshold { "silent" } else { "speech" };

        println!(
            "[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | {label} | [{meter}]",
            i + 1
        );
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    Ok(())
}

/// Test TTS output
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let tts = TextToSpeech::new(&config.voice)?;

    println!("Synthesizing speech...");
    let mp3_data = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    println!("Playing audio...");
    tokio::task::spawn_blocking(move || play_mp3(&mp3_data)).await??;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");
    Ok(())
}
