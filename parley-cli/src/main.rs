//! Parley CLI - talk to configured NPCs from a terminal

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use parley_core::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Parley NPC dialogue CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to parley.toml and PARLEY_* variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Talk to an NPC, typing what the player says
    Chat {
        /// NPC to stand next to (defaults to the first configured NPC)
        #[arg(short, long)]
        npc: Option<String>,

        /// Inventory sockets available to the player
        #[arg(long, value_delimiter = ',', default_value = "left_hand,right_hand")]
        sockets: Vec<String>,
    },
    /// Load and validate the configuration
    CheckConfig,
    /// Version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("parley {}", env!("CARGO_PKG_VERSION"));
            println!("parley-core {}", parley_core::VERSION);
        }
        Commands::CheckConfig => {
            let config = load_config(cli.config.as_ref())?;
            config.validate().context("Invalid configuration")?;
            print_config_summary(&config);
        }
        Commands::Chat { npc, sockets } => {
            let config = load_config(cli.config.as_ref())?;
            chat(config, npc, sockets).await?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<ParleyConfig> {
    match path {
        Some(path) => ParleyConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => ParleyConfig::load().context("Failed to load config"),
    }
}

fn print_config_summary(config: &ParleyConfig) {
    let key_source = if config.backend.api_key.is_some() {
        "config"
    } else if std::env::var("GEMINI_API_KEY").is_ok() {
        "GEMINI_API_KEY"
    } else {
        "missing (dialogue disabled)"
    };
    println!("Configuration OK");
    println!("  model:    {}", config.backend.model);
    println!("  timeout:  {:?}", config.backend.timeout);
    println!("  api key:  {}", key_source);
    println!("  NPCs:     {}", config.npcs.len());
    for npc in &config.npcs {
        match &npc.quest {
            Some(quest) => println!("    - {} (wants {})", npc.id, quest.item),
            None => println!("    - {}", npc.id),
        }
    }
}

/// Terminal rendering of the dialogue panel and audio cues.
struct ConsolePresentation {
    music: Mutex<Ducker>,
}

impl ConsolePresentation {
    fn new(audio: &AudioConfig) -> Self {
        Self {
            music: Mutex::new(Ducker::from_config(1.0, audio)),
        }
    }

    fn music(&self) -> std::sync::MutexGuard<'_, Ducker> {
        self.music.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Presentation for ConsolePresentation {
    fn show_panel(&self, npc: &NpcId) {
        tracing::debug!(%npc, "Panel shown");
    }

    fn hide_panel(&self, npc: &NpcId) {
        tracing::debug!(%npc, "Panel hidden");
    }

    fn show_listening(&self, npc: &NpcId) {
        println!("[{} is listening...]", npc);
    }

    fn hide_listening(&self, _npc: &NpcId) {}

    fn set_text(&self, npc: &NpcId, text: &str) {
        if !text.is_empty() {
            println!("{}: {}", npc, text);
        }
    }

    fn play_voice(&self, npc: &NpcId, duration: Duration) {
        tracing::debug!(%npc, ?duration, "Voice playing");
    }

    fn stop_voice(&self, _npc: &NpcId) {}

    fn play_sound(&self, sound: SoundCategory) {
        match sound {
            SoundCategory::QuestComplete => println!("~ fanfare ~"),
            SoundCategory::ItemPickup => println!("~ clink ~"),
            other => tracing::debug!(sound = ?other, "Sound played"),
        }
    }

    fn start_conversation(&self) {
        let volume = self.music().start_conversation();
        tracing::debug!(volume, "Background music ducked");
    }

    fn end_conversation(&self) {
        let volume = self.music().end_conversation();
        tracing::debug!(volume, "Background music restored");
    }

    fn reveal_reward(&self, npc: &NpcId, reward: &str) {
        println!("[{} hands over: {}]", npc, reward);
    }
}

async fn chat(config: ParleyConfig, npc: Option<String>, sockets: Vec<String>) -> Result<()> {
    let npc = match npc {
        Some(id) => NpcId::new(id),
        None => match config.npcs.first() {
            Some(first) => first.id.clone(),
            None => bail!("No NPCs configured"),
        },
    };
    if config.npc(&npc).is_none() {
        bail!("Unknown NPC: {}", npc);
    }

    let presentation = Arc::new(ConsolePresentation::new(&config.audio));
    let inventory = Arc::new(SocketInventory::with_sockets(sockets));
    let (session, handle, mut events) = Session::builder(config)
        .presentation(presentation.clone())
        .speech(Arc::new(NullCollaborators))
        .inventory(inventory.clone())
        .build()
        .context("Failed to start session")?;
    let session_task = session.spawn();

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                DialogueEvent::SentenceDisplayed { index, total, .. } if index + 1 < total => {
                    println!("  (/next)");
                }
                DialogueEvent::DialogueFailed { error, .. } => {
                    tracing::warn!(%error, "Dialogue failed");
                }
                DialogueEvent::QuestActivated { npc, item, .. } => {
                    println!("*** Quest started: {} wants {}", npc, item);
                }
                DialogueEvent::QuestCompleted { npc, item, .. } => {
                    println!("*** Quest complete: {} got {}", npc, item);
                }
                DialogueEvent::AllQuestsCompleted { total, .. } => {
                    println!("*** All {} quests complete!", total);
                }
                _ => {}
            }
        }
    });

    print_help(&npc);
    let mut current = npc;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.splitn(3, ' ');
        match parts.next().unwrap_or_default() {
            "/quit" => break,
            "/help" => print_help(&current),
            "/enter" => handle.player_entered(current.clone()).await?,
            "/exit" => handle.player_exited(current.clone()).await?,
            "/next" => handle.advance(current.clone()).await?,
            "/npc" => match parts.next() {
                Some(id) => {
                    handle.player_exited(current.clone()).await?;
                    current = NpcId::new(id);
                    println!("Now next to {}", current);
                }
                None => println!("usage: /npc <id>"),
            },
            "/give" => match (parts.next(), parts.next()) {
                (Some(socket), Some(item)) => {
                    if inventory.attach(socket, item) {
                        presentation.play_sound(SoundCategory::ItemPickup);
                    } else {
                        println!("Cannot put {} into {}", item, socket);
                    }
                }
                _ => println!("usage: /give <socket> <item>"),
            },
            "/status" => {
                let snapshot = handle.snapshot().await?;
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
                for (socket, item) in inventory.sockets() {
                    println!("  {}: {}", socket, item.as_deref().unwrap_or("-"));
                }
            }
            command if command.starts_with('/') => println!("Unknown command {}", command),
            _ => handle.transcribed(current.clone(), line, true).await?,
        }
    }

    handle.shutdown().await?;
    session_task.await?;
    printer.await?;
    Ok(())
}

fn print_help(npc: &NpcId) {
    println!("Talking to {}. Type to speak, or:", npc);
    println!("  /enter               walk up to the NPC");
    println!("  /exit                walk away");
    println!("  /next                show the next sentence");
    println!("  /give <socket> <item> put an item into an inventory socket");
    println!("  /npc <id>            walk over to another NPC");
    println!("  /status              show session state");
    println!("  /quit                leave");
}
