//! Binary Beats CLI - plays a 10-bit binary counter as music

use std::path::PathBuf;

use binary_beats::config::validate_tempo_bounds;
use binary_beats::sequencing::NoteSlots;
use binary_beats::{EffectsConfig, EngineConfig, InstrumentVariant, Player, SavedConfig, ServerEvent};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "binary-beats")]
#[command(about = "A musical interpretation of binary counting", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play through the default output device
    Play {
        #[command(flatten)]
        settings: Settings,

        /// Stop after this many seconds (default: run until interrupted)
        #[arg(short, long)]
        seconds: Option<f32>,
    },

    /// Run the engine offline and print every tick
    Trace {
        #[command(flatten)]
        settings: Settings,

        /// Number of ticks to run (default: 16)
        #[arg(long, default_value = "16")]
        ticks: u32,

        /// Seed for the timing jitter (default: 0)
        #[arg(long, default_value = "0")]
        seed: u64,
    },
}

#[derive(Args)]
struct Settings {
    /// Saved configuration (JSON) to start from
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tempo in BPM, 30-120 (default: 50)
    #[arg(short, long)]
    tempo: Option<f32>,

    /// synth, am, fm, membrane or metal (default: synth)
    #[arg(short, long)]
    instrument: Option<InstrumentVariant>,

    /// Ten comma-separated notes, most significant bit first
    #[arg(short, long, value_delimiter = ',')]
    notes: Option<Vec<String>>,

    /// Filter amount 0.0-1.0, 1.0 is fully open
    #[arg(long)]
    filter: Option<f32>,

    /// Delay amount 0.0-1.0
    #[arg(long)]
    delay: Option<f32>,

    /// Reverb amount 0.0-1.0
    #[arg(long)]
    reverb: Option<f32>,

    /// Volume 0.0-1.0
    #[arg(long)]
    volume: Option<f32>,
}

impl Settings {
    fn engine_config(&self) -> Result<EngineConfig, Box<dyn std::error::Error>> {
        let mut config = EngineConfig::default();

        if let Some(path) = &self.config {
            let saved = SavedConfig::from_json(&std::fs::read_to_string(path)?)?;
            tracing::info!(name = %saved.name, "Using saved configuration");
            config.notes = saved.note_slots()?;
            config.instrument = saved.instrument_type;
            config.tempo = saved.tempo;
            if let Some(effects) = saved.effects {
                config.effects = effects;
            }
        }

        if let Some(tempo) = self.tempo {
            validate_tempo_bounds(tempo)?;
            config.tempo = tempo;
        }
        if let Some(instrument) = self.instrument {
            config.instrument = instrument;
        }
        if let Some(notes) = &self.notes {
            config.notes = NoteSlots::new(notes.as_slice())?;
        }

        let effects = &mut config.effects;
        effects.filter = self.filter.unwrap_or(effects.filter);
        effects.delay = self.delay.unwrap_or(effects.delay);
        effects.reverb = self.reverb.unwrap_or(effects.reverb);
        effects.volume = self.volume.unwrap_or(effects.volume);
        config.effects.validate()?;

        Ok(config)
    }
}

fn describe(config: &EngineConfig) {
    let EffectsConfig {
        reverb,
        delay,
        filter,
        volume,
    } = config.effects;
    println!(
        "{} at {} bpm | notes {} | filter {:.2} delay {:.2} reverb {:.2} volume {:.2}",
        config.instrument,
        config.tempo,
        config.notes.to_vec().join(" "),
        filter,
        delay,
        reverb,
        volume
    );
}

#[cfg(feature = "output")]
fn play(config: &EngineConfig, seconds: Option<f32>) -> Result<(), Box<dyn std::error::Error>> {
    use std::time::{Duration, Instant};

    let mut player = Player::with_output(config)?;
    player.play()?;

    let started = Instant::now();
    let limit = seconds.map(Duration::from_secs_f32);

    while limit.map_or(true, |limit| started.elapsed() < limit) {
        std::thread::sleep(Duration::from_millis(10));

        let mut changed = false;
        player.process_events(|event| {
            if matches!(event, ServerEvent::CounterChanged(_)) {
                changed = true;
            }
        });
        if changed {
            let snapshot = player.snapshot();
            println!("{:4}  {}", snapshot.counter, snapshot.pattern);
        }
    }

    player.close()?;
    Ok(())
}

#[cfg(not(feature = "output"))]
fn play(_config: &EngineConfig, _seconds: Option<f32>) -> Result<(), Box<dyn std::error::Error>> {
    Err("built without the `output` feature; use `trace` instead".into())
}

/// Frames rendered between event drains: 10 ms, never less than one
fn trace_block(sample_rate: f32) -> usize {
    ((sample_rate * 0.01) as usize).max(1)
}

fn trace(config: &EngineConfig, ticks: u32, seed: u64) -> Result<(), Box<dyn std::error::Error>> {
    let mut player = Player::offline(config, seed)?;
    player.play()?;
    // The start event reports the reset counter, not a tick
    player.process_events(|_| {});

    let block = trace_block(config.sample_rate);
    let mut seen = 0;
    let mut peak = 0.0f32;

    while seen < ticks {
        let frames = player.render(block)?;
        peak = frames
            .iter()
            .fold(peak, |peak, &(left, right)| peak.max(left.abs()).max(right.abs()));

        let mut lines = Vec::new();
        player.process_events(|event| match event {
            ServerEvent::CounterChanged(counter) => {
                seen += 1;
                lines.push(format!(
                    "{:4}  {}",
                    counter,
                    binary_beats::events::bit_pattern(*counter)
                ));
            }
            ServerEvent::NoteTriggered {
                index,
                duration,
                time,
            } => {
                lines.push(format!(
                    "        bit {} -> {} for {}s at {:.4}s",
                    index,
                    config.notes.get(*index).unwrap_or("?"),
                    duration,
                    time
                ));
            }
            ServerEvent::NoteRejected { index } => {
                lines.push(format!(
                    "        bit {} -> {:?} rejected",
                    index,
                    config.notes.get(*index).unwrap_or("?")
                ));
            }
            ServerEvent::PlayStateChanged(_) => {}
        });

        for line in lines {
            println!("{}", line);
        }
    }

    player.close()?;
    println!("peak level {:.3}", peak);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play { settings, seconds } => {
            let config = settings.engine_config()?;
            describe(&config);
            play(&config, seconds)
        }
        Commands::Trace {
            settings,
            ticks,
            seed,
        } => {
            let config = settings.engine_config()?;
            describe(&config);
            trace(&config, ticks, seed)
        }
    }
}
