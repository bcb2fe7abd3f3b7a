mod config;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use fretseq_core::{
    AudioService, ChordShape, MeasurePosition, Note, PlaybackSettings, RenderEvent, Session,
    SilentAudio, SystemClock,
};
use fretseq_engine::EngineAudio;
use serde::Serialize;

use crate::config::Config;

#[derive(Parser)]
#[command(author, version, about = "Fret grid sequencer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lay out a sequence and play it through the default output device.
    Play(PlayArgs),
    /// Lay out a sequence and print the resulting grid as JSON.
    Layout(SequenceArgs),
}

#[derive(Args)]
struct SequenceArgs {
    /// Steps in order: `STRING:FRET` (string 1 is the high e), `rest`, or a
    /// chord fingering such as `x32010`.
    #[arg(required = true)]
    steps: Vec<Step>,
    /// Beats given to each note and rest.
    #[arg(long)]
    length: Option<u32>,
}

#[derive(Args)]
struct PlayArgs {
    #[command(flatten)]
    sequence: SequenceArgs,
    /// Beat to start playback from.
    #[arg(long, default_value_t = 0)]
    start: u32,
    /// Restart from the start beat after each pass; stop with Ctrl-C.
    #[arg(long = "loop")]
    looping: bool,
    /// Playback speed, one of 0.25 to 3 in quarter steps.
    #[arg(long)]
    speed: Option<f64>,
    /// Seconds each note rings.
    #[arg(long)]
    sustain: Option<f64>,
    /// Milliseconds between strings of a chord.
    #[arg(long)]
    strum: Option<f64>,
    /// Directory holding `{string}_{fret}.wav` recordings.
    #[arg(long)]
    samples: Option<PathBuf>,
    /// Log the notes instead of opening an audio device.
    #[arg(long)]
    silent: bool,
    /// Remember these settings as the new defaults.
    #[arg(long)]
    save_config: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Note { string: u8, fret: u8 },
    Rest,
    Chord(ChordShape),
}

impl FromStr for Step {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("rest") {
            return Ok(Step::Rest);
        }
        if let Some((string, fret)) = s.split_once(':') {
            let string = string
                .parse()
                .with_context(|| format!("bad string in '{s}'"))?;
            let fret = fret.parse().with_context(|| format!("bad fret in '{s}'"))?;
            return Ok(Step::Note { string, fret });
        }
        let shape = ChordShape::from_str(s).with_context(|| format!("'{s}' is not a note, rest or chord"))?;
        Ok(Step::Chord(shape))
    }
}

#[derive(Serialize)]
struct Layout<'a> {
    timeline_len: u32,
    notes: &'a [Note],
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Play(args) => play(args).await,
        Commands::Layout(args) => layout(args),
    }
}

fn build_session(
    steps: &[Step],
    audio: Box<dyn AudioService>,
    settings: PlaybackSettings,
) -> Result<Session> {
    let mut session = Session::new(audio, Box::new(SystemClock::new()), settings);
    for step in steps {
        match step {
            Step::Note { string, fret } => {
                session.insert_note(*string, *fret)?;
            }
            Step::Rest => {
                session.insert_rest()?;
            }
            Step::Chord(shape) => {
                session.quick_insert_chord(shape)?;
            }
        }
    }
    // edits queue render events nobody is listening to yet
    session.drain_events();
    Ok(session)
}

fn layout(args: SequenceArgs) -> Result<()> {
    let mut settings = Config::load().playback;
    if let Some(length) = args.length {
        settings.note_length = length;
    }

    let session = build_session(&args.steps, Box::new(SilentAudio), settings.sanitized())?;
    let layout = Layout {
        timeline_len: session.timeline_len(),
        notes: session.notes(),
    };
    println!("{}", serde_json::to_string_pretty(&layout)?);
    Ok(())
}

fn apply_overrides(settings: &mut PlaybackSettings, args: &PlayArgs) {
    if let Some(length) = args.sequence.length {
        settings.note_length = length;
    }
    if let Some(speed) = args.speed {
        settings.speed = speed;
    }
    if let Some(sustain) = args.sustain {
        settings.sustain_secs = sustain;
    }
    if let Some(strum) = args.strum {
        settings.strum_ms = strum;
    }
    if args.looping {
        settings.looping = true;
    }
}

async fn play(args: PlayArgs) -> Result<()> {
    let mut config = Config::load();
    apply_overrides(&mut config.playback, &args);
    config.playback = config.playback.sanitized();
    if let Some(dir) = &args.samples {
        config.sample_dir = Some(dir.clone());
    }
    if args.save_config {
        config.save();
    }

    let audio: Box<dyn AudioService> = if args.silent {
        Box::new(SilentAudio)
    } else {
        let dir = config.sample_dir();
        Box::new(
            EngineAudio::start(&dir)
                .with_context(|| format!("could not start audio with samples from {}", dir.display()))?,
        )
    };

    let mut session = build_session(&args.sequence.steps, audio, config.playback.clone())?;
    session.set_start_beat(args.start)?;
    if !session.play() {
        bail!("nothing to play");
    }
    log::info!(
        "playing {} note(s) from {} at {}x",
        session.notes().len(),
        MeasurePosition::of(args.start),
        config.playback.speed
    );

    let mut interval = tokio::time::interval(Duration::from_millis(16));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut ctrl_c => {
                log::info!("interrupted");
                session.pause();
                return Ok(());
            }
        }

        session.tick();
        for event in session.drain_events() {
            report(&session, event);
        }
        if !session.is_playing() {
            break;
        }
    }

    // let the last notes ring out before the stream goes away
    tokio::time::sleep(Duration::from_secs_f64(config.playback.sustain_secs)).await;
    Ok(())
}

fn report(session: &Session, event: RenderEvent) {
    match event {
        RenderEvent::PlaybackStarted { start_beat } => {
            log::debug!("pass from {}", MeasurePosition::of(start_beat));
        }
        RenderEvent::PlaybackStopped => log::debug!("pass finished"),
        RenderEvent::NoteActive(id) => {
            if let Some(note) = session.grid().note(id) {
                log::info!(
                    "{} string {} fret {}",
                    MeasurePosition::of(note.beat),
                    note.string,
                    note.fret
                );
            }
        }
        RenderEvent::Progress(p) => log::trace!("progress {:.3}", p),
        RenderEvent::Error(message) => log::warn!("{message}"),
        RenderEvent::NotesChanged
        | RenderEvent::GhostChanged
        | RenderEvent::NoteReleased(_)
        | RenderEvent::Flash { .. } => {}
    }
}
