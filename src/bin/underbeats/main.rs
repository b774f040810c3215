//! underbeats - plays a looping pattern through the default chain
//!
//! Run with: cargo run -- --effect reverb --tempo 100

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use underbeats_dsp::graph::filter;
use underbeats_dsp::sequencing::{ParamId, Pattern, TimeSignature};
use underbeats_dsp::{EffectSlot, EngineConfig, EngineContext, MAX_BLOCK_SIZE};

const CUTOFF_LANE: ParamId = ParamId(1);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Effect {
    None,
    Delay,
    Reverb,
}

impl From<Effect> for EffectSlot {
    fn from(effect: Effect) -> Self {
        match effect {
            Effect::None => EffectSlot::None,
            Effect::Delay => EffectSlot::Delay,
            Effect::Reverb => EffectSlot::Reverb,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "underbeats", about = "Realtime DSP graph and sequencer demo")]
struct Args {
    /// TOML engine config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tempo in BPM, overrides the config
    #[arg(long)]
    tempo: Option<f64>,

    /// Effect after the filter
    #[arg(long, value_enum, default_value = "delay")]
    effect: Effect,

    /// Seconds to play before stopping
    #[arg(long, default_value = "8")]
    seconds: u64,
}

fn load_config(args: &Args) -> EyreResult<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let source = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("failed to read {}", path.display()))?;
            EngineConfig::from_toml_str(&source)?
        }
        None => EngineConfig::default(),
    };
    if let Some(tempo) = args.tempo {
        config.transport.set_tempo(tempo)?;
    }
    Ok(config)
}

fn demo_pattern() -> Pattern {
    // C minor arpeggio over two bars, cutoff opening then closing
    let steps = [
        Some(48), Some(55), Some(60), Some(63), Some(67), Some(63), Some(60), Some(55),
        Some(46), Some(53), Some(58), Some(62), Some(65), None, Some(58), None,
    ];
    Pattern::from_steps(&steps, 0.5, 0.6, 110)
        .automation(CUTOFF_LANE, 0.0, 400.0)
        .automation(CUTOFF_LANE, 4.0, 4_000.0)
        .automation(CUTOFF_LANE, 8.0, 400.0)
}

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let mut config = load_config(&args)?;

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| eyre!("no default output device available"))?;
    let stream_config = device
        .default_output_config()
        .wrap_err("failed to fetch default output config")?;

    config.sample_rate = stream_config.sample_rate().0 as f32;
    let channels = stream_config.channels() as usize;
    let block_size = config.block_size.min(MAX_BLOCK_SIZE);
    info!(sample_rate = config.sample_rate, channels, block_size, "audio config");

    let mut ctx = EngineContext::new(&config);
    let chain = ctx.build_default_chain()?;
    ctx.select_effect(args.effect.into())?;
    ctx.prepare(config.sample_rate, block_size)?;

    let cutoff = ctx
        .graph()
        .param(chain.filter, filter::FREQUENCY)
        .ok_or_else(|| eyre!("filter has no {} parameter", filter::FREQUENCY))?;
    ctx.bind_automation(CUTOFF_LANE, cutoff);

    let pattern: Arc<Pattern> = Arc::new(demo_pattern());
    let loop_end = pattern.length_beats().max(TimeSignature::FOUR_FOUR.beats_per_bar()).ceil();

    let sequencer = ctx.sequencer_mut();
    sequencer.set_timeline(Some(pattern.clone()));
    sequencer.set_loop_region(0.0, loop_end)?;
    sequencer.set_looping(true);
    let mut transport = sequencer.command_handle(config.command_queue_capacity);
    let mut notes = sequencer.subscribe_notes(config.listener_queue_capacity);
    let monitor = sequencer.monitor();

    let run_switch = ctx.graph().run_switch();
    ctx.graph().start()?;

    let mut left = vec![0.0f32; block_size];
    let mut right = vec![0.0f32; block_size];

    let stream = device.build_output_stream(
        &stream_config.into(),
        move |data: &mut [f32], _| {
            let total_frames = data.len() / channels;
            let mut frames_written = 0;

            while frames_written < total_frames {
                let frames = (total_frames - frames_written).min(block_size);
                let (l, r) = (&mut left[..frames], &mut right[..frames]);
                l.fill(0.0);
                r.fill(0.0);
                ctx.process_block(l, r);

                let out = &mut data[frames_written * channels..(frames_written + frames) * channels];
                for (frame, (&ls, &rs)) in out.chunks_mut(channels).zip(l.iter().zip(r.iter())) {
                    match frame {
                        [mono] => *mono = 0.5 * (ls + rs),
                        [first, second, rest @ ..] => {
                            *first = ls;
                            *second = rs;
                            rest.fill(0.0);
                        }
                        [] => {}
                    }
                }
                frames_written += frames;
            }
        },
        |err| tracing::error!(%err, "audio stream error"),
        None,
    )?;

    stream.play()?;
    transport.play()?;
    info!(seconds = args.seconds, "playing, Ctrl+C to quit early");

    let started = Instant::now();
    let mut last_bar = 0;
    let mut played = 0;
    while started.elapsed() < Duration::from_secs(args.seconds) {
        std::thread::sleep(Duration::from_millis(50));

        while let Ok(note) = notes.pop() {
            if !note.is_note_off() {
                played += 1;
            }
        }

        let (bar, beat) = TimeSignature::FOUR_FOUR.bar_and_beat(monitor.position());
        if bar != last_bar {
            last_bar = bar;
            let mut cutoff_hz = 0.0;
            monitor.timer_callback(|event| {
                if event.param == CUTOFF_LANE {
                    cutoff_hz = event.value;
                }
            });
            info!(bar, beat, cutoff_hz, played, "transport");
            played = 0;
        }
    }

    if transport.stop().is_err() {
        warn!("transport queue full, stopping graph directly");
    }
    // let the release tail ring out before silencing the graph
    std::thread::sleep(Duration::from_millis(500));
    run_switch.stop();
    drop(stream);
    info!("done");
    Ok(())
}
