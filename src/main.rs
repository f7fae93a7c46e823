// src/main.rs

use anyhow::{bail, Context};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{self, disable_raw_mode, enable_raw_mode, ClearType},
};
use std::io::{stdout, Write};
use std::time::{Duration, Instant};

use wave_sampler::waveform::terminal::render_ascii;
use wave_sampler::{AudioSampler, EnvelopeConfig, FileSource, LevelHistory, MemorySource};

enum Input {
    File(String),
    Tone(f64),
}

struct Args {
    input: Input,
    config: Option<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut config = None;
    let mut input = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config = Some(args.next().context("--config needs a path")?);
            }
            "--tone" => {
                let secs = args.next().context("--tone needs a length in seconds")?;
                let secs: f64 = secs.parse().context("--tone length must be a number")?;
                input = Some(Input::Tone(secs));
            }
            other => input = Some(Input::File(other.to_string())),
        }
    }

    let Some(input) = input else {
        bail!("usage: wave_sampler [--config envelope.json] (<audio file> | --tone <seconds>)");
    };
    Ok(Args { input, config })
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => EnvelopeConfig::load_from_disk(path)
            .with_context(|| format!("loading config {path}"))?,
        None => EnvelopeConfig::default(),
    };

    let mut sampler = AudioSampler::new(config.clone());
    match args.input {
        Input::File(path) => sampler.load(FileSource::new(path)).await,
        Input::Tone(secs) => sampler.load(MemorySource::tone(220.0, secs, 44_100, 2, 2.0)).await,
    }

    // Give metadata a moment to land so the clock knows the track length.
    let wait_start = Instant::now();
    while sampler.time_sampler().track_length() <= 0.0 && sampler.is_loading() {
        if wait_start.elapsed() > Duration::from_secs(10) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let track_length = sampler.time_sampler().track_length();
    if track_length <= 0.0 {
        let outcome = sampler.wait().await;
        bail!(
            "nothing to play: {}",
            outcome.map_or_else(|| "no outcome".to_string(), |o| o.to_string())
        );
    }

    println!("Playing {:.1}s envelope. Press [Q] to quit.", track_length);
    enable_raw_mode()?;
    let result = run_clock(&sampler, track_length).await;
    disable_raw_mode()?;

    let outcome = sampler.cancel().await;
    println!();
    if let Some(outcome) = outcome {
        println!("🛑 Extraction {outcome}.");
    }
    result
}

/// Fake playback clock at ~30 fps driving the live level view.
async fn run_clock(sampler: &AudioSampler, track_length: f64) -> anyhow::Result<()> {
    let frame = Duration::from_millis(33);
    let floor = sampler.config().noise_floor_db;
    let mut history = LevelHistory::default();
    let mut out = stdout();

    sampler.notify_playing();
    let start = Instant::now();

    loop {
        if event::poll(Duration::ZERO)? {
            if let Event::Key(ev) = event::read()? {
                if ev.kind == KeyEventKind::Press {
                    let ctrl_c = ev.code == KeyCode::Char('c')
                        && ev.modifiers.contains(KeyModifiers::CONTROL);
                    if ctrl_c || matches!(ev.code, KeyCode::Char('q') | KeyCode::Esc) {
                        break;
                    }
                }
            }
        }

        let now = start.elapsed().as_secs_f64();
        if now > track_length {
            break;
        }
        sampler.set_time(now);
        let level = sampler.current_level();
        history.push(level);

        execute!(out, cursor::MoveTo(0, 1), terminal::Clear(ClearType::FromCursorDown))?;
        for line in render_ascii(&history.heights(floor), 12) {
            write!(out, "{line}\r\n")?;
        }
        let status = if sampler.is_loading() { "extracting" } else { "ready" };
        write!(
            out,
            "{:6.2}s / {:6.2}s  {:6.1} dB  [{status}]\r\n",
            now, track_length, level
        )?;
        out.flush()?;

        tokio::time::sleep(frame).await;
    }

    sampler.notify_stopped();
    Ok(())
}
