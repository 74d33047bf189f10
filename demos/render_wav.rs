//! Offline demo: renders a few seconds of two sources to a WAV file.
//!
//! A spectral "vowel" glides between two formant-like colors while a second,
//! bell-like source circles the listener. The result is written as 32-bit
//! float stereo.
//!
//! Usage: `cargo run --example render_wav -- [output.wav] [seconds]`

use anyhow::{Context, Result};
use sas_synth::spectral::harmonic_tracks;
use sas_synth::{
    BLOCK_LEN, BLOCK_RATE, Envelope, FramePlayer, Position, SAMPLING_RATE, SpectralFrames,
    StaticProducer, SynthConfig, Synthesizer,
};
use std::f64::consts::TAU;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Amplitude of harmonic `h` (1-based) of the vowel at glide position `mix`.
fn vowel(h: usize, mix: f64) -> f64 {
    let formant = |center: f64, width: f64| {
        let d = (h as f64 - center) / width;
        (-d * d).exp()
    };
    let a = formant(3.5, 1.5) + 0.5 * formant(11.0, 2.0);
    let o = formant(2.0, 1.0) + 0.4 * formant(4.0, 1.0);
    (1.0 - mix) * a + mix * o
}

fn vowel_glide(blocks: usize) -> Result<SpectralFrames> {
    let rows: Vec<Vec<f64>> = (0..blocks)
        .map(|n| {
            let mix = 0.5 - 0.5 * (TAU * n as f64 / blocks as f64).cos();
            let fade = (n as f64 / 20.0).min(1.0) * 0.4;
            (1..=24).map(|h| fade * vowel(h, mix) / 3.0).collect()
        })
        .collect();
    Ok(SpectralFrames::new(harmonic_tracks(110.0, &rows)?)?)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "sas.wav".to_string());
    let seconds: f64 = match args.next() {
        Some(s) => s.parse().context("seconds must be a number")?,
        None => 6.0,
    };
    let blocks = (seconds * BLOCK_RATE).ceil() as usize;

    let mut synth = Synthesizer::new(SynthConfig::default().with_seed(2024))?;

    let glide = FramePlayer::new(
        vowel_glide(blocks)?,
        Position::new(-1.0, 2.0, 0.0),
        synth.defaults(),
    );
    synth.add_source(Position::new(-1.0, 2.0, 0.0), glide);

    let mut bell = synth.new_frame();
    bell.set_amplitude(0.3);
    bell.set_frequency(523.25);
    // Slightly stretched partials.
    let stretched: Vec<f64> = (1..=8)
        .map(|h| 523.25 * (h as f64).powf(1.04))
        .collect();
    bell.set_warp(Envelope::make(523.25, &stretched)?.for_warp());
    bell.set_color(Envelope::make(523.25, &[1.0, 0.6, 0.45, 0.3, 0.2, 0.12, 0.08, 0.05])?.for_color());
    let orbit = StaticProducer::new(bell, Position::new(0.0, 8.0, 0.0));
    let handle = orbit.handle();
    synth.add_source(Position::new(0.0, 8.0, 0.0), orbit);

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: SAMPLING_RATE as u32,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer =
        hound::WavWriter::create(&path, spec).with_context(|| format!("creating {path}"))?;

    let mut block = [0.0; BLOCK_LEN];
    let mut peak = 0.0f64;
    for n in 0..blocks {
        let angle = TAU * n as f64 / (4.0 * BLOCK_RATE);
        handle.set_position(Position::new(8.0 * angle.sin(), 8.0 * angle.cos(), 0.0));

        synth.synthesize(&mut block);
        for &sample in &block {
            peak = peak.max(sample.abs());
            writer.write_sample(sample as f32)?;
        }
    }
    writer.finalize()?;

    info!(path = %path, blocks, peak, stats = ?synth.statistics(), "render finished");
    println!("wrote {path} ({seconds:.1} s, peak {peak:.3})");
    Ok(())
}
