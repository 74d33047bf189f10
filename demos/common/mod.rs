//! Common utilities for the interactive demos.
//!
//! The synthesizer is not `Send`, so it lives on a render thread that fills a
//! ring buffer block by block. The cpal callback only drains that buffer and
//! the terminal thread talks to the renderer through a channel.

use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, StreamConfig};
use crossterm::{
    ExecutableCommand,
    event::{
        self, Event, KeyCode, KeyEvent, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
        PushKeyboardEnhancementFlags,
    },
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ringbuf::{
    HeapCons, HeapProd, HeapRb,
    traits::{Consumer, Observer, Producer, Split},
};
use sas_synth::{BLOCK_LEN, SAMPLING_RATE, Synthesizer};
use std::io::stdout;
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Interleaved stereo samples buffered between renderer and device (~186 ms).
const RING_CAPACITY: usize = 16 * BLOCK_LEN;

/// Configuration for keyboard enhancements (needed for detecting key press/release).
#[derive(Default)]
pub struct KeyboardConfig {
    /// Enable keyboard enhancements (for press/release detection)
    pub enable_enhancements: bool,
}

/// Key handling result that controls the event loop
pub enum KeyAction {
    /// Continue the event loop
    Continue,
    /// Exit the event loop
    Exit,
}

/// Logs go to stderr, filtered by `RUST_LOG` (default `warn`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Render thread owning the synthesizer.
pub struct Renderer<C> {
    commands: Sender<C>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl<C: Send + 'static> Renderer<C> {
    /// Starts rendering into `producer`.
    ///
    /// `build` runs on the render thread and returns the synthesizer with
    /// whatever host-side state `apply` needs (producer handles, source ids).
    /// Commands sent through [`Renderer::send`] are applied between blocks.
    pub fn spawn<S, B, A>(mut producer: HeapProd<f32>, build: B, mut apply: A) -> Self
    where
        B: FnOnce() -> Result<(Synthesizer, S)> + Send + 'static,
        A: FnMut(&mut Synthesizer, &mut S, C) + Send + 'static,
    {
        let (commands, inbox) = mpsc::channel::<C>();
        let running = Arc::new(AtomicBool::new(true));
        let alive = Arc::clone(&running);

        let handle = thread::spawn(move || {
            let (mut synth, mut state) = match build() {
                Ok(built) => built,
                Err(err) => {
                    error!(error = %err, "could not build the synthesizer");
                    return;
                }
            };

            let mut block = [0.0; BLOCK_LEN];
            let mut samples = [0.0f32; BLOCK_LEN];
            while alive.load(Ordering::Relaxed) {
                while let Ok(command) = inbox.try_recv() {
                    apply(&mut synth, &mut state, command);
                }

                if producer.vacant_len() < BLOCK_LEN {
                    thread::sleep(Duration::from_millis(2));
                    continue;
                }

                synth.synthesize(&mut block);
                for (dst, src) in samples.iter_mut().zip(block.iter()) {
                    *dst = src.clamp(-1.0, 1.0) as f32;
                }
                producer.push_slice(&samples);
            }
            info!(stats = ?synth.statistics(), "renderer stopped");
        });

        Self {
            commands,
            running,
            handle: Some(handle),
        }
    }

    pub fn send(&self, command: C) {
        if self.commands.send(command).is_err() {
            warn!("renderer is gone, command dropped");
        }
    }
}

impl<C> Drop for Renderer<C> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Ring buffer halves: the renderer pushes, the audio callback pops.
pub fn sample_ring() -> (HeapProd<f32>, HeapCons<f32>) {
    HeapRb::<f32>::new(RING_CAPACITY).split()
}

/// Runs an interactive demo with terminal UI.
///
/// Handles the audio device, raw mode and alternate screen, the panic hook
/// that restores the terminal, and the key polling loop.
pub fn run_interactive_demo<F, K>(
    consumer: HeapCons<f32>,
    keyboard_config: KeyboardConfig,
    initial_ui: F,
    mut key_handler: K,
) -> Result<()>
where
    F: FnOnce() -> Result<()>,
    K: FnMut(&KeyEvent) -> Result<KeyAction>,
{
    // Setup audio
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("No output device available"))?;

    let config = device.default_output_config()?;
    if f64::from(config.sample_rate().0) != SAMPLING_RATE {
        warn!(
            device = config.sample_rate().0,
            engine = SAMPLING_RATE,
            "device sample rate differs, pitch will be off"
        );
    }

    // Start audio stream
    let _stream = match config.sample_format() {
        SampleFormat::F32 => create_audio_stream::<f32>(&device, &config.into(), consumer)?,
        SampleFormat::I16 => create_audio_stream::<i16>(&device, &config.into(), consumer)?,
        SampleFormat::U16 => create_audio_stream::<u16>(&device, &config.into(), consumer)?,
        sample_format => {
            return Err(anyhow::anyhow!(
                "Unsupported sample format: {}",
                sample_format
            ));
        }
    };

    // Setup terminal - keyboard enhancements MUST come before alternate screen
    if keyboard_config.enable_enhancements {
        stdout().execute(PushKeyboardEnhancementFlags(
            KeyboardEnhancementFlags::REPORT_EVENT_TYPES,
        ))?;
    }

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(crossterm::cursor::Hide)?;

    // Set up panic hook to restore terminal on panic
    let has_enhancements = keyboard_config.enable_enhancements;
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        cleanup_terminal(has_enhancements);
        original_hook(panic_info);
    }));

    initial_ui()?;

    loop {
        if event::poll(Duration::from_millis(50))?
            && let Event::Key(key_event) = event::read()?
        {
            match key_handler(&key_event)? {
                KeyAction::Continue => {}
                KeyAction::Exit => break,
            }
        }
    }

    cleanup_terminal(keyboard_config.enable_enhancements);

    Ok(())
}

/// Creates an output stream draining interleaved stereo from `consumer`.
///
/// Channels beyond the first two get the mid signal.
fn create_audio_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut consumer: HeapCons<f32>,
) -> Result<cpal::Stream>
where
    T: Sample + FromSample<f32> + cpal::SizedSample,
{
    let channels = config.channels as usize;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            for frame in data.chunks_mut(channels) {
                let left = consumer.try_pop().unwrap_or(0.0);
                let right = consumer.try_pop().unwrap_or(0.0);
                for (channel, s) in frame.iter_mut().enumerate() {
                    let value = match channel {
                        0 if channels == 1 => 0.5 * (left + right),
                        0 => left,
                        1 => right,
                        _ => 0.5 * (left + right),
                    };
                    *s = T::from_sample(value);
                }
            }
        },
        |err| error!("Audio stream error: {}", err),
        None,
    )?;

    stream.play()?;
    Ok(stream)
}

/// Cleans up terminal state (cursor, alternate screen, raw mode).
fn cleanup_terminal(has_keyboard_enhancements: bool) {
    if has_keyboard_enhancements {
        let _ = stdout().execute(PopKeyboardEnhancementFlags);
    }
    let _ = stdout().execute(crossterm::cursor::Show);
    let _ = stdout().execute(LeaveAlternateScreen);
    let _ = disable_raw_mode();
}

/// Helper to check if a key code is a quit key (Q, ESC).
pub fn is_quit_key(code: KeyCode) -> bool {
    matches!(code, KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc)
}
