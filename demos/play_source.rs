//! Interactive demo: one harmonic source moving around the listener.
//!
//! Controls:
//! - LEFT/RIGHT arrows: Move the source along x (±2 m)
//! - UP/DOWN arrows: Move the source along y (±2 m)
//! - + / -: Raise or lower the pitch by a semitone
//! - H / h: More or fewer harmonics
//! - SPACE: Toggle the sound on/off
//! - D: Remove the source and add it back
//! - Q or ESC: Quit
//!
//! Run with `RUST_LOG=sas_synth=debug` to see the engine's log.

mod common;

use anyhow::Result;
use common::{KeyAction, KeyboardConfig, Renderer, init_tracing, is_quit_key, run_interactive_demo};
use crossterm::{
    ExecutableCommand,
    event::{KeyCode, KeyEvent, KeyEventKind},
};
use sas_synth::{
    Envelope, Frame, Position, SourceId, StaticHandle, StaticProducer, SynthConfig, Synthesizer,
};
use std::io::{Write, stdout};

const MAX_HARMONICS: usize = 32;

/// Requests from the terminal thread to the render thread.
enum Command {
    Move(Position),
    Voice { frequency: f64, harmonics: usize },
    Amplitude(f64),
    Respawn,
}

/// Render-thread state: the live source and its control handle.
struct Live {
    id: SourceId,
    handle: StaticHandle,
}

/// What the terminal shows, mirrored on the UI thread.
#[derive(Clone, Copy)]
struct Panel {
    position: Position,
    frequency: f64,
    harmonics: usize,
    playing: bool,
}

/// Sawtooth-like color: harmonic `h` at `1 / h`.
fn voice(frame: &mut Frame, frequency: f64, harmonics: usize) -> Result<()> {
    let points: Vec<f64> = (1..=harmonics).map(|h| 1.0 / h as f64).collect();
    frame.set_frequency(frequency);
    frame.set_color(Envelope::make(frequency, &points)?.for_color());
    Ok(())
}

fn spawn_source(synth: &mut Synthesizer, panel: &Panel) -> Result<Live> {
    let mut frame = synth.new_frame();
    frame.set_amplitude(if panel.playing { 0.5 } else { 0.0 });
    voice(&mut frame, panel.frequency, panel.harmonics)?;
    let producer = StaticProducer::new(frame, panel.position);
    let handle = producer.handle();
    let id = synth.add_source(panel.position, producer);
    Ok(Live { id, handle })
}

fn apply(synth: &mut Synthesizer, live: &mut Live, command: Command) {
    match command {
        Command::Move(position) => live.handle.set_position(position),
        Command::Voice {
            frequency,
            harmonics,
        } => live.handle.edit_frame(|frame| {
            if let Err(err) = voice(frame, frequency, harmonics) {
                tracing::warn!(error = %err, "voice change rejected");
            }
        }),
        Command::Amplitude(amplitude) => live.handle.edit_frame(|f| f.set_amplitude(amplitude)),
        Command::Respawn => {
            let panel = Panel {
                position: live.handle.position(),
                frequency: live.handle.frame().frequency(),
                harmonics: live.handle.frame().color().size(),
                playing: live.handle.frame().amplitude() > 0.0,
            };
            match synth.remove_source(live.id) {
                Ok(removal) => tracing::info!(?removal, "source removed"),
                Err(err) => tracing::warn!(error = %err, "remove failed"),
            }
            match spawn_source(synth, &panel) {
                Ok(respawned) => *live = respawned,
                Err(err) => tracing::error!(error = %err, "respawn failed"),
            }
        }
    }
}

fn draw(panel: &Panel) -> Result<()> {
    let mut out = stdout();
    out.execute(crossterm::terminal::Clear(
        crossterm::terminal::ClearType::All,
    ))?;
    out.execute(crossterm::cursor::MoveTo(0, 0))?;
    write!(out, "Structured additive synthesis: one moving source\r\n\r\n")?;
    write!(
        out,
        "Position: x = {:+6.1} m, y = {:+6.1} m ({:.1} m away)\r\n",
        panel.position.x,
        panel.position.y,
        panel.position.distance()
    )?;
    write!(
        out,
        "Voice:    {:.1} Hz, {} harmonics, {}\r\n\r\n",
        panel.frequency,
        panel.harmonics,
        if panel.playing { "on" } else { "off" }
    )?;
    write!(out, "Arrows: move | +/-: pitch | H/h: harmonics | SPACE: on/off\r\n")?;
    write!(out, "D: remove and re-add | Q/ESC: quit\r\n")?;
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();

    let mut panel = Panel {
        position: Position::new(0.0, 4.0, 0.0),
        frequency: 220.0,
        harmonics: 8,
        playing: true,
    };

    let (producer, consumer) = common::sample_ring();
    let initial = panel;
    let renderer = Renderer::spawn(
        producer,
        move || {
            let mut synth = Synthesizer::new(SynthConfig::default())?;
            let live = spawn_source(&mut synth, &initial)?;
            Ok((synth, live))
        },
        apply,
    );

    run_interactive_demo(
        consumer,
        KeyboardConfig::default(),
        move || draw(&initial),
        |key_event: &KeyEvent| {
            if key_event.kind != KeyEventKind::Press {
                return Ok(KeyAction::Continue);
            }
            match key_event.code {
                code if is_quit_key(code) => return Ok(KeyAction::Exit),
                KeyCode::Left => panel.position.x -= 2.0,
                KeyCode::Right => panel.position.x += 2.0,
                KeyCode::Up => panel.position.y += 2.0,
                KeyCode::Down => panel.position.y -= 2.0,
                KeyCode::Char('+') | KeyCode::Char('=') => {
                    panel.frequency = (panel.frequency * 2f64.powf(1.0 / 12.0)).min(4000.0)
                }
                KeyCode::Char('-') => {
                    panel.frequency = (panel.frequency / 2f64.powf(1.0 / 12.0)).max(30.0)
                }
                KeyCode::Char('H') => panel.harmonics = (panel.harmonics + 1).min(MAX_HARMONICS),
                KeyCode::Char('h') => panel.harmonics = panel.harmonics.saturating_sub(1).max(1),
                KeyCode::Char(' ') => panel.playing = !panel.playing,
                KeyCode::Char('d') | KeyCode::Char('D') => {
                    renderer.send(Command::Respawn);
                    return Ok(KeyAction::Continue);
                }
                _ => return Ok(KeyAction::Continue),
            }

            match key_event.code {
                KeyCode::Left | KeyCode::Right | KeyCode::Up | KeyCode::Down => {
                    renderer.send(Command::Move(panel.position))
                }
                KeyCode::Char(' ') => {
                    renderer.send(Command::Amplitude(if panel.playing { 0.5 } else { 0.0 }))
                }
                _ => renderer.send(Command::Voice {
                    frequency: panel.frequency,
                    harmonics: panel.harmonics,
                }),
            }
            draw(&panel)?;
            Ok(KeyAction::Continue)
        },
    )
}
