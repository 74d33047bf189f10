//! Frame producers: how sources obtain their frame and position each block.
//!
//! The synthesizer pulls from every source's [`FrameProducer`] exactly once
//! per block. A producer either hands out a frame and a position, or declines,
//! in which case the source keeps playing its previous targets.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::warn;

use crate::envelope::DefaultEnvelopes;
use crate::frame::Frame;
use crate::spectral::FrameSource;
use crate::synth::Position;

/// Supplies one frame and position per block.
///
/// Called on the render thread; implementations must not block.
pub trait FrameProducer {
    /// Returns this block's frame and position, or `None` to freeze the
    /// source. The frame is copied before the next call.
    fn next_frame(&mut self) -> Option<(&Frame, Position)>;
}

#[derive(Debug)]
struct StaticState {
    frame: Frame,
    position: Position,
}

/// Replays a host-controlled frame and position every block.
///
/// The host keeps a [`StaticHandle`] and edits the frame or moves the source
/// between calls to `synthesize`.
///
/// # Examples
///
/// ```
/// use sas_synth::{Envelope, Position, StaticProducer, SynthConfig, Synthesizer};
///
/// let mut synth = Synthesizer::new(SynthConfig::default()).unwrap();
/// let producer = StaticProducer::new(synth.new_frame(), Position::default());
/// let handle = producer.handle();
/// let id = synth.add_source(Position::default(), producer);
///
/// handle.edit_frame(|frame| {
///     frame.set_amplitude(0.5);
///     frame.set_frequency(220.0);
///     frame.set_color(Envelope::make(220.0, &[1.0]).unwrap().for_color());
/// });
/// handle.set_position(Position::new(2.0, 1.0, 0.0));
///
/// let mut block = [0.0; sas_synth::BLOCK_LEN];
/// synth.synthesize(&mut block);
/// assert!(synth.contains_source(id));
/// ```
#[derive(Debug)]
pub struct StaticProducer {
    state: Rc<RefCell<StaticState>>,
    current: Frame,
}

impl StaticProducer {
    pub fn new(frame: Frame, position: Position) -> Self {
        let current = frame.clone();
        Self {
            state: Rc::new(RefCell::new(StaticState { frame, position })),
            current,
        }
    }

    /// A handle for editing the frame and position from the host side.
    pub fn handle(&self) -> StaticHandle {
        StaticHandle {
            state: Rc::clone(&self.state),
        }
    }
}

impl FrameProducer for StaticProducer {
    fn next_frame(&mut self) -> Option<(&Frame, Position)> {
        let state = self.state.borrow();
        self.current.copy_from(&state.frame);
        let position = state.position;
        drop(state);
        Some((&self.current, position))
    }
}

/// Host-side control of a [`StaticProducer`].
#[derive(Debug, Clone)]
pub struct StaticHandle {
    state: Rc<RefCell<StaticState>>,
}

impl StaticHandle {
    /// Applies `edit` to the frame used from the next block on.
    pub fn edit_frame<F>(&self, edit: F)
    where
        F: FnOnce(&mut Frame),
    {
        edit(&mut self.state.borrow_mut().frame);
    }

    /// Replaces the frame.
    pub fn set_frame(&self, frame: Frame) {
        self.state.borrow_mut().frame = frame;
    }

    pub fn set_position(&self, position: Position) {
        self.state.borrow_mut().position = position;
    }

    pub fn position(&self) -> Position {
        self.state.borrow().position
    }

    /// Copy of the current frame.
    pub fn frame(&self) -> Frame {
        self.state.borrow().frame.clone()
    }
}

/// Steps through a [`FrameSource`], one frame per block.
///
/// Past the last frame the player either loops or keeps emitting a silent
/// copy of the last frame so the sound fades out. A failing frame source is
/// logged and the block declined.
#[derive(Debug)]
pub struct FramePlayer<S> {
    source: S,
    frame: Frame,
    position: Position,
    next: usize,
    looping: bool,
}

impl<S: FrameSource> FramePlayer<S> {
    pub fn new(source: S, position: Position, defaults: &DefaultEnvelopes) -> Self {
        Self {
            source,
            frame: Frame::new(defaults),
            position,
            next: 0,
            looping: false,
        }
    }

    /// Restart from the first frame after the last one.
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Sets the position reported from the next block on.
    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    /// Index of the next frame to be emitted.
    pub fn cursor(&self) -> usize {
        self.next
    }

    /// Whether a non-looping player has run past its last frame.
    pub fn is_finished(&self) -> bool {
        !self.looping && self.next >= self.source.frame_count()
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: FrameSource> FrameProducer for FramePlayer<S> {
    fn next_frame(&mut self) -> Option<(&Frame, Position)> {
        let count = self.source.frame_count();
        if self.next >= count {
            if self.looping && count > 0 {
                self.next = 0;
            } else {
                self.frame.set_amplitude(0.0);
                return Some((&self.frame, self.position));
            }
        }

        let index = self.next;
        self.next += 1;
        match self.source.frame_into(index, &mut self.frame) {
            Ok(()) => Some((&self.frame, self.position)),
            Err(err) => {
                warn!(index, error = %err, "frame source failed, holding previous frame");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, SynthError};

    /// Frames whose frequency is `100 * (index + 1)`; index 2 fails.
    struct Ramp {
        count: usize,
    }

    impl FrameSource for Ramp {
        fn frame_count(&self) -> usize {
            self.count
        }

        fn frame_into(&self, index: usize, dest: &mut Frame) -> Result<()> {
            if index == 2 {
                return Err(SynthError::FrameOutOfRange {
                    index,
                    count: self.count,
                });
            }
            dest.set_amplitude(1.0);
            dest.set_frequency(100.0 * (index + 1) as f64);
            Ok(())
        }
    }

    fn frequencies<P: FrameProducer>(producer: &mut P, blocks: usize) -> Vec<Option<f64>> {
        (0..blocks)
            .map(|_| producer.next_frame().map(|(f, _)| f.frequency()))
            .collect()
    }

    #[test]
    fn test_static_producer_follows_handle() {
        let defaults = DefaultEnvelopes::new();
        let mut producer = StaticProducer::new(Frame::new(&defaults), Position::default());
        let handle = producer.handle();

        let (frame, position) = producer.next_frame().unwrap();
        assert_eq!(frame.frequency(), 440.0);
        assert_eq!(position, Position::default());

        handle.edit_frame(|f| f.set_frequency(880.0));
        handle.set_position(Position::new(1.0, 2.0, 3.0));
        let (frame, position) = producer.next_frame().unwrap();
        assert_eq!(frame.frequency(), 880.0);
        assert_eq!(position, Position::new(1.0, 2.0, 3.0));
        assert_eq!(handle.position(), position);
    }

    #[test]
    fn test_player_declines_on_failure() {
        let defaults = DefaultEnvelopes::new();
        let mut player = FramePlayer::new(Ramp { count: 4 }, Position::default(), &defaults);
        assert_eq!(
            frequencies(&mut player, 4),
            vec![Some(100.0), Some(200.0), None, Some(400.0)]
        );
    }

    #[test]
    fn test_player_silent_after_end() {
        let defaults = DefaultEnvelopes::new();
        let mut player = FramePlayer::new(Ramp { count: 2 }, Position::default(), &defaults);
        player.next_frame();
        player.next_frame();
        assert!(player.is_finished());
        let (frame, _) = player.next_frame().unwrap();
        assert_eq!(frame.amplitude(), 0.0);
        assert_eq!(frame.frequency(), 200.0);
    }

    #[test]
    fn test_player_loops() {
        let defaults = DefaultEnvelopes::new();
        let mut player = FramePlayer::new(Ramp { count: 2 }, Position::default(), &defaults)
            .with_looping(true);
        assert_eq!(
            frequencies(&mut player, 5),
            vec![Some(100.0), Some(200.0), Some(100.0), Some(200.0), Some(100.0)]
        );
        assert!(!player.is_finished());
    }
}
