use std::fmt;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, warn};

use super::partial::Partial;
use super::source::{Position, ScanContext, Source, SourceState};
use super::stats::Statistics;
use super::tracks::{TrackRef, TrackTable};
use crate::config::{Block, MIN_AMPLITUDE, STEP_SAMPLES, SynthConfig};
use crate::envelope::DefaultEnvelopes;
use crate::error::{Result, SynthError};
use crate::frame::Frame;
use crate::interpolation::StepKernel;
use crate::mask::{MaskEntry, Masker};
use crate::producer::FrameProducer;

/// Handle to a registered source.
///
/// Slots are reused after a source is reclaimed; the generation makes stale
/// handles fail instead of reaching the newer source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId {
    index: u32,
    generation: u32,
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// How a source removal was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The source had no partial in the active-track table and is gone.
    Immediate,
    /// The source is silenced and will be reclaimed once its last partial
    /// has faded out.
    Deferred,
}

#[derive(Default)]
struct SourceSlot {
    generation: u32,
    source: Option<Source>,
}

/// Real-time additive synthesizer.
///
/// Not `Send`: frames share envelopes through non-atomic reference counts, so
/// the synthesizer and everything feeding it live on one render thread.
///
/// # Examples
///
/// ```
/// use sas_synth::{BLOCK_LEN, Envelope, Position, StaticProducer, SynthConfig, Synthesizer};
///
/// let mut synth = Synthesizer::new(SynthConfig::default().with_seed(1)).unwrap();
///
/// let mut frame = synth.new_frame();
/// frame.set_amplitude(0.5);
/// frame.set_frequency(440.0);
/// frame.set_color(Envelope::make(440.0, &[1.0]).unwrap().for_color());
/// synth.add_source(Position::default(), StaticProducer::new(frame, Position::default()));
///
/// let mut block = [0.0; BLOCK_LEN];
/// for _ in 0..4 {
///     synth.synthesize(&mut block);
/// }
/// assert_eq!(synth.statistics().active_tracks, 1);
/// assert!(block.iter().any(|s| s.abs() > 0.1));
/// ```
pub struct Synthesizer {
    config: SynthConfig,
    defaults: DefaultEnvelopes,
    slots: Vec<SourceSlot>,
    free_slots: Vec<usize>,
    number_of_sources: usize,
    amplitude_factor: f64,
    tracks: TrackTable,
    masker: Masker,
    kernel: StepKernel,
    rng: StdRng,
    stats: Statistics,
}

impl Synthesizer {
    /// Creates a synthesizer with every capacity allocated up front.
    ///
    /// # Errors
    ///
    /// Returns [`SynthError::InvalidConfig`] when `config` fails validation.
    pub fn new(config: SynthConfig) -> Result<Self> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let masker = Masker::new(config.max_tracks, StdRng::seed_from_u64(rng.next_u64()));

        debug!(
            max_tracks = config.max_tracks,
            max_partials_per_source = config.max_partials_per_source,
            history = config.max_propagated_frames(),
            "synthesizer created"
        );

        Ok(Self {
            tracks: TrackTable::new(config.max_tracks),
            masker,
            defaults: DefaultEnvelopes::new(),
            slots: Vec::new(),
            free_slots: Vec::new(),
            number_of_sources: 0,
            amplitude_factor: 0.0,
            kernel: StepKernel::new(),
            rng,
            stats: Statistics::default(),
            config,
        })
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    /// The pinned default envelopes.
    pub fn defaults(&self) -> &DefaultEnvelopes {
        &self.defaults
    }

    /// A silent 440 Hz frame using the default envelopes.
    pub fn new_frame(&self) -> Frame {
        Frame::new(&self.defaults)
    }

    /// Registers a source at `position` fed by `producer`.
    pub fn add_source<P>(&mut self, position: Position, producer: P) -> SourceId
    where
        P: FrameProducer + 'static,
    {
        let source = Source::new(position, Box::new(producer), &self.config, &self.defaults);

        let index = match self.free_slots.pop() {
            Some(index) => index,
            None => {
                self.slots.push(SourceSlot::default());
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        slot.source = Some(source);
        let id = SourceId {
            index: index as u32,
            generation: slot.generation,
        };

        self.number_of_sources += 1;
        self.update_amplitude_factor();
        debug!(source = %id, sources = self.number_of_sources, "source registered");
        id
    }

    /// Unregisters a source.
    ///
    /// A source with partials still in the active-track table is silenced
    /// and reclaimed once they have faded out.
    ///
    /// # Errors
    ///
    /// [`SynthError::UnknownSource`] for a stale or foreign id,
    /// [`SynthError::RemovalPending`] if the source is already being removed.
    pub fn remove_source(&mut self, id: SourceId) -> Result<Removal> {
        let source = self.source_mut(id).ok_or(SynthError::UnknownSource(id))?;
        if source.is_pending_removal() {
            return Err(SynthError::RemovalPending(id));
        }

        if source.linked() == 0 {
            self.release(id.index as usize);
            Ok(Removal::Immediate)
        } else {
            source.schedule_removal();
            debug!(source = %id, linked = source.linked(), "source removal deferred");
            Ok(Removal::Deferred)
        }
    }

    /// Whether `id` still refers to a registered source.
    pub fn contains_source(&self, id: SourceId) -> bool {
        self.source(id).is_some()
    }

    /// Last position reported for the source.
    pub fn source_position(&self, id: SourceId) -> Option<Position> {
        self.source(id).map(Source::position)
    }

    /// Spatialization and partial counts of the source.
    pub fn source_state(&self, id: SourceId) -> Option<SourceState> {
        self.source(id).map(Source::state)
    }

    pub fn number_of_sources(&self) -> usize {
        self.number_of_sources
    }

    /// Gain applied to every source: `1 / (log2(n) + 1)` for `n` sources.
    pub fn amplitude_factor(&self) -> f64 {
        self.amplitude_factor
    }

    /// Counters of the last block.
    pub fn statistics(&self) -> Statistics {
        Statistics {
            number_of_sources: self.number_of_sources,
            ..self.stats
        }
    }

    /// Drops every source at once, together with all active tracks.
    pub fn clear(&mut self) {
        self.tracks.clear();
        for index in 0..self.slots.len() {
            self.release(index);
        }
        self.stats = Statistics::default();
    }

    /// Computes the next block into `out` (interleaved `L, R`).
    pub fn synthesize(&mut self, out: &mut Block) {
        out.fill(0.0);

        let dropped = self.update_sources();
        self.update_tracks();
        let masked = self.update_mask();
        self.render(out);

        self.stats = Statistics {
            number_of_sources: self.number_of_sources,
            active_tracks: self.tracks.len(),
            masked_tracks: masked,
            audible_tracks: self.tracks.audible().len() - masked,
            dropped_tracks: dropped,
        };
    }

    fn update_sources(&mut self) -> usize {
        let mut dropped = 0;

        for index in 0..self.slots.len() {
            let reclaim = {
                let Some(source) = self.slots[index].source.as_mut() else {
                    continue;
                };
                let ctx = ScanContext {
                    threshold: self.defaults.audibility_threshold(),
                    amplitude_factor: self.amplitude_factor,
                    max_distance: self.config.max_propagation_distance,
                    sound_speed: self.config.sound_speed,
                    smoothing: self.config.smoothing,
                };
                let scan = source.scan(&ctx);
                dropped += source.advance(index, scan, &mut self.tracks, &mut self.rng);
                source.is_pending_removal() && source.linked() == 0
            };

            if reclaim {
                self.release(index);
            }
        }

        if dropped > 0 {
            warn!(
                dropped,
                capacity = self.tracks.capacity(),
                "active-track table full, partials held back"
            );
        }
        dropped
    }

    fn update_tracks(&mut self) {
        let slots = &mut self.slots;
        self.tracks.compact(|track, slot| {
            if let Some(partial) = partial_mut(slots, track) {
                partial.link = Some(slot);
            }
        });

        let slots = &self.slots;
        self.tracks
            .collect_audible(|track| partial(slots, track).map_or(0.0, |p| p.amplitude));
    }

    fn update_mask(&mut self) -> usize {
        self.masker.reset();
        let mut masked = 0;

        for &(track, amplitude) in self.tracks.audible() {
            let Some(source) = self.slots[track.source].source.as_mut() else {
                continue;
            };
            let (left, right) = (source.left(), source.right());
            let partial = &mut source.partials[track.partial];

            let entry = MaskEntry::new(partial.frequency, amplitude, left, right);
            if self.masker.is_masked(entry) {
                partial.mute_latest();
                masked += 1;
            }
        }
        masked
    }

    fn render(&mut self, out: &mut Block) {
        for track in self.tracks.iter() {
            let Some(source) = self.slots[track.source].source.as_mut() else {
                continue;
            };
            let (left, right) = (source.left(), source.right());
            let partial = &mut source.partials[track.partial];

            let amplitudes = self.kernel.expand(&partial.amplitudes);
            let frequencies = self.kernel.expand(&partial.frequencies);

            for (step, chunk) in out.chunks_exact_mut(2 * STEP_SAMPLES).enumerate() {
                let (from, to) = (amplitudes[step], amplitudes[step + 1]);
                let frequency = frequencies[step];
                if from < MIN_AMPLITUDE && to < MIN_AMPLITUDE {
                    partial.rotor.skip(frequency, STEP_SAMPLES);
                } else {
                    partial.rotor.render(frequency, from, to, left, right, chunk);
                }
            }
        }
    }

    fn source(&self, id: SourceId) -> Option<&Source> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.source.as_ref()
    }

    fn source_mut(&mut self, id: SourceId) -> Option<&mut Source> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.source.as_mut()
    }

    fn release(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        if slot.source.take().is_none() {
            return;
        }
        let id = SourceId {
            index: index as u32,
            generation: slot.generation,
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push(index);

        self.number_of_sources -= 1;
        self.update_amplitude_factor();
        debug!(source = %id, sources = self.number_of_sources, "source reclaimed");
    }

    fn update_amplitude_factor(&mut self) {
        self.amplitude_factor = if self.number_of_sources == 0 {
            0.0
        } else {
            1.0 / ((self.number_of_sources as f64).log2() + 1.0)
        };
    }
}

impl fmt::Debug for Synthesizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synthesizer")
            .field("config", &self.config)
            .field("number_of_sources", &self.number_of_sources)
            .field("amplitude_factor", &self.amplitude_factor)
            .field("stats", &self.stats)
            .finish()
    }
}

fn partial(slots: &[SourceSlot], track: TrackRef) -> Option<&Partial> {
    slots
        .get(track.source)?
        .source
        .as_ref()?
        .partials
        .get(track.partial)
}

fn partial_mut(slots: &mut [SourceSlot], track: TrackRef) -> Option<&mut Partial> {
    slots
        .get_mut(track.source)?
        .source
        .as_mut()?
        .partials
        .get_mut(track.partial)
}
