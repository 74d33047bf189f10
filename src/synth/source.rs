use std::f64::consts::TAU;

use rand::Rng;
use rand::rngs::StdRng;
use tracing::{error, warn};

use super::partial::Partial;
use super::tracks::{TrackRef, TrackTable};
use crate::config::{BLOCK_RATE, MAX_AUDIBLE_FREQUENCY, SynthConfig};
use crate::envelope::{DefaultEnvelopes, Envelope};
use crate::frame::Frame;
use crate::producer::FrameProducer;

/// Listener-relative position in meters. The listener faces +y with +x to
/// the right.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Whether every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Distance to the listener.
    pub fn distance(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Read-only snapshot of a source's spatialization and partial counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceState {
    pub position: Position,
    pub distance: f64,
    pub left: f64,
    pub right: f64,
    pub doppler: f64,
    pub active_partials: usize,
    pub linked_partials: usize,
    pub pending_removal: bool,
}

/// Per-block values shared by every source update.
pub(crate) struct ScanContext<'a> {
    pub threshold: &'a Envelope,
    pub amplitude_factor: f64,
    pub max_distance: f64,
    pub sound_speed: f64,
    pub smoothing: f64,
}

/// Outcome of a harmonic scan: how many partials continue and how many are
/// audible this block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Scan {
    pub active: usize,
    pub harmonics: usize,
}

/// A sound source: frame history, spatialization and its partials.
pub(crate) struct Source {
    producer: Box<dyn FrameProducer>,
    history: Vec<Frame>,
    emission: usize,
    position: Position,
    distance: f64,
    cos_angle: f64,
    left: f64,
    right: f64,
    doppler: f64,
    pub partials: Vec<Partial>,
    active: usize,
    linked: usize,
    pending_removal: bool,
}

impl Source {
    pub fn new(
        position: Position,
        producer: Box<dyn FrameProducer>,
        config: &SynthConfig,
        defaults: &DefaultEnvelopes,
    ) -> Self {
        let position = if position.is_finite() {
            position
        } else {
            warn!(?position, "non-finite source position, placing at the listener");
            Position::default()
        };
        let distance = position.distance();
        let mut source = Self {
            producer,
            history: vec![Frame::new(defaults); config.max_propagated_frames()],
            emission: 0,
            position,
            distance,
            cos_angle: if distance > 0.0 {
                position.x / distance
            } else {
                0.0
            },
            left: 0.5,
            right: 0.5,
            doppler: 1.0,
            partials: vec![Partial::new(); config.max_partials_per_source],
            active: 0,
            linked: 0,
            pending_removal: false,
        };
        source.update_spatial(config.smoothing, config.sound_speed);
        source
    }

    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn right(&self) -> f64 {
        self.right
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn linked(&self) -> usize {
        self.linked
    }

    pub fn is_pending_removal(&self) -> bool {
        self.pending_removal
    }

    pub fn state(&self) -> SourceState {
        SourceState {
            position: self.position,
            distance: self.distance,
            left: self.left,
            right: self.right,
            doppler: self.doppler,
            active_partials: self.active,
            linked_partials: self.linked,
            pending_removal: self.pending_removal,
        }
    }

    /// Silences the whole history and stops pulling frames. The partials
    /// fade out over the following blocks.
    pub fn schedule_removal(&mut self) {
        for frame in &mut self.history {
            frame.set_amplitude(0.0);
        }
        self.pending_removal = true;
    }

    fn update_spatial(&mut self, alpha: f64, sound_speed: f64) {
        let previous = self.distance;
        self.distance = self.position.distance();

        let cos_target = if self.distance > 0.0 {
            self.position.x / self.distance
        } else {
            0.0
        };
        self.cos_angle = (1.0 - alpha) * self.cos_angle + alpha * cos_target;

        let pan = self.cos_angle.exp2();
        self.right = 0.5 * pan;
        self.left = 0.5 / pan;

        let speed = (self.distance - previous) * BLOCK_RATE;
        let doppler_target = if speed.abs() <= sound_speed {
            (sound_speed - speed) / sound_speed
        } else {
            1.0
        };
        self.doppler = (1.0 - alpha) * self.doppler + alpha * doppler_target;
    }

    /// Pulls this block's frame and computes the partial targets.
    pub fn scan(&mut self, ctx: &ScanContext<'_>) -> Scan {
        let silent = Scan {
            active: 0,
            harmonics: 0,
        };
        if self.pending_removal {
            return silent;
        }

        let Some((frame, position)) = self.producer.next_frame() else {
            return Scan {
                active: self.active,
                harmonics: 0,
            };
        };
        self.history[self.emission].copy_from(frame);
        if position.is_finite() {
            self.position = position;
        } else {
            warn!(?position, "non-finite source position ignored");
        }
        self.update_spatial(ctx.smoothing, ctx.sound_speed);

        if self.distance >= ctx.max_distance {
            return silent;
        }

        let depth = self.history.len();
        let delay = (self.distance * depth as f64 / ctx.max_distance) as usize;
        let heard = &self.history[(self.emission + delay) % depth];

        let frame_amplitude = heard.amplitude();
        if frame_amplitude == 0.0 {
            return silent;
        }
        let fundamental = heard.frequency();
        let color = heard.color();
        let warp = heard.warp();

        let mut sum = 0.0;
        let mut harmonics = 0;
        for (i, partial) in self.partials.iter_mut().enumerate() {
            let nominal = fundamental * (i + 1) as f64;
            if nominal >= MAX_AUDIBLE_FREQUENCY {
                break;
            }

            partial.frequency = warp.value_at(nominal);
            partial.amplitude = if partial.frequency < MAX_AUDIBLE_FREQUENCY {
                let a = color.value_at(partial.frequency);
                if a * frame_amplitude < ctx.threshold.value_at(partial.frequency) {
                    0.0
                } else {
                    sum += a;
                    harmonics = i + 1;
                    a
                }
            } else {
                0.0
            };
        }

        let normalization = if harmonics > 0 && sum > 0.0 {
            frame_amplitude / sum
        } else {
            0.0
        };
        let scale = normalization * ctx.amplitude_factor;

        for partial in &mut self.partials[..harmonics] {
            partial.amplitude *= scale * attenuation(partial.frequency, self.distance);
            partial.frequency *= self.doppler;
        }

        Scan {
            active: harmonics.min(self.active),
            harmonics,
        }
    }

    /// Runs the partial lifecycle for this block and steps the history.
    ///
    /// `slot` is this source's index in the synthesizer. Returns the number of
    /// partials that could not enter the full track table.
    pub fn advance(
        &mut self,
        slot: usize,
        scan: Scan,
        tracks: &mut TrackTable,
        rng: &mut StdRng,
    ) -> usize {
        let Scan { active, harmonics } = scan;
        let previous_active = self.active;
        let mut links = 0isize;
        let mut births = 0;
        let mut deaths = 0;
        let mut dropped = 0;

        let mut i = 0;

        // Still active.
        while i < active {
            let p = &mut self.partials[i];
            p.state += 1;
            if p.link.is_some() {
                p.push_targets();
            } else {
                match p.state {
                    1 => p.push_targets(),
                    2 => {
                        let track = TrackRef {
                            source: slot,
                            partial: i,
                        };
                        p.push_targets();
                        if let Some(link) = tracks.push(track) {
                            p.seed(rng.gen_range(0.0..TAU));
                            p.link = Some(link);
                            links += 1;
                        } else {
                            // Stays young and retries next block.
                            p.state = 1;
                            dropped += 1;
                        }
                    }
                    state => {
                        error!(source = slot, partial = i, state, "unlinked adult partial");
                        panic!("partial {i} of source {slot} is adult (state {state}) but unlinked");
                    }
                }
            }
            i += 1;
        }

        // Born: fade in from silence.
        while i < harmonics {
            let p = &mut self.partials[i];
            p.state = 0;
            p.push(0.0, p.frequency);
            births += 1;
            i += 1;
        }

        // Dead this block: fade out.
        while i < previous_active {
            let p = &mut self.partials[i];
            p.state = 0;
            p.amplitude = 0.0;
            p.push_targets();
            deaths += 1;
            i += 1;
        }

        // Dying: leave the table two blocks after death.
        while i < self.linked {
            let p = &mut self.partials[i];
            p.state -= 1;
            if p.state == -2 {
                if let Some(link) = p.link.take() {
                    tracks.close(link);
                    links -= 1;
                }
            } else {
                let a = p.extrapolated_amplitude();
                p.push(a, p.frequency);
            }
            i += 1;
        }

        self.active = self.active + births - deaths;
        self.linked = self.linked.saturating_add_signed(links);
        self.emission = self
            .emission
            .checked_sub(1)
            .unwrap_or(self.history.len() - 1);

        dropped
    }
}

/// Air absorption and spherical spreading at `distance` meters
/// (Evans and Bazley, 20°C, 50% humidity).
pub(crate) fn attenuation(frequency: f64, distance: f64) -> f64 {
    let humidity = 50.0;
    let khz = frequency / 1000.0;
    let mu = (85.0 / humidity) * khz * khz * 0.0001 * 8.7;
    (-mu * distance).exp() / (distance + 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    use crate::producer::StaticProducer;

    struct Silent;

    impl FrameProducer for Silent {
        fn next_frame(&mut self) -> Option<(&Frame, Position)> {
            None
        }
    }

    #[test]
    fn test_attenuation() {
        assert_eq!(attenuation(1000.0, 0.0), 1.0);
        assert!((attenuation(0.0, 1.0) - 0.5).abs() < 1e-12);
        assert!(attenuation(10000.0, 100.0) < attenuation(100.0, 100.0));
    }

    #[test]
    fn test_centered_source_pans_evenly() {
        let defaults = DefaultEnvelopes::new();
        let config = SynthConfig::default().with_max_partials_per_source(4);
        let source = Source::new(Position::new(0.0, 10.0, 0.0), Box::new(Silent), &config, &defaults);
        assert!((source.left() - 0.5).abs() < 1e-12);
        assert!((source.right() - 0.5).abs() < 1e-12);
        assert_eq!(source.state().doppler, 1.0);
    }

    #[test]
    fn test_right_source_is_louder_right() {
        let defaults = DefaultEnvelopes::new();
        let config = SynthConfig::default().with_max_partials_per_source(4);
        let source = Source::new(Position::new(10.0, 0.0, 0.0), Box::new(Silent), &config, &defaults);
        assert!(source.right() > source.left());
        assert!((source.left() * source.right() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_position_ignored() {
        let defaults = DefaultEnvelopes::new();
        let config = SynthConfig::default().with_max_partials_per_source(4);
        let start = Position::new(3.0, 4.0, 0.0);
        let producer = StaticProducer::new(Frame::new(&defaults), start);
        let handle = producer.handle();
        let mut source = Source::new(start, Box::new(producer), &config, &defaults);
        let ctx = ScanContext {
            threshold: defaults.audibility_threshold(),
            amplitude_factor: 1.0,
            max_distance: config.max_propagation_distance,
            sound_speed: config.sound_speed,
            smoothing: config.smoothing,
        };

        for bad in [
            Position::new(f64::NAN, 1.0, 0.0),
            Position::new(0.0, f64::INFINITY, 0.0),
            Position::new(0.0, 0.0, f64::NEG_INFINITY),
        ] {
            handle.set_position(bad);
            source.scan(&ctx);
            let state = source.state();
            assert_eq!(state.position, start);
            assert_eq!(state.distance, 5.0);
            assert!(state.left.is_finite() && state.right.is_finite());
            assert!(state.doppler.is_finite());
        }

        let placed = Source::new(
            Position::new(f64::NAN, 0.0, 0.0),
            Box::new(Silent),
            &config,
            &defaults,
        );
        assert_eq!(placed.position(), Position::default());
        assert!(placed.left().is_finite());
    }

    #[test]
    fn test_declined_update_freezes() {
        let defaults = DefaultEnvelopes::new();
        let config = SynthConfig::default().with_max_partials_per_source(4);
        let mut source = Source::new(Position::default(), Box::new(Silent), &config, &defaults);
        source.active = 3;
        let ctx = ScanContext {
            threshold: defaults.audibility_threshold(),
            amplitude_factor: 1.0,
            max_distance: config.max_propagation_distance,
            sound_speed: config.sound_speed,
            smoothing: config.smoothing,
        };
        assert_eq!(
            source.scan(&ctx),
            Scan {
                active: 3,
                harmonics: 0
            }
        );
    }

    #[test]
    fn test_emission_steps_backwards() {
        let defaults = DefaultEnvelopes::new();
        let config = SynthConfig::default()
            .with_max_partials_per_source(4)
            .with_max_propagation_distance(35.0);
        let frame = Frame::new(&defaults);
        let mut source = Source::new(
            Position::default(),
            Box::new(StaticProducer::new(frame, Position::default())),
            &config,
            &defaults,
        );
        let depth = config.max_propagated_frames();
        let mut tracks = TrackTable::new(4);
        let mut rng = StdRng::seed_from_u64(0);
        let idle = Scan {
            active: 0,
            harmonics: 0,
        };

        source.advance(0, idle, &mut tracks, &mut rng);
        assert_eq!(source.emission, depth - 1);
        source.advance(0, idle, &mut tracks, &mut rng);
        assert_eq!(source.emission, depth - 2);
    }

    #[test]
    fn test_lifecycle_links_on_third_block() {
        let defaults = DefaultEnvelopes::new();
        let config = SynthConfig::default().with_max_partials_per_source(2);
        let mut source = Source::new(Position::default(), Box::new(Silent), &config, &defaults);
        let mut tracks = TrackTable::new(8);
        let mut rng = StdRng::seed_from_u64(0);
        let one = |active| Scan {
            active,
            harmonics: 1,
        };

        source.partials[0].amplitude = 0.5;
        source.advance(3, one(0), &mut tracks, &mut rng);
        assert_eq!((source.active, source.linked), (1, 0));
        source.advance(3, one(1), &mut tracks, &mut rng);
        assert_eq!(source.linked, 0);
        source.advance(3, one(1), &mut tracks, &mut rng);
        assert_eq!(source.linked, 1);
        assert_eq!(
            tracks.get(0),
            Some(TrackRef {
                source: 3,
                partial: 0
            })
        );
        assert_eq!(source.partials[0].link, Some(0));
        assert_eq!(source.partials[0].amplitudes, [-0.5, 0.0, 0.5, 0.5]);
    }

    #[test]
    fn test_full_table_retries() {
        let defaults = DefaultEnvelopes::new();
        let config = SynthConfig::default().with_max_partials_per_source(2);
        let mut source = Source::new(Position::default(), Box::new(Silent), &config, &defaults);
        let mut tracks = TrackTable::new(1);
        tracks.push(TrackRef {
            source: 9,
            partial: 0,
        });
        let mut rng = StdRng::seed_from_u64(0);
        let one = |active| Scan {
            active,
            harmonics: 1,
        };

        source.advance(0, one(0), &mut tracks, &mut rng);
        source.advance(0, one(1), &mut tracks, &mut rng);
        assert_eq!(source.advance(0, one(1), &mut tracks, &mut rng), 1);
        assert_eq!(source.partials[0].state, 1);
        // Still full: dropped again rather than tripping the adult check.
        assert_eq!(source.advance(0, one(1), &mut tracks, &mut rng), 1);

        tracks.close(0);
        tracks.compact(|_, _| {});
        assert_eq!(source.advance(0, one(1), &mut tracks, &mut rng), 0);
        assert_eq!(source.linked, 1);
    }
}
