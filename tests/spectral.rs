use sas_synth::{
    BLOCK_LEN, FramePlayer, FrameSource, PartialTrack, Position, SpectralFrames, SynthConfig,
    Synthesizer,
};

fn spectrum(frames: usize) -> SpectralFrames {
    SpectralFrames::new(vec![
        PartialTrack::new(0, vec![300.0; frames], vec![0.4; frames]).unwrap(),
        PartialTrack::new(0, vec![600.0; frames], vec![0.2; frames]).unwrap(),
        PartialTrack::new(2, vec![900.0; frames - 2], vec![0.1; frames - 2]).unwrap(),
    ])
    .unwrap()
}

fn run(synth: &mut Synthesizer, blocks: usize) {
    let mut block = [0.0; BLOCK_LEN];
    for _ in 0..blocks {
        synth.synthesize(&mut block);
    }
}

#[test]
fn test_player_renders_partials() {
    let mut synth = Synthesizer::new(SynthConfig::default().with_seed(7)).unwrap();
    let player = FramePlayer::new(spectrum(10), Position::default(), synth.defaults());
    synth.add_source(Position::default(), player);

    run(&mut synth, 6);
    assert_eq!(synth.statistics().active_tracks, 3);

    // Past the last frame the source fades out.
    run(&mut synth, 10);
    assert_eq!(synth.statistics().active_tracks, 0);
}

#[test]
fn test_player_honours_harmonic_cap() {
    let mut synth = Synthesizer::new(SynthConfig::default().with_seed(7)).unwrap();
    let frames = spectrum(10).with_max_harmonics(2);
    assert_eq!(frames.frame_count(), 10);
    let player = FramePlayer::new(frames, Position::default(), synth.defaults());
    synth.add_source(Position::default(), player);

    run(&mut synth, 6);
    assert_eq!(synth.statistics().active_tracks, 2);
}

#[test]
fn test_looping_player_keeps_sounding() {
    let mut synth = Synthesizer::new(SynthConfig::default().with_seed(7)).unwrap();
    let player =
        FramePlayer::new(spectrum(8), Position::default(), synth.defaults()).with_looping(true);
    synth.add_source(Position::default(), player);

    run(&mut synth, 20);
    assert_eq!(synth.statistics().active_tracks, 3);
}
