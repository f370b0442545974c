// Tests for filter chain construction
//
// Stage order is fixed and the loudness parameters must appear verbatim.

use tonie_worker::pipeline::{ChainParams, FilterChain, FilterStage, Preset};

fn names(chain: &FilterChain) -> Vec<&'static str> {
    chain.stages().iter().map(FilterStage::name).collect()
}

#[test]
fn test_speech_chain_order() {
    let chain = FilterChain::build(&ChainParams::default());

    assert_eq!(
        names(&chain),
        vec!["highpass", "equalizer", "deesser", "acompressor", "loudnorm", "pan"]
    );
    assert_eq!(chain.stages()[0], FilterStage::HighPass { frequency_hz: 90.0 });
    assert_eq!(
        chain.stages()[3],
        FilterStage::Compressor {
            ratio: 2.0,
            threshold_db: -20.0
        }
    );
}

#[test]
fn test_non_speech_chain_starts_with_loudnorm() {
    for name in ["music", "audiobook", ""] {
        let chain = FilterChain::build(&ChainParams {
            preset: Preset::from_name(name),
            ..ChainParams::default()
        });

        assert_eq!(names(&chain)[0], "loudnorm", "preset {:?}", name);
        assert_eq!(chain.stages().len(), 2);
    }
}

#[test]
fn test_loudnorm_parameters_verbatim() {
    let chain = FilterChain::build(&ChainParams {
        target_lufs: -16.0,
        true_peak: -1.5,
        ..ChainParams::default()
    });

    let loudnorm = chain
        .stages()
        .iter()
        .find(|s| s.name() == "loudnorm")
        .unwrap()
        .to_string();

    assert!(loudnorm.contains("I=-16"), "{}", loudnorm);
    assert!(loudnorm.contains("TP=-1.5"), "{}", loudnorm);
    assert!(loudnorm.contains("dual_mono=true"), "{}", loudnorm);
}

#[test]
fn test_mono_flag_controls_single_trailing_downmix() {
    let mono = FilterChain::build(&ChainParams {
        mono: true,
        ..ChainParams::default()
    });
    let downmixes = mono
        .stages()
        .iter()
        .filter(|s| **s == FilterStage::Downmix)
        .count();
    assert_eq!(downmixes, 1);
    assert_eq!(mono.stages().last(), Some(&FilterStage::Downmix));
    assert!(mono.to_ffmpeg_expr().ends_with("pan=mono|c0=.5*c0+.5*c1"));

    let stereo = FilterChain::build(&ChainParams {
        mono: false,
        ..ChainParams::default()
    });
    assert!(!stereo.stages().contains(&FilterStage::Downmix));
    assert_eq!(names(&stereo).last(), Some(&"loudnorm"));
}

#[test]
fn test_build_is_deterministic() {
    let params = ChainParams {
        preset: Preset::Speech,
        target_lufs: -20.0,
        true_peak: -2.0,
        mono: false,
    };

    assert_eq!(FilterChain::build(&params), FilterChain::build(&params));
    assert_eq!(
        FilterChain::build(&params).to_ffmpeg_expr(),
        FilterChain::build(&params).to_ffmpeg_expr()
    );
}
