//! Property-based tests for filter design, convolution and analysis
//!
//! Randomized specs and signals via proptest; generated specs stay short
//! enough for the property checks to run quickly.

use firscope::filters::design::{magnitude_response_db, MAX_FILTER_LENGTH};
use firscope::filters::fast_fir::DIRECT_FORM_MAX_TAPS;
use firscope::filters::{
    design_filter, generate_window, ConvolutionEngine, DesignError, FilterSpec, FilterType,
    WindowType,
};
use firscope::spectrum::{WaterfallHistory, WATERFALL_CAPACITY};
use proptest::prelude::*;
use std::f64::consts::PI;
use std::sync::Arc;

fn window_strategy() -> impl Strategy<Value = WindowType> {
    prop_oneof![
        Just(WindowType::Rectangular),
        Just(WindowType::Hann),
        Just(WindowType::Hamming),
        Just(WindowType::Blackman),
    ]
}

/// Any valid spec: bandpass edges at least 0.05 apart, widths that keep
/// Blackman under the length limit
fn spec_strategy() -> impl Strategy<Value = FilterSpec> {
    (
        0usize..3,
        0.05f64..0.45,
        0.05f64..0.5,
        0.02f64..1.0,
        window_strategy(),
    )
        .prop_map(|(kind, c1, gap, width, window)| match kind {
            0 => FilterSpec::lowpass(c1 + gap, width, window),
            1 => FilterSpec::highpass(c1, width, window),
            _ => FilterSpec::bandpass(c1, c1 + gap, width, window),
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Every design is odd-length, within limits, and has delay (N-1)/2.
    #[test]
    fn design_length_is_odd_with_integer_delay(spec in spec_strategy()) {
        let coefficients = design_filter(&spec).unwrap();
        let n = coefficients.len();

        prop_assert_eq!(n % 2, 1, "even length {} for {:?}", n, spec);
        prop_assert!((3..=MAX_FILTER_LENGTH).contains(&n));
        prop_assert_eq!(coefficients.group_delay(), (n - 1) as f64 / 2.0);
        prop_assert_eq!(spec.filter_length().unwrap(), n);
    }

    /// Linear phase: taps mirror around the center.
    #[test]
    fn design_taps_are_symmetric(spec in spec_strategy()) {
        let coefficients = design_filter(&spec).unwrap();
        let taps = coefficients.taps();

        for i in 0..taps.len() / 2 {
            prop_assert!(
                (taps[i] - taps[taps.len() - 1 - i]).abs() < 1e-12,
                "tap {} differs from its mirror for {:?}", i, spec
            );
        }
        prop_assert!(taps.iter().all(|t| t.is_finite()));
    }

    /// A narrower transition never yields a shorter filter.
    #[test]
    fn length_shrinks_as_transition_widens(
        narrow in 0.02f64..0.5,
        extra in 0.0f64..0.5,
        window in window_strategy(),
    ) {
        let narrow_len = FilterSpec::lowpass(0.5, narrow, window).filter_length().unwrap();
        let wide_len = FilterSpec::lowpass(0.5, narrow + extra, window).filter_length().unwrap();
        prop_assert!(narrow_len >= wide_len, "{} < {}", narrow_len, wide_len);
    }

    /// Wider mainlobes need more taps for the same transition width.
    #[test]
    fn length_orders_by_window(width in 0.02f64..1.0) {
        let length = |window| FilterSpec::bandpass(0.4, 0.6, width, window).filter_length().unwrap();

        let rect = length(WindowType::Rectangular);
        let hann = length(WindowType::Hann);
        let hamming = length(WindowType::Hamming);
        let blackman = length(WindowType::Blackman);

        prop_assert!(rect < hann);
        prop_assert!(hann <= hamming);
        prop_assert!(hamming < blackman);
    }

    /// Hamming bandpass passes its band center within half a dB.
    #[test]
    fn bandpass_passes_band_center(
        c1 in 0.1f64..0.5,
        band in 0.2f64..0.4,
        width in 0.05f64..0.3,
    ) {
        let coefficients =
            design_filter(&FilterSpec::bandpass(c1, c1 + band, width, WindowType::Hamming)).unwrap();
        let center = magnitude_response_db(coefficients.taps(), &[c1 + band / 2.0])[0];
        prop_assert!(center.abs() < 0.5, "center gain {} dB", center);
    }

    /// Generated windows are symmetric and peak at or below one.
    #[test]
    fn windows_are_symmetric(window in window_strategy(), length in 1usize..512) {
        let w = generate_window(window, length);

        prop_assert_eq!(w.len(), length);
        for i in 0..length {
            prop_assert!((w[i] - w[length - 1 - i]).abs() < 1e-12);
            prop_assert!(w[i] <= 1.0 + 1e-12);
        }
    }

    /// Output does not depend on how the stream is cut into blocks.
    #[test]
    fn convolution_is_block_size_invariant(
        signal in prop::collection::vec(-1.0f64..1.0, 64..512),
        block in 1usize..97,
        window in window_strategy(),
    ) {
        let coefficients =
            Arc::new(design_filter(&FilterSpec::lowpass(0.3, 0.4, window)).unwrap());

        let mut whole = ConvolutionEngine::new(Arc::clone(&coefficients));
        let mut reference = signal.clone();
        whole.process_block_inplace(&mut reference);

        let mut chunked = ConvolutionEngine::new(coefficients);
        let mut output = signal.clone();
        for chunk in output.chunks_mut(block) {
            chunked.process_block_inplace(chunk);
        }

        for (i, (a, b)) in reference.iter().zip(&output).enumerate() {
            prop_assert!((a - b).abs() < 1e-12, "sample {}: {} vs {}", i, a, b);
        }
    }

    /// Long filters on the FFT path match direct form for any block cut.
    #[test]
    fn fft_convolution_matches_direct_form(
        signal in prop::collection::vec(-1.0f64..1.0, 300..1200),
        block in 1usize..400,
        max_block in 16usize..300,
        width in 0.03f64..0.09,
    ) {
        let coefficients =
            Arc::new(design_filter(&FilterSpec::lowpass(0.3, width, WindowType::Hann)).unwrap());
        prop_assume!(coefficients.len() > DIRECT_FORM_MAX_TAPS);

        let taps = coefficients.taps();
        let expected: Vec<f64> = (0..signal.len())
            .map(|n| {
                taps.iter().enumerate().take(n + 1).map(|(k, h)| h * signal[n - k]).sum()
            })
            .collect();

        let mut engine = ConvolutionEngine::with_block_size(Arc::clone(&coefficients), max_block);
        prop_assert!(engine.uses_fft());
        let mut output = signal.clone();
        for chunk in output.chunks_mut(block) {
            engine.process_block_inplace(chunk);
        }

        for (i, (a, b)) in expected.iter().zip(&output).enumerate() {
            prop_assert!((a - b).abs() < 1e-9, "sample {}: {} vs {}", i, a, b);
        }
    }

    /// Waterfall keeps the newest rows, up to its capacity.
    #[test]
    fn waterfall_keeps_newest_rows(pushes in 0usize..450) {
        let mut history = WaterfallHistory::new(4);
        for i in 0..pushes {
            history.push(&[i as f64; 4]);
        }

        prop_assert_eq!(history.len(), pushes.min(WATERFALL_CAPACITY));
        let first = pushes.saturating_sub(WATERFALL_CAPACITY);
        for (offset, row) in history.rows().enumerate() {
            prop_assert_eq!(row[0], (first + offset) as f64);
        }
    }
}

#[test]
fn part_a_reference_lengths() {
    for (window, expected) in [
        (WindowType::Rectangular, 81),
        (WindowType::Hann, 161),
        (WindowType::Hamming, 161),
        (WindowType::Blackman, 241),
    ] {
        let coefficients = design_filter(&FilterSpec::from_part_a(window)).unwrap();
        assert_eq!(coefficients.len(), expected, "{}", window);
        assert_eq!(coefficients.group_delay(), ((expected - 1) / 2) as f64);
    }
}

#[test]
fn part_a_hamming_rejects_stopband() {
    let coefficients = design_filter(&FilterSpec::from_part_a(WindowType::Hamming)).unwrap();
    let response = magnitude_response_db(coefficients.taps(), &[0.1, 0.5, 0.9]);

    assert!(response[0] < -40.0, "low stopband {} dB", response[0]);
    assert!(response[1].abs() < 0.5, "passband {} dB", response[1]);
    assert!(response[2] < -40.0, "high stopband {} dB", response[2]);
}

#[test]
fn highpass_blocks_dc_and_passes_nyquist() {
    let coefficients =
        design_filter(&FilterSpec::highpass(0.5, 0.1 * PI, WindowType::Blackman)).unwrap();
    let response = magnitude_response_db(coefficients.taps(), &[0.0, 1.0]);

    assert!(response[0] < -60.0);
    assert!(response[1].abs() < 0.1);
}

#[test]
fn invalid_specs_are_rejected() {
    let bad = [
        FilterSpec::bandpass(0.6, 0.4, 0.1, WindowType::Hann),
        FilterSpec::bandpass(0.4, 0.4, 0.1, WindowType::Hann),
        FilterSpec::lowpass(1.5, 0.1, WindowType::Hann),
        FilterSpec::lowpass(0.5, 0.0, WindowType::Hann),
        FilterSpec::lowpass(0.5, -0.1, WindowType::Hann),
        FilterSpec::lowpass(f64::NAN, 0.1, WindowType::Hann),
        FilterSpec::new(FilterType::Bandpass, 0.5, 0.5, 1e-4, WindowType::Blackman),
    ];
    for spec in bad {
        assert!(
            matches!(design_filter(&spec), Err(DesignError::InvalidSpec(_))),
            "{:?} accepted",
            spec
        );
    }
}

#[test]
fn narrow_transitions_design_long_filters() {
    // 1e-4 rad with Blackman: ~377k taps, past what the engine holds
    let spec = FilterSpec::new(FilterType::Lowpass, 0.0, 0.5, 1e-4, WindowType::Blackman);
    assert!(matches!(design_filter(&spec), Err(DesignError::TooLong { .. })));

    for (spec, taps) in [
        (FilterSpec::lowpass(0.25, 0.002 * PI, WindowType::Blackman), 6001),
        (FilterSpec::bandpass(0.4, 0.6, 0.005 * PI, WindowType::Hamming), 1601),
        (FilterSpec::highpass(0.1, 0.001 * PI, WindowType::Hann), 8001),
    ] {
        let coefficients = design_filter(&spec).unwrap();
        assert_eq!(coefficients.len(), taps, "{:?}", spec);
        assert!(coefficients.len() <= MAX_FILTER_LENGTH);
        assert!(ConvolutionEngine::new(Arc::new(coefficients)).uses_fft());
    }
}
