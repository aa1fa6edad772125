//! Criterion benchmarks for the real-time DSP path
//!
//! Run with: cargo bench -p firscope-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use firscope::audio::engine::{BlockProcessor, EngineFlags};
use firscope::audio::handoff::{link, EngineCommand};
use firscope::audio::snapshot::snapshot_channel;
use firscope::audio::{NoiseGate, NoiseGateConfig};
use firscope::filters::fir::PreparedFilter;
use firscope::filters::{design_filter, ConvolutionEngine, FilterSpec, WindowType};
use firscope::spectrum::{AnalysisConfig, SpectralAnalyzer};
use firscope::PipelineConfig;
use std::f64::consts::PI;
use std::sync::Arc;

const SAMPLE_RATE: f64 = 48000.0;
const BLOCK_SIZES: &[usize] = &[256, 512, 1024, 2048];

fn generate_test_signal(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| (2.0 * PI * 440.0 * i as f64 / SAMPLE_RATE).sin() * 0.5)
        .collect()
}

fn bench_design(c: &mut Criterion) {
    let mut group = c.benchmark_group("Design");

    for window in WindowType::ALL {
        let spec = FilterSpec::from_part_a(window);
        group.bench_with_input(BenchmarkId::from_parameter(window), &spec, |b, spec| {
            b.iter(|| black_box(design_filter(black_box(spec))))
        });
    }

    group.finish();
}

fn bench_convolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("Convolution_161_taps");
    let coefficients =
        Arc::new(design_filter(&FilterSpec::from_part_a(WindowType::Hamming)).unwrap());

    for &block_size in BLOCK_SIZES {
        let input = generate_test_signal(block_size);
        let mut engine = ConvolutionEngine::new(Arc::clone(&coefficients));

        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, _| {
                let mut buffer = input.clone();
                b.iter(|| {
                    buffer.copy_from_slice(&input);
                    engine.process_block_inplace(black_box(&mut buffer));
                    black_box(buffer[0])
                })
            },
        );
    }

    group.finish();
}

fn bench_convolution_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("Convolution_1024_block");
    let input = generate_test_signal(1024);

    for width in [0.2, 0.05, 0.01] {
        let coefficients = Arc::new(
            design_filter(&FilterSpec::lowpass(0.3, width * PI, WindowType::Blackman)).unwrap(),
        );
        let taps = coefficients.len();
        let mut engine = ConvolutionEngine::new(coefficients);

        group.bench_with_input(BenchmarkId::from_parameter(taps), &taps, |b, _| {
            let mut buffer = input.clone();
            b.iter(|| {
                buffer.copy_from_slice(&input);
                engine.process_block_inplace(black_box(&mut buffer));
                black_box(buffer[0])
            })
        });
    }

    group.finish();
}

fn bench_gate(c: &mut Criterion) {
    let mut group = c.benchmark_group("NoiseGate");
    let config = NoiseGateConfig {
        enabled: true,
        ..NoiseGateConfig::default()
    };

    for &block_size in BLOCK_SIZES {
        let input = generate_test_signal(block_size);
        let mut gate = NoiseGate::new(config, SAMPLE_RATE);

        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, _| {
                let mut buffer = input.clone();
                b.iter(|| {
                    buffer.copy_from_slice(&input);
                    gate.process_block_inplace(black_box(&mut buffer));
                    black_box(buffer[0])
                })
            },
        );
    }

    group.finish();
}

fn bench_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("Analysis");

    for fft_size in [512, 2048, 8192] {
        let config = AnalysisConfig {
            fft_size,
            ..AnalysisConfig::default()
        };
        let mut analyzer = SpectralAnalyzer::new(config, SAMPLE_RATE);
        let input = generate_test_signal(1024);

        group.bench_with_input(BenchmarkId::from_parameter(fft_size), &fft_size, |b, _| {
            b.iter(|| {
                analyzer.push_samples(black_box(&input));
                analyzer.process().unwrap();
                black_box(analyzer.magnitude_db()[0])
            })
        });
    }

    group.finish();
}

fn bench_block_processor(c: &mut Criterion) {
    let mut group = c.benchmark_group("BlockProcessor");

    for &block_size in BLOCK_SIZES {
        let config = PipelineConfig {
            block_size,
            ..PipelineConfig::default()
        };
        let (mut control, engine_link) = link(config.command_queue_capacity);
        let (writer, _reader) = snapshot_channel();
        let mut engine = BlockProcessor::new(&config, engine_link, writer);
        let flags = EngineFlags::default();

        let coefficients =
            Arc::new(design_filter(&FilterSpec::from_part_a(WindowType::Hamming)).unwrap());
        let prepared = PreparedFilter::prepare(
            coefficients,
            engine.convolver().history_capacity(),
            block_size,
        );
        if control.send(EngineCommand::SetFilter(prepared)).is_ok() {
            engine.apply_pending();
        }

        let input = generate_test_signal(block_size);
        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, _| b.iter(|| engine.process_block(black_box(&input), &flags)),
        );
        control.reclaim();
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_design,
    bench_convolution,
    bench_convolution_length,
    bench_gate,
    bench_analysis,
    bench_block_processor,
);

criterion_main!(benches);
