use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hallkey_core::acquisition::{line_queue, LinkEvent};
use hallkey_core::config::OverflowPolicy;
use hallkey_core::processing::SignalChannel;
use hallkey_core::protocol::{classify, format_telemetry};
use std::sync::atomic::AtomicBool;

const CHANNEL_COUNTS: &[usize] = &[1, 3, 8, 16];
const QUEUE_CAPACITIES: &[usize] = &[64, 1024, 4096];

fn benchmark_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    for &channels in CHANNEL_COUNTS {
        let depths: Vec<f64> = (0..channels).map(|i| i as f64 / channels as f64).collect();
        let line = format_telemetry(1_234_567, &depths);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("format_telemetry", channels), &depths, |b, depths| {
            b.iter(|| format_telemetry(black_box(1_234_567), black_box(depths)));
        });
        group.bench_with_input(BenchmarkId::new("classify_telemetry", channels), &line, |b, line| {
            b.iter(|| classify(black_box(line)));
        });
    }

    group.bench_function("classify_status", |b| {
        b.iter(|| classify(black_box("Press K2 fully and HOLD (3s)")));
    });

    group.finish();
}

fn benchmark_signal_channel(c: &mut Criterion) {
    let mut group = c.benchmark_group("signal_channel");
    group.throughput(Throughput::Elements(1000));

    group.bench_function("update_and_depth", |b| {
        let mut channel = SignalChannel::with_defaults("K1");
        channel.set_bounds(10_000.0, 50_000.0);
        let readings: Vec<u16> = (0..1000).map(|i| 10_000 + (i * 40) as u16).collect();

        b.iter(|| {
            let mut total = 0.0;
            for &raw in &readings {
                channel.update(black_box(raw));
                total += channel.depth();
            }
            total
        });
    });

    group.finish();
}

fn benchmark_line_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_queue");
    let shutdown = AtomicBool::new(false);

    for &capacity in QUEUE_CAPACITIES {
        let batch = capacity / 2;
        group.throughput(Throughput::Elements(batch as u64));

        for policy in [OverflowPolicy::Block, OverflowPolicy::DropOldest] {
            group.bench_with_input(
                BenchmarkId::new(format!("push_drain_{:?}", policy), capacity),
                &capacity,
                |b, &capacity| {
                    let (producer, consumer) = line_queue(capacity, policy);
                    b.iter(|| {
                        for n in 0..batch {
                            let _ = producer.push(LinkEvent::Line(format!("{},0.5000", n)), &shutdown);
                        }
                        black_box(consumer.drain_pending())
                    });
                },
            );
        }

        // Overfilled queue: every push past capacity evicts
        group.bench_with_input(BenchmarkId::new("drop_oldest_overflow", capacity), &capacity, |b, &capacity| {
            let (producer, consumer) = line_queue(capacity, OverflowPolicy::DropOldest);
            b.iter(|| {
                for n in 0..capacity * 2 {
                    let _ = producer.push(LinkEvent::Line(format!("{},0.5000", n)), &shutdown);
                }
                black_box(consumer.drain_pending())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_codec, benchmark_signal_channel, benchmark_line_queue);
criterion_main!(benches);
