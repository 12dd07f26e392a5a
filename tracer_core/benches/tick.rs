use std::sync::Arc;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use tracer_core::mocks::NoopAudio;
use tracer_core::{NavigatorCfg, PositionEstimator, build_navigator};
use tracer_traits::{HBridge, LineSensors, ManualClock, PwmChannel, SensorFrame};

/// Sensors cycling through a fixed course without allocation.
struct Course {
    frames: Vec<SensorFrame>,
    pos: usize,
}

impl LineSensors for Course {
    fn read(&mut self) -> Result<SensorFrame, Box<dyn std::error::Error + Send + Sync>> {
        let f = self.frames[self.pos % self.frames.len()];
        self.pos += 1;
        Ok(f)
    }
}

struct NullBridge;

impl HBridge for NullBridge {
    fn write(
        &mut self,
        _channel: PwmChannel,
        _duty: u16,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}

fn course() -> Vec<SensorFrame> {
    [
        [0, 0, 1, 0, 0],
        [0, 0, 1, 1, 0],
        [0, 0, 0, 1, 0],
        [0, 0, 1, 1, 0],
        [0, 0, 1, 0, 0],
        [0, 1, 1, 0, 0],
        [0, 1, 0, 0, 0],
        [0, 1, 1, 0, 0],
    ]
    .into_iter()
    .map(SensorFrame::from_bits)
    .collect()
}

fn bench_estimate(c: &mut Criterion) {
    let frames: Vec<SensorFrame> = (0u8..32)
        .map(|b| SensorFrame::from_bits(std::array::from_fn(|i| (b >> i) & 1)))
        .collect();
    c.bench_function("estimator/estimate_all_frames", |b| {
        let mut est = PositionEstimator::default();
        b.iter(|| {
            for (t, f) in frames.iter().enumerate() {
                black_box(est.estimate(*f, t as u64));
            }
        })
    });
}

fn bench_tick(c: &mut Criterion) {
    c.bench_function("navigator/tick_following", |b| {
        b.iter_batched(
            || {
                let clock = ManualClock::new();
                let mut nav = build_navigator(
                    Course {
                        frames: course(),
                        pos: 0,
                    },
                    NullBridge,
                    NoopAudio,
                    NavigatorCfg::default(),
                    None,
                    None,
                    Some(Arc::new(clock.clone())),
                )
                .unwrap();
                nav.begin().unwrap();
                nav.start();
                (nav, clock)
            },
            |(mut nav, clock)| {
                for _ in 0..100 {
                    clock.advance_ms(10);
                    black_box(nav.tick().unwrap());
                }
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_estimate, bench_tick);
criterion_main!(benches);
