use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pad_core::sim::SimBoard;
use pad_core::Driver;
use pad_n64::crc::data_crc;
use pad_n64::sim::{N64Pad, PakSlot, DATA_LINE};
use pad_n64::{N64Buttons, N64Controller};

fn bench_status_poll(c: &mut Criterion) {
    let mut group = c.benchmark_group("joybus_status_poll");

    group.bench_function("single_poll", |b| {
        let board = SimBoard::new(1);
        board.attach_new(
            N64Pad::new(DATA_LINE)
                .with_buttons(N64Buttons::A | N64Buttons::START)
                .with_stick(40, -40),
        );
        let mut n64 = N64Controller::new(board.line(DATA_LINE), board.delay(), board.interrupts());
        n64.initialize();

        b.iter(|| {
            black_box(n64.poll());
        });
    });

    group.finish();
}

fn bench_poll_bursts(c: &mut Criterion) {
    let mut group = c.benchmark_group("joybus_poll_bursts");

    for polls in [1, 10, 100].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(polls), polls, |b, &polls| {
            b.iter(|| {
                let board = SimBoard::new(1);
                board.attach_new(N64Pad::new(DATA_LINE));
                let mut n64 =
                    N64Controller::new(board.line(DATA_LINE), board.delay(), board.interrupts());
                n64.initialize();
                for _ in 0..polls {
                    black_box(n64.poll());
                }
            });
        });
    }

    group.finish();
}

fn bench_rumble(c: &mut Criterion) {
    let mut group = c.benchmark_group("pak");

    group.bench_function("rumble_toggle", |b| {
        let board = SimBoard::new(1);
        board.attach_new(N64Pad::new(DATA_LINE).with_pak(PakSlot::Rumble));
        let mut n64 = N64Controller::new(board.line(DATA_LINE), board.delay(), board.interrupts());
        n64.initialize();
        let mut on = false;

        b.iter(|| {
            on = !on;
            black_box(n64.set_rumble(on));
        });
    });

    group.bench_function("data_crc", |b| {
        let block = [0xA5u8; 32];
        b.iter(|| black_box(data_crc(black_box(&block))));
    });

    group.finish();
}

criterion_group!(benches, bench_status_poll, bench_poll_bursts, bench_rumble);
criterion_main!(benches);
