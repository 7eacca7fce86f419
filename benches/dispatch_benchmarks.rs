use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use flarebus::prelude::*;
use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

struct Tick(u64);

struct Quiet;

struct Chat {
    body: String,
}

fn catalog() -> Arc<EventCatalog> {
    EventCatalog::builder()
        .event::<Tick>()
        .event::<Quiet>()
        .event::<Chat>()
        .build()
}

fn bus_with_listeners(count: usize) -> (EventBus, Vec<Arc<AtomicU64>>) {
    let bus = EventBus::new(catalog());
    let owners: Vec<Arc<AtomicU64>> = (0..count).map(|_| Arc::new(AtomicU64::new(0))).collect();

    for (i, owner) in owners.iter().enumerate() {
        bus.subscribe_fn(owner, move |me, binder| {
            let me = Arc::clone(me);
            binder.listen((i % 16) as i32, move |tick: &Tick| {
                me.fetch_add(tick.0, Ordering::Relaxed);
            })?;
            Ok(())
        })
        .unwrap();
    }

    (bus, owners)
}

fn bench_post(c: &mut Criterion) {
    let mut group = c.benchmark_group("post");

    for count in [1usize, 8, 64, 512] {
        let (bus, _owners) = bus_with_listeners(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("listeners", count), &count, |b, _| {
            b.iter(|| bus.post(black_box(&Tick(1))))
        });
    }

    group.finish();
}

fn bench_post_without_listeners(c: &mut Criterion) {
    let mut group = c.benchmark_group("post_empty");
    let bus = EventBus::new(catalog());

    group.bench_function("no_listeners", |b| b.iter(|| bus.post(black_box(&Quiet))));

    struct Unlisted;
    group.bench_function("unknown_type", |b| {
        b.iter(|| bus.post(black_box(&Unlisted)))
    });

    group.finish();
}

fn bench_post_variants(c: &mut Criterion) {
    let mut group = c.benchmark_group("post_variants");
    let (bus, _owners) = bus_with_listeners(8);
    let key = bus.catalog().key::<Tick>().unwrap();

    group.bench_function("typed", |b| b.iter(|| bus.post(black_box(&Tick(1)))));
    group.bench_function("keyed", |b| {
        b.iter(|| bus.post_keyed(key, black_box(&Tick(1))))
    });
    group.bench_function("dyn", |b| {
        let event: &dyn std::any::Any = &Tick(1);
        b.iter(|| bus.post_dyn(black_box(event)))
    });

    group.finish();
}

fn bench_wrapped(c: &mut Criterion) {
    let bus = EventBus::builder(catalog())
        .wrap_single(|chat: &Chat| &chat.body)
        .build()
        .unwrap();
    let total = Arc::new(AtomicU64::new(0));
    let t = Arc::clone(&total);
    bus.subscribe_fn(&total, move |_, binder| {
        binder.listen_wrapped::<Chat, (String,), _>(0, move |_: &Chat, body: Option<&String>| {
            t.fetch_add(body.map_or(0, |b| b.len() as u64), Ordering::Relaxed);
        })?;
        Ok(())
    })
    .unwrap();

    let chat = Chat {
        body: "hello".to_string(),
    };
    c.bench_function("post_wrapped", |b| b.iter(|| bus.post(black_box(&chat))));
}

fn bench_subscription(c: &mut Criterion) {
    let mut group = c.benchmark_group("subscription");

    for existing in [0usize, 64, 512] {
        let (bus, _owners) = bus_with_listeners(existing);
        let owner = Arc::new(AtomicU64::new(0));

        group.bench_with_input(
            BenchmarkId::new("subscribe_unsubscribe", existing),
            &existing,
            |b, _| {
                b.iter(|| {
                    bus.subscribe_fn(&owner, |me, binder| {
                        let me = Arc::clone(me);
                        binder.listen(7, move |tick: &Tick| {
                            me.fetch_add(tick.0, Ordering::Relaxed);
                        })?;
                        Ok(())
                    })
                    .unwrap();
                    black_box(bus.unsubscribe(&owner))
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    dispatch_benches,
    bench_post,
    bench_post_without_listeners,
    bench_post_variants,
    bench_wrapped,
    bench_subscription,
);

criterion_main!(dispatch_benches);
