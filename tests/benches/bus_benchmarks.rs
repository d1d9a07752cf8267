//! # Relay Bus Benchmarks
//!
//! Hot paths of the engine:
//!
//! | Path | What is measured |
//! |------|------------------|
//! | Dispatch tracker | handler count + completions, continuation included |
//! | Codec | bincode round trip through the type registry |
//! | Local send | `send` to the local peer up to completion |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use relay_bus::test_utils::RecordingTransport;
use relay_bus::{
    BincodeCodec, Bus, BusConfig, HandlerDispatcher, MessageCodec, MessageDispatch,
    StaticPeerDirectory,
};
use relay_types::{
    Command, Message, MessageId, MessageTypeId, OriginatorInfo, Peer, PeerId, TransportMessage,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Transfer {
    account: String,
    amount: u64,
    memo: Vec<u8>,
}
impl Message for Transfer {}
impl Command for Transfer {}

fn transfer() -> Transfer {
    Transfer {
        account: "acc-0001".to_string(),
        amount: 1_000,
        memo: vec![7; 64],
    }
}

fn envelope() -> TransportMessage {
    let sender = Peer::new(PeerId::new("Abc.Bench.0"), "mem://bench");
    TransportMessage::new(
        MessageId::next(),
        MessageTypeId::of::<Transfer>(),
        vec![0; 32],
        OriginatorInfo::new(&sender, None),
    )
}

fn bench_dispatch_tracker(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch-tracker");

    for handlers in [0usize, 1, 8] {
        group.throughput(Throughput::Elements(handlers.max(1) as u64));
        group.bench_with_input(BenchmarkId::new("complete", handlers), &handlers, |b, &n| {
            let completions = Arc::new(AtomicUsize::new(0));
            b.iter(|| {
                let completions = Arc::clone(&completions);
                let dispatch = MessageDispatch::new(None, envelope(), false).with_continuation(
                    move |_| {
                        completions.fetch_add(1, Ordering::Relaxed);
                    },
                );
                dispatch.set_handler_count(n);
                for _ in 0..n {
                    dispatch.set_handled(None, None);
                }
                black_box(dispatch.is_completed())
            })
        });
    }

    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    let codec = BincodeCodec::new().with::<Transfer>();
    let message = transfer();
    let bytes = codec.serialize(&message).unwrap();
    let message_type = Transfer::type_name();

    group.bench_function("serialize", |b| {
        b.iter(|| black_box(codec.serialize(black_box(&message)).unwrap()))
    });
    group.bench_function("deserialize", |b| {
        b.iter(|| black_box(codec.deserialize(&message_type, black_box(&bytes)).unwrap()))
    });

    group.finish();
}

fn bench_local_send(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let directory = Arc::new(StaticPeerDirectory::new());
    let bus = runtime.block_on(async {
        let bus = Bus::builder(
            Arc::new(RecordingTransport::new("mem://bench")),
            directory.clone(),
            Arc::new(BincodeCodec::new().with::<Transfer>()),
            Arc::new(HandlerDispatcher::new()),
        )
        .config(BusConfig::default().with_identity(PeerId::new("Abc.Bench.0"), "Bench"))
        .build();
        bus.start().await.unwrap();
        bus
    });
    directory.subscribe::<Transfer>(bus.self_peer().unwrap());

    c.bench_function("local-send/no-handler", |b| {
        b.iter(|| {
            let completion = bus.send(transfer()).unwrap();
            black_box(runtime.block_on(completion).unwrap())
        })
    });
}

criterion_group!(benches, bench_dispatch_tracker, bench_codec, bench_local_send);
criterion_main!(benches);
