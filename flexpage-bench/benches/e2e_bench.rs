//! End-to-end client-server benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flexpage_client::{Client, ConnectionConfig};
use flexpage_core::FlexEncoder;
use flexpage_protocol::message::{EncodeParams, MessageParams};
use flexpage_server::{CommandHandler, LogSink, Server, ServerConfig, SlotTiming, TransmitQueue};
use std::sync::Arc;
use tokio::runtime::Runtime;

struct TestSetup {
    _server_handle: tokio::task::JoinHandle<()>,
    client: Client,
}

fn setup_server_and_client(rt: &Runtime) -> TestSetup {
    let (server, listener) = rt.block_on(async {
        let encoder = Arc::new(FlexEncoder::default());
        let (queue, _) =
            TransmitQueue::spawn(encoder, Box::new(LogSink::new()), 64, SlotTiming::Immediate);
        let handler = Arc::new(CommandHandler::new(queue));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (Arc::new(Server::new(ServerConfig::new(addr), handler)), listener)
    });
    let addr = listener.local_addr().unwrap();

    let server_clone = server.clone();
    let server_handle = rt.spawn(async move {
        let _ = server_clone.serve(listener).await;
    });

    let client_config = ConnectionConfig::new(addr).with_client_name("bench");
    let client = Client::new(client_config);
    rt.block_on(async { client.connect().await.unwrap() });

    TestSetup {
        _server_handle: server_handle,
        client,
    }
}

fn bench_ping_latency(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let setup = setup_server_and_client(&rt);

    let mut group = c.benchmark_group("e2e_ping");
    group.throughput(Throughput::Elements(1));

    group.bench_function("ping", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(setup.client.ping().await.unwrap()) });
    });

    group.finish();
}

fn bench_page_e2e(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let setup = setup_server_and_client(&rt);

    let mut group = c.benchmark_group("e2e_page");
    group.throughput(Throughput::Elements(1));

    for baud_rate in [1600, 3200, 6400] {
        let mut params = EncodeParams::new(425321, MessageParams::alphanumeric("BENCH PAGE"));
        params.baud_rate = baud_rate;

        group.bench_with_input(
            BenchmarkId::from_parameter(baud_rate),
            &params,
            |b, params| {
                b.to_async(&rt).iter(|| {
                    let client = &setup.client;
                    let params = params.clone();
                    async move { black_box(client.encode(params).await.unwrap()) }
                });
            },
        );
    }

    group.finish();
}

fn bench_roundtrip_latency(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let setup = setup_server_and_client(&rt);

    let mut group = c.benchmark_group("e2e_latency");

    group.bench_function("info", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(setup.client.info().await.unwrap()) });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_ping_latency,
    bench_page_e2e,
    bench_roundtrip_latency,
);

criterion_main!(benches);
