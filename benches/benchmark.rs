//! Echo Server Performance Benchmark Suite
//!
//! This module contains benchmarks for measuring various aspects of the echo
//! server's performance:
//! - Connection setup and teardown capacity
//! - Echo round-trip throughput
//!
//! Key Features:
//! - Realistic simulation of client/server interactions
//! - In-process server bound to an ephemeral port

use criterion::{criterion_group, criterion_main, Criterion};
use std::{net::SocketAddr, sync::Arc, time::Duration};

use echo_rs::{config::ServerConfig, server::Server};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;

/// Initializes and starts a test echo server instance
///
/// # Returns
/// Tuple containing:
/// - Server socket address
/// - Server handle (kept alive for the duration of the benchmark)
/// - Accept-loop task handle for lifecycle management
async fn start_test_server() -> (SocketAddr, Arc<Server>, tokio::task::JoinHandle<()>) {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0, // Let OS choose available port
        read_timeout_secs: 5,
        shutdown_grace_secs: 10,
    };

    let server = Arc::new(Server::bind(config).await.expect("Failed to bind"));
    let addr = server.local_addr();

    let server_task = tokio::spawn({
        let server = server.clone();
        async move {
            let _ = server.start().await;
        }
    });

    (addr, server, server_task)
}

/// Benchmark group for connection handling performance
///
/// Measures:
/// - Raw connection establishment rate
/// - Connection teardown performance
fn bench_connections(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (addr, _server, server_task) = rt.block_on(start_test_server());

    let mut group = c.benchmark_group("connections");
    group.sample_size(100);
    group.measurement_time(Duration::from_secs(5));
    group.warm_up_time(Duration::from_secs(1));

    // Benchmark connection lifecycle
    group.bench_function("connect_disconnect", |b| {
        b.to_async(&rt).iter(|| async {
            let stream = TcpStream::connect(addr).await.unwrap();

            // Clean connection termination
            drop(stream);
        });
    });

    server_task.abort();
}

/// Benchmark group for echo processing performance
///
/// Measures:
/// - Line echo round-trip time
fn bench_messages(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (addr, _server, server_task) = rt.block_on(start_test_server());

    let mut group = c.benchmark_group("messages");
    group.throughput(criterion::Throughput::Elements(1));

    // Benchmark echo round-trip
    group.bench_function("echo_round_trip", |b| {
        b.to_async(&rt).iter(|| async {
            let stream = TcpStream::connect(addr).await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();

            write_half.write_all(b"test\n").await.unwrap();
            let echoed = lines.next_line().await.unwrap().unwrap();
            assert_eq!(echoed, "test");
        });
    });

    server_task.abort();
}

// Configure benchmark groups
criterion_group!(
    name = benches;
    config = Criterion::default()
        .significance_level(0.05)
        .noise_threshold(0.05);
    targets = bench_connections, bench_messages
);
criterion_main!(benches);
