//! 转发器演示
//!
//! 多个线程向协议栈注入未匹配的 UDP 数据报，由转发器按策略创建端点，
//! 最后读空所有端点并打印汇总。

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{debug, info};
use udp_forwarder::config::StackConfig;
use udp_forwarder::error::Error;
use udp_forwarder::net::{NicId, Payload, Route, TransportEndpointId, TransportProtocolNumber};
use udp_forwarder::proto::udp::{AcceptAll, Action, Forwarder, IgnoreAll, PortPolicy, UdpEndpoint};
use udp_forwarder::stack::{Stack, StatsSnapshot};

const FIRST_SRC_PORT: u16 = 10_000;
/// 源端口从 `FIRST_SRC_PORT` 起递增，不能越过 65535
const MAX_FLOWS: u32 = (u16::MAX - FIRST_SRC_PORT) as u32 + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyKind {
    AcceptAll,
    IgnoreAll,
    Ports,
}

#[derive(Debug, Parser)]
#[command(name = "forwarder-demo", about = "未匹配数据报转发演示：并发注入数据报并按策略创建端点")]
struct Args {
    /// 协议栈配置（JSON）
    #[arg(long)]
    config: Option<PathBuf>,
    /// 流的数量；每条流占用一个不同的源端口
    #[arg(long, default_value_t = 64, value_parser = clap::value_parser!(u32).range(0..=MAX_FLOWS as i64))]
    flows: u32,
    #[arg(long, default_value_t = 4)]
    packets_per_flow: u32,
    #[arg(long, default_value_t = 4)]
    threads: u32,
    #[arg(long, value_enum, default_value_t = PolicyKind::AcceptAll)]
    policy: PolicyKind,
    /// `ports` 策略下接受的本端端口，可重复
    #[arg(long)]
    accept_port: Vec<u16>,
    /// 汇总输出为 JSON 文件
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Summary {
    flows: u32,
    packets_sent: u64,
    endpoints: usize,
    received: u64,
    unreachable: u64,
    stats: StatsSnapshot,
}

/// 偶数流发往 53 端口，奇数流发往 123 端口
fn flow(i: u32) -> (Route, TransportEndpointId) {
    let src = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    let dst = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
    let dst_port = if i % 2 == 0 { 53 } else { 123 };
    let src_port = FIRST_SRC_PORT + i as u16;
    let id = TransportEndpointId::inbound((src, src_port), (dst, dst_port));
    let route = Route::for_addresses(NicId(1), dst, src);
    (route, id)
}

fn drain(ep: &UdpEndpoint) -> u64 {
    let mut n = 0;
    loop {
        match ep.read() {
            Ok((bytes, from)) => {
                debug!(len = bytes.len(), from = ?from, "读到数据报");
                n += 1;
            }
            Err(Error::WouldBlock) | Err(Error::ClosedForReceive) => return n,
            Err(e) => panic!("unexpected read error: {e}"),
        }
    }
}

fn main() {
    // 初始化 tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();

    let cfg = match &args.config {
        Some(path) => StackConfig::from_path(path).unwrap_or_else(|e| {
            eprintln!("error: {e}");
            std::process::exit(2);
        }),
        None => StackConfig::default(),
    };

    let stack = Stack::new(cfg);
    let (tx, rx) = mpsc::channel::<Arc<UdpEndpoint>>();

    let forwarder = match args.policy {
        PolicyKind::AcceptAll => Forwarder::new(stack.clone(), AcceptAll::new(tx)),
        PolicyKind::IgnoreAll => {
            drop(tx);
            Forwarder::new(stack.clone(), IgnoreAll)
        }
        PolicyKind::Ports => {
            let policy = args
                .accept_port
                .iter()
                .fold(PortPolicy::new(AcceptAll::new(tx), Action::Ignore), |p, &port| {
                    p.with_rule(port, Action::Accept)
                });
            Forwarder::new(stack.clone(), policy)
        }
    };
    forwarder.install();

    info!(
        flows = args.flows,
        packets_per_flow = args.packets_per_flow,
        threads = args.threads,
        policy = ?args.policy,
        "🚀 开始注入数据报"
    );

    let threads = args.threads.max(1);
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let stack = stack.clone();
            let flows = args.flows;
            let per_flow = args.packets_per_flow;
            thread::spawn(move || {
                let mut sent = 0u64;
                for i in (t..flows).step_by(threads as usize) {
                    let (route, id) = flow(i);
                    for seq in 0..per_flow {
                        let payload = Payload::from(format!("flow={i} seq={seq}").into_bytes());
                        stack.deliver_transport_packet(
                            &route,
                            TransportProtocolNumber::UDP,
                            id,
                            payload,
                        );
                        sent += 1;
                    }
                }
                sent
            })
        })
        .collect();

    let packets_sent: u64 = handles
        .into_iter()
        .map(|h| h.join().expect("injector thread panicked"))
        .sum();

    // 解开 协议栈 -> 转发器 -> 协议栈 的引用环，同时关闭 channel 的发送端。
    stack.remove_transport_protocol_handler(TransportProtocolNumber::UDP);

    let endpoints: Vec<Arc<UdpEndpoint>> = rx.try_iter().collect();
    let received: u64 = endpoints.iter().map(|ep| drain(ep)).sum();
    for ep in &endpoints {
        ep.close();
    }

    let stats = stack.stats().snapshot();
    let summary = Summary {
        flows: args.flows,
        packets_sent,
        endpoints: endpoints.len(),
        received,
        unreachable: stats.unknown_port_errors,
        stats,
    };

    info!(
        endpoints = summary.endpoints,
        received = summary.received,
        "✅ 演示完成"
    );

    if let Some(path) = &args.summary_json {
        let raw = serde_json::to_string_pretty(&summary).expect("serialize summary");
        std::fs::write(path, raw).expect("write summary json");
    }

    println!(
        "done flows={}, endpoints={}, received={}, unreachable={}",
        summary.flows, summary.endpoints, summary.received, summary.unreachable
    );
}
