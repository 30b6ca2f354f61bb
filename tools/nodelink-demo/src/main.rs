// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! nodelink-demo - Publisher fan-out over the loopback transport
//!
//! Starts one publisher node and N subscriber nodes in one process, each
//! subscriber on its own thread, broadcasts M messages and checks that every
//! subscriber received all of them in order.

use clap::Parser;
use nodelink::transport::{LoopbackNetwork, LoopbackTransport};
use nodelink::{
    LoopbackConfig, NodeAddress, Port, Publisher, PublisherConfig, Subscriber, SubscriberConfig,
};
use std::error::Error;
use std::process::ExitCode;
use std::sync::{Arc, Barrier};
use std::thread;

/// Run a publisher and N subscribers over the loopback transport
#[derive(Parser, Debug)]
#[command(name = "nodelink-demo")]
#[command(version)]
#[command(about = "Publisher/subscriber fan-out over an in-process node network")]
struct Args {
    /// Publisher node address (0-31)
    #[arg(long, default_value = "11")]
    node: u8,

    /// Publisher port (0-31)
    #[arg(short, long, default_value = "12")]
    port: u8,

    /// Number of subscriber nodes
    #[arg(short, long, default_value = "3")]
    subscribers: u8,

    /// Number of messages to broadcast
    #[arg(short = 'n', long, default_value = "10")]
    messages: u32,

    /// Listener backlog
    #[arg(short, long, default_value = "10")]
    backlog: usize,

    /// Payload size in bytes (>= 4, <= MTU)
    #[arg(long, default_value = "32")]
    payload: usize,

    /// Read/accept timeout in milliseconds
    #[arg(long, default_value = "2000")]
    timeout_ms: u64,
}

type TaskResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    if args.payload < 4 {
        return Err("payload must be at least 4 bytes (sequence number)".into());
    }

    let loopback = LoopbackConfig {
        accept_timeout_ms: Some(args.timeout_ms),
        read_timeout_ms: Some(args.timeout_ms),
        ..Default::default()
    };
    loopback.validate()?;
    if args.payload > loopback.mtu {
        return Err(format!("payload {} exceeds MTU {}", args.payload, loopback.mtu).into());
    }

    let network = LoopbackNetwork::new(loopback);
    let publisher_node = NodeAddress::new(args.node);
    let port = Port::new(args.port);
    if !publisher_node.is_valid() {
        return Err(nodelink::Error::InvalidNode(publisher_node).into());
    }

    let config = PublisherConfig {
        port,
        backlog: args.backlog,
        ..Default::default()
    };
    let mut publisher = Publisher::bind(network.node(publisher_node), config)?;
    log::info!("publisher listening on {}:{}", publisher_node, port);

    let ready = Arc::new(Barrier::new(usize::from(args.subscribers) + 1));
    let mut workers = Vec::with_capacity(usize::from(args.subscribers));
    let mut next_node = 0u8;
    for _ in 0..args.subscribers {
        if next_node == args.node {
            next_node += 1;
        }
        let node = NodeAddress::new(next_node);
        next_node += 1;
        if !node.is_valid() {
            return Err("too many subscribers for the node address space".into());
        }

        let transport = network.node(node);
        let ready = Arc::clone(&ready);
        let config = SubscriberConfig::new(publisher_node, port);
        let messages = args.messages;
        let payload = args.payload;
        workers.push((
            node,
            thread::spawn(move || subscriber_task(transport, &config, &ready, messages, payload)),
        ));
    }

    for _ in 0..args.subscribers {
        let index = publisher.accept_subscriber()?;
        log::debug!("accepted subscriber #{}", index);
    }
    ready.wait();

    let mut payload = vec![0u8; args.payload];
    for seq in 0..args.messages {
        payload[..4].copy_from_slice(&seq.to_le_bytes());
        let report = publisher.broadcast(&payload)?;
        if !report.is_complete() {
            log::warn!(
                "seq {}: {} failed, {} dropped",
                seq,
                report.failed.len(),
                report.dropped
            );
        }
    }

    let mut failures = 0;
    for (node, worker) in workers {
        match worker.join() {
            Ok(Ok(count)) => {
                log::info!("subscriber {} received {} messages", node, count);
            }
            Ok(Err(e)) => {
                log::error!("subscriber {}: {}", node, e);
                failures += 1;
            }
            Err(_) => {
                log::error!("subscriber {}: thread panicked", node);
                failures += 1;
            }
        }
    }

    let stats = network.stats();
    println!(
        "connections={} packets_sent={} bytes_sent={} packets_received={} failures={}",
        stats.connections, stats.packets_sent, stats.bytes_sent, stats.packets_received, failures
    );

    if failures > 0 {
        return Err(format!("{} subscriber(s) failed", failures).into());
    }
    Ok(())
}

fn subscriber_task(
    transport: LoopbackTransport,
    config: &SubscriberConfig,
    ready: &Barrier,
    messages: u32,
    payload: usize,
) -> TaskResult<u32> {
    let subscriber = Subscriber::connect(transport, config);
    // Reach the barrier even on failure so the other subscribers are not held up.
    ready.wait();
    let subscriber = subscriber?;

    let mut buf = vec![0u8; payload];
    for expected in 0..messages {
        let n = subscriber.recv(&mut buf)?;
        if n < 4 {
            return Err(format!("short packet ({} bytes)", n).into());
        }
        let seq = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if seq != expected {
            return Err(format!("expected seq {}, got {}", expected, seq).into());
        }
    }
    Ok(messages)
}
