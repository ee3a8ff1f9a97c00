//! # Client Benchmark Harness
//!
//! Purpose: Time the typed client against a live store so round-trip cost can
//! be compared across single-node and cluster deployments.
//!
//! Usage: `bench_client [address] [key_count] [password]`
//!
//! Phases: set, set with expiry, get, exists, delete, queue push, queue pop.
//! Set `RUST_LOG=tkv_client=debug` to see every command.

use std::env;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tkv_client::{EndpointConfig, StoreClient};

const DEFAULT_ADDRESS: &str = "127.0.0.1:6379";
const DEFAULT_KEY_COUNT: usize = 10_000;
const EXPIRE_SECONDS: i64 = 36_000;
const QUEUE: &str = "bench:queue";

struct BenchConfig {
    address: String,
    key_count: usize,
    password: Option<String>,
}

impl BenchConfig {
    fn from_args() -> Self {
        let mut args = env::args().skip(1);
        let address = args.next().unwrap_or_else(|| DEFAULT_ADDRESS.to_string());
        let key_count = parse_usize(args.next(), DEFAULT_KEY_COUNT);
        let password = args.next();
        BenchConfig {
            address,
            key_count,
            password,
        }
    }
}

fn parse_usize(value: Option<String>, fallback: usize) -> usize {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(fallback).max(1)
}

fn report(label: &str, ops: usize, failures: usize, elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    let ops_per_sec = (ops as f64) / secs;
    println!(
        "{label}: {ops} ops, {failures} failed, {:.0}ms ({ops_per_sec:.0} ops/s)",
        secs * 1e3
    );
}

/// Runs `op` for every key and reports how many calls returned false.
fn phase<F>(label: &str, keys: &[String], mut op: F)
where
    F: FnMut(&str, usize) -> bool,
{
    let start = Instant::now();
    let failures = keys
        .iter()
        .enumerate()
        .filter(|(idx, key)| !op(key, *idx))
        .count();
    report(label, keys.len(), failures, start.elapsed());
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(err) = run() {
        eprintln!("bench_client failed: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let bench = BenchConfig::from_args();
    let mut config = EndpointConfig::new(bench.address.clone());
    if let Some(password) = bench.password {
        config = config.with_password(password);
    }
    // Fail early on a malformed address rather than inside `open`.
    let topology = config.topology().context("invalid address")?;

    let mut client = StoreClient::new();
    if !client.open(config) {
        match client.last_error() {
            Some(err) => bail!("cannot open {}: {err}", bench.address),
            None => bail!("cannot open {}", bench.address),
        }
    }
    info!(?topology, keys = bench.key_count, "benchmark starting");

    let keys: Vec<String> = (0..bench.key_count)
        .map(|idx| format!("bench:key:{idx:08}"))
        .collect();

    phase("SET", &keys, |key, idx| client.set(key, idx as u64));
    phase("SET+EXPIRE", &keys, |key, idx| {
        client.set(key, idx as u64) && client.expire(key, EXPIRE_SECONDS)
    });
    phase("GET", &keys, |key, idx| client.get_as::<u64>(key) == Some(idx as u64));
    phase("EXISTS", &keys, |key, _| client.exists(key));
    phase("DEL", &keys, |key, _| client.delete(key));

    client.queue_clear(QUEUE);
    phase("RPUSH", &keys, |_, idx| client.queue_push_back(QUEUE, idx as u64));
    phase("LPOP", &keys, |_, idx| {
        client.queue_pop_front_as::<u64>(QUEUE) == Some(idx as u64)
    });

    client.close();
    Ok(())
}
