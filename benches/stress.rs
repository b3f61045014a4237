use std::sync::Arc;
use std::time::{Duration, Instant};

use ulid::Ulid;

use atrium::config::BookingPolicy;
use atrium::engine::Engine;
use atrium::model::{DAY_MS, HOUR_MS, Ms, Span};
use atrium::notify::NotifyHub;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

fn bench_engine(name: &str) -> Arc<Engine> {
    let dir = std::env::temp_dir().join(format!("atrium_bench_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    Arc::new(
        Engine::new(
            dir.join(name),
            BookingPolicy::default(),
            Arc::new(NotifyHub::new()),
        )
        .unwrap(),
    )
}

async fn setup_rooms(engine: &Engine, count: usize) -> Vec<Ulid> {
    let mut rooms = Vec::with_capacity(count);
    for i in 0..count {
        let info = engine
            .create_room(format!("Room {i:03}"), (i / 20) as i32, 2 + (i % 10) as u32)
            .await
            .unwrap();
        rooms.push(info.id);
    }
    println!("  created {count} rooms");
    rooms
}

/// Phase 1: sequential create throughput on a single room.
async fn phase1_sequential_creates(engine: &Engine, room: Ulid) {
    let n = 2000;
    let base = now_ms() + DAY_MS;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let s = base + (i as Ms) * HOUR_MS;
        let t = Instant::now();
        engine
            .create_booking(Ulid::new(), room, Span::new(s, s + HOUR_MS), None)
            .await
            .unwrap();
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    println!(
        "  {} creates in {:.2}s ({:.0}/s)",
        n,
        elapsed.as_secs_f64(),
        n as f64 / elapsed.as_secs_f64()
    );
    print_latency("create_booking", &mut latencies);
}

/// Phase 2: conflict probes against a heavily booked room.
async fn phase2_conflict_probes(engine: &Engine, room: Ulid) {
    let n = 5000;
    let base = now_ms() + DAY_MS;
    let mut latencies = Vec::with_capacity(n);
    let mut conflicts = 0;

    for i in 0..n {
        let s = base + ((i as Ms) % 4000) * 30 * 60_000;
        let t = Instant::now();
        if engine
            .has_conflict(room, Span::new(s, s + HOUR_MS), None)
            .await
            .unwrap()
        {
            conflicts += 1;
        }
        latencies.push(t.elapsed());
    }

    println!("  {conflicts}/{n} probes conflicted");
    print_latency("has_conflict", &mut latencies);
}

/// Phase 3: available-room search across the whole fleet.
async fn phase3_room_search(engine: &Engine) {
    let n = 500;
    let base = now_ms() + DAY_MS;
    let mut latencies = Vec::with_capacity(n);

    for i in 0..n {
        let s = base + ((i as Ms) % 100) * HOUR_MS;
        let t = Instant::now();
        let found = engine
            .find_available_rooms(Span::new(s, s + HOUR_MS), 4)
            .await
            .unwrap();
        latencies.push(t.elapsed());
        std::hint::black_box(found);
    }

    print_latency("find_available_rooms", &mut latencies);
}

/// Phase 4: contended creates — many tasks fighting for the same slots.
async fn phase4_contention(engine: &Arc<Engine>, room: Ulid) {
    let tasks = 64;
    let base = now_ms() + 2 * DAY_MS;
    let start = Instant::now();

    let mut handles = Vec::new();
    for i in 0..tasks {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            // 8 distinct slots, 8 tasks racing for each.
            let s = base + ((i % 8) as Ms) * HOUR_MS;
            engine
                .create_booking(Ulid::new(), room, Span::new(s, s + HOUR_MS), None)
                .await
                .is_ok()
        }));
    }

    let mut won = 0;
    for h in handles {
        if h.await.unwrap() {
            won += 1;
        }
    }
    println!(
        "  {tasks} contended creates in {:.2}ms: {won} won, {} lost",
        start.elapsed().as_secs_f64() * 1000.0,
        tasks - won
    );
    assert_eq!(won, 8, "exactly one winner per slot");
}

#[tokio::main]
async fn main() {
    println!("== atrium stress bench ==");

    println!("phase 0: setup");
    let engine = bench_engine("stress.wal");
    let policy = engine.booking_policy();
    println!(
        "  policy: buffer={}ms, max_duration={}ms",
        policy.buffer_ms, policy.max_duration_ms
    );
    let rooms = setup_rooms(&engine, 200).await;

    println!("phase 1: sequential creates");
    phase1_sequential_creates(&engine, rooms[0]).await;

    println!("phase 2: conflict probes");
    phase2_conflict_probes(&engine, rooms[0]).await;

    println!("phase 3: room search");
    phase3_room_search(&engine).await;

    println!("phase 4: lock contention");
    phase4_contention(&engine, rooms[1]).await;

    println!("done");
}
