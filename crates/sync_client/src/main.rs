//! # Presence Relay - Simulated Participant Client
//!
//! Drives one or more synthetic participants against a running relay:
//! each participant connects, walks randomly around the world, streams its
//! pose at a fixed rate, and reports how many peers it can see. Useful for
//! exercising broadcast fan-out and watching relay behavior under load.

use clap::Parser;
use rand::Rng;
use std::time::Duration;
use sync_client::SyncClient;
use tokio::time::{interval, sleep};
use tracing::{error, info};

#[derive(Parser, Debug, Clone)]
#[command(name = "simulate")]
#[command(about = "Presence relay load client - simulated participants")]
struct Args {
    /// Relay WebSocket URL
    #[arg(short, long, default_value = "ws://127.0.0.1:8080")]
    url: String,

    /// Number of simultaneous participants to simulate
    #[arg(short, long, default_value = "4")]
    participants: u32,

    /// Pose update frequency in Hz
    #[arg(short, long, default_value = "10.0")]
    move_freq: f64,

    /// Simulation duration in seconds
    #[arg(short, long, default_value = "30")]
    duration: u64,

    /// World size (square area, meters)
    #[arg(short, long, default_value = "50.0")]
    world_size: f64,
}

/// One synthetic participant: a random-walk position and a heading.
struct SimulatedParticipant {
    position: [f64; 3],
    target: [f64; 3],
    heading: f64,
}

impl SimulatedParticipant {
    fn new(world_size: f64) -> Self {
        let mut rng = rand::thread_rng();
        let spawn = [
            rng.gen_range(-world_size / 2.0..world_size / 2.0),
            0.0,
            rng.gen_range(-world_size / 2.0..world_size / 2.0),
        ];
        Self {
            position: spawn,
            target: spawn,
            heading: 0.0,
        }
    }

    /// Steps toward the current target, picking a new one on arrival.
    fn step(&mut self, delta_time: f64, world_size: f64) {
        let dx = self.target[0] - self.position[0];
        let dz = self.target[2] - self.position[2];
        let distance = (dx * dx + dz * dz).sqrt();

        if distance < 0.5 {
            let mut rng = rand::thread_rng();
            self.target = [
                rng.gen_range(-world_size / 2.0..world_size / 2.0),
                0.0,
                rng.gen_range(-world_size / 2.0..world_size / 2.0),
            ];
            return;
        }

        let speed = 2.0; // meters per second
        self.heading = dz.atan2(dx);
        self.position[0] += dx / distance * speed * delta_time;
        self.position[2] += dz / distance * speed * delta_time;
    }

    fn rotation(&self) -> [f64; 3] {
        [0.0, self.heading, 0.0]
    }
}

/// Runs a single participant for the configured duration.
async fn run_participant(index: u32, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let client = SyncClient::new();
    client.connect(&args.url).await?;
    let id = client.id().await.expect("identity assigned after connect");
    info!("🎮 Participant {} online as {}", index, id);

    let mut body = SimulatedParticipant::new(args.world_size);
    let step = Duration::from_secs_f64(1.0 / args.move_freq);
    let mut ticker = interval(step);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(args.duration);
    let mut updates_sent: u64 = 0;

    while tokio::time::Instant::now() < deadline {
        ticker.tick().await;
        body.step(step.as_secs_f64(), args.world_size);
        client
            .send_pose(body.position, body.rotation())
            .await?;
        updates_sent += 1;

        if updates_sent % 50 == 0 {
            info!(
                "📊 Participant {} sent {} updates, sees {} peer(s)",
                index,
                updates_sent,
                client.others().await.len()
            );
        }
    }

    client.close().await;
    info!(
        "✅ Participant {} finished after {} updates",
        index, updates_sent
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    info!(
        "🚀 Simulating {} participant(s) against {} for {}s",
        args.participants, args.url, args.duration
    );

    let mut handles = Vec::new();
    for index in 0..args.participants {
        let args = args.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = run_participant(index, &args).await {
                error!("❌ Participant {} failed: {}", index, e);
            }
        }));

        // Stagger connections slightly so session setup doesn't thundering-herd
        sleep(Duration::from_millis(50)).await;
    }

    for handle in handles {
        let _ = handle.await;
    }

    info!("👋 Simulation complete");
}
