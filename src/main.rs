//! Fruit Merge headless driver
//!
//! Runs the simulation core against a small circle-physics stand-in and an
//! automatic player, then prints how the run went.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use clap::Parser;
use env_logger::{Builder, Env};
use glam::Vec2;
use log::LevelFilter;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use fruit_merge::consts::*;
use fruit_merge::persistence::{JsonFileStore, KeyValueStore, MemoryStore};
use fruit_merge::sim::{
    BodyId, BodyMode, ContactPhase, EventBus, GameEvent, GamePhase, GameState, ObjectPool,
    PhysicsBackend, PhysicsEvent, PieceHandle, TickInput, TierCatalog, frame, tick,
};
use fruit_merge::Settings;

/// Headless fruit-merge simulation
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run seed
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Simulated seconds before stopping
    #[arg(long, default_value = "120", value_name = "SECS")]
    seconds: f32,

    /// Seconds between automatic drops
    #[arg(long, default_value = "1.2", value_name = "SECS")]
    drop_interval: f32,

    /// Gameplay settings (JSON)
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Tier catalog (JSON); the built-in fruit chain otherwise
    #[arg(long, value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// High score store (JSON); kept in memory otherwise
    #[arg(long, value_name = "FILE")]
    store: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let env = Env::default().default_filter_or(level.to_string());
    // Only fails if a logger is already installed
    let _ = Builder::from_env(env).try_init();
}

/// Container walls and floor
const HALF_WIDTH: f32 = MAX_DROP_X + 1.0;
const FLOOR_Y: f32 = -6.0;
/// Bottom edge of the fail zone band
const FAIL_LINE_Y: f32 = SPAWN_Y - 2.0;

const GRAVITY: f32 = -9.81;
const RESTITUTION: f32 = 0.2;
const FRAME_DT: f32 = 1.0 / 60.0;

/// Minimal circle solver: gravity, container, circle-circle contacts and the
/// fail zone band. Sprites are unit-sized, so the visual footprint doubles as
/// the contact radius.
#[derive(Debug, Default)]
struct CirclePhysics {
    touching: BTreeSet<(PieceHandle, PieceHandle)>,
    in_zone: BTreeSet<PieceHandle>,
}

impl CirclePhysics {
    fn radius(scale: f32) -> f32 {
        0.5 * scale
    }
}

impl PhysicsBackend for CirclePhysics {
    fn step(&mut self, pool: &mut ObjectPool, dt: f32) -> Vec<PhysicsEvent> {
        let mut events = Vec::new();

        // Integrate free bodies
        for piece in pool.iter_active_mut() {
            let body = piece.body();
            if !body.simulated || body.mode != BodyMode::Dynamic || !piece.collider().enabled {
                continue;
            }
            let r = Self::radius(piece.scale());
            let mut vel = piece.velocity() + Vec2::new(0.0, GRAVITY * dt);
            let mut pos = piece.position() + vel * dt;

            if pos.y - r < FLOOR_Y {
                pos.y = FLOOR_Y + r;
                vel.y = -vel.y * RESTITUTION;
            }
            if pos.x - r < -HALF_WIDTH {
                pos.x = -HALF_WIDTH + r;
                vel.x = -vel.x * RESTITUTION;
            } else if pos.x + r > HALF_WIDTH {
                pos.x = HALF_WIDTH - r;
                vel.x = -vel.x * RESTITUTION;
            }
            piece.set_position(pos);
            piece.set_velocity(vel);
        }

        // Circle contacts, resolved pairwise in handle order
        let bodies: Vec<(PieceHandle, Vec2, Vec2, f32)> = pool
            .iter_active()
            .filter(|p| p.body().simulated && p.collider().enabled)
            .map(|p| (p.handle(), p.position(), p.velocity(), Self::radius(p.scale())))
            .collect();

        let mut touching = BTreeSet::new();
        for (i, &(a, pa, va, ra)) in bodies.iter().enumerate() {
            for &(b, pb, vb, rb) in &bodies[i + 1..] {
                let delta = pb - pa;
                let dist = delta.length();
                if dist >= ra + rb {
                    continue;
                }
                let normal = if dist > f32::EPSILON { delta / dist } else { Vec2::Y };
                let overlap = ra + rb - dist;

                let closing = (vb - va).dot(normal);
                let impulse = if closing < 0.0 {
                    -(1.0 + RESTITUTION) * closing / 2.0
                } else {
                    0.0
                };
                if let Some(piece) = pool.get_mut(a) {
                    if piece.body().mode == BodyMode::Dynamic {
                        piece.set_position(piece.position() - normal * overlap / 2.0);
                        piece.set_velocity(piece.velocity() - normal * impulse);
                    }
                }
                if let Some(piece) = pool.get_mut(b) {
                    if piece.body().mode == BodyMode::Dynamic {
                        piece.set_position(piece.position() + normal * overlap / 2.0);
                        piece.set_velocity(piece.velocity() + normal * impulse);
                    }
                }

                let key = PieceHandle::pair_key(a, b);
                let phase = if self.touching.contains(&key) {
                    ContactPhase::Stay
                } else {
                    ContactPhase::Enter
                };
                touching.insert(key);

                let point = pa + normal * ra;
                events.push(PhysicsEvent::Contact {
                    body: BodyId::Piece(a),
                    other: BodyId::Piece(b),
                    point,
                    phase,
                });
                events.push(PhysicsEvent::Contact {
                    body: BodyId::Piece(b),
                    other: BodyId::Piece(a),
                    point,
                    phase,
                });
            }
        }
        self.touching = touching;

        // Fail zone band above the fail line
        let mut in_zone = BTreeSet::new();
        for piece in pool.iter_active() {
            if !piece.body().simulated || !piece.collider().enabled {
                continue;
            }
            if piece.position().y + Self::radius(piece.scale()) > FAIL_LINE_Y {
                in_zone.insert(piece.handle());
            }
        }
        for &h in in_zone.difference(&self.in_zone) {
            events.push(PhysicsEvent::TriggerEnter {
                body: BodyId::Piece(h),
                trigger: BodyId::FailZone,
            });
        }
        for &h in self.in_zone.difference(&in_zone) {
            events.push(PhysicsEvent::TriggerExit {
                body: BodyId::Piece(h),
                trigger: BodyId::FailZone,
            });
        }
        self.in_zone = in_zone;

        events
    }
}

/// Drops the preview at a random column every `interval` seconds
struct AutoPlayer {
    rng: Pcg32,
    interval: f32,
    cooldown: f32,
}

impl AutoPlayer {
    fn new(seed: u64, interval: f32) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
            interval,
            cooldown: interval,
        }
    }

    fn input(&mut self, state: &GameState, dt: f32) -> TickInput {
        self.cooldown -= dt;
        if self.cooldown > 0.0 || state.spawner.preview().is_none() {
            return TickInput::default();
        }
        self.cooldown = self.interval;
        TickInput {
            drop_x: Some(self.rng.random_range(MIN_DROP_X..=MAX_DROP_X)),
            drop: true,
            ..Default::default()
        }
    }
}

fn open_store(path: Option<&PathBuf>) -> Box<dyn KeyValueStore> {
    let Some(path) = path else {
        return Box::new(MemoryStore::new());
    };
    match JsonFileStore::open(path) {
        Ok(store) => Box::new(store),
        Err(err) => {
            log::warn!("Store {} unusable ({}), keeping scores in memory", path.display(), err);
            Box::new(MemoryStore::new())
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.verbose);
    log::info!("Fruit Merge (headless) starting, seed {}", args.seed);

    let settings = match &args.settings {
        Some(path) => Settings::load(path),
        None => Settings::default(),
    };
    let catalog = match &args.catalog {
        Some(path) => TierCatalog::load(path)?,
        None => TierCatalog::classic(),
    };

    let mut bus = EventBus::new();
    let merges = std::rc::Rc::new(std::cell::Cell::new(0u32));
    let counter = merges.clone();
    let subscription = bus.subscribe(move |event| match event {
        GameEvent::MergeCompleted { tier, position } => {
            counter.set(counter.get() + 1);
            log::debug!("Merged into tier {} at {}", tier, position);
        }
        GameEvent::HighScoreChanged(high) => log::debug!("New high score {}", high),
        GameEvent::PhaseChanged(phase) => log::info!("Phase: {:?}", phase),
        _ => {}
    });

    let store = open_store(args.store.as_ref());
    let mut state = GameState::new(args.seed, settings, catalog, store, bus.sender());
    let mut physics = CirclePhysics::default();
    let mut player = AutoPlayer::new(args.seed ^ 0x5eed, args.drop_interval);

    state.start_game();

    let mut accumulator = 0.0;
    let mut elapsed = 0.0;
    while elapsed < args.seconds && state.phase != GamePhase::GameOver {
        accumulator += FRAME_DT;
        elapsed += FRAME_DT;

        let mut substeps = 0;
        while accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            let input = player.input(&state, SIM_DT);
            let contacts = physics.step(&mut state.pool, SIM_DT);
            tick(&mut state, &input, &contacts, SIM_DT);
            accumulator -= SIM_DT;
            substeps += 1;
        }

        frame(&mut state, FRAME_DT);
        bus.pump();
    }
    bus.unsubscribe(subscription);

    let mut per_tier = BTreeMap::new();
    for tier in state.catalog.tiers() {
        let active = state.pool.active_count(tier.id);
        if active > 0 {
            per_tier.insert(tier.name.clone(), active);
        }
    }

    println!("Seed:         {}", args.seed);
    println!("Time:         {:.1}s ({} ticks)", elapsed, state.time_ticks);
    println!("Outcome:      {:?}", state.phase);
    println!("Merges:       {}", merges.get());
    println!("Score:        {}", state.score.current());
    println!("High score:   {}", state.score.high());
    println!("On the board: {}", state.pool.total_active());
    for (name, count) in per_tier {
        println!("  {:<12} {}", name, count);
    }
    Ok(())
}
