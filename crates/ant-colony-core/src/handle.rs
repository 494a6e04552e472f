//! Thread-facing wrapper around [`World`].
//!
//! The world sits behind a single coarse lock. A background setup thread
//! builds the scene once and then idles until the simulation is stopped;
//! ticks come either from the caller ([`SimulationHandle::tick`]) or from an
//! optional real-time ticker thread. The stop flag is checked before every
//! tick, and a tick already in progress finishes before [`World::stop`] runs.

use crate::config::{ParameterStore, Parameters};
use crate::world::{StepTimings, World};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Upper bound on how long the setup thread sleeps between stop checks.
const IDLE_WAIT: Duration = Duration::from_millis(250);
/// Wall-clock deltas above this are clamped before being fed to a tick.
const MAX_REALTIME_DT: f64 = 0.1;

fn lock(world: &Mutex<World>) -> MutexGuard<'_, World> {
    world.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct SimulationHandle {
    world: Arc<Mutex<World>>,
    params: ParameterStore,
    stop_requested: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    ready: Receiver<()>,
    is_ready: bool,
    setup_thread: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
}

impl SimulationHandle {
    /// Wrap `world` and run `setup` against it on a background thread.
    pub fn launch<F>(world: World, setup: F) -> io::Result<Self>
    where
        F: FnOnce(&mut World) + Send + 'static,
    {
        let params = world.params().clone();
        let world = Arc::new(Mutex::new(world));
        let stop_requested = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready) = mpsc::channel();

        let setup_thread = {
            let world = Arc::clone(&world);
            let stop = Arc::clone(&stop_requested);
            thread::Builder::new()
                .name("colony-setup".into())
                .spawn(move || {
                    {
                        let mut guard = lock(&world);
                        // a stop may have landed while we waited for the lock
                        if !stop.load(Ordering::Acquire) && !guard.is_stopped() {
                            let started = Instant::now();
                            setup(&mut guard);
                            debug!(elapsed_ms = started.elapsed().as_millis() as u64, "scene setup done");
                        }
                    }
                    // receiver may already be gone
                    let _ = ready_tx.send(());
                    while !stop.load(Ordering::Acquire) {
                        thread::park_timeout(IDLE_WAIT);
                    }
                })?
        };

        Ok(Self {
            world,
            params,
            stop_requested,
            paused: Arc::new(AtomicBool::new(false)),
            ready,
            is_ready: false,
            setup_thread: Some(setup_thread),
            ticker: None,
        })
    }

    /// Block until scene setup has finished, up to `timeout`. Returns false
    /// on timeout or when setup panicked.
    pub fn wait_ready(&mut self, timeout: Duration) -> bool {
        if !self.is_ready {
            self.is_ready = self.ready.recv_timeout(timeout).is_ok();
        }
        self.is_ready
    }

    /// Advance one tick. `None` when stopped or paused.
    pub fn tick(&self, dt: f64) -> Option<StepTimings> {
        if self.is_stopped() || self.is_paused() {
            return None;
        }
        Some(lock(&self.world).tick(dt))
    }

    pub fn with_world<R>(&self, f: impl FnOnce(&World) -> R) -> R {
        f(&lock(&self.world))
    }

    pub fn with_world_mut<R>(&self, f: impl FnOnce(&mut World) -> R) -> R {
        f(&mut lock(&self.world))
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    /// Update runtime parameters; they take effect on the next tick. Values
    /// outside their range are clamped, and a warning is logged when that
    /// changed the request.
    pub fn update_params<F>(&self, f: F) -> Parameters
    where
        F: FnOnce(&mut Parameters),
    {
        let mut requested = None;
        let stored = self.params.update(|p| {
            f(p);
            requested = Some(*p);
        });
        if let Some(requested) = requested.filter(|r| *r != stored) {
            warn!(?requested, ?stored, "parameter update clamped");
        }
        stored
    }

    /// Spawn a ticker that advances the world with wall-clock deltas about
    /// `hz` times per second. Does nothing if one is already running.
    pub fn start_realtime(&mut self, hz: f64) -> io::Result<()> {
        if self.ticker.is_some() || self.is_stopped() {
            return Ok(());
        }
        let hz = if hz.is_finite() && hz > 0.0 { hz } else { 60.0 };
        let period = Duration::from_secs_f64(1.0 / hz);
        let world = Arc::clone(&self.world);
        let stop = Arc::clone(&self.stop_requested);
        let paused = Arc::clone(&self.paused);

        let ticker = thread::Builder::new()
            .name("colony-ticker".into())
            .spawn(move || {
                let mut last = Instant::now();
                while !stop.load(Ordering::Acquire) {
                    thread::park_timeout(period);
                    let now = Instant::now();
                    let dt = now.duration_since(last).as_secs_f64().min(MAX_REALTIME_DT);
                    last = now;
                    if paused.load(Ordering::Acquire) || stop.load(Ordering::Acquire) {
                        continue;
                    }
                    lock(&world).tick(dt);
                }
            })?;
        info!(hz, "real-time ticker started");
        self.ticker = Some(ticker);
        Ok(())
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Request a stop and clear the world. Safe to call repeatedly and from
    /// any thread holding a reference to the handle.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        lock(&self.world).stop();
        for worker in [&self.setup_thread, &self.ticker].into_iter().flatten() {
            worker.thread().unpark();
        }
    }

    fn join_workers(&mut self) {
        for worker in [self.setup_thread.take(), self.ticker.take()]
            .into_iter()
            .flatten()
        {
            if worker.join().is_err() {
                warn!("simulation worker thread panicked");
            }
        }
    }

    /// Stop and wait for the background threads to exit.
    pub fn join(mut self) {
        self.stop();
        self.join_workers();
    }
}

impl Drop for SimulationHandle {
    fn drop(&mut self) {
        self.stop();
        self.join_workers();
    }
}
