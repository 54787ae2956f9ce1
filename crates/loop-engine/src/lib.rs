//! Wires a pattern arena, a master bus and a scheduler into one object.
//! This is the layer a GUI, a MIDI-file loader, or a CLI would sit on top
//! of; none of those live here.

use loop_midi::bus::MasterBus;
use loop_midi::calc::TimeSignature;
use loop_midi::pattern::{Pattern, ShrinkMode};
use loop_midi::scheduler::arena::{PatternArena, PatternHandle};
use loop_midi::scheduler::Scheduler;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// One place new call sites read defaults from: the PPQN/BPM the engine
/// starts at, the scheduler's step size, how many undo snapshots each
/// pattern keeps, and which shrink mode `set_length` uses by default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub ppqn: i32,
    pub default_bpm: f64,
    pub step_pulses: i64,
    pub undo_depth: usize,
    pub shrink_mode: ShrinkMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            ppqn: loop_midi::calc::DEFAULT_PPQN,
            default_bpm: 120.0,
            step_pulses: 24,
            undo_depth: 64,
            shrink_mode: ShrinkMode::SynthesizeNoteOff,
        }
    }
}

pub struct Engine {
    config: EngineConfig,
    arena: Arc<Mutex<PatternArena>>,
    bus: Arc<Mutex<MasterBus>>,
    tempo: Arc<loop_midi::scheduler::TempoBlock>,
    stop_flag: Arc<std::sync::atomic::AtomicBool>,
    /// Owns the scheduler between runs; taken by [`Self::start`] and moved
    /// onto the dedicated output thread, handed back by [`Self::stop`] so
    /// a later `start()` resumes from where it left off.
    scheduler: Option<Scheduler>,
    run_thread: Option<JoinHandle<Scheduler>>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let scheduler = Scheduler::new(config.default_bpm, config.ppqn, config.step_pulses);
        let tempo = Arc::clone(&scheduler.tempo);
        let stop_flag = scheduler.stop_flag();
        Engine {
            arena: Arc::new(Mutex::new(PatternArena::new())),
            bus: Arc::new(Mutex::new(MasterBus::new())),
            config,
            tempo,
            stop_flag,
            scheduler: Some(scheduler),
            run_thread: None,
        }
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn bus(&self) -> &Arc<Mutex<MasterBus>> {
        &self.bus
    }

    /// Creates a new pattern sized to one measure of 4/4 at the engine's
    /// PPQN and adds it to the arena, returning its handle.
    pub fn add_pattern(&self, name: impl Into<String>) -> PatternHandle {
        let mut pattern = Pattern::new(name, self.config.ppqn, TimeSignature::default(), self.config.undo_depth);
        pattern.shrink_mode = self.config.shrink_mode;
        let mut arena = self.arena.lock().unwrap_or_else(|p| p.into_inner());
        arena.insert(pattern)
    }

    pub fn arena(&self) -> &Arc<Mutex<PatternArena>> {
        &self.arena
    }

    pub fn set_bpm(&self, bpm: f64) {
        self.tempo.set_bpm(bpm);
    }

    pub fn bpm(&self) -> f64 {
        self.tempo.bpm()
    }

    /// Opens every configured port on the bus and starts the scheduler on
    /// a dedicated thread, per the one-output-thread concurrency model.
    /// A no-op if the scheduler is already running.
    pub fn start(&mut self) {
        let Some(mut scheduler) = self.scheduler.take() else {
            return;
        };
        {
            let mut bus = self.bus.lock().unwrap_or_else(|p| p.into_inner());
            for (index, err) in bus.init() {
                log::warn!("port {index} failed to open during engine start: {err}");
            }
        }
        let arena = Arc::clone(&self.arena);
        let bus = Arc::clone(&self.bus);
        let resume_at = scheduler.cursor();

        self.run_thread = Some(std::thread::spawn(move || {
            scheduler.run(arena, bus, resume_at);
            scheduler
        }));
    }

    /// Signals the scheduler to stop and waits for its thread to exit,
    /// reclaiming the scheduler so a later `start()` can resume.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, std::sync::atomic::Ordering::Release);
        if let Some(handle) = self.run_thread.take() {
            if let Ok(scheduler) = handle.join() {
                self.scheduler = Some(scheduler);
            }
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.run_thread.is_some() {
            self.stop();
        }
    }
}
