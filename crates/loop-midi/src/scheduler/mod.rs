//! The playback scheduler: the output clock that walks patterns, expands
//! loop triggers, and dispatches events to the master bus with
//! clock/start/stop/continue semantics (§4.4).

pub mod arena;

use crate::bus::MasterBus;
use crate::calc;
use crate::event::Pulse;
use arena::PatternArena;
use log::info;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Tempo and PPQN, published with `Release` and read with `Acquire` so the
/// scheduler's hot loop never observes a half-updated pair (§5).
#[derive(Debug)]
pub struct TempoBlock {
    bpm_bits: AtomicU64,
    ppqn: AtomicI32,
}

impl TempoBlock {
    pub fn new(bpm: f64, ppqn: i32) -> Self {
        TempoBlock {
            bpm_bits: AtomicU64::new(bpm.to_bits()),
            ppqn: AtomicI32::new(ppqn),
        }
    }

    pub fn bpm(&self) -> f64 {
        f64::from_bits(self.bpm_bits.load(Ordering::Acquire))
    }

    pub fn ppqn(&self) -> i32 {
        self.ppqn.load(Ordering::Acquire)
    }

    pub fn set_bpm(&self, bpm: f64) {
        self.bpm_bits.store(bpm.to_bits(), Ordering::Release);
    }

    pub fn set_ppqn(&self, ppqn: i32) {
        self.ppqn.store(ppqn, Ordering::Release);
    }
}

/// Converts an elapsed wall-clock duration into the tick the scheduler
/// should be at, given the tempo block's current (bpm, ppqn) pair. Pure
/// and allocation-free so it can be driven from tests without any real
/// sleeping (§4.4, §10.4).
pub fn target_tick(wall_delta: Duration, bpm: f64, ppqn: i32) -> Pulse {
    calc::micros_to_pulses(wall_delta.as_micros() as i64, bpm, ppqn)
}

/// Advances `current` toward `target` by at most `max_step` pulses. Never
/// overshoots `target` and never steps backward.
pub fn next_step_tick(current: Pulse, target: Pulse, max_step: Pulse) -> Pulse {
    if target <= current {
        return current;
    }
    let step = max_step.max(1);
    (current + step).min(target)
}

/// Whether advancing from `current` to `next` crosses a MIDI-clock
/// boundary (one clock every `PPQN/24` pulses).
pub fn crosses_clock_boundary(current: Pulse, next: Pulse, ppqn: i32) -> bool {
    let clock_pulses = (i64::from(ppqn) / calc::MIDI_CLOCK_PPQN).max(1);
    if next <= current {
        return false;
    }
    current / clock_pulses != next / clock_pulses
}

/// Whether advancing from `current` to `next` crosses a one-measure bar
/// boundary, used to resolve queued mute/unmute transitions.
pub fn crosses_bar_boundary(current: Pulse, next: Pulse, pulses_per_measure: Pulse) -> bool {
    if pulses_per_measure <= 0 || next <= current {
        return false;
    }
    current / pulses_per_measure != next / pulses_per_measure
}

/// Owns the atomic tempo block and the stop flag; the actual run loop
/// borrows a [`PatternArena`] and a [`MasterBus`] for the duration of
/// `run`.
pub struct Scheduler {
    pub tempo: Arc<TempoBlock>,
    stop_flag: Arc<AtomicBool>,
    /// The scheduling tick interval, in pulses advanced per inner loop
    /// iteration before re-checking wall time (§4.4 step 3).
    pub step_pulses: Pulse,
    cursor: Pulse,
}

impl Scheduler {
    pub fn new(bpm: f64, ppqn: i32, step_pulses: Pulse) -> Self {
        Scheduler {
            tempo: Arc::new(TempoBlock::new(bpm, ppqn)),
            stop_flag: Arc::new(AtomicBool::new(false)),
            step_pulses,
            cursor: 0,
        }
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_flag)
    }

    pub fn cursor(&self) -> Pulse {
        self.cursor
    }

    /// Runs the scheduler loop on the calling thread until `stop()` is
    /// called from elsewhere (typically via a handle to the same
    /// `Arc<AtomicBool>` this scheduler was built with). Intended to be
    /// invoked on a dedicated output thread, per §5.
    pub fn run(&mut self, arena: Arc<Mutex<PatternArena>>, bus: Arc<Mutex<MasterBus>>, resume_at: Pulse) {
        self.stop_flag.store(false, Ordering::Release);
        self.cursor = resume_at;
        let start = Instant::now();
        let start_tick = self.cursor;

        {
            let mut bus = bus.lock().unwrap_or_else(|p| p.into_inner());
            if resume_at == 0 {
                bus.start();
            } else {
                bus.continue_from(resume_at, self.tempo.ppqn());
            }
        }
        info!("scheduler run loop starting at tick {resume_at}");

        loop {
            if self.stop_flag.load(Ordering::Acquire) {
                break;
            }
            let bpm = self.tempo.bpm();
            let ppqn = self.tempo.ppqn();
            let elapsed = start.elapsed();
            let target = start_tick + target_tick(elapsed, bpm, ppqn);

            while self.cursor < target {
                if self.stop_flag.load(Ordering::Acquire) {
                    break;
                }
                let next = next_step_tick(self.cursor, target, self.step_pulses);

                {
                    let mut arena = arena.lock().unwrap_or_else(|p| p.into_inner());
                    let mut bus = bus.lock().unwrap_or_else(|p| p.into_inner());

                    if crosses_clock_boundary(self.cursor, next, ppqn) {
                        bus.emit_clock(next);
                    }

                    for handle in arena.handles() {
                        if let Some(mutex) = arena.get(handle) {
                            let mut pattern = mutex.lock().unwrap_or_else(|p| p.into_inner());
                            if crosses_bar_boundary(self.cursor, next, pattern.time_signature.pulses_per_measure(ppqn)) {
                                pattern.on_bar_boundary();
                            }
                            if pattern.is_audible() {
                                if let Some(bpm) = pattern.tempo_change_in_window(self.cursor, next) {
                                    self.tempo.set_bpm(bpm);
                                }
                                let bus_index = pattern.bus;
                                // `play` needs a `&mut dyn Port`; the bus
                                // mediates every send so the scheduler
                                // never touches a port directly.
                                pattern.play_via_bus(self.cursor, next, bus_index, &mut bus);
                            }
                        }
                    }
                }

                self.cursor = next;
            }

            if self.stop_flag.load(Ordering::Acquire) {
                break;
            }
            std::thread::yield_now();
        }

        self.flush_all(&arena, &bus);
        let mut bus = bus.lock().unwrap_or_else(|p| p.into_inner());
        bus.stop();
        info!("scheduler run loop stopped at tick {}", self.cursor);
    }

    fn flush_all(&self, arena: &Arc<Mutex<PatternArena>>, bus: &Arc<Mutex<MasterBus>>) {
        let mut arena = arena.lock().unwrap_or_else(|p| p.into_inner());
        let mut bus = bus.lock().unwrap_or_else(|p| p.into_inner());
        for handle in arena.handles() {
            if let Some(mutex) = arena.get(handle) {
                let mut pattern = mutex.lock().unwrap_or_else(|p| p.into_inner());
                let channel = pattern.channel;
                let bus_index = pattern.bus;
                for note_off in pattern.stop() {
                    let _ = bus.play(bus_index, &note_off, channel);
                }
            }
        }
    }

    pub fn request_stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_tick_matches_scenario_one_pulse_timing() {
        // 96 pulses at 120 BPM / 192 PPQN is 250ms; the inverse must hold.
        let ticks = target_tick(Duration::from_micros(250_000), 120.0, 192);
        assert_eq!(ticks, 96);
    }

    #[test]
    fn next_step_tick_never_overshoots_target() {
        assert_eq!(next_step_tick(0, 50, 100), 50);
        assert_eq!(next_step_tick(0, 500, 100), 100);
        assert_eq!(next_step_tick(500, 500, 100), 500);
    }

    #[test]
    fn crosses_clock_boundary_detects_ppqn_over_24_steps() {
        // PPQN=192 => clock every 8 pulses.
        assert!(crosses_clock_boundary(0, 8, 192));
        assert!(!crosses_clock_boundary(0, 7, 192));
        assert!(crosses_clock_boundary(7, 9, 192));
    }

    #[test]
    fn crosses_bar_boundary_detects_measure_crossings() {
        assert!(crosses_bar_boundary(760, 770, 768));
        assert!(!crosses_bar_boundary(1, 767, 768));
    }

    #[test]
    fn tempo_block_publishes_with_release_acquire_ordering() {
        let block = TempoBlock::new(120.0, 192);
        assert_eq!(block.bpm(), 120.0);
        block.set_bpm(140.0);
        assert_eq!(block.bpm(), 140.0);
        block.set_ppqn(384);
        assert_eq!(block.ppqn(), 384);
    }
}
