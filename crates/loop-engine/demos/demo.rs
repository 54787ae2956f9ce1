use anyhow::{anyhow, Context};
use loop_engine::{Engine, EngineConfig};
use loop_midi::event::Event;
use loop_midi::port::dummy::DummyPort;
use std::time::Duration;

/// A small demonstration: one bar of a one-note pattern, played through
/// the dummy backend so it runs anywhere without real MIDI hardware.
fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut engine = Engine::new(EngineConfig::default());
    {
        let mut bus = engine
            .bus()
            .lock()
            .map_err(|_| anyhow!("master bus mutex poisoned"))?;
        bus.add_output(Box::new(DummyPort::new("demo-out")), loop_midi::bus::ClockMode::ModClock);
    }

    let handle = engine.add_pattern("demo");
    {
        let arena = engine
            .arena()
            .lock()
            .map_err(|_| anyhow!("pattern arena mutex poisoned"))?;
        let mutex = arena.get(handle).context("pattern handle is live")?;
        let mut pattern = mutex.lock().map_err(|_| anyhow!("pattern mutex poisoned"))?;
        pattern.add_event(Event::note_on(0, 0, 60, 100));
        pattern.add_event(Event::note_off(96, 0, 60, 0));
        pattern.request_play();
    }

    log::info!("starting engine at {} bpm", engine.bpm());
    engine.start();
    std::thread::sleep(Duration::from_millis(500));
    engine.stop();
    log::info!("engine stopped");
    Ok(())
}
