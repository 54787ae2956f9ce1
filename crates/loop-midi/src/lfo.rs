//! Deterministic waveform-based modulation of continuous-controller data
//! (§4.5).

use crate::event::container::EventContainer;
use crate::event::{Payload, Pulse, STATUS_CONTROL_CHANGE};
use derive_more::Display;
use std::f64::consts::PI;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Wave {
    #[display("none")]
    None,
    #[display("sine")]
    Sine,
    #[display("sawtooth")]
    Sawtooth,
    #[display("reverse sawtooth")]
    ReverseSawtooth,
    #[display("triangle")]
    Triangle,
}

/// Evaluates the selected waveform at phase angle `theta` (radians),
/// returning a value in `[-1, 1]`.
fn evaluate(wave: Wave, theta: f64) -> f64 {
    let turns = theta / (2.0 * PI);
    let frac = turns.rem_euclid(1.0);
    match wave {
        Wave::None => 0.0,
        Wave::Sine => theta.sin(),
        Wave::Sawtooth => frac * 2.0 - 1.0,
        Wave::ReverseSawtooth => 1.0 - frac * 2.0,
        Wave::Triangle => {
            let shifted = (frac + 0.25).rem_euclid(1.0);
            2.0 * (2.0 * shifted - 1.0).abs() - 1.0
        }
    }
}

/// Walks every event in `container` matching `status` (and, for
/// control-change, `cc`), replacing its primary data byte with
/// `clamp(value + range * w(theta), 0, 127)` rounded to the nearest
/// integer. `wave = None` is a no-op over the data, matching the
/// still-recorded-undo behavior documented by the caller.
///
/// `theta`'s period is `length` pulses, unless `use_measures` is set, in
/// which case it is `measure_pulses` pulses — one LFO cycle per measure
/// rather than one cycle per whole pattern — matching the original's
/// `use_measures` toggle (qlfoframe.cpp).
#[allow(clippy::too_many_arguments)]
pub fn apply(
    container: &mut EventContainer,
    length: Pulse,
    measure_pulses: Pulse,
    use_measures: bool,
    value: f64,
    range: f64,
    speed: f64,
    phase: f64,
    wave: Wave,
    status: u8,
    cc: Option<u8>,
) {
    if length <= 0 {
        return;
    }
    let period = if use_measures && measure_pulses > 0 {
        measure_pulses
    } else {
        length
    };
    let ids: Vec<_> = container
        .iter()
        .filter(|(_, e)| matches(e, status, cc))
        .map(|(id, _)| id)
        .collect();

    for id in ids {
        let Some(event) = container.get_mut(id) else { continue };
        let theta = 2.0 * PI * (event.timestamp as f64 / period as f64) * speed + 2.0 * PI * phase;
        let w = evaluate(wave, theta);
        let new_value = (value + range * w).round().clamp(0.0, 127.0) as u8;
        if let Payload::Channel { data1, data2 } = &mut event.payload {
            if event.status & 0xF0 == STATUS_CONTROL_CHANGE {
                *data2 = Some(new_value);
            } else if data2.is_some() {
                *data2 = Some(new_value);
            } else {
                *data1 = new_value;
            }
        }
    }
}

fn matches(event: &crate::event::Event, status: u8, cc: Option<u8>) -> bool {
    if event.status_kind() != status {
        return false;
    }
    if status == STATUS_CONTROL_CHANGE {
        if let Some(cc) = cc {
            return event.controller_number() == Some(cc);
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;

    fn cc_pattern() -> EventContainer {
        let mut c = EventContainer::new();
        for tick in [0, 192, 384, 576] {
            c.append(Event::control_change(tick, 0, 74, 64));
        }
        c
    }

    #[test]
    fn sine_lfo_on_cc_matches_reference_scenario() {
        let mut c = cc_pattern();
        apply(&mut c, 768, 192, false, 64.0, 63.0, 1.0, 0.0, Wave::Sine, STATUS_CONTROL_CHANGE, Some(74));
        let values: Vec<u8> = c
            .iter()
            .map(|(_, e)| match e.payload {
                Payload::Channel { data2: Some(v), .. } => v,
                _ => unreachable!(),
            })
            .collect();
        // theta = 0, pi/2, pi, 3pi/2 -> sin = 0, 1, 0, -1
        assert_eq!(values, vec![64, 127, 64, 1]);
    }

    #[test]
    fn none_wave_is_a_no_op_on_values() {
        let mut c = cc_pattern();
        apply(&mut c, 768, 192, false, 64.0, 63.0, 1.0, 0.0, Wave::None, STATUS_CONTROL_CHANGE, Some(74));
        for (_, e) in c.iter() {
            match e.payload {
                Payload::Channel { data2: Some(v), .. } => assert_eq!(v, 64),
                _ => unreachable!(),
            }
        }
    }

    #[test]
    fn lfo_is_idempotent_for_fixed_parameters() {
        let mut c = cc_pattern();
        apply(&mut c, 768, 192, false, 64.0, 63.0, 1.0, 0.0, Wave::Triangle, STATUS_CONTROL_CHANGE, Some(74));
        let first: Vec<u8> = c
            .iter()
            .map(|(_, e)| match e.payload {
                Payload::Channel { data2: Some(v), .. } => v,
                _ => unreachable!(),
            })
            .collect();
        apply(&mut c, 768, 192, false, 64.0, 63.0, 1.0, 0.0, Wave::Triangle, STATUS_CONTROL_CHANGE, Some(74));
        let second: Vec<u8> = c
            .iter()
            .map(|(_, e)| match e.payload {
                Payload::Channel { data2: Some(v), .. } => v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn only_matching_controller_number_is_touched() {
        let mut c = EventContainer::new();
        c.append(Event::control_change(0, 0, 74, 64));
        c.append(Event::control_change(0, 0, 10, 64));
        apply(&mut c, 768, 192, false, 0.0, 63.0, 1.0, 0.25, Wave::Sine, STATUS_CONTROL_CHANGE, Some(74));
        let values: Vec<u8> = c
            .iter()
            .map(|(_, e)| match e.payload {
                Payload::Channel { data2: Some(v), .. } => v,
                _ => unreachable!(),
            })
            .collect();
        // cc 10 is untouched; only cc 74 moved off its base value of 64.
        assert_eq!(values[1], 64);
    }
}
