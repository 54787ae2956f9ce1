//! Pure functions for converting between pulses, wall time, tempo and
//! musical measures, plus a handful of string/byte helpers shared by the
//! event layer.
//!
//! Nothing in this module allocates on a hot path, and nothing here holds
//! a lock; it exists so the scheduler, the event meta-decoders and the
//! pattern length logic all agree on one set of formulas.

pub mod scale;

use derive_more::{Debug, Display, Error};

/// The standard MIDI beat clock rate: 24 pulses are emitted per quarter note
/// regardless of PPQN.
pub const MIDI_CLOCK_PPQN: i64 = 24;

/// Default pulses-per-quarter-note used when an engine is not configured
/// otherwise.
pub const DEFAULT_PPQN: i32 = 192;

pub const MIN_PPQN: i32 = 32;
pub const MAX_PPQN: i32 = 19200;

pub const MIN_BPM: f64 = 2.0;
pub const MAX_BPM: f64 = 600.0;

/// Validates a PPQN value against the allowed range.
#[inline]
pub fn ppqn_is_valid(ppqn: i32) -> bool {
    (MIN_PPQN..=MAX_PPQN).contains(&ppqn)
}

/// Validates a BPM value against the allowed range.
#[inline]
pub fn bpm_is_valid(bpm: f64) -> bool {
    (MIN_BPM..=MAX_BPM).contains(&bpm)
}

/// Converts BPM to microseconds-per-quarter-note.
///
/// Inverse of [`tempo_us_to_bpm`].
#[inline]
pub fn bpm_to_tempo_us(bpm: f64) -> f64 {
    if bpm > 0.0 { 60_000_000.0 / bpm } else { 0.0 }
}

/// Converts microseconds-per-quarter-note to BPM.
#[inline]
pub fn tempo_us_to_bpm(tempo_us: f64) -> f64 {
    if tempo_us > 0.0 { 60_000_000.0 / tempo_us } else { 0.0 }
}

#[derive(Debug, Display, Error)]
pub enum TempoBytesError {
    #[display("tempo meta-event us-per-quarter was zero")]
    ZeroTempo,
}

/// Encodes a BPM value as the big-endian 3-byte microseconds-per-quarter-note
/// payload of a `0xFF 0x51 0x03` tempo meta-event.
pub fn bpm_to_tempo_bytes(bpm: f64) -> [u8; 3] {
    let us = bpm_to_tempo_us(bpm).round() as u32;
    [(us >> 16) as u8, (us >> 8) as u8, us as u8]
}

/// Decodes the 3-byte microseconds-per-quarter-note payload of a tempo
/// meta-event back into BPM.
pub fn tempo_bytes_to_bpm(bytes: [u8; 3]) -> Result<f64, TempoBytesError> {
    let us = (u32::from(bytes[0]) << 16) | (u32::from(bytes[1]) << 8) | u32::from(bytes[2]);
    if us == 0 {
        return Err(TempoBytesError::ZeroTempo);
    }
    Ok(tempo_us_to_bpm(f64::from(us)))
}

/// A coarse tempo encoding (0..127) used by certain control surfaces, as a
/// complement to the bit-exact tempo meta-event bytes above. The mapping is
/// linear across the valid BPM range.
pub fn tempo_to_note_value(bpm: f64) -> u8 {
    let bpm = bpm.clamp(MIN_BPM, MAX_BPM);
    let fraction = (bpm - MIN_BPM) / (MAX_BPM - MIN_BPM);
    (fraction * 127.0).round() as u8
}

/// Inverse of [`tempo_to_note_value`].
pub fn note_value_to_tempo(note: u8) -> f64 {
    let fraction = f64::from(note.min(127)) / 127.0;
    MIN_BPM + fraction * (MAX_BPM - MIN_BPM)
}

/// Time signature: `beats_per_bar` over `beat_width` (a power of two).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub beats_per_bar: u8,
    pub beat_width: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature {
            beats_per_bar: 4,
            beat_width: 4,
        }
    }
}

impl TimeSignature {
    /// Pulses per single beat under the given PPQN.
    #[inline]
    pub fn pulses_per_beat(&self, ppqn: i32) -> i64 {
        (4 * i64::from(ppqn)) / i64::from(self.beat_width)
    }

    /// Pulses per one measure (bar) under the given PPQN.
    #[inline]
    pub fn pulses_per_measure(&self, ppqn: i32) -> i64 {
        self.pulses_per_beat(ppqn) * i64::from(self.beats_per_bar)
    }

    /// `log2(beat_width)`, as used by the time-signature meta-event's `dd` byte.
    pub fn log2_beat_width(&self) -> u8 {
        beat_log2(self.beat_width)
    }
}

/// Returns `log2(value)` for a power-of-two `value`, clamping to 0 for 0/1.
pub fn beat_log2(value: u8) -> u8 {
    let mut v = value;
    let mut log = 0u8;
    while v > 1 {
        v >>= 1;
        log += 1;
    }
    log
}

/// Returns `2^logbase2`.
pub fn beat_pow2(logbase2: u8) -> u8 {
    1u8 << logbase2
}

/// Converts a pulse count to whole measures under the given time signature
/// and PPQN. Returns `None` if `beat_width` does not evenly divide `4*PPQN`
/// (the pulse round-trip invariant only holds in that case).
pub fn pulses_to_measures(pulses: i64, sig: TimeSignature, ppqn: i32) -> Option<i64> {
    let ppm = sig.pulses_per_measure(ppqn);
    if ppm == 0 {
        return None;
    }
    if (4 * i64::from(ppqn)) % i64::from(sig.beat_width) != 0 {
        return None;
    }
    Some(pulses / ppm)
}

/// Converts a whole number of measures to a pulse count under the given time
/// signature and PPQN. Inverse of [`pulses_to_measures`] when it is defined.
pub fn measures_to_pulses(measures: i64, sig: TimeSignature, ppqn: i32) -> i64 {
    measures * sig.pulses_per_measure(ppqn)
}

/// Converts a pulse count to wall-clock microseconds at a fixed tempo.
pub fn pulses_to_micros(pulses: i64, bpm: f64, ppqn: i32) -> i64 {
    if bpm <= 0.0 || ppqn <= 0 {
        return 0;
    }
    // micros = pulses * (60_000_000 / (bpm * ppqn))
    ((pulses as f64) * 60_000_000.0 / (bpm * f64::from(ppqn))).round() as i64
}

/// Converts wall-clock microseconds to a pulse count at a fixed tempo.
pub fn micros_to_pulses(micros: i64, bpm: f64, ppqn: i32) -> i64 {
    if bpm <= 0.0 || ppqn <= 0 {
        return 0;
    }
    ((micros as f64) * bpm * f64::from(ppqn) / 60_000_000.0) as i64
}

/// Rescales a pulse count from one PPQN to another, used when the engine's
/// PPQN is changed and all stored pulse counts must be rescaled
/// proportionally.
pub fn rescale_pulses(pulses: i64, from_ppqn: i32, to_ppqn: i32) -> i64 {
    if from_ppqn == to_ppqn || from_ppqn == 0 {
        return pulses;
    }
    (pulses * i64::from(to_ppqn)) / i64::from(from_ppqn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tempo_round_trip_within_tolerance() {
        let mut bpm = MIN_BPM;
        while bpm <= MAX_BPM {
            let bytes = bpm_to_tempo_bytes(bpm);
            let back = tempo_bytes_to_bpm(bytes).unwrap();
            assert!((bpm - back).abs() < 0.01, "{bpm} round-tripped to {back}");
            bpm += 0.37;
        }
    }

    #[test]
    fn tempo_bytes_are_big_endian_and_bit_exact_for_120_bpm() {
        // 120 BPM => 500_000 us/qn => 0x07A120
        let bytes = bpm_to_tempo_bytes(120.0);
        assert_eq!(bytes, [0x07, 0xA1, 0x20]);
        assert!((tempo_bytes_to_bpm(bytes).unwrap() - 120.0).abs() < 1e-9);
    }

    #[test]
    fn zero_tempo_bytes_are_rejected() {
        assert!(tempo_bytes_to_bpm([0, 0, 0]).is_err());
    }

    #[test]
    fn pulse_measure_round_trip_when_beat_width_divides_evenly() {
        let ppqn = 192;
        for bpb in 1..=16u8 {
            for bw_pow in 0..=4u8 {
                let bw = beat_pow2(bw_pow);
                let sig = TimeSignature {
                    beats_per_bar: bpb,
                    beat_width: bw,
                };
                if (4 * ppqn) % i32::from(bw) != 0 {
                    continue;
                }
                for measures in 0..8i64 {
                    let pulses = measures_to_pulses(measures, sig, ppqn);
                    let back = pulses_to_measures(pulses, sig, ppqn).unwrap();
                    assert_eq!(back, measures);
                }
            }
        }
    }

    #[test]
    fn one_bar_of_4_4_at_192_ppqn_is_768_pulses() {
        let sig = TimeSignature::default();
        assert_eq!(sig.pulses_per_measure(192), 768);
    }

    #[test]
    fn pulses_to_micros_matches_scenario_one() {
        // 96 pulses at 120 BPM / 192 PPQN should be 250ms.
        let micros = pulses_to_micros(96, 120.0, 192);
        assert_eq!(micros, 250_000);
    }

    #[test]
    fn rescale_pulses_is_proportional() {
        assert_eq!(rescale_pulses(192, 192, 384), 384);
        assert_eq!(rescale_pulses(192, 384, 192), 96);
    }

    #[test]
    fn note_value_round_trips_coarsely() {
        for note in 0..=127u8 {
            let bpm = note_value_to_tempo(note);
            let back = tempo_to_note_value(bpm);
            assert!((i16::from(back) - i16::from(note)).abs() <= 1);
        }
    }
}
