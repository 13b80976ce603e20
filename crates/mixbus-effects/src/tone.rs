//! Polyphonic sine instrument for note clips.

use core::f32::consts::TAU;

use libm::{powf, sinf};
use mixbus_core::Instrument;

/// Voices per instrument. The oldest voice is stolen when all are busy.
pub const MAX_VOICES: usize = 16;

/// Equal-tempered frequency of a MIDI key (A4 = 69 = 440 Hz).
#[inline]
pub fn key_to_hz(key: u8) -> f32 {
    440.0 * powf(2.0, (f32::from(key) - 69.0) / 12.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Idle,
    Attack,
    Sustain,
    Release,
}

#[derive(Debug, Clone, Copy)]
struct Voice {
    key: u8,
    phase: f32,
    step: f32,
    level: f32,
    peak: f32,
    stage: Stage,
    age: u64,
}

impl Voice {
    const IDLE: Voice = Voice {
        key: 0,
        phase: 0.0,
        step: 0.0,
        level: 0.0,
        peak: 0.0,
        stage: Stage::Idle,
        age: 0,
    };

    #[inline]
    fn advance(&mut self, attack_rate: f32, release_rate: f32) -> f32 {
        match self.stage {
            Stage::Idle => return 0.0,
            Stage::Attack => {
                self.level += attack_rate * self.peak;
                if self.level >= self.peak {
                    self.level = self.peak;
                    self.stage = Stage::Sustain;
                }
            }
            Stage::Sustain => {}
            Stage::Release => {
                self.level -= release_rate * self.peak;
                if self.level <= 0.0 {
                    *self = Self::IDLE;
                    return 0.0;
                }
            }
        }
        let out = sinf(self.phase * TAU) * self.level;
        self.phase += self.step;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        out
    }
}

/// Sine voices with linear attack and release.
///
/// # Example
///
/// ```rust
/// use mixbus_core::Instrument;
/// use mixbus_effects::Tone;
///
/// let mut tone = Tone::new(48000.0);
/// tone.note_on(69, 1.0);
/// let mut peak = 0.0f32;
/// for _ in 0..4800 {
///     peak = peak.max(tone.render().0.abs());
/// }
/// assert!(peak > 0.2);
/// ```
#[derive(Debug, Clone)]
pub struct Tone {
    voices: [Voice; MAX_VOICES],
    sample_rate: f32,
    attack_ms: f32,
    release_ms: f32,
    attack_rate: f32,
    release_rate: f32,
    gain: f32,
    clock: u64,
}

impl Tone {
    /// 5 ms attack, 80 ms release.
    pub fn new(sample_rate: f32) -> Self {
        let mut tone = Self {
            voices: [Voice::IDLE; MAX_VOICES],
            sample_rate,
            attack_ms: 5.0,
            release_ms: 80.0,
            attack_rate: 0.0,
            release_rate: 0.0,
            gain: 0.25,
            clock: 0,
        };
        tone.update_rates();
        tone
    }

    /// Set the attack time.
    pub fn set_attack_ms(&mut self, ms: f32) {
        self.attack_ms = ms.max(0.1);
        self.update_rates();
    }

    /// Set the release time.
    pub fn set_release_ms(&mut self, ms: f32) {
        self.release_ms = ms.max(0.1);
        self.update_rates();
    }

    /// Voices currently sounding.
    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.stage != Stage::Idle).count()
    }

    fn update_rates(&mut self) {
        self.attack_rate = 1000.0 / (self.attack_ms * self.sample_rate);
        self.release_rate = 1000.0 / (self.release_ms * self.sample_rate);
    }

    fn free_voice(&self) -> usize {
        if let Some(i) = self.voices.iter().position(|v| v.stage == Stage::Idle) {
            return i;
        }
        self.voices
            .iter()
            .enumerate()
            .min_by_key(|(_, v)| v.age)
            .map_or(0, |(i, _)| i)
    }
}

impl Instrument for Tone {
    fn note_on(&mut self, key: u8, velocity: f32) {
        self.clock += 1;
        let index = self.free_voice();
        let voice = &mut self.voices[index];
        voice.key = key;
        voice.phase = 0.0;
        voice.step = key_to_hz(key) / self.sample_rate;
        voice.level = 0.0;
        voice.peak = velocity.clamp(0.0, 1.0) * self.gain;
        voice.stage = Stage::Attack;
        voice.age = self.clock;
    }

    fn note_off(&mut self, key: u8) {
        for voice in &mut self.voices {
            if voice.key == key && matches!(voice.stage, Stage::Attack | Stage::Sustain) {
                voice.stage = Stage::Release;
            }
        }
    }

    fn all_notes_off(&mut self) {
        for voice in &mut self.voices {
            if voice.stage != Stage::Idle {
                voice.stage = Stage::Release;
            }
        }
    }

    #[inline]
    fn render(&mut self) -> (f32, f32) {
        let (attack, release) = (self.attack_rate, self.release_rate);
        let sum: f32 = self
            .voices
            .iter_mut()
            .map(|v| v.advance(attack, release))
            .sum();
        (sum, sum)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        let ratio = self.sample_rate / sample_rate;
        for voice in &mut self.voices {
            voice.step *= ratio;
        }
        self.sample_rate = sample_rate;
        self.update_rates();
    }

    fn reset(&mut self) {
        self.voices = [Voice::IDLE; MAX_VOICES];
        self.clock = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_to_hz() {
        assert!((key_to_hz(69) - 440.0).abs() < 1e-3);
        assert!((key_to_hz(81) - 880.0).abs() < 1e-2);
    }

    #[test]
    fn test_release_returns_to_idle() {
        let mut tone = Tone::new(48000.0);
        tone.note_on(60, 1.0);
        for _ in 0..480 {
            tone.render();
        }
        assert_eq!(tone.active_voices(), 1);
        tone.note_off(60);
        // 80 ms release
        for _ in 0..4000 {
            tone.render();
        }
        assert_eq!(tone.active_voices(), 0);
        assert_eq!(tone.render(), (0.0, 0.0));
    }

    #[test]
    fn test_voice_stealing() {
        let mut tone = Tone::new(48000.0);
        for key in 0..(MAX_VOICES as u8 + 4) {
            tone.note_on(key, 1.0);
        }
        assert_eq!(tone.active_voices(), MAX_VOICES);
    }

    #[test]
    fn test_output_bounded() {
        let mut tone = Tone::new(48000.0);
        for key in 60..76 {
            tone.note_on(key, 1.0);
        }
        for _ in 0..4800 {
            let (l, _) = tone.render();
            assert!(l.abs() <= MAX_VOICES as f32 * 0.25 + 1e-3);
        }
    }
}
