//! Sample clock and transport.
//!
//! The playhead is kept in frames and advanced once per audio buffer. Musical
//! positions (loop points, clip anchors) are in ticks: 48 per beat, 4 beats
//! per bar. Tempo changes keep the tick position, so the playhead stays on
//! the same beat.

use libm::{floor, round};

/// Ticks per quarter-note beat.
pub const TICKS_PER_BEAT: u64 = 48;

/// Beats per bar.
pub const BEATS_PER_BAR: u64 = 4;

/// Ticks per bar.
pub const TICKS_PER_BAR: u64 = TICKS_PER_BEAT * BEATS_PER_BAR;

/// Lowest accepted tempo.
pub const MIN_BPM: f32 = 10.0;

/// Highest accepted tempo.
pub const MAX_BPM: f32 = 999.0;

/// Playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// Playhead parked.
    #[default]
    Stopped,
    /// Playhead advancing.
    Playing,
    /// Playhead advancing with recording armed.
    Recording,
}

impl TransportState {
    /// Whether the playhead advances.
    pub fn is_running(self) -> bool {
        !matches!(self, Self::Stopped)
    }
}

/// Where the playhead goes on stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBehavior {
    /// Back to zero, or to the loop start while looping.
    #[default]
    GoToStart,
    /// Stay where playback stopped.
    Hold,
    /// Back to the position where playback began.
    ReturnToPlayStart,
}

/// Loop region in ticks, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopRange {
    /// First tick inside the loop.
    pub start_tick: u64,
    /// First tick after the loop.
    pub end_tick: u64,
}

impl LoopRange {
    /// Loop over whole bars `[start_bar, end_bar)`, zero based.
    pub fn bars(start_bar: u64, end_bar: u64) -> Self {
        Self {
            start_tick: start_bar * TICKS_PER_BAR,
            end_tick: end_bar * TICKS_PER_BAR,
        }
    }
}

/// Tick/frame conversion for a sample rate and tempo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickTiming {
    /// Sample rate in Hz.
    pub sample_rate: f32,
    /// Tempo in beats per minute.
    pub bpm: f32,
}

impl TickTiming {
    /// Timing for `sample_rate` at `bpm`.
    pub fn new(sample_rate: f32, bpm: f32) -> Self {
        Self { sample_rate, bpm }
    }

    /// `sample_rate * 60 / (bpm * 48)`.
    #[inline]
    pub fn frames_per_tick(&self) -> f64 {
        f64::from(self.sample_rate) * 60.0 / (f64::from(self.bpm) * TICKS_PER_BEAT as f64)
    }

    /// First frame of `tick`.
    #[inline]
    pub fn tick_to_frame(&self, tick: u64) -> u64 {
        round(tick as f64 * self.frames_per_tick()) as u64
    }

    /// Fractional tick at `frame`.
    #[inline]
    pub fn frame_to_tick(&self, frame: u64) -> f64 {
        frame as f64 / self.frames_per_tick()
    }
}

/// Result of advancing the clock by one buffer.
///
/// When the loop wraps inside the buffer, frames `[0, split)` belong to the
/// range starting at `start_frame` and frames `[split, len)` continue from
/// `resume_frame` (the loop start). A loop shorter than the buffer wraps
/// more than once; [`segments`](Self::segments) yields every piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    /// Playhead at the start of the buffer.
    pub start_frame: u64,
    /// Frames before the wrap point. Equals the buffer size if no wrap.
    pub split: usize,
    /// Playhead for frame `split`.
    pub resume_frame: u64,
    /// Whether the loop wrapped in this buffer.
    pub wrapped: bool,
    /// Whether the transport was running.
    pub running: bool,
    /// Loop length in frames when wrapped, else 0.
    pub loop_frames: u64,
}

impl Advance {
    /// Contiguous playhead ranges covering a buffer of `frames`.
    ///
    /// Yields `(offset, len, playhead)`: buffer frames `[offset, offset + len)`
    /// play from `playhead`. Every piece after the first starts at the loop
    /// start.
    pub fn segments(&self, frames: usize) -> Segments {
        Segments {
            advance: *self,
            frames,
            offset: 0,
        }
    }
}

/// Iterator returned by [`Advance::segments`].
#[derive(Debug, Clone)]
pub struct Segments {
    advance: Advance,
    frames: usize,
    offset: usize,
}

impl Iterator for Segments {
    type Item = (usize, usize, u64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.frames {
            return None;
        }
        let at = self.offset;
        let piece = if at == 0 {
            (0, self.advance.split.min(self.frames), self.advance.start_frame)
        } else {
            let len = (self.frames - at).min(self.advance.loop_frames as usize);
            (at, len, self.advance.resume_frame)
        };
        if piece.1 == 0 {
            self.offset = self.frames;
            return None;
        }
        self.offset += piece.1;
        Some(piece)
    }
}

/// Transport errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Record toggled while stopped.
    NotRunning,
    /// Loop end is not after loop start.
    InvalidLoop {
        /// Requested start tick.
        start_tick: u64,
        /// Requested end tick.
        end_tick: u64,
    },
}

impl core::fmt::Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotRunning => write!(f, "transport is stopped"),
            Self::InvalidLoop {
                start_tick,
                end_tick,
            } => write!(
                f,
                "loop end {end_tick} must be after loop start {start_tick}"
            ),
        }
    }
}

impl core::error::Error for TransportError {}

/// Playback clock with tempo, loop and stop policy.
///
/// ```rust
/// use mixbus_core::transport::{LoopRange, Transport};
///
/// let mut t = Transport::new(48000.0, 120.0);
/// t.set_loop(Some(LoopRange::bars(0, 1))).unwrap();
/// t.play();
/// // one bar at 120 bpm and 48 kHz is 96000 frames
/// t.seek(95_000);
/// let adv = t.advance(2000);
/// assert!(adv.wrapped);
/// assert_eq!(t.position(), 1000);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Transport {
    state: TransportState,
    position: u64,
    play_start: u64,
    timing: TickTiming,
    looping: Option<LoopRange>,
    stop_behavior: StopBehavior,
}

impl Transport {
    /// Stopped transport at frame 0.
    pub fn new(sample_rate: f32, bpm: f32) -> Self {
        Self {
            state: TransportState::Stopped,
            position: 0,
            play_start: 0,
            timing: TickTiming::new(sample_rate, bpm.clamp(MIN_BPM, MAX_BPM)),
            looping: None,
            stop_behavior: StopBehavior::default(),
        }
    }

    /// Current state.
    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Playhead in frames.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Playhead in ticks.
    pub fn tick(&self) -> f64 {
        self.timing.frame_to_tick(self.position)
    }

    /// 1-based bar, 1-based beat and tick within the beat.
    pub fn bar_beat_tick(&self) -> (u64, u64, u64) {
        let tick = floor(self.tick()) as u64;
        (
            tick / TICKS_PER_BAR + 1,
            (tick % TICKS_PER_BAR) / TICKS_PER_BEAT + 1,
            tick % TICKS_PER_BEAT,
        )
    }

    /// Current tick/frame conversion.
    pub fn timing(&self) -> TickTiming {
        self.timing
    }

    /// Tempo in BPM.
    pub fn bpm(&self) -> f32 {
        self.timing.bpm
    }

    /// Active loop region.
    pub fn loop_range(&self) -> Option<LoopRange> {
        self.looping
    }

    /// After-stop policy.
    pub fn stop_behavior(&self) -> StopBehavior {
        self.stop_behavior
    }

    /// Set the after-stop policy.
    pub fn set_stop_behavior(&mut self, behavior: StopBehavior) {
        self.stop_behavior = behavior;
    }

    /// Start playback. No-op while running.
    pub fn play(&mut self) {
        if self.state == TransportState::Stopped {
            self.play_start = self.position;
            self.state = TransportState::Playing;
        }
    }

    /// Stop playback and apply the after-stop policy. No-op while stopped.
    pub fn stop(&mut self) {
        if self.state == TransportState::Stopped {
            return;
        }
        self.state = TransportState::Stopped;
        self.position = match self.stop_behavior {
            StopBehavior::GoToStart => self
                .looping
                .map_or(0, |l| self.timing.tick_to_frame(l.start_tick)),
            StopBehavior::Hold => self.position,
            StopBehavior::ReturnToPlayStart => self.play_start,
        };
    }

    /// Switch between playing and recording.
    pub fn toggle_record(&mut self) -> Result<TransportState, TransportError> {
        self.state = match self.state {
            TransportState::Stopped => return Err(TransportError::NotRunning),
            TransportState::Playing => TransportState::Recording,
            TransportState::Recording => TransportState::Playing,
        };
        Ok(self.state)
    }

    /// Move the playhead.
    pub fn seek(&mut self, frame: u64) {
        self.position = frame;
    }

    /// Move the playhead to a tick.
    pub fn seek_tick(&mut self, tick: u64) {
        self.position = self.timing.tick_to_frame(tick);
    }

    /// Set or clear the loop region.
    pub fn set_loop(&mut self, range: Option<LoopRange>) -> Result<(), TransportError> {
        if let Some(r) = range
            && r.end_tick <= r.start_tick
        {
            return Err(TransportError::InvalidLoop {
                start_tick: r.start_tick,
                end_tick: r.end_tick,
            });
        }
        self.looping = range;
        Ok(())
    }

    /// Change tempo, keeping the playhead on the same tick.
    pub fn set_tempo(&mut self, bpm: f32) {
        let bpm = bpm.clamp(MIN_BPM, MAX_BPM);
        let next = TickTiming::new(self.timing.sample_rate, bpm);
        self.retime(next);
    }

    /// Change sample rate, keeping the playhead on the same tick.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        let next = TickTiming::new(sample_rate, self.timing.bpm);
        self.retime(next);
    }

    /// Advance by one buffer of `frames`.
    ///
    /// Stopped transports do not move. While looping, crossing the loop end
    /// wraps to `loop_start + overshoot`.
    pub fn advance(&mut self, frames: usize) -> Advance {
        let start = self.position;
        let mut advance = Advance {
            start_frame: start,
            split: frames,
            resume_frame: start + frames as u64,
            wrapped: false,
            running: self.state.is_running(),
            loop_frames: 0,
        };
        if !advance.running {
            advance.resume_frame = start;
            return advance;
        }

        let end = start + frames as u64;
        self.position = end;
        if let Some(range) = self.looping {
            let loop_start = self.timing.tick_to_frame(range.start_tick);
            let loop_end = self.timing.tick_to_frame(range.end_tick);
            let len = loop_end.saturating_sub(loop_start);
            if len > 0 && start < loop_end && end >= loop_end {
                let overshoot = (end - loop_end) % len;
                self.position = loop_start + overshoot;
                advance.split = (loop_end - start) as usize;
                advance.resume_frame = loop_start;
                advance.wrapped = true;
                advance.loop_frames = len;
            }
        }
        advance
    }

    fn retime(&mut self, next: TickTiming) {
        let tick = self.timing.frame_to_tick(self.position);
        let start_tick = self.timing.frame_to_tick(self.play_start);
        self.position = round(tick * next.frames_per_tick()) as u64;
        self.play_start = round(start_tick * next.frames_per_tick()) as u64;
        self.timing = next;
    }
}
