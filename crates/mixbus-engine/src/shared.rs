//! Lock-free state shared between the control thread and the audio callback.
//!
//! Everything here is a plain atomic. The audio thread writes meters, the
//! playhead and the underrun counter; the control thread writes the stop
//! flag. Neither side ever blocks on the other.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};

use mixbus_core::TransportState;

/// An `f32` stored as its bit pattern.
///
/// The audio thread writes, any thread reads.
#[derive(Debug, Default)]
pub struct AtomicLevel(AtomicU32);

impl AtomicLevel {
    /// Level holding `value`.
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    /// Store a new level.
    #[inline]
    pub fn set(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Release);
    }

    /// Current level.
    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }
}

#[derive(Debug)]
pub(crate) struct EngineShared {
    /// Set by `Engine::stop`, checked at the top of every callback.
    pub stopping: AtomicBool,
    /// Set by the callback once it has seen `stopping`.
    pub halted: AtomicBool,
    /// Playhead in frames, published after each block.
    pub position: AtomicU64,
    transport_state: AtomicU8,
    /// Callbacks that overran their buffer duration.
    pub underruns: AtomicU64,
    /// Stream errors reported by the backend.
    pub stream_errors: AtomicU32,
    /// Post-fader peak per strip slot.
    pub peaks: Box<[AtomicLevel]>,
    /// Peak of the master output.
    pub master_peak: AtomicLevel,
}

impl EngineShared {
    pub fn new(max_channels: usize) -> Self {
        Self {
            stopping: AtomicBool::new(false),
            halted: AtomicBool::new(false),
            position: AtomicU64::new(0),
            transport_state: AtomicU8::new(encode_state(TransportState::Stopped)),
            underruns: AtomicU64::new(0),
            stream_errors: AtomicU32::new(0),
            peaks: (0..max_channels).map(|_| AtomicLevel::default()).collect(),
            master_peak: AtomicLevel::default(),
        }
    }

    pub fn set_transport_state(&self, state: TransportState) {
        self.transport_state
            .store(encode_state(state), Ordering::Release);
    }

    pub fn transport_state(&self) -> TransportState {
        match self.transport_state.load(Ordering::Acquire) {
            1 => TransportState::Playing,
            2 => TransportState::Recording,
            _ => TransportState::Stopped,
        }
    }

    pub fn slot_peak(&self, slot: usize) -> f32 {
        self.peaks.get(slot).map_or(0.0, AtomicLevel::get)
    }

    /// Zero every meter.
    pub fn clear_meters(&self) {
        for level in self.peaks.iter() {
            level.set(0.0);
        }
        self.master_peak.set(0.0);
    }
}

fn encode_state(state: TransportState) -> u8 {
    match state {
        TransportState::Stopped => 0,
        TransportState::Playing => 1,
        TransportState::Recording => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_round_trip() {
        let level = AtomicLevel::new(0.25);
        assert_eq!(level.get(), 0.25);
        level.set(-3.5);
        assert_eq!(level.get(), -3.5);
    }

    #[test]
    fn test_transport_state_encoding() {
        let shared = EngineShared::new(4);
        assert_eq!(shared.transport_state(), TransportState::Stopped);
        for state in [
            TransportState::Recording,
            TransportState::Playing,
            TransportState::Stopped,
        ] {
            shared.set_transport_state(state);
            assert_eq!(shared.transport_state(), state);
        }
    }

    #[test]
    fn test_out_of_range_slot_reads_zero() {
        let shared = EngineShared::new(2);
        shared.peaks[1].set(0.5);
        assert_eq!(shared.slot_peak(1), 0.5);
        assert_eq!(shared.slot_peak(9), 0.0);
        shared.clear_meters();
        assert_eq!(shared.slot_peak(1), 0.0);
    }
}
