//! Instrument trait for note-driven sound sources.

/// A sound source driven by note events.
///
/// Tracks with note clips call `note_on` and `note_off` at the exact frame
/// the note starts or ends, then pull one stereo frame with [`render`].
///
/// [`render`]: Instrument::render
pub trait Instrument {
    /// Start a note. `velocity` is in `[0, 1]`.
    fn note_on(&mut self, key: u8, velocity: f32);

    /// Release a note.
    fn note_off(&mut self, key: u8);

    /// Release every sounding note.
    fn all_notes_off(&mut self);

    /// Produce the next stereo frame.
    fn render(&mut self) -> (f32, f32);

    /// Set the sample rate.
    fn set_sample_rate(&mut self, sample_rate: f32);

    /// Silence all voices immediately and clear state.
    fn reset(&mut self);

    /// Render a block into `left` and `right`, adding to their contents.
    fn render_block_add(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let (a, b) = self.render();
            *l += a;
            *r += b;
        }
    }
}
