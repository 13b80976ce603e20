//! Tracks, lanes and clips.
//!
//! A [`Track`] holds clips on one or more [`Lane`]s and routes into a mixer
//! channel. Clips are anchored in ticks; each render call maps the buffer's
//! frame range onto them with a [`TickTiming`]. Audio clips share their
//! sample data through `Arc<[f32]>`, so cloning a track for the audio thread
//! copies no samples.

#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};
use alloc::sync::Arc;

use crate::buffer::StereoBuffer;
use crate::graph::ChannelId;
use crate::instrument::Instrument;
use crate::transport::TickTiming;

/// Stable track identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TrackId(pub u32);

impl core::fmt::Display for TrackId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "track{}", self.0)
    }
}

/// Track and lane errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackError {
    /// The clip intersects an existing clip on the lane.
    Overlap {
        /// Start tick of the rejected clip.
        start_tick: u64,
        /// Start tick of the clip it collides with.
        existing_tick: u64,
    },
    /// Clips must be at least one tick long.
    EmptyClip,
    /// No lane with this index.
    LaneNotFound(usize),
    /// The clip would end past the last representable tick.
    TickOverflow {
        /// Start tick of the rejected clip.
        start_tick: u64,
        /// Its length.
        length_ticks: u64,
    },
}

impl core::fmt::Display for TrackError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Overlap {
                start_tick,
                existing_tick,
            } => write!(
                f,
                "clip at tick {start_tick} overlaps clip at tick {existing_tick}"
            ),
            Self::EmptyClip => write!(f, "clip has zero length"),
            Self::LaneNotFound(i) => write!(f, "lane {i} not found"),
            Self::TickOverflow {
                start_tick,
                length_ticks,
            } => write!(
                f,
                "clip at tick {start_tick} with length {length_ticks} ends past the last tick"
            ),
        }
    }
}

impl core::error::Error for TrackError {}

/// A note inside a note clip. Ticks are relative to the clip start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    /// Start relative to the clip.
    pub start_tick: u64,
    /// Length in ticks.
    pub length_ticks: u64,
    /// MIDI key number.
    pub key: u8,
    /// Velocity in `[0, 1]`.
    pub velocity: f32,
}

/// Shared stereo sample data played from `offset`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    /// Left samples.
    pub left: Arc<[f32]>,
    /// Right samples.
    pub right: Arc<[f32]>,
    /// First sample played, in frames.
    pub offset: u64,
    /// Where the samples came from, usually a file path.
    pub source: Option<String>,
}

impl AudioClip {
    /// Clip data from owned sample vectors.
    pub fn new(left: Vec<f32>, right: Vec<f32>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            offset: 0,
            source: None,
        }
    }

    /// Start playback `offset` frames into the data.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Record where the samples came from.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Frames available after `offset`.
    pub fn frames(&self) -> u64 {
        (self.left.len().min(self.right.len()) as u64).saturating_sub(self.offset)
    }
}

/// What a clip plays.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipContent {
    /// Recorded or imported audio.
    Audio(AudioClip),
    /// Notes for the track's instrument.
    Notes(Vec<Note>),
}

/// A region on a lane.
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    /// Anchor tick.
    pub start_tick: u64,
    /// Length in ticks.
    pub length_ticks: u64,
    /// Linear clip gain.
    pub gain: f32,
    /// Clip content.
    pub content: ClipContent,
}

impl Clip {
    /// Unity-gain clip.
    pub fn new(start_tick: u64, length_ticks: u64, content: ClipContent) -> Self {
        Self {
            start_tick,
            length_ticks,
            gain: 1.0,
            content,
        }
    }

    /// Set the clip gain.
    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain.max(0.0);
        self
    }

    /// First tick after the clip.
    pub fn end_tick(&self) -> u64 {
        self.start_tick.saturating_add(self.length_ticks)
    }

    /// Reject clips that cannot be placed on a lane.
    pub fn check(&self) -> Result<(), TrackError> {
        if self.length_ticks == 0 {
            return Err(TrackError::EmptyClip);
        }
        if self.start_tick.checked_add(self.length_ticks).is_none() {
            return Err(TrackError::TickOverflow {
                start_tick: self.start_tick,
                length_ticks: self.length_ticks,
            });
        }
        Ok(())
    }

    fn overlaps(&self, other: &Clip) -> bool {
        self.start_tick < other.end_tick() && other.start_tick < self.end_tick()
    }
}

/// Non-overlapping clips sorted by start tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Lane {
    clips: Vec<Clip>,
}

impl Lane {
    /// Empty lane.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a clip, keeping the lane sorted. Returns its index.
    pub fn insert(&mut self, clip: Clip) -> Result<usize, TrackError> {
        clip.check()?;
        if let Some(existing) = self.clips.iter().find(|c| c.overlaps(&clip)) {
            return Err(TrackError::Overlap {
                start_tick: clip.start_tick,
                existing_tick: existing.start_tick,
            });
        }
        let index = self.clips.partition_point(|c| c.start_tick < clip.start_tick);
        self.clips.insert(index, clip);
        Ok(index)
    }

    /// Remove the clip at `index`.
    pub fn remove(&mut self, index: usize) -> Option<Clip> {
        (index < self.clips.len()).then(|| self.clips.remove(index))
    }

    /// Clips in start order.
    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    /// Clip covering `tick`, if any.
    pub fn clip_at(&self, tick: u64) -> Option<&Clip> {
        self.clips
            .iter()
            .find(|c| c.start_tick <= tick && tick < c.end_tick())
    }

    /// Whether `clip` fits without overlapping.
    pub fn fits(&self, clip: &Clip) -> bool {
        !self.clips.iter().any(|c| c.overlaps(clip))
    }
}

/// A note resolved to absolute ticks.
#[derive(Debug, Clone, Copy)]
struct NoteSpan {
    on_tick: u64,
    off_tick: u64,
    key: u8,
    velocity: f32,
}

/// One note on or off, in tick order.
#[derive(Debug, Clone, Copy, PartialEq)]
struct NoteEvent {
    tick: u64,
    on: bool,
    key: u8,
    velocity: f32,
}

/// Clips on lanes, routed into a mixer channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Track id.
    pub id: TrackId,
    /// Display name.
    pub name: String,
    /// Destination channel.
    pub channel: ChannelId,
    /// Linear track gain.
    pub gain: f32,
    /// Muted tracks render nothing.
    pub muted: bool,
    /// Registry id of the instrument playing note clips.
    pub instrument: Option<String>,
    lanes: Vec<Lane>,
    /// Note events of every lane, rebuilt whenever clips change.
    events: Vec<NoteEvent>,
}

impl Track {
    /// Track with one empty lane, routed to master.
    pub fn new(id: TrackId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            channel: ChannelId::MASTER,
            gain: 1.0,
            muted: false,
            instrument: None,
            lanes: alloc::vec![Lane::new()],
            events: Vec::new(),
        }
    }

    /// Route to `channel`.
    pub fn with_channel(mut self, channel: ChannelId) -> Self {
        self.channel = channel;
        self
    }

    /// Set the instrument used for note clips.
    pub fn with_instrument(mut self, kind: impl Into<String>) -> Self {
        self.instrument = Some(kind.into());
        self
    }

    /// Lanes in display order.
    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    /// Append an empty lane and return its index.
    pub fn add_lane(&mut self) -> usize {
        self.lanes.push(Lane::new());
        self.lanes.len() - 1
    }

    /// Insert a clip on a specific lane.
    pub fn insert_clip(&mut self, lane: usize, clip: Clip) -> Result<usize, TrackError> {
        let has_notes = matches!(clip.content, ClipContent::Notes(_));
        let index = self
            .lanes
            .get_mut(lane)
            .ok_or(TrackError::LaneNotFound(lane))?
            .insert(clip)?;
        if has_notes {
            self.rebuild_events();
        }
        Ok(index)
    }

    /// Insert a clip on the first lane it fits, adding a lane if none does.
    /// Returns the lane index.
    pub fn place_clip(&mut self, clip: Clip) -> Result<usize, TrackError> {
        clip.check()?;
        let lane = match self.lanes.iter().position(|l| l.fits(&clip)) {
            Some(i) => i,
            None => self.add_lane(),
        };
        self.insert_clip(lane, clip)?;
        Ok(lane)
    }

    /// Remove a clip.
    pub fn remove_clip(&mut self, lane: usize, index: usize) -> Option<Clip> {
        let clip = self.lanes.get_mut(lane)?.remove(index)?;
        if matches!(clip.content, ClipContent::Notes(_)) {
            self.rebuild_events();
        }
        Some(clip)
    }

    /// First tick after the last clip.
    pub fn end_tick(&self) -> u64 {
        self.lanes
            .iter()
            .flat_map(|l| l.clips.iter())
            .map(Clip::end_tick)
            .max()
            .unwrap_or(0)
    }

    /// Whether any lane holds note clips.
    pub fn has_notes(&self) -> bool {
        self.clips()
            .any(|c| matches!(c.content, ClipContent::Notes(_)))
    }

    /// Add this track's output for frames `[start_frame, start_frame + out.len())`.
    pub fn render(
        &self,
        start_frame: u64,
        timing: &TickTiming,
        out: &mut StereoBuffer,
        instrument: Option<&mut (dyn Instrument + Send)>,
    ) {
        self.render_into(start_frame, timing, &mut out.left, &mut out.right, instrument);
    }

    /// Slice form of [`render`](Self::render), used when a loop wrap splits
    /// the buffer.
    pub fn render_into(
        &self,
        start_frame: u64,
        timing: &TickTiming,
        left: &mut [f32],
        right: &mut [f32],
        instrument: Option<&mut (dyn Instrument + Send)>,
    ) {
        let n = left.len().min(right.len());
        if self.muted || n == 0 {
            return;
        }
        let end_frame = start_frame + n as u64;

        for lane in &self.lanes {
            for clip in &lane.clips {
                let ClipContent::Audio(audio) = &clip.content else {
                    continue;
                };
                let clip_start = timing.tick_to_frame(clip.start_tick);
                if clip_start >= end_frame {
                    break;
                }
                let clip_end = timing.tick_to_frame(clip.end_tick());
                let from = clip_start.max(start_frame);
                let to = clip_end.min(end_frame);
                let gain = clip.gain * self.gain;
                for frame in from..to {
                    let src = audio.offset.saturating_add(frame - clip_start) as usize;
                    let (Some(l), Some(r)) = (audio.left.get(src), audio.right.get(src)) else {
                        break;
                    };
                    let i = (frame - start_frame) as usize;
                    left[i] += l * gain;
                    right[i] += r * gain;
                }
            }
        }

        if let Some(instrument) = instrument {
            self.render_notes(start_frame, end_frame, timing, &mut left[..n], &mut right[..n], instrument);
        }
    }

    fn clips(&self) -> impl Iterator<Item = &Clip> {
        self.lanes.iter().flat_map(|l| l.clips.iter())
    }

    fn note_spans(&self) -> impl Iterator<Item = NoteSpan> + '_ {
        self.clips().flat_map(|clip| {
            let notes: &[Note] = match &clip.content {
                ClipContent::Notes(notes) => notes,
                ClipContent::Audio(_) => &[],
            };
            notes
                .iter()
                .filter(move |n| n.start_tick < clip.length_ticks && n.length_ticks > 0)
                .map(move |n| NoteSpan {
                    on_tick: clip.start_tick + n.start_tick,
                    off_tick: (clip.start_tick + n.start_tick)
                        .saturating_add(n.length_ticks)
                        .min(clip.end_tick()),
                    key: n.key,
                    velocity: (n.velocity * clip.gain).clamp(0.0, 1.0),
                })
        })
    }

    /// Sort every note into one on/off stream.
    ///
    /// Overlapping notes on the same key retrigger: the earlier note ends
    /// where the later one starts, and the later one holds until the last
    /// of them would have ended.
    fn rebuild_events(&mut self) {
        let mut spans: Vec<NoteSpan> = self.note_spans().collect();
        spans.sort_by(|a, b| a.key.cmp(&b.key).then(a.on_tick.cmp(&b.on_tick)));
        for i in 1..spans.len() {
            let (head, tail) = spans.split_at_mut(i);
            let (prev, next) = (&mut head[i - 1], &mut tail[0]);
            if prev.key == next.key && next.on_tick < prev.off_tick {
                next.off_tick = next.off_tick.max(prev.off_tick);
                prev.off_tick = next.on_tick;
            }
        }
        spans.retain(|s| s.off_tick > s.on_tick);

        self.events.clear();
        self.events.reserve(spans.len() * 2);
        for span in spans {
            self.events.push(NoteEvent {
                tick: span.on_tick,
                on: true,
                key: span.key,
                velocity: span.velocity,
            });
            self.events.push(NoteEvent {
                tick: span.off_tick,
                on: false,
                key: span.key,
                velocity: 0.0,
            });
        }
        // offs before ons so a repeated key retriggers
        self.events
            .sort_by(|a, b| a.tick.cmp(&b.tick).then(a.on.cmp(&b.on)));
    }

    fn render_notes(
        &self,
        start_frame: u64,
        end_frame: u64,
        timing: &TickTiming,
        left: &mut [f32],
        right: &mut [f32],
        instrument: &mut (dyn Instrument + Send),
    ) {
        let gain = self.gain;
        let fill = |instrument: &mut (dyn Instrument + Send),
                    left: &mut [f32],
                    right: &mut [f32],
                    from: u64,
                    to: u64| {
            for i in (from - start_frame) as usize..(to - start_frame) as usize {
                let (l, r) = instrument.render();
                left[i] += l * gain;
                right[i] += r * gain;
            }
        };
        let first = self
            .events
            .partition_point(|e| timing.tick_to_frame(e.tick) < start_frame);
        let mut pos = start_frame;
        for event in &self.events[first..] {
            let at = timing.tick_to_frame(event.tick);
            if at >= end_frame {
                break;
            }
            fill(&mut *instrument, &mut *left, &mut *right, pos, at);
            pos = at;
            if event.on {
                instrument.note_on(event.key, event.velocity);
            } else {
                instrument.note_off(event.key);
            }
        }
        fill(instrument, left, right, pos, end_frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    fn timing() -> TickTiming {
        // 500 frames per tick
        TickTiming::new(SR, 120.0)
    }

    fn audio(len: usize, value: f32) -> ClipContent {
        ClipContent::Audio(AudioClip::new(vec![value; len], vec![value; len]))
    }

    #[test]
    fn test_lane_rejects_overlap() {
        let mut lane = Lane::new();
        lane.insert(Clip::new(0, 10, audio(1, 1.0))).unwrap();
        let err = lane.insert(Clip::new(5, 10, audio(1, 1.0))).unwrap_err();
        assert_eq!(
            err,
            TrackError::Overlap {
                start_tick: 5,
                existing_tick: 0
            }
        );
        // touching is fine
        assert!(lane.insert(Clip::new(10, 5, audio(1, 1.0))).is_ok());
    }

    #[test]
    fn test_lane_sorted_and_empty_rejected() {
        let mut lane = Lane::new();
        lane.insert(Clip::new(20, 5, audio(1, 1.0))).unwrap();
        assert_eq!(lane.insert(Clip::new(0, 5, audio(1, 1.0))), Ok(0));
        assert_eq!(
            lane.insert(Clip::new(40, 0, audio(1, 1.0))),
            Err(TrackError::EmptyClip)
        );
        let starts: Vec<u64> = lane.clips().iter().map(|c| c.start_tick).collect();
        assert_eq!(starts, vec![0, 20]);
        assert_eq!(lane.clip_at(22).map(|c| c.start_tick), Some(20));
        assert!(lane.clip_at(30).is_none());
    }

    #[test]
    fn test_place_clip_adds_lane() {
        let mut track = Track::new(TrackId(1), "t");
        assert_eq!(track.place_clip(Clip::new(0, 10, audio(1, 1.0))), Ok(0));
        assert_eq!(track.place_clip(Clip::new(5, 10, audio(1, 1.0))), Ok(1));
        assert_eq!(track.lanes().len(), 2);
        assert_eq!(track.end_tick(), 15);
    }

    #[test]
    fn test_render_audio_clip_range() {
        let mut track = Track::new(TrackId(1), "t");
        track.gain = 0.5;
        // clip starts at tick 1 = frame 500
        track
            .insert_clip(0, Clip::new(1, 2, audio(1000, 1.0)).with_gain(0.5))
            .unwrap();

        let mut out = StereoBuffer::new(256);
        track.render(400, &timing(), &mut out, None);
        assert_eq!(out.left[99], 0.0);
        assert_eq!(out.left[100], 0.25);
        assert_eq!(out.right[255], 0.25);
    }

    #[test]
    fn test_render_stops_at_clip_end_and_data_end() {
        let mut track = Track::new(TrackId(1), "t");
        track.insert_clip(0, Clip::new(0, 1, audio(300, 1.0))).unwrap();
        let mut out = StereoBuffer::new(600);
        track.render(0, &timing(), &mut out, None);
        assert_eq!(out.left[299], 1.0);
        assert_eq!(out.left[300], 0.0);
    }

    #[test]
    fn test_muted_track_silent() {
        let mut track = Track::new(TrackId(1), "t");
        track.insert_clip(0, Clip::new(0, 4, audio(2000, 1.0))).unwrap();
        track.muted = true;
        let mut out = StereoBuffer::new(64);
        track.render(0, &timing(), &mut out, None);
        assert!(out.is_silent());
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<(u64, bool, u8)>,
        frame: u64,
        active: u32,
    }

    impl Instrument for Recorder {
        fn note_on(&mut self, key: u8, _velocity: f32) {
            self.events.push((self.frame, true, key));
            self.active += 1;
        }
        fn note_off(&mut self, key: u8) {
            self.events.push((self.frame, false, key));
            self.active = self.active.saturating_sub(1);
        }
        fn all_notes_off(&mut self) {
            self.active = 0;
        }
        fn render(&mut self) -> (f32, f32) {
            self.frame += 1;
            let v = if self.active > 0 { 1.0 } else { 0.0 };
            (v, v)
        }
        fn set_sample_rate(&mut self, _sample_rate: f32) {}
        fn reset(&mut self) {}
    }

    #[test]
    fn test_note_events_sample_accurate() {
        let mut track = Track::new(TrackId(1), "t");
        let notes = vec![Note {
            start_tick: 0,
            length_ticks: 1,
            key: 60,
            velocity: 1.0,
        }];
        // note on at frame 500, off at frame 1000
        track
            .insert_clip(0, Clip::new(1, 4, ClipContent::Notes(notes)))
            .unwrap();

        let mut rec = Recorder::default();
        let mut out = StereoBuffer::new(1024);
        track.render(0, &timing(), &mut out, Some(&mut rec));
        assert_eq!(rec.events, vec![(500, true, 60), (1000, false, 60)]);
        assert_eq!(out.left[499], 0.0);
        assert_eq!(out.left[500], 1.0);
        assert_eq!(out.left[999], 1.0);
        assert_eq!(out.left[1000], 0.0);
    }

    #[test]
    fn test_notes_clipped_to_clip_end() {
        let mut track = Track::new(TrackId(1), "t");
        let notes = vec![
            Note {
                start_tick: 0,
                length_ticks: 100,
                key: 60,
                velocity: 1.0,
            },
            Note {
                start_tick: 5,
                length_ticks: 1,
                key: 62,
                velocity: 1.0,
            },
        ];
        track
            .insert_clip(0, Clip::new(0, 2, ClipContent::Notes(notes)))
            .unwrap();
        let mut rec = Recorder::default();
        let mut out = StereoBuffer::new(2048);
        track.render(0, &timing(), &mut out, Some(&mut rec));
        assert_eq!(rec.events, vec![(0, true, 60), (1000, false, 60)]);
    }

    #[test]
    fn test_clip_past_last_tick_rejected() {
        let mut lane = Lane::new();
        lane.insert(Clip::new(0, 10, audio(1, 1.0))).unwrap();
        assert_eq!(
            lane.insert(Clip::new(u64::MAX - 5, 100, audio(1, 1.0))),
            Err(TrackError::TickOverflow {
                start_tick: u64::MAX - 5,
                length_ticks: 100
            })
        );
        let mut track = Track::new(TrackId(1), "t");
        assert!(matches!(
            track.place_clip(Clip::new(u64::MAX, 1, audio(1, 1.0))),
            Err(TrackError::TickOverflow { .. })
        ));
        assert_eq!(lane.clips().len(), 1);
    }

    #[test]
    fn test_overlapping_same_key_notes_retrigger() {
        let mut track = Track::new(TrackId(1), "t");
        let note = |start_tick, length_ticks| Note {
            start_tick,
            length_ticks,
            key: 60,
            velocity: 1.0,
        };
        // 0..4 and 2..3 on the same key: the second must not end the sound at 3
        track
            .insert_clip(0, Clip::new(0, 8, ClipContent::Notes(vec![note(0, 4), note(2, 1)])))
            .unwrap();

        let mut rec = Recorder::default();
        let mut out = StereoBuffer::new(2500);
        track.render(0, &timing(), &mut out, Some(&mut rec));
        assert_eq!(
            rec.events,
            vec![(0, true, 60), (1000, false, 60), (1000, true, 60), (2000, false, 60)]
        );
        assert_eq!(out.left[1500], 1.0);
        assert_eq!(out.left[1999], 1.0);
        assert_eq!(out.left[2000], 0.0);
    }

    #[test]
    fn test_note_events_follow_clip_removal() {
        let mut track = Track::new(TrackId(1), "t");
        let notes = vec![Note {
            start_tick: 0,
            length_ticks: 1,
            key: 64,
            velocity: 1.0,
        }];
        track
            .insert_clip(0, Clip::new(0, 2, ClipContent::Notes(notes)))
            .unwrap();
        track.remove_clip(0, 0).unwrap();

        let mut rec = Recorder::default();
        let mut out = StereoBuffer::new(1024);
        track.render(0, &timing(), &mut out, Some(&mut rec));
        assert!(rec.events.is_empty());
    }

    #[test]
    fn test_notes_split_across_buffers() {
        let mut track = Track::new(TrackId(1), "t");
        let notes = (0..4)
            .map(|i| Note {
                start_tick: i,
                length_ticks: 1,
                key: 60 + i as u8,
                velocity: 1.0,
            })
            .collect();
        track
            .insert_clip(0, Clip::new(0, 4, ClipContent::Notes(notes)))
            .unwrap();

        let mut rec = Recorder::default();
        for block in 0..8u64 {
            let mut out = StereoBuffer::new(256);
            track.render(block * 256, &timing(), &mut out, Some(&mut rec));
        }
        let ons: Vec<u64> = rec.events.iter().filter(|e| e.1).map(|e| e.0).collect();
        assert_eq!(ons, vec![0, 500, 1000, 1500]);
    }
}
