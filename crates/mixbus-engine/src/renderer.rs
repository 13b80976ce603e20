//! Audio-thread side of the engine.
//!
//! The [`Renderer`] owns every object the callback touches: channel strips,
//! effect slots, track voices, the transport and the current render plan.
//! It is built on the control thread, moved into the stream callback, and
//! handed back when the stream is dropped.
//!
//! Per buffer it:
//!
//! 1. drains pending [`AudioCommand`]s (so edits land on buffer boundaries);
//! 2. advances the transport and renders tracks into their strip inputs,
//!    splitting the buffer where the loop wraps;
//! 3. walks the plan in topological order, running each strip's chain,
//!    applying volume and pan, and summing sends into downstream strips;
//! 4. interleaves the master strip into the device buffer.
//!
//! Replaced objects are returned on the garbage channel so that the control
//! thread frees them.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use mixbus_core::{
    EffectChain, EffectSlot, Instrument, LoopRange, RenderPlan, StereoBuffer,
    StopBehavior, Track, TrackId, Transport, pan_gains,
};

use crate::shared::EngineShared;

/// One mixer channel's audio-side state.
#[derive(Debug)]
pub(crate) struct Strip {
    pub chain: EffectChain,
    buffer: StereoBuffer,
}

impl Strip {
    /// Strip with its buffer sized for `max_block` frames.
    pub fn new(chain: EffectChain, max_block: usize) -> Self {
        Self {
            chain,
            buffer: StereoBuffer::new(max_block),
        }
    }

    fn begin(&mut self, frames: usize) {
        self.buffer.resize(frames);
        self.buffer.clear();
    }
}

/// A track plus the instrument that plays its note clips.
pub(crate) struct TrackVoice {
    pub track: Box<Track>,
    /// Strip slot the track feeds, if its channel has one.
    pub slot: Option<usize>,
    pub instrument: Option<Box<dyn Instrument + Send>>,
}

impl std::fmt::Debug for TrackVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackVoice")
            .field("track", &self.track.id)
            .field("slot", &self.slot)
            .field("instrument", &self.instrument.is_some())
            .finish()
    }
}

/// Transport edits mirrored from the control thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum TransportCommand {
    Play,
    Stop,
    ToggleRecord,
    Seek(u64),
    SetLoop(Option<LoopRange>),
    SetTempo(f32),
    SetStopBehavior(StopBehavior),
}

/// Control to audio messages, applied at the top of a buffer.
pub(crate) enum AudioCommand {
    InstallPlan(Arc<RenderPlan>),
    AddStrip {
        slot: usize,
        strip: Box<Strip>,
    },
    /// Tracks feeding `slot` move to `reroute_to`.
    RemoveStrip {
        slot: usize,
        reroute_to: Option<usize>,
    },
    InsertEffect {
        slot: usize,
        index: usize,
        effect: EffectSlot,
    },
    RemoveEffect {
        slot: usize,
        index: usize,
    },
    MoveEffect {
        slot: usize,
        index: usize,
        up: bool,
    },
    SetEffectParam {
        slot: usize,
        index: usize,
        param: usize,
        value: f32,
    },
    SetEffectEnabled {
        slot: usize,
        index: usize,
        enabled: bool,
    },
    SetEffectWetDry {
        slot: usize,
        index: usize,
        wet_dry: f32,
    },
    SetEffectShutoff {
        slot: usize,
        index: usize,
        gate_db: f32,
        decay_ms: f32,
        auto_shutoff: bool,
    },
    AddTrack(Box<TrackVoice>),
    UpdateTrack {
        track: Box<Track>,
        slot: Option<usize>,
    },
    RemoveTrack(TrackId),
    SetInstrument {
        track: TrackId,
        instrument: Option<Box<dyn Instrument + Send>>,
    },
    Transport(TransportCommand),
}

/// Objects the audio thread is done with. Dropped on the control thread.
#[allow(dead_code)]
pub(crate) enum Garbage {
    Plan(Arc<RenderPlan>),
    Strip(Box<Strip>),
    Effect(EffectSlot),
    Track(Box<Track>),
    Voice(Box<TrackVoice>),
    Instrument(Box<dyn Instrument + Send>),
}

/// Fixed sizes chosen on the control thread.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RendererLimits {
    pub max_block: usize,
    pub max_channels: usize,
    pub max_tracks: usize,
}

pub(crate) struct Renderer {
    sample_rate: f32,
    limits: RendererLimits,
    transport: Transport,
    plan: Arc<RenderPlan>,
    strips: Vec<Option<Box<Strip>>>,
    tracks: Vec<Box<TrackVoice>>,
    commands: Receiver<AudioCommand>,
    garbage: Sender<Garbage>,
    shared: Arc<EngineShared>,
}

impl Renderer {
    pub fn new(
        transport: Transport,
        limits: RendererLimits,
        commands: Receiver<AudioCommand>,
        garbage: Sender<Garbage>,
        shared: Arc<EngineShared>,
    ) -> Self {
        shared.set_transport_state(transport.state());
        shared.position.store(transport.position(), Ordering::Release);
        Self {
            sample_rate: transport.timing().sample_rate,
            limits,
            transport,
            plan: Arc::new(RenderPlan::empty()),
            strips: (0..limits.max_channels).map(|_| None).collect(),
            tracks: Vec::with_capacity(limits.max_tracks),
            commands,
            garbage,
            shared,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Retune everything to a new device rate. Control thread only.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.transport.set_sample_rate(sample_rate);
        for strip in self.strips.iter_mut().flatten() {
            strip.chain.set_sample_rate(sample_rate);
        }
        for voice in &mut self.tracks {
            if let Some(instrument) = voice.instrument.as_mut() {
                instrument.set_sample_rate(sample_rate);
            }
        }
        self.shared
            .position
            .store(self.transport.position(), Ordering::Release);
    }

    /// Apply every queued command.
    pub fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
        }
    }

    /// Apply one command.
    pub fn apply(&mut self, command: AudioCommand) {
        match command {
            AudioCommand::InstallPlan(plan) => {
                let old = std::mem::replace(&mut self.plan, plan);
                self.discard(Garbage::Plan(old));
            }
            AudioCommand::AddStrip { slot, strip } => {
                if let Some(entry) = self.strips.get_mut(slot)
                    && let Some(old) = entry.replace(strip)
                {
                    self.discard(Garbage::Strip(old));
                }
            }
            AudioCommand::RemoveStrip { slot, reroute_to } => {
                for voice in &mut self.tracks {
                    if voice.slot == Some(slot) {
                        voice.slot = reroute_to;
                    }
                }
                if let Some(old) = self.strips.get_mut(slot).and_then(Option::take) {
                    self.shared.peaks[slot].set(0.0);
                    self.discard(Garbage::Strip(old));
                }
            }
            AudioCommand::InsertEffect {
                slot,
                index,
                effect,
            } => match self.strip_mut(slot) {
                Some(strip) => strip.chain.insert(index, effect),
                None => self.discard(Garbage::Effect(effect)),
            },
            AudioCommand::RemoveEffect { slot, index } => {
                if let Some(old) = self
                    .strip_mut(slot)
                    .and_then(|strip| strip.chain.remove(index))
                {
                    self.discard(Garbage::Effect(old));
                }
            }
            AudioCommand::MoveEffect { slot, index, up } => {
                if let Some(strip) = self.strip_mut(slot) {
                    if up {
                        strip.chain.move_up(index);
                    } else {
                        strip.chain.move_down(index);
                    }
                }
            }
            AudioCommand::SetEffectParam {
                slot,
                index,
                param,
                value,
            } => {
                if let Some(effect) = self.effect_mut(slot, index) {
                    effect.set_param(param, value);
                }
            }
            AudioCommand::SetEffectEnabled {
                slot,
                index,
                enabled,
            } => {
                if let Some(effect) = self.effect_mut(slot, index) {
                    effect.set_enabled(enabled);
                }
            }
            AudioCommand::SetEffectWetDry {
                slot,
                index,
                wet_dry,
            } => {
                if let Some(effect) = self.effect_mut(slot, index) {
                    effect.set_wet_dry(wet_dry);
                }
            }
            AudioCommand::SetEffectShutoff {
                slot,
                index,
                gate_db,
                decay_ms,
                auto_shutoff,
            } => {
                if let Some(effect) = self.effect_mut(slot, index) {
                    effect.set_gate_db(gate_db);
                    effect.set_decay_ms(decay_ms);
                    effect.set_auto_shutoff(auto_shutoff);
                }
            }
            AudioCommand::AddTrack(voice) => {
                if self.tracks.len() < self.limits.max_tracks {
                    self.tracks.push(voice);
                } else {
                    self.discard(Garbage::Voice(voice));
                }
            }
            AudioCommand::UpdateTrack { track, slot } => {
                match self.tracks.iter_mut().find(|v| v.track.id == track.id) {
                    Some(voice) => {
                        let old = std::mem::replace(&mut voice.track, track);
                        voice.slot = slot;
                        self.discard(Garbage::Track(old));
                    }
                    None => self.discard(Garbage::Track(track)),
                }
            }
            AudioCommand::RemoveTrack(id) => {
                if let Some(pos) = self.tracks.iter().position(|v| v.track.id == id) {
                    let voice = self.tracks.remove(pos);
                    self.discard(Garbage::Voice(voice));
                }
            }
            AudioCommand::SetInstrument { track, instrument } => {
                let old = match self.tracks.iter_mut().find(|v| v.track.id == track) {
                    Some(voice) => std::mem::replace(&mut voice.instrument, instrument),
                    None => instrument,
                };
                if let Some(old) = old {
                    self.discard(Garbage::Instrument(old));
                }
            }
            AudioCommand::Transport(command) => self.apply_transport(command),
        }
    }

    fn apply_transport(&mut self, command: TransportCommand) {
        match command {
            TransportCommand::Play => self.transport.play(),
            TransportCommand::Stop => {
                self.transport.stop();
                self.silence_instruments();
            }
            TransportCommand::ToggleRecord => {
                // validated on the control thread
                let _ = self.transport.toggle_record();
            }
            TransportCommand::Seek(frame) => {
                self.transport.seek(frame);
                self.release_notes();
            }
            TransportCommand::SetLoop(range) => {
                let _ = self.transport.set_loop(range);
            }
            TransportCommand::SetTempo(bpm) => self.transport.set_tempo(bpm),
            TransportCommand::SetStopBehavior(behavior) => {
                self.transport.set_stop_behavior(behavior);
            }
        }
        self.shared.set_transport_state(self.transport.state());
        self.shared
            .position
            .store(self.transport.position(), Ordering::Release);
    }

    /// Fill an interleaved device buffer. Runs on the audio thread.
    ///
    /// Mono devices get the average of both sides; devices with more than
    /// two channels get silence on the extra ones.
    pub fn process_interleaved(&mut self, data: &mut [f32], channels: usize) {
        let started = Instant::now();

        if self.shared.stopping.load(Ordering::Acquire) {
            data.fill(0.0);
            self.shared.halted.store(true, Ordering::Release);
            return;
        }

        self.drain_commands();

        let channels = channels.max(1);
        let frames = data.len() / channels;
        let mut done = 0;
        while done < frames {
            let n = (frames - done).min(self.limits.max_block);
            self.render_block(n);
            let out = &mut data[done * channels..(done + n) * channels];
            match self.master() {
                Some(master) => interleave(master, out, channels),
                None => out.fill(0.0),
            }
            done += n;
        }
        data[frames * channels..].fill(0.0);

        let budget = frames as f64 / f64::from(self.sample_rate);
        if started.elapsed().as_secs_f64() > budget {
            self.shared.underruns.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Render into separate sides. Used for offline rendering.
    pub fn render_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.drain_commands();
        let frames = left.len().min(right.len());
        let mut done = 0;
        while done < frames {
            let n = (frames - done).min(self.limits.max_block);
            self.render_block(n);
            let (l, r) = (&mut left[done..done + n], &mut right[done..done + n]);
            match self.master() {
                Some(master) => {
                    l.copy_from_slice(&master.left[..n]);
                    r.copy_from_slice(&master.right[..n]);
                }
                None => {
                    l.fill(0.0);
                    r.fill(0.0);
                }
            }
            done += n;
        }
    }

    /// Render `frames` (at most `max_block`) into the strips.
    fn render_block(&mut self, frames: usize) {
        let Self {
            plan,
            strips,
            tracks,
            transport,
            shared,
            ..
        } = self;

        for strip in strips.iter_mut().flatten() {
            strip.begin(frames);
        }

        let advance = transport.advance(frames);
        shared.position.store(transport.position(), Ordering::Release);

        if advance.running {
            let timing = transport.timing();
            for voice in tracks.iter_mut() {
                let Some(slot) = voice.slot else {
                    continue;
                };
                let Some(strip) = strips.get_mut(slot).and_then(Option::as_mut) else {
                    continue;
                };
                let (left, right) = (&mut strip.buffer.left, &mut strip.buffer.right);
                for (offset, len, playhead) in advance.segments(frames) {
                    if offset > 0
                        && let Some(instrument) = voice.instrument.as_deref_mut()
                    {
                        instrument.all_notes_off();
                    }
                    voice.track.render_into(
                        playhead,
                        &timing,
                        &mut left[offset..offset + len],
                        &mut right[offset..offset + len],
                        voice
                            .instrument
                            .as_deref_mut()
                            .map(|i| i as &mut (dyn Instrument + Send)),
                    );
                }
            }
        }

        for step in plan.steps() {
            let Some(mut strip) = strips.get_mut(step.slot).and_then(Option::take) else {
                continue;
            };
            if step.audible {
                strip.chain.process(&mut strip.buffer);
                let (pan_l, pan_r) = pan_gains(step.pan);
                for s in &mut strip.buffer.left {
                    *s *= step.volume * pan_l;
                }
                for s in &mut strip.buffer.right {
                    *s *= step.volume * pan_r;
                }
                for send in &step.sends {
                    if let Some(target) = strips.get_mut(send.slot).and_then(Option::as_mut) {
                        target.buffer.accumulate_scaled(&strip.buffer, send.gain);
                    }
                }
            } else {
                strip.buffer.clear();
            }
            if let Some(level) = shared.peaks.get(step.slot) {
                level.set(strip.buffer.peak());
            }
            strips[step.slot] = Some(strip);
        }

        let master_peak = plan
            .master_slot()
            .and_then(|slot| strips.get(slot))
            .and_then(Option::as_ref)
            .map_or(0.0, |strip| strip.buffer.peak());
        shared.master_peak.set(master_peak);
    }

    fn master(&self) -> Option<&StereoBuffer> {
        let slot = self.plan.master_slot()?;
        self.strips.get(slot)?.as_ref().map(|strip| &strip.buffer)
    }

    fn strip_mut(&mut self, slot: usize) -> Option<&mut Strip> {
        self.strips.get_mut(slot)?.as_deref_mut()
    }

    fn effect_mut(&mut self, slot: usize, index: usize) -> Option<&mut EffectSlot> {
        self.strip_mut(slot)?.chain.slot_mut(index)
    }

    fn release_notes(&mut self) {
        for voice in &mut self.tracks {
            if let Some(instrument) = voice.instrument.as_mut() {
                instrument.all_notes_off();
            }
        }
    }

    fn silence_instruments(&mut self) {
        for voice in &mut self.tracks {
            if let Some(instrument) = voice.instrument.as_mut() {
                instrument.reset();
            }
        }
    }

    /// Hand an object back to the control thread for freeing.
    fn discard(&self, garbage: Garbage) {
        // A full channel means the control thread stopped collecting; the
        // object is then freed here rather than leaked.
        let _ = self.garbage.try_send(garbage);
    }
}

/// Write a stereo block into an interleaved device buffer.
fn interleave(block: &StereoBuffer, out: &mut [f32], channels: usize) {
    for (i, frame) in out.chunks_exact_mut(channels).enumerate() {
        let (l, r) = (block.left[i], block.right[i]);
        match channels {
            1 => frame[0] = (l + r) * 0.5,
            2 => {
                frame[0] = l;
                frame[1] = r;
            }
            _ => {
                frame[0] = l;
                frame[1] = r;
                frame[2..].fill(0.0);
            }
        }
    }
}

/// Owns the renderer inside a stream callback and sends it home on drop.
pub(crate) struct RendererHost {
    renderer: Option<Renderer>,
    home: Sender<Renderer>,
}

impl RendererHost {
    pub fn new(renderer: Renderer, home: Sender<Renderer>) -> Self {
        Self {
            renderer: Some(renderer),
            home,
        }
    }

    pub fn process(&mut self, data: &mut [f32], channels: usize) {
        match self.renderer.as_mut() {
            Some(renderer) => renderer.process_interleaved(data, channels),
            None => data.fill(0.0),
        }
    }
}

impl Drop for RendererHost {
    fn drop(&mut self) {
        if let Some(renderer) = self.renderer.take() {
            let _ = self.home.try_send(renderer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use mixbus_core::{
        AudioClip, ChannelGraph, ChannelId, Clip, ClipContent, Effect, EffectWithParams, TickTiming,
    };

    const SR: f32 = 48000.0;
    const BLOCK: usize = 64;

    struct Rig {
        renderer: Renderer,
        shared: Arc<EngineShared>,
        garbage: Receiver<Garbage>,
        _commands: Sender<AudioCommand>,
    }

    fn rig() -> Rig {
        let (tx, rx) = bounded(64);
        let (gtx, grx) = bounded(64);
        let shared = Arc::new(EngineShared::new(8));
        let limits = RendererLimits {
            max_block: BLOCK,
            max_channels: 8,
            max_tracks: 8,
        };
        Rig {
            renderer: Renderer::new(Transport::new(SR, 120.0), limits, rx, gtx, Arc::clone(&shared)),
            shared,
            garbage: grx,
            _commands: tx,
        }
    }

    /// Install strips for every channel (slot = channel id) and the plan.
    fn install(renderer: &mut Renderer, graph: &ChannelGraph) {
        for channel in graph.channels() {
            renderer.apply(AudioCommand::AddStrip {
                slot: channel.id.index(),
                strip: Box::new(Strip::new(EffectChain::new(), BLOCK)),
            });
        }
        let plan = graph.compile(|id| Some(id.index()));
        renderer.apply(AudioCommand::InstallPlan(Arc::new(plan)));
    }

    fn constant_track(id: u32, channel: ChannelId, value: f32) -> Box<TrackVoice> {
        let mut track = Track::new(TrackId(id), "t").with_channel(channel);
        let frames = 96000;
        track
            .insert_clip(
                0,
                Clip::new(0, 192, ClipContent::Audio(AudioClip::new(vec![value; frames], vec![value; frames]))),
            )
            .unwrap();
        Box::new(TrackVoice {
            track: Box::new(track),
            slot: Some(channel.index()),
            instrument: None,
        })
    }

    struct Halve;

    impl Effect for Halve {
        fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
            (left * 0.5, right * 0.5)
        }
        fn set_sample_rate(&mut self, _: f32) {}
        fn reset(&mut self) {}
    }

    impl mixbus_core::ParameterInfo for Halve {
        fn param_count(&self) -> usize {
            0
        }
        fn param_info(&self, _: usize) -> Option<mixbus_core::ParamDescriptor> {
            None
        }
        fn get_param(&self, _: usize) -> f32 {
            0.0
        }
        fn set_param(&mut self, _: usize, _: f32) {}
    }

    fn halve() -> Box<dyn EffectWithParams + Send> {
        Box::new(Halve)
    }

    #[test]
    fn test_stopped_transport_renders_silence() {
        let mut rig = rig();
        let graph = ChannelGraph::new();
        install(&mut rig.renderer, &graph);
        rig.renderer
            .apply(AudioCommand::AddTrack(constant_track(0, ChannelId::MASTER, 0.5)));

        let mut data = vec![1.0; BLOCK * 2];
        rig.renderer.process_interleaved(&mut data, 2);
        assert!(data.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_send_chain_sums_into_master() {
        let mut rig = rig();
        let mut graph = ChannelGraph::new();
        let a = graph.add_channel("A");
        let bus = graph.add_channel("Bus");
        graph.remove_send(a, ChannelId::MASTER).unwrap();
        graph.add_send(a, bus, 0.5).unwrap();
        install(&mut rig.renderer, &graph);

        rig.renderer.apply(AudioCommand::AddTrack(constant_track(0, a, 0.8)));
        rig.renderer.apply(AudioCommand::AddTrack(constant_track(1, bus, 0.1)));
        rig.renderer
            .apply(AudioCommand::Transport(TransportCommand::Play));

        let mut data = vec![0.0; BLOCK * 2];
        rig.renderer.process_interleaved(&mut data, 2);
        // 0.8 * 0.5 through the send plus 0.1 direct
        for s in &data {
            assert!((s - 0.5).abs() < 1e-6, "{s}");
        }
        assert!((rig.shared.slot_peak(a.index()) - 0.8).abs() < 1e-6);
        assert!((rig.shared.master_peak.get() - 0.5).abs() < 1e-6);
        assert_eq!(rig.shared.position.load(Ordering::Acquire), BLOCK as u64);
    }

    #[test]
    fn test_pan_mute_and_mono_output() {
        let mut rig = rig();
        let mut graph = ChannelGraph::new();
        let a = graph.add_channel("A");
        let b = graph.add_channel("B");
        graph.set_pan(a, 1.0).unwrap();
        graph.set_muted(b, true).unwrap();
        install(&mut rig.renderer, &graph);
        rig.renderer.apply(AudioCommand::AddTrack(constant_track(0, a, 0.4)));
        rig.renderer.apply(AudioCommand::AddTrack(constant_track(1, b, 0.9)));
        rig.renderer
            .apply(AudioCommand::Transport(TransportCommand::Play));

        let mut stereo = vec![0.0; BLOCK * 2];
        rig.renderer.process_interleaved(&mut stereo, 2);
        assert_eq!(stereo[0], 0.0);
        assert!((stereo[1] - 0.4).abs() < 1e-6);
        assert_eq!(rig.shared.slot_peak(b.index()), 0.0);

        let mut mono = vec![0.0; BLOCK];
        rig.renderer.process_interleaved(&mut mono, 1);
        assert!((mono[0] - 0.2).abs() < 1e-6);

        let mut quad = vec![9.0; BLOCK * 4];
        rig.renderer.process_interleaved(&mut quad, 4);
        assert!((quad[1] - 0.4).abs() < 1e-6);
        assert_eq!(&quad[2..4], &[0.0, 0.0]);
    }

    #[test]
    fn test_loop_shorter_than_block_stays_inside_loop() {
        let (_tx, rx) = bounded(64);
        let (gtx, _grx) = bounded(64);
        let limits = RendererLimits {
            max_block: 256,
            max_channels: 8,
            max_tracks: 8,
        };
        let mut renderer = Renderer::new(
            Transport::new(SR, 999.0),
            limits,
            rx,
            gtx,
            Arc::new(EngineShared::new(8)),
        );
        install(&mut renderer, &ChannelGraph::new());

        // every frame carries its own index
        let ramp: Vec<f32> = (0..96000).map(|i| i as f32).collect();
        let mut track = Track::new(TrackId(0), "ramp");
        track
            .insert_clip(0, Clip::new(0, 192, ClipContent::Audio(AudioClip::new(ramp.clone(), ramp))))
            .unwrap();
        renderer.apply(AudioCommand::AddTrack(Box::new(TrackVoice {
            track: Box::new(track),
            slot: Some(0),
            instrument: None,
        })));

        // one tick at 999 bpm is about 60 frames
        let timing = TickTiming::new(SR, 999.0);
        let loop_start = timing.tick_to_frame(4);
        let loop_end = timing.tick_to_frame(5);
        renderer.apply(AudioCommand::Transport(TransportCommand::SetLoop(Some(LoopRange {
            start_tick: 4,
            end_tick: 5,
        }))));
        renderer.apply(AudioCommand::Transport(TransportCommand::Seek(loop_start)));
        renderer.apply(AudioCommand::Transport(TransportCommand::Play));

        let mut left = vec![-1.0; 256];
        let mut right = vec![-1.0; 256];
        renderer.render_stereo(&mut left, &mut right);

        let len = (loop_end - loop_start) as usize;
        for (i, s) in left.iter().enumerate() {
            let expected = loop_start + (i % len) as u64;
            assert_eq!(*s, expected as f32, "frame {i}");
        }
        assert_eq!(
            renderer.transport.position(),
            loop_start + (256 % len) as u64
        );
    }

    #[test]
    fn test_effects_edit_between_buffers() {
        let mut rig = rig();
        let graph = ChannelGraph::new();
        install(&mut rig.renderer, &graph);
        rig.renderer
            .apply(AudioCommand::AddTrack(constant_track(0, ChannelId::MASTER, 0.8)));
        rig.renderer
            .apply(AudioCommand::Transport(TransportCommand::Play));
        rig.renderer.apply(AudioCommand::InsertEffect {
            slot: 0,
            index: 0,
            effect: EffectSlot::new("halve", halve(), SR, BLOCK),
        });

        let mut left = vec![0.0; BLOCK];
        let mut right = vec![0.0; BLOCK];
        rig.renderer.render_stereo(&mut left, &mut right);
        assert!((left[10] - 0.4).abs() < 1e-6);

        rig.renderer.apply(AudioCommand::SetEffectEnabled {
            slot: 0,
            index: 0,
            enabled: false,
        });
        rig.renderer.render_stereo(&mut left, &mut right);
        assert!((left[10] - 0.8).abs() < 1e-6);

        rig.renderer
            .apply(AudioCommand::RemoveEffect { slot: 0, index: 0 });
        assert!(matches!(rig.garbage.try_recv(), Ok(Garbage::Plan(_))));
        assert!(matches!(rig.garbage.try_recv(), Ok(Garbage::Effect(_))));
    }

    #[test]
    fn test_blocks_larger_than_max_are_split() {
        let mut rig = rig();
        let graph = ChannelGraph::new();
        install(&mut rig.renderer, &graph);
        rig.renderer
            .apply(AudioCommand::AddTrack(constant_track(0, ChannelId::MASTER, 0.3)));
        rig.renderer
            .apply(AudioCommand::Transport(TransportCommand::Play));

        let mut data = vec![0.0; BLOCK * 5 * 2];
        rig.renderer.process_interleaved(&mut data, 2);
        assert!(data.iter().all(|s| (s - 0.3).abs() < 1e-6));
        assert_eq!(rig.shared.position.load(Ordering::Acquire), (BLOCK * 5) as u64);
    }

    #[test]
    fn test_removed_strip_reroutes_tracks() {
        let mut rig = rig();
        let mut graph = ChannelGraph::new();
        let a = graph.add_channel("A");
        install(&mut rig.renderer, &graph);
        rig.renderer.apply(AudioCommand::AddTrack(constant_track(0, a, 0.25)));
        rig.renderer
            .apply(AudioCommand::Transport(TransportCommand::Play));

        graph.remove_channel(a).unwrap();
        rig.renderer.apply(AudioCommand::RemoveStrip {
            slot: a.index(),
            reroute_to: Some(0),
        });
        rig.renderer
            .apply(AudioCommand::InstallPlan(Arc::new(graph.compile(|id| Some(id.index())))));

        let mut left = vec![0.0; BLOCK];
        let mut right = vec![0.0; BLOCK];
        rig.renderer.render_stereo(&mut left, &mut right);
        assert!((left[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_stop_flag_halts_with_silence() {
        let mut rig = rig();
        let graph = ChannelGraph::new();
        install(&mut rig.renderer, &graph);
        rig.shared.stopping.store(true, Ordering::Release);
        let mut data = vec![1.0; 32];
        rig.renderer.process_interleaved(&mut data, 2);
        assert!(data.iter().all(|s| *s == 0.0));
        assert!(rig.shared.halted.load(Ordering::Acquire));
    }

    #[test]
    fn test_slow_callback_counts_underrun() {
        struct Sluggish;

        impl Effect for Sluggish {
            fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
                (left, right)
            }
            fn process_block_stereo(&mut self, _left: &mut [f32], _right: &mut [f32]) {
                std::thread::sleep(std::time::Duration::from_millis(5));
            }
            fn set_sample_rate(&mut self, _: f32) {}
            fn reset(&mut self) {}
        }

        impl mixbus_core::ParameterInfo for Sluggish {
            fn param_count(&self) -> usize {
                0
            }
            fn param_info(&self, _: usize) -> Option<mixbus_core::ParamDescriptor> {
                None
            }
            fn get_param(&self, _: usize) -> f32 {
                0.0
            }
            fn set_param(&mut self, _: usize, _: f32) {}
        }

        let mut rig = rig();
        let graph = ChannelGraph::new();
        install(&mut rig.renderer, &graph);
        let mut slot = EffectSlot::new("sluggish", Box::new(Sluggish), SR, BLOCK);
        slot.set_auto_shutoff(false);
        rig.renderer.apply(AudioCommand::InsertEffect {
            slot: 0,
            index: 0,
            effect: slot,
        });

        // 64 frames at 48 kHz is about 1.3 ms
        let mut data = vec![0.0; BLOCK * 2];
        rig.renderer.process_interleaved(&mut data, 2);
        assert_eq!(rig.shared.underruns.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_host_returns_renderer_on_drop() {
        let rig = rig();
        let (home_tx, home_rx) = bounded(1);
        let mut host = RendererHost::new(rig.renderer, home_tx);
        let mut data = vec![0.0; 16];
        host.process(&mut data, 2);
        drop(host);
        assert!(home_rx.try_recv().is_ok());
    }
}
