//! Project file format.
//!
//! A project is the persisted session: transport settings, the mixer channel
//! graph with effects and sends, and tracks with their clips.
//!
//! ```toml
//! name = "Night Drive"
//!
//! [transport]
//! bpm = 96.0
//! after_stop = "go_to_start"
//! loop = { start_tick = 0, end_tick = 768 }
//!
//! [[channels]]
//! id = 0
//! name = "Master"
//!
//! [[channels]]
//! id = 1
//! name = "Drums"
//! volume = 0.8
//! [[channels.sends]]
//! to = 0
//! gain = 1.0
//! [[channels.effects]]
//! type = "filter"
//! params = { cutoff = "4kHz" }
//!
//! [[tracks]]
//! name = "Loop"
//! channel = 1
//! [[tracks.clips]]
//! start_tick = 0
//! length_ticks = 768
//! file = "drums.wav"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mixbus_core::{
    AudioClip, Channel, ChannelGraph, ChannelId, Clip, ClipContent, LoopRange, Note, Track,
    TrackId, Transport,
};

use crate::effect_config::EffectConfig;
use crate::error::ConfigError;
use crate::settings::AfterStop;
use crate::validation::{MAX_LANES, ValidationError};

fn default_one() -> f32 {
    1.0
}

fn default_bpm() -> f32 {
    120.0
}

fn default_channels() -> Vec<ChannelConfig> {
    vec![ChannelConfig::new(0, "Master")]
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

fn is_unity(value: &f32) -> bool {
    *value == 1.0
}

/// `[transport]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Tempo in BPM.
    #[serde(default = "default_bpm")]
    pub bpm: f32,
    /// After-stop policy.
    #[serde(default)]
    pub after_stop: AfterStop,
    /// Loop region in ticks.
    #[serde(default, rename = "loop", skip_serializing_if = "Option::is_none")]
    pub loop_range: Option<LoopConfig>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bpm: default_bpm(),
            after_stop: AfterStop::default(),
            loop_range: None,
        }
    }
}

impl TransportConfig {
    /// A stopped transport with these settings.
    pub fn to_transport(&self, sample_rate: f32) -> Result<Transport, ConfigError> {
        let mut transport = Transport::new(sample_rate, self.bpm);
        transport.set_stop_behavior(self.after_stop.into());
        transport
            .set_loop(self.loop_range.map(|l| LoopRange {
                start_tick: l.start_tick,
                end_tick: l.end_tick,
            }))
            .map_err(ValidationError::Transport)?;
        Ok(transport)
    }

    /// Settings of a live transport.
    pub fn from_transport(transport: &Transport) -> Self {
        Self {
            bpm: transport.bpm(),
            after_stop: transport.stop_behavior().into(),
            loop_range: transport.loop_range().map(|l| LoopConfig {
                start_tick: l.start_tick,
                end_tick: l.end_tick,
            }),
        }
    }
}

/// Loop region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// First tick inside the loop.
    pub start_tick: u64,
    /// First tick after the loop.
    pub end_tick: u64,
}

/// An outgoing send.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SendConfig {
    /// Target channel id.
    pub to: u32,
    /// Linear send gain.
    #[serde(default = "default_one")]
    pub gain: f32,
}

/// A mixer channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel id. `0` is the master.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Linear volume, 0 to 2.
    #[serde(default = "default_one")]
    pub volume: f32,
    /// Pan, -1 to 1.
    #[serde(default)]
    pub pan: f32,
    /// Mute flag.
    #[serde(default)]
    pub muted: bool,
    /// Solo flag.
    #[serde(default)]
    pub solo: bool,
    /// Outgoing sends.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sends: Vec<SendConfig>,
    /// Effect chain in processing order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<EffectConfig>,
}

impl ChannelConfig {
    /// Unity, centered channel with no sends or effects.
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            volume: 1.0,
            pan: 0.0,
            muted: false,
            solo: false,
            sends: Vec::new(),
            effects: Vec::new(),
        }
    }

    /// Add a send.
    pub fn with_send(mut self, to: u32, gain: f32) -> Self {
        self.sends.push(SendConfig { to, gain });
        self
    }

    /// Append an effect.
    pub fn with_effect(mut self, effect: EffectConfig) -> Self {
        self.effects.push(effect);
        self
    }

    fn to_channel(&self) -> Result<Channel, ConfigError> {
        let mut channel = Channel::new(ChannelId(self.id), self.name.clone())
            .with_volume(self.volume)
            .with_pan(self.pan);
        channel.muted = self.muted;
        channel.solo = self.solo;
        for send in &self.sends {
            channel = channel.with_send(ChannelId(send.to), send.gain);
        }
        for effect in &self.effects {
            channel = channel.with_effect(effect.to_settings()?);
        }
        Ok(channel)
    }

    fn from_channel(channel: &Channel) -> Self {
        Self {
            id: channel.id.0,
            name: channel.name.clone(),
            volume: channel.volume,
            pan: channel.pan,
            muted: channel.muted,
            solo: channel.solo,
            sends: channel
                .sends()
                .iter()
                .map(|s| SendConfig {
                    to: s.target.0,
                    gain: s.gain,
                })
                .collect(),
            effects: channel.effects.iter().map(EffectConfig::from_settings).collect(),
        }
    }
}

/// A note inside a note clip. Ticks are relative to the clip start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteConfig {
    /// Start tick relative to the clip.
    pub start_tick: u64,
    /// Length in ticks.
    pub length_ticks: u64,
    /// MIDI key.
    pub key: u8,
    /// Velocity in `[0, 1]`.
    #[serde(default = "default_one")]
    pub velocity: f32,
}

/// A clip. Audio when `file` is set, notes otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipConfig {
    /// Lane index on the track.
    #[serde(default, skip_serializing_if = "is_zero_lane")]
    pub lane: usize,
    /// Anchor tick.
    pub start_tick: u64,
    /// Length in ticks.
    pub length_ticks: u64,
    /// Linear clip gain.
    #[serde(default = "default_one", skip_serializing_if = "is_unity")]
    pub gain: f32,
    /// WAV file, relative to the project file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// Frames skipped at the start of the file.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub offset: u64,
    /// Notes played through the track instrument.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<NoteConfig>,
}

fn is_zero_lane(lane: &usize) -> bool {
    *lane == 0
}

/// A track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackConfig {
    /// Display name.
    pub name: String,
    /// Target channel id.
    #[serde(default)]
    pub channel: u32,
    /// Linear track gain.
    #[serde(default = "default_one")]
    pub gain: f32,
    /// Mute flag.
    #[serde(default)]
    pub muted: bool,
    /// Instrument id for note clips.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
    /// Clips on all lanes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clips: Vec<ClipConfig>,
}

/// A saved session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Project name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Transport settings.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Mixer channels, master included.
    #[serde(default = "default_channels")]
    pub channels: Vec<ChannelConfig>,
    /// Tracks.
    #[serde(default)]
    pub tracks: Vec<TrackConfig>,
}

impl Project {
    /// Empty project with only the master channel.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            transport: TransportConfig::default(),
            channels: default_channels(),
            tracks: Vec::new(),
        }
    }

    /// Starter project: one bus with a filter and delay, and a melody track.
    pub fn starter(name: impl Into<String>) -> Self {
        let mut project = Self::new(name);
        project.channels.push(
            ChannelConfig::new(1, "Keys")
                .with_send(0, 1.0)
                .with_effect(
                    EffectConfig::new("filter")
                        .with_param("cutoff", "3kHz")
                        .with_param("resonance", "0.9"),
                )
                .with_effect(
                    EffectConfig::new("delay")
                        .with_param("time", "375ms")
                        .with_param("feedback", "35%")
                        .with_wet_dry(0.3),
                ),
        );
        let notes = [60u8, 64, 67, 72]
            .iter()
            .enumerate()
            .map(|(i, &key)| NoteConfig {
                start_tick: i as u64 * 48,
                length_ticks: 36,
                key,
                velocity: 0.8,
            })
            .collect();
        project.tracks.push(TrackConfig {
            name: "Melody".into(),
            channel: 1,
            gain: 1.0,
            muted: false,
            instrument: Some("tone".into()),
            clips: vec![ClipConfig {
                lane: 0,
                start_tick: 0,
                length_ticks: 192,
                gain: 1.0,
                file: None,
                offset: 0,
                notes,
            }],
        });
        project.transport.loop_range = Some(LoopConfig {
            start_tick: 0,
            end_tick: 192,
        });
        project
    }

    /// Load a project from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Parse a project from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Rebuild the channel graph. Routing is validated.
    pub fn to_graph(&self) -> Result<ChannelGraph, ConfigError> {
        let channels = self
            .channels
            .iter()
            .map(ChannelConfig::to_channel)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ChannelGraph::restore(channels).map_err(ValidationError::Routing)?)
    }

    /// Build tracks, loading audio clip files relative to `base_dir`.
    ///
    /// Track ids follow file order. A file used by several clips is read once.
    pub fn build_tracks(&self, base_dir: &Path) -> Result<Vec<Track>, ConfigError> {
        let mut audio_cache: HashMap<PathBuf, (Arc<[f32]>, Arc<[f32]>)> = HashMap::new();
        let mut tracks = Vec::with_capacity(self.tracks.len());

        for (index, config) in self.tracks.iter().enumerate() {
            let mut track = Track::new(TrackId(index as u32), config.name.clone())
                .with_channel(ChannelId(config.channel));
            track.gain = config.gain;
            track.muted = config.muted;
            track.instrument = config.instrument.clone();

            for clip_config in &config.clips {
                if clip_config.lane >= MAX_LANES {
                    return Err(ValidationError::LaneOutOfRange {
                        track: config.name.clone(),
                        lane: clip_config.lane,
                    }
                    .into());
                }
                let content = match &clip_config.file {
                    Some(file) => {
                        let path = if file.is_absolute() {
                            file.clone()
                        } else {
                            base_dir.join(file)
                        };
                        let (left, right) = match audio_cache.get(&path) {
                            Some(data) => data.clone(),
                            None => {
                                let (samples, _) = mixbus_io::read_wav_stereo(&path)
                                    .map_err(|e| ConfigError::audio(&path, e))?;
                                let data: (Arc<[f32]>, Arc<[f32]>) =
                                    (samples.left.into(), samples.right.into());
                                audio_cache.insert(path.clone(), data.clone());
                                data
                            }
                        };
                        ClipContent::Audio(AudioClip {
                            left,
                            right,
                            offset: clip_config.offset,
                            source: Some(file.to_string_lossy().into_owned()),
                        })
                    }
                    None => ClipContent::Notes(
                        clip_config
                            .notes
                            .iter()
                            .map(|n| Note {
                                start_tick: n.start_tick,
                                length_ticks: n.length_ticks,
                                key: n.key,
                                velocity: n.velocity,
                            })
                            .collect(),
                    ),
                };
                let clip = Clip::new(clip_config.start_tick, clip_config.length_ticks, content)
                    .with_gain(clip_config.gain);
                while track.lanes().len() <= clip_config.lane {
                    track.add_lane();
                }
                track
                    .insert_clip(clip_config.lane, clip)
                    .map_err(|error| ValidationError::Clip {
                        track: config.name.clone(),
                        error,
                    })?;
            }
            tracks.push(track);
        }
        Ok(tracks)
    }

    /// Capture a live session.
    ///
    /// Audio clips without a source path cannot be saved and are skipped.
    pub fn from_session(
        name: impl Into<String>,
        graph: &ChannelGraph,
        tracks: &[Track],
        transport: &Transport,
    ) -> Self {
        let tracks = tracks
            .iter()
            .map(|track| TrackConfig {
                name: track.name.clone(),
                channel: track.channel.0,
                gain: track.gain,
                muted: track.muted,
                instrument: track.instrument.clone(),
                clips: track
                    .lanes()
                    .iter()
                    .enumerate()
                    .flat_map(|(lane, l)| l.clips().iter().map(move |c| (lane, c)))
                    .filter_map(|(lane, clip)| clip_config(&track.name, lane, clip))
                    .collect(),
            })
            .collect();

        Self {
            name: name.into(),
            description: None,
            transport: TransportConfig::from_transport(transport),
            channels: graph.channels().map(ChannelConfig::from_channel).collect(),
            tracks,
        }
    }
}

fn clip_config(track: &str, lane: usize, clip: &Clip) -> Option<ClipConfig> {
    let mut config = ClipConfig {
        lane,
        start_tick: clip.start_tick,
        length_ticks: clip.length_ticks,
        gain: clip.gain,
        file: None,
        offset: 0,
        notes: Vec::new(),
    };
    match &clip.content {
        ClipContent::Audio(audio) => {
            let Some(source) = &audio.source else {
                tracing::warn!(track, start_tick = clip.start_tick, "audio clip has no source file; not saved");
                return None;
            };
            config.file = Some(PathBuf::from(source));
            config.offset = audio.offset;
        }
        ClipContent::Notes(notes) => {
            config.notes = notes
                .iter()
                .map(|n| NoteConfig {
                    start_tick: n.start_tick,
                    length_ticks: n.length_ticks,
                    key: n.key,
                    velocity: n.velocity,
                })
                .collect();
        }
    }
    Some(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixbus_core::GraphError;

    #[test]
    fn test_minimal_project_has_master() {
        let project = Project::from_toml("name = \"empty\"").unwrap();
        assert_eq!(project.channels.len(), 1);
        let graph = project.to_graph().unwrap();
        assert!(graph.contains(ChannelId::MASTER));
        assert_eq!(project.transport.bpm, 120.0);
    }

    #[test]
    fn test_starter_round_trips() {
        let project = Project::starter("demo");
        let text = project.to_toml().unwrap();
        let back = Project::from_toml(&text).unwrap();
        assert_eq!(back, project);
        let graph = back.to_graph().unwrap();
        assert_eq!(graph.render_order(), vec![ChannelId(1), ChannelId::MASTER]);
    }

    #[test]
    fn test_cycle_in_file_is_rejected() {
        let mut project = Project::new("loop");
        project.channels[0].sends.push(SendConfig { to: 1, gain: 1.0 });
        project
            .channels
            .push(ChannelConfig::new(1, "A").with_send(0, 1.0));
        let err = project.to_graph().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Validation(ValidationError::Routing(GraphError::Cycle(_)))
        ));
    }

    #[test]
    fn test_overlapping_clips_rejected() {
        let mut project = Project::new("overlap");
        let clip = |start| ClipConfig {
            lane: 0,
            start_tick: start,
            length_ticks: 100,
            gain: 1.0,
            file: None,
            offset: 0,
            notes: Vec::new(),
        };
        project.tracks.push(TrackConfig {
            name: "T".into(),
            channel: 0,
            gain: 1.0,
            muted: false,
            instrument: None,
            clips: vec![clip(0), clip(50)],
        });
        let err = project.build_tracks(Path::new(".")).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Validation(ValidationError::Clip { .. })
        ));
    }

    #[test]
    fn test_clip_lanes_are_created() {
        let mut project = Project::new("lanes");
        project.tracks.push(TrackConfig {
            name: "T".into(),
            channel: 0,
            gain: 0.5,
            muted: false,
            instrument: Some("tone".into()),
            clips: vec![ClipConfig {
                lane: 2,
                start_tick: 0,
                length_ticks: 48,
                gain: 1.0,
                file: None,
                offset: 0,
                notes: vec![NoteConfig {
                    start_tick: 0,
                    length_ticks: 24,
                    key: 60,
                    velocity: 1.0,
                }],
            }],
        });
        let tracks = project.build_tracks(Path::new(".")).unwrap();
        assert_eq!(tracks[0].lanes().len(), 3);
        assert_eq!(tracks[0].lanes()[2].clips().len(), 1);
        assert_eq!(tracks[0].gain, 0.5);
    }

    #[test]
    fn test_missing_audio_file_reports_path() {
        let mut project = Project::new("audio");
        project.tracks.push(TrackConfig {
            name: "T".into(),
            channel: 0,
            gain: 1.0,
            muted: false,
            instrument: None,
            clips: vec![ClipConfig {
                lane: 0,
                start_tick: 0,
                length_ticks: 48,
                gain: 1.0,
                file: Some(PathBuf::from("missing.wav")),
                offset: 0,
                notes: Vec::new(),
            }],
        });
        let err = project.build_tracks(Path::new("/nonexistent")).unwrap_err();
        assert!(
            matches!(err, ConfigError::Audio { ref path, .. } if path.ends_with("missing.wav"))
        );
    }

    #[test]
    fn test_invalid_loop_rejected() {
        let config = TransportConfig {
            loop_range: Some(LoopConfig {
                start_tick: 96,
                end_tick: 96,
            }),
            ..TransportConfig::default()
        };
        assert!(config.to_transport(48000.0).is_err());
    }
}
