// Source Analysis - Parse a MIDI performance into an owned summary
// Pairs note on/off events, flags percussion, collects key signatures,
// and builds a tempo map for tick <-> seconds conversion

use std::collections::BTreeMap;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// MIDI default when a file carries no tempo event (120 BPM)
const DEFAULT_US_PER_QUARTER: f64 = 500_000.0;

/// Channel 10 (0-indexed 9) is percussion by convention
const PERCUSSION_CHANNEL: u8 = 9;

/// Circle-of-fifths letter names indexed by signed accidental count,
/// -7 (Cb) through +7 (C#)
const CIRCLE_OF_FIFTHS: [&str; 15] = [
    "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
];

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("Failed to parse MIDI file: {0}")]
    Parse(#[from] midly::Error),

    #[error("No tempo information in source file")]
    NoTempo,

    #[error("Failed to write MIDI file: {0}")]
    Write(String),
}

/// A tempo change anchored at an absolute tick, with its precomputed
/// absolute time in seconds
#[derive(Debug, Clone, Copy)]
struct TempoChange {
    tick: u64,
    seconds: f64,
    us_per_quarter: f64,
}

impl TempoChange {
    /// The implicit change every map starts from: the MIDI default
    /// tempo at tick 0
    const INITIAL: TempoChange = TempoChange {
        tick: 0,
        seconds: 0.0,
        us_per_quarter: DEFAULT_US_PER_QUARTER,
    };
}

/// Converts between absolute ticks and seconds for one source file
#[derive(Debug, Clone)]
pub struct TempoMap {
    scale: TickScale,
    /// Microseconds per quarter note of the first authored tempo event,
    /// if the file has one
    first_tempo_us: Option<f64>,
}

#[derive(Debug, Clone)]
enum TickScale {
    /// Ticks are fractions of a quarter note; tempo events set the pace
    Metrical {
        ppq: f64,
        changes: Vec<TempoChange>,
    },
    /// SMPTE timing: ticks map to wall time directly
    Timecode { seconds_per_tick: f64 },
}

impl TempoMap {
    /// Build from the file's timing header and its tempo meta events
    /// (absolute tick, microseconds per quarter note), in tick order
    fn build(timing: Timing, tempo_events: &[(u64, u32)]) -> Self {
        let first_tempo_us = tempo_events.first().map(|&(_, us)| us as f64);

        let scale = match timing {
            Timing::Metrical(ppq) => {
                let ppq = ppq.as_int() as f64;

                // Seed with the MIDI default so ticks before the first
                // authored change still convert
                let mut changes = vec![TempoChange::INITIAL];
                for &(tick, us) in tempo_events {
                    let last = changes.last().copied().unwrap_or(TempoChange::INITIAL);
                    if tick == last.tick {
                        if let Some(change) = changes.last_mut() {
                            change.us_per_quarter = us as f64;
                        }
                        continue;
                    }
                    let seconds =
                        last.seconds + (tick - last.tick) as f64 * last.us_per_quarter / ppq / 1e6;
                    changes.push(TempoChange {
                        tick,
                        seconds,
                        us_per_quarter: us as f64,
                    });
                }
                TickScale::Metrical { ppq, changes }
            }
            Timing::Timecode(fps, subframe) => TickScale::Timecode {
                seconds_per_tick: 1.0 / (fps.as_f32() as f64 * subframe as f64),
            },
        };

        TempoMap {
            scale,
            first_tempo_us,
        }
    }

    /// Absolute tick to absolute seconds
    pub fn tick_to_seconds(&self, tick: u64) -> f64 {
        match &self.scale {
            TickScale::Metrical { ppq, changes } => {
                let change = changes
                    .iter()
                    .rev()
                    .find(|c| c.tick <= tick)
                    .copied()
                    .unwrap_or(TempoChange::INITIAL);
                change.seconds + (tick - change.tick) as f64 * change.us_per_quarter / ppq / 1e6
            }
            TickScale::Timecode { seconds_per_tick } => tick as f64 * seconds_per_tick,
        }
    }

    /// Absolute seconds to the nearest absolute tick
    pub fn seconds_to_tick(&self, seconds: f64) -> u64 {
        let seconds = seconds.max(0.0);
        match &self.scale {
            TickScale::Metrical { ppq, changes } => {
                let change = changes
                    .iter()
                    .rev()
                    .find(|c| c.seconds <= seconds)
                    .copied()
                    .unwrap_or(TempoChange::INITIAL);
                let ticks_past =
                    (seconds - change.seconds) * 1e6 / change.us_per_quarter * ppq;
                change.tick + ticks_past.round() as u64
            }
            TickScale::Timecode { seconds_per_tick } => {
                (seconds / seconds_per_tick).round() as u64
            }
        }
    }

    /// BPM of the first authored tempo event, if any
    pub fn first_bpm(&self) -> Option<f64> {
        self.first_tempo_us.map(|us| 60e6 / us)
    }
}

/// A note from the source file with absolute second timing
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SourceNote {
    pub pitch: u8,
    pub velocity: u8,
    pub start: f64,
    pub end: f64,
}

/// One source instrument, keyed by MIDI channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInstrument {
    pub channel: u8,
    pub is_percussion: bool,
    pub notes: Vec<SourceNote>,
}

/// A key signature event: signed accidental count and minor flag
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KeySignatureEvent {
    pub sharps: i8,
    pub minor: bool,
}

/// Owned analysis of a parsed source MIDI file
#[derive(Debug, Clone)]
pub struct SourceMidi {
    pub instruments: Vec<SourceInstrument>,
    pub key_signatures: Vec<KeySignatureEvent>,
    pub tempo_map: TempoMap,
    /// Absolute end time of the last note (or last event when the file
    /// has no notes), in seconds
    pub end_time: f64,
}

impl SourceMidi {
    /// Parse raw SMF bytes into an owned analysis.
    ///
    /// NoteOn with velocity 0 is normalized to NoteOff. Overlapping
    /// same-pitch notes close in last-opened-first order.
    pub fn parse(bytes: &[u8]) -> Result<Self, MidiError> {
        let smf = Smf::parse(bytes)?;

        // First pass: tempo and key-signature meta events across all
        // tracks, in absolute tick order
        let mut tempo_events: Vec<(u64, u32)> = Vec::new();
        let mut key_events: Vec<(u64, KeySignatureEvent)> = Vec::new();
        let mut max_tick = 0u64;
        for track in &smf.tracks {
            let mut tick = 0u64;
            for event in track {
                tick += u64::from(event.delta.as_int());
                max_tick = max_tick.max(tick);
                match event.kind {
                    TrackEventKind::Meta(MetaMessage::Tempo(us)) => {
                        tempo_events.push((tick, us.as_int()));
                    }
                    TrackEventKind::Meta(MetaMessage::KeySignature(sharps, minor)) => {
                        key_events.push((tick, KeySignatureEvent { sharps, minor }));
                    }
                    _ => {}
                }
            }
        }
        tempo_events.sort_by_key(|&(tick, _)| tick);
        key_events.sort_by_key(|&(tick, _)| tick);

        let tempo_map = TempoMap::build(smf.header.timing, &tempo_events);

        // Second pass: pair note events per (channel, pitch)
        let mut pending: BTreeMap<(u8, u8), Vec<(u64, u8)>> = BTreeMap::new();
        let mut by_channel: BTreeMap<u8, Vec<SourceNote>> = BTreeMap::new();
        for track in &smf.tracks {
            let mut tick = 0u64;
            for event in track {
                tick += u64::from(event.delta.as_int());
                let TrackEventKind::Midi { channel, message } = event.kind else {
                    continue;
                };
                let channel = channel.as_int();
                match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        pending
                            .entry((channel, key.as_int()))
                            .or_default()
                            .push((tick, vel.as_int()));
                    }
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        if let Some(stack) = pending.get_mut(&(channel, key.as_int())) {
                            if let Some((start_tick, velocity)) = stack.pop() {
                                by_channel.entry(channel).or_default().push(SourceNote {
                                    pitch: key.as_int(),
                                    velocity,
                                    start: tempo_map.tick_to_seconds(start_tick),
                                    end: tempo_map.tick_to_seconds(tick),
                                });
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        let instruments: Vec<SourceInstrument> = by_channel
            .into_iter()
            .map(|(channel, mut notes)| {
                notes.sort_by(|a, b| {
                    a.start
                        .partial_cmp(&b.start)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                SourceInstrument {
                    channel,
                    is_percussion: channel == PERCUSSION_CHANNEL,
                    notes,
                }
            })
            .collect();

        let end_time = instruments
            .iter()
            .flat_map(|inst| inst.notes.iter().map(|n| n.end))
            .fold(f64::NEG_INFINITY, f64::max);
        let end_time = if end_time.is_finite() {
            end_time
        } else {
            tempo_map.tick_to_seconds(max_tick)
        };

        Ok(SourceMidi {
            instruments,
            key_signatures: key_events.into_iter().map(|(_, ks)| ks).collect(),
            tempo_map,
            end_time,
        })
    }

    /// Key letter from the first key-signature event, mapped through
    /// the circle of fifths; `default` when the file has none. Never
    /// errors.
    pub fn detect_key(&self, default: &str) -> String {
        match self.key_signatures.first() {
            Some(ks) => {
                let index = ks.sharps as i16 + 7;
                match CIRCLE_OF_FIFTHS.get(index as usize) {
                    Some(name) => {
                        log::info!(
                            "Source key signature: {} {}",
                            name,
                            if ks.minor { "minor" } else { "major" }
                        );
                        name.to_string()
                    }
                    None => default.to_string(),
                }
            }
            None => {
                log::info!("No key signature in source, defaulting to {}", default);
                default.to_string()
            }
        }
    }

    /// Tempo estimate (BPM, rounded) and total duration in seconds.
    ///
    /// Errs when the file carries no tempo event; callers recover with
    /// their own fallback tempo and duration.
    pub fn tempo_and_duration(&self) -> Result<(u32, f64), MidiError> {
        let bpm = self.tempo_map.first_bpm().ok_or(MidiError::NoTempo)?;
        Ok((bpm.round() as u32, self.end_time))
    }

    /// Rounded mean velocity over every note of every instrument;
    /// `default` when there are no notes
    pub fn average_velocity(&self, default: u8) -> u8 {
        let velocities: Vec<u8> = self
            .instruments
            .iter()
            .flat_map(|inst| inst.notes.iter().map(|n| n.velocity))
            .collect();
        if velocities.is_empty() {
            log::info!("No notes in source, using default velocity {}", default);
            return default;
        }
        let sum: u32 = velocities.iter().map(|&v| u32::from(v)).sum();
        (sum as f64 / velocities.len() as f64).round() as u8
    }
}
