// Merger - Append the finished chord track to the source SMF
// Second times are converted back to ticks against the source's own
// tempo map, so the accompaniment lines up with the performance

use midly::num::u4;
use midly::{Format, MetaMessage, MidiMessage, Smf, TrackEvent, TrackEventKind};

use crate::midi::source::{MidiError, SourceMidi, TempoMap};
use crate::track::ChordTrack;

/// Percussion channel to avoid when placing the chord instrument
const PERCUSSION_CHANNEL: u8 = 9;

/// Pick a channel for the chord track: the lowest non-percussion
/// channel the source does not already use, falling back to 0
fn pick_channel(source: &SourceMidi) -> u8 {
    (0u8..16)
        .find(|&ch| {
            ch != PERCUSSION_CHANNEL && source.instruments.iter().all(|inst| inst.channel != ch)
        })
        .unwrap_or(0)
}

/// Build a midly track from the chord notes at the given channel
fn build_midi_track<'a>(
    chord_track: &'a ChordTrack,
    tempo_map: &TempoMap,
    channel: u8,
) -> midly::Track<'a> {
    let channel = u4::from(channel);

    let mut events: Vec<(u64, bool, TrackEventKind<'a>)> = Vec::new();
    events.push((
        0,
        false,
        TrackEventKind::Meta(MetaMessage::TrackName(chord_track.name.as_bytes())),
    ));
    events.push((
        0,
        false,
        TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange {
                program: chord_track.program.into(),
            },
        },
    ));

    for note in &chord_track.notes {
        let tick_on = tempo_map.seconds_to_tick(note.start);
        let tick_off = tempo_map.seconds_to_tick(note.end);

        events.push((
            tick_on,
            true,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn {
                    key: note.pitch.into(),
                    vel: note.velocity.into(),
                },
            },
        ));
        events.push((
            tick_off,
            false,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff {
                    key: note.pitch.into(),
                    vel: 0.into(),
                },
            },
        ));
    }

    // Note-offs sort before note-ons at the same tick, so seamless
    // chord boundaries release the previous chord first
    events.sort_by_key(|&(tick, is_on, _)| (tick, is_on));

    let mut track = midly::Track::new();
    let mut last_tick = 0u64;
    for (tick, _, kind) in events {
        let delta = tick.saturating_sub(last_tick);
        track.push(TrackEvent {
            delta: (delta as u32).into(),
            kind,
        });
        last_tick = tick;
    }
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    track
}

/// Append the chord track to the source file's instrument list and
/// serialize the combined song.
///
/// The source is re-parsed here; unreadable bytes fail the whole merge
/// with no partial output.
pub fn merge_chord_track<'a>(
    source_bytes: &'a [u8],
    chord_track: &'a ChordTrack,
    source: &SourceMidi,
) -> Result<Vec<u8>, MidiError> {
    let mut smf = Smf::parse(source_bytes)?;

    let channel = pick_channel(source);
    let track = build_midi_track(chord_track, &source.tempo_map, channel);

    // A single-track file gains a second track, so promote the format
    if smf.header.format == Format::SingleTrack {
        smf.header.format = Format::Parallel;
    }
    smf.tracks.push(track);

    let mut bytes = Vec::new();
    smf.write(&mut bytes)
        .map_err(|e| MidiError::Write(e.to_string()))?;
    Ok(bytes)
}
