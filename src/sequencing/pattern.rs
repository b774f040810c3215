/*
Pattern
=======

An in-memory timeline: a list of notes sorted by start beat plus one
automation lane per parameter.

    beat   0     1     2     3     4
    notes  C4────      E4──  G4────────
    lane   0.2 ──────╱‾‾‾‾‾‾‾‾‾‾╲ 0.5
                 breakpoints, linearly interpolated

Range queries binary-search the sorted notes, so the sequencer's per-block
lookups stay O(log n + k) and never allocate. Outside its first and last
breakpoint a lane holds the nearest value.

Editing happens on the control thread; hand the finished pattern to the
sequencer as an `Arc<dyn Timeline>`.
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::timeline::{ParamId, Timeline};
use crate::io::midi::NoteEvent;

/// Breakpoints for a single parameter, sorted by beat.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(from = "LaneRecord"))]
#[derive(Debug, Clone, PartialEq)]
pub struct AutomationLane {
    pub id: ParamId,
    points: Vec<(f64, f32)>,
}

impl AutomationLane {
    pub fn new(id: ParamId) -> Self {
        Self {
            id,
            points: Vec::new(),
        }
    }

    /// Insert a breakpoint. A point at an existing beat replaces it.
    pub fn add_point(&mut self, beat: f64, value: f32) {
        let index = self.points.partition_point(|&(b, _)| b < beat);
        match self.points.get_mut(index) {
            Some(point) if point.0 == beat => point.1 = value,
            _ => self.points.insert(index, (beat, value)),
        }
    }

    pub fn points(&self) -> &[(f64, f32)] {
        &self.points
    }

    pub fn value_at(&self, beat: f64) -> Option<f32> {
        let (first, last) = (self.points.first()?, self.points.last()?);
        if beat <= first.0 {
            return Some(first.1);
        }
        if beat >= last.0 {
            return Some(last.1);
        }

        // first.0 < beat < last.0, so 1 <= index < len
        let index = self.points.partition_point(|&(b, _)| b <= beat);
        let (b0, v0) = self.points[index - 1];
        let (b1, v1) = self.points[index];
        let t = ((beat - b0) / (b1 - b0)) as f32;
        Some(v0 + (v1 - v0) * t)
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(from = "PatternRecord"))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pattern {
    notes: Vec<NoteEvent>,
    lanes: Vec<AutomationLane>,
}

impl Pattern {
    pub fn new() -> Self {
        Self::default()
    }

    /// One note per step, `None` for rests.
    ///
    /// `gate` is the fraction of the step the note sounds for.
    pub fn from_steps(steps: &[Option<u8>], step_beats: f64, gate: f64, velocity: u8) -> Self {
        let mut pattern = Self::new();
        for (i, step) in steps.iter().enumerate() {
            if let Some(pitch) = *step {
                pattern.add_note(NoteEvent::new(
                    pitch,
                    velocity,
                    i as f64 * step_beats,
                    step_beats * gate,
                ));
            }
        }
        pattern
    }

    pub fn note(mut self, pitch: u8, velocity: u8, time_beats: f64, duration_beats: f64) -> Self {
        self.add_note(NoteEvent::new(pitch, velocity, time_beats, duration_beats));
        self
    }

    pub fn automation(mut self, id: ParamId, beat: f64, value: f32) -> Self {
        self.add_automation_point(id, beat, value);
        self
    }

    /// Insert keeping start order. Notes sharing a start beat stay in
    /// insertion order.
    pub fn add_note(&mut self, note: NoteEvent) {
        let index = self
            .notes
            .partition_point(|n| n.time_beats <= note.time_beats);
        self.notes.insert(index, note);
    }

    pub fn add_automation_point(&mut self, id: ParamId, beat: f64, value: f32) {
        match self.lanes.iter_mut().find(|lane| lane.id == id) {
            Some(lane) => lane.add_point(beat, value),
            None => {
                let mut lane = AutomationLane::new(id);
                lane.add_point(beat, value);
                self.lanes.push(lane);
            }
        }
    }

    pub fn notes(&self) -> &[NoteEvent] {
        &self.notes
    }

    pub fn lane(&self, id: ParamId) -> Option<&AutomationLane> {
        self.lanes.iter().find(|lane| lane.id == id)
    }

    /// End of the last sounding note.
    pub fn length_beats(&self) -> f64 {
        self.notes
            .iter()
            .map(NoteEvent::end_beats)
            .fold(0.0, f64::max)
    }

    pub fn clear(&mut self) {
        self.notes.clear();
        self.lanes.clear();
    }
}

// Loaded files are re-inserted point by point so hand-edited or merged
// records come back sorted, with the last point at a repeated beat winning.
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct LaneRecord {
    id: ParamId,
    #[serde(default)]
    points: Vec<(f64, f32)>,
}

#[cfg(feature = "serde")]
impl From<LaneRecord> for AutomationLane {
    fn from(record: LaneRecord) -> Self {
        let mut lane = AutomationLane::new(record.id);
        for (beat, value) in record.points {
            lane.add_point(beat, value);
        }
        lane
    }
}

#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct PatternRecord {
    #[serde(default)]
    notes: Vec<NoteEvent>,
    #[serde(default)]
    lanes: Vec<AutomationLane>,
}

#[cfg(feature = "serde")]
impl From<PatternRecord> for Pattern {
    fn from(record: PatternRecord) -> Self {
        let mut pattern = Pattern::new();
        for note in record.notes {
            pattern.add_note(note);
        }
        for lane in record.lanes {
            for &(beat, value) in lane.points() {
                pattern.add_automation_point(lane.id, beat, value);
            }
        }
        pattern
    }
}

impl Timeline for Pattern {
    fn notes_in_range(&self, start_beats: f64, end_beats: f64, visit: &mut dyn FnMut(&NoteEvent)) {
        if start_beats >= end_beats {
            return;
        }
        let first = self.notes.partition_point(|n| n.time_beats < start_beats);
        for note in self.notes[first..]
            .iter()
            .take_while(|n| n.time_beats < end_beats)
        {
            visit(note);
        }
    }

    fn automated_parameters(&self, visit: &mut dyn FnMut(ParamId)) {
        for lane in &self.lanes {
            visit(lane.id);
        }
    }

    fn parameter_value_at(&self, id: ParamId, beat: f64) -> Option<f32> {
        self.lane(id)?.value_at(beat)
    }
}
