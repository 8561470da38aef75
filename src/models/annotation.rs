// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Event mark data structures.
//!
//! A recording has a fixed number of numbered event slots. Filled slots are
//! kept in non-decreasing frame order, and a slot can only be filled once
//! the slot before it is.

/// One marked time instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventMark {
    pub frame: u64,
    /// Seconds from the start of the video.
    pub time: f64,
    /// Index into the recording's audio track, when one is loaded.
    pub audio_sample: Option<u64>,
}

impl EventMark {
    /// Create a mark without an audio position.
    pub fn new(frame: u64, time: f64) -> Self {
        Self {
            frame,
            time,
            audio_sample: None,
        }
    }

    /// Attach the audio sample index for the given sample rate.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.audio_sample = Some(crate::util::geometry::time_to_sample(self.time, sample_rate));
        self
    }
}

/// Outcome of setting a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The mark was stored; `cleared` later slots were invalidated.
    Stored { cleared: usize },
    /// The previous slot is still empty.
    MissingPrevious,
    /// The mark lies before the previous slot; this slot and later ones were cleared.
    BeforePrevious,
    OutOfRange,
}

/// The ordered event slots of one recording.
#[derive(Debug, Clone, PartialEq)]
pub struct EventMarks {
    slots: Vec<Option<EventMark>>,
}

impl EventMarks {
    /// Create `count` empty slots.
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![None; count],
        }
    }

    /// Build slots from stored `(number, mark)` pairs as they are.
    ///
    /// Stored data is shown verbatim, so ordering is not enforced here;
    /// numbers outside `1..=count` are dropped.
    pub fn from_stored(count: usize, stored: impl IntoIterator<Item = (usize, EventMark)>) -> Self {
        let mut marks = Self::new(count);
        for (number, mark) in stored {
            if let Some(slot) = number.checked_sub(1).and_then(|idx| marks.slots.get_mut(idx)) {
                *slot = Some(mark);
            }
        }
        marks
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Get slot `number` (1-based).
    pub fn get(&self, number: usize) -> Option<&EventMark> {
        number
            .checked_sub(1)
            .and_then(|idx| self.slots.get(idx))
            .and_then(|slot| slot.as_ref())
    }

    /// Iterate over `(number, slot)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Option<&EventMark>)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(idx, slot)| (idx + 1, slot.as_ref()))
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }

    /// Set slot `number` (1-based) to `mark`, keeping slot order intact.
    pub fn set(&mut self, number: usize, mark: EventMark) -> SetOutcome {
        if number == 0 || number > self.slots.len() {
            return SetOutcome::OutOfRange;
        }
        let idx = number - 1;

        if idx > 0 {
            match self.slots[idx - 1] {
                None => return SetOutcome::MissingPrevious,
                Some(prev) if mark.frame < prev.frame => {
                    self.clear_from(idx);
                    return SetOutcome::BeforePrevious;
                }
                Some(_) => {}
            }
        }

        self.slots[idx] = Some(mark);
        SetOutcome::Stored {
            cleared: self.invalidate_after(idx),
        }
    }

    /// Copy a stored mark into slot `number` exactly as it is.
    ///
    /// Later slots that fall before the restored frame are cleared.
    pub fn restore(&mut self, number: usize, stored: &EventMark) -> bool {
        if number == 0 || number > self.slots.len() {
            return false;
        }
        let idx = number - 1;
        self.slots[idx] = Some(*stored);
        self.invalidate_after(idx);
        true
    }

    /// Empty every slot.
    pub fn clear_all(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
    }

    /// Clear the first later slot that breaks ordering, and everything after it.
    fn invalidate_after(&mut self, idx: usize) -> usize {
        let Some(anchor) = self.slots[idx] else {
            return 0;
        };
        let broken = self.slots[idx + 1..]
            .iter()
            .position(|s| s.map_or(false, |m| m.frame < anchor.frame));
        match broken {
            Some(offset) => self.clear_from(idx + 1 + offset),
            None => 0,
        }
    }

    /// Clear slots from `idx` onwards, returning how many were filled.
    fn clear_from(&mut self, idx: usize) -> usize {
        let mut cleared = 0;
        for slot in &mut self.slots[idx..] {
            if slot.take().is_some() {
                cleared += 1;
            }
        }
        cleared
    }
}

/// Format the window title for the current position and marks.
pub fn format_title(
    file_name: &str,
    frame: u64,
    time: f64,
    existing: &EventMarks,
    current: &EventMarks,
) -> String {
    let mut title = format!("{} | {}({:.2}s)", file_name, frame, time);

    if !existing.is_empty() {
        title.push_str(" | Existing :");
        for (number, mark) in existing.iter() {
            if let Some(m) = mark {
                title.push_str(&format!(" {}: F(T): {}({:.2}s)", number, m.frame, m.time));
            }
        }
    }

    let mut first = true;
    for (number, mark) in current.iter() {
        let Some(m) = mark else {
            continue;
        };
        let prefix = if first { " | New : " } else { " | " };
        first = false;
        title.push_str(&format!("{}E{} F(T): {}({:.2}s)", prefix, number, m.frame, m.time));
    }

    title
}
