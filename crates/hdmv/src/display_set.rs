//! Display-Set state machine and epoch-level sequence tracking
//! (BDAV §4.5.2–§4.5.3).

use std::collections::HashMap;

use crate::error::{HdmvError, Result};
use crate::segment::{CompositionState, SegmentType, VideoDescriptor};

/// `{uninitialised, initialised, completed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplaySetPhase {
    /// No Display Set has started yet.
    Uninitialised,
    /// A composition segment opened a new DS; its `END` has not arrived.
    Initialised,
    /// The DS's `END` segment was validated.
    Completed,
}

/// Per-segment-type sequence-count caps, checked both per-Display-Set and
/// per-epoch at `END`. BDAV allows at most 2 composition objects per
/// composition segment and, in practice, a small handful of palettes and
/// objects per epoch; these defaults follow that common authoring
/// envelope and are documented as an explicit judgment call.
#[derive(Debug, Clone)]
pub struct SequenceCaps {
    /// Per-Display-Set caps, by segment type.
    pub per_ds: HashMap<SegmentType, u32>,
    /// Per-epoch caps, by segment type.
    pub per_epoch: HashMap<SegmentType, u32>,
}

impl Default for SequenceCaps {
    fn default() -> Self {
        let mut per_ds = HashMap::new();
        per_ds.insert(SegmentType::Pds, 8);
        per_ds.insert(SegmentType::Ods, 2);
        per_ds.insert(SegmentType::Pcs, 1);
        per_ds.insert(SegmentType::Wds, 1);
        per_ds.insert(SegmentType::Ics, 1);

        let mut per_epoch = HashMap::new();
        per_epoch.insert(SegmentType::Pds, 8);
        per_epoch.insert(SegmentType::Ods, 64);

        Self { per_ds, per_epoch }
    }
}

/// Epoch-scoped state: the sequence inventory (by id, with its last-seen
/// assembled content for duplicate-DS comparison) and the running
/// Display-Set state machine.
#[derive(Debug)]
pub struct Epoch {
    phase: DisplaySetPhase,
    video_descriptor: Option<VideoDescriptor>,
    last_composition_number: Option<u16>,
    is_duplicate: bool,
    palettes: HashMap<u8, Vec<u8>>,
    objects: HashMap<u16, Vec<u8>>,
    seq_count_epoch: HashMap<SegmentType, u32>,
    previous_interval: Option<(u64, u64)>,
    caps: SequenceCaps,
}

impl Epoch {
    /// Creates a fresh epoch with the default sequence caps.
    pub fn new() -> Self {
        Self::with_caps(SequenceCaps::default())
    }

    /// Creates a fresh epoch with explicit sequence caps.
    pub fn with_caps(caps: SequenceCaps) -> Self {
        Self {
            phase: DisplaySetPhase::Uninitialised,
            video_descriptor: None,
            last_composition_number: None,
            is_duplicate: false,
            palettes: HashMap::new(),
            objects: HashMap::new(),
            seq_count_epoch: HashMap::new(),
            previous_interval: None,
            caps,
        }
    }

    /// The current Display-Set phase.
    pub fn phase(&self) -> DisplaySetPhase {
        self.phase
    }

    /// Transitions on receipt of a new composition segment (PCS or ICS),
    /// validating `composition_number` continuity, the epoch-start rule,
    /// and `video_descriptor` constancy (BDAV §4.5.2 rules 1-3).
    pub fn begin_display_set(
        &mut self,
        composition_number: u16,
        composition_state: CompositionState,
        video_descriptor: VideoDescriptor,
    ) -> Result<()> {
        match self.last_composition_number {
            None => {
                if composition_state != CompositionState::EpochStart {
                    return Err(HdmvError::FirstDisplaySetNotEpochStart);
                }
                self.is_duplicate = false;
            }
            Some(previous) => {
                let expected_new = previous.wrapping_add(1);
                if composition_number != expected_new && composition_number != previous {
                    return Err(HdmvError::CompositionNumberDiscontinuity { previous, current: composition_number });
                }
                self.is_duplicate = composition_state != CompositionState::EpochStart && composition_number == previous;
            }
        }

        if composition_state == CompositionState::EpochStart {
            self.palettes.clear();
            self.objects.clear();
            self.seq_count_epoch.clear();
            self.video_descriptor = Some(video_descriptor);
        } else {
            match self.video_descriptor {
                Some(previous) if previous != video_descriptor => {
                    return Err(HdmvError::VideoDescriptorChanged { previous, current: video_descriptor });
                }
                Some(_) => {}
                None => self.video_descriptor = Some(video_descriptor),
            }
        }

        self.last_composition_number = Some(composition_number);
        self.phase = DisplaySetPhase::Initialised;
        Ok(())
    }

    /// Registers a PDS's `palette_id` and its assembled payload bytes as
    /// present in the current Display Set. On an ordinary (non-duplicate)
    /// DS this is new-or-update: the content replaces whatever was stored
    /// for `palette_id`, incrementing the per-epoch count the first time
    /// the id is seen. On a duplicate DS (BDAV §4.5.2 rule 4, §4.5.3) the
    /// id must already be present in the epoch's inventory with
    /// byte-identical content; any new id or any content mismatch is
    /// fatal.
    pub fn register_palette(&mut self, palette_id: u8, content: &[u8]) -> Result<()> {
        if self.is_duplicate {
            return Self::check_duplicate(&self.palettes, palette_id, content, SegmentType::Pds, palette_id as u16);
        }
        if self.palettes.insert(palette_id, content.to_vec()).is_none() {
            *self.seq_count_epoch.entry(SegmentType::Pds).or_insert(0) += 1;
        }
        Ok(())
    }

    /// Registers an ODS's `object_id` and its assembled payload bytes,
    /// analogous to [`Self::register_palette`].
    pub fn register_object(&mut self, object_id: u16, content: &[u8]) -> Result<()> {
        if self.is_duplicate {
            return Self::check_duplicate(&self.objects, object_id, content, SegmentType::Ods, object_id);
        }
        if self.objects.insert(object_id, content.to_vec()).is_none() {
            *self.seq_count_epoch.entry(SegmentType::Ods).or_insert(0) += 1;
        }
        Ok(())
    }

    fn check_duplicate<K: std::hash::Hash + Eq + Copy>(
        inventory: &HashMap<K, Vec<u8>>,
        id: K,
        content: &[u8],
        segment_type: SegmentType,
        error_id: u16,
    ) -> Result<()> {
        match inventory.get(&id) {
            Some(previous) if previous.as_slice() == content => Ok(()),
            _ => Err(HdmvError::DuplicateDisplaySetMismatch(segment_type, error_id)),
        }
    }

    /// Checks per-Display-Set and per-epoch sequence-count caps at `END`.
    pub fn check_counts(&self, per_ds_counts: &HashMap<SegmentType, u32>) -> Result<()> {
        for (&segment_type, &actual) in per_ds_counts {
            if let Some(&cap) = self.caps.per_ds.get(&segment_type) {
                if actual > cap {
                    return Err(HdmvError::CountExceeded { scope: "per-Display-Set", segment_type, cap, actual });
                }
            }
        }
        for (&segment_type, &actual) in &self.seq_count_epoch {
            if let Some(&cap) = self.caps.per_epoch.get(&segment_type) {
                if actual > cap {
                    return Err(HdmvError::CountExceeded { scope: "per-epoch", segment_type, cap, actual });
                }
            }
        }
        Ok(())
    }

    /// Validates that a new Display Set's decode interval does not overlap
    /// the previous one's, then records it (BDAV §4.5.4's IG-is-stricter
    /// ordering constraint; both IGS and PGS reject overlap here).
    pub fn check_interval(&mut self, decode_time: u64, pres_time: u64) -> Result<()> {
        if let Some((_, previous_pres_time)) = self.previous_interval {
            if decode_time < previous_pres_time {
                return Err(HdmvError::IntervalOverlap { decode_time, pres_time });
            }
        }
        self.previous_interval = Some((decode_time, pres_time));
        Ok(())
    }

    /// Marks the current Display Set completed, after all `END`-time
    /// validations have passed.
    pub fn complete_display_set(&mut self) {
        self.phase = DisplaySetPhase::Completed;
    }
}

impl Default for Epoch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vd() -> VideoDescriptor {
        VideoDescriptor { video_width: 1920, video_height: 1080, frame_rate: 0x4 }
    }

    #[test]
    fn first_display_set_must_be_epoch_start() {
        let mut epoch = Epoch::new();
        let err = epoch.begin_display_set(0, CompositionState::Normal, vd()).unwrap_err();
        assert!(matches!(err, HdmvError::FirstDisplaySetNotEpochStart));
    }

    #[test]
    fn composition_number_must_continue_or_repeat() {
        let mut epoch = Epoch::new();
        epoch.begin_display_set(0, CompositionState::EpochStart, vd()).unwrap();
        epoch.begin_display_set(1, CompositionState::Normal, vd()).unwrap();
        epoch.begin_display_set(1, CompositionState::Normal, vd()).unwrap(); // duplicate DS
        let err = epoch.begin_display_set(5, CompositionState::Normal, vd()).unwrap_err();
        assert!(matches!(err, HdmvError::CompositionNumberDiscontinuity { previous: 1, current: 5 }));
    }

    #[test]
    fn video_descriptor_must_not_change_within_epoch() {
        let mut epoch = Epoch::new();
        epoch.begin_display_set(0, CompositionState::EpochStart, vd()).unwrap();
        let mut changed = vd();
        changed.video_width = 1280;
        let err = epoch.begin_display_set(1, CompositionState::Normal, changed).unwrap_err();
        assert!(matches!(err, HdmvError::VideoDescriptorChanged { .. }));
    }

    #[test]
    fn epoch_start_resets_sequence_inventory() {
        let mut epoch = Epoch::new();
        epoch.begin_display_set(0, CompositionState::EpochStart, vd()).unwrap();
        epoch.register_palette(1, &[0xAA]).unwrap();
        epoch.register_object(1, &[0xBB]).unwrap();

        let mut changed = vd();
        changed.video_width = 1280;
        epoch.begin_display_set(1, CompositionState::EpochStart, changed).unwrap();
        assert!(epoch.objects.is_empty());
        assert!(epoch.palettes.is_empty());
    }

    #[test]
    fn duplicate_display_set_accepts_identical_content() {
        let mut epoch = Epoch::new();
        epoch.begin_display_set(0, CompositionState::EpochStart, vd()).unwrap();
        epoch.register_palette(1, &[0xAA, 0xBB]).unwrap();
        epoch.register_object(1, &[0x01, 0x02, 0x03]).unwrap();

        epoch.begin_display_set(0, CompositionState::Normal, vd()).unwrap();
        epoch.register_palette(1, &[0xAA, 0xBB]).unwrap();
        epoch.register_object(1, &[0x01, 0x02, 0x03]).unwrap();
    }

    #[test]
    fn duplicate_display_set_rejects_content_mismatch() {
        let mut epoch = Epoch::new();
        epoch.begin_display_set(0, CompositionState::EpochStart, vd()).unwrap();
        epoch.register_palette(1, &[0xAA, 0xBB]).unwrap();

        epoch.begin_display_set(0, CompositionState::Normal, vd()).unwrap();
        let err = epoch.register_palette(1, &[0xAA, 0xFF]).unwrap_err();
        assert!(matches!(err, HdmvError::DuplicateDisplaySetMismatch(SegmentType::Pds, 1)));
    }

    #[test]
    fn duplicate_display_set_rejects_unknown_id() {
        let mut epoch = Epoch::new();
        epoch.begin_display_set(0, CompositionState::EpochStart, vd()).unwrap();
        epoch.register_object(1, &[0x01]).unwrap();

        epoch.begin_display_set(0, CompositionState::Normal, vd()).unwrap();
        let err = epoch.register_object(2, &[0x01]).unwrap_err();
        assert!(matches!(err, HdmvError::DuplicateDisplaySetMismatch(SegmentType::Ods, 2)));
    }

    #[test]
    fn overlapping_decode_intervals_are_fatal() {
        let mut epoch = Epoch::new();
        epoch.check_interval(0, 100).unwrap();
        let err = epoch.check_interval(50, 200).unwrap_err();
        assert!(matches!(err, HdmvError::IntervalOverlap { .. }));
        epoch.check_interval(100, 200).unwrap();
    }

    #[test]
    fn per_ds_cap_violation_is_reported() {
        let epoch = Epoch::new();
        let mut counts = HashMap::new();
        counts.insert(SegmentType::Ods, 3);
        let err = epoch.check_counts(&counts).unwrap_err();
        assert!(matches!(err, HdmvError::CountExceeded { segment_type: SegmentType::Ods, cap: 2, actual: 3, .. }));
    }
}
