//! Sequence fragment assembly (BDAV §4.5.1): concatenates the
//! `first`/`continuation`/`last` fragments of a fragmentable segment type
//! (ODS, ICS) into one assembled buffer, keyed by the segment's id
//! (`object_id` or, for ICS, a fixed key since an epoch carries at most
//! one interactive composition sequence per Display Set).

use std::collections::HashMap;

use crate::error::{HdmvError, Result};
use crate::segment::{SegmentType, SequenceDescriptor};

/// Tracks in-progress sequence buffers for one fragmentable segment type
/// within the current Display Set.
#[derive(Debug, Default)]
pub struct FragmentAssembler {
    segment_type: Option<SegmentType>,
    pending: HashMap<u16, Vec<u8>>,
}

impl FragmentAssembler {
    /// Creates an assembler for the given fragmentable segment type (used
    /// only to label errors).
    pub fn new(segment_type: SegmentType) -> Self {
        Self { segment_type: Some(segment_type), pending: HashMap::new() }
    }

    fn segment_type(&self) -> SegmentType {
        self.segment_type.unwrap_or(SegmentType::Ods)
    }

    /// Feeds one fragment's descriptor and payload bytes. Returns
    /// `Some(assembled)` once `last_in_sequence` has been observed for
    /// `id`, `None` while the sequence is still open.
    pub fn feed(&mut self, id: u16, descriptor: SequenceDescriptor, data: &[u8]) -> Result<Option<Vec<u8>>> {
        match (descriptor.first_in_sequence, descriptor.last_in_sequence) {
            (true, true) => Ok(Some(data.to_vec())),
            (true, false) => {
                if self.pending.contains_key(&id) {
                    return Err(HdmvError::UnexpectedFragment(self.segment_type(), id));
                }
                self.pending.insert(id, data.to_vec());
                Ok(None)
            }
            (false, false) => {
                let buffer = self.pending.get_mut(&id).ok_or(HdmvError::UnexpectedFragment(self.segment_type(), id))?;
                buffer.extend_from_slice(data);
                Ok(None)
            }
            (false, true) => {
                let mut buffer =
                    self.pending.remove(&id).ok_or(HdmvError::UnexpectedFragment(self.segment_type(), id))?;
                buffer.extend_from_slice(data);
                Ok(Some(buffer))
            }
        }
    }

    /// Ids with no `last_in_sequence` fragment observed yet; non-empty at
    /// `END` means an [`HdmvError::UnclosedSequence`].
    pub fn open_ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.pending.keys().copied()
    }

    /// Checks that no sequence was left open, per BDAV §4.5.2 completion
    /// rule.
    pub fn check_closed(&self) -> Result<()> {
        if let Some(id) = self.open_ids().next() {
            return Err(HdmvError::UnclosedSequence(self.segment_type(), id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(first: bool, last: bool) -> SequenceDescriptor {
        SequenceDescriptor { first_in_sequence: first, last_in_sequence: last }
    }

    #[test]
    fn whole_fragment_assembles_immediately() {
        let mut asm = FragmentAssembler::new(SegmentType::Ods);
        let result = asm.feed(1, descriptor(true, true), &[1, 2, 3]).unwrap();
        assert_eq!(result, Some(vec![1, 2, 3]));
        asm.check_closed().unwrap();
    }

    #[test]
    fn first_then_last_concatenates() {
        let mut asm = FragmentAssembler::new(SegmentType::Ods);
        assert_eq!(asm.feed(1, descriptor(true, false), &[1, 2]).unwrap(), None);
        let result = asm.feed(1, descriptor(false, true), &[3, 4]).unwrap();
        assert_eq!(result, Some(vec![1, 2, 3, 4]));
    }

    #[test]
    fn continuation_without_pending_is_fatal() {
        let mut asm = FragmentAssembler::new(SegmentType::Ods);
        assert!(asm.feed(1, descriptor(false, false), &[1]).is_err());
    }

    #[test]
    fn unclosed_sequence_is_detected_at_end() {
        let mut asm = FragmentAssembler::new(SegmentType::Ods);
        asm.feed(1, descriptor(true, false), &[1]).unwrap();
        assert!(asm.check_closed().is_err());
    }
}
