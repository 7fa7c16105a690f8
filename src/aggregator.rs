// src/aggregator.rs

use crate::types::{AggregatedViolation, FrameEvent, ViolationKind};

/// Groups per-frame violations by kind across a whole video. Entries keep
/// first-occurrence order, which downstream reporting relies on for
/// deterministic output; the frame sets themselves are order-independent.
#[derive(Debug, Default, Clone)]
pub struct ViolationAggregate {
    entries: Vec<AggregatedViolation>,
}

impl ViolationAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the aggregate from a complete event sequence.
    pub fn from_events(events: &[FrameEvent]) -> Self {
        let mut agg = Self::new();
        for event in events {
            agg.fold(event);
        }
        agg
    }

    /// Folds one event in. Frame indices are unique per video by
    /// construction, so the per-kind sets grow monotonically.
    pub fn fold(&mut self, event: &FrameEvent) {
        for violation in &event.violations {
            match self.entries.iter_mut().find(|e| e.kind == violation.kind) {
                Some(entry) => {
                    entry.frames.insert(event.frame_index);
                }
                None => {
                    let mut frames = std::collections::BTreeSet::new();
                    frames.insert(event.frame_index);
                    self.entries.push(AggregatedViolation {
                        kind: violation.kind,
                        frames,
                    });
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[AggregatedViolation] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<AggregatedViolation> {
        self.entries
    }

    pub fn occurrences(&self, kind: ViolationKind) -> usize {
        self.entries
            .iter()
            .find(|e| e.kind == kind)
            .map_or(0, |e| e.frames.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FrameStatus, Violation};

    fn event(frame_index: u64, kinds: &[ViolationKind]) -> FrameEvent {
        FrameEvent {
            frame_index,
            detections: Vec::new(),
            violations: kinds.iter().map(|k| Violation::of(*k)).collect(),
            status: if kinds.is_empty() {
                FrameStatus::Compliant
            } else {
                FrameStatus::ViolationDetected
            },
        }
    }

    #[test]
    fn test_empty_input_gives_empty_mapping() {
        let agg = ViolationAggregate::from_events(&[]);
        assert!(agg.is_empty());
    }

    #[test]
    fn test_compliant_events_contribute_nothing() {
        let events = vec![event(10, &[]), event(20, &[])];
        let agg = ViolationAggregate::from_events(&events);
        assert!(agg.is_empty());
    }

    #[test]
    fn test_groups_frames_by_kind() {
        // 3 frames missing a hard hat, one of them also missing a vest.
        let events = vec![
            event(10, &[ViolationKind::NoHardHat]),
            event(20, &[ViolationKind::NoHardHat, ViolationKind::NoVest]),
            event(30, &[ViolationKind::NoHardHat]),
        ];
        let agg = ViolationAggregate::from_events(&events);

        assert_eq!(agg.entries().len(), 2);
        assert_eq!(agg.occurrences(ViolationKind::NoHardHat), 3);
        assert_eq!(agg.occurrences(ViolationKind::NoVest), 1);

        let hard_hat = &agg.entries()[0];
        assert_eq!(hard_hat.kind, ViolationKind::NoHardHat);
        assert_eq!(
            hard_hat.frames.iter().copied().collect::<Vec<_>>(),
            vec![10, 20, 30]
        );
        assert_eq!(agg.entries()[1].kind, ViolationKind::NoVest);
    }

    #[test]
    fn test_key_order_is_first_occurrence() {
        let events = vec![
            event(10, &[ViolationKind::NoMask]),
            event(20, &[ViolationKind::NoHardHat]),
        ];
        let agg = ViolationAggregate::from_events(&events);
        let kinds: Vec<ViolationKind> = agg.entries().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ViolationKind::NoMask, ViolationKind::NoHardHat]);
    }

    #[test]
    fn test_occurrence_sets_invariant_under_reordering() {
        let events = vec![
            event(10, &[ViolationKind::NoHardHat]),
            event(20, &[ViolationKind::NoHardHat, ViolationKind::NoVest]),
            event(30, &[ViolationKind::NoMask]),
        ];
        let mut shuffled = events.clone();
        shuffled.reverse();

        let a = ViolationAggregate::from_events(&events);
        let b = ViolationAggregate::from_events(&shuffled);

        for kind in ViolationKind::ALL {
            let frames_a = a.entries().iter().find(|e| e.kind == kind).map(|e| &e.frames);
            let frames_b = b.entries().iter().find(|e| e.kind == kind).map(|e| &e.frames);
            assert_eq!(frames_a, frames_b);
        }
    }

    #[test]
    fn test_incremental_fold_matches_batch() {
        let events = vec![
            event(10, &[ViolationKind::NoVest]),
            event(20, &[ViolationKind::NoVest]),
        ];
        let mut incremental = ViolationAggregate::new();
        for e in &events {
            incremental.fold(e);
        }
        let batch = ViolationAggregate::from_events(&events);
        assert_eq!(incremental.entries(), batch.entries());
    }
}
