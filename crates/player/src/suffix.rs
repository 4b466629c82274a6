//! Suffix weights: the largest total stage weight on any path from a stage
//! to an end stage. Used to estimate the weight of unseen stages when
//! scoring incomplete submissions.

use std::collections::BTreeMap;

use crate::types::{Stage, StageId};

/// Precomputed suffix weight per stage.
///
/// Stages with no path to an end stage have no entry; scoring then adds no
/// remaining weight for them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuffixWeights {
    weights: BTreeMap<StageId, u32>,
}

impl SuffixWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, stage: StageId) -> Option<u32> {
        self.weights.get(&stage).copied()
    }

    pub fn insert(&mut self, stage: StageId, weight: u32) {
        self.weights.insert(stage, weight);
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Derive suffix weights from the stage graph.
    ///
    /// Walks every simple path backwards from each end stage through the
    /// stages that lead into it, keeping the heaviest path per stage. Cycles
    /// are cut by never revisiting a stage already on the path.
    ///
    /// Every simple path is enumerated, so the cost grows exponentially on
    /// densely branching graphs. Large exercises should ship precomputed
    /// `suffix_weights` in their bundle instead.
    pub fn generate(stages: &[Stage]) -> Self {
        let mut weights: BTreeMap<StageId, u32> = BTreeMap::new();

        // Paths are stored end-first; the last element is the path's start.
        let mut pending: Vec<(Vec<usize>, u32)> = stages
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_end_stage())
            .map(|(i, s)| (vec![i], s.weight))
            .collect();

        while let Some((path, path_weight)) = pending.pop() {
            let Some(&first) = path.last() else {
                continue;
            };
            let first_id = stages[first].id;
            let entry = weights.entry(first_id).or_insert(path_weight);
            if *entry < path_weight {
                *entry = path_weight;
            }

            for (i, stage) in stages.iter().enumerate() {
                if stage.leads_to(first_id) && !path.contains(&i) {
                    let mut extended = path.clone();
                    extended.push(i);
                    pending.push((extended, path_weight.saturating_add(stage.weight)));
                }
            }
        }

        SuffixWeights { weights }
    }
}

impl FromIterator<(StageId, u32)> for SuffixWeights {
    fn from_iter<I: IntoIterator<Item = (StageId, u32)>>(iter: I) -> Self {
        SuffixWeights {
            weights: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Transition;

    fn stage(id: u64, weight: u32, default: Transition) -> Stage {
        Stage::new(StageId(id), "mc", weight, default)
    }

    #[test]
    fn linear_chain_sums_weights() {
        let stages = vec![
            stage(1, 10, Transition::to_stage(StageId(2))),
            stage(2, 20, Transition::to_stage(StageId(3))),
            stage(3, 5, Transition::end()),
        ];
        let weights = SuffixWeights::generate(&stages);
        assert_eq!(weights.get(StageId(1)), Some(35));
        assert_eq!(weights.get(StageId(2)), Some(25));
        assert_eq!(weights.get(StageId(3)), Some(5));
    }

    #[test]
    fn branching_keeps_heaviest_path() {
        let mut start = stage(1, 10, Transition::to_stage(StageId(2)));
        start
            .stage_transitions
            .push(Transition::to_stage(StageId(3)).when("[var=hard]"));
        let stages = vec![
            start,
            stage(2, 5, Transition::end()),
            stage(3, 40, Transition::end()),
        ];
        let weights = SuffixWeights::generate(&stages);
        assert_eq!(weights.get(StageId(1)), Some(50));
    }

    #[test]
    fn cycles_terminate() {
        let mut second = stage(2, 10, Transition::to_stage(StageId(1)));
        second
            .stage_transitions
            .push(Transition::end().when("[var=done]"));
        let stages = vec![stage(1, 10, Transition::to_stage(StageId(2))), second];
        let weights = SuffixWeights::generate(&stages);
        assert_eq!(weights.get(StageId(2)), Some(10));
        assert_eq!(weights.get(StageId(1)), Some(20));
    }

    #[test]
    fn unreachable_end_has_no_entry() {
        let stages = vec![
            stage(1, 10, Transition::repeat()),
            stage(2, 10, Transition::end()),
        ];
        let weights = SuffixWeights::generate(&stages);
        assert_eq!(weights.get(StageId(1)), None);
        assert_eq!(weights.get(StageId(2)), Some(10));
    }

    #[test]
    fn skip_transitions_count_as_edges() {
        let mut first = stage(1, 10, Transition::end());
        first.skip_transitions.push(Transition::to_stage(StageId(2)));
        let stages = vec![first, stage(2, 30, Transition::end())];
        let weights = SuffixWeights::generate(&stages);
        assert_eq!(weights.get(StageId(1)), Some(40));
    }
}
