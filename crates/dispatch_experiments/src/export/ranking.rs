use std::cmp::Ordering;

use crate::metrics::RunResult;

pub(crate) fn find_best_index(results: &[RunResult]) -> Option<usize> {
    let mut best: Option<(usize, &RunResult)> = None;
    for (idx, result) in results.iter().enumerate() {
        let better = match best {
            None => true,
            Some((_, current)) => {
                match result.agent_score.total_cmp(&current.agent_score) {
                    Ordering::Greater => true,
                    Ordering::Less => false,
                    Ordering::Equal => {
                        result.accuracy_overall.total_cmp(&current.accuracy_overall)
                            == Ordering::Greater
                    }
                }
            }
        };
        if better {
            best = Some((idx, result));
        }
    }
    best.map(|(idx, _)| idx)
}
