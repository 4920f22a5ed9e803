//! Maximum bipartite matching within one `(file, category)` group

use crate::models::NormalizedFinding;

/// Match LLM findings against static findings under the same-occurrence
/// relation.
///
/// Uses augmenting paths (Kuhn's algorithm), visiting LLM findings and their
/// candidates in input order, so the result is deterministic. Returns the
/// matched `(llm_index, static_index)` pairs sorted by LLM index.
pub fn max_matching(
    llm: &[&NormalizedFinding],
    statics: &[&NormalizedFinding],
) -> Vec<(usize, usize)> {
    let adjacency: Vec<Vec<usize>> = llm
        .iter()
        .map(|l| {
            statics
                .iter()
                .enumerate()
                .filter(|(_, s)| l.same_occurrence(s))
                .map(|(j, _)| j)
                .collect()
        })
        .collect();

    let mut owner: Vec<Option<usize>> = vec![None; statics.len()];
    for u in 0..llm.len() {
        let mut seen = vec![false; statics.len()];
        augment(u, &adjacency, &mut seen, &mut owner);
    }

    let mut pairs: Vec<(usize, usize)> = owner
        .iter()
        .enumerate()
        .filter_map(|(j, u)| u.map(|u| (u, j)))
        .collect();
    pairs.sort_unstable();
    pairs
}

fn augment(
    u: usize,
    adjacency: &[Vec<usize>],
    seen: &mut [bool],
    owner: &mut [Option<usize>],
) -> bool {
    for &v in &adjacency[u] {
        if seen[v] {
            continue;
        }
        seen[v] = true;
        let free = match owner[v] {
            None => true,
            Some(other) => augment(other, adjacency, seen, owner),
        };
        if free {
            owner[v] = Some(u);
            return true;
        }
    }
    false
}
