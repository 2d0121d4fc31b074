//! Greedy removal of overlapping entities.
//!
//! Entities are sorted by start, then scanned once. Each candidate is only
//! compared with the last kept entity; on overlap the longer text wins and
//! ties keep the entity already in place. An entity dropped by a replacement
//! is never reconsidered, even when it no longer overlaps anything kept.

use jurisnorm_core::Entity;

/// Whether the `[start, start + text length)` spans of `a` and `b` overlap.
pub fn are_overlapping(a: &Entity, b: &Entity) -> bool {
    let (start_a, end_a) = (a.start, a.span_end());
    let (start_b, end_b) = (b.start, b.span_end());
    (start_a < start_b && end_a > start_b)
        || (start_a <= start_b && end_a >= end_b)
        || (start_b < start_a && end_b > start_a)
        || (start_b <= start_a && end_b >= end_a)
}

pub fn remove_overlaps(mut entities: Vec<Entity>) -> Vec<Entity> {
    entities.sort_by_key(|e| e.start);

    let mut kept: Vec<Entity> = Vec::with_capacity(entities.len());
    for candidate in entities {
        match kept.last_mut() {
            Some(last) if are_overlapping(last, &candidate) => {
                if last.text_len() < candidate.text_len() {
                    *last = candidate;
                }
            }
            _ => kept.push(candidate),
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use jurisnorm_core::Category;

    fn entity(start: usize, len: usize) -> Entity {
        Entity {
            entity_id: format!("e{start}"),
            category: Category::NaturalPerson,
            start,
            end: start + len,
            text: "x".repeat(len),
            score: 0.9,
            source: "NER".into(),
        }
    }

    fn spans(entities: &[Entity]) -> Vec<(usize, usize)> {
        entities.iter().map(|e| (e.start, e.span_end())).collect()
    }

    #[test]
    fn contained_entity_dropped() {
        let kept = remove_overlaps(vec![entity(5, 3), entity(0, 10)]);
        assert_eq!(spans(&kept), [(0, 10)]);
    }

    #[test]
    fn longer_candidate_replaces_last() {
        let kept = remove_overlaps(vec![entity(0, 4), entity(2, 8)]);
        assert_eq!(spans(&kept), [(2, 10)]);
    }

    #[test]
    fn equal_length_keeps_first() {
        let kept = remove_overlaps(vec![entity(0, 4), entity(2, 4)]);
        assert_eq!(spans(&kept), [(0, 4)]);
    }

    #[test]
    fn adjacent_entities_both_kept() {
        let kept = remove_overlaps(vec![entity(4, 4), entity(0, 4)]);
        assert_eq!(spans(&kept), [(0, 4), (4, 8)]);
    }

    #[test]
    fn chained_replacements() {
        let kept = remove_overlaps(vec![entity(0, 10), entity(5, 20), entity(12, 2)]);
        assert_eq!(spans(&kept), [(5, 25)]);
    }

    #[test]
    fn replaced_entity_is_not_restored() {
        // [0,6) loses to [5,12), which loses to [11,20). [0,6) and [11,20)
        // are disjoint, yet only the last survives.
        let kept = remove_overlaps(vec![entity(0, 6), entity(5, 7), entity(11, 9)]);
        assert_eq!(spans(&kept), [(11, 20)]);
    }

    #[test]
    fn idempotent() {
        let input = vec![
            entity(30, 2),
            entity(0, 10),
            entity(5, 3),
            entity(9, 6),
            entity(20, 5),
            entity(22, 1),
        ];
        let once = remove_overlaps(input);
        let twice = remove_overlaps(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_input() {
        assert!(remove_overlaps(Vec::new()).is_empty());
    }

    #[test]
    fn span_uses_text_length_in_chars() {
        let mut a = entity(0, 3);
        a.text = "été".into();
        a.end = 99;
        let b = entity(3, 2);
        assert!(!are_overlapping(&a, &b));
    }
}
