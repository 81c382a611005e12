//! Drop-off histogram reduction

use std::collections::HashMap;

/// Most frequent period and how many customers share it.
///
/// Ties go to the period encountered first.
pub fn most_common_period(periods: &[i64]) -> Option<(i64, usize)> {
    let mut counts: Vec<(i64, usize)> = Vec::new();
    let mut slots: HashMap<i64, usize> = HashMap::new();

    for &days in periods {
        match slots.get(&days) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                slots.insert(days, counts.len());
                counts.push((days, 1));
            }
        }
    }

    counts
        .into_iter()
        .fold(None, |best: Option<(i64, usize)>, candidate| match best {
            Some(current) if current.1 >= candidate.1 => Some(current),
            _ => Some(candidate),
        })
}
