//! Shuffle for automatic queue population
//!
//! Uniform Fisher-Yates over the view, with the current track left out.

use cadence_core::TrackRef;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

/// Random permutation of `view` without any track in `exclude`
///
/// Duplicate references in the view collapse to one entry.
pub fn shuffled_excluding<R: Rng + ?Sized>(
    view: &[TrackRef],
    exclude: &HashSet<&TrackRef>,
    rng: &mut R,
) -> Vec<TrackRef> {
    let mut seen = HashSet::with_capacity(view.len());
    let mut candidates: Vec<TrackRef> = view
        .iter()
        .filter(|track| !exclude.contains(track) && seen.insert(*track))
        .cloned()
        .collect();
    candidates.shuffle(rng);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{thread_rng, SeedableRng};

    fn view(count: usize) -> Vec<TrackRef> {
        (0..count)
            .map(|i| TrackRef::new(format!("/music/{:02}.flac", i)))
            .collect()
    }

    #[test]
    fn shuffle_keeps_every_track() {
        let original = view(20);
        let mut shuffled = shuffled_excluding(&original, &HashSet::new(), &mut thread_rng());
        shuffled.sort();
        assert_eq!(shuffled, original);
    }

    #[test]
    fn excluded_track_never_appears() {
        let tracks = view(10);
        let current = tracks[3].clone();
        let exclude: HashSet<&TrackRef> = [&current].into_iter().collect();

        let shuffled = shuffled_excluding(&tracks, &exclude, &mut StdRng::seed_from_u64(7));

        assert_eq!(shuffled.len(), 9);
        assert!(!shuffled.contains(&current));
    }

    #[test]
    fn same_seed_same_order() {
        let tracks = view(15);
        let exclude = HashSet::new();
        let a = shuffled_excluding(&tracks, &exclude, &mut StdRng::seed_from_u64(42));
        let b = shuffled_excluding(&tracks, &exclude, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn duplicates_collapse() {
        let mut tracks = view(3);
        tracks.push(tracks[0].clone());
        let shuffled = shuffled_excluding(&tracks, &HashSet::new(), &mut thread_rng());
        assert_eq!(shuffled.len(), 3);
    }

    #[test]
    fn empty_view() {
        let shuffled = shuffled_excluding(&[], &HashSet::new(), &mut thread_rng());
        assert!(shuffled.is_empty());
    }
}
