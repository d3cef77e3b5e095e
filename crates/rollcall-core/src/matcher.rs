//! Identity resolution by majority vote over nearby gallery samples.

use crate::gallery::Gallery;
use crate::types::{Embedding, Identity};

/// Maximum Euclidean distance at which a gallery sample counts as a match.
///
/// Tuned for L2-normalized ArcFace embeddings, where
/// `distance = sqrt(2 - 2 * cos)`: 1.1 accepts cosine similarity of about
/// 0.395 and up.
pub const DEFAULT_MATCH_TOLERANCE: f32 = 1.1;

/// Strategy for resolving a probe embedding to an identity.
pub trait Matcher {
    fn identify(&self, probe: &Embedding, gallery: &Gallery) -> Identity;
}

/// Counts matching gallery samples per name and picks the name with the most.
///
/// A sample matches when its distance to the probe is `<= tolerance`. Ties
/// go to the name whose first matching sample comes earliest in gallery
/// order. No matching sample yields [`Identity::Unknown`].
#[derive(Debug, Clone, Copy)]
pub struct VoteMatcher {
    tolerance: f32,
}

impl VoteMatcher {
    pub fn new(tolerance: f32) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }
}

impl Default for VoteMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_TOLERANCE)
    }
}

impl Matcher for VoteMatcher {
    fn identify(&self, probe: &Embedding, gallery: &Gallery) -> Identity {
        // Tally in order of first appearance so the tie-break is stable.
        let mut votes: Vec<(&str, usize)> = Vec::new();

        for entry in gallery.entries() {
            let Some(distance) = probe.euclidean_distance(&entry.embedding) else {
                continue;
            };
            if distance > self.tolerance {
                continue;
            }
            let name = entry.identity_name.as_str();
            match votes.iter_mut().find(|(n, _)| *n == name) {
                Some((_, count)) => *count += 1,
                None => votes.push((name, 1)),
            }
        }

        let mut best: Option<(&str, usize)> = None;
        for &(name, count) in &votes {
            if best.map_or(true, |(_, best_count)| count > best_count) {
                best = Some((name, count));
            }
        }

        match best {
            Some((name, count)) => {
                tracing::trace!(name, votes = count, "matched identity");
                Identity::Known(name.to_string())
            }
            None => Identity::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GalleryEntry;

    fn gallery(entries: &[(&str, [f32; 2])]) -> Gallery {
        Gallery::from_entries(
            entries
                .iter()
                .map(|(name, v)| GalleryEntry {
                    identity_name: name.to_string(),
                    embedding: Embedding::new(v.to_vec()),
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_single_match() {
        let g = gallery(&[("Alice", [0.0, 0.0]), ("Bob", [5.0, 5.0])]);
        let probe = Embedding::new(vec![0.1, 0.1]);
        assert_eq!(
            VoteMatcher::default().identify(&probe, &g),
            Identity::Known("Alice".into())
        );
    }

    #[test]
    fn test_no_match_is_unknown() {
        let g = gallery(&[("Alice", [0.0, 0.0]), ("Bob", [5.0, 5.0])]);
        let probe = Embedding::new(vec![2.5, 2.5]);
        assert_eq!(VoteMatcher::default().identify(&probe, &g), Identity::Unknown);
    }

    #[test]
    fn test_empty_gallery_is_unknown() {
        let probe = Embedding::new(vec![0.0, 0.0]);
        assert_eq!(
            VoteMatcher::default().identify(&probe, &Gallery::default()),
            Identity::Unknown
        );
    }

    #[test]
    fn test_majority_beats_nearest() {
        // Bob has the single closest sample, Alice has more samples in range.
        let g = gallery(&[
            ("Bob", [0.0, 0.0]),
            ("Alice", [0.5, 0.0]),
            ("Alice", [0.0, 0.5]),
        ]);
        let probe = Embedding::new(vec![0.05, 0.05]);
        assert_eq!(
            VoteMatcher::default().identify(&probe, &g),
            Identity::Known("Alice".into())
        );
    }

    #[test]
    fn test_tie_goes_to_first_in_gallery_order() {
        let g = gallery(&[
            ("Carol", [0.3, 0.0]),
            ("Dave", [-0.3, 0.0]),
            ("Dave", [0.0, 0.3]),
            ("Carol", [0.0, -0.3]),
        ]);
        let probe = Embedding::new(vec![0.0, 0.0]);
        for _ in 0..10 {
            assert_eq!(
                VoteMatcher::default().identify(&probe, &g),
                Identity::Known("Carol".into())
            );
        }

        let swapped = gallery(&[
            ("Dave", [-0.3, 0.0]),
            ("Carol", [0.3, 0.0]),
            ("Dave", [0.0, 0.3]),
            ("Carol", [0.0, -0.3]),
        ]);
        assert_eq!(
            VoteMatcher::default().identify(&probe, &swapped),
            Identity::Known("Dave".into())
        );
    }

    #[test]
    fn test_distance_equal_to_tolerance_matches() {
        let g = gallery(&[("Alice", [0.0, 0.0])]);
        let probe = Embedding::new(vec![0.5, 0.0]);
        assert_eq!(
            VoteMatcher::new(0.5).identify(&probe, &g),
            Identity::Known("Alice".into())
        );
        assert_eq!(VoteMatcher::new(0.49).identify(&probe, &g), Identity::Unknown);
    }

    /// Two unit vectors in 512-d with the given cosine similarity.
    fn unit_pair(cos: f32) -> (Embedding, Embedding) {
        let mut a = vec![0.0; 512];
        let mut b = vec![0.0; 512];
        a[0] = 1.0;
        b[0] = cos;
        b[1] = (1.0 - cos * cos).sqrt();
        (Embedding::new(a), Embedding::new(b))
    }

    #[test]
    fn test_default_tolerance_fits_arcface_similarity() {
        for (cos, expected) in [
            (0.8, true),
            (0.6, true),
            (0.45, true),
            (0.3, false),
            (0.0, false),
        ] {
            let (enrolled, probe) = unit_pair(cos);
            let g = Gallery::from_entries(vec![GalleryEntry {
                identity_name: "Alice".into(),
                embedding: enrolled,
            }])
            .unwrap();
            let identity = VoteMatcher::default().identify(&probe, &g);
            assert_eq!(identity.is_known(), expected, "cos = {cos}");
        }
    }

    #[test]
    fn test_dimension_mismatch_never_matches() {
        let g = gallery(&[("Alice", [0.0, 0.0])]);
        let probe = Embedding::new(vec![0.0, 0.0, 0.0]);
        assert_eq!(VoteMatcher::default().identify(&probe, &g), Identity::Unknown);
    }
}
