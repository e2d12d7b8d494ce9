//! Top-k selection over raw class scores.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::mapping::FontMapping;

/// One ranked guess. `confidence` is the raw model score, not a probability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FontPrediction {
    pub family: String,
    pub variant: String,
    pub confidence: f32,
}

/// The `min(k, scores.len())` best `(index, score)` pairs, highest first.
///
/// Equal scores keep ascending index order; NaN ranks below every number.
pub fn top_k(scores: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut indexed: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| descending(a.1, b.1));
    indexed.truncate(k);
    indexed
}

fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Rank the scores and attach the font each class index stands for.
pub fn rank_fonts(scores: &[f32], mapping: &FontMapping, k: usize) -> Vec<FontPrediction> {
    top_k(scores, k)
        .into_iter()
        .map(|(index, confidence)| {
            let font = mapping.lookup(index);
            FontPrediction {
                family: font.family,
                variant: font.variant,
                confidence,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::FontRecord;

    #[test]
    fn picks_highest_scores_in_order() {
        let scores = [0.1, 3.0, -1.0, 2.5, 7.0];
        assert_eq!(top_k(&scores, 3), vec![(4, 7.0), (1, 3.0), (3, 2.5)]);
    }

    #[test]
    fn returns_min_of_k_and_len() {
        let scores: Vec<f32> = (0..40).map(|i| ((i * 37) % 11) as f32).collect();
        let top = top_k(&scores, 15);
        assert_eq!(top.len(), 15);
        assert!(top.windows(2).all(|w| w[0].1 >= w[1].1));

        assert_eq!(top_k(&[1.0, 2.0], 15).len(), 2);
        assert!(top_k(&[], 15).is_empty());
    }

    #[test]
    fn ties_keep_index_order() {
        let scores = [1.0, 5.0, 1.0, 5.0, 1.0];
        let indices: Vec<usize> = top_k(&scores, 4).into_iter().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![1, 3, 0, 2]);
    }

    #[test]
    fn nan_ranks_last() {
        let scores = [f32::NAN, -10.0, f32::NAN, 0.0];
        let indices: Vec<usize> = top_k(&scores, 4).into_iter().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![3, 1, 0, 2]);
    }

    #[test]
    fn unknown_indices_map_to_fallback() {
        let mapping: FontMapping = [("2", FontRecord::new("Lato", "bold"))].into_iter().collect();
        let fonts = rank_fonts(&[0.5, 0.25, 9.0], &mapping, 15);
        assert_eq!(
            fonts,
            vec![
                FontPrediction {
                    family: "Lato".into(),
                    variant: "bold".into(),
                    confidence: 9.0,
                },
                FontPrediction {
                    family: "Unknown".into(),
                    variant: "regular".into(),
                    confidence: 0.5,
                },
                FontPrediction {
                    family: "Unknown".into(),
                    variant: "regular".into(),
                    confidence: 0.25,
                },
            ]
        );
    }
}
