use std::collections::BTreeSet;

use lostfound_types::models::MatchMethod;

use crate::config::SignalWeights;
use crate::features::FeatureVector;

/// Outcome of comparing two feature vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    /// Blended score in `[0, 1]`.
    pub score: f64,
    pub category_match: bool,
    pub color_match: bool,
    /// Which embeddings took part in the score.
    pub method: MatchMethod,
}

/// Weighted blend of independent signals, each in `[0, 1]`.
///
/// Category and color are always present. Location counts when both sides
/// name a place. Text and image only count when both sides carry a vector; when one is missing its weight is spread over
/// the remaining signals in proportion to their own weights, so a report
/// without a photo is never scored lower than one with.
#[derive(Debug, Clone)]
pub struct Scorer {
    weights: SignalWeights,
}

impl Scorer {
    pub fn new(weights: SignalWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, a: &FeatureVector, b: &FeatureVector) -> f64 {
        self.compare(a, b).score
    }

    pub fn compare(&self, a: &FeatureVector, b: &FeatureVector) -> Similarity {
        let category_match = a.category == b.category;
        let color_match = !a.colors.is_disjoint(&b.colors);

        let mut weighted = 0.0;
        let mut total = 0.0;
        let mut add = |weight: f64, value: f64| {
            weighted += weight * value;
            total += weight;
        };

        add(self.weights.category, indicator(category_match));
        add(self.weights.color, indicator(color_match));
        if let Some(overlap) = location_overlap(a.location.as_deref(), b.location.as_deref()) {
            add(self.weights.location, overlap);
        }
        let text = embedding_similarity(a.text.as_deref(), b.text.as_deref());
        if let Some(sim) = text {
            add(self.weights.text, sim);
        }
        let image = embedding_similarity(a.image.as_deref(), b.image.as_deref());
        if let Some(sim) = image {
            add(self.weights.image, sim);
        }

        let score = if total > 0.0 { (weighted / total).clamp(0.0, 1.0) } else { 0.0 };

        Similarity {
            score,
            category_match,
            color_match,
            method: MatchMethod::from_signals(text.is_some(), image.is_some()),
        }
    }
}

fn indicator(hit: bool) -> f64 {
    if hit { 1.0 } else { 0.0 }
}

/// Same place scores 1.0, one name inside the other 0.5, otherwise half
/// the word overlap. Inputs are already normalized.
fn location_overlap(a: Option<&str>, b: Option<&str>) -> Option<f64> {
    let (a, b) = (a?, b?);
    if a == b {
        return Some(1.0);
    }
    if a.contains(b) || b.contains(a) {
        return Some(0.5);
    }

    let words = |s: &str| -> BTreeSet<String> {
        s.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect()
    };
    let (wa, wb) = (words(a), words(b));
    let union = wa.union(&wb).count();
    if union == 0 {
        return Some(0.0);
    }
    Some(0.5 * wa.intersection(&wb).count() as f64 / union as f64)
}

/// Cosine similarity rescaled from `[-1, 1]` to `[0, 1]`. `None` when either
/// side is missing, lengths differ, or a vector has zero norm.
fn embedding_similarity(a: Option<&[f32]>, b: Option<&[f32]>) -> Option<f64> {
    let (a, b) = (a?, b?);
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a <= f64::EPSILON || norm_b <= f64::EPSILON {
        return None;
    }

    let cos = (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0);
    Some((cos + 1.0) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::color_tokens;

    fn features(category: &str, color: &str, text: Option<Vec<f32>>, image: Option<Vec<f32>>) -> FeatureVector {
        FeatureVector {
            category: category.to_string(),
            colors: color_tokens(color),
            location: None,
            text,
            image,
        }
    }

    fn at(mut f: FeatureVector, location: &str) -> FeatureVector {
        f.location = Some(location.to_string());
        f
    }

    fn scorer() -> Scorer {
        Scorer::new(SignalWeights::default())
    }

    #[test]
    fn self_comparison_with_all_signals_is_one() {
        let a = features("electronics", "black", Some(vec![0.6, 0.8, 0.0]), Some(vec![0.0, 0.28, 0.96]));
        let score = scorer().score(&a, &a);
        assert!((score - 1.0).abs() < 1e-9, "self score was {}", score);
    }

    #[test]
    fn score_is_symmetric() {
        let a = features("keys", "silver, red", Some(vec![1.0, 0.0, 0.0]), Some(vec![0.0, 1.0, 0.0]));
        let b = features("keys", "red", Some(vec![0.6, 0.8, 0.0]), None);
        let s = scorer();
        assert_eq!(s.compare(&a, &b), s.compare(&b, &a));
    }

    #[test]
    fn disjoint_categorical_only_pair_scores_zero() {
        let a = features("jewelry", "gold", None, None);
        let b = features("electronics", "black", None, None);
        let sim = scorer().compare(&a, &b);
        assert_eq!(sim.score, 0.0);
        assert!(!sim.category_match);
        assert!(!sim.color_match);
    }

    #[test]
    fn zero_vectors_are_absent_not_extreme() {
        let a = features("bags", "blue", Some(vec![0.0, 0.0]), None);
        let b = features("bags", "blue", Some(vec![0.0, 0.0]), None);
        // Only categorical signals count, and both agree.
        assert_eq!(scorer().score(&a, &b), 1.0);

        let c = features("bags", "red", Some(vec![0.0, 0.0]), None);
        let expected = 0.20 / 0.30;
        assert!((scorer().score(&a, &c) - expected).abs() < 1e-12);
    }

    #[test]
    fn missing_photo_on_one_side_equals_missing_on_both() {
        let text = Some(vec![0.6, 0.8]);
        let lost_with_photo = features("wallet", "brown", text.clone(), Some(vec![1.0, 0.0]));
        let lost_without = features("wallet", "brown", text.clone(), None);
        let found = features("wallet", "brown", Some(vec![0.8, 0.6]), None);

        let s = scorer();
        assert_eq!(s.score(&lost_with_photo, &found), s.score(&lost_without, &found));
    }

    #[test]
    fn absent_image_weight_is_redistributed() {
        let a = features("keys", "black", Some(vec![1.0, 0.0]), None);
        let b = features("keys", "white", Some(vec![0.0, 1.0]), None);
        // category 0.20*1 + color 0.10*0 + text 0.35*0.5, over 0.65
        let expected = (0.20 + 0.175) / 0.65;
        assert!((scorer().score(&a, &b) - expected).abs() < 1e-12);
    }

    #[test]
    fn opposite_embeddings_stay_in_range() {
        let a = features("keys", "black", Some(vec![1.0, 0.0]), Some(vec![1.0, 0.0]));
        let b = features("docs", "white", Some(vec![-1.0, 0.0]), Some(vec![-1.0, 0.0]));
        let score = scorer().score(&a, &b);
        assert!((0.0..=1.0).contains(&score));
        assert_eq!(score, 0.0);
    }

    #[test]
    fn mismatched_lengths_are_ignored() {
        let a = features("keys", "black", Some(vec![1.0, 0.0, 0.0]), None);
        let b = features("keys", "black", Some(vec![1.0, 0.0]), None);
        assert_eq!(scorer().score(&a, &b), 1.0);
    }

    #[test]
    fn location_overlap_grades_exact_contained_and_shared_words() {
        assert_eq!(location_overlap(Some("library"), Some("library")), Some(1.0));
        assert_eq!(location_overlap(Some("library"), Some("library 2nd floor")), Some(0.5));
        // {main, cafeteria} vs {cafeteria, patio}: one shared word of three
        let partial = location_overlap(Some("main cafeteria"), Some("cafeteria patio")).unwrap();
        assert!((partial - 0.5 / 3.0).abs() < 1e-12);
        assert_eq!(location_overlap(Some("gym"), Some("parking lot")), Some(0.0));
        assert_eq!(location_overlap(None, Some("gym")), None);
    }

    #[test]
    fn location_is_weighted_when_both_sides_have_one() {
        let a = at(features("keys", "black", None, None), "library");
        let same = at(features("keys", "black", None, None), "library");
        let elsewhere = at(features("keys", "black", None, None), "gym");
        let unknown = features("keys", "black", None, None);

        let s = scorer();
        assert_eq!(s.score(&a, &same), 1.0);
        // category 0.20 + color 0.10 + location 0, over 0.40
        assert!((s.score(&a, &elsewhere) - 0.75).abs() < 1e-12);
        // no location on one side: only category and color count
        assert_eq!(s.score(&a, &unknown), 1.0);
    }

    #[test]
    fn method_reflects_embeddings_used() {
        let s = scorer();
        let text_only = features("keys", "black", Some(vec![1.0, 0.0]), None);
        let both = features("keys", "black", Some(vec![1.0, 0.0]), Some(vec![0.0, 1.0]));
        let image_only = features("keys", "black", None, Some(vec![0.0, 1.0]));

        assert_eq!(s.compare(&both, &both).method, MatchMethod::Hybrid);
        assert_eq!(s.compare(&both, &text_only).method, MatchMethod::Text);
        assert_eq!(s.compare(&both, &image_only).method, MatchMethod::Visual);
        assert_eq!(s.compare(&image_only, &text_only).method, MatchMethod::Text);
    }

    #[test]
    fn category_with_one_cheap_attribute_stays_below_default_threshold() {
        let threshold = crate::config::MatchConfig::default().threshold;
        let s = scorer();
        // Orthogonal text: the text signal sits at 0.5.
        let a = at(features("wallet", "brown", Some(vec![1.0, 0.0]), None), "library");
        let same_place = at(features("wallet", "black", Some(vec![0.0, 1.0]), None), "library");
        let same_color = at(features("wallet", "brown", Some(vec![0.0, 1.0]), None), "gym");
        let category_only = at(features("wallet", "black", Some(vec![0.0, 1.0]), None), "gym");

        assert!(s.score(&a, &same_place) < threshold);
        assert!(s.score(&a, &same_color) < threshold);
        assert!(s.score(&a, &category_only) < threshold);
    }
}
