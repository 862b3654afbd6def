use image::DynamicImage;
use log::warn;

use crate::error::AutomationError;
use crate::models::SwipeOutcome;
use crate::references::ReferenceImage;

use super::scorer::SimilarityScorer;

/// Outcome of comparing one candidate screenshot against a reference set.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchDecision {
    pub best_reference_id: String,
    pub similarity: f64,
    pub outcome: SwipeOutcome,
}

/// Score the candidate against every reference, pick the best match, and
/// map it to a swipe under `threshold`.
///
/// Pure over its inputs apart from the scorer calls. A scorer failure on
/// one pair skips that pair; the reference set's stable order breaks ties
/// (first encountered wins), so the result is deterministic.
pub fn decide(
    candidate: &DynamicImage,
    references: &[ReferenceImage],
    threshold: f64,
    scorer: &dyn SimilarityScorer,
) -> Result<MatchDecision, AutomationError> {
    if references.is_empty() {
        return Err(AutomationError::configuration(
            "cannot decide without reference images",
        ));
    }

    let mut best: Option<(&ReferenceImage, f64)> = None;
    let mut failures = 0usize;

    for reference in references {
        let similarity = match scorer.score(candidate, &reference.image) {
            Ok(score) => score.clamp(0.0, 1.0),
            Err(err) => {
                warn!("scoring against reference {} failed: {err:#}", reference.id);
                failures += 1;
                continue;
            }
        };

        match best {
            Some((_, best_score)) if similarity <= best_score => {}
            _ => best = Some((reference, similarity)),
        }
    }

    let Some((reference, similarity)) = best else {
        return Err(AutomationError::scoring_unavailable(format!(
            "all {failures} reference comparisons failed"
        )));
    };

    let outcome = if similarity >= threshold {
        SwipeOutcome::Like
    } else {
        SwipeOutcome::Pass
    };

    Ok(MatchDecision {
        best_reference_id: reference.id.clone(),
        similarity,
        outcome,
    })
}
