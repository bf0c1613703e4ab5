use crate::recognition::domain::embedding::FaceEmbedding;
use crate::recognition::domain::gallery::ProfileGallery;

/// Outcome of matching a query against the gallery.
///
/// `NoFaceDetected` and `NoMatch` are expected negative outcomes, not
/// errors; `GalleryEmpty` is surfaced distinctly so callers can report a
/// misconfigured profile store.
#[derive(Clone, Debug, PartialEq)]
pub enum MatchResult {
    Match { label: String, confidence: f64 },
    NoMatch,
    NoFaceDetected,
    GalleryEmpty,
}

/// Match one embedding against the gallery.
///
/// Nearest neighbor by Euclidean distance with a stable argmin: when two
/// entries are equidistant, the one earliest in gallery order wins.
/// Confidence is `1 − distance`, clamped at 0. A match requires the
/// distance to be strictly below `threshold`.
pub fn match_embedding(
    query: &FaceEmbedding,
    gallery: &ProfileGallery,
    threshold: f64,
) -> MatchResult {
    let mut best: Option<(usize, f64)> = None;
    for (index, entry) in gallery.entries().iter().enumerate() {
        let distance = query.euclidean_distance(&entry.embedding);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((index, distance)),
        }
    }

    let Some((index, distance)) = best else {
        return MatchResult::GalleryEmpty;
    };

    if distance < threshold {
        MatchResult::Match {
            label: gallery.entries()[index].label.clone(),
            confidence: (1.0 - distance).max(0.0),
        }
    } else {
        MatchResult::NoMatch
    }
}

/// Caller-level policy for images with several detected faces: match each
/// embedding independently and keep the highest-confidence match.
///
/// An empty query set means no face was detected upstream.
pub fn best_match(
    queries: &[FaceEmbedding],
    gallery: &ProfileGallery,
    threshold: f64,
) -> MatchResult {
    if queries.is_empty() {
        return MatchResult::NoFaceDetected;
    }
    if gallery.is_empty() {
        return MatchResult::GalleryEmpty;
    }

    let mut best: Option<MatchResult> = None;
    for query in queries {
        if let MatchResult::Match { label, confidence } = match_embedding(query, gallery, threshold)
        {
            let better = match &best {
                Some(MatchResult::Match {
                    confidence: best_confidence,
                    ..
                }) => confidence > *best_confidence,
                _ => true,
            };
            if better {
                best = Some(MatchResult::Match { label, confidence });
            }
        }
    }
    best.unwrap_or(MatchResult::NoMatch)
}
