use std::collections::BTreeSet;

use crate::reference::ReferenceIndex;
use crate::FaceVector;

/// What the faces of one photo matched.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    /// At least one face was detected.
    pub found: bool,
    /// Every label that some face matched above the threshold.
    pub matched_labels: BTreeSet<String>,
    /// Label of the single best face/reference pair, empty without faces.
    pub best_label: String,
    /// Score of that pair, `0.0` without faces.
    pub best_score: f32,
}

impl ClassificationResult {
    pub fn no_face() -> Self {
        Self {
            found: false,
            matched_labels: BTreeSet::new(),
            best_label: String::new(),
            best_score: 0.0,
        }
    }
}

/// Score every face against every reference.
///
/// Each face contributes all the labels it matches, so a group photo collects
/// one label per recognised person. The best pair is tracked across all
/// faces; on equal scores the earlier face, then the earlier reference, wins.
pub fn classify(
    faces: &[FaceVector],
    index: &ReferenceIndex,
    threshold: f32,
) -> ClassificationResult {
    if faces.is_empty() {
        return ClassificationResult::no_face();
    }

    let mut matched: BTreeSet<&str> = BTreeSet::new();
    let mut best: Option<(&str, f32)> = None;

    for face in faces {
        let (label, score) = index.best_match(face);
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((label, score));
        }
        matched.extend(index.matches_above_threshold(face, threshold));
    }

    let (best_label, best_score) = best.unwrap_or(("", 0.0));
    ClassificationResult {
        found: true,
        matched_labels: matched.into_iter().map(str::to_owned).collect(),
        best_label: best_label.to_owned(),
        best_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(values: &[f32]) -> FaceVector {
        FaceVector::new(values.to_vec()).normalized()
    }

    /// Unit vector in the plane spanned by `e0` and `axis` whose cosine with `e0` is `cos`.
    fn at(cos: f32, axis: usize, dim: usize) -> FaceVector {
        let mut values = vec![0.0; dim];
        values[0] = cos;
        values[axis] = (1.0 - cos * cos).sqrt();
        FaceVector::new(values)
    }

    fn index(entries: &[(&str, FaceVector)]) -> ReferenceIndex {
        let mut index = ReferenceIndex::new();
        for (label, vector) in entries {
            index.add_entry(label, vector.clone());
        }
        index
    }

    #[test]
    fn no_faces_means_not_found() {
        let idx = index(&[("alice", v(&[1.0, 0.0]))]);
        let result = classify(&[], &idx, 0.35);
        assert_eq!(result, ClassificationResult::no_face());
        assert!(!result.found);

        let result = classify(&[], &ReferenceIndex::new(), 0.35);
        assert!(!result.found);
    }

    #[test]
    fn two_faces_two_people() {
        // alice = A, bob = B, A ⟂ B
        let a = FaceVector::new(vec![1.0, 0.0, 0.0, 0.0]);
        let b = FaceVector::new(vec![0.0, 1.0, 0.0, 0.0]);
        // face1: cos(A) = 0.9, cos(B) = 0.1
        let face1 = FaceVector::new(vec![0.9, 0.1, (1.0f32 - 0.81 - 0.01).sqrt(), 0.0]);
        // face2: cos(B) = 0.5, cos(A) = 0
        let face2 = FaceVector::new(vec![0.0, 0.5, 0.0, 0.75f32.sqrt()]);
        let idx = index(&[("alice", a), ("bob", b)]);

        let result = classify(&[face1, face2], &idx, 0.35);
        assert!(result.found);
        assert_eq!(
            result.matched_labels.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["alice", "bob"]
        );
        assert_eq!(result.best_label, "alice");
        assert!((result.best_score - 0.9).abs() < 1e-5);
    }

    #[test]
    fn below_threshold_keeps_diagnostics() {
        let idx = index(&[("carol", at(1.0, 1, 3)), ("dave", at(1.0, 1, 3))]);
        let face = at(0.2, 2, 3);
        let result = classify(&[face], &idx, 0.35);

        assert!(result.found);
        assert!(result.matched_labels.is_empty());
        assert_eq!(result.best_label, "carol");
        assert!((result.best_score - 0.2).abs() < 1e-5);
    }

    #[test]
    fn best_is_global_across_faces() {
        let idx = index(&[("alice", v(&[1.0, 0.0])), ("bob", v(&[0.0, 1.0]))]);
        let weak = v(&[0.6, 0.8]);
        let strong = v(&[0.0, 1.0]);
        let result = classify(&[weak, strong], &idx, 0.35);
        assert_eq!(result.best_label, "bob");
        assert!((result.best_score - 1.0).abs() < 1e-6);
        assert_eq!(result.matched_labels.len(), 2);
    }

    #[test]
    fn earlier_face_wins_tie_between_faces() {
        let idx = index(&[("alice", v(&[1.0, 0.0])), ("bob", v(&[0.0, 1.0]))]);
        // both faces score exactly 1.0, against different people
        let result = classify(&[v(&[0.0, 1.0]), v(&[1.0, 0.0])], &idx, 0.35);
        assert_eq!(result.best_label, "bob");
        assert_eq!(result.best_score, 1.0);

        let result = classify(&[v(&[1.0, 0.0]), v(&[0.0, 1.0])], &idx, 0.35);
        assert_eq!(result.best_label, "alice");
    }

    #[test]
    fn same_person_twice_is_one_label() {
        let idx = index(&[("alice", v(&[1.0, 0.0]))]);
        let result = classify(&[v(&[1.0, 0.1]), v(&[0.9, 0.2])], &idx, 0.35);
        assert_eq!(result.matched_labels.len(), 1);
    }

    #[test]
    fn deterministic() {
        let idx = index(&[("alice", v(&[1.0, 0.2])), ("bob", v(&[0.3, 1.0]))]);
        let faces = [v(&[0.7, 0.7]), v(&[0.1, 0.9])];
        assert_eq!(classify(&faces, &idx, 0.35), classify(&faces, &idx, 0.35));
    }
}
