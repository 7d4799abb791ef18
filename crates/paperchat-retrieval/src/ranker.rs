//! Cosine-similarity ranking of embedded chunks against a query vector.

use paperchat_schema::{EmbeddedChunk, RankedChunk};

/// How many chunks survive ranking by default.
pub const DEFAULT_TOP_K: usize = 5;

/// Cosine similarity of two vectors: dot(a,b) / (‖a‖·‖b‖), in [-1, 1].
///
/// Mismatched lengths are a programming error, not a runtime condition:
/// every vector in a ranking pass comes from the same embedding model.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(
        a.len(),
        b.len(),
        "embedding dimension mismatch: {} vs {}",
        a.len(),
        b.len()
    );

    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Score every chunk against the query and return the `top_k` best,
/// descending by score. The sort is stable, so ties keep insertion order.
pub fn rank(query: &[f32], chunks: Vec<EmbeddedChunk>, top_k: usize) -> Vec<RankedChunk> {
    let mut ranked: Vec<RankedChunk> = chunks
        .into_iter()
        .map(|chunk| {
            let score = cosine_similarity(query, &chunk.vector);
            RankedChunk {
                source_file: chunk.source_file,
                text: chunk.text,
                score,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(top_k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(name: &str, text: &str, vector: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            source_file: name.to_string(),
            text: text.to_string(),
            vector,
        }
    }

    #[test]
    fn cosine_of_vector_with_itself_is_one() {
        let v = vec![1.0_f32, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        let a = vec![1.0_f32, 0.0];
        let b = vec![0.0_f32, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_opposite_vectors_is_negative_one() {
        let a = vec![1.0_f32, 1.0];
        let b = vec![-1.0_f32, -1.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_scores_zero() {
        let a = vec![0.0_f32, 0.0];
        let b = vec![1.0_f32, 2.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    #[should_panic(expected = "embedding dimension mismatch")]
    fn mismatched_dimensions_fail_fast() {
        cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn rank_sorts_descending_by_score() {
        let query = vec![1.0_f32, 0.0];
        let chunks = vec![
            chunk("a.txt", "far", vec![0.0, 1.0]),
            chunk("b.txt", "near", vec![1.0, 0.0]),
            chunk("c.txt", "mid", vec![1.0, 1.0]),
        ];
        let ranked = rank(&query, chunks, DEFAULT_TOP_K);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].text, "near");
        assert_eq!(ranked[1].text, "mid");
        assert_eq!(ranked[2].text, "far");
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn rank_keeps_insertion_order_on_ties() {
        let query = vec![1.0_f32, 0.0];
        let chunks = vec![
            chunk("first.txt", "first", vec![2.0, 0.0]),
            chunk("second.txt", "second", vec![3.0, 0.0]),
            chunk("third.txt", "third", vec![0.5, 0.0]),
        ];
        // All three score exactly 1.0.
        let ranked = rank(&query, chunks, DEFAULT_TOP_K);
        assert_eq!(ranked[0].text, "first");
        assert_eq!(ranked[1].text, "second");
        assert_eq!(ranked[2].text, "third");
    }

    #[test]
    fn rank_truncates_to_top_k() {
        let query = vec![1.0_f32];
        let chunks: Vec<EmbeddedChunk> = (0..8)
            .map(|i| chunk("f.txt", &format!("c{i}"), vec![(i + 1) as f32]))
            .collect();
        let ranked = rank(&query, chunks, 5);
        assert_eq!(ranked.len(), 5);
    }

    #[test]
    fn rank_returns_everything_when_fewer_than_k() {
        let query = vec![1.0_f32];
        let chunks = vec![chunk("f.txt", "only", vec![1.0])];
        assert_eq!(rank(&query, chunks, 5).len(), 1);
    }

    #[test]
    fn rank_of_nothing_is_empty() {
        let query = vec![1.0_f32, 0.0];
        assert!(rank(&query, Vec::new(), 5).is_empty());
    }

    #[test]
    fn rank_is_a_subsequence_of_the_input() {
        let query = vec![1.0_f32, 0.0];
        let texts = ["u", "v", "w", "x"];
        let chunks: Vec<EmbeddedChunk> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| chunk("f.txt", t, vec![1.0, i as f32]))
            .collect();
        let ranked = rank(&query, chunks, 5);
        for item in &ranked {
            assert!(texts.contains(&item.text.as_str()), "fabricated entry");
        }
    }
}
