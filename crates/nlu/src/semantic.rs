//! The semantic-vector NLU stage (§4.5.3): cosine similarity between an
//! utterance embedding and per-intent centroids built from each method's
//! phrases and examples.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use va_domain::error::Result;
use va_donations::MethodDonation;
use va_providers::VectorizerProvider;

/// Default acceptance threshold for this stage (§4.5.3). The cascade
/// orchestrator may override this per donation via `per_plugin_threshold`.
pub const DEFAULT_SEMANTIC_THRESHOLD: f32 = 0.55;

const CACHE_MAX_ENTRIES: usize = 10_000;

struct CachedEmbedding {
    embedding: Vec<f32>,
    expires_at: Instant,
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` if either vector is zero or
/// the dimensions mismatch.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

/// Element-wise average of a set of vectors; empty if `vectors` is empty.
pub fn compute_centroid(vectors: &[Vec<f32>]) -> Vec<f32> {
    if vectors.is_empty() {
        return Vec::new();
    }
    let dim = vectors[0].len();
    let mut centroid = vec![0.0f32; dim];
    for v in vectors {
        for (acc, val) in centroid.iter_mut().zip(v.iter()) {
            *acc += val;
        }
    }
    for val in &mut centroid {
        *val /= vectors.len() as f32;
    }
    centroid
}

pub fn build_centroids(embeddings: &HashMap<String, Vec<Vec<f32>>>) -> HashMap<String, Vec<f32>> {
    embeddings
        .iter()
        .map(|(intent, vecs)| (intent.clone(), compute_centroid(vecs)))
        .collect()
}

/// Score `embedding` against every centroid, returning the best-matching
/// intent name and the full score table. `None` if `centroids` is empty.
pub fn classify_against_centroids(
    embedding: &[f32],
    centroids: &HashMap<String, Vec<f32>>,
) -> Option<(String, f32, HashMap<String, f32>)> {
    let mut scores = HashMap::with_capacity(centroids.len());
    let mut best: Option<(String, f32)> = None;
    for (intent, centroid) in centroids {
        let score = cosine_similarity(embedding, centroid);
        scores.insert(intent.clone(), score);
        if best.as_ref().map(|(_, s)| score > *s).unwrap_or(true) {
            best = Some((intent.clone(), score));
        }
    }
    best.map(|(intent, score)| (intent, score, scores))
}

fn hash_text(text: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub full_intent_name: String,
    pub confidence: f32,
}

pub struct SemanticMatcher {
    centroids: HashMap<String, Vec<f32>>,
    cache: RwLock<HashMap<u64, CachedEmbedding>>,
    cache_ttl: Duration,
}

impl SemanticMatcher {
    /// Embed every method's phrases and example texts and build one
    /// centroid per intent. A method with no phrases or examples gets no
    /// centroid and can never be reached by this stage.
    pub async fn build(
        methods: &[MethodDonation],
        vectorizer: &dyn VectorizerProvider,
        cache_ttl: Duration,
    ) -> Result<Self> {
        let mut tier_embeddings: HashMap<String, Vec<Vec<f32>>> = HashMap::new();
        for method in methods {
            let mut texts: Vec<String> = method.phrases.clone();
            texts.extend(method.examples.iter().map(|e| e.text.clone()));
            if texts.is_empty() {
                continue;
            }
            let vectors = vectorizer.embed(&texts).await?;
            tier_embeddings.insert(method.full_intent_name.clone(), vectors);
        }
        Ok(Self {
            centroids: build_centroids(&tier_embeddings),
            cache: RwLock::new(HashMap::new()),
            cache_ttl,
        })
    }

    fn get_cached(&self, key: u64) -> Option<Vec<f32>> {
        let cache = self.cache.read();
        cache.get(&key).and_then(|entry| {
            if Instant::now() < entry.expires_at {
                Some(entry.embedding.clone())
            } else {
                None
            }
        })
    }

    fn put_cached(&self, key: u64, embedding: &[f32]) {
        let mut cache = self.cache.write();
        if cache.len() >= CACHE_MAX_ENTRIES {
            let now = Instant::now();
            cache.retain(|_, v| v.expires_at > now);
        }
        cache.insert(
            key,
            CachedEmbedding {
                embedding: embedding.to_vec(),
                expires_at: Instant::now() + self.cache_ttl,
            },
        );
    }

    /// Best-matching intent above `threshold`, or `None` if no centroid
    /// clears it (or none were built at all).
    pub async fn best_match(
        &self,
        text: &str,
        vectorizer: &dyn VectorizerProvider,
        threshold: f32,
    ) -> Result<Option<SemanticHit>> {
        if self.centroids.is_empty() {
            return Ok(None);
        }

        let key = hash_text(text);
        let embedding = match self.get_cached(key) {
            Some(e) => e,
            None => {
                let mut vectors = vectorizer.embed(&[text.to_owned()]).await?;
                let embedding = vectors.pop().unwrap_or_default();
                self.put_cached(key, &embedding);
                embedding
            }
        };

        Ok(classify_against_centroids(&embedding, &self.centroids).and_then(
            |(intent, score, _scores)| {
                if score >= threshold {
                    Some(SemanticHit {
                        full_intent_name: intent,
                        confidence: score,
                    })
                } else {
                    None
                }
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedVectorizer;
    #[async_trait]
    impl VectorizerProvider for FixedVectorizer {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| if t.contains("timer") { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
                .collect())
        }
        fn provider_id(&self) -> &str {
            "fixed"
        }
    }

    #[test]
    fn cosine_similarity_identical_vectors() {
        let sim = cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn compute_centroid_averages() {
        let centroid = compute_centroid(&[vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert!((centroid[0] - 0.5).abs() < 1e-6);
        assert!((centroid[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn classify_empty_centroids_is_none() {
        assert!(classify_against_centroids(&[1.0, 0.0], &HashMap::new()).is_none());
    }

    #[tokio::test]
    async fn best_match_picks_nearest_centroid_above_threshold() {
        let method = MethodDonation {
            method_name: "set_timer".to_owned(),
            intent_suffix: "set".to_owned(),
            phrases: vec!["set a timer".to_owned()],
            lemmas: vec![],
            parameters: vec![],
            token_patterns: vec![],
            slot_patterns: Default::default(),
            examples: vec![],
            boost: 1.0,
            full_intent_name: "timers.set".to_owned(),
            handler_domain: "timers".to_owned(),
        };
        let vectorizer = FixedVectorizer;
        let matcher = SemanticMatcher::build(&[method], &vectorizer, Duration::from_secs(60))
            .await
            .unwrap();
        let hit = matcher
            .best_match("please start the timer", &vectorizer, 0.5)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.full_intent_name, "timers.set");
    }

    #[tokio::test]
    async fn best_match_rejects_below_threshold() {
        let method = MethodDonation {
            method_name: "set_timer".to_owned(),
            intent_suffix: "set".to_owned(),
            phrases: vec!["set a timer".to_owned()],
            lemmas: vec![],
            parameters: vec![],
            token_patterns: vec![],
            slot_patterns: Default::default(),
            examples: vec![],
            boost: 1.0,
            full_intent_name: "timers.set".to_owned(),
            handler_domain: "timers".to_owned(),
        };
        let vectorizer = FixedVectorizer;
        let matcher = SemanticMatcher::build(&[method], &vectorizer, Duration::from_secs(60))
            .await
            .unwrap();
        let hit = matcher
            .best_match("what's the weather", &vectorizer, 0.99)
            .await
            .unwrap();
        assert!(hit.is_none());
    }
}
