// Sentence embeddings for semantic topic matching (all-MiniLM-L6-v2).
//
// Keyword regexes miss paraphrases: "pan-genome analysis" never contains the
// configured topic "pangenome". Embedding topics and paper text into the same
// 384-dimensional space and comparing by cosine similarity catches these.
//
// The model runs locally via ONNX. Mean pooling over token embeddings,
// weighted by the attention mask, matches how the model was trained.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::debug;

/// Embedding dimension for all-MiniLM-L6-v2.
pub const EMBEDDING_DIM: usize = 384;

/// Longest input the model was trained on. Abstracts routinely exceed this,
/// so the tokenizer truncates instead of letting inference fail.
pub const MAX_SEQUENCE_LENGTH: usize = 256;

/// Anything that maps text to dense vectors in a shared space.
///
/// Implementations must be deterministic: the same model and input always
/// produce the same vector.
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per text in input order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>>;

    /// Embed a single text.
    fn embed_one(&self, text: &str) -> Result<Vec<f64>> {
        self.embed(&[text.to_string()])?
            .pop()
            .context("Embedder returned no vector")
    }
}

/// Stand-in used when no topics are configured, so no model is loaded.
/// Errors if actually called rather than producing fake vectors.
pub struct NoEmbedder;

impl Embedder for NoEmbedder {
    fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f64>>> {
        anyhow::bail!("No embedding model loaded (no topics configured)")
    }
}

/// Sentence embedder using a local ONNX model.
pub struct SentenceEmbedder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

impl SentenceEmbedder {
    /// Load the sentence embedding model and tokenizer from the given directory.
    ///
    /// Expects `model.onnx` and `tokenizer.json` in the directory.
    /// Run `paperwatch download-model` first if they don't exist.
    pub fn load(model_dir: &Path) -> Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            anyhow::bail!(
                "Embedding model not found: {}\nRun `paperwatch download-model` to download it.",
                model_path.display()
            );
        }
        if !tokenizer_path.exists() {
            anyhow::bail!(
                "Embedding tokenizer not found: {}\nRun `paperwatch download-model` to download it.",
                tokenizer_path.display()
            );
        }

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(&model_path)
            .with_context(|| {
                format!(
                    "Failed to load embedding model from {}",
                    model_path.display()
                )
            })?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load embedding tokenizer: {}", e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Failed to configure tokenizer truncation: {}", e))?;

        debug!(
            "Loaded sentence embedding model from {}",
            model_dir.display()
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }
}

impl Embedder for SentenceEmbedder {
    /// Tokenize, run the BERT model, and mean-pool each text into one vector.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        embed_sync(&self.session, &self.tokenizer, texts)
    }
}

/// Tokenization, inference, and mean pooling for one batch.
fn embed_sync(
    session: &Mutex<Session>,
    tokenizer: &Tokenizer,
    texts: &[String],
) -> Result<Vec<Vec<f64>>> {
    let encodings: Vec<_> = texts
        .iter()
        .map(|t| {
            tokenizer
                .encode(t.as_str(), true)
                .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))
        })
        .collect::<Result<Vec<_>>>()?;

    let batch_size = encodings.len();
    let max_len = encodings
        .iter()
        .map(|e| e.get_ids().len())
        .max()
        .unwrap_or(0);

    if max_len == 0 {
        return Ok(vec![vec![0.0; EMBEDDING_DIM]; batch_size]);
    }

    // BERT inputs, padded to the longest sequence in the batch:
    //   input_ids: token IDs (pad with 0)
    //   attention_mask: 1 for real tokens, 0 for padding
    //   token_type_ids: all zeros for single-sentence input
    let mut input_ids_flat: Vec<i64> = Vec::with_capacity(batch_size * max_len);
    let mut attention_mask_flat: Vec<i64> = Vec::with_capacity(batch_size * max_len);
    let mut token_type_ids_flat: Vec<i64> = Vec::with_capacity(batch_size * max_len);

    for enc in &encodings {
        let ids = enc.get_ids();
        let mask = enc.get_attention_mask();
        let seq_len = ids.len();

        input_ids_flat.extend(ids.iter().map(|&id| id as i64));
        attention_mask_flat.extend(mask.iter().map(|&m| m as i64));
        token_type_ids_flat.extend(std::iter::repeat_n(0i64, seq_len));

        let pad_len = max_len - seq_len;
        input_ids_flat.extend(std::iter::repeat_n(0i64, pad_len));
        attention_mask_flat.extend(std::iter::repeat_n(0i64, pad_len));
        token_type_ids_flat.extend(std::iter::repeat_n(0i64, pad_len));
    }

    let shape = [batch_size as i64, max_len as i64];

    let input_ids_tensor =
        Tensor::from_array((shape, input_ids_flat)).context("Failed to create input_ids tensor")?;
    let attention_mask_tensor = Tensor::from_array((shape, attention_mask_flat.clone()))
        .context("Failed to create attention_mask tensor")?;
    let token_type_ids_tensor = Tensor::from_array((shape, token_type_ids_flat))
        .context("Failed to create token_type_ids tensor")?;

    // Output is last_hidden_state: [batch, seq_len, 384]
    let hidden_states = {
        let mut session = session
            .lock()
            .map_err(|e| anyhow::anyhow!("Session lock poisoned: {}", e))?;

        let outputs = session
            .run(ort::inputs! {
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor
            })
            .context("Embedding ONNX inference failed")?;

        let (_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract embedding output tensor")?;

        data.to_vec()
    };

    let embeddings = mean_pool(&hidden_states, &attention_mask_flat, batch_size, max_len)?;

    debug!(
        batch_size = batch_size,
        dim = EMBEDDING_DIM,
        "Computed sentence embeddings"
    );

    Ok(embeddings)
}

/// Average each sequence's token vectors over its attention mask.
///
/// `hidden_states` is the flattened `[batch, max_len, EMBEDDING_DIM]`
/// output. A model with any other output shape is rejected.
fn mean_pool(
    hidden_states: &[f32],
    attention_mask: &[i64],
    batch_size: usize,
    max_len: usize,
) -> Result<Vec<Vec<f64>>> {
    let expected = batch_size * max_len * EMBEDDING_DIM;
    if hidden_states.len() != expected {
        anyhow::bail!(
            "Embedding output has {} values, expected {expected} \
             ({batch_size} x {max_len} x {EMBEDDING_DIM}); wrong model?",
            hidden_states.len()
        );
    }
    if attention_mask.len() != batch_size * max_len {
        anyhow::bail!(
            "Attention mask has {} values, expected {}",
            attention_mask.len(),
            batch_size * max_len
        );
    }

    let mut embeddings = Vec::with_capacity(batch_size);

    for i in 0..batch_size {
        let mut sum = vec![0.0_f64; EMBEDDING_DIM];
        let mut mask_sum = 0.0_f64;

        for j in 0..max_len {
            let mask_val = attention_mask[i * max_len + j] as f64;
            if mask_val > 0.0 {
                mask_sum += mask_val;
                let offset = (i * max_len + j) * EMBEDDING_DIM;
                let token = &hidden_states[offset..offset + EMBEDDING_DIM];
                for (slot, &h) in sum.iter_mut().zip(token) {
                    *slot += h as f64 * mask_val;
                }
            }
        }

        if mask_sum > 0.0 {
            for val in &mut sum {
                *val /= mask_sum;
            }
        }

        embeddings.push(sum);
    }

    Ok(embeddings)
}

/// Cosine similarity between two embedding vectors, clamped to 0.0..=1.0.
///
/// Opposed vectors score 0.0 rather than negative, so scores read directly
/// as "how close is this paper to the topic". Mismatched or empty vectors
/// and zero vectors also score 0.0.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    let denom = mag_a * mag_b;
    if denom < f64::EPSILON {
        0.0
    } else {
        (dot / denom).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let a = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&a, &a);
        assert!((sim - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-10);
    }

    #[test]
    fn test_cosine_ignores_magnitude() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![2.0, 4.0, 6.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_cosine_empty_and_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_cosine_mismatched_dimensions() {
        let sim = cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]);
        assert_eq!(sim, 0.0, "Mismatched dims should return 0.0");
    }

    #[test]
    fn test_cosine_opposite_clamps_to_zero() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[-1.0, 0.0, 0.0]);
        assert_eq!(sim, 0.0, "Opposite vectors should clamp to 0.0, got {sim}");
    }

    #[test]
    fn test_mean_pool_skips_padding() {
        // Two sequences, max_len 2; the second has one padding token.
        let mut hidden = vec![0.0_f32; 2 * 2 * EMBEDDING_DIM];
        hidden[0] = 1.0;
        hidden[EMBEDDING_DIM] = 3.0;
        hidden[2 * EMBEDDING_DIM] = 5.0;
        hidden[3 * EMBEDDING_DIM] = 100.0;
        let mask = [1, 1, 1, 0];

        let pooled = mean_pool(&hidden, &mask, 2, 2).unwrap();
        assert_eq!(pooled.len(), 2);
        assert_eq!(pooled[0][0], 2.0);
        assert_eq!(pooled[1][0], 5.0, "padding token must not count");
    }

    #[test]
    fn test_mean_pool_rejects_wrong_output_shape() {
        // A 768-dim model's output for one 2-token sequence.
        let hidden = vec![0.5_f32; 2 * 768];
        let err = mean_pool(&hidden, &[1, 1], 1, 2).unwrap_err();
        assert!(err.to_string().contains("has 1536 values"), "{err}");
    }

    #[test]
    fn test_cosine_is_symmetric() {
        let a = vec![1.0, 3.0, -2.0, 0.5];
        let b = vec![2.0, -1.0, 4.0, 0.0];
        assert!((cosine_similarity(&a, &b) - cosine_similarity(&b, &a)).abs() < 1e-10);
    }

    #[test]
    fn test_cosine_partial_overlap() {
        // 45 degrees apart
        let sim = cosine_similarity(&[1.0, 0.0], &[1.0, 1.0]);
        assert!((sim - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-10);
    }

    #[test]
    fn test_load_missing_model_fails_with_hint() {
        let dir = tempfile::tempdir().unwrap();
        let err = SentenceEmbedder::load(dir.path()).err().unwrap();
        assert!(err.to_string().contains("download-model"), "got: {err}");
    }

    struct Fixed;

    impl Embedder for Fixed {
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f64, 1.0]).collect())
        }
    }

    #[test]
    fn test_embed_one_uses_batch_path() {
        assert_eq!(Fixed.embed_one("abc").unwrap(), vec![3.0, 1.0]);
    }

    #[test]
    fn test_no_embedder_refuses() {
        assert!(NoEmbedder.embed(&["text".to_string()]).is_err());
    }
}
