// Embedding model download and location.
//
// all-MiniLM-L6-v2 is fetched once from HuggingFace (~90MB) into a
// platform-appropriate directory (~/.local/share/paperwatch/models/ on
// Linux) so it persists across runs.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::{Stream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// HuggingFace repo for the sentence embedding model.
const EMBEDDING_HF_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main";

/// Remote paths within the HuggingFace repo.
const REMOTE_MODEL_FILE: &str = "onnx/model.onnx";
const REMOTE_TOKENIZER_FILE: &str = "tokenizer.json";

/// Local file names inside the embedding model directory.
const MODEL_FILE: &str = "model.onnx";
const TOKENIZER_FILE: &str = "tokenizer.json";

/// Returns the default directory for storing model files.
pub fn default_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("paperwatch")
        .join("models")
}

/// Subdirectory within model_dir for the sentence embedding model.
pub fn embedding_model_dir(base: &Path) -> PathBuf {
    base.join("all-MiniLM-L6-v2")
}

/// Check whether both required embedding model files exist.
pub fn embedding_files_present(base: &Path) -> bool {
    let embed_dir = embedding_model_dir(base);
    embed_dir.join(MODEL_FILE).exists() && embed_dir.join(TOKENIZER_FILE).exists()
}

/// Download the embedding model and tokenizer, skipping files that already
/// exist. Creates directories as needed.
pub async fn download_model(base: &Path) -> Result<()> {
    let embed_dir = embedding_model_dir(base);
    std::fs::create_dir_all(&embed_dir).with_context(|| {
        format!(
            "Failed to create embedding model directory: {}",
            embed_dir.display()
        )
    })?;

    println!("\nSentence embedding model (all-MiniLM-L6-v2):");

    let tokenizer_path = embed_dir.join(TOKENIZER_FILE);
    if tokenizer_path.exists() {
        info!("Embedding tokenizer already exists, skipping");
        println!("  {TOKENIZER_FILE} (already exists)");
    } else {
        println!("  Downloading {TOKENIZER_FILE}...");
        download_file(
            &format!("{EMBEDDING_HF_URL}/{REMOTE_TOKENIZER_FILE}"),
            &tokenizer_path,
            false,
        )
        .await?;
    }

    let model_path = embed_dir.join(MODEL_FILE);
    if model_path.exists() {
        info!("Embedding model already exists, skipping");
        println!("  {MODEL_FILE} (already exists)");
    } else {
        println!("  Downloading {MODEL_FILE} (~90 MB)...");
        download_file(
            &format!("{EMBEDDING_HF_URL}/{REMOTE_MODEL_FILE}"),
            &model_path,
            true,
        )
        .await?;
    }

    Ok(())
}

/// Download a single file from a URL to a local path.
/// If `show_progress` is true, display a progress bar.
async fn download_file(url: &str, dest: &Path, show_progress: bool) -> Result<()> {
    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to download {url}"))?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status {}: {}", response.status(), url);
    }

    let total_size = response.content_length();

    let pb = if show_progress {
        let pb = match total_size {
            Some(size) => {
                let pb = ProgressBar::new(size);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("    [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                        .context("Invalid progress bar template")?
                        .progress_chars("=> "),
                );
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("    {spinner} {bytes}")
                        .context("Invalid progress bar template")?,
                );
                pb
            }
        };
        Some(pb)
    } else {
        None
    };

    let written = write_stream(response.bytes_stream(), dest, pb.as_ref()).await?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if let Some(expected) = total_size {
        if written != expected {
            let _ = std::fs::remove_file(dest);
            anyhow::bail!("Download of {url} was truncated: got {written} of {expected} bytes");
        }
    }

    info!("Downloaded {} to {}", url, dest.display());
    Ok(())
}

/// Write a byte stream to `dest`, advancing `pb` per chunk.
///
/// Chunks go to a sibling `.part` file that is renamed into place only once
/// the stream ends cleanly, so an interrupted download never leaves a
/// truncated model.onnx that looks present. Returns the bytes written.
async fn write_stream<S, B, E>(stream: S, dest: &Path, pb: Option<&ProgressBar>) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let partial = dest.with_extension("part");
    let mut file = File::create(&partial)
        .with_context(|| format!("Failed to create {}", partial.display()))?;
    let mut stream = std::pin::pin!(stream);
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                drop(file);
                let _ = std::fs::remove_file(&partial);
                return Err(e).context("Download interrupted");
            }
        };
        file.write_all(chunk.as_ref())
            .with_context(|| format!("Failed to write {}", partial.display()))?;
        written += chunk.as_ref().len() as u64;
        if let Some(pb) = pb {
            pb.set_position(written);
        }
    }

    file.flush()
        .with_context(|| format!("Failed to flush {}", partial.display()))?;
    drop(file);
    std::fs::rename(&partial, dest)
        .with_context(|| format!("Failed to move download into {}", dest.display()))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_dir_is_under_paperwatch() {
        let dir = default_model_dir();
        let path_str = dir.to_string_lossy();
        assert!(
            path_str.contains("paperwatch") && path_str.contains("models"),
            "Expected path containing paperwatch/models, got: {path_str}"
        );
    }

    #[test]
    fn test_embedding_model_dir_is_subdirectory() {
        let base = PathBuf::from("/tmp/test-models");
        assert_eq!(embedding_model_dir(&base), base.join("all-MiniLM-L6-v2"));
    }

    #[test]
    fn test_embedding_files_present_false_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!embedding_files_present(dir.path()));
    }

    #[test]
    fn test_embedding_files_present_requires_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let embed_dir = embedding_model_dir(dir.path());
        std::fs::create_dir_all(&embed_dir).unwrap();
        std::fs::write(embed_dir.join("model.onnx"), b"fake").unwrap();
        assert!(!embedding_files_present(dir.path()));

        std::fs::write(embed_dir.join("tokenizer.json"), b"fake").unwrap();
        assert!(embedding_files_present(dir.path()));
    }

    #[tokio::test]
    async fn test_write_stream_writes_chunks_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("model.onnx");
        let chunks: Vec<std::io::Result<Vec<u8>>> =
            vec![Ok(b"onnx".to_vec()), Ok(b"-weights".to_vec())];

        let pb = ProgressBar::hidden();
        let written = write_stream(futures::stream::iter(chunks), &dest, Some(&pb))
            .await
            .unwrap();

        assert_eq!(written, 12);
        assert_eq!(pb.position(), 12);
        assert_eq!(std::fs::read(&dest).unwrap(), b"onnx-weights");
        assert!(!dest.with_extension("part").exists());
    }

    #[tokio::test]
    async fn test_write_stream_failure_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("model.onnx");
        let chunks: Vec<std::io::Result<Vec<u8>>> = vec![
            Ok(b"partial".to_vec()),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];

        let err = write_stream(futures::stream::iter(chunks), &dest, None)
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("reset"));
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }
}
