//! Locating model weights on disk, fetching them into the cache when asked to.

use std::io::Write;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use crate::data::FsAccess;

/// Resolves `model` to an existing file.
///
/// An existing path is used as-is. Otherwise the file name is looked up in
/// `models_dir`, and when it is missing there and `url` is given the weights
/// are downloaded into `models_dir` first.
pub fn resolve_weights_in(model: &str, url: Option<&str>, models_dir: &Path) -> Result<PathBuf> {
    let direct = PathBuf::from(model);
    if direct.is_file() {
        return Ok(direct);
    }

    let file_name = direct
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Model '{}' is not a file name", model))?;
    let cached = models_dir.join(file_name);
    if cached.is_file() {
        log::debug!("Using cached weights {}", cached.display());
        return Ok(cached);
    }

    match url {
        Some(url) => {
            download(url, &cached)?;
            Ok(cached)
        }
        None => anyhow::bail!(
            "Model weights '{}' not found (looked in the working directory and {}). \
             Pass a path to an ONNX export or --model-url to fetch it.",
            model,
            models_dir.display()
        ),
    }
}

/// [`resolve_weights_in`] against `~/.cache/bvr/models`.
pub fn resolve_weights(model: &str, url: Option<&str>) -> Result<PathBuf> {
    let direct = Path::new(model);
    if direct.is_file() {
        return Ok(direct.to_path_buf());
    }
    let models_dir = FsAccess::Cache.path_with_subs(&["models"])?;
    resolve_weights_in(model, url, &models_dir)
}

fn download(url: &str, dst: &Path) -> Result<()> {
    log::info!("Downloading weights from {} to {}", url, dst.display());

    let response = ureq::get(url)
        .call()
        .with_context(|| format!("Failed to fetch {}", url))?;

    // Only a complete download is renamed into place.
    let partial = dst.with_extension("part");
    {
        let mut file = std::fs::File::create(&partial)
            .with_context(|| format!("Failed to create {}", partial.display()))?;
        let copied = std::io::copy(&mut response.into_reader(), &mut file)?;
        file.flush()?;
        log::info!("Downloaded {}", crate::utils::human_bytes(copied as f64));
    }
    std::fs::rename(&partial, dst)?;
    Ok(())
}
