//! Shared utilities

use anyhow::{Context, bail};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::path::{Path, PathBuf};
use vsai_ai::InlineImage;

/// Truncate a string to `max` characters, appending "..." if truncated.
/// Operates on Unicode char boundaries, not bytes.
pub fn truncate_chars(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let truncated: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "png",
    }
}

/// Read an image file into a `data:` URI
pub fn image_data_uri(path: &Path) -> anyhow::Result<String> {
    let Some(mime) = mime_for(path) else {
        bail!("unsupported image type: {}", path.display());
    };
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
}

/// Directory generated images are written to
pub fn images_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vsai")
        .join("images")
}

/// Decode a `data:` URI and write it as `<dir>/<name>.<ext>`
pub fn save_image(uri: &str, dir: &Path, name: &str) -> anyhow::Result<PathBuf> {
    let image = InlineImage::from_data_uri(uri)?;
    let bytes = STANDARD
        .decode(image.data.as_bytes())
        .context("image payload is not valid base64")?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.{}", name, extension_for(&image.mime_type)));
    std::fs::write(&path, bytes)?;
    Ok(path)
}
