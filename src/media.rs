// Stores uploaded post images under `{media_root}/posts/` and hands back the
// relative path recorded on the post row. Uploads keep their original file
// name; a short random suffix is added only when that name is already taken.

use std::fmt;
use std::path::Path;

use file_format::FileFormat;
use uuid::Uuid;

pub const POSTS_SUBDIR: &str = "posts";
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug)]
pub enum ImageError {
    /// The bytes do not carry a known image signature.
    Unsupported,
    TooLarge,
    Io(std::io::Error),
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::Unsupported => write!(f, "the uploaded file is not an image"),
            ImageError::TooLarge => write!(f, "the uploaded image is larger than 10 MiB"),
            ImageError::Io(err) => write!(f, "failed to store the uploaded image: {err}"),
        }
    }
}

impl From<std::io::Error> for ImageError {
    fn from(err: std::io::Error) -> Self {
        ImageError::Io(err)
    }
}

pub fn is_image(bytes: &[u8]) -> bool {
    FileFormat::from_bytes(bytes)
        .media_type()
        .starts_with("image/")
}

/// Validates and writes an upload, returning the relative path to record on
/// the post (for example `posts/small.gif`).
pub async fn store_post_image(
    media_root: &Path,
    original_name: &str,
    bytes: &[u8],
) -> Result<String, ImageError> {
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ImageError::TooLarge);
    }
    if bytes.is_empty() || !is_image(bytes) {
        return Err(ImageError::Unsupported);
    }

    let dir = media_root.join(POSTS_SUBDIR);
    tokio::fs::create_dir_all(&dir).await?;

    let mut name = sanitize_file_name(original_name);
    if tokio::fs::try_exists(dir.join(&name)).await? {
        name = dedupe_file_name(&name);
    }
    tokio::fs::write(dir.join(&name), bytes).await?;
    Ok(format!("{POSTS_SUBDIR}/{name}"))
}

/// Keeps only the base name and a conservative charset so the upload can
/// never escape the media directory or produce an unlinkable URL.
fn sanitize_file_name(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original)
        .trim_start_matches('.');
    let mut cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .take(100)
        .collect();
    if cleaned.is_empty() {
        cleaned = "upload".to_owned();
    }
    cleaned
}

fn dedupe_file_name(name: &str) -> String {
    let tag = Uuid::new_v4().simple().to_string();
    let tag = &tag[..8];
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{tag}.{ext}"),
        _ => format!("{name}_{tag}"),
    }
}
