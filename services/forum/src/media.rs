//! Profile image encoding

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Read an image file and encode it as a `data:` URL
pub async fn image_data_url(path: &Path) -> ClientResult<String> {
    let mime = mime_guess::from_path(path)
        .first()
        .filter(|m| m.type_() == mime_guess::mime::IMAGE)
        .ok_or_else(|| {
            ClientError::validation(format!("{} is not a supported image", path.display()))
        })?;

    let bytes = tokio::fs::read(path).await.map_err(|e| {
        ClientError::validation(format!("Cannot read {}: {}", path.display(), e))
    })?;
    debug!("Encoding {} ({} bytes) as {}", path.display(), bytes.len(), mime);

    Ok(encode_data_url(mime.essence_str(), &bytes))
}

pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}
