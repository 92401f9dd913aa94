use anyhow::{Context, Result};
use encoding_rs::{Encoding, UTF_8};
use std::path::Path;
use tracing::{debug, info, warn};

/// Read a whole log file into memory as text.
///
/// Files are consumed once per request and never stored.
pub async fn read_log_file<P: AsRef<Path>>(file_path: P) -> Result<String> {
    let path = file_path.as_ref();
    info!("Reading log file: {}", path.display());

    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read log file {}", path.display()))?;
    debug!("Read {} bytes from file {}", data.len(), path.display());

    Ok(decode_log_bytes(&data))
}

/// Decode raw bytes, honouring a UTF-8/UTF-16 BOM when present.
///
/// Without a BOM the data is UTF-8. Invalid sequences become U+FFFD and the
/// rest of the text is left intact.
pub fn decode_log_bytes(data: &[u8]) -> String {
    let (text, encoding, had_errors) = UTF_8.decode(data);
    log_encoding(encoding);
    if had_errors {
        warn!("Log data contains invalid {} sequences, replacing them", encoding.name());
    }
    text.into_owned()
}

fn log_encoding(encoding: &'static Encoding) {
    if encoding != UTF_8 {
        debug!("Detected encoding {} from byte order mark", encoding.name());
    }
}
