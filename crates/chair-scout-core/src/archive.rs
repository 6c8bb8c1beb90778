use image::ImageFormat;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::trace;

use crate::error::ClassificationError;

/// Writes downloaded gallery images to the download folder as PNG files.
pub struct ImageArchive {
    folder: PathBuf,
}

impl ImageArchive {
    pub fn new<P: AsRef<Path>>(folder: P) -> Self {
        Self {
            folder: folder.as_ref().to_path_buf(),
        }
    }

    /// Decode `image` and save it as `{ad_id}_{observed_at}_{index}.png`.
    /// Returns the path used as the row's image reference.
    pub fn store(
        &self,
        image: &[u8],
        ad_id: i64,
        observed_at: &str,
        index: usize,
    ) -> Result<String, ClassificationError> {
        let decoded = image::load_from_memory(image)
            .map_err(|e| ClassificationError::CorruptImage(e.to_string()))?;

        fs::create_dir_all(&self.folder)?;
        let path = self
            .folder
            .join(format!("{}_{}_{}.png", ad_id, file_stamp(observed_at), index));
        decoded
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| ClassificationError::Io(io::Error::other(e.to_string())))?;

        trace!("Archived image {} of ad {} at {}", index, ad_id, path.display());
        Ok(path.to_string_lossy().into_owned())
    }
}

fn file_stamp(observed_at: &str) -> String {
    observed_at
        .chars()
        .map(|c| match c {
            ' ' => '_',
            ':' => '-',
            other => other,
        })
        .collect()
}
