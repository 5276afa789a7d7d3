use std::{fs, path::{Path, PathBuf}};

use crate::apod::Metadata;
use crate::error::{Failure, StoreError};
use crate::http::{HttpRequest, Transport};

const METADATA_FILE: &str = "metadata.json";
const DOWNLOAD_TIMEOUT: u64 = 120;

/// Where a day's APOD ended up on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedApod {
    pub dir: PathBuf,
    pub metadata_path: PathBuf,
    /// `None` when the day's media isn't an image.
    pub image_path: Option<PathBuf>,
}

/// Writes each day's metadata and image into `<root>/<date>/`.
#[derive(Debug, Clone)]
pub struct ApodStore {
    root: PathBuf,
}

impl ApodStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ApodStore { root: root.into() }
    }

    pub fn day_dir(&self, date: &str) -> PathBuf {
        self.root.join(date)
    }

    pub fn save<T: Transport>(
        &self,
        date: &str,
        meta: &Metadata,
        transport: &T,
    ) -> Result<SavedApod, StoreError> {
        let dir = self.day_dir(date);
        fs::create_dir_all(&dir)?;

        let metadata_path = dir.join(METADATA_FILE);
        fs::write(&metadata_path, serde_json::to_string_pretty(meta)?)?;
        log::debug!("Wrote {}", metadata_path.display());

        let image_path = match meta.media_type() {
            None | Some("image") => Some(self.download_image(&dir, meta.image_url(), transport)?),
            Some(other) => {
                log::info!("APOD {} is a {}, not downloading {}", date, other, meta.url());
                None
            }
        };

        Ok(SavedApod { dir, metadata_path, image_path })
    }

    fn download_image<T: Transport>(
        &self,
        dir: &Path,
        url: &str,
        transport: &T,
    ) -> Result<PathBuf, StoreError> {
        let name = image_file_name(url).ok_or_else(|| StoreError::BadImageUrl(url.to_string()))?;

        let r = transport
            .send(&HttpRequest::get(url, DOWNLOAD_TIMEOUT))
            .map_err(|e| StoreError::Download { url: url.to_string(), failure: Failure::from(e) })?;
        if !r.is_success() {
            return Err(StoreError::Download { url: url.to_string(), failure: r.status_failure() });
        }

        let path = dir.join(name);
        fs::write(&path, &r.body)?;
        log::debug!("Wrote {} bytes to {}", r.body.len(), path.display());
        Ok(path)
    }
}

/// Last path segment of `url`, without any query string.
pub fn image_file_name(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let name = path.rsplit('/').next().unwrap_or_default();
    if name.is_empty() || name == ".." || name == "." {
        None
    } else {
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{bytes_ok, status, ScriptedTransport};

    fn meta(json: &str) -> Metadata {
        Metadata::from_slice(json.as_bytes()).unwrap()
    }

    #[test]
    fn file_names_drop_query_strings() {
        assert_eq!(image_file_name("https://apod.nasa.gov/image/2401/a.jpg?x=1"), Some("a.jpg"));
        assert_eq!(image_file_name("https://apod.nasa.gov/image/2401/b.png"), Some("b.png"));
        assert_eq!(image_file_name("https://apod.nasa.gov/image/"), None);
    }

    #[test]
    fn saves_metadata_and_hd_image() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ApodStore::new(tmp.path());
        let t = ScriptedTransport::new(vec![Ok(bytes_ok(b"JPEGDATA"))]);
        let m = meta(r#"{"url": "https://x/small.jpg", "hdurl": "https://x/big.jpg?raw=1", "media_type": "image"}"#);

        let saved = store.save("2024-01-01", &m, &t).unwrap();

        assert_eq!(saved.dir, tmp.path().join("2024-01-01"));
        assert_eq!(t.requests()[0].url, "https://x/big.jpg?raw=1");
        let image = saved.image_path.unwrap();
        assert_eq!(image.file_name().unwrap(), "big.jpg");
        assert_eq!(fs::read(image).unwrap(), b"JPEGDATA");

        let written = fs::read_to_string(&saved.metadata_path).unwrap();
        assert!(written.contains("\n  \"hdurl\""));
        let back: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(back["url"], "https://x/small.jpg");
    }

    #[test]
    fn videos_are_not_downloaded() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ApodStore::new(tmp.path());
        let t = ScriptedTransport::new(vec![]);
        let m = meta(r#"{"url": "https://www.youtube.com/embed/abc", "media_type": "video"}"#);

        let saved = store.save("2024-01-02", &m, &t).unwrap();

        assert_eq!(t.calls(), 0);
        assert!(saved.image_path.is_none());
        assert!(saved.metadata_path.exists());
    }

    #[test]
    fn failed_download_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ApodStore::new(tmp.path());
        let t = ScriptedTransport::new(vec![Ok(status(404, "Not Found"))]);
        let m = meta(r#"{"url": "https://x/gone.jpg"}"#);

        let err = store.save("2024-01-03", &m, &t).unwrap_err();
        assert!(matches!(err, StoreError::Download { failure: Failure::Status { code: 404, .. }, .. }));
        assert!(!store.day_dir("2024-01-03").join("gone.jpg").exists());
    }

    #[test]
    fn metadata_keeps_the_api_field_order() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ApodStore::new(tmp.path());
        let t = ScriptedTransport::new(vec![]);
        let m = meta(r#"{"title": "T", "media_type": "video", "date": "2024-01-04", "url": "https://x/v"}"#);

        let saved = store.save("2024-01-04", &m, &t).unwrap();

        let written = fs::read_to_string(saved.metadata_path).unwrap();
        let pos = |k: &str| written.find(&format!("\"{}\"", k)).unwrap();
        assert!(pos("title") < pos("media_type"));
        assert!(pos("media_type") < pos("date"));
        assert!(pos("date") < pos("url"));
    }
}
