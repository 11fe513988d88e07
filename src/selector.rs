//! File selection: validate a candidate image and keep the current pick.
//!
//! Drag-and-drop and the manual picker both hand over a list of candidates;
//! only the first one is looked at. A candidate is accepted when its MIME
//! type is in the `image/*` category. A rejected candidate never replaces an
//! earlier valid selection.

use crate::error::ClientError;
use crate::format::format_size;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Where the bytes of a selected file live.
#[derive(Clone)]
pub enum FileSource {
    /// A file on disk, read when the upload starts.
    Path(PathBuf),
    /// An in-memory buffer (drop payloads, generated images).
    Memory(Arc<[u8]>),
}

impl FileSource {
    /// Load the whole file. Images are small enough to buffer; the upload
    /// streams the buffer back out in chunks for progress reporting.
    pub async fn read(&self) -> Result<Arc<[u8]>, ClientError> {
        match self {
            FileSource::Memory(bytes) => Ok(Arc::clone(bytes)),
            FileSource::Path(path) => tokio::fs::read(path)
                .await
                .map(Arc::from)
                .map_err(|source| ClientError::Io {
                    path: path.clone(),
                    source,
                }),
        }
    }
}

impl fmt::Debug for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSource::Path(p) => f.debug_tuple("Path").field(p).finish(),
            FileSource::Memory(b) => write!(f, "Memory(<{} bytes>)", b.len()),
        }
    }
}

/// A file offered by the user, not yet validated.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub source: FileSource,
}

impl CandidateFile {
    pub fn new(
        name: impl Into<String>,
        size_bytes: u64,
        mime_type: impl Into<String>,
        source: FileSource,
    ) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            mime_type: mime_type.into(),
            source,
        }
    }

    /// Describe a file on disk the way a browser file picker would: size
    /// from metadata, MIME type guessed from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path).map_err(|source| ClientError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            size_bytes: meta.len(),
            mime_type: guess_mime(path),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    /// Wrap an in-memory buffer; the MIME type is guessed from `name`.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        let bytes: Vec<u8> = bytes.into();
        Self {
            mime_type: guess_mime(Path::new(&name)),
            size_bytes: bytes.len() as u64,
            source: FileSource::Memory(Arc::from(bytes)),
            name,
        }
    }
}

fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Whether a MIME type string belongs to the image category.
pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type
        .trim()
        .split('/')
        .next()
        .is_some_and(|top| top.eq_ignore_ascii_case("image"))
        && mime_type.contains('/')
}

/// A validated image selection. Immutable: a new pick replaces it wholesale.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    name: String,
    size_bytes: u64,
    mime_type: String,
    source: FileSource,
}

impl SelectedFile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    /// `"<name> (<size>)"`, shown next to the drop area.
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, format_size(self.size_bytes))
    }
}

/// Holds the current selection and validates new candidates.
#[derive(Debug, Default)]
pub struct FileSelector {
    max_file_bytes: Option<u64>,
    selected: Option<SelectedFile>,
}

impl FileSelector {
    pub fn new(max_file_bytes: Option<u64>) -> Self {
        Self {
            max_file_bytes,
            selected: None,
        }
    }

    /// Consider the first candidate and, if it is an acceptable image, make
    /// it the current selection.
    ///
    /// Returns `Ok(None)` for an empty list (nothing happens), the new
    /// selection on success, and a validation error otherwise. On error the
    /// previous selection is left as it was.
    pub fn select(
        &mut self,
        candidates: impl IntoIterator<Item = CandidateFile>,
    ) -> Result<Option<&SelectedFile>, ClientError> {
        let Some(candidate) = candidates.into_iter().next() else {
            debug!("Empty candidate list, selection unchanged");
            return Ok(None);
        };

        let file = self.validate(candidate)?;
        info!("Selected {}", file.label());
        let file: &SelectedFile = self.selected.insert(file);
        Ok(Some(file))
    }

    pub fn selected(&self) -> Option<&SelectedFile> {
        self.selected.as_ref()
    }

    fn validate(&self, candidate: CandidateFile) -> Result<SelectedFile, ClientError> {
        if !is_image_mime(&candidate.mime_type) {
            return Err(ClientError::NotAnImage {
                name: candidate.name,
                mime_type: candidate.mime_type,
            });
        }
        if let Some(limit) = self.max_file_bytes {
            if candidate.size_bytes > limit {
                return Err(ClientError::FileTooLarge {
                    name: candidate.name,
                    size: candidate.size_bytes,
                    limit,
                });
            }
        }
        Ok(SelectedFile {
            name: candidate.name,
            size_bytes: candidate.size_bytes,
            mime_type: candidate.mime_type,
            source: candidate.source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn candidate(name: &str, size: u64, mime: &str) -> CandidateFile {
        CandidateFile::new(name, size, mime, FileSource::Memory(Arc::from(Vec::new())))
    }

    #[test]
    fn image_mime_detection() {
        assert!(is_image_mime("image/png"));
        assert!(is_image_mime("image/jpeg"));
        assert!(is_image_mime("IMAGE/TIFF"));
        assert!(!is_image_mime("text/plain"));
        assert!(!is_image_mime("application/pdf"));
        assert!(!is_image_mime("image"));
        assert!(!is_image_mime(""));
    }

    #[test]
    fn only_first_candidate_counts() {
        let mut selector = FileSelector::default();
        let picked = selector
            .select(vec![
                candidate("scan.png", 2048, "image/png"),
                candidate("notes.txt", 10, "text/plain"),
            ])
            .unwrap()
            .unwrap();
        assert_eq!(picked.name(), "scan.png");

        // A bad first candidate is rejected even when a later one is valid.
        let err = selector
            .select(vec![
                candidate("notes.txt", 10, "text/plain"),
                candidate("other.png", 10, "image/png"),
            ])
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn rejection_keeps_previous_selection() {
        let mut selector = FileSelector::default();
        selector
            .select([candidate("receipt.jpg", 5000, "image/jpeg")])
            .unwrap();
        assert!(selector
            .select([candidate("doc.pdf", 5000, "application/pdf")])
            .is_err());
        assert_eq!(selector.selected().unwrap().name(), "receipt.jpg");
    }

    #[test]
    fn rejection_without_previous_leaves_nothing() {
        let mut selector = FileSelector::default();
        assert!(selector
            .select([candidate("doc.pdf", 5000, "application/pdf")])
            .is_err());
        assert!(selector.selected().is_none());
    }

    #[test]
    fn empty_list_is_a_no_op() {
        let mut selector = FileSelector::default();
        selector
            .select([candidate("a.png", 1, "image/png")])
            .unwrap();
        assert!(selector.select(Vec::<CandidateFile>::new()).unwrap().is_none());
        assert_eq!(selector.selected().unwrap().name(), "a.png");
    }

    #[test]
    fn size_limit_rejects_large_images() {
        let mut selector = FileSelector::new(Some(1000));
        let err = selector
            .select([candidate("big.png", 1001, "image/png")])
            .unwrap_err();
        assert!(matches!(err, ClientError::FileTooLarge { limit: 1000, .. }));
        assert!(selector
            .select([candidate("ok.png", 1000, "image/png")])
            .is_ok());
    }

    #[test]
    fn label_uses_formatted_size() {
        let mut selector = FileSelector::default();
        let picked = selector
            .select([candidate("photo.jpg", 1_572_864, "image/jpeg")])
            .unwrap()
            .unwrap();
        assert_eq!(picked.label(), "photo.jpg (1.5 MB)");
    }

    #[test]
    fn from_bytes_guesses_mime_from_name() {
        let c = CandidateFile::from_bytes("page.PNG", vec![1u8, 2, 3]);
        assert_eq!(c.mime_type, "image/png");
        assert_eq!(c.size_bytes, 3);

        let c = CandidateFile::from_bytes("readme", vec![0u8; 4]);
        assert_eq!(c.mime_type, "application/octet-stream");
    }

    #[test]
    fn from_path_reads_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.jpeg");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(&[0u8; 1500]).unwrap();
        drop(f);

        let c = CandidateFile::from_path(&path).unwrap();
        assert_eq!(c.name, "scan.jpeg");
        assert_eq!(c.size_bytes, 1500);
        assert_eq!(c.mime_type, "image/jpeg");
    }

    #[test]
    fn from_path_missing_file() {
        let err = CandidateFile::from_path("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, ClientError::Io { .. }));
    }

    #[tokio::test]
    async fn memory_source_reads_back() {
        let c = CandidateFile::from_bytes("x.gif", vec![7u8; 10]);
        let bytes = c.source.read().await.unwrap();
        assert_eq!(bytes.len(), 10);
    }
}
