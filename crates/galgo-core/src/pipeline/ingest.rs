//! Streaming uploads into the staging area.
//!
//! The upload body is copied to `<base>/tmp/<filename>` in fixed-size
//! chunks so memory stays bounded regardless of payload size. The returned
//! [`StagedFile`] owns that path and removes it when dropped, which covers
//! success, early returns, errors, and cancellation of the enclosing future.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::config::IngestConfig;
use crate::error::PipelineError;

/// Upload body: any async byte source.
pub type UploadBody = Box<dyn AsyncRead + Send + Unpin>;

/// One named upload, as supplied by the transport layer.
pub struct UploadRequest {
    file_name: String,
    body: UploadBody,
}

impl UploadRequest {
    pub fn new(file_name: impl Into<String>, body: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            file_name: file_name.into(),
            body: Box::new(body),
        }
    }

    /// Wrap an in-memory payload.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(file_name, std::io::Cursor::new(bytes))
    }

    /// Open a local file as an upload, named after its final path component.
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(file_name, file))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn into_parts(self) -> (String, UploadBody) {
        (self.file_name, self.body)
    }
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("file_name", &self.file_name)
            .finish_non_exhaustive()
    }
}

/// Whether moving a staged file created its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The destination was written by this call
    Created,
    /// A file already occupied the destination and was kept as-is
    Existing,
}

/// A staged upload on disk. Removed exactly once, on drop.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    size: u64,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written to the staging file.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Move the staged bytes to `dest` without ever clobbering it.
    ///
    /// A hard link is attempted first (atomic create-if-absent); when the
    /// filesystem refuses (e.g. across devices) the bytes are copied into a
    /// freshly created file instead. The staging path is removed when `self`
    /// drops at the end of this call, whatever the result.
    pub async fn place_at(self, dest: &Path) -> std::io::Result<Placement> {
        match fs::hard_link(&self.path, dest).await {
            Ok(()) => return Ok(Placement::Created),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(Placement::Existing),
            Err(e) => {
                tracing::debug!("hard link to {:?} failed ({e}), copying instead", dest);
            }
        }

        let mut target = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dest)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(Placement::Existing),
            Err(e) => return Err(e),
        };

        let copied = async {
            let mut source = File::open(&self.path).await?;
            tokio::io::copy(&mut source, &mut target).await?;
            target.flush().await
        }
        .await;

        if let Err(e) = copied {
            drop(target);
            let _ = fs::remove_file(dest).await;
            return Err(e);
        }
        Ok(Placement::Created)
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::trace!("Removed staging file {:?}", self.path),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove staging file {:?}: {}", self.path, e),
        }
    }
}

/// Writes upload streams into the staging directory.
pub struct StreamIngestor {
    staging_dir: PathBuf,
    chunk_size: usize,
    max_bytes: u64,
    max_mb: u64,
}

impl StreamIngestor {
    /// Upper bound on numeric suffixes tried when a staging name is taken.
    const MAX_NAME_ATTEMPTS: u32 = 1000;

    pub fn new(staging_dir: impl Into<PathBuf>, config: &IngestConfig) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            chunk_size: config.chunk_size.max(1),
            max_bytes: config.max_file_size_mb.saturating_mul(1024 * 1024),
            max_mb: config.max_file_size_mb,
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Create the staging directory if absent.
    pub async fn prepare(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.staging_dir).await
    }

    /// Stream `body` into a new staging file named after `file_name`.
    pub async fn stage<R>(&self, file_name: &str, mut body: R) -> Result<StagedFile, PipelineError>
    where
        R: AsyncRead + Unpin,
    {
        self.prepare().await.map_err(|e| PipelineError::Staging {
            path: self.staging_dir.clone(),
            message: format!("Cannot create staging directory: {e}"),
        })?;

        let (file, mut staged) = self.create_exclusive(file_name).await?;

        // The handle is closed before `staged` can drop on an error path.
        staged.size = self
            .copy_chunks(file, &mut body, file_name, &staged.path)
            .await?;

        tracing::debug!("Staged {:?} ({} bytes)", staged.path, staged.size);
        Ok(staged)
    }

    async fn copy_chunks<R>(
        &self,
        mut file: File,
        body: &mut R,
        file_name: &str,
        path: &Path,
    ) -> Result<u64, PipelineError>
    where
        R: AsyncRead + Unpin,
    {
        let mut buffer = vec![0u8; self.chunk_size];
        let mut written: u64 = 0;
        loop {
            let read = body
                .read(&mut buffer)
                .await
                .map_err(|e| staging_error(path, "read upload", e))?;
            if read == 0 {
                break;
            }
            written += read as u64;
            if written > self.max_bytes {
                return Err(PipelineError::UploadTooLarge {
                    file_name: file_name.to_string(),
                    max_mb: self.max_mb,
                });
            }
            file.write_all(&buffer[..read])
                .await
                .map_err(|e| staging_error(path, "write", e))?;
        }
        file.flush()
            .await
            .map_err(|e| staging_error(path, "flush", e))?;
        Ok(written)
    }

    /// Create the staging file exclusively, suffixing the name on collision.
    async fn create_exclusive(&self, file_name: &str) -> Result<(File, StagedFile), PipelineError> {
        let base = sanitize_file_name(file_name);
        for attempt in 0..Self::MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                base.clone()
            } else {
                format!("{base}.{attempt}")
            };
            let path = self.staging_dir.join(name);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((file, StagedFile { path, size: 0 })),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(staging_error(&path, "create", e)),
            }
        }
        Err(PipelineError::Staging {
            path: self.staging_dir.join(&base),
            message: "no free staging name".to_string(),
        })
    }
}

fn staging_error(path: &Path, action: &str, e: std::io::Error) -> PipelineError {
    PipelineError::Staging {
        path: path.to_path_buf(),
        message: format!("{action} failed: {e}"),
    }
}

/// Reduce an untrusted upload filename to a single safe path component.
pub fn sanitize_file_name(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingestor(dir: &Path) -> StreamIngestor {
        let config = IngestConfig {
            chunk_size: 7,
            ..IngestConfig::default()
        };
        StreamIngestor::new(dir.join("tmp"), &config)
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("beach.jpg"), "beach.jpg");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\photos\\a.png"), "a.png");
        assert_eq!(sanitize_file_name(".."), "upload");
        assert_eq!(sanitize_file_name(""), "upload");
        assert_eq!(sanitize_file_name("dir/"), "upload");
    }

    #[tokio::test]
    async fn test_stage_writes_all_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let ingestor = ingestor(dir.path());
        let payload: Vec<u8> = (0..100u8).collect();

        let staged = ingestor
            .stage("data.bin", std::io::Cursor::new(payload.clone()))
            .await
            .unwrap();

        assert_eq!(staged.size(), 100);
        assert_eq!(staged.path(), dir.path().join("tmp/data.bin"));
        assert_eq!(std::fs::read(staged.path()).unwrap(), payload);
    }

    #[tokio::test]
    async fn test_drop_removes_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let ingestor = ingestor(dir.path());
        let staged = ingestor
            .stage("gone.bin", std::io::Cursor::new(vec![1, 2, 3]))
            .await
            .unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());

        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_cancelled_stage_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let ingestor = ingestor(dir.path());
        let (mut sender, body) = tokio::io::duplex(64);
        sender.write_all(b"partial upload").await.unwrap();

        // The sender stalls with the stream still open
        let mut staging = Box::pin(ingestor.stage("slow.mp4", body));
        let stalled =
            tokio::time::timeout(std::time::Duration::from_millis(100), &mut staging).await;
        assert!(stalled.is_err());
        assert!(dir.path().join("tmp/slow.mp4").exists());

        drop(staging);
        assert_eq!(std::fs::read_dir(dir.path().join("tmp")).unwrap().count(), 0);
        drop(sender);
    }

    #[tokio::test]
    async fn test_colliding_names_get_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let ingestor = ingestor(dir.path());
        let first = ingestor
            .stage("same.jpg", std::io::Cursor::new(vec![1]))
            .await
            .unwrap();
        let second = ingestor
            .stage("same.jpg", std::io::Cursor::new(vec![2]))
            .await
            .unwrap();

        assert_ne!(first.path(), second.path());
        assert_eq!(second.path(), dir.path().join("tmp/same.jpg.1"));
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected_and_cleaned() {
        let dir = tempfile::tempdir().unwrap();
        let config = IngestConfig {
            max_file_size_mb: 1,
            ..IngestConfig::default()
        };
        let ingestor = StreamIngestor::new(dir.path().join("tmp"), &config);
        let payload = vec![0u8; 1024 * 1024 + 1];

        let result = ingestor
            .stage("big.bin", std::io::Cursor::new(payload))
            .await;

        assert!(matches!(result, Err(PipelineError::UploadTooLarge { .. })));
        let leftovers = std::fs::read_dir(dir.path().join("tmp")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_place_at_never_clobbers() {
        let dir = tempfile::tempdir().unwrap();
        let ingestor = ingestor(dir.path());
        let dest = dir.path().join("kept.bin");
        std::fs::write(&dest, b"original").unwrap();

        let staged = ingestor
            .stage("new.bin", std::io::Cursor::new(b"replacement".to_vec()))
            .await
            .unwrap();
        let staged_path = staged.path().to_path_buf();

        let placement = staged.place_at(&dest).await.unwrap();
        assert_eq!(placement, Placement::Existing);
        assert_eq!(std::fs::read(&dest).unwrap(), b"original");
        assert!(!staged_path.exists());
    }

    #[tokio::test]
    async fn test_place_at_moves_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let ingestor = ingestor(dir.path());
        let dest = dir.path().join("stored.bin");

        let staged = ingestor
            .stage("new.bin", std::io::Cursor::new(b"payload".to_vec()))
            .await
            .unwrap();
        let staged_path = staged.path().to_path_buf();

        let placement = staged.place_at(&dest).await.unwrap();
        assert_eq!(placement, Placement::Created);
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
        assert!(!staged_path.exists());
    }
}
