//! PreviewCache - persistent disk cache for generated preview artifacts.
//!
//! The cache root mirrors absolute source paths: the artifact for
//! `/home/me/report.pdf` rendered as JPEG lives at
//! `<root>/home/me/report.pdf.jpg`. An entry is valid while the artifact
//! exists and is at least as new as the source.

use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

/// Image format of a generated artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Jpg,
    Png,
}

impl ArtifactFormat {
    pub fn suffix(self) -> &'static str {
        match self {
            ArtifactFormat::Jpg => ".jpg",
            ArtifactFormat::Png => ".png",
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.suffix()[1..])
    }
}

/// Persistent disk cache for preview artifacts.
#[derive(Debug, Clone)]
pub struct PreviewCache {
    root: PathBuf,
}

impl PreviewCache {
    /// Create a cache rooted at `root`. The directory is created lazily.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Default root: `~/.cache/preview-pane/`.
    pub fn default_root() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("preview-pane")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the artifact for `source` in `format` lives.
    pub fn artifact_path(&self, source: &Path, format: ArtifactFormat) -> PathBuf {
        let mut mirrored = self.mirror(source).into_os_string();
        mirrored.push(format.suffix());
        PathBuf::from(mirrored)
    }

    /// Directory holding the decomposed frames of an animation.
    pub fn frames_dir(&self, source: &Path) -> PathBuf {
        self.mirror(source)
    }

    fn mirror(&self, source: &Path) -> PathBuf {
        let mut out = self.root.clone();
        for component in source.components() {
            match component {
                Component::Normal(part) => out.push(part),
                Component::ParentDir => out.push("__up__"),
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            }
        }
        out
    }

    /// Return the cached artifact if it is still valid for `source`.
    pub fn lookup(&self, source: &Path, format: ArtifactFormat) -> Option<PathBuf> {
        let artifact = self.artifact_path(source, format);
        is_fresh(source, &artifact).then_some(artifact)
    }

    /// Return the frame directory if it holds frames at least as new as
    /// `source`.
    pub fn lookup_frames(&self, source: &Path) -> Option<PathBuf> {
        let dir = self.frames_dir(source);
        if !is_fresh(source, &dir) {
            return None;
        }
        let has_frames = std::fs::read_dir(&dir)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false);
        has_frames.then_some(dir)
    }

    /// Return a valid artifact, running `produce` to create it on a miss.
    ///
    /// `produce` receives a staging path next to the artifact, with the
    /// parent directory already created and the format's suffix kept so
    /// converters still pick the right encoder. The staging file is renamed
    /// onto the artifact path only after `produce` succeeds with a
    /// non-empty result, so an interrupted producer never leaves a hit.
    pub fn get_or_generate<F>(&self, source: &Path, format: ArtifactFormat, produce: F) -> Option<PathBuf>
    where
        F: FnOnce(&Path) -> io::Result<()>,
    {
        if let Some(hit) = self.lookup(source, format) {
            log::debug!("Cache hit for {}", source.display());
            return Some(hit);
        }

        let artifact = self.artifact_path(source, format);
        if let Some(parent) = artifact.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!("Cannot create cache dir {}: {}", parent.display(), e);
                return None;
            }
        }
        // A stale artifact must not survive a failed regeneration, and a
        // killed producer may have left its staging file behind.
        let _ = std::fs::remove_file(&artifact);
        let staging = staging_path(&artifact, format.suffix());
        discard(&staging);

        match produce(&staging) {
            Ok(()) if non_empty(&staging) => match std::fs::rename(&staging, &artifact) {
                Ok(()) => Some(artifact),
                Err(e) => {
                    log::warn!("Cannot move artifact into {}: {}", artifact.display(), e);
                    discard(&staging);
                    None
                }
            },
            Ok(()) => {
                log::info!("Producer left no artifact for {}", source.display());
                discard(&staging);
                None
            }
            Err(e) => {
                log::info!("Producer failed for {}: {}", source.display(), e);
                discard(&staging);
                None
            }
        }
    }

    /// Where frames for `source` are decomposed before they are moved into
    /// [`PreviewCache::frames_dir`].
    pub fn frames_staging_dir(&self, source: &Path) -> PathBuf {
        staging_path(&self.frames_dir(source), "")
    }

    /// Total size of all artifacts in bytes.
    pub fn total_size_bytes(&self) -> Result<u64, io::Error> {
        fn walk(dir: &Path) -> io::Result<u64> {
            let mut total = 0;
            for entry in std::fs::read_dir(dir)? {
                let entry = entry?;
                let metadata = entry.metadata()?;
                if metadata.is_dir() {
                    total += walk(&entry.path())?;
                } else if metadata.is_file() {
                    total += metadata.len();
                }
            }
            Ok(total)
        }

        if !self.root.exists() {
            return Ok(0);
        }
        walk(&self.root)
    }

    /// Remove every artifact. Returns the number of files removed.
    pub fn clear_all(&self) -> Result<usize, io::Error> {
        fn count(dir: &Path) -> io::Result<usize> {
            let mut n = 0;
            for entry in std::fs::read_dir(dir)? {
                let entry = entry?;
                if entry.file_type()?.is_dir() {
                    n += count(&entry.path())?;
                } else {
                    n += 1;
                }
            }
            Ok(n)
        }

        if !self.root.exists() {
            return Ok(0);
        }
        let removed = count(&self.root)?;
        std::fs::remove_dir_all(&self.root)?;
        Ok(removed)
    }
}

/// Hidden sibling of `path` used while it is being written:
/// `report.pdf.jpg` stages as `.report.pdf.part.jpg`.
fn staging_path(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.strip_suffix(suffix).unwrap_or(&name);
    path.with_file_name(format!(".{}.part{}", stem, suffix))
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// `artifact` exists and is not older than `source`.
fn is_fresh(source: &Path, artifact: &Path) -> bool {
    match (modified(source), modified(artifact)) {
        (Some(src), Some(art)) => src <= art,
        _ => false,
    }
}

fn non_empty(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

fn discard(path: &Path) {
    if path.is_dir() {
        let _ = std::fs::remove_dir_all(path);
    } else {
        let _ = std::fs::remove_file(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn touch_later(path: &Path, secs: u64) {
        let file = fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn test_artifact_path_mirrors_source() {
        let cache = PreviewCache::new(PathBuf::from("/cache"));
        assert_eq!(
            cache.artifact_path(Path::new("/home/me/report.pdf"), ArtifactFormat::Jpg),
            PathBuf::from("/cache/home/me/report.pdf.jpg")
        );
        assert_eq!(
            cache.artifact_path(Path::new("/a/b.docx"), ArtifactFormat::Png),
            PathBuf::from("/cache/a/b.docx.png")
        );
        assert_eq!(
            cache.frames_dir(Path::new("/pics/cat.gif")),
            PathBuf::from("/cache/pics/cat.gif")
        );
    }

    #[test]
    fn test_parent_components_cannot_escape_root() {
        let cache = PreviewCache::new(PathBuf::from("/cache"));
        let path = cache.artifact_path(Path::new("/a/../../etc/passwd"), ArtifactFormat::Jpg);
        assert!(path.starts_with("/cache"));
    }

    #[test]
    fn test_default_root_structure() {
        let root = PreviewCache::default_root();
        assert!(root.ends_with("preview-pane"));
    }

    #[test]
    fn test_producer_runs_once_for_unchanged_source() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("report.pdf");
        fs::write(&source, b"%PDF").unwrap();
        let cache = PreviewCache::new(dir.path().join("cache"));
        let calls = Cell::new(0);

        let produce = |out: &Path| {
            calls.set(calls.get() + 1);
            fs::write(out, b"jpeg")
        };
        let first = cache.get_or_generate(&source, ArtifactFormat::Jpg, produce).unwrap();
        let second = cache
            .get_or_generate(&source, ArtifactFormat::Jpg, |out: &Path| {
                calls.set(calls.get() + 1);
                fs::write(out, b"jpeg")
            })
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_newer_source_invalidates_artifact() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("photo.png");
        fs::write(&source, b"png").unwrap();
        let cache = PreviewCache::new(dir.path().join("cache"));

        cache
            .get_or_generate(&source, ArtifactFormat::Jpg, |out| fs::write(out, b"v1"))
            .unwrap();
        assert!(cache.lookup(&source, ArtifactFormat::Jpg).is_some());

        touch_later(&source, 60);
        assert!(cache.lookup(&source, ArtifactFormat::Jpg).is_none());

        let regenerated = cache
            .get_or_generate(&source, ArtifactFormat::Jpg, |out| fs::write(out, b"v2"))
            .unwrap();
        assert_eq!(fs::read(regenerated).unwrap(), b"v2");
    }

    #[test]
    fn test_failed_producer_leaves_nothing_cached() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("broken.docx");
        fs::write(&source, b"zip").unwrap();
        let cache = PreviewCache::new(dir.path().join("cache"));

        let result = cache.get_or_generate(&source, ArtifactFormat::Png, |out| {
            fs::write(out, b"half")?;
            Err(io::Error::new(io::ErrorKind::Other, "converter crashed"))
        });

        assert!(result.is_none());
        assert!(!cache.artifact_path(&source, ArtifactFormat::Png).exists());
    }

    #[test]
    fn test_interrupted_producer_is_never_a_hit() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("report.pdf");
        fs::write(&source, b"%PDF").unwrap();
        let cache = PreviewCache::new(dir.path().join("cache"));
        let artifact = cache.artifact_path(&source, ArtifactFormat::Jpg);

        // A producer killed mid-write gets no chance to clean up.
        let mut staged = None;
        let _ = cache.get_or_generate(&source, ArtifactFormat::Jpg, |out| {
            staged = Some(out.to_path_buf());
            fs::write(out, b"half")?;
            assert!(!artifact.exists());
            Err(io::Error::new(io::ErrorKind::Interrupted, "cancelled"))
        });
        let staged = staged.unwrap();
        assert_ne!(staged, artifact);
        assert!(staged.to_string_lossy().ends_with(".jpg"));

        fs::write(&staged, b"half").unwrap();
        assert!(cache.lookup(&source, ArtifactFormat::Jpg).is_none());

        let regenerated = cache
            .get_or_generate(&source, ArtifactFormat::Jpg, |out| fs::write(out, b"whole"))
            .unwrap();
        assert_eq!(fs::read(&regenerated).unwrap(), b"whole");
        assert!(!staged.exists());
    }

    #[test]
    fn test_staging_names_keep_format_suffix() {
        assert_eq!(
            staging_path(Path::new("/c/me/report.pdf.jpg"), ".jpg"),
            PathBuf::from("/c/me/.report.pdf.part.jpg")
        );
        let cache = PreviewCache::new(PathBuf::from("/cache"));
        assert_eq!(
            cache.frames_staging_dir(Path::new("/pics/cat.gif")),
            PathBuf::from("/cache/pics/.cat.gif.part")
        );
    }

    #[test]
    fn test_empty_artifact_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("song.mp3");
        fs::write(&source, b"id3").unwrap();
        let cache = PreviewCache::new(dir.path().join("cache"));

        let result = cache.get_or_generate(&source, ArtifactFormat::Jpg, |out| fs::write(out, b""));
        assert!(result.is_none());
        assert!(!cache.artifact_path(&source, ArtifactFormat::Jpg).exists());
    }

    #[test]
    fn test_missing_source_is_never_fresh() {
        let dir = TempDir::new().unwrap();
        let cache = PreviewCache::new(dir.path().join("cache"));
        assert!(cache
            .lookup(&dir.path().join("ghost.pdf"), ArtifactFormat::Jpg)
            .is_none());
    }

    #[test]
    fn test_lookup_frames_requires_frames() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("cat.gif");
        fs::write(&source, b"GIF89a").unwrap();
        let cache = PreviewCache::new(dir.path().join("cache"));

        let frames = cache.frames_dir(&source);
        fs::create_dir_all(&frames).unwrap();
        assert!(cache.lookup_frames(&source).is_none());

        fs::write(frames.join("cat.gif-0.jpg"), b"f").unwrap();
        assert_eq!(cache.lookup_frames(&source), Some(frames));
    }

    #[test]
    fn test_clear_all_and_size() {
        let dir = TempDir::new().unwrap();
        let cache = PreviewCache::new(dir.path().join("cache"));
        assert_eq!(cache.total_size_bytes().unwrap(), 0);
        assert_eq!(cache.clear_all().unwrap(), 0);

        let nested = cache.root().join("home/me");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("a.pdf.jpg"), b"1234").unwrap();
        fs::write(nested.join("b.docx.png"), b"56").unwrap();

        assert_eq!(cache.total_size_bytes().unwrap(), 6);
        assert_eq!(cache.clear_all().unwrap(), 2);
        assert!(!cache.root().exists());
    }
}
