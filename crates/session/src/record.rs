//! Image records and the display handles that back their previews.

use slimsnap_core::{Error, Result};
use slimsnap_image::{detect_format, CompressedImage, ImageFormat, StrategyKind};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Prefix of every compressed output file name.
pub const OUTPUT_PREFIX: &str = "compressed_";

/// Encoded image bytes with their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Encoded bytes
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`
    pub mime: String,
}

impl Payload {
    /// Wrap bytes and a MIME type.
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A file handed to the working set.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Display name
    pub name: String,
    /// Declared MIME type
    pub mime: String,
    /// File contents
    pub bytes: Vec<u8>,
}

impl SourceFile {
    /// Build a source file from bytes already in memory.
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Read a file from disk. The MIME type comes from the magic bytes, or
    /// the extension when those are not recognised.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::file_not_found(path));
        }
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let format = detect_format(&bytes).ok().or_else(|| {
            path.extension()
                .and_then(|e| e.to_str())
                .and_then(ImageFormat::from_extension)
        });
        let mime = format
            .map(|f| f.mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        Ok(Self { name, mime, bytes })
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    next: AtomicU64,
    live: Mutex<HashSet<u64>>,
}

fn acquire_from(inner: &Arc<RegistryInner>) -> DisplayHandle {
    let id = inner.next.fetch_add(1, Ordering::Relaxed);
    inner.live.lock().unwrap_or_else(|e| e.into_inner()).insert(id);
    DisplayHandle {
        id,
        registry: Arc::clone(inner),
    }
}

/// Issues display handles and tracks which are still alive.
#[derive(Debug, Clone, Default)]
pub struct HandleRegistry {
    inner: Arc<RegistryInner>,
}

impl HandleRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a new handle. It is released when dropped.
    pub fn acquire(&self) -> DisplayHandle {
        acquire_from(&self.inner)
    }

    /// Number of handles not yet released.
    pub fn live_count(&self) -> usize {
        self.inner.live.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the handle with this id is still alive.
    pub fn is_live(&self, id: u64) -> bool {
        self.inner
            .live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&id)
    }
}

/// A live reference to displayable bytes.
pub struct DisplayHandle {
    id: u64,
    registry: Arc<RegistryInner>,
}

impl DisplayHandle {
    /// Registry-unique id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Acquire another handle from the same registry.
    pub fn sibling(&self) -> DisplayHandle {
        acquire_from(&self.registry)
    }
}

impl fmt::Debug for DisplayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DisplayHandle").field(&self.id).finish()
    }
}

impl Drop for DisplayHandle {
    fn drop(&mut self) {
        self.registry
            .live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
    }
}

/// The compressed counterpart of an original.
#[derive(Debug)]
pub struct ProcessedImage {
    /// Compressed bytes
    pub payload: Payload,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Strategy that produced the bytes
    pub strategy: StrategyKind,
    /// Handle for displaying the result
    pub handle: DisplayHandle,
}

impl ProcessedImage {
    /// Wrap an engine result with its display handle.
    pub fn from_compressed(out: CompressedImage, handle: DisplayHandle) -> Self {
        let mime = out.mime_type();
        Self {
            payload: Payload::new(out.bytes, mime),
            width: out.width,
            height: out.height,
            strategy: out.strategy,
            handle,
        }
    }
}

/// One image in the working set.
#[derive(Debug)]
pub struct ImageRecord {
    id: String,
    name: String,
    original: Payload,
    preview: DisplayHandle,
    processed: Option<ProcessedImage>,
}

impl ImageRecord {
    /// Create a record for a source file, acquiring its preview handle.
    pub fn new(file: SourceFile, registry: &HandleRegistry) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: file.name,
            original: Payload::new(file.bytes, file.mime),
            preview: registry.acquire(),
            processed: None,
        }
    }

    /// Opaque record id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name of the original.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The original bytes.
    pub fn original(&self) -> &Payload {
        &self.original
    }

    /// Preview handle for the original.
    pub fn preview(&self) -> &DisplayHandle {
        &self.preview
    }

    /// The compressed result, once processed.
    pub fn processed(&self) -> Option<&ProcessedImage> {
        self.processed.as_ref()
    }

    /// Whether a compressed result is attached.
    pub fn is_processed(&self) -> bool {
        self.processed.is_some()
    }

    /// Attach a result. A record is processed at most once; later results
    /// are dropped and their handles released.
    pub fn attach(&mut self, processed: ProcessedImage) -> bool {
        if self.processed.is_some() {
            return false;
        }
        self.processed = Some(processed);
        true
    }

    /// Attach an engine result, acquiring its handle from the registry
    /// that issued the preview.
    pub fn attach_compressed(&mut self, out: CompressedImage) -> bool {
        if self.processed.is_some() {
            return false;
        }
        let handle = self.preview.sibling();
        self.attach(ProcessedImage::from_compressed(out, handle))
    }

    /// File name for the compressed output: `compressed_<stem>.<ext>` with
    /// the extension of the output format. Distinct records may share a name.
    pub fn output_name(&self) -> String {
        let stem = Path::new(&self.name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone());

        let ext = self
            .processed
            .as_ref()
            .and_then(|p| ImageFormat::from_mime(&p.payload.mime))
            .or_else(|| ImageFormat::from_mime(&self.original.mime))
            .and_then(|f| f.extensions().first().copied());

        match ext {
            Some(ext) => format!("{OUTPUT_PREFIX}{stem}.{ext}"),
            None => format!("{OUTPUT_PREFIX}{}", self.name),
        }
    }
}
