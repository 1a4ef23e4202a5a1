//! GridFS storage over the facades.
//!
//! [`GridFsBucket`] stores files as a metadata document in `<bucket>.files` plus the file
//! contents split across documents in `<bucket>.chunks`. What the bucket accepts as its
//! database and collections, and which cursor its `find` returns, comes from a
//! process-wide [`GridFsBindings`] slot:
//!
//! - The driver bindings (the default) only accept facades whose driver identity resolves
//!   (see [`masquerade`](crate::masquerade)) and stream query results.
//! - The integration bindings also accept plain facades over Store handles and list query
//!   results from a materialized cursor.
//!
//! The integration bindings are switched in for a scope with [`enabled_gridfs_integration`]
//! or [`with_gridfs_integration`]. A bucket takes a snapshot of the bindings when it is
//! created.
//!
//! # Example
//!
//! ```ignore
//! use docmock_async::{AsyncMockClient, gridfs::{GridFsBucket, enabled_gridfs_integration}};
//! use futures::io::Cursor;
//!
//! let _integration = enabled_gridfs_integration();
//! let bucket = GridFsBucket::new(&AsyncMockClient::new().database("files")?)?;
//!
//! let id = bucket.upload_from_stream("hello.txt", Cursor::new(b"hello".to_vec()), None).await?;
//! let mut contents = Vec::new();
//! bucket.download_to_stream(&id, &mut contents).await?;
//! ```

use std::{
    fmt,
    io,
    pin::Pin,
    task::{Context, Poll},
};

use bson::{Binary, Bson, DateTime, Document, doc, oid::ObjectId, spec::BinarySubtype};
use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, Cursor};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use crate::{
    collection::AsyncMockCollection,
    cursor::{AsyncCommandCursor, CursorFacade},
    database::AsyncMockDatabase,
    error::{FacadeError, FacadeResult},
    masquerade::Masquerade,
};

/// Default size of a stored chunk, 255 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 255 * 1024;

pub const DEFAULT_BUCKET_NAME: &str = "fs";

/// Builds the cursor a bucket's `find` returns.
pub type OpenCursor = fn(&AsyncMockCollection, Document) -> FacadeResult<Box<dyn CursorFacade>>;

/// What a [`GridFsBucket`] accepts and how it lists files.
#[derive(Clone, Copy)]
pub struct GridFsBindings {
    pub name: &'static str,
    pub accepts_database: fn(&AsyncMockDatabase) -> bool,
    pub accepts_collection: fn(&AsyncMockCollection) -> bool,
    pub open_cursor: OpenCursor,
}

impl fmt::Debug for GridFsBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridFsBindings").field("name", &self.name).finish_non_exhaustive()
    }
}

impl GridFsBindings {
    /// Bindings for driver types only.
    pub fn driver() -> Self {
        Self {
            name: "driver",
            accepts_database: |database| database.reported_type().is_some(),
            accepts_collection: |collection| collection.reported_type().is_some(),
            open_cursor: |collection, filter| {
                let cursor: Box<dyn CursorFacade> = Box::new(collection.find(filter, None));
                Ok(cursor)
            },
        }
    }

    /// Bindings that also accept facades over Store handles.
    pub fn integration() -> Self {
        Self {
            name: "integration",
            accepts_database: |_| true,
            accepts_collection: |_| true,
            open_cursor: |collection, filter| {
                let documents = collection.delegate().iter_documents(&filter)?;
                let cursor: Box<dyn CursorFacade> = Box::new(AsyncCommandCursor::new(documents));
                Ok(cursor)
            },
        }
    }
}

static BINDINGS: Lazy<RwLock<GridFsBindings>> = Lazy::new(|| RwLock::new(GridFsBindings::driver()));

/// The bindings new buckets are created with.
pub fn current_bindings() -> GridFsBindings {
    *BINDINGS.read()
}

fn swap_bindings(bindings: GridFsBindings) -> GridFsBindings {
    std::mem::replace(&mut *BINDINGS.write(), bindings)
}

/// Restores the previous [`GridFsBindings`] when dropped.
#[must_use = "the integration is disabled again as soon as the guard is dropped"]
#[derive(Debug)]
pub struct GridFsIntegration {
    previous: GridFsBindings,
}

impl Drop for GridFsIntegration {
    fn drop(&mut self) {
        swap_bindings(self.previous);
        debug!(bindings = self.previous.name, "restored GridFS bindings");
    }
}

/// Switches in the integration bindings until the returned guard is dropped.
pub fn enabled_gridfs_integration() -> GridFsIntegration {
    let previous = swap_bindings(GridFsBindings::integration());
    debug!(previous = previous.name, "enabled GridFS integration");
    GridFsIntegration { previous }
}

/// Runs `f` with the integration bindings in place, restoring them even if `f` panics.
pub fn with_gridfs_integration<T>(f: impl FnOnce() -> T) -> T {
    let _integration = enabled_gridfs_integration();
    f()
}

/// Options for [`GridFsBucket::with_options`].
#[derive(Debug, Clone)]
pub struct GridFsBucketOptions {
    pub bucket_name: String,
    pub chunk_size_bytes: usize,
}

impl Default for GridFsBucketOptions {
    fn default() -> Self {
        Self {
            bucket_name: DEFAULT_BUCKET_NAME.to_string(),
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// A GridFS bucket in a database.
#[derive(Debug, Clone)]
pub struct GridFsBucket {
    files: AsyncMockCollection,
    chunks: AsyncMockCollection,
    chunk_size: usize,
    bindings: GridFsBindings,
}

impl GridFsBucket {
    pub fn new(database: &AsyncMockDatabase) -> FacadeResult<Self> {
        Self::with_options(database, GridFsBucketOptions::default())
    }

    pub fn with_options(database: &AsyncMockDatabase, options: GridFsBucketOptions) -> FacadeResult<Self> {
        let bindings = current_bindings();

        if !(bindings.accepts_database)(database) {
            return Err(FacadeError::GridFs(format!(
                "database {} is not supported by the {} bindings",
                database.name(),
                bindings.name
            )));
        }

        if options.chunk_size_bytes == 0 {
            return Err(FacadeError::GridFs("chunk size must be positive".into()));
        }
        if i32::try_from(options.chunk_size_bytes).is_err() {
            return Err(FacadeError::GridFs(format!(
                "chunk size {} exceeds {} bytes",
                options.chunk_size_bytes,
                i32::MAX
            )));
        }

        let files = database.collection(&format!("{}.files", options.bucket_name))?;
        let chunks = database.collection(&format!("{}.chunks", options.bucket_name))?;

        for collection in [&files, &chunks] {
            if !(bindings.accepts_collection)(collection) {
                return Err(FacadeError::GridFs(format!(
                    "collection {} is not supported by the {} bindings",
                    collection.full_name(),
                    bindings.name
                )));
            }
        }

        Ok(Self {
            files,
            chunks,
            chunk_size: options.chunk_size_bytes,
            bindings,
        })
    }

    pub fn files(&self) -> &AsyncMockCollection {
        &self.files
    }

    pub fn chunks(&self) -> &AsyncMockCollection {
        &self.chunks
    }

    /// Stores the contents of `source` as a new file and returns its id.
    pub async fn upload_from_stream<R>(&self, filename: &str, mut source: R, metadata: Option<Document>) -> FacadeResult<Bson>
    where
        R: AsyncRead + Unpin,
    {
        let mut contents = Vec::new();
        source.read_to_end(&mut contents).await?;

        let id = Bson::ObjectId(ObjectId::new());

        let chunks = contents
            .chunks(self.chunk_size)
            .enumerate()
            .map(|(n, data)| -> FacadeResult<Document> {
                let n = i32::try_from(n)
                    .map_err(|_| FacadeError::GridFs(format!("file {filename} needs more than {} chunks", i32::MAX)))?;
                let data = Binary {
                    subtype: BinarySubtype::Generic,
                    bytes: data.to_vec(),
                };

                Ok(doc! { "_id": ObjectId::new(), "files_id": id.clone(), "n": n, "data": data })
            })
            .collect::<FacadeResult<Vec<_>>>()?;

        let length = i64::try_from(contents.len())
            .map_err(|_| FacadeError::GridFs(format!("file {filename} is too large")))?;
        let chunk_size = i32::try_from(self.chunk_size)
            .map_err(|_| FacadeError::GridFs(format!("chunk size {} exceeds {} bytes", self.chunk_size, i32::MAX)))?;
        let mut file = doc! {
            "_id": id.clone(),
            "length": length,
            "chunkSize": chunk_size,
            "uploadDate": DateTime::now(),
            "filename": filename,
        };
        if let Some(metadata) = metadata {
            file.insert("metadata", metadata);
        }

        if !chunks.is_empty() {
            self.chunks.insert_many(chunks).await?;
        }

        if let Err(err) = self.files.insert_one(file).await {
            debug!(bucket = %self.files.full_name(), filename, "removing chunks of rejected GridFS file");
            self.chunks.delete_many(doc! { "files_id": id.clone() }).await?;
            return Err(err);
        }

        debug!(bucket = %self.files.full_name(), filename, length = contents.len(), "uploaded GridFS file");
        Ok(id)
    }

    /// Opens the file `id` for reading.
    pub async fn open_download_stream(&self, id: &Bson) -> FacadeResult<GridFsDownloadStream> {
        let file = self
            .files
            .find_one(doc! { "_id": id.clone() }, None)
            .await?
            .ok_or_else(|| FacadeError::FileNotFound(id.clone()))?;

        let length = file_size(&file, "length").unwrap_or(0);
        let chunk_size = file_size(&file, "chunkSize").unwrap_or(self.chunk_size as u64).max(1);
        let expected = length.div_ceil(chunk_size);

        let mut cursor = self.chunks.find(doc! { "files_id": id.clone() }, None);
        let chunks = cursor.sort(doc! { "n": 1 }).to_list(None).await?;

        if chunks.len() as u64 != expected {
            return Err(FacadeError::GridFs(format!(
                "file {id} has {} chunks, expected {expected}",
                chunks.len()
            )));
        }

        let mut contents = Vec::new();
        for (n, chunk) in chunks.iter().enumerate() {
            if chunk.get_i32("n").ok().and_then(|value| usize::try_from(value).ok()) != Some(n) {
                return Err(FacadeError::GridFs(format!("missing chunk {n} of file {id}")));
            }

            match chunk.get("data") {
                Some(Bson::Binary(data)) => contents.extend_from_slice(&data.bytes),
                _ => return Err(FacadeError::GridFs(format!("chunk {n} of file {id} holds no data"))),
            }
        }

        if contents.len() as u64 != length {
            return Err(FacadeError::GridFs(format!(
                "file {id} has {} bytes, expected {length}",
                contents.len()
            )));
        }

        Ok(GridFsDownloadStream {
            file,
            contents: Cursor::new(contents),
        })
    }

    /// Writes the contents of the file `id` to `destination`.
    pub async fn download_to_stream<W>(&self, id: &Bson, mut destination: W) -> FacadeResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let stream = self.open_download_stream(id).await?;
        destination.write_all(stream.contents.get_ref()).await?;
        destination.flush().await?;
        Ok(())
    }

    /// Lists the file documents matching `filter`.
    pub fn find(&self, filter: Document) -> FacadeResult<Box<dyn CursorFacade>> {
        (self.bindings.open_cursor)(&self.files, filter)
    }

    /// Removes the file `id` and its chunks.
    pub async fn delete(&self, id: &Bson) -> FacadeResult<()> {
        let removed = self.files.delete_one(doc! { "_id": id.clone() }).await?;
        self.chunks.delete_many(doc! { "files_id": id.clone() }).await?;

        if removed.deleted_count == 0 {
            return Err(FacadeError::FileNotFound(id.clone()));
        }

        Ok(())
    }
}

fn file_size(file: &Document, key: &str) -> Option<u64> {
    match file.get(key)? {
        Bson::Int32(value) => u64::try_from(*value).ok(),
        Bson::Int64(value) => u64::try_from(*value).ok(),
        _ => None,
    }
}

/// Contents of a stored file, readable as an [`AsyncRead`].
#[derive(Debug)]
pub struct GridFsDownloadStream {
    file: Document,
    contents: Cursor<Vec<u8>>,
}

impl GridFsDownloadStream {
    /// The file's document in `<bucket>.files`.
    pub fn file(&self) -> &Document {
        &self.file
    }

    pub fn filename(&self) -> Option<&str> {
        self.file.get_str("filename").ok()
    }

    pub fn length(&self) -> usize {
        self.contents.get_ref().len()
    }
}

impl AsyncRead for GridFsDownloadStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().contents).poll_read(cx, buf)
    }
}
