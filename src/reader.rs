use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

#[cfg(feature = "bz2")]
use bzip2::read::BzDecoder;
#[cfg(feature = "gzip")]
use flate2::read::MultiGzDecoder;
#[cfg(feature = "mmap")]
use memmap2::MmapOptions;
#[cfg(feature = "zstd")]
use zstd::stream::read::Decoder as ZstdDecoder;

use crate::store::StoreError;

/// Result alias for reader operations.
pub type ReaderResult<T> = Result<T, ReaderError>;

/// An error that can occur while reading or ingesting an annotation file.
///
/// Per-record variants ([`ReaderError::is_recoverable`]) are collected by the
/// ingesters and never abort a whole file; the rest are fatal.
#[derive(Debug)]
pub enum ReaderError {
    /// An I/O error.
    Io(io::Error),
    /// An error that occurred when memory-mapping a file.
    #[cfg(feature = "mmap")]
    Mmap(io::Error),
    /// An error that occurred when decoding a line.
    InvalidEncoding {
        /// The line number where the error occurred.
        line: usize,
        /// The error message.
        message: String,
    },
    /// An error that occurred when parsing a field.
    InvalidField {
        /// The line number where the error occurred.
        line: usize,
        /// The name of the field that could not be parsed.
        field: &'static str,
        /// The error message.
        message: String,
    },
    /// A record has an unexpected number of fields.
    UnexpectedFieldCount {
        /// The line number where the error occurred.
        line: usize,
        /// The expected number of fields.
        expected: usize,
        /// The actual number of fields.
        actual: usize,
    },
    /// A record carries neither an identifier nor a parent to derive one from.
    MissingIdentifier {
        /// The line number where the error occurred.
        line: usize,
    },
    /// The requested input or mode cannot be handled with the enabled features.
    Unsupported(String),
    /// The feature store rejected an insertion.
    Store(StoreError),
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderError::Io(err) => write!(f, "I/O error: {err}"),
            #[cfg(feature = "mmap")]
            ReaderError::Mmap(err) => write!(f, "mmap error: {err}"),
            ReaderError::InvalidEncoding { line, message } => {
                write!(f, "invalid UTF-8 at line {line}: {message}")
            }
            ReaderError::InvalidField {
                line,
                field,
                message,
            } => write!(f, "invalid {field} at line {line}: {message}"),
            ReaderError::UnexpectedFieldCount {
                line,
                expected,
                actual,
            } => write!(f, "line {line} had {actual} fields, expected {expected}"),
            ReaderError::MissingIdentifier { line } => write!(
                f,
                "line {line} has an attribute field without 'ID' or 'Parent'"
            ),
            ReaderError::Unsupported(msg) => write!(f, "unsupported input: {msg}"),
            ReaderError::Store(err) => write!(f, "store error: {err}"),
        }
    }
}

impl std::error::Error for ReaderError {
    /// Returns the source error, if any.
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReaderError::Io(err) => Some(err),
            #[cfg(feature = "mmap")]
            ReaderError::Mmap(err) => Some(err),
            ReaderError::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ReaderError {
    /// Creates a new `ReaderError` from an `io::Error`.
    fn from(err: io::Error) -> Self {
        ReaderError::Io(err)
    }
}

impl From<StoreError> for ReaderError {
    fn from(err: StoreError) -> Self {
        ReaderError::Store(err)
    }
}

impl ReaderError {
    /// Creates a new `ReaderError` for an invalid field.
    pub(crate) fn invalid_field(line: usize, field: &'static str, message: String) -> ReaderError {
        ReaderError::InvalidField {
            line,
            field,
            message,
        }
    }

    /// Creates a new `ReaderError` for an unexpected field count.
    pub(crate) fn unexpected_field_count(
        line: usize,
        expected: usize,
        actual: usize,
    ) -> ReaderError {
        ReaderError::UnexpectedFieldCount {
            line,
            expected,
            actual,
        }
    }

    /// Creates a new `ReaderError` for an invalid encoding.
    pub(crate) fn invalid_encoding(line: usize, message: impl Into<String>) -> ReaderError {
        ReaderError::InvalidEncoding {
            line,
            message: message.into(),
        }
    }

    /// Returns `true` if the error only concerns a single record.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ReaderError::InvalidEncoding { .. }
                | ReaderError::InvalidField { .. }
                | ReaderError::UnexpectedFieldCount { .. }
                | ReaderError::MissingIdentifier { .. }
        )
    }

    /// Returns the line the error refers to, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            ReaderError::InvalidEncoding { line, .. }
            | ReaderError::InvalidField { line, .. }
            | ReaderError::UnexpectedFieldCount { line, .. }
            | ReaderError::MissingIdentifier { line } => Some(*line),
            _ => None,
        }
    }
}

/// Anything an ingester can read from.
///
/// `Input::Auto` mirrors the permissive behaviour of the readers: the value is
/// opened as a path when one exists, and treated as literal content otherwise.
///
/// # Example
///
/// ```
/// use annoset::reader::{read_all, Input};
///
/// let text = read_all(Input::from("chr1\tsrc\tgene\t1\t10\t.\t+\t.\tID=g1")).unwrap();
/// assert!(text.starts_with("chr1"));
/// ```
pub enum Input {
    /// A filesystem path, opened with compression detection.
    Path(PathBuf),
    /// An already-open stream.
    Stream(Box<dyn Read + Send>),
    /// Raw text content.
    Text(String),
    /// A path if it resolves to a file, raw text otherwise.
    Auto(String),
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Input::Stream(_) => f.write_str("Stream(..)"),
            Input::Text(text) => write!(f, "Text({} bytes)", text.len()),
            Input::Auto(value) => write!(f, "Auto({} bytes)", value.len()),
        }
    }
}

impl From<&str> for Input {
    fn from(value: &str) -> Self {
        Input::Auto(value.to_string())
    }
}

impl From<String> for Input {
    fn from(value: String) -> Self {
        Input::Auto(value)
    }
}

impl From<&Path> for Input {
    fn from(value: &Path) -> Self {
        Input::Path(value.to_path_buf())
    }
}

impl From<PathBuf> for Input {
    fn from(value: PathBuf) -> Self {
        Input::Path(value)
    }
}

impl Input {
    /// Wraps an open stream.
    pub fn from_reader<T>(reader: T) -> Self
    where
        T: Read + Send + 'static,
    {
        Input::Stream(Box::new(reader))
    }

    /// Resolves `Auto` into either a `Path` or a `Text` input.
    fn resolve(self) -> Input {
        match self {
            Input::Auto(value) => {
                let looks_like_path = !value.contains('\n') && !value.is_empty();
                if looks_like_path && Path::new(&value).is_file() {
                    Input::Path(PathBuf::from(value))
                } else {
                    Input::Text(value)
                }
            }
            other => other,
        }
    }
}

/// The mode to use when reading a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderMode {
    /// Read the file through a buffered stream. This is the default.
    #[default]
    Default,
    /// Memory-map the file. Requires the `mmap` feature and an uncompressed input.
    Mmap,
}

/// The compression format of the input file.
#[cfg(any(feature = "gzip", feature = "zstd", feature = "bz2"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Automatically detect the compression format from the file extension.
    #[default]
    Auto,
    /// No compression.
    None,
    /// Gzip compression.
    Gzip,
    /// Zstandard compression.
    Zstd,
    /// Bzip2 compression.
    Bzip2,
}

/// Detect compression from file extension
#[cfg(any(feature = "gzip", feature = "zstd", feature = "bz2"))]
fn detect_compression_from_extension(path: &Path) -> Compression {
    let ext = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
    match ext {
        "gz" => Compression::Gzip,
        "zst" | "zstd" => Compression::Zstd,
        "bz2" | "bzip2" => Compression::Bzip2,
        _ => Compression::None,
    }
}

fn has_compressed_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| matches!(ext.to_str(), Some("gz" | "zst" | "zstd" | "bz2" | "bzip2")))
}

/// Options controlling how an [`Input`] is opened.
///
/// # Example
///
/// ```
/// use annoset::reader::{ReaderMode, ReaderOptions};
///
/// let options = ReaderOptions::new()
///     .mode(ReaderMode::Default)
///     .buffer_capacity(128 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    mode: ReaderMode,
    buffer_capacity: usize,
    #[cfg(any(feature = "gzip", feature = "zstd", feature = "bz2"))]
    compression: Compression,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            mode: ReaderMode::Default,
            buffer_capacity: 64 * 1024,
            #[cfg(any(feature = "gzip", feature = "zstd", feature = "bz2"))]
            compression: Compression::default(),
        }
    }
}

impl ReaderOptions {
    /// Creates a new options builder with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reading mode.
    pub fn mode(mut self, mode: ReaderMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the buffer capacity for streamed inputs.
    ///
    /// The default is 64 KB.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity.max(8 * 1024);
        self
    }

    /// Sets the compression format of path inputs.
    #[cfg(any(feature = "gzip", feature = "zstd", feature = "bz2"))]
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Opens a path as a stream.
    fn open_path_stream(&self, path: &Path) -> ReaderResult<Box<dyn Read + Send>> {
        #[cfg(any(feature = "gzip", feature = "zstd", feature = "bz2"))]
        {
            let file = File::open(path)?;
            let compression = match self.compression {
                Compression::Auto => detect_compression_from_extension(path),
                other => other,
            };

            return match compression {
                Compression::None | Compression::Auto => Ok(Box::new(file)),
                Compression::Gzip => {
                    #[cfg(feature = "gzip")]
                    {
                        Ok(Box::new(MultiGzDecoder::new(file)))
                    }
                    #[cfg(not(feature = "gzip"))]
                    {
                        Err(ReaderError::Unsupported(
                            "gzip compression requested but the `gzip` feature is disabled".into(),
                        ))
                    }
                }
                Compression::Zstd => {
                    #[cfg(feature = "zstd")]
                    {
                        Ok(Box::new(ZstdDecoder::new(file)?))
                    }
                    #[cfg(not(feature = "zstd"))]
                    {
                        Err(ReaderError::Unsupported(
                            "zstd compression requested but the `zstd` feature is disabled".into(),
                        ))
                    }
                }
                Compression::Bzip2 => {
                    #[cfg(feature = "bz2")]
                    {
                        Ok(Box::new(BzDecoder::new(file)))
                    }
                    #[cfg(not(feature = "bz2"))]
                    {
                        Err(ReaderError::Unsupported(
                            "bzip2 compression requested but the `bz2` feature is disabled".into(),
                        ))
                    }
                }
            };
        }

        #[cfg(not(any(feature = "gzip", feature = "zstd", feature = "bz2")))]
        {
            if has_compressed_extension(path) {
                return Err(ReaderError::Unsupported(
                    "ERROR: enable compression features to read compressed inputs".into(),
                ));
            }
            Ok(Box::new(File::open(path)?))
        }
    }

    /// Reads a whole path through a memory map.
    fn read_mmap(&self, path: &Path) -> ReaderResult<String> {
        decode_utf8(&self.read_mmap_bytes(path)?)
    }

    /// Copies a whole path out of a memory map without decoding it.
    fn read_mmap_bytes(&self, path: &Path) -> ReaderResult<Vec<u8>> {
        if has_compressed_extension(path) {
            return Err(ReaderError::Unsupported(
                "ERROR: compression is only supported in buffered mode".into(),
            ));
        }

        #[cfg(feature = "mmap")]
        {
            let file = File::open(path)?;
            let map = unsafe { MmapOptions::new().map(&file) }.map_err(ReaderError::Mmap)?;
            Ok(map.to_vec())
        }

        #[cfg(not(feature = "mmap"))]
        {
            let _ = path;
            Err(ReaderError::Unsupported(
                "ERROR: enable the `mmap` feature to use mmap mode".into(),
            ))
        }
    }
}

/// Decodes a byte buffer, reporting the line of the first invalid byte.
fn decode_utf8(bytes: &[u8]) -> ReaderResult<String> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_string()),
        Err(err) => {
            let valid = &bytes[..err.valid_up_to()];
            let line = memchr::memchr_iter(b'\n', valid).count() + 1;
            Err(ReaderError::invalid_encoding(line, err.to_string()))
        }
    }
}

/// Opens any input as a buffered line source.
///
/// Paths that cannot be resolved fall back to being read as literal text when
/// given as [`Input::Auto`].
pub fn open_or_wrap<I: Into<Input>>(input: I) -> ReaderResult<Box<dyn BufRead + Send>> {
    open_or_wrap_with(input, &ReaderOptions::default())
}

/// Like [`open_or_wrap`], with explicit reader options.
pub fn open_or_wrap_with<I: Into<Input>>(
    input: I,
    options: &ReaderOptions,
) -> ReaderResult<Box<dyn BufRead + Send>> {
    match input.into().resolve() {
        Input::Path(path) => match options.mode {
            ReaderMode::Default => {
                let stream = options.open_path_stream(&path)?;
                Ok(Box::new(BufReader::with_capacity(
                    options.buffer_capacity,
                    stream,
                )))
            }
            ReaderMode::Mmap => Ok(Box::new(Cursor::new(options.read_mmap_bytes(&path)?))),
        },
        Input::Stream(stream) => {
            if matches!(options.mode, ReaderMode::Mmap) {
                return Err(ReaderError::Unsupported(
                    "ERROR: mmap mode requires a filesystem path".into(),
                ));
            }
            Ok(Box::new(BufReader::with_capacity(
                options.buffer_capacity,
                stream,
            )))
        }
        Input::Text(text) | Input::Auto(text) => Ok(Box::new(Cursor::new(text))),
    }
}

/// Reads an input fully into memory, dropping carriage returns.
pub fn read_all<I: Into<Input>>(input: I) -> ReaderResult<String> {
    read_all_with(input, &ReaderOptions::default())
}

/// Like [`read_all`], with explicit reader options.
pub fn read_all_with<I: Into<Input>>(input: I, options: &ReaderOptions) -> ReaderResult<String> {
    let text = match input.into().resolve() {
        Input::Path(path) if matches!(options.mode, ReaderMode::Mmap) => {
            options.read_mmap(&path)?
        }
        Input::Text(text) | Input::Auto(text) => text,
        other => {
            let mut reader = open_or_wrap_with(other, options)?;
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes)?;
            decode_utf8(&bytes)?
        }
    };

    if text.contains('\r') {
        Ok(text.replace('\r', ""))
    } else {
        Ok(text)
    }
}

/// Returns `true` if the line should be skipped.
pub(crate) fn should_skip(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Numbered lines of a record stream.
///
/// A line that is not valid UTF-8 comes back as an `InvalidEncoding` error for
/// that line alone; the stream stays usable.
pub(crate) struct RecordLines<R> {
    reader: R,
    buf: Vec<u8>,
    line: usize,
}

impl<R: BufRead> RecordLines<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(1024),
            line: 0,
        }
    }

    /// Reads the next line without its terminator.
    ///
    /// # Errors
    ///
    /// Only I/O failures of the underlying reader are returned as `Err`.
    pub(crate) fn next_line(&mut self) -> ReaderResult<Option<(usize, ReaderResult<&str>)>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        self.line += 1;

        let mut end = self.buf.len();
        while end > 0 && matches!(self.buf[end - 1], b'\n' | b'\r') {
            end -= 1;
        }
        let text = std::str::from_utf8(&self.buf[..end])
            .map_err(|err| ReaderError::invalid_encoding(self.line, err.to_string()));
        Ok(Some((self.line, text)))
    }
}
