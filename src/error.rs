//! Structured error reporting.
//!
//! Every fallible operation in the loader returns a [`Result`] whose error
//! carries enough context to explain *what* went wrong and *where*, without
//! relying on panics or process-wide state. [`ErrorStack`] accumulates a
//! `(function, description, offset)` frame each time an error passes through
//! a parser boundary.

use std::fmt;

/// A single stack frame recorded as an [`Error`] unwinds through the loader.
#[derive(Clone, Debug)]
pub struct Frame {
    pub function: &'static str,
    pub description: String,
    pub source_offset: Option<u64>,
}

/// Accumulated unwind context for an [`Error`].
#[derive(Clone, Debug, Default)]
pub struct ErrorStack {
    frames: Vec<Frame>,
}

impl ErrorStack {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn push(&mut self, function: &'static str, description: impl Into<String>, source_offset: Option<u64>) {
        self.frames.push(Frame {
            function,
            description: description.into(),
            source_offset,
        });
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}

impl fmt::Display for ErrorStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in self.frames.iter().rev() {
            match frame.source_offset {
                Some(offset) => writeln!(f, "  in {} (offset {}): {}", frame.function, offset, frame.description)?,
                None => writeln!(f, "  in {}: {}", frame.function, frame.description)?,
            }
        }
        Ok(())
    }
}

/// Sub-classification of [`ErrorKind::BadIndex`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IndexFault {
    OutOfRange,
    WrongMapping,
}

/// The kind of failure that aborted a load.
#[derive(Clone, Debug)]
pub enum ErrorKind {
    Io(String),
    TruncatedFile,
    Cancelled,
    OutOfMemory,
    MemoryLimitExceeded { limit: usize, requested: usize },
    AllocationLimitExceeded { limit: usize },
    UnrecognizedFileFormat,
    UnsupportedVersion(u32),
    BadNodeNesting { depth: u32, max_depth: u32 },
    BadArrayType { expected: &'static str, found: char },
    BadArraySize { expected: usize, found: usize },
    BadValueType { expected: &'static str, found: char },
    DeflateError(String),
    InvalidUtf8,
    BadIndex { fault: IndexFault, index: i64, len: usize },
    MissingVertexPosition,
    DuplicateObjectId(i64),
    DuplicateOverride { element_id: u32, property: String },
    ThreadedAsciiParse,
    ElementConnectedToRoot { fbx_id: i64 },
}

/// A loader error: a [`ErrorKind`] plus the byte offset it was raised at (if
/// known) and the unwind stack gathered as it propagated.
#[derive(Clone, Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub offset: Option<u64>,
    pub stack: ErrorStack,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, offset: None, stack: ErrorStack::new() }
    }

    pub fn at(kind: ErrorKind, offset: u64) -> Self {
        Self { kind, offset: Some(offset), stack: ErrorStack::new() }
    }

    /// Pushes a frame of context and returns self, for use at `?` boundaries:
    /// `foo().map_err(|e| e.frame("parse_mesh", "reading Vertices"))?`
    pub fn frame(mut self, function: &'static str, description: impl Into<String>) -> Self {
        self.stack.push(function, description, self.offset);
        self
    }

    pub fn description(&self) -> String {
        match &self.kind {
            ErrorKind::Io(msg) => format!("I/O error: {msg}"),
            ErrorKind::TruncatedFile => "file truncated before expected end".to_string(),
            ErrorKind::Cancelled => "load cancelled by progress callback".to_string(),
            ErrorKind::OutOfMemory => "host allocator returned an error".to_string(),
            ErrorKind::MemoryLimitExceeded { limit, requested } => {
                format!("arena memory limit exceeded: limit={limit} requested={requested}")
            }
            ErrorKind::AllocationLimitExceeded { limit } => {
                format!("arena allocation count limit exceeded: limit={limit}")
            }
            ErrorKind::UnrecognizedFileFormat => "unrecognized file format".to_string(),
            ErrorKind::UnsupportedVersion(v) => format!("unsupported FBX version {v}"),
            ErrorKind::BadNodeNesting { depth, max_depth } => {
                format!("node nesting depth {depth} exceeds maximum {max_depth}")
            }
            ErrorKind::BadArrayType { expected, found } => {
                format!("expected array of `{expected}`, found element type `{found}`")
            }
            ErrorKind::BadArraySize { expected, found } => {
                format!("expected array of size {expected}, found {found}")
            }
            ErrorKind::BadValueType { expected, found } => {
                format!("expected value of type `{expected}`, found `{found}`")
            }
            ErrorKind::DeflateError(msg) => format!("DEFLATE decode error: {msg}"),
            ErrorKind::InvalidUtf8 => "invalid UTF-8 and unicode_error_handling=abort".to_string(),
            ErrorKind::BadIndex { fault, index, len } => match fault {
                IndexFault::OutOfRange => format!("index {index} out of range for table of length {len}"),
                IndexFault::WrongMapping => format!("index {index} invalid for mapping (table length {len})"),
            },
            ErrorKind::MissingVertexPosition => "mesh has no vertex position layer".to_string(),
            ErrorKind::DuplicateObjectId(id) => format!("duplicate object id {id}"),
            ErrorKind::DuplicateOverride { element_id, property } => {
                format!("duplicate override for element {element_id} property `{property}`")
            }
            ErrorKind::ThreadedAsciiParse => {
                "ASCII parsing does not support a thread pool for number parsing".to_string()
            }
            ErrorKind::ElementConnectedToRoot { fbx_id } => {
                format!("element {fbx_id} connected to the scene root, which is not allowed by the current policy")
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "{} (at byte offset {})", self.description(), offset)?,
            None => write!(f, "{}", self.description())?,
        }
        if !self.stack.frames().is_empty() {
            write!(f, "\n{}", self.stack)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(ErrorKind::Io(err.to_string()))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A warning: the same payload as an [`Error`] but demoted because the load
/// is tolerant. Promoted back to an `Error` when `LoadOptions::strict` is set.
#[derive(Clone, Debug)]
pub struct Warning {
    pub kind: ErrorKind,
    pub offset: Option<u64>,
}

impl Warning {
    pub fn from_error(err: &Error) -> Self {
        Warning { kind: err.kind.clone(), offset: err.offset }
    }

    pub fn description(&self) -> String {
        Error { kind: self.kind.clone(), offset: self.offset, stack: ErrorStack::new() }.description()
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}
