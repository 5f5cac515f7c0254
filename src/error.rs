use thiserror::Error;

#[derive(Error, Debug)]
pub enum OvbdError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Allocation refused: {0}")]
    Allocation(String),

    #[error("Unaligned request: offset={offset} count={count} (sector size {sector_size})")]
    Alignment {
        offset: u64,
        count: usize,
        sector_size: u32,
    },

    #[error("Short read at offset {offset}: wanted {wanted} bytes, got {got}")]
    ShortRead {
        offset: u64,
        wanted: usize,
        got: usize,
    },

    #[error("Decompression failed for block {block}: {reason}")]
    Decompress { block: u64, reason: String },

    #[error("Checksum mismatch in block {block}: stored {expected:#010x}, computed {actual:#010x}")]
    Checksum {
        block: u64,
        expected: u32,
        actual: u32,
    },

    #[error("Read aborted after {produced} bytes: {source}")]
    Partial {
        produced: usize,
        #[source]
        source: Box<OvbdError>,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl OvbdError {
    /// True for failures of the backing store or of block decoding, i.e. the
    /// errors that abort an in-progress read rather than an open.
    pub fn is_io_failure(&self) -> bool {
        match self {
            OvbdError::Io(_)
            | OvbdError::ShortRead { .. }
            | OvbdError::Decompress { .. }
            | OvbdError::Checksum { .. } => true,
            OvbdError::Partial { source, .. } => source.is_io_failure(),
            _ => false,
        }
    }

    /// Bytes already written to the caller's buffer when a read was aborted.
    pub fn produced(&self) -> usize {
        match self {
            OvbdError::Partial { produced, .. } => *produced,
            _ => 0,
        }
    }
}

pub type Result<T> = std::result::Result<T, OvbdError>;
