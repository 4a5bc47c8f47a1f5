use std::io;

use bstr::BString;
use thiserror::Error;

pub type Result<T> = ::core::result::Result<T, SaneError>;

#[derive(Debug, Error)]
pub enum SaneError {
    #[error("i/o error: {0}")]
    Io(io::Error),

    #[error("transport closed")]
    TransportClosed,

    #[error("stream was truncated inside a framed unit")]
    TruncatedStream,

    #[error("server reported status {0} ({name})", name = status_name(*.0))]
    ProtocolStatus(i32),

    #[error("record does not fit the frame buffer")]
    ProtocolOverflow,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("'{0}' called in the wrong session state")]
    IllegalState(&'static str),

    #[error("image is not fully constructed")]
    IncompleteImage,

    #[error("unsupported combination of frames and depth")]
    UnsupportedImageLayout,

    #[error("authentication required for resource '{0}'")]
    AuthRequired(BString),
}

impl From<io::Error> for SaneError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected => SaneError::TransportClosed,
            _ => SaneError::Io(err),
        }
    }
}

// An EOF while a framed unit (word, string, record) is being read is a
// framing error, not a plain i/o failure.
pub(crate) fn truncated_on_eof(err: io::Error) -> SaneError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        SaneError::TruncatedStream
    } else {
        err.into()
    }
}

pub(crate) fn check_status(code: i32) -> Result<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(SaneError::ProtocolStatus(code))
    }
}

pub fn status_name(code: i32) -> &'static str {
    match code {
        0 => "good",
        1 => "unsupported",
        2 => "cancelled",
        3 => "device busy",
        4 => "invalid value",
        5 => "end of file",
        6 => "jammed",
        7 => "no docs",
        8 => "cover open",
        9 => "i/o error",
        10 => "no memory",
        11 => "access denied",
        _ => "unknown",
    }
}
