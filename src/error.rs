// SPDX-License-Identifier: MIT OR Apache-2.0
//! Module for error handling code.

use std::fmt::{Display, Formatter};
#[cfg(feature = "backtrace")]
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;

use thiserror::Error;

/// More convenient alias for `Box<dyn StdError + Send + Sync>`,
/// which shows up in a few signatures and structs.
type BoxedError = Box<dyn StdError + Send + Sync>;

/// Kinds of errors for [Error]. Use [ErrorKind::error] and [ErrorKind::error_from] to generate the
/// [Error] value for this ErrorKind.
#[derive(Debug)]
pub enum ErrorKind
{
    /// Device did not respond with a parseable identity record.
    IntrospectionFailed(/** port **/ String),

    /// Description lookup against the board registry failed.
    BoardUnknown(/** description **/ String),

    /// The firmware catalog has no matching artifact for this device.
    FirmwareMissing,

    /// The requested transport cannot handle this device/artifact pairing.
    UnsuitableTransport(/** why **/ String),

    /// The device did not enter bootloader mode within the timeout.
    BootloaderFailed,

    /// The transport driver reported a failure while programming.
    TransportFailed(/** why **/ String),

    /// More than one debug probe is attached and the user did not disambiguate.
    AmbiguousProbe(/** candidate ids **/ Vec<String>),

    /// The catalog database is missing or could not be opened.
    CatalogUnavailable,

    /// A required external binary (ESP-tool, probe CLI, OpenOCD, ...) was not found.
    ExternalToolMissing(/** tool name **/ String),

    /// Unhandled external error.
    External(ErrorSource),
}

impl ErrorKind
{
    /// Creates a new [Error] from this error kind.
    #[inline(always)]
    pub fn error(self) -> Error
    {
        Error::new(self, None)
    }

    /// Creates a new [Error] from this error kind, with the passed error as the source.
    #[inline(always)]
    pub fn error_from<E: StdError + Send + Sync + 'static>(self, source: E) -> Error
    {
        Error::new(self, Some(Box::new(source)))
    }
}

/// Constructs an [Error] for this [ErrorKind].
impl From<ErrorKind> for Error
{
    fn from(other: ErrorKind) -> Self
    {
        other.error()
    }
}

impl Display for ErrorKind
{
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result
    {
        use ErrorKind::*;
        match self {
            IntrospectionFailed(port) => write!(f, "device on {} did not respond with a parseable identity record", port)?,
            BoardUnknown(description) => write!(f, "no known board matches description {:?}", description)?,
            FirmwareMissing => write!(f, "no firmware artifact in the catalog matches this device")?,
            UnsuitableTransport(why) => write!(f, "requested transport is unsuitable for this device: {}", why)?,
            BootloaderFailed => write!(f, "device did not enter bootloader mode within the timeout")?,
            TransportFailed(why) => write!(f, "transport driver failed: {}", why)?,
            AmbiguousProbe(candidates) => {
                write!(f, "more than one debug probe matched, pick one of: {}", candidates.join(", "))?;
            },
            CatalogUnavailable => write!(f, "firmware catalog database is missing or could not be opened")?,
            ExternalToolMissing(tool) => write!(f, "required external tool '{}' was not found on PATH", tool)?,
            External(source) => {
                use ErrorSource::*;
                match source {
                    StdIo(e) => write!(f, "unhandled std::io::Error: {}", e)?,
                    Serial(e) => write!(f, "unhandled serial port error: {}", e)?,
                    Sqlite(e) => write!(f, "unhandled catalog database error: {}", e)?,
                    Http(e) => write!(f, "unhandled HTTP error: {}", e)?,
                    DfuNusb(e) => write!(f, "unhandled DFU error: {}", e)?,
                };
            },
        };

        Ok(())
    }
}

#[derive(Debug)]
/// Error type for mpflash operations. Easily constructed from [ErrorKind].
pub struct Error
{
    pub kind: ErrorKind,
    pub source: Option<BoxedError>,

    /// Stores the backtrace for this error.
    #[cfg(feature = "backtrace")]
    pub backtrace: Box<Backtrace>,

    /// A string for additional context about what was being attempted when this error occurred.
    ///
    /// Example: "resolving firmware for board NUCLEO_WB55".
    pub context: Option<String>,
}

impl Error
{
    #[inline(always)]
    pub fn new(kind: ErrorKind, source: Option<BoxedError>) -> Self
    {
        Self {
            kind,
            source,
            context: None,
            #[cfg(feature = "backtrace")]
            backtrace: Box::new(Backtrace::capture()),
        }
    }

    /// Add additional context about what was being attempted when this error occurred.
    pub fn with_ctx(mut self, ctx: &str) -> Self
    {
        self.context = Some(ctx.to_string());
        self
    }

    #[allow(dead_code)]
    pub fn without_ctx(mut self) -> Self
    {
        self.context = None;
        self
    }

    #[cfg(feature = "backtrace")]
    #[allow(dead_code)]
    fn backtrace(&self) -> Option<&Backtrace>
    {
        Some(&self.backtrace)
    }
}

impl Display for Error
{
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result
    {
        if let Some(ctx) = &self.context {
            write!(f, "(while {}): {}", ctx, self.kind)?;
        } else {
            write!(f, "{}", self.kind)?;
        }

        #[cfg(feature = "backtrace")]
        {
            if self.backtrace.status() == BacktraceStatus::Captured {
                write!(f, "\nBacktrace:\n{}", self.backtrace)?;
            }
        }

        if let Some(source) = &self.source {
            writeln!(f, "\nCaused by: {}", source)?;
        }

        Ok(())
    }
}

impl StdError for Error
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)>
    {
        self.source.as_deref().map(|e| e as &dyn StdError)
    }
}

impl From<std::io::Error> for Error
{
    fn from(other: std::io::Error) -> Self
    {
        ErrorKind::External(ErrorSource::StdIo(other)).error()
    }
}

impl From<serialport::Error> for Error
{
    fn from(other: serialport::Error) -> Self
    {
        ErrorKind::External(ErrorSource::Serial(other)).error()
    }
}

impl From<rusqlite::Error> for Error
{
    fn from(other: rusqlite::Error) -> Self
    {
        ErrorKind::External(ErrorSource::Sqlite(other)).error()
    }
}

impl From<reqwest::Error> for Error
{
    fn from(other: reqwest::Error) -> Self
    {
        ErrorKind::External(ErrorSource::Http(other)).error()
    }
}

impl From<dfu_core::Error<dfu_nusb::Error>> for Error
{
    fn from(other: dfu_core::Error<dfu_nusb::Error>) -> Self
    {
        ErrorKind::External(ErrorSource::DfuNusb(other)).error()
    }
}

/// Sources of external error in this library.
#[derive(Debug, Error)]
pub enum ErrorSource
{
    #[error(transparent)]
    StdIo(std::io::Error),

    #[error(transparent)]
    Serial(serialport::Error),

    #[error(transparent)]
    Sqlite(rusqlite::Error),

    #[error(transparent)]
    Http(reqwest::Error),

    #[error(transparent)]
    DfuNusb(dfu_core::Error<dfu_nusb::Error>),
}

/// Extension trait to enable getting the error kind from a Result<T, Error> with one method.
pub trait ResErrorKind<T>
{
    type Kind;
    fn err_kind(&self) -> Result<&T, &Self::Kind>;
}

impl<T> ResErrorKind<T> for Result<T, Error>
{
    type Kind = ErrorKind;

    fn err_kind(&self) -> Result<&T, &Self::Kind>
    {
        self.as_ref().map_err(|e| &e.kind)
    }
}

#[macro_export]
macro_rules! log_and_return
{
    ($err:expr) => {
        let err = $err;
        log::error!("{}", err);
        return Err(err);
    }
}

pub type Result<T> = std::result::Result<T, Error>;
