//! Gateway errors.

use core::fmt::Debug;
use thiserror_no_std::Error;

/// Requested bit rate profile is not one of the supported names.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[error("unsupported bit rate")]
pub struct UnsupportedRate;

/// Filter operation not available on the configured filter variant.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[error("operation not supported by the {configured} filter")]
pub struct FilterKindMismatch {
    pub configured: &'static str,
}

/// Errors returned by [`Bridge`](crate::bridge::Bridge) control operations.
///
/// `C` and `N` are the CAN and network endpoint errors.
#[derive(Error, Debug)]
pub enum BridgeError<C: Debug, N: Debug> {
    /// The CAN transceiver could not be armed.
    #[error("CAN bus init error: {0:?}")]
    BusInit(C),

    /// The network endpoint could not be opened.
    #[error("network init error: {0:?}")]
    NetworkInit(N),

    #[error(transparent)]
    UnsupportedRate(#[from] UnsupportedRate),

    #[error(transparent)]
    FilterKind(#[from] FilterKindMismatch),

    #[error("bridge is not running")]
    NotRunning,

    #[error("bridge is already running")]
    AlreadyRunning,
}
