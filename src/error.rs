//! Typed error taxonomy for the modem client.
//!
//! Extraction failures are deliberately absent here: a garbled page degrades
//! to default values instead of aborting the telemetry cycle.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No device answered on any candidate address.
    #[error("no modem found (tried: {tried})")]
    Discovery { tried: String },

    /// The configured device address does not form a usable URL.
    #[error("invalid device address '{0}'")]
    InvalidAddress(String),

    /// Login page did not yield the crypto material needed for the handshake.
    #[error("cannot prepare login: {0}")]
    AuthSetup(String),

    /// The device rejected the submitted credential.
    #[error("device rejected credentials")]
    LoginFailed,

    /// An authenticated operation was attempted before login.
    #[error("session is not authenticated; call login first")]
    NotAuthenticated,

    /// An operation was attempted after logout or after the session failed.
    #[error("session is closed")]
    SessionClosed,

    /// Connection refused, timeout, or other wire-level failure.
    #[error("could not reach device: {0}")]
    Transport(#[from] reqwest::Error),

    /// The device variant does not expose this operation.
    #[error("operation '{0}' is not supported by this device")]
    UnsupportedOperation(&'static str),

    /// Discovery found a device family this build has no driver for.
    #[error("unsupported device family: {0}")]
    UnsupportedDevice(String),
}

pub type Result<T> = std::result::Result<T, Error>;
