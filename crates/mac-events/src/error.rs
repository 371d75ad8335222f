use std::{
    error::Error as StdError,
    fmt::{Display, Formatter, Result as FmtResult},
    result::Result as StdResult,
};

use thiserror::Error;

use crate::Pid;

/// Convenient result type for handler construction.
pub type Result<T> = StdResult<T, Error>;

/// Errors surfaced when subscribing to Accessibility events.
///
/// Desktop subscriptions cannot fail. Malformed notifications and repeated
/// unregistration are not errors either; both are silent no-ops.
#[derive(Debug, Error)]
pub enum Error {
    /// `AXObserverCreate` returned a failure code for the target process.
    #[error("AXObserverCreate failed for pid {pid}: {source}")]
    ObserverCreate {
        /// Target process.
        pid: Pid,
        /// Code reported by the AX API.
        #[source]
        source: AxError,
    },

    /// `AXObserverCreate` reported success but produced no observer.
    #[error("AXObserverCreate returned a null observer for pid {pid}")]
    NullObserver {
        /// Target process.
        pid: Pid,
    },
}

/// Raw `AXError` code returned by the Accessibility API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxError(pub i32);

impl AxError {
    /// `kAXErrorFailure`
    pub const FAILURE: Self = Self(-25200);
    /// `kAXErrorIllegalArgument`
    pub const ILLEGAL_ARGUMENT: Self = Self(-25201);
    /// `kAXErrorInvalidUIElement`
    pub const INVALID_UI_ELEMENT: Self = Self(-25202);
    /// `kAXErrorInvalidUIElementObserver`
    pub const INVALID_OBSERVER: Self = Self(-25203);
    /// `kAXErrorCannotComplete`
    pub const CANNOT_COMPLETE: Self = Self(-25204);
    /// `kAXErrorNotificationUnsupported`
    pub const NOTIFICATION_UNSUPPORTED: Self = Self(-25207);
    /// `kAXErrorNotImplemented`
    pub const NOT_IMPLEMENTED: Self = Self(-25208);
    /// `kAXErrorNotificationAlreadyRegistered`
    pub const NOTIFICATION_ALREADY_REGISTERED: Self = Self(-25209);
    /// `kAXErrorNotificationNotRegistered`
    pub const NOTIFICATION_NOT_REGISTERED: Self = Self(-25210);
    /// `kAXErrorAPIDisabled`: the process is not trusted for Accessibility.
    pub const API_DISABLED: Self = Self(-25211);
    /// `kAXErrorNoValue`
    pub const NO_VALUE: Self = Self(-25212);

    /// Map a raw return code, treating `kAXErrorSuccess` (0) as `Ok`.
    pub fn check(code: i32) -> StdResult<(), Self> {
        if code == 0 { Ok(()) } else { Err(Self(code)) }
    }

    /// Raw numeric code.
    pub const fn code(self) -> i32 {
        self.0
    }

    /// Symbolic name of the code, or `"kAXErrorUnknown"`.
    pub const fn name(self) -> &'static str {
        match self.0 {
            -25200 => "kAXErrorFailure",
            -25201 => "kAXErrorIllegalArgument",
            -25202 => "kAXErrorInvalidUIElement",
            -25203 => "kAXErrorInvalidUIElementObserver",
            -25204 => "kAXErrorCannotComplete",
            -25205 => "kAXErrorAttributeUnsupported",
            -25206 => "kAXErrorActionUnsupported",
            -25207 => "kAXErrorNotificationUnsupported",
            -25208 => "kAXErrorNotImplemented",
            -25209 => "kAXErrorNotificationAlreadyRegistered",
            -25210 => "kAXErrorNotificationNotRegistered",
            -25211 => "kAXErrorAPIDisabled",
            -25212 => "kAXErrorNoValue",
            -25213 => "kAXErrorParameterizedAttributeUnsupported",
            -25214 => "kAXErrorNotEnoughPrecision",
            _ => "kAXErrorUnknown",
        }
    }
}

impl Display for AxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

impl StdError for AxError {}
