//! Error interface for this crate.
//!
//! Every error type in this crate implements [`Error`],
//! which extends [`std::error::Error`] with an optional help message.

use std::borrow::Cow;

/// Unified error interface for all errors in this crate.
pub trait Error: std::error::Error {
    /// A clarifying message to help aid someone in how to fix the message.
    ///
    /// By default this is `None`.
    fn help(&self) -> Option<Cow<str>> {
        None
    }
}

/// Formats an error (and its help message, if it has one) for display to a user.
///
/// ```
/// use lc3_forth::ast::IOffset;
/// use lc3_forth::err::report;
///
/// let err = IOffset::<5>::new(16).unwrap_err();
/// assert_eq!(report(&err), "error: value is too big for signed 5-bit integer\nhelp: the range for a signed 5-bit integer is [-16, 15]");
/// ```
pub fn report<E: Error + ?Sized>(err: &E) -> String {
    match err.help() {
        Some(help) => format!("error: {err}\nhelp: {help}"),
        None => format!("error: {err}"),
    }
}
