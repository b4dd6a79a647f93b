//! Thin HTTP transport for the portal exchange.
//!
//! Built directly on hyper's HTTP/1.1 connection primitives: one connection
//! per request, a spawned driver task, and a session layer that threads the
//! cookie jar and a bounded redirect budget through every hop. This is not a
//! general-purpose client; it carries exactly what the login handshake and
//! the report fetch need.

pub mod session;
pub(crate) mod stream;
