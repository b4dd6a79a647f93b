//! Session cookie storage.
//!
//! One [`jar::CookieJar`] per authenticated run. The portal's login flow
//! spans two domains (the auth server and the report subsystem); the jar's
//! suffix-based domain scoping is what lets the session token issued on one
//! hop travel to the next.

pub mod jar;
