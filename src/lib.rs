//! # formwatch
//!
//! Scheduled watcher for a campus report portal. Once per configured
//! time-of-day it logs into the portal's CAS-style auth server, pulls the
//! paginated unreported grid, and writes a normalized, sorted snapshot for
//! downstream rendering and delivery.
//!
//! ## Pipeline
//!
//! 1. **Login**: GET the login page, scrape its hidden state tokens,
//!    encrypt the password under the page-supplied key, POST the
//!    credentials, follow exactly one redirect, verify the session cookie.
//! 2. **Fetch**: seed the report subsystem's own session cookie, then page
//!    through the JSON grid endpoint, normalizing each record.
//! 3. **Order**: stable sort by (group, identifier); derive the distinct
//!    group list.
//! 4. **Persist/notify**: hand the snapshot to the persistence and
//!    notifier collaborators.
//!
//! The whole flow is sequential by design: the cookie exchanges must happen
//! in strict order, and the tool drives exactly one account at a time.
//!
//! ## Modules
//!
//! - [`base`] - error taxonomy and cancellation/deadline context
//! - [`cookies`] - the per-run session cookie jar
//! - [`net`] - thin hyper-based transport with cookie and redirect handling
//! - [`auth`] - login handshake: field scraping, credential cipher, state machine
//! - [`report`] - paginated grid fetch, record normalization and ordering
//! - [`schedule`] - daily time table and the bounded-retry runner
//! - [`config`] / [`snapshot`] - collaborator seams: JSON config in, JSON snapshot out

pub mod auth;
pub mod base;
pub mod client;
pub mod config;
pub mod cookies;
pub mod net;
pub mod report;
pub mod schedule;
pub mod snapshot;
