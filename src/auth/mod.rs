//! Login handshake against the portal's auth server.
//!
//! Three pieces, composed by [`login`]:
//!
//! - [`form`]: scrape the dynamically-generated hidden fields off the login
//!   page
//! - [`cipher`]: encrypt the password under the server-supplied key
//! - [`login`]: drive GET → extract → encrypt → POST → verify cookie

pub mod cipher;
pub mod form;
pub mod login;
