//! Portal client owning one authenticated session.
//!
//! A [`PortalClient`] is built fresh for every scheduled run with an empty
//! cookie jar, so nothing leaks between runs. Its operations live next to
//! the subsystem they talk to: the login handshake in [`crate::auth::login`],
//! the report fetch in [`crate::report::fetch`].

use crate::config::PortalConfig;
use crate::cookies::jar::CookieJar;
use crate::net::session::HttpSession;

pub struct PortalClient {
    pub(crate) session: HttpSession,
    pub(crate) portal: PortalConfig,
}

impl PortalClient {
    pub fn new(portal: PortalConfig) -> Self {
        Self {
            session: HttpSession::new(portal.insecure_skip_verify),
            portal,
        }
    }

    /// The session's cookie jar, for probing authentication state.
    pub fn cookies(&self) -> &CookieJar {
        self.session.jar()
    }
}
