use crate::auth::cipher::encrypt_credential;
use crate::auth::form::extract_hidden_fields;
use crate::base::context::OpContext;
use crate::base::error::WatchError;
use crate::client::PortalClient;
use crate::config::Account;
use crate::net::session::DEFAULT_MAX_REDIRECTS;
use std::time::Duration;
use tracing::debug;

/// Cookie that proves the auth server accepted the credentials.
pub const SESSION_COOKIE: &str = "iPlanetDirectoryPro";

const LOGOUT_TIMEOUT: Duration = Duration::from_secs(5);

impl PortalClient {
    /// Run the login handshake: fetch the login page, scrape its hidden
    /// fields, encrypt the password under the scraped key, POST the
    /// credentials, and verify the session cookie arrived.
    ///
    /// The credential POST follows exactly one redirect. The portal's
    /// authenticated redirect chain is longer, but the session cookie is
    /// issued on the first hop and following further is wasted round trips;
    /// this limit is part of the protocol, not tunable.
    pub async fn login(&mut self, ctx: &OpContext, account: &Account) -> Result<(), WatchError> {
        let login_url = self.portal.login_url();

        let page = self
            .session
            .get(ctx, &login_url, DEFAULT_MAX_REDIRECTS)
            .await?;
        let fields = extract_hidden_fields(page.text()?)?;
        let password = encrypt_credential(&account.password, &fields.encrypt_salt)?;

        let params = [
            ("username", account.username.as_str()),
            ("password", password.as_str()),
            ("lt", fields.session_token.as_str()),
            ("dllt", fields.auth_method.as_str()),
            ("execution", fields.execution.as_str()),
            ("_eventId", fields.event_id.as_str()),
            ("rmShown", fields.remember_shown.as_str()),
        ];
        self.session
            .post_form(ctx, &login_url, &params, 1, None)
            .await?;

        if self.session.jar().get_by_name(SESSION_COOKIE).is_none() {
            return Err(WatchError::CookieNotFound {
                name: SESSION_COOKIE.to_string(),
            });
        }
        debug!("login accepted");
        Ok(())
    }

    /// Best-effort logout.
    ///
    /// If the attempt deadline already fired, cleanup still runs under a
    /// fresh short deadline. An explicit cancellation skips it entirely:
    /// cancelled means no further network I/O.
    pub async fn logout(&mut self, ctx: &OpContext) -> Result<(), WatchError> {
        let ctx = if ctx.is_cancelled() {
            return Err(WatchError::Cancelled);
        } else if ctx.deadline_expired() {
            ctx.with_fresh_deadline(LOGOUT_TIMEOUT)
        } else {
            ctx.clone()
        };
        let logout_url = self.portal.logout_url();
        self.session.get(&ctx, &logout_url, 1).await.map(drop)
    }
}
