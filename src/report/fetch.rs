use crate::base::context::OpContext;
use crate::base::error::WatchError;
use crate::base::PORTAL_UTC_OFFSET;
use crate::client::PortalClient;
use crate::net::session::DEFAULT_MAX_REDIRECTS;
use crate::report::record::Record;
use serde::Deserialize;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::debug;

const PAGE_SIZE: u32 = 200;
const ACCEPT_JSON: &str = "application/json, text/javascript, */*; q=0.01";

/// Report subsystem's session cookie, issued on the listing GET.
pub const REPORT_SESSION_COOKIE: &str = "JSESSIONID";

/// One page of the unreported grid. Field names are the portal's wire
/// contract.
#[derive(Debug, Deserialize)]
struct GridPage {
    #[serde(rename = "curPage")]
    current_page: u32,
    #[serde(rename = "isReported", default)]
    is_reported: bool,
    #[serde(rename = "jexcelDatas", default)]
    records: Vec<Record>,
    #[serde(rename = "maxPage")]
    max_page: u32,
    #[serde(rename = "totalNum", default)]
    total: u32,
}

impl PortalClient {
    /// Hit the report listing once so the subsystem issues its own session
    /// cookie. The response body is irrelevant; only the cookie matters.
    pub async fn establish_report_session(&mut self, ctx: &OpContext) -> Result<(), WatchError> {
        let listing_url = self.portal.report_list_url();
        self.session
            .get(ctx, &listing_url, DEFAULT_MAX_REDIRECTS)
            .await?;

        let report_host = self.portal.report_host()?;
        if self
            .session
            .jar()
            .get_by_domain_suffix(&report_host)
            .is_none()
        {
            return Err(WatchError::CookieNotFound {
                name: REPORT_SESSION_COOKIE.to_string(),
            });
        }
        Ok(())
    }

    /// Page through the grid endpoint and return every record, normalized.
    ///
    /// The fetch is all-or-nothing: a transport or decode failure on any page
    /// discards everything gathered so far.
    pub async fn fetch_report(
        &mut self,
        ctx: &OpContext,
        wid: &str,
        key: &str,
    ) -> Result<Vec<Record>, WatchError> {
        let grid_url = self.portal.grid_url();
        let date = report_date(OffsetDateTime::now_utc())?;
        let page_size = PAGE_SIZE.to_string();

        let mut records = Vec::new();
        let mut page: u32 = 1;
        let mut max_page: u32 = 1;
        while page <= max_page {
            let page_value = page.to_string();
            let params = [
                ("wid", wid),
                ("dept", ""),
                ("inputDate", date.as_str()),
                ("key", key),
                ("page", page_value.as_str()),
                ("pagesize", page_size.as_str()),
            ];
            let response = self
                .session
                .post_form(ctx, &grid_url, &params, DEFAULT_MAX_REDIRECTS, Some(ACCEPT_JSON))
                .await?;
            let grid: GridPage = response.json()?;
            max_page = grid.max_page;
            debug!(
                page = grid.current_page,
                max_page,
                total = grid.total,
                reported = grid.is_reported,
                "grid page fetched"
            );
            records.extend(grid.records.into_iter().map(|mut record| {
                record.normalize();
                record
            }));
            page += 1;
        }
        Ok(records)
    }
}

/// Today in the portal's zone, formatted the way the grid endpoint expects.
fn report_date(now: OffsetDateTime) -> Result<String, WatchError> {
    let format = format_description!("[year]-[month]-[day]");
    now.to_offset(PORTAL_UTC_OFFSET)
        .format(&format)
        .map_err(|_| WatchError::Encoding("report date format"))
}
