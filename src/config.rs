//! Configuration records loaded from JSON files.
//!
//! The loaders only enforce shape and the two ordering invariants the
//! pipeline relies on (sorted class filter, sorted time table); anything
//! beyond that is the operator's responsibility.

use crate::base::error::WatchError;
use crate::schedule::timetable::{sort_table, ScheduleEntry};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use url::Url;

/// Account and report identifiers for one portal user.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub username: String,
    pub password: String,
    /// Group filter; empty keeps every group. Sorted by the loader.
    #[serde(default)]
    pub class: Vec<String>,
    /// Widget id of the report grid.
    pub wid: String,
    /// Query key of the report grid.
    pub key: String,
    /// Snapshot output path.
    pub file: PathBuf,
    #[serde(default)]
    pub portal: PortalConfig,
}

/// Portal endpoints. Defaults match the live deployment; override in the
/// account file for staging or tests.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub auth_base: String,
    pub report_base: String,
    pub insecure_skip_verify: bool,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            auth_base: "http://authserver.hhu.edu.cn".into(),
            report_base: "http://form.hhu.edu.cn".into(),
            insecure_skip_verify: false,
        }
    }
}

impl PortalConfig {
    pub fn login_url(&self) -> String {
        format!("{}/authserver/login", self.auth_base)
    }

    pub fn logout_url(&self) -> String {
        format!("{}/authserver/logout", self.auth_base)
    }

    pub fn report_list_url(&self) -> String {
        format!("{}/pdc/form/list", self.report_base)
    }

    pub fn grid_url(&self) -> String {
        format!("{}/pdc/immediate/statisticsGrid", self.report_base)
    }

    pub fn report_host(&self) -> Result<String, WatchError> {
        let url = Url::parse(&self.report_base)
            .map_err(|_| WatchError::InvalidUrl(self.report_base.clone()))?;
        url.host_str()
            .map(str::to_string)
            .ok_or_else(|| WatchError::InvalidUrl(self.report_base.clone()))
    }
}

pub fn load_account(path: &Path) -> Result<Account, WatchError> {
    let file = File::open(path)?;
    let mut account: Account = serde_json::from_reader(BufReader::new(file))?;
    account.class.sort();
    Ok(account)
}

pub fn load_time_table(path: &Path) -> Result<Vec<ScheduleEntry>, WatchError> {
    let file = File::open(path)?;
    let mut table: Vec<ScheduleEntry> = serde_json::from_reader(BufReader::new(file))?;
    if table.is_empty() {
        return Err(WatchError::Config("time table is empty".into()));
    }
    sort_table(&mut table);
    Ok(table)
}
