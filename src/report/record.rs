use serde::ser::{Serialize, SerializeSeq, Serializer};
use serde::Deserialize;

/// Column order on the wire: date, status, reserved, identifier, name,
/// institution, grade, group, reserved phone.
const COL_ID: usize = 3;
const COL_NAME: usize = 4;
const COL_GRADE: usize = 6;
const COL_GROUP: usize = 7;

/// One campus branch prefixes its group codes with this marker; it is
/// stripped during normalization.
const GROUP_MARKER: char = 'C';

/// One row of the unreported grid, as the JSON endpoint returns it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Record([String; 9]);

impl Record {
    pub fn new(columns: [String; 9]) -> Self {
        Self(columns)
    }

    pub fn id(&self) -> &str {
        &self.0[COL_ID]
    }

    pub fn name(&self) -> &str {
        &self.0[COL_NAME]
    }

    pub fn grade(&self) -> &str {
        &self.0[COL_GRADE]
    }

    pub fn group(&self) -> &str {
        &self.0[COL_GROUP]
    }

    pub(crate) fn normalize(&mut self) {
        if self.0[COL_GROUP].starts_with(GROUP_MARKER) {
            self.0[COL_GROUP].remove(0);
        }
    }
}

// Snapshot rows carry only the columns the report consumers read:
// identifier, name, institution, grade, group.
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(5))?;
        for column in &self.0[COL_ID..=COL_GROUP] {
            seq.serialize_element(column)?;
        }
        seq.end()
    }
}

/// Stable sort by (group, identifier), both ascending as strings. After this
/// runs, group boundaries are contiguous.
pub fn sort_records(records: &mut [Record]) {
    records.sort_by(|a, b| a.group().cmp(b.group()).then_with(|| a.id().cmp(b.id())));
}

/// Ordered list of distinct groups as they first appear in sorted input.
/// Empty input yields an empty vector.
pub fn distinct_groups(sorted: &[Record]) -> Vec<String> {
    let mut groups: Vec<String> = Vec::new();
    for record in sorted {
        if groups.last().map(String::as_str) != Some(record.group()) {
            groups.push(record.group().to_string());
        }
    }
    groups
}

/// Drop records whose group is not in `keep`. An empty filter keeps
/// everything. `keep` must be sorted ascending.
pub fn retain_groups(records: &mut Vec<Record>, keep: &[String]) {
    if keep.is_empty() {
        return;
    }
    records.retain(|record| {
        keep.binary_search_by(|group| group.as_str().cmp(record.group()))
            .is_ok()
    });
}
