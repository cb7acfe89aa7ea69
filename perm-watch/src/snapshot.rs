//! Membership snapshots of the watched file and the diff between two of them.

use crate::auth::Session;
use crate::drive::{DriveClient, Permission};
use crate::error::{PermWatchError, PermWatchResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// A principal's resolvable address, compared by exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Who had access at one observation instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeSet<Identity>);

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a snapshot from raw permission entries. Entries without an email
    /// address (link sharing, domain grants) carry no identity and are dropped.
    pub fn from_permissions<'a>(permissions: impl IntoIterator<Item = &'a Permission>) -> Self {
        permissions
            .into_iter()
            .filter_map(|p| p.email_address.as_deref())
            .filter(|email| !email.is_empty())
            .map(Identity::from)
            .collect()
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.0.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.0.iter()
    }
}

impl FromIterator<Identity> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Identity>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for Snapshot {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().map(Identity::from).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeReport {
    pub added: Vec<Identity>,
    pub removed: Vec<Identity>,
    pub changed: bool
}

impl ChangeReport {
    pub fn unchanged() -> Self {
        Self::default()
    }
}

/// Computes the membership delta between two snapshots.
///
/// Both sides are ordered sets, so the output lists come back sorted and are
/// stable for a given pair of inputs.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> ChangeReport {
    let added: Vec<Identity> = current.0.difference(&previous.0).cloned().collect();
    let removed: Vec<Identity> = previous.0.difference(&current.0).cloned().collect();
    let changed = !added.is_empty() || !removed.is_empty();

    ChangeReport {
        added,
        removed,
        changed
    }
}

/// Reads every permission page for `file_id` and collapses it into a snapshot.
pub async fn fetch_snapshot(
    client: &dyn DriveClient,
    session: &Session,
    file_id: &str
) -> PermWatchResult<Snapshot> {
    if file_id.is_empty() {
        return Err(PermWatchError::InvalidTarget(
            "file id must not be empty".to_string()
        ));
    }

    let mut permissions = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = client
            .list_permissions(session, file_id, page_token.as_deref())
            .await?;
        permissions.extend(page.permissions);
        page_token = page.next_page_token;

        if page_token.is_none() {
            break;
        }
    }

    let snapshot = Snapshot::from_permissions(&permissions);
    debug!(
        file_id = %file_id,
        permissions = permissions.len(),
        identities = snapshot.len(),
        "Fetched permission snapshot"
    );

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn set(ids: &[Identity]) -> HashSet<String> {
        ids.iter().map(|i| i.to_string()).collect()
    }

    fn snapshot(ids: &[&str]) -> Snapshot {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_diff_reports_both_directions() {
        let previous = snapshot(&["a@x.com", "b@x.com", "c@x.com"]);
        let current = snapshot(&["b@x.com", "c@x.com", "d@x.com", "e@x.com"]);

        let report = diff(&previous, &current);
        assert!(report.changed);
        assert_eq!(
            set(&report.added),
            ["d@x.com", "e@x.com"].iter().map(|s| s.to_string()).collect()
        );
        assert_eq!(
            set(&report.removed),
            ["a@x.com"].iter().map(|s| s.to_string()).collect()
        );
    }

    #[test]
    fn test_diff_identical_sets_in_any_order() {
        let left = snapshot(&["z@y.com", "x@y.com", "m@y.com"]);
        let right = snapshot(&["m@y.com", "x@y.com", "z@y.com"]);

        let report = diff(&left, &right);
        assert!(!report.changed);
        assert!(report.added.is_empty());
        assert!(report.removed.is_empty());
    }

    #[test]
    fn test_diff_from_empty_marks_everything_added() {
        let current = snapshot(&["x@y.com", "z@y.com"]);
        let report = diff(&Snapshot::new(), &current);
        assert!(report.changed);
        assert_eq!(report.added.len(), 2);
        assert!(report.removed.is_empty());
    }

    #[test]
    fn test_diff_both_empty() {
        assert_eq!(
            diff(&Snapshot::new(), &Snapshot::new()),
            ChangeReport::unchanged()
        );
    }

    #[test]
    fn test_diff_matches_set_difference() {
        let samples: [&[&str]; 4] = [
            &[],
            &["a"],
            &["a", "b", "c"],
            &["c", "d"]
        ];

        for a in samples {
            for b in samples {
                let (sa, sb) = (snapshot(a), snapshot(b));
                let report = diff(&sa, &sb);
                let expected_added: HashSet<String> = b
                    .iter()
                    .filter(|id| !a.contains(*id))
                    .map(|s| s.to_string())
                    .collect();
                let expected_removed: HashSet<String> = a
                    .iter()
                    .filter(|id| !b.contains(*id))
                    .map(|s| s.to_string())
                    .collect();
                assert_eq!(set(&report.added), expected_added);
                assert_eq!(set(&report.removed), expected_removed);
                assert_eq!(
                    report.changed,
                    !expected_added.is_empty() || !expected_removed.is_empty()
                );
            }
        }
    }

    #[test]
    fn test_duplicates_collapse() {
        let snap = snapshot(&["x@y.com", "x@y.com"]);
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn test_from_permissions_drops_addressless_entries() {
        let permissions = vec![
            Permission {
                id: "anyoneWithLink".to_string(),
                email_address: None,
                role: Some("reader".to_string()),
                permission_type: Some("anyone".to_string())
            },
            Permission {
                id: "01".to_string(),
                email_address: Some("owner@y.com".to_string()),
                role: Some("owner".to_string()),
                permission_type: Some("user".to_string())
            },
        ];

        let snap = Snapshot::from_permissions(&permissions);
        assert_eq!(snap.len(), 1);
        assert!(snap.contains(&Identity::from("owner@y.com")));
    }
}
