use crate::output;
use perm_watch::{ChangeReport, PermWatchError, ReportSink, Snapshot};
use tracing::info;

/// Prints change reports to the terminal as they arrive.
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn render(file_id: &str, report: &ChangeReport, current: &Snapshot) -> Vec<String> {
        let mut lines = vec![format!("Permissions changed on {}", file_id)];
        lines.extend(report.added.iter().map(|e| output::member_line('+', e.as_str())));
        lines.extend(report.removed.iter().map(|e| output::member_line('-', e.as_str())));
        lines.push(format!("Current users ({}):", current.len()));
        lines.extend(current.iter().map(|e| output::member_line(' ', e.as_str())));
        lines
    }
}

impl ReportSink for ConsoleSink {
    fn report(&self, file_id: &str, report: &ChangeReport, current: &Snapshot) {
        if !report.changed {
            info!(file_id = %file_id, members = current.len(), "No membership change");
            return;
        }

        info!(
            file_id = %file_id,
            added = report.added.len(),
            removed = report.removed.len(),
            "Membership changed"
        );
        let mut lines = Self::render(file_id, report, current).into_iter();
        if let Some(title) = lines.next() {
            println!();
            output::subheader(&title);
        }
        for line in lines {
            println!("{}", line);
        }
    }

    fn failure(&self, file_id: &str, error: &PermWatchError) {
        output::error(&format!("Could not refresh permissions of {}: {}", file_id, error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perm_watch::diff;

    fn snapshot(ids: &[&str]) -> Snapshot {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_render_lists_changes_then_members() {
        let previous = snapshot(&["gone@y.com", "stay@y.com"]);
        let current = snapshot(&["new@y.com", "stay@y.com"]);
        let report = diff(&previous, &current);

        let lines = ConsoleSink::render("file-1", &report, &current);
        assert_eq!(lines[0], "Permissions changed on file-1");
        assert!(lines[1].contains("new@y.com"));
        assert!(lines[2].contains("gone@y.com"));
        assert_eq!(lines[3], "Current users (2):");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_report_does_not_panic() {
        let current = snapshot(&["x@y.com"]);
        ConsoleSink.report("file-1", &diff(&Snapshot::new(), &current), &current);
        ConsoleSink.report("file-1", &ChangeReport::unchanged(), &current);
        ConsoleSink.failure(
            "file-1",
            &PermWatchError::AuthFailure("expired".to_string())
        );
    }
}
