use chrono::{DateTime, NaiveDateTime};
use tracker_core::{
    AccountRow, AppViewModel, Command, CredentialStatus, MigrationRowView, MigrationStatus,
    Notification, NotificationLevel, View,
};

use super::cli::Screen;

pub fn render(screen: &Screen, view: &AppViewModel) -> Vec<String> {
    match screen.view {
        View::Dashboard => render_dashboard(view),
        View::History { filter } => render_history(view, filter),
        View::Detail(id) => match view.migration(id) {
            Some(row) => render_detail(row),
            None => vec![format!("Migration {id}: loading...")],
        },
        View::Settings => render_settings(view),
    }
}

pub fn notification_line(notification: &Notification) -> String {
    let tag = match notification.level {
        NotificationLevel::Success => "ok",
        NotificationLevel::Error => "error",
    };
    format!("[{tag}] {}", notification.text)
}

fn render_dashboard(view: &AppViewModel) -> Vec<String> {
    let mut lines = account_lines(view);
    lines.push(String::new());
    match view.active_migration.and_then(|id| view.migration(id)) {
        Some(row) => {
            lines.push("Active migration:".to_string());
            lines.extend(render_detail(row));
        }
        None if view.creating_migration => lines.push("Creating a migration...".to_string()),
        None if view.can_create_migration => {
            lines.push("No active migration. Type `new` to start one.".to_string())
        }
        None => lines.push("No active migration.".to_string()),
    }
    lines.push(String::new());
    lines.push(format!("Migrations ({}):", view.migrations.len()));
    lines.extend(view.migrations.iter().map(summary_line));
    lines
}

fn render_settings(view: &AppViewModel) -> Vec<String> {
    let mut lines = account_lines(view);
    lines.push("Accounts are linked and reconnected in the web app.".to_string());
    lines
}

fn account_lines(view: &AppViewModel) -> Vec<String> {
    let Some(accounts) = &view.accounts else {
        return vec!["Linked accounts: checking...".to_string()];
    };
    let mut lines = vec!["Linked accounts:".to_string()];
    lines.extend(accounts.iter().map(account_line));
    lines
}

fn account_line(account: &AccountRow) -> String {
    let status = match account.status {
        CredentialStatus::Connected => "connected",
        CredentialStatus::Configured => "configured",
        CredentialStatus::Expired => "expired, reconnect it",
        CredentialStatus::Error => "error, reconnect it",
        CredentialStatus::NotConfigured => "not connected",
    };
    format!("  {:<14} {status}", account.label)
}

fn render_history(view: &AppViewModel, filter: Option<MigrationStatus>) -> Vec<String> {
    let rows: Vec<String> = view
        .migrations
        .iter()
        .filter(|row| filter.is_none_or(|status| row.status == status))
        .map(summary_line)
        .collect();
    if rows.is_empty() {
        return vec!["No migrations yet.".to_string()];
    }
    rows
}

fn summary_line(row: &MigrationRowView) -> String {
    let mut line = format!(
        "#{:<5} {:<12} {:>3}%  {}/{} migrated, {} failed",
        row.id,
        row.status.as_str(),
        row.progress_percent,
        row.migrated_count,
        row.total_count,
        row.failed_count
    );
    if let Some(duration) = duration_text(row.started_at.as_deref(), row.completed_at.as_deref()) {
        line.push_str(&format!(", took {duration}"));
    }
    line
}

fn render_detail(row: &MigrationRowView) -> Vec<String> {
    let mut lines = vec![
        format!("Migration #{} [{}]", row.id, row.status.as_str()),
        format!(
            "  {} {}% ({}/{} migrated, {} failed)",
            progress_bar(row.progress_percent),
            row.progress_percent,
            row.migrated_count,
            row.total_count,
            row.failed_count
        ),
    ];
    if let Some(item) = &row.current_item_name {
        lines.push(format!("  Current: {item}"));
    }
    if let Some(speed) = row.speed {
        lines.push(format!("  Speed: {speed:.1} MB/s"));
    }
    if let Some(minutes) = row.estimated_remaining_minutes {
        lines.push(format!("  Remaining: ~{}", minutes_text(minutes.round() as i64)));
    }
    if let Some(error) = &row.error_message {
        lines.push(format!("  Error: {error}"));
    }
    if let Some(duration) = duration_text(row.started_at.as_deref(), row.completed_at.as_deref()) {
        lines.push(format!("  Duration: {duration}"));
    }

    let source = if row.live { "live" } else { "polling only" };
    let tracking = if row.polling || row.live {
        source
    } else {
        "idle"
    };
    lines.push(format!("  Updates: {tracking}"));

    if let Some(command) = row.command_in_flight {
        lines.push(format!("  Waiting for server to {command}..."));
    } else if row.awaiting_cancel_confirmation {
        lines.push("  Cancel requested; confirm with y / n.".to_string());
    } else if !row.actions.is_empty() {
        lines.push(format!("  Actions: {}", actions_text(&row.actions)));
    }
    lines
}

fn actions_text(actions: &[Command]) -> String {
    actions
        .iter()
        .map(|command| match command {
            Command::Start => "[s]tart",
            Command::Pause => "[p]ause",
            Command::Resume => "[r]esume",
            Command::Cancel => "[c]ancel",
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn progress_bar(percent: u8) -> String {
    const WIDTH: usize = 20;
    let filled = usize::from(percent.min(100)) * WIDTH / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(WIDTH - filled))
}

/// Elapsed time between two service timestamps, if both parse.
pub fn duration_text(started_at: Option<&str>, completed_at: Option<&str>) -> Option<String> {
    let started = parse_timestamp(started_at?)?;
    let completed = parse_timestamp(completed_at?)?;
    let minutes = (completed - started).num_minutes();
    (minutes >= 0).then(|| minutes_text(minutes))
}

pub fn minutes_text(minutes: i64) -> String {
    if minutes < 60 {
        format!("{minutes} minutes")
    } else {
        format!("{}h {}min", minutes / 60, minutes % 60)
    }
}

// The service sends naive ISO timestamps; accept RFC 3339 too.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|at| at.naive_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: MigrationStatus) -> MigrationRowView {
        MigrationRowView {
            id: 4,
            status,
            total_count: 200,
            migrated_count: 50,
            failed_count: 1,
            progress_percent: 25,
            current_item_name: Some("IMG_0001.jpg".to_string()),
            speed: Some(2.5),
            estimated_remaining_minutes: Some(90.0),
            started_at: None,
            completed_at: None,
            error_message: None,
            actions: Command::available_for(status),
            command_in_flight: None,
            awaiting_cancel_confirmation: false,
            polling: true,
            live: false,
        }
    }

    #[test]
    fn durations_use_minutes_then_hours() {
        assert_eq!(minutes_text(0), "0 minutes");
        assert_eq!(minutes_text(59), "59 minutes");
        assert_eq!(minutes_text(135), "2h 15min");
        assert_eq!(
            duration_text(Some("2024-05-01T09:00:00"), Some("2024-05-01T10:05:30.5")),
            Some("1h 5min".to_string())
        );
        assert_eq!(
            duration_text(Some("2024-05-01T09:00:00+00:00"), Some("2024-05-01T09:42:00Z")),
            Some("42 minutes".to_string())
        );
        assert_eq!(duration_text(Some("2024-05-01T09:00:00"), None), None);
        assert_eq!(duration_text(Some("yesterday"), Some("2024-05-01T09:00:00")), None);
    }

    #[test]
    fn detail_shows_progress_and_actions() {
        let lines = render_detail(&row(MigrationStatus::InProgress));

        assert_eq!(lines[0], "Migration #4 [in_progress]");
        assert_eq!(lines[1], "  [#####---------------] 25% (50/200 migrated, 1 failed)");
        assert!(lines.contains(&"  Speed: 2.5 MB/s".to_string()));
        assert!(lines.contains(&"  Remaining: ~1h 30min".to_string()));
        assert!(lines.contains(&"  Updates: polling only".to_string()));
        assert_eq!(lines.last().unwrap(), "  Actions: [p]ause [c]ancel");
    }

    #[test]
    fn history_filter_and_empty_state() {
        let view = AppViewModel {
            migrations: vec![row(MigrationStatus::Paused), {
                let mut done = row(MigrationStatus::Completed);
                done.id = 2;
                done
            }],
            ..AppViewModel::default()
        };

        let paused = render_history(&view, Some(MigrationStatus::Paused));
        assert_eq!(paused.len(), 1);
        assert!(paused[0].starts_with("#4 "));

        let failed = render_history(&view, Some(MigrationStatus::Failed));
        assert_eq!(failed, vec!["No migrations yet.".to_string()]);
    }

    fn account(service: &str, label: &str, status: CredentialStatus) -> AccountRow {
        AccountRow {
            service: service.to_string(),
            label: label.to_string(),
            status,
        }
    }

    #[test]
    fn dashboard_shows_accounts_and_create_hint() {
        let checking = render_dashboard(&AppViewModel::default());
        assert_eq!(checking[0], "Linked accounts: checking...");
        assert!(checking.contains(&"No active migration.".to_string()));

        let view = AppViewModel {
            accounts: Some(vec![
                account("google_drive", "Google Drive", CredentialStatus::Connected),
                account("icloud", "iCloud", CredentialStatus::Expired),
            ]),
            can_create_migration: true,
            ..AppViewModel::default()
        };
        let lines = render_dashboard(&view);
        assert_eq!(
            lines[..3],
            [
                "Linked accounts:".to_string(),
                "  Google Drive   connected".to_string(),
                "  iCloud         expired, reconnect it".to_string(),
            ]
        );
        assert!(lines.contains(&"No active migration. Type `new` to start one.".to_string()));

        let creating = AppViewModel {
            creating_migration: true,
            ..view
        };
        assert!(render_dashboard(&creating).contains(&"Creating a migration...".to_string()));
    }

    #[test]
    fn settings_lists_accounts() {
        let view = AppViewModel {
            accounts: Some(vec![account(
                "icloud",
                "iCloud",
                CredentialStatus::NotConfigured,
            )]),
            ..AppViewModel::default()
        };
        let screen = Screen {
            view: View::Settings,
            redirect: None,
        };

        assert_eq!(
            render(&screen, &view),
            vec![
                "Linked accounts:".to_string(),
                "  iCloud         not connected".to_string(),
                "Accounts are linked and reconnected in the web app.".to_string(),
            ]
        );
    }

    #[test]
    fn pending_detail_offers_start() {
        let mut pending = row(MigrationStatus::Pending);
        pending.polling = false;
        let lines = render_detail(&pending);
        assert!(lines.contains(&"  Updates: idle".to_string()));
        assert_eq!(lines.last().unwrap(), "  Actions: [s]tart [c]ancel");
    }

    #[test]
    fn notifications_are_tagged() {
        assert_eq!(
            notification_line(&Notification::error("Could not connect iCloud. Try again.")),
            "[error] Could not connect iCloud. Try again."
        );
    }
}
