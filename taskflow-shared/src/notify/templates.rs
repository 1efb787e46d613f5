/// HTML email templates
///
/// Every interpolated value that comes from users (titles, descriptions,
/// names) is HTML-escaped.

use super::EmailMessage;
use crate::models::task::{DigestCounts, TaskPriority};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Task fields the templates need
#[derive(Debug, Clone)]
pub struct TaskEmail {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub due_date: DateTime<Utc>,
}

impl From<&crate::models::task::Task> for TaskEmail {
    fn from(task: &crate::models::task::Task) -> Self {
        Self {
            id: task.id,
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority,
            due_date: task.due_date,
        }
    }
}

impl From<&crate::models::task::ReminderCandidate> for TaskEmail {
    fn from(candidate: &crate::models::task::ReminderCandidate) -> Self {
        Self {
            id: candidate.task_id,
            title: candidate.title.clone(),
            description: candidate.description.clone(),
            priority: candidate.priority,
            due_date: candidate.due_date,
        }
    }
}

/// Renders notification emails with links into the frontend
#[derive(Debug, Clone)]
pub struct Templates {
    frontend_url: String,
}

impl Templates {
    pub fn new(frontend_url: impl Into<String>) -> Self {
        Self {
            frontend_url: frontend_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn task_link(&self, id: Uuid) -> String {
        format!("{}/tasks/{}", self.frontend_url, id)
    }

    pub fn task_assigned(&self, to: &str, first_name: &str, task: &TaskEmail) -> EmailMessage {
        let body = format!(
            r#"<h2 style="color:#1f2937;">New Task Assigned</h2>
<p>Hi {name},</p>
<p>You have been assigned a new task:</p>
{card}
{button}"#,
            name = escape_html(first_name),
            card = task_card(task, "#6366f1", "Due"),
            button = button(&self.task_link(task.id), "View Task", "#6366f1"),
        );

        EmailMessage {
            to: to.to_string(),
            subject: format!("New Task Assigned: {}", task.title),
            html: layout("TaskFlow", "#667eea", &body),
        }
    }

    pub fn task_due_soon(
        &self,
        to: &str,
        first_name: &str,
        task: &TaskEmail,
        hours_left: i64,
    ) -> EmailMessage {
        let unit = if hours_left == 1 { "hour" } else { "hours" };
        let body = format!(
            r#"<p>Hi {name},</p>
<p>Your task "<strong>{title}</strong>" is due in <strong>{hours} {unit}</strong>.</p>
{card}
{button}"#,
            name = escape_html(first_name),
            title = escape_html(&task.title),
            hours = hours_left,
            unit = unit,
            card = task_card(task, "#f59e0b", "Due"),
            button = button(&self.task_link(task.id), "Complete Task Now", "#f59e0b"),
        );

        EmailMessage {
            to: to.to_string(),
            subject: format!("⏰ Task Due Soon: {}", task.title),
            html: layout("⏰ Task Due Soon", "#f59e0b", &body),
        }
    }

    pub fn task_overdue(&self, to: &str, first_name: &str, task: &TaskEmail) -> EmailMessage {
        let body = format!(
            r#"<p>Hi {name},</p>
<p>Your task "<strong>{title}</strong>" is now <strong style="color:#ef4444;">OVERDUE</strong>.</p>
{card}
{button}"#,
            name = escape_html(first_name),
            title = escape_html(&task.title),
            card = task_card(task, "#ef4444", "Was due"),
            button = button(&self.task_link(task.id), "Update Task Status", "#ef4444"),
        );

        EmailMessage {
            to: to.to_string(),
            subject: format!("🚨 Task Overdue: {}", task.title),
            html: layout("🚨 Task Overdue", "#ef4444", &body),
        }
    }

    /// Sent to the task creator when someone marks the task DONE
    pub fn task_completed(
        &self,
        to: &str,
        first_name: &str,
        task: &TaskEmail,
        completed_by: &str,
    ) -> EmailMessage {
        let body = format!(
            r#"<p>Hi {name},</p>
<p>The task "<strong>{title}</strong>" was marked as done by {who}.</p>
{button}"#,
            name = escape_html(first_name),
            title = escape_html(&task.title),
            who = escape_html(completed_by),
            button = button(&self.task_link(task.id), "View Task", "#10b981"),
        );

        EmailMessage {
            to: to.to_string(),
            subject: format!("✅ Task Completed: {}", task.title),
            html: layout("✅ Great Work!", "#10b981", &body),
        }
    }

    pub fn daily_digest(&self, to: &str, first_name: &str, counts: &DigestCounts) -> EmailMessage {
        let body = format!(
            r#"<p>Hi {name},</p>
<p>Here's your daily task summary:</p>
<table style="width:100%;border-collapse:separate;border-spacing:8px;">
<tr>{total}{completed}</tr>
<tr>{due_today}{overdue}</tr>
</table>
{button}"#,
            name = escape_html(first_name),
            total = stat_cell(counts.total, "Total Tasks", "#6366f1"),
            completed = stat_cell(counts.completed, "Completed", "#10b981"),
            due_today = stat_cell(counts.due_today, "Due Today", "#f59e0b"),
            overdue = stat_cell(counts.overdue, "Overdue", "#ef4444"),
            button = button(&format!("{}/dashboard", self.frontend_url), "View Dashboard", "#6366f1"),
        );

        EmailMessage {
            to: to.to_string(),
            subject: "📊 Your Daily Task Digest".to_string(),
            html: layout("📊 Daily Digest", "#667eea", &body),
        }
    }
}

fn layout(heading: &str, color: &str, body: &str) -> String {
    format!(
        r#"<div style="font-family:Arial,sans-serif;max-width:600px;margin:0 auto;">
<div style="background:{color};padding:30px;text-align:center;">
<h1 style="color:white;margin:0;">{heading}</h1>
</div>
<div style="padding:30px;background:#f9fafb;color:#4b5563;font-size:16px;">
{body}
<p style="color:#9ca3af;font-size:14px;margin-top:30px;">This is an automated notification from TaskFlow. Please do not reply to this email.</p>
</div>
</div>"#
    )
}

fn task_card(task: &TaskEmail, accent: &str, due_label: &str) -> String {
    let description = if task.description.trim().is_empty() {
        "No description provided".to_string()
    } else {
        escape_html(&task.description)
    };

    format!(
        r#"<div style="background:white;border-radius:8px;padding:20px;margin:20px 0;border-left:4px solid {accent};">
<h3 style="margin-top:0;color:#1f2937;">{title}</h3>
<p>{description}</p>
<p><strong>Priority:</strong> {priority} &middot; <strong>{due_label}:</strong> {due}</p>
</div>"#,
        title = escape_html(&task.title),
        priority = task.priority.as_str().to_uppercase(),
        due = task.due_date.format("%Y-%m-%d %H:%M UTC"),
    )
}

fn button(href: &str, label: &str, color: &str) -> String {
    format!(
        r#"<a href="{href}" style="display:inline-block;padding:12px 24px;background:{color};color:white;text-decoration:none;border-radius:6px;margin-top:20px;">{label}</a>"#,
        href = escape_html(href),
    )
}

fn stat_cell(value: i64, label: &str, color: &str) -> String {
    format!(
        r#"<td style="background:white;border-radius:8px;padding:15px;text-align:center;"><h2 style="color:{color};margin:0;font-size:32px;">{value}</h2><p style="margin:5px 0 0 0;">{label}</p></td>"#
    )
}

pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn task() -> TaskEmail {
        TaskEmail {
            id: Uuid::nil(),
            title: "Ship <release>".to_string(),
            description: String::new(),
            priority: TaskPriority::Urgent,
            due_date: Utc.with_ymd_and_hms(2024, 5, 1, 17, 0, 0).unwrap(),
        }
    }

    fn templates() -> Templates {
        Templates::new("https://app.taskflow.test/")
    }

    #[test]
    fn test_task_assigned() {
        let email = templates().task_assigned("jane@example.com", "Jane", &task());

        assert_eq!(email.to, "jane@example.com");
        assert_eq!(email.subject, "New Task Assigned: Ship <release>");
        assert!(email.html.contains("Ship &lt;release&gt;"));
        assert!(!email.html.contains("<release>"));
        assert!(email.html.contains("No description provided"));
        assert!(email.html.contains("URGENT"));
        assert!(email
            .html
            .contains("https://app.taskflow.test/tasks/00000000-0000-0000-0000-000000000000"));
    }

    #[test]
    fn test_due_soon_mentions_hours() {
        let email = templates().task_due_soon("jane@example.com", "Jane", &task(), 5);
        assert_eq!(email.subject, "⏰ Task Due Soon: Ship <release>");
        assert!(email.html.contains("5 hours"));

        let email = templates().task_due_soon("jane@example.com", "Jane", &task(), 1);
        assert!(email.html.contains("1 hour<"));
    }

    #[test]
    fn test_overdue_and_completed_subjects() {
        let t = templates();
        assert_eq!(
            t.task_overdue("a@example.com", "A", &task()).subject,
            "🚨 Task Overdue: Ship <release>"
        );

        let completed = t.task_completed("a@example.com", "A", &task(), "Bob <Builder>");
        assert_eq!(completed.subject, "✅ Task Completed: Ship <release>");
        assert!(completed.html.contains("Bob &lt;Builder&gt;"));
    }

    #[test]
    fn test_daily_digest() {
        let counts = DigestCounts {
            total: 7,
            completed: 3,
            due_today: 2,
            overdue: 1,
        };
        let email = templates().daily_digest("jane@example.com", "Jane", &counts);

        assert_eq!(email.subject, "📊 Your Daily Task Digest");
        assert!(email.html.contains(">7</h2>"));
        assert!(email.html.contains(">1</h2>"));
        assert!(email.html.contains("https://app.taskflow.test/dashboard"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
    }
}
