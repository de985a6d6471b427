//! Server-rendered HTML pages
//!
//! Deliberately plain markup; all user-controlled text goes through
//! `html_escape`.

use axum::response::Html;
use chrono::{Datelike, NaiveDate};
use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::auth::{Notice, NoticeLevel};
use crate::calendar;
use crate::identity::User;

const APP_TITLE: &str = "Event Manager";

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title} - {APP_TITLE}</title>
</head>
<body>
{body}
</body>
</html>
"#,
        title = encode_text(title),
    ))
}

fn notice_html(notice: Option<&Notice>) -> String {
    match notice {
        Some(notice) => {
            let class = match notice.level {
                NoticeLevel::Success => "notice notice-success",
                NoticeLevel::Error => "notice notice-error",
            };
            format!(
                r#"<div class="{class}" role="status">{}</div>"#,
                encode_text(&notice.message)
            )
        }
        None => String::new(),
    }
}

/// GET /auth
///
/// Sign-in and sign-up forms plus the Google button. `email` is echoed back
/// after a failed attempt.
///
/// `busy` renders the submit buttons disabled while an earlier attempt from
/// the same browser is still waiting on the provider.
pub fn login_page(notice: Option<&Notice>, email: &str, busy: bool) -> Html<String> {
    let email = encode_double_quoted_attribute(email);
    let disabled = if busy { " disabled" } else { "" };
    let body = format!(
        r#"<main class="auth">
<h1>{APP_TITLE}</h1>
<p>Manage your events with ease</p>
{notice}
<section id="signin">
<h2>Sign In</h2>
<form method="post" action="/auth/sign-in">
<label for="signin-email">Email</label>
<input id="signin-email" name="email" type="email" placeholder="name@example.com" value="{email}">
<label for="signin-password">Password</label>
<input id="signin-password" name="password" type="password">
<button type="submit"{disabled}>Sign In</button>
</form>
</section>
<section id="signup">
<h2>Sign Up</h2>
<form method="post" action="/auth/sign-up">
<label for="signup-email">Email</label>
<input id="signup-email" name="email" type="email" placeholder="name@example.com" value="{email}">
<label for="signup-password">Password</label>
<input id="signup-password" name="password" type="password" minlength="6">
<button type="submit"{disabled}>Create Account</button>
</form>
</section>
<p>Or continue with</p>
<a class="button" href="/auth/google">Google</a>
</main>
<script>
for (const form of document.querySelectorAll("form")) {{
  form.addEventListener("submit", () => {{
    for (const button of document.querySelectorAll("button")) button.disabled = true;
  }});
}}
</script>"#,
        notice = notice_html(notice),
    );
    layout("Sign In", &body)
}

/// One month of the calendar
pub fn calendar_page(
    month: NaiveDate,
    today: NaiveDate,
    days_in_month: u32,
    user: Option<&User>,
    notice: Option<&Notice>,
) -> Html<String> {
    let who = user
        .and_then(|user| user.email.as_deref().or(user.display_name.as_deref()))
        .map(|name| format!("<span class=\"user\">{}</span>", encode_text(name)))
        .unwrap_or_default();

    let offset = month.weekday().num_days_from_sunday();
    let mut cells: Vec<Option<u32>> = (0..offset).map(|_| None).collect();
    cells.extend((1..=days_in_month).map(Some));
    while cells.len() % 7 != 0 {
        cells.push(None);
    }

    let mut rows = String::new();
    for week in cells.chunks(7) {
        rows.push_str("<tr>");
        for cell in week {
            match cell {
                Some(day) => {
                    let is_today = month.year() == today.year()
                        && month.month() == today.month()
                        && *day == today.day();
                    let class = if is_today { " class=\"today\"" } else { "" };
                    rows.push_str(&format!("<td{class}>{day}</td>"));
                }
                None => rows.push_str("<td></td>"),
            }
        }
        rows.push_str("</tr>\n");
    }

    let prev = if month.month() == 1 {
        (month.year() - 1, 12)
    } else {
        (month.year(), month.month() - 1)
    };
    let next = if month.month() == 12 {
        (month.year() + 1, 1)
    } else {
        (month.year(), month.month() + 1)
    };
    let prev_link = month_link(prev, "Previous");
    let next_link = month_link(next, "Next");

    let body = format!(
        r#"<header>
<h1>{title}</h1>
{who}
<form method="post" action="/logout"><button type="submit">Sign out</button></form>
</header>
{notice}
<nav>
{prev_link}
<a href="/calendar">Today</a>
{next_link}
</nav>
<table class="month">
<thead><tr><th>Sun</th><th>Mon</th><th>Tue</th><th>Wed</th><th>Thu</th><th>Fri</th><th>Sat</th></tr></thead>
<tbody>
{rows}</tbody>
</table>"#,
        title = month.format("%B %Y"),
        notice = notice_html(notice),
    );
    layout("Calendar", &body)
}

/// Navigation link to another month, omitted outside the routable years
fn month_link((year, month): (i32, u32), label: &str) -> String {
    if calendar::YEARS.contains(&year) {
        format!(r#"<a href="/calendar/{year}/{month:02}">{label}</a>"#)
    } else {
        String::new()
    }
}

/// Fallback for unknown routes
pub fn not_found_page() -> Html<String> {
    layout(
        "Page not found",
        r#"<main class="not-found">
<h1>404</h1>
<p>Oops! Page not found</p>
<p>The page you're looking for doesn't exist or has been moved.</p>
<a class="button" href="/calendar">Return to Calendar</a>
</main>"#,
    )
}
