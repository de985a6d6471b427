//! Calendar routes
//!
//! Everything here sits behind the session guard.

use std::ops::RangeInclusive;

use axum::{
    Router,
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use chrono::{Datelike, Local, Months, NaiveDate};

use crate::AppState;
use crate::auth::MaybeUser;
use crate::auth::cookies::take_flash;
use crate::error::AppError;
use crate::pages;

/// Create calendar router
///
/// Routes:
/// - GET /calendar - Current month
/// - GET /calendar/{year} - January of `year`
/// - GET /calendar/{year}/{month} - A specific month
pub fn calendar_router() -> Router<AppState> {
    Router::new()
        .route("/calendar", get(current_month))
        .route("/calendar/*rest", get(month_at))
}

async fn current_month(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let today = Local::now().date_naive();
    render(&state, user, jar, resolve_month("", today)?, today)
}

async fn month_at(
    State(state): State<AppState>,
    Path(rest): Path<String>,
    MaybeUser(user): MaybeUser,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let today = Local::now().date_naive();
    render(&state, user, jar, resolve_month(&rest, today)?, today)
}

fn render(
    state: &AppState,
    user: Option<crate::identity::User>,
    jar: CookieJar,
    month: NaiveDate,
    today: NaiveDate,
) -> Result<Response, AppError> {
    let days = days_in_month(month)?;
    let (jar, notice) = take_flash(&state.config, jar);
    let page = pages::calendar_page(month, today, days, user.as_ref(), notice.as_ref());
    Ok((jar, page).into_response())
}

/// Years reachable through `/calendar/{year}`
pub const YEARS: RangeInclusive<i32> = 1..=9999;

/// First day of the month named by the path after `/calendar/`.
///
/// Empty means the month containing `today`; a bare year means January.
pub fn resolve_month(rest: &str, today: NaiveDate) -> Result<NaiveDate, AppError> {
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();

    let (year, month) = match segments.as_slice() {
        [] => (today.year(), today.month()),
        [year] => (parse_year(year)?, 1),
        [year, month] => (parse_year(year)?, parse_month(month)?),
        _ => {
            return Err(AppError::Validation(format!(
                "unrecognised calendar path: /calendar/{rest}"
            )));
        }
    };

    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::Validation(format!("no such month: {year}-{month:02}")))
}

fn parse_year(raw: &str) -> Result<i32, AppError> {
    raw.parse::<i32>()
        .ok()
        .filter(|year| YEARS.contains(year))
        .ok_or_else(|| AppError::Validation(format!("invalid year: {raw}")))
}

fn parse_month(raw: &str) -> Result<u32, AppError> {
    raw.parse::<u32>()
        .ok()
        .filter(|month| (1..=12).contains(month))
        .ok_or_else(|| AppError::Validation(format!("invalid month: {raw}")))
}

fn days_in_month(first: NaiveDate) -> Result<u32, AppError> {
    let next = first
        .checked_add_months(Months::new(1))
        .ok_or_else(|| AppError::Validation("month out of range".to_string()))?;
    let days = next.signed_duration_since(first).num_days();
    u32::try_from(days).map_err(|e| AppError::Internal(e.into()))
}
