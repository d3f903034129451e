//! Per-banner analytics aggregation
//!
//! Pure functions that turn normalized view and click records into
//! per-user summaries and overall counters. They hold no state and never
//! fail, so concurrent request handlers can call them freely.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::analytics::models::{
    BannerAnalyticsReport, BannerStats, ClickRecord, ClickSummary, ViewRecord, ViewSummary,
};

/// Append `value` unless it is already present, keeping insertion order
fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|existing| existing == value) {
        list.push(value.to_string());
    }
}

/// Like `push_unique`, but empty values are ignored
fn push_unique_non_empty(list: &mut Vec<String>, value: &str) {
    if !value.is_empty() {
        push_unique(list, value);
    }
}

fn location_label(city: &str, country: &str) -> String {
    format!("{}, {}", city, country)
}

/// Group records by user id in first-seen order
fn group_by_user<'a, T>(records: &'a [T], user_id: impl Fn(&T) -> &str) -> Vec<Vec<&'a T>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<&T>> = Vec::new();

    for record in records {
        let key = user_id(record);
        match index.get(key) {
            Some(&slot) => groups[slot].push(record),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![record]);
            }
        }
    }

    groups
}

/// Summarize a banner's views, one summary per distinct user.
///
/// The caller is responsible for passing only records of one banner.
/// Summaries come out in first-seen user order.
pub fn summarize_views(records: &[ViewRecord]) -> Vec<ViewSummary> {
    group_by_user(records, |r| r.user_id.as_str())
        .into_iter()
        .filter_map(|group| {
            let (first, rest) = group.split_first()?;

            let mut summary = ViewSummary {
                user_id: first.user_id.clone(),
                user_email: first.user_email.clone(),
                view_count: 1,
                first_viewed: first.viewed_at,
                last_viewed: first.viewed_at,
                total_duration_seconds: first.view_duration_seconds,
                locations: vec![location_label(&first.city, &first.country)],
                devices: Vec::new(),
                sources: Vec::new(),
            };
            push_unique_non_empty(&mut summary.devices, &first.user_agent);
            push_unique_non_empty(&mut summary.sources, &first.source);

            for view in rest {
                summary.view_count += 1;
                summary.first_viewed = summary.first_viewed.min(view.viewed_at);
                summary.last_viewed = summary.last_viewed.max(view.viewed_at);
                summary.total_duration_seconds += view.view_duration_seconds;
                push_unique(
                    &mut summary.locations,
                    &location_label(&view.city, &view.country),
                );
                push_unique_non_empty(&mut summary.devices, &view.user_agent);
                push_unique_non_empty(&mut summary.sources, &view.source);
            }

            Some(summary)
        })
        .collect()
}

/// Summarize a banner's clicks, one summary per distinct user
pub fn summarize_clicks(records: &[ClickRecord]) -> Vec<ClickSummary> {
    group_by_user(records, |r| r.user_id.as_str())
        .into_iter()
        .filter_map(|group| {
            let (first, rest) = group.split_first()?;

            let mut summary = ClickSummary {
                user_id: first.user_id.clone(),
                user_email: first.user_email.clone(),
                click_count: 1,
                first_clicked: first.clicked_at,
                last_clicked: first.clicked_at,
                click_urls: Vec::new(),
                locations: vec![location_label(&first.city, &first.country)],
                devices: Vec::new(),
                sources: Vec::new(),
            };
            push_unique_non_empty(&mut summary.click_urls, &first.click_url);
            push_unique_non_empty(&mut summary.devices, &first.user_agent);
            push_unique_non_empty(&mut summary.sources, &first.source);

            for click in rest {
                summary.click_count += 1;
                summary.first_clicked = summary.first_clicked.min(click.clicked_at);
                summary.last_clicked = summary.last_clicked.max(click.clicked_at);
                push_unique_non_empty(&mut summary.click_urls, &click.click_url);
                push_unique(
                    &mut summary.locations,
                    &location_label(&click.city, &click.country),
                );
                push_unique_non_empty(&mut summary.devices, &click.user_agent);
                push_unique_non_empty(&mut summary.sources, &click.source);
            }

            Some(summary)
        })
        .collect()
}

/// Click-through rate in percent, rounded half-up to 2 decimals.
/// Zero when there are no views.
pub fn round_ctr(total_clicks: u64, total_views: u64) -> f64 {
    if total_views == 0 {
        return 0.0;
    }
    let ctr = total_clicks as f64 / total_views as f64 * 100.0;
    (ctr * 100.0).round() / 100.0
}

/// Overall counters for one banner, with per-user counters when `user_id` is given
pub fn compute_stats(
    views: &[ViewRecord],
    clicks: &[ClickRecord],
    user_id: Option<&str>,
) -> BannerStats {
    let total_views = views.len() as u64;
    let total_clicks = clicks.len() as u64;

    let (user_views, user_clicks) = match user_id {
        Some(uid) => (
            Some(views.iter().filter(|v| v.user_id == uid).count() as u64),
            Some(clicks.iter().filter(|c| c.user_id == uid).count() as u64),
        ),
        None => (None, None),
    };

    BannerStats {
        total_views,
        total_clicks,
        ctr: round_ctr(total_clicks, total_views),
        user_views,
        user_clicks,
    }
}

/// Sort by view count descending; equal counts are ordered by user id
pub fn sort_by_view_count(summaries: &mut [ViewSummary]) {
    summaries.sort_by(|a, b| match b.view_count.cmp(&a.view_count) {
        Ordering::Equal => a.user_id.cmp(&b.user_id),
        other => other,
    });
}

/// Sort by click count descending; equal counts are ordered by user id
pub fn sort_by_click_count(summaries: &mut [ClickSummary]) {
    summaries.sort_by(|a, b| match b.click_count.cmp(&a.click_count) {
        Ordering::Equal => a.user_id.cmp(&b.user_id),
        other => other,
    });
}

/// Combine raw records and sorted summaries into one report
pub fn build_report(
    banner_id: &str,
    banner_title: Option<String>,
    views: Vec<ViewRecord>,
    clicks: Vec<ClickRecord>,
) -> BannerAnalyticsReport {
    let mut views_summary = summarize_views(&views);
    let mut analytics_summary = summarize_clicks(&clicks);
    sort_by_view_count(&mut views_summary);
    sort_by_click_count(&mut analytics_summary);

    BannerAnalyticsReport {
        banner_id: banner_id.to_string(),
        banner_title,
        total_views: views.len() as u64,
        total_clicks: clicks.len() as u64,
        unique_viewers: views_summary.len() as u64,
        unique_clickers: analytics_summary.len() as u64,
        views,
        analytics: clicks,
        views_summary,
        analytics_summary,
    }
}
