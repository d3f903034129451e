//! Banner view and click analytics
//!
//! Raw event documents are normalized into records at the boundary,
//! then rolled up per user by pure functions in [`aggregator`].

pub mod aggregator;
pub mod ip_extractor;
pub mod models;
pub mod normalize;
pub mod tracking;

pub use aggregator::{build_report, compute_stats, summarize_clicks, summarize_views};
pub use ip_extractor::{extract_client_ip, resolve_event_ip};
pub use models::{
    BannerAnalyticsReport, BannerStats, ClickRecord, ClickSummary, ClickType, ViewRecord,
    ViewSummary,
};
pub use tracking::{TrackClickInput, TrackViewInput};
