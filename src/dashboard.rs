//! Back-office dashboard counters

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::analytics::normalize::parse_timestamp;
use crate::analytics::tracking::format_timestamp;
use crate::cache::TtlCache;
use crate::models::BannerKind;
use crate::storage::{Document, Storage};

pub const STATS_CACHE_KEY: &str = "stats";
const RECENT_ORDERS_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub users_count: u64,
    pub products_count: u64,
    pub orders_count: u64,
    pub categories_count: u64,
    pub banners_count: u64,
    pub payment_banners_count: u64,
    /// Today's newest orders, timestamps rendered as RFC 3339
    pub recent_orders: Vec<Value>,
}

pub struct DashboardService {
    storage: Arc<dyn Storage>,
    cache: Arc<dyn TtlCache<DashboardStats>>,
    ttl: Duration,
    /// Bumped on every invalidation
    generation: AtomicU64,
}

impl DashboardService {
    pub fn new(
        storage: Arc<dyn Storage>,
        cache: Arc<dyn TtlCache<DashboardStats>>,
        ttl: Duration,
    ) -> Self {
        Self {
            storage,
            cache,
            ttl,
            generation: AtomicU64::new(0),
        }
    }

    /// Cached counters, recomputed once the cache entry expires
    pub async fn stats(&self) -> DashboardStats {
        if let Some(stats) = self.cache.get(STATS_CACHE_KEY).await {
            debug!("Dashboard stats served from cache");
            return stats;
        }

        let generation = self.generation.load(Ordering::Acquire);
        let stats = self.compute(Utc::now()).await;
        self.store(&stats, generation).await;
        stats
    }

    pub async fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.cache.invalidate(STATS_CACHE_KEY).await;
    }

    /// Cache counters computed at `generation`. Dropped when an invalidation
    /// happened while they were being computed.
    async fn store(&self, stats: &DashboardStats, generation: u64) {
        if self.generation.load(Ordering::Acquire) != generation {
            debug!("Dashboard stats changed during computation, not caching");
            return;
        }
        self.cache
            .set(STATS_CACHE_KEY, stats.clone(), self.ttl)
            .await;
        // An invalidation may have slipped in between the check and the write
        if self.generation.load(Ordering::Acquire) != generation {
            self.cache.invalidate(STATS_CACHE_KEY).await;
        }
    }

    async fn compute(&self, now: DateTime<Utc>) -> DashboardStats {
        let (users, products, orders, categories, banners, payment_banners) = tokio::join!(
            self.count_or_zero("users"),
            self.count_or_zero("products"),
            self.count_or_zero("orders"),
            self.count_or_zero("categories"),
            self.count_or_zero(BannerKind::Regular.collection()),
            self.count_or_zero(BannerKind::Payment.collection()),
        );

        let recent_orders = match self.storage.list_documents("orders").await {
            Ok(docs) => recent_orders(docs, now),
            Err(e) => {
                warn!("Failed to load recent orders: {}", e);
                Vec::new()
            }
        };

        DashboardStats {
            users_count: users,
            products_count: products,
            orders_count: orders,
            categories_count: categories,
            banners_count: banners,
            payment_banners_count: payment_banners,
            recent_orders,
        }
    }

    async fn count_or_zero(&self, collection: &str) -> u64 {
        self.storage
            .count_documents(collection)
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to count {}: {}", collection, e);
                0
            })
    }
}

/// Orders created on the current UTC day, newest first
fn recent_orders(docs: Vec<Document>, now: DateTime<Utc>) -> Vec<Value> {
    let day_start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(now);
    let day_end = day_start + ChronoDuration::days(1);

    let mut todays: Vec<(DateTime<Utc>, Document)> = docs
        .into_iter()
        .filter_map(|doc| {
            let created = doc.data.get("createdAt").and_then(parse_timestamp)?;
            (created >= day_start && created < day_end).then_some((created, doc))
        })
        .collect();
    todays.sort_by(|a, b| b.0.cmp(&a.0));

    todays
        .into_iter()
        .take(RECENT_ORDERS_LIMIT)
        .map(|(_, doc)| serialize_order(doc))
        .collect()
}

fn serialize_order(doc: Document) -> Value {
    let mut out = Map::new();
    out.insert("id".to_string(), Value::String(doc.id));

    if let Value::Object(fields) = doc.data {
        for (key, value) in fields {
            let is_timestamp =
                matches!(&value, Value::Object(obj) if obj.contains_key("_seconds"));
            let value = if is_timestamp {
                parse_timestamp(&value)
                    .map(|ts| Value::String(format_timestamp(ts)))
                    .unwrap_or(value)
            } else {
                value
            };
            out.insert(key, value);
        }
    }

    Value::Object(out)
}
