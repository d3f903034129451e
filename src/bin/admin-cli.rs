use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use stationery_admin::auth::issue_token;
use stationery_admin::banners::BannerService;
use stationery_admin::cache::MokaTtlCache;
use stationery_admin::config::Config;
use stationery_admin::connect_storage;
use stationery_admin::dashboard::{DashboardService, DashboardStats};
use stationery_admin::models::BannerKind;

#[derive(Parser)]
#[command(name = "stationery-admin-cli")]
#[command(about = "Inspect banners and banner analytics from the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct KindArg {
    /// Operate on payment banners instead of home banners
    #[arg(long)]
    payment: bool,
}

impl KindArg {
    fn kind(&self) -> BannerKind {
        if self.payment {
            BannerKind::Payment
        } else {
            BannerKind::Regular
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List banners with their view and click counters
    Banners {
        #[command(flatten)]
        kind: KindArg,
    },
    /// Show totals and CTR for one banner
    Stats {
        banner_id: String,
        /// Also count views and clicks of this user
        #[arg(long)]
        user: Option<String>,
        #[command(flatten)]
        kind: KindArg,
    },
    /// Per-user view summary of one banner
    Views {
        banner_id: String,
        /// Only this user's events
        #[arg(long)]
        user: Option<String>,
        #[command(flatten)]
        kind: KindArg,
    },
    /// Per-user click summary of one banner
    Clicks {
        banner_id: String,
        /// Only this user's events
        #[arg(long)]
        user: Option<String>,
        #[command(flatten)]
        kind: KindArg,
    },
    /// Collection counters shown on the dashboard
    Dashboard,
    /// Issue a session token signed with the configured secret
    Token {
        /// Subject claim
        sub: String,
        #[arg(long)]
        email: Option<String>,
        /// Lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        ttl_secs: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Banners { kind } => {
            let banners = banner_service(&config).await?;
            let list = banners.banners_with_stats(kind.kind()).await?;
            if list.is_empty() {
                println!("No {}s found.", kind.kind().label());
            } else {
                println!(
                    "{:<24} {:<30} {:>5} {:>7} {:>8} {:>8} {:>7}",
                    "ID", "Title", "Rank", "Active", "Views", "Clicks", "CTR %"
                );
                println!("{}", "-".repeat(96));
                for item in list {
                    println!(
                        "{:<24} {:<30} {:>5} {:>7} {:>8} {:>8} {:>7.2}",
                        item.banner.banner_id,
                        truncate(&item.banner.title, 30),
                        item.banner.rank,
                        if item.banner.is_active { "yes" } else { "no" },
                        item.analytics.total_views,
                        item.analytics.total_clicks,
                        item.analytics.ctr
                    );
                }
            }
        }
        Commands::Stats {
            banner_id,
            user,
            kind,
        } => {
            let banners = banner_service(&config).await?;
            let stats = banners
                .banner_stats(kind.kind(), &banner_id, user.as_deref())
                .await?;
            println!("Total views:  {}", stats.total_views);
            println!("Total clicks: {}", stats.total_clicks);
            println!("CTR:          {:.2}%", stats.ctr);
            if let (Some(views), Some(clicks)) = (stats.user_views, stats.user_clicks) {
                println!("User views:   {}", views);
                println!("User clicks:  {}", clicks);
            }
        }
        Commands::Views {
            banner_id,
            user,
            kind,
        } => {
            let banners = banner_service(&config).await?;
            let report = banners
                .views_detail(kind.kind(), &banner_id, user.as_deref())
                .await?;
            println!(
                "{} views from {} users",
                report.total_views, report.unique_viewers
            );
            println!(
                "{:<28} {:<28} {:>6} {:>10}  {}",
                "User ID", "Email", "Views", "Seconds", "Locations"
            );
            println!("{}", "-".repeat(100));
            for summary in report.views_summary {
                println!(
                    "{:<28} {:<28} {:>6} {:>10.1}  {}",
                    truncate(&summary.user_id, 28),
                    truncate(&summary.user_email, 28),
                    summary.view_count,
                    summary.total_duration_seconds,
                    summary.locations.join(" | ")
                );
            }
        }
        Commands::Clicks {
            banner_id,
            user,
            kind,
        } => {
            let banners = banner_service(&config).await?;
            let report = banners
                .clicks_detail(kind.kind(), &banner_id, user.as_deref())
                .await?;
            println!(
                "{} clicks from {} users",
                report.total_clicks, report.unique_clickers
            );
            println!("{:<28} {:<28} {:>6}  {}", "User ID", "Email", "Clicks", "URLs");
            println!("{}", "-".repeat(100));
            for summary in report.analytics_summary {
                println!(
                    "{:<28} {:<28} {:>6}  {}",
                    truncate(&summary.user_id, 28),
                    truncate(&summary.user_email, 28),
                    summary.click_count,
                    summary.click_urls.join(" ")
                );
            }
        }
        Commands::Dashboard => {
            let dashboard = DashboardService::new(
                connect_storage(&config).await?,
                Arc::new(MokaTtlCache::<DashboardStats>::new(1)),
                Duration::from_secs(config.cache.dashboard_ttl_secs),
            );
            let stats = dashboard.stats().await;
            println!("Users:           {}", stats.users_count);
            println!("Products:        {}", stats.products_count);
            println!("Orders:          {}", stats.orders_count);
            println!("Categories:      {}", stats.categories_count);
            println!("Banners:         {}", stats.banners_count);
            println!("Payment banners: {}", stats.payment_banners_count);
            println!("Orders today:    {}", stats.recent_orders.len());
        }
        Commands::Token {
            sub,
            email,
            ttl_secs,
        } => {
            let secret = config
                .auth
                .jwt_secret
                .as_deref()
                .filter(|s| !s.is_empty())
                .context("APP__AUTH__JWT_SECRET must be set to issue tokens")?;
            if ttl_secs <= 0 {
                bail!("--ttl-secs must be positive");
            }
            let token = issue_token(
                secret,
                &sub,
                email.as_deref(),
                config.auth.issuer.as_deref(),
                ttl_secs,
            )?;
            println!("{}", token);
        }
    }

    Ok(())
}

async fn banner_service(config: &Config) -> Result<BannerService> {
    let storage = connect_storage(config).await?;
    Ok(BannerService::new(storage))
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        value.to_string()
    } else {
        let mut out: String = value.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}
