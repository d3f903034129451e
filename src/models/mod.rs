pub mod banner;

pub use banner::{Banner, BannerKind, BannerPatch, BannerWithStats, NewBanner};
