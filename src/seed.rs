//! Demo catalog, launch coupon and bootstrap admin.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use crate::config::BootstrapAdmin;
use crate::domain::aggregates::{Discount, NewProduct};
use crate::domain::value_objects::Money;
use crate::services::{NewCoupon, ProductFilter, Services};
use crate::Result;

const DEMO_PRODUCTS: &[(&str, &str, &str, i64, Option<i64>, u32)] = &[
    ("Linen Shirt", "Relaxed fit, stonewashed European linen.", "apparel", 4900, Some(6500), 24),
    ("Merino Beanie", "Rib-knit beanie in fine merino wool.", "apparel", 2800, None, 3),
    ("Canvas Tote", "Heavyweight cotton canvas with leather handles.", "accessories", 3500, None, 40),
    ("Ceramic Pour-Over", "Hand-thrown dripper, fits most mugs.", "kitchen", 3200, Some(3800), 12),
    ("Cast Iron Skillet", "Pre-seasoned 26cm skillet.", "kitchen", 5500, None, 0),
    ("Beeswax Candle", "Pure beeswax, 40 hour burn.", "home", 1800, None, 60),
    ("Wool Throw", "Lambswool throw, 130 x 180cm.", "home", 11900, Some(14900), 5),
    ("Notebook Set", "Three A5 dot-grid notebooks.", "stationery", 1500, None, 80),
];

/// Launch code: ten percent off for a year.
pub const DEMO_COUPON: &str = "LOVE";

/// Seeds the demo catalog and coupon when the catalog is empty. Returns how many products were added.
pub async fn seed_demo_data(services: &Services) -> Result<usize> {
    if !services.catalog.list(&ProductFilter::default()).await?.is_empty() {
        tracing::debug!("catalog already populated, skipping demo data");
        return Ok(0);
    }
    let currency = services.catalog.currency().to_string();
    for &(name, description, category, cents, original_cents, stock) in DEMO_PRODUCTS {
        services.catalog.insert(NewProduct {
            name: name.into(),
            description: description.into(),
            price: Money::new(Decimal::new(cents, 2), &currency),
            original_price: original_cents.map(|c| Money::new(Decimal::new(c, 2), &currency)),
            category: category.into(),
            stock,
            images: vec![format!("/images/{}.jpg", name.to_lowercase().replace(' ', "-"))],
        }).await?;
    }
    let now = Utc::now();
    services.coupons.insert(NewCoupon {
        code: DEMO_COUPON.into(),
        discount: Discount::Percentage(Decimal::new(10, 2)),
        starts_at: now - Duration::days(1),
        ends_at: now + Duration::days(365),
    }).await?;
    tracing::info!(products = DEMO_PRODUCTS.len(), coupon = DEMO_COUPON, "demo data seeded");
    Ok(DEMO_PRODUCTS.len())
}

/// Creates the configured admin account if it does not exist yet.
pub async fn bootstrap_admin(services: &Services, admin: &BootstrapAdmin) -> Result<()> {
    match services.accounts.ensure_admin("Administrator", &admin.email, &admin.password).await? {
        Some(profile) => tracing::info!(user_id = %profile.id, "bootstrap admin created; password change required"),
        None => tracing::debug!("bootstrap admin already present"),
    }
    Ok(())
}
