//! Per-dish discount percentages, kept in the cache under `discount_{dish_id}`.
//!
//! Entries are written only by the reconciliation engine and removed by a
//! full flush or by the deletion walk of the invalidation engine. The read
//! path applies them when rendering a price and never modifies them.

use serde_json::Value;
use tracing::warn;

use super::keys::discount_key;
use super::ReadThroughCache;
use crate::catalog::model::{Dish, DishView, Price};

#[derive(Clone)]
pub struct DiscountStore {
    cache: ReadThroughCache,
}

impl DiscountStore {
    pub fn new(cache: ReadThroughCache) -> Self {
        Self { cache }
    }

    /// Discount percentage for a dish, if one is stored and usable.
    pub async fn get(&self, dish_id: &str) -> Option<f64> {
        let key = discount_key(dish_id);
        let value: Value = self.cache.get_json(&key).await?;
        let percent = match &value {
            Value::Number(n) => n.as_f64(),
            // Older entries hold the raw spreadsheet cell.
            Value::String(s) => s.trim().replace(',', ".").parse().ok(),
            _ => None,
        };
        match percent {
            Some(p) if (0.0..=100.0).contains(&p) => Some(p),
            _ => {
                warn!(key = %key, value = %value, "Ignoring unusable discount entry");
                None
            }
        }
    }

    pub async fn set(&self, dish_id: &str, percent: f64) {
        self.cache.set(&discount_key(dish_id), &percent).await;
    }

    /// Dish as a reader sees it, with its discount applied to the price.
    pub async fn render(&self, dish: &Dish) -> DishView {
        let percent = self.get(&dish.id).await;
        DishView {
            id: dish.id.clone(),
            submenu_id: dish.submenu_id.clone(),
            title: dish.title.clone(),
            description: dish.description.clone(),
            price: display_price(dish.price, percent),
        }
    }

    pub async fn render_all(&self, dishes: &[Dish]) -> Vec<DishView> {
        let mut views = Vec::with_capacity(dishes.len());
        for dish in dishes {
            views.push(self.render(dish).await);
        }
        views
    }
}

/// `price - price * percent / 100`, two fractional digits.
pub fn display_price(price: Price, percent: Option<f64>) -> String {
    match percent {
        Some(p) => price.discounted(p).to_string(),
        None => price.to_string(),
    }
}
