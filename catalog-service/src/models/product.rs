use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// Product record. Inventory can never go negative through any public
/// operation; the database check constraint is the last line of defense.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub inventory_count: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether `quantity` units could currently be supplied. Reporting
    /// only; never decrements.
    pub fn can_supply(&self, quantity: i32) -> bool {
        self.is_active && quantity >= 1 && self.inventory_count >= quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn product(inventory: i32, active: bool) -> Product {
        let now = Utc::now();
        Product {
            id: 1,
            name: "widget".into(),
            description: String::new(),
            price: Decimal::new(1000, 2),
            inventory_count: inventory,
            is_active: active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn supply_requires_stock_and_active_flag() {
        assert!(product(5, true).can_supply(5));
        assert!(product(5, true).can_supply(1));
        assert!(!product(5, true).can_supply(6));
        assert!(!product(5, false).can_supply(1));
        assert!(!product(5, true).can_supply(0));
        assert!(!product(0, true).can_supply(1));
    }
}
