//! The order-creation pipeline.
//!
//! Validation runs in three strictly ordered phases against the two
//! dependencies, then hands a fully priced order back to the caller for
//! persistence:
//!
//! 1. owner validation (identity-service)
//! 2. product lookup, fanned out per line (catalog-service)
//! 3. availability check, fanned out per line (catalog-service)
//!
//! Within phases 2 and 3 the per-line calls run concurrently and are all
//! joined before the next phase. Nothing is persisted here, so a failure
//! or cancellation at any point leaves no trace.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;
use rust_decimal::Decimal;
use tracing::instrument;

use service_core::error::AppError;

use super::gateway::{CatalogGateway, IdentityGateway};

/// One requested line after input validation and duplicate merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftLine {
    pub product_id: i64,
    pub quantity: i32,
}

/// A line with its price snapshot captured at validation time.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub product_id: i64,
    pub quantity: i32,
    pub price_at_purchase: Decimal,
    pub product_name: String,
}

/// The validated order, ready to persist.
#[derive(Debug)]
pub struct ValidatedOrder {
    pub owner_id: i64,
    pub lines: Vec<PricedLine>,
    pub total_amount: Decimal,
}

pub struct Orchestrator {
    identity: Arc<dyn IdentityGateway>,
    catalog: Arc<dyn CatalogGateway>,
}

impl Orchestrator {
    pub fn new(identity: Arc<dyn IdentityGateway>, catalog: Arc<dyn CatalogGateway>) -> Self {
        Self { identity, catalog }
    }

    /// Validate a create-order request end to end. `owner_id` comes from
    /// the verified access token, never from the request body.
    #[instrument(skip(self, items), fields(line_count = items.len()))]
    pub async fn validate(
        &self,
        owner_id: i64,
        items: &[(i64, i32)],
    ) -> Result<ValidatedOrder, AppError> {
        let lines = merge_lines(items)?;

        // Phase 1: the owner must exist and be active before any product
        // work starts.
        let validation = self.identity.validate_user(owner_id).await?;
        if !validation.valid || !validation.is_active {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "account {} is unknown or inactive",
                owner_id
            )));
        }

        // Phase 2: price and existence snapshot, one concurrent call per
        // line, all joined before moving on.
        let infos = try_join_all(
            lines
                .iter()
                .map(|line| self.catalog.get_product_info(line.product_id)),
        )
        .await?;

        let mut priced = Vec::with_capacity(lines.len());
        for (line, info) in lines.iter().zip(infos) {
            if !info.found {
                return Err(AppError::NotFound(anyhow::anyhow!(
                    "product {} not found",
                    line.product_id
                )));
            }
            if !info.is_active {
                return Err(AppError::NotFound(anyhow::anyhow!(
                    "product {} is not available",
                    line.product_id
                )));
            }
            priced.push(PricedLine {
                product_id: line.product_id,
                quantity: line.quantity,
                price_at_purchase: info.price,
                product_name: info.name,
            });
        }

        // Phase 3: availability, again fanned out per line and joined.
        let availabilities = try_join_all(
            lines
                .iter()
                .map(|line| self.catalog.check_availability(line.product_id, line.quantity)),
        )
        .await?;

        for (line, availability) in lines.iter().zip(availabilities) {
            if !availability.available {
                return Err(AppError::InsufficientInventory {
                    product_id: line.product_id,
                    available: availability.current_inventory,
                });
            }
        }

        // Fixed-point arithmetic only; binary floats never touch money.
        let total_amount: Decimal = priced
            .iter()
            .map(|line| Decimal::from(line.quantity) * line.price_at_purchase)
            .sum();

        tracing::info!(
            owner_id,
            lines = priced.len(),
            total = %total_amount,
            "Order validated against identity and catalog"
        );

        Ok(ValidatedOrder {
            owner_id,
            lines: priced,
            total_amount,
        })
    }
}

/// Validate raw items and merge duplicate product ids by summing their
/// quantities. Order of first appearance is preserved.
fn merge_lines(items: &[(i64, i32)]) -> Result<Vec<DraftLine>, AppError> {
    if items.is_empty() {
        return Err(AppError::InputInvalid(anyhow::anyhow!(
            "an order needs at least one item"
        )));
    }

    let mut order: Vec<i64> = Vec::new();
    let mut merged: BTreeMap<i64, i64> = BTreeMap::new();

    for &(product_id, quantity) in items {
        if quantity < 1 {
            return Err(AppError::InputInvalid(anyhow::anyhow!(
                "quantity for product {} must be at least 1",
                product_id
            )));
        }
        if !merged.contains_key(&product_id) {
            order.push(product_id);
        }
        *merged.entry(product_id).or_insert(0) += quantity as i64;
    }

    order
        .into_iter()
        .map(|product_id| {
            let quantity = merged[&product_id];
            i32::try_from(quantity)
                .map_err(|_| {
                    AppError::InputInvalid(anyhow::anyhow!(
                        "combined quantity for product {} is too large",
                        product_id
                    ))
                })
                .map(|quantity| DraftLine {
                    product_id,
                    quantity,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_orders() {
        assert!(matches!(
            merge_lines(&[]),
            Err(AppError::InputInvalid(_))
        ));
    }

    #[test]
    fn rejects_zero_and_negative_quantities() {
        assert!(merge_lines(&[(1, 0)]).is_err());
        assert!(merge_lines(&[(1, -2)]).is_err());
    }

    #[test]
    fn merges_duplicate_product_ids() {
        let lines = merge_lines(&[(1, 1), (2, 4), (1, 2)]).unwrap();
        assert_eq!(
            lines,
            vec![
                DraftLine {
                    product_id: 1,
                    quantity: 3
                },
                DraftLine {
                    product_id: 2,
                    quantity: 4
                },
            ]
        );
    }

    #[test]
    fn merged_overflow_is_an_input_error() {
        assert!(merge_lines(&[(1, i32::MAX), (1, 1)]).is_err());
    }
}
