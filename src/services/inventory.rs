use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, sea_query::Expr};
use uuid::Uuid;

use crate::{
    entity::products::{Column as ProdCol, Entity as Products},
    error::{AppError, AppResult, StockShortage, summarize_shortages},
};

/// Catalog prices are stored in major units; orders work in minor units.
pub fn to_minor_units(price: Decimal) -> AppResult<i64> {
    (price * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("price {price} out of range")))
}

/// Sum quantities per product; several lines (variants) may share one.
pub fn demand<I>(lines: I) -> BTreeMap<Uuid, i32>
where
    I: IntoIterator<Item = (Uuid, i32)>,
{
    let mut totals = BTreeMap::new();
    for (product_id, qty) in lines {
        *totals.entry(product_id).or_insert(0) += qty;
    }
    totals
}

async fn current_stock<C>(conn: &C, ids: Vec<Uuid>) -> AppResult<BTreeMap<Uuid, i32>>
where
    C: ConnectionTrait,
{
    Ok(Products::find()
        .filter(ProdCol::Id.is_in(ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p.stock))
        .collect())
}

/// Every product whose current stock cannot cover the requested quantity.
pub async fn find_shortages<C>(conn: &C, demand: &BTreeMap<Uuid, i32>) -> AppResult<Vec<StockShortage>>
where
    C: ConnectionTrait,
{
    let stock = current_stock(conn, demand.keys().copied().collect()).await?;
    Ok(demand
        .iter()
        .filter_map(|(product_id, requested)| {
            let available = stock.get(product_id).copied().unwrap_or(0);
            (available < *requested).then_some(StockShortage {
                product_id: *product_id,
                requested: *requested,
                available,
            })
        })
        .collect())
}

/// Validate without reserving anything.
pub async fn assert_sufficient_stock<C>(conn: &C, demand: &BTreeMap<Uuid, i32>) -> AppResult<()>
where
    C: ConnectionTrait,
{
    let shortages = find_shortages(conn, demand).await?;
    if shortages.is_empty() {
        return Ok(());
    }
    tracing::warn!(conflicts = %summarize_shortages(&shortages), "stock check failed");
    Err(AppError::StockConflict(shortages))
}

/// Conditional decrement: succeeds only while `stock >= qty`.
pub async fn try_decrement<C>(conn: &C, product_id: Uuid, qty: i32) -> AppResult<bool>
where
    C: ConnectionTrait,
{
    let result = Products::update_many()
        .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(qty))
        .filter(ProdCol::Id.eq(product_id))
        .filter(ProdCol::Stock.gte(qty))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Decrement every product in `demand`. On any shortage the caller must roll
/// back, since earlier decrements in the same transaction already applied.
pub async fn decrement_all<C>(conn: &C, demand: &BTreeMap<Uuid, i32>) -> AppResult<()>
where
    C: ConnectionTrait,
{
    let mut failed = Vec::new();
    for (product_id, qty) in demand {
        if !try_decrement(conn, *product_id, *qty).await? {
            failed.push(*product_id);
        }
    }
    if failed.is_empty() {
        return Ok(());
    }

    let stock = current_stock(conn, failed.clone()).await?;
    let shortages = failed
        .into_iter()
        .map(|product_id| StockShortage {
            product_id,
            requested: demand.get(&product_id).copied().unwrap_or(0),
            available: stock.get(&product_id).copied().unwrap_or(0),
        })
        .collect();
    Err(AppError::StockConflict(shortages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn converts_major_to_minor_units() {
        assert_eq!(to_minor_units(Decimal::from_str("12.34").unwrap()).unwrap(), 1234);
        assert_eq!(to_minor_units(Decimal::from_str("0.005").unwrap()).unwrap(), 1);
        assert_eq!(to_minor_units(Decimal::from_str("199").unwrap()).unwrap(), 19900);
        assert_eq!(to_minor_units(Decimal::ZERO).unwrap(), 0);
    }

    #[test]
    fn demand_merges_lines_of_the_same_product() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let merged = demand([(a, 2), (b, 1), (a, 3)]);
        assert_eq!(merged.get(&a), Some(&5));
        assert_eq!(merged.get(&b), Some(&1));
        assert_eq!(merged.len(), 2);
    }
}
