//! Inventory ledger: the only writer of `products.stock_quantity` on the
//! checkout path.

use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    entity::products::{Column as ProdCol, Entity as Products},
    error::{AppError, AppResult},
};

/// Decrement stock for every line of an order inside the caller's
/// transaction. The decrement carries its own `stock_quantity >= qty`
/// predicate and checks the affected-row count, so two checkouts racing for
/// the last units cannot both win; the loser sees zero rows touched and the
/// whole transaction rolls back with no partial decrement.
pub async fn reserve_stock(
    txn: &DatabaseTransaction,
    items: &[(Uuid, i32)],
) -> AppResult<()> {
    for (product_id, quantity) in items {
        let result = Products::update_many()
            .col_expr(
                ProdCol::StockQuantity,
                Expr::col(ProdCol::StockQuantity).sub(*quantity),
            )
            .filter(
                ProdCol::Id
                    .eq(*product_id)
                    .and(ProdCol::StockQuantity.gte(*quantity)),
            )
            .exec(txn)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::InsufficientStock(*product_id));
        }
    }

    Ok(())
}
