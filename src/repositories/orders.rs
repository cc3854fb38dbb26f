use crate::models::orders;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::OrderStore;

const ORDER_COLUMNS: &str = "id, user_id, buyer, product_id, product_name, transaction_id, \
    quantity, unit_price_cents, total_price_cents, referral_code, commission_cents, \
    commission_rate, status, receipt_url, created_at, updated_at";

#[derive(Clone)]
pub struct OrderRepository {
    conn: PgPool,
}

impl OrderRepository {
    pub fn new(conn: PgPool) -> Self {
        OrderRepository { conn }
    }
}

fn filter_clause(filter: &orders::OrderFilter) -> (&'static str, &str) {
    match filter {
        orders::OrderFilter::Bought { user_id } => ("user_id", user_id.as_str()),
        orders::OrderFilter::Reference { referral_code } => {
            ("referral_code", referral_code.as_str())
        }
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn create(&self, order: orders::NewOrder) -> Result<orders::Order, anyhow::Error> {
        let order_id = Uuid::new_v4().hyphenated().to_string();

        let query = format!(
            r#"INSERT INTO orders
            (id, user_id, buyer, product_id, product_name, transaction_id, quantity,
             unit_price_cents, total_price_cents, referral_code, commission_cents,
             commission_rate, status, receipt_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 'Pending', $13)
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let order = sqlx::query_as::<_, orders::Order>(&query)
            .bind(order_id)
            .bind(order.user_id)
            .bind(order.buyer)
            .bind(order.product_id)
            .bind(order.product_name)
            .bind(order.transaction_id)
            .bind(order.quantity)
            .bind(order.unit_price_cents)
            .bind(order.total_price_cents)
            .bind(order.referral_code)
            .bind(order.commission_cents)
            .bind(order.commission_rate)
            .bind(order.receipt_url)
            .fetch_one(&self.conn)
            .await?;

        Ok(order)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<orders::Order>, anyhow::Error> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let order = sqlx::query_as::<_, orders::Order>(&query)
            .bind(id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(order)
    }

    async fn find(
        &self,
        filter: &orders::OrderFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<orders::Order>, i64), anyhow::Error> {
        let (column, value) = filter_clause(filter);

        let count_query = format!("SELECT COUNT(1) FROM orders WHERE {column} = $1");
        let total: i64 = sqlx::query_scalar(&count_query)
            .bind(value)
            .fetch_one(&self.conn)
            .await?;

        let query = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE {column} = $1 ORDER BY seq DESC OFFSET $2 LIMIT $3"
        );
        let page = sqlx::query_as::<_, orders::Order>(&query)
            .bind(value)
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.conn)
            .await?;

        Ok((page, total))
    }

    async fn update_status(
        &self,
        id: &str,
        status: orders::OrderStatus,
    ) -> Result<Option<orders::Order>, anyhow::Error> {
        let query = format!(
            "UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING {ORDER_COLUMNS}"
        );
        let order = sqlx::query_as::<_, orders::Order>(&query)
            .bind(status)
            .bind(id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(order)
    }
}
