use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "order_status")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub buyer: String,
    pub product_id: String,
    pub product_name: String,
    pub transaction_id: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub total_price_cents: i64,
    pub referral_code: Option<String>,
    pub commission_cents: i64,
    pub commission_rate: f64,
    pub status: OrderStatus,
    pub receipt_url: String,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

#[derive(Clone, Debug)]
pub struct NewOrder {
    pub user_id: String,
    pub buyer: String,
    pub product_id: String,
    pub product_name: String,
    pub transaction_id: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub total_price_cents: i64,
    pub referral_code: Option<String>,
    pub commission_cents: i64,
    pub commission_rate: f64,
    pub receipt_url: String,
}

/// Checkout payload submitted by a buyer.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrder {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i32,
    pub price_cents: i64,
    pub receipt_url: String,
    pub referral_code: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderType {
    Bought,
    Reference,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderFilter {
    /// Orders placed by the given buyer.
    Bought { user_id: String },
    /// Orders that quoted the given referral code.
    Reference { referral_code: String },
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total_pages: i64,
    pub current_page: i64,
    pub total_orders: i64,
}
