use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::{
    call, commission, referrals::ReferralRequest, settings::SettingsRequest, users::UserRequest,
    RequestHandler, Service, ServiceError,
};
use crate::{models::orders, repositories::OrderStore};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

pub enum OrderRequest {
    PlaceOrder {
        buyer_id: String,
        order: orders::PlaceOrder,
        response: oneshot::Sender<Result<orders::Order, ServiceError>>,
    },
    ListOrders {
        user_id: String,
        order_type: orders::OrderType,
        page: i64,
        limit: i64,
        response: oneshot::Sender<Result<orders::OrderPage, ServiceError>>,
    },
    GetOrder {
        id: String,
        response: oneshot::Sender<Result<orders::Order, ServiceError>>,
    },
    UpdateOrderStatus {
        id: String,
        status: orders::OrderStatus,
        response: oneshot::Sender<Result<orders::Order, ServiceError>>,
    },
}

fn new_transaction_id() -> String {
    let n = 100_000 + (Uuid::new_v4().as_u128() % 900_000);
    format!("ID{n}")
}

fn validate(order: &orders::PlaceOrder) -> Result<(), ServiceError> {
    if order.product_id.trim().is_empty()
        || order.product_name.trim().is_empty()
        || order.receipt_url.trim().is_empty()
    {
        return Err(ServiceError::Validation(
            "Missing required fields".to_string(),
        ));
    }
    if order.quantity <= 0 {
        return Err(ServiceError::Validation(
            "Quantity must be at least 1".to_string(),
        ));
    }
    if order.price_cents < 0 {
        return Err(ServiceError::Validation(
            "Price cannot be negative".to_string(),
        ));
    }

    Ok(())
}

#[derive(Clone)]
pub struct OrderRequestHandler {
    repository: Arc<dyn OrderStore>,
    user_channel: mpsc::Sender<UserRequest>,
    referral_channel: mpsc::Sender<ReferralRequest>,
    settings_channel: mpsc::Sender<SettingsRequest>,
}

impl OrderRequestHandler {
    pub fn new(
        repository: Arc<dyn OrderStore>,
        user_channel: mpsc::Sender<UserRequest>,
        referral_channel: mpsc::Sender<ReferralRequest>,
        settings_channel: mpsc::Sender<SettingsRequest>,
    ) -> Self {
        OrderRequestHandler {
            repository,
            user_channel,
            referral_channel,
            settings_channel,
        }
    }

    /// Validates the referral code, then computes and records the commission
    /// with the rate in effect now. Nothing is written if any check fails.
    async fn place_order(
        &self,
        buyer_id: String,
        order: orders::PlaceOrder,
    ) -> Result<orders::Order, ServiceError> {
        validate(&order)?;

        let buyer = call(&self.user_channel, "Users", |response| UserRequest::GetUser {
            id: buyer_id.clone(),
            response,
        })
        .await?
        .ok_or_else(|| ServiceError::NotFound("User not found, Login first!".to_string()))?;
        if buyer.blocked {
            return Err(ServiceError::Forbidden(
                "Your account is blocked by admin.".to_string(),
            ));
        }

        let referral_code = match order.referral_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => {
                let owner = call(&self.referral_channel, "Referrals", |response| {
                    ReferralRequest::ResolveOwner {
                        code: code.to_string(),
                        response,
                    }
                })
                .await?;
                if owner.id == buyer.id {
                    return Err(ServiceError::Validation(
                        "You cannot use your own referral code".to_string(),
                    ));
                }
                Some(owner.referral_code)
            }
            _ => None,
        };

        let rate = call(&self.settings_channel, "Settings", |response| {
            SettingsRequest::GetCommissionRate { response }
        })
        .await?;
        let commission_cents = commission::compute(order.price_cents, rate)?;
        let total_price_cents = order
            .price_cents
            .checked_mul(i64::from(order.quantity))
            .ok_or_else(|| ServiceError::Validation("Order total is too large".to_string()))?;

        let order = self
            .repository
            .create(orders::NewOrder {
                user_id: buyer.id.clone(),
                buyer: buyer.display_name().to_string(),
                product_id: order.product_id.trim().to_string(),
                product_name: order.product_name.trim().to_string(),
                transaction_id: new_transaction_id(),
                quantity: order.quantity,
                unit_price_cents: order.price_cents,
                total_price_cents,
                referral_code,
                commission_cents,
                commission_rate: rate,
                receipt_url: order.receipt_url.trim().to_string(),
            })
            .await
            .map_err(|e| ServiceError::Repository("Orders".to_string(), e.to_string()))?;

        log::info!(
            "Order {} placed by {} (referral {:?}, commission {} at {}%).",
            order.transaction_id,
            order.user_id,
            order.referral_code,
            order.commission_cents,
            order.commission_rate
        );
        Ok(order)
    }

    async fn list_orders(
        &self,
        user_id: String,
        order_type: orders::OrderType,
        page: i64,
        limit: i64,
    ) -> Result<orders::OrderPage, ServiceError> {
        if page < 1 || !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(ServiceError::Validation(format!(
                "Page must be at least 1 and limit between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        let filter = match order_type {
            orders::OrderType::Bought => orders::OrderFilter::Bought { user_id },
            orders::OrderType::Reference => {
                let user = call(&self.user_channel, "Users", |response| {
                    UserRequest::GetUser {
                        id: user_id.clone(),
                        response,
                    }
                })
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("User not found: {user_id}")))?;
                orders::OrderFilter::Reference {
                    referral_code: user.referral_code,
                }
            }
        };

        let (orders, total_orders) = self
            .repository
            .find(&filter, (page - 1) * limit, limit)
            .await
            .map_err(|e| ServiceError::Repository("Orders".to_string(), e.to_string()))?;

        Ok(orders::OrderPage {
            orders,
            total_pages: (total_orders + limit - 1) / limit,
            current_page: page,
            total_orders,
        })
    }

    async fn get_order(&self, id: &str) -> Result<orders::Order, ServiceError> {
        self.repository
            .find_by_id(id)
            .await
            .map_err(|e| ServiceError::Repository("Orders".to_string(), e.to_string()))?
            .ok_or_else(|| ServiceError::NotFound(format!("Order not found: {id}")))
    }

    /// Changes only the status; the recorded commission stays as created.
    async fn update_order_status(
        &self,
        id: &str,
        status: orders::OrderStatus,
    ) -> Result<orders::Order, ServiceError> {
        let order = self
            .repository
            .update_status(id, status)
            .await
            .map_err(|e| ServiceError::Repository("Orders".to_string(), e.to_string()))?
            .ok_or_else(|| ServiceError::NotFound(format!("Order not found: {id}")))?;

        log::info!("Order {} is now {:?}.", order.transaction_id, order.status);
        Ok(order)
    }
}

#[async_trait]
impl RequestHandler<OrderRequest> for OrderRequestHandler {
    async fn handle_request(&self, request: OrderRequest) {
        match request {
            OrderRequest::PlaceOrder {
                buyer_id,
                order,
                response,
            } => {
                let result = self.place_order(buyer_id, order).await;
                let _ = response.send(result);
            }
            OrderRequest::ListOrders {
                user_id,
                order_type,
                page,
                limit,
                response,
            } => {
                let result = self.list_orders(user_id, order_type, page, limit).await;
                let _ = response.send(result);
            }
            OrderRequest::GetOrder { id, response } => {
                let result = self.get_order(&id).await;
                let _ = response.send(result);
            }
            OrderRequest::UpdateOrderStatus {
                id,
                status,
                response,
            } => {
                let result = self.update_order_status(&id, status).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct OrderService;

impl OrderService {
    pub fn new() -> Self {
        OrderService {}
    }
}

#[async_trait]
impl Service<OrderRequest, OrderRequestHandler> for OrderService {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::users,
        repositories::MemoryStore,
        services::{start_services, ServiceChannels, Stores},
    };

    fn start(store: &MemoryStore) -> ServiceChannels {
        start_services(
            Stores {
                users: Arc::new(store.clone()),
                orders: Arc::new(store.clone()),
                settings: Arc::new(store.clone()),
            },
            10.0,
        )
    }

    async fn sign_up(
        channels: &ServiceChannels,
        phone: &str,
        referred_by: Option<&str>,
    ) -> users::User {
        let request = users::SignUp {
            name: Some(format!("user {phone}")),
            phone_number: phone.to_string(),
            password: "s3cret-pass".to_string(),
            referred_by_code: referred_by.map(str::to_string),
        };
        call(&channels.users, "Users", |response| UserRequest::SignUp {
            request,
            response,
        })
        .await
        .unwrap()
    }

    async fn place(
        channels: &ServiceChannels,
        buyer_id: &str,
        price_cents: i64,
        referral_code: Option<&str>,
    ) -> Result<orders::Order, ServiceError> {
        let order = orders::PlaceOrder {
            product_id: "prod-1".to_string(),
            product_name: "Gift card".to_string(),
            quantity: 2,
            price_cents,
            receipt_url: "https://receipts.example/r1.png".to_string(),
            referral_code: referral_code.map(str::to_string),
        };
        call(&channels.orders, "Orders", |response| {
            OrderRequest::PlaceOrder {
                buyer_id: buyer_id.to_string(),
                order,
                response,
            }
        })
        .await
    }

    async fn set_rate(channels: &ServiceChannels, rate: f64) {
        call(&channels.settings, "Settings", |response| {
            SettingsRequest::UpdateCommissionRate { rate, response }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn binds_referral_code_and_commission() {
        let store = MemoryStore::new();
        let channels = start(&store);
        let referrer = sign_up(&channels, "111", None).await;
        let buyer = sign_up(&channels, "222", None).await;

        let order = place(&channels, &buyer.id, 100, Some("111")).await.unwrap();

        assert_eq!(order.referral_code, Some(referrer.referral_code));
        assert_eq!(order.commission_cents, 90);
        assert_eq!(order.commission_rate, 10.0);
        assert_eq!(order.total_price_cents, 200);
        assert_eq!(order.status, orders::OrderStatus::Pending);
        assert!(order.transaction_id.starts_with("ID"));
        assert_eq!(order.transaction_id.len(), 8);
    }

    #[tokio::test]
    async fn unknown_referral_code_blocks_checkout_without_writing() {
        let store = MemoryStore::new();
        let channels = start(&store);
        let buyer = sign_up(&channels, "222", None).await;

        let result = place(&channels, &buyer.id, 100, Some("nobody")).await;

        match result {
            Err(ServiceError::NotFound(message)) => assert_eq!(message, "Referral Code Not Found"),
            other => panic!("expected not found, got {other:?}"),
        }
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn orders_without_a_code_still_record_commission() {
        let store = MemoryStore::new();
        let channels = start(&store);
        let buyer = sign_up(&channels, "222", None).await;

        let order = place(&channels, &buyer.id, 2_500, Some("   ")).await.unwrap();
        assert_eq!(order.referral_code, None);
        assert_eq!(order.commission_cents, 2_250);
    }

    #[tokio::test]
    async fn own_referral_code_is_rejected() {
        let store = MemoryStore::new();
        let channels = start(&store);
        let buyer = sign_up(&channels, "222", None).await;

        let result = place(&channels, &buyer.id, 100, Some("222")).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn commission_is_fixed_at_creation() {
        let store = MemoryStore::new();
        let channels = start(&store);
        sign_up(&channels, "111", None).await;
        let buyer = sign_up(&channels, "222", None).await;

        let order = place(&channels, &buyer.id, 100, Some("111")).await.unwrap();
        set_rate(&channels, 20.0).await;

        let reread = call(&channels.orders, "Orders", |response| OrderRequest::GetOrder {
            id: order.id.clone(),
            response,
        })
        .await
        .unwrap();
        assert_eq!(reread.commission_cents, 90);
        assert_eq!(reread.commission_rate, 10.0);

        let completed = call(&channels.orders, "Orders", |response| {
            OrderRequest::UpdateOrderStatus {
                id: order.id.clone(),
                status: orders::OrderStatus::Completed,
                response,
            }
        })
        .await
        .unwrap();
        assert_eq!(completed.status, orders::OrderStatus::Completed);
        assert_eq!(completed.commission_cents, 90);

        let later = place(&channels, &buyer.id, 100, Some("111")).await.unwrap();
        assert_eq!(later.commission_cents, 80);
    }

    #[tokio::test]
    async fn invalid_fields_fail_before_any_lookup() {
        let store = MemoryStore::new();
        let channels = start(&store);

        let result = call(&channels.orders, "Orders", |response| {
            OrderRequest::PlaceOrder {
                buyer_id: "missing".to_string(),
                order: orders::PlaceOrder {
                    product_id: "prod-1".to_string(),
                    product_name: "Gift card".to_string(),
                    quantity: 0,
                    price_cents: 100,
                    receipt_url: "receipt".to_string(),
                    referral_code: None,
                },
                response,
            }
        })
        .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn blocked_buyers_cannot_order() {
        let store = MemoryStore::new();
        let channels = start(&store);
        let buyer = sign_up(&channels, "222", None).await;
        call(&channels.users, "Users", |response| UserRequest::SetBlocked {
            id: buyer.id.clone(),
            blocked: true,
            response,
        })
        .await
        .unwrap();

        let result = place(&channels, &buyer.id, 100, None).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn lists_bought_and_reference_orders() {
        let store = MemoryStore::new();
        let channels = start(&store);
        let referrer = sign_up(&channels, "111", None).await;
        let buyer = sign_up(&channels, "222", None).await;

        place(&channels, &buyer.id, 100, Some("111")).await.unwrap();
        place(&channels, &buyer.id, 300, None).await.unwrap();
        place(&channels, &buyer.id, 500, Some("111")).await.unwrap();

        let list = |user_id: String, order_type: orders::OrderType| {
            let channels = channels.clone();
            async move {
                call(&channels.orders, "Orders", |response| OrderRequest::ListOrders {
                    user_id,
                    order_type,
                    page: 1,
                    limit: 2,
                    response,
                })
                .await
                .unwrap()
            }
        };

        let bought = list(buyer.id.clone(), orders::OrderType::Bought).await;
        assert_eq!(bought.total_orders, 3);
        assert_eq!(bought.total_pages, 2);
        assert_eq!(bought.orders.len(), 2);
        assert_eq!(bought.orders[0].unit_price_cents, 500);

        let reference = list(referrer.id.clone(), orders::OrderType::Reference).await;
        assert_eq!(reference.total_orders, 2);
        assert!(reference
            .orders
            .iter()
            .all(|o| o.referral_code.as_deref() == Some("111")));
    }
}
