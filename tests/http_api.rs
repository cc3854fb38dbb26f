use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use market_referrals::{
    models::users::{NewUser, Role},
    repositories::{MemoryStore, UserStore},
    services::{auth::hash_password, http::router, start_services, tokens::TokenIssuer, Stores},
};

const TOKEN_SECRET: &str = "integration-test-secret";

/// A signed-in user: id plus the bearer token from `/auth/signin`.
struct Session {
    id: String,
    token: String,
}

struct TestApp {
    base: String,
    client: Client,
    store: MemoryStore,
}

impl TestApp {
    async fn spawn() -> Self {
        let store = MemoryStore::new();
        let channels = start_services(
            Stores {
                users: Arc::new(store.clone()),
                orders: Arc::new(store.clone()),
                settings: Arc::new(store.clone()),
            },
            10.0,
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let tokens = TokenIssuer::new(TOKEN_SECRET, chrono::Duration::hours(1));
            axum::serve(listener, router(channels, tokens))
                .await
                .expect("serve");
        });

        TestApp {
            base: format!("http://{addr}"),
            client: Client::new(),
            store,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn sign_up(&self, phone: &str, referred_by: Option<&str>) -> Session {
        let response = self
            .client
            .post(self.url("/auth/signup"))
            .json(&json!({
                "name": format!("user {phone}"),
                "phoneNumber": phone,
                "password": "s3cret-pass",
                "referredByCode": referred_by,
            }))
            .send()
            .await
            .expect("signup request");
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: Value = response.json().await.expect("signup body");
        let id = body["userId"].as_str().expect("user id").to_string();

        Session {
            token: self.sign_in(phone).await,
            id,
        }
    }

    async fn sign_in(&self, phone: &str) -> String {
        let response = self
            .client
            .post(self.url("/auth/signin"))
            .json(&json!({"phoneNumber": phone, "password": "s3cret-pass"}))
            .send()
            .await
            .expect("signin request");
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = response.json().await.expect("signin body");
        body["token"].as_str().expect("token").to_string()
    }

    async fn admin(&self) -> Session {
        let id = self
            .store
            .create(NewUser {
                name: Some("admin".to_string()),
                phone_number: "000".to_string(),
                password_hash: hash_password("s3cret-pass").expect("hash"),
                referral_code: "000".to_string(),
                referred_by_code: None,
                role: Role::Admin,
                verified: true,
            })
            .await
            .expect("seed admin")
            .id;

        Session {
            token: self.sign_in("000").await,
            id,
        }
    }

    async fn place_order(
        &self,
        buyer: &Session,
        price_cents: i64,
        code: Option<&str>,
    ) -> reqwest::Response {
        self.client
            .post(self.url("/orders"))
            .bearer_auth(&buyer.token)
            .json(&json!({
                "productId": "prod-1",
                "productName": "Gift card",
                "quantity": 1,
                "priceCents": price_cents,
                "receiptUrl": "https://receipts.example/r.png",
                "referralCode": code,
            }))
            .send()
            .await
            .expect("order request")
    }
}

#[tokio::test]
async fn health_is_ok() {
    let app = TestApp::spawn().await;
    let response = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn signup_and_signin() {
    let app = TestApp::spawn().await;
    app.sign_up("0300-1234567", None).await;

    let response = app
        .client
        .post(app.url("/auth/signin"))
        .json(&json!({"phoneNumber": "0300-1234567", "password": "s3cret-pass"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["referralCode"], "03001234567");
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body["user"].get("passwordHash").is_none());

    let response = app
        .client
        .post(app.url("/auth/signin"))
        .json(&json!({"phoneNumber": "0300-1234567", "password": "nope"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"success": false, "message": "Invalid credentials"}));
}

#[tokio::test]
async fn lists_referred_users() {
    let app = TestApp::spawn().await;
    app.sign_up("111", None).await;
    let b = app.sign_up("222", Some("111")).await;
    let c = app.sign_up("333", Some("111")).await;

    let body: Value = app
        .client
        .get(app.url("/referrals?referralCode=111"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);
    let ids: Vec<&str> = body["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![b.id.as_str(), c.id.as_str()]);

    let response = app.client.get(app.url("/referrals")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn referral_check_reports_unknown_codes() {
    let app = TestApp::spawn().await;
    app.sign_up("111", None).await;

    let response = app
        .client
        .post(app.url("/referral-check"))
        .json(&json!({"referralCode": "111"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .client
        .post(app.url("/referral-check"))
        .json(&json!({"referralCode": "nobody"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({"success": false, "message": "Referral Code Not Found"})
    );
}

#[tokio::test]
async fn orders_bind_codes_and_keep_their_commission() {
    let app = TestApp::spawn().await;
    let referrer = app.sign_up("111", None).await;
    let buyer = app.sign_up("222", None).await;
    let admin = app.admin().await;

    let response = app.place_order(&buyer, 100, Some("111")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["order"]["referralCode"], "111");
    assert_eq!(body["order"]["commissionCents"], 90);
    let order_id = body["order"]["id"].as_str().unwrap().to_string();

    let response = app.place_order(&buyer, 100, Some("nobody")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.store.order_count().await, 1);

    let response = app
        .client
        .post(app.url("/admin/settings"))
        .bearer_auth(&admin.token)
        .json(&json!({"referralCommission": 20}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let order: Value = app
        .client
        .get(app.url(&format!("/orders/{order_id}")))
        .bearer_auth(&buyer.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(order["commissionCents"], 90);

    let response = app.place_order(&buyer, 100, Some("111")).await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["order"]["commissionCents"], 80);

    let page: Value = app
        .client
        .get(app.url("/orders?orderType=reference&page=1&limit=10"))
        .bearer_auth(&referrer.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["totalOrders"], 2);
    assert_eq!(page["totalPages"], 1);
    assert_eq!(page["currentPage"], 1);
}

#[tokio::test]
async fn admin_routes_require_an_admin() {
    let app = TestApp::spawn().await;
    let user = app.sign_up("111", None).await;

    let response = app
        .client
        .get(app.url("/admin/settings"))
        .bearer_auth(&user.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.client.get(app.url("/admin/settings")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let admin = app.admin().await;
    let response = app
        .client
        .post(app.url("/admin/settings"))
        .bearer_auth(&admin.token)
        .json(&json!({"referralCommission": 101}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn blocked_users_are_turned_away() {
    let app = TestApp::spawn().await;
    let buyer = app.sign_up("222", None).await;
    let admin = app.admin().await;

    let response = app
        .client
        .put(app.url(&format!("/admin/users/{}/blocked", buyer.id)))
        .bearer_auth(&admin.token)
        .json(&json!({"blocked": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.place_order(&buyer, 100, None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn referral_tree_endpoints() {
    let app = TestApp::spawn().await;
    let root = app.sign_up("111", None).await;
    app.sign_up("222", Some("111")).await;

    let node: Value = app
        .client
        .get(app.url("/referral-tree/root"))
        .bearer_auth(&root.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(node["referralCode"], "111");
    assert_eq!(node["state"], "unloaded");
    assert_eq!(node["children"], json!([]));

    let body: Value = app
        .client
        .get(app.url("/referral-tree/children?referralCode=111"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let children = body["children"].as_array().unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0]["referralCode"], "222");
    assert_eq!(children[0]["name"], "user 222");
}

#[tokio::test]
async fn user_ids_alone_do_not_authenticate() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;

    let response = app
        .client
        .post(app.url("/admin/settings"))
        .header("x-user-id", &admin.id)
        .json(&json!({"referralCommission": 0}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .client
        .post(app.url("/admin/settings"))
        .bearer_auth(&admin.id)
        .json(&json!({"referralCommission": 0}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let rate: Value = app
        .client
        .get(app.url("/admin/settings"))
        .bearer_auth(&admin.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rate["referralCommission"], 10.0);
}

#[tokio::test]
async fn tokens_signed_elsewhere_are_rejected() {
    let app = TestApp::spawn().await;
    app.admin().await;
    let admin = app
        .store
        .find_by_phone_number("000")
        .await
        .unwrap()
        .unwrap();

    let forged = TokenIssuer::new("someone-elses-secret", chrono::Duration::hours(1))
        .issue(&admin)
        .unwrap();
    let response = app
        .client
        .get(app.url("/admin/settings"))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
