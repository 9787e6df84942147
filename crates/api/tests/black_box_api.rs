use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};

use bazaar_auth::{ActorRole, JwtClaims};
use bazaar_core::{Money, ProductId, UserId, VariantId, VendorId};
use bazaar_infra::{EngineConfig, VariantSeed};
use bazaar_inventory::CatalogVariant;

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(seed: Vec<VariantSeed>) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let services = bazaar_api::app::build_services(EngineConfig::default(), seed)
            .expect("failed to build services");
        let app = bazaar_api::app::build_app(SECRET, Arc::new(services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(sub: UserId, role: ActorRole, vendor_id: Option<VendorId>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub,
        role,
        vendor_id,
        iat: now.timestamp(),
        exp: (now + ChronoDuration::minutes(10)).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn customer_token() -> String {
    mint_jwt(UserId::new(), ActorRole::Customer, None)
}

fn admin_token() -> String {
    mint_jwt(UserId::new(), ActorRole::Admin, None)
}

fn test_variant(stock: i64) -> (CatalogVariant, VariantSeed) {
    let catalog = CatalogVariant {
        variant_id: VariantId::new(),
        product_id: ProductId::new(),
        vendor_id: VendorId::new(),
        product_name: "Enamel mug".to_string(),
        variant_name: "Blue".to_string(),
        sku: "MUG-BLUE".to_string(),
        price: Money::from_minor(2500),
        attributes: Default::default(),
        is_active: true,
    };
    let seed = VariantSeed {
        catalog: catalog.clone(),
        initial_stock: stock,
        low_stock_threshold: Some(1),
    };
    (catalog, seed)
}

fn order_body(variant: &CatalogVariant, quantity: u32) -> Value {
    let address = json!({
        "street": "1 Market St",
        "city": "Springfield",
        "state": "IL",
        "country": "US",
        "zip_code": "62701",
    });
    let total = format!("{}.00", 25 * quantity);
    json!({
        "items": [{
            "product_id": variant.product_id,
            "variant_id": variant.variant_id,
            "vendor_id": variant.vendor_id,
            "product_name": variant.product_name,
            "variant_name": variant.variant_name,
            "sku": variant.sku,
            "unit_price": "25.00",
            "quantity": quantity,
        }],
        "contact": {
            "email": "shopper@example.com",
            "shipping_address": address,
            "billing_address": address,
        },
        "amounts": { "subtotal": total, "total": total },
        "payment_method": "card",
    })
}

async fn create_order(client: &reqwest::Client, srv: &TestServer, token: &str, body: &Value) -> Value {
    let res = client
        .post(srv.url("/orders"))
        .bearer_auth(token)
        .json(body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

async fn confirm(client: &reqwest::Client, srv: &TestServer, token: &str, id: &str) -> reqwest::Response {
    client
        .post(srv.url(&format!("/orders/{id}/confirm")))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn(Vec::new()).await;
    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn(Vec::new()).await;

    let client = reqwest::Client::new();
    let res = client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(srv.url("/orders"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn actor_is_derived_from_token() {
    let srv = TestServer::spawn(Vec::new()).await;

    let vendor_id = VendorId::new();
    let token = mint_jwt(UserId::new(), ActorRole::Vendor, Some(vendor_id));

    let client = reqwest::Client::new();
    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["role"], "vendor");
    assert_eq!(body["vendor_id"].as_str().unwrap(), vendor_id.to_string());
}

#[tokio::test]
async fn confirming_an_order_deducts_stock_through_the_ledger() {
    let (variant, seed) = test_variant(3);
    let srv = TestServer::spawn(vec![seed]).await;
    let client = reqwest::Client::new();
    let customer = customer_token();
    let admin = admin_token();

    let created = create_order(&client, &srv, &customer, &order_body(&variant, 2)).await;
    assert_eq!(created["status"], "pending");
    let id = created["id"].as_str().unwrap().to_string();

    let res = confirm(&client, &srv, &admin, &id).await;
    assert_eq!(res.status(), StatusCode::OK);
    let confirmed: Value = res.json().await.unwrap();
    assert_eq!(confirmed["status"], "confirmed");

    let res = client
        .get(srv.url(&format!("/inventory/variants/{}/ledger", variant.variant_id)))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let ledger: Value = res.json().await.unwrap();
    let entries = ledger["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1]["delta"], -2);
    assert_eq!(entries[1]["new_stock"], 1);

    let res = client
        .get(srv.url("/inventory/reconcile"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let report: Value = res.json().await.unwrap();
    assert_eq!(report["consistent"], true);
}

#[tokio::test]
async fn oversell_is_rejected_with_the_shortfall() {
    let (variant, seed) = test_variant(3);
    let srv = TestServer::spawn(vec![seed]).await;
    let client = reqwest::Client::new();
    let customer = customer_token();
    let admin = admin_token();

    let first = create_order(&client, &srv, &customer, &order_body(&variant, 2)).await;
    let second = create_order(&client, &srv, &customer, &order_body(&variant, 2)).await;

    let res = confirm(&client, &srv, &admin, first["id"].as_str().unwrap()).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = confirm(&client, &srv, &admin, second["id"].as_str().unwrap()).await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_stock");
    let lines = body["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["requested"], 2);
    assert_eq!(lines[0]["available"], 1);

    // The losing order is untouched.
    let res = client
        .get(srv.url(&format!("/orders/{}", second["id"].as_str().unwrap())))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn other_customers_cannot_see_an_order() {
    let (variant, seed) = test_variant(5);
    let srv = TestServer::spawn(vec![seed]).await;
    let client = reqwest::Client::new();

    let created = create_order(&client, &srv, &customer_token(), &order_body(&variant, 1)).await;

    let res = client
        .get(srv.url(&format!("/orders/{}", created["id"].as_str().unwrap())))
        .bearer_auth(customer_token())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn confirming_a_cancelled_order_is_a_conflict() {
    let (variant, seed) = test_variant(5);
    let srv = TestServer::spawn(vec![seed]).await;
    let client = reqwest::Client::new();
    let customer = customer_token();

    let created = create_order(&client, &srv, &customer, &order_body(&variant, 1)).await;
    let id = created["id"].as_str().unwrap().to_string();

    let res = client
        .post(srv.url(&format!("/orders/{id}/cancel")))
        .bearer_auth(&customer)
        .json(&json!({ "reason": "changed my mind" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = confirm(&client, &srv, &admin_token(), &id).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_transition");
    assert_eq!(body["current"], "cancelled");
}

#[tokio::test]
async fn malformed_ids_are_bad_requests() {
    let srv = TestServer::spawn(Vec::new()).await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url("/orders/not-a-uuid"))
        .bearer_auth(admin_token())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
