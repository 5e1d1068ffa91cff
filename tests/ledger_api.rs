use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration as ChronoDuration, Utc};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use stockbook::{
    build_router,
    config::AppState,
    db::{MemoryAuditStore, MemoryInventoryStore, MemoryUserStore},
    models::auth::{Claims, Role},
    services::{AuditService, AuthService, CounterpartyService, DashboardService, InventoryService},
};

const JWT_SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
}

impl TestApp {
    fn spawn() -> Self {
        // Mesmo router da produção, sobre os stores em memória.
        let audit = AuditService::new(Arc::new(MemoryAuditStore::new()));
        let users = MemoryUserStore::new();
        let store = MemoryInventoryStore::new().with_users(users.clone());
        let inventory = InventoryService::new(Arc::new(store.clone()), audit.clone());
        let counterparties = CounterpartyService::new(Arc::new(store.clone()), audit.clone());
        let dashboard = DashboardService::new(Arc::new(store));
        let auth = AuthService::new(
            Arc::new(users),
            JWT_SECRET.to_string(),
            ChronoDuration::hours(1),
        )
        .with_bcrypt_cost(4);
        let state = AppState::from_parts(
            auth,
            inventory,
            counterparties,
            dashboard,
            audit,
            Duration::from_secs(10),
        );
        Self {
            router: build_router(state),
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        extra_headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        for (name, value) in extra_headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None, &[]).await
    }

    async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), Some(body), &[]).await
    }

    async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(token), Some(body), &[]).await
    }

    async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(token), None, &[]).await
    }

    /// Cadastra uma empresa e devolve o token do administrador.
    async fn register(&self, email: &str) -> (String, Value) {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({
                    "companyName": "Quincaillerie Diallo",
                    "companyEmail": format!("company.{email}"),
                    "adminName": "Mamadou",
                    "adminEmail": email,
                    "password": "motdepasse",
                })),
                &[],
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (body["token"].as_str().unwrap().to_string(), body["user"].clone())
    }

    /// Administrador cria um funcionário, que então faz login.
    async fn employee(&self, admin_token: &str, email: &str) -> String {
        let (status, _) = self
            .post(
                "/api/auth/users",
                admin_token,
                json!({ "name": "Aissatou", "email": email, "password": "12345678" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": "12345678" })),
                &[],
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    async fn product(&self, admin_token: &str, name: &str, initial_stock: i32) -> String {
        let (status, body) = self
            .post(
                "/api/products",
                admin_token,
                json!({
                    "name": name,
                    "purchasePrice": 10.0,
                    "salePrice": 15.5,
                    "initialStock": initial_stock,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["stock"], initial_stock);
        body["id"].as_str().unwrap().to_string()
    }
}

fn mint_jwt(tenant_id: Uuid, role: Role, ttl: ChronoDuration) -> String {
    let now = Utc::now();
    let claims = Claims {
        sub: Uuid::new_v4(),
        tenant_id,
        role,
        exp: (now + ttl).timestamp() as usize,
        iat: now.timestamp() as usize,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

#[tokio::test]
async fn health_is_public_and_ledger_requires_a_token() {
    let app = TestApp::spawn();

    let (status, _) = app.send(Method::GET, "/api/health", None, None, &[]).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(Method::GET, "/api/inventory/movements", None, None, &[])
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn expired_token_is_reported_as_such() {
    let app = TestApp::spawn();
    let token = mint_jwt(Uuid::new_v4(), Role::Admin, ChronoDuration::hours(-2));

    let (status, body) = app.get("/api/products", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_EXPIRED");
}

#[tokio::test]
async fn entry_then_reversal_over_http() {
    let app = TestApp::spawn();
    let (admin, _) = app.register("mamadou@example.com").await;
    let product_id = app.product(&admin, "Riz 25kg", 50).await;

    let (status, receipt) = app
        .post(
            "/api/inventory/entries",
            &admin,
            json!({ "productId": product_id, "quantity": 20, "reference": "BL-001" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["newStock"], 70);
    let movement_id = receipt["movementId"].as_str().unwrap().to_string();

    let (status, page) = app
        .get(&format!("/api/inventory/movements?productId={product_id}"), &admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
    assert_eq!(page["limit"], 50);
    assert_eq!(page["items"][0]["id"], movement_id.as_str());
    assert_eq!(page["items"][0]["unitPrice"], 10.0);

    let (status, reversal) = app
        .delete(&format!("/api/inventory/movements/{movement_id}"), &admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reversal["newStock"], 50);
    assert_eq!(reversal["productId"], product_id.as_str());

    let (status, body) = app
        .get(&format!("/api/inventory/movements/{movement_id}"), &admin)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "MOVEMENT_NOT_FOUND");

    let (_, product) = app.get(&format!("/api/products/{product_id}"), &admin).await;
    assert_eq!(product["stock"], 50);
}

#[tokio::test]
async fn insufficient_stock_is_a_localized_conflict() {
    let app = TestApp::spawn();
    let (admin, _) = app.register("awa@example.com").await;
    let product_id = app.product(&admin, "Savon", 2).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/inventory/exits",
            Some(&admin),
            Some(json!({ "productId": product_id, "quantity": 10 })),
            &[("accept-language", "fr-FR,fr;q=0.9")],
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INSUFFICIENT_STOCK");
    assert_eq!(body["details"], json!({ "available": 2, "requested": 10 }));
    assert!(body["error"].as_str().unwrap().starts_with("Stock insuffisant"));

    let (_, product) = app.get(&format!("/api/products/{product_id}"), &admin).await;
    assert_eq!(product["stock"], 2);
}

#[tokio::test]
async fn bad_quantities_and_bodies_are_rejected() {
    let app = TestApp::spawn();
    let (admin, _) = app.register("ousmane@example.com").await;
    let product_id = app.product(&admin, "Clous", 10).await;

    for quantity in [json!(0), json!(-4), json!(2.5)] {
        let (status, body) = app
            .post(
                "/api/inventory/entries",
                &admin,
                json!({ "productId": product_id, "quantity": quantity }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_QUANTITY");
    }

    let (status, body) = app
        .post("/api/inventory/exits", &admin, json!({ "quantity": 1 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = app
        .post(
            "/api/inventory/exits",
            &admin,
            json!({ "productId": Uuid::new_v4(), "quantity": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "PRODUCT_NOT_FOUND");
}

#[tokio::test]
async fn employees_move_stock_but_cannot_reverse() {
    let app = TestApp::spawn();
    let (admin, _) = app.register("chef@example.com").await;
    let employee = app.employee(&admin, "vendeur@example.com").await;
    let product_id = app.product(&admin, "Huile 5L", 8).await;

    let (status, receipt) = app
        .post(
            "/api/inventory/exits",
            &employee,
            json!({ "productId": product_id, "quantity": 3 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["newStock"], 5);

    let movement_id = receipt["movementId"].as_str().unwrap();
    let (status, body) = app
        .delete(&format!("/api/inventory/movements/{movement_id}"), &employee)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = app
        .post("/api/products", &employee, json!({ "name": "X", "purchasePrice": 1, "salePrice": 2 }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn tenants_are_isolated() {
    let app = TestApp::spawn();
    let (first, first_user) = app.register("a@example.com").await;
    let (second, _) = app.register("b@example.com").await;
    let product_id = app.product(&first, "Ciment", 10).await;

    let (status, body) = app
        .post(
            "/api/inventory/exits",
            &second,
            json!({ "productId": product_id, "quantity": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "PRODUCT_NOT_FOUND");

    let (_, page) = app.get("/api/inventory/movements", &second).await;
    assert_eq!(page["total"], 0);

    // Token da segunda empresa pedindo explicitamente a primeira
    let first_tenant = first_user["tenantId"].as_str().unwrap();
    let (status, body) = app
        .send(
            Method::GET,
            "/api/inventory/movements",
            Some(&second),
            None,
            &[("x-tenant-id", first_tenant)],
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "TENANT_MISMATCH");
}

#[tokio::test]
async fn history_records_stock_movements() {
    let app = TestApp::spawn();
    let (admin, _) = app.register("histo@example.com").await;
    let product_id = app.product(&admin, "Peinture", 4).await;

    let (status, _) = app
        .post(
            "/api/inventory/entries",
            &admin,
            json!({ "productId": product_id, "quantity": 6 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // A gravação do histórico é assíncrona: espera um pouco até aparecer.
    let uri = format!("/api/history?productId={product_id}&action=stock_entry");
    for _ in 0..50 {
        let (status, page) = app.get(&uri, &admin).await;
        assert_eq!(status, StatusCode::OK);
        if page["total"] == 1 {
            let description = page["items"][0]["description"].as_str().unwrap();
            assert!(description.contains("4 -> 10"), "{description}");
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("stock entry never showed up in the history");
}

#[tokio::test]
async fn product_names_must_be_unique() {
    let app = TestApp::spawn();
    let (admin, _) = app.register("unique@example.com").await;
    app.product(&admin, "Sucre", 0).await;

    let (status, body) = app
        .post("/api/products", &admin, json!({ "name": "Sucre", "purchasePrice": 1, "salePrice": 2 }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "PRODUCT_NAME_EXISTS");
}

#[tokio::test]
async fn supplier_crud_and_named_entries() {
    let app = TestApp::spawn();
    let (admin, _) = app.register("achats@example.com").await;
    let employee = app.employee(&admin, "magasin@example.com").await;
    let product_id = app.product(&admin, "Farine 50kg", 0).await;

    let (status, supplier) = app
        .post(
            "/api/suppliers",
            &admin,
            json!({ "name": "Grands Moulins", "phone": "+221 33 849 00 00", "email": "vente@moulins.sn" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{supplier}");
    assert_eq!(supplier["kind"], "supplier");
    let supplier_id = supplier["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post("/api/suppliers", &admin, json!({ "name": "Sans mail", "email": "pas-un-email" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    // Funcionário consulta, mas não edita
    let (status, page) = app.get("/api/suppliers?search=moulins", &employee).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    let (status, _) = app
        .put(&format!("/api/suppliers/{supplier_id}"), &employee, json!({ "name": "X" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = app
        .put(&format!("/api/suppliers/{supplier_id}"), &admin, json!({ "address": "Km 4, Dakar" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["address"], "Km 4, Dakar");
    assert_eq!(updated["name"], "Grands Moulins");

    // Fornecedor não aparece na rota de clientes
    let (status, body) = app.get(&format!("/api/clients/{supplier_id}"), &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "COUNTERPARTY_NOT_FOUND");

    let (status, receipt) = app
        .post(
            "/api/inventory/entries",
            &employee,
            json!({ "productId": product_id, "quantity": 12, "counterpartyId": supplier_id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{receipt}");
    let movement_id = receipt["movementId"].as_str().unwrap();

    let (status, movement) = app.get(&format!("/api/inventory/movements/{movement_id}"), &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(movement["productName"], "Farine 50kg");
    assert_eq!(movement["counterpartyName"], "Grands Moulins");
    assert_eq!(movement["userName"], "Aissatou");
    assert_eq!(movement["counterpartyId"], supplier_id.as_str());

    let (status, _) = app.delete(&format!("/api/suppliers/{supplier_id}"), &admin).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, page) = app.get("/api/suppliers", &admin).await;
    assert_eq!(page["total"], 0);

    // O nome continua nas movimentações antigas
    let (_, movement) = app.get(&format!("/api/inventory/movements/{movement_id}"), &admin).await;
    assert_eq!(movement["counterpartyName"], "Grands Moulins");
}

#[tokio::test]
async fn movements_refuse_partners_of_other_tenants_or_kinds() {
    let app = TestApp::spawn();
    let (first, _) = app.register("boutique1@example.com").await;
    let (second, _) = app.register("boutique2@example.com").await;
    let product_id = app.product(&first, "Lait en poudre", 10).await;

    let (_, foreign) = app.post("/api/suppliers", &second, json!({ "name": "Fournisseur B" })).await;
    let (_, client) = app.post("/api/clients", &first, json!({ "name": "Client A" })).await;

    let cases = [
        ("/api/inventory/entries", foreign["id"].clone()),
        ("/api/inventory/entries", client["id"].clone()),
        ("/api/inventory/exits", json!(Uuid::new_v4())),
    ];
    for (uri, counterparty_id) in cases {
        let (status, body) = app
            .post(
                uri,
                &first,
                json!({ "productId": product_id, "quantity": 1, "counterpartyId": counterparty_id }),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body["code"], "COUNTERPARTY_NOT_FOUND");
    }

    let (_, product) = app.get(&format!("/api/products/{product_id}"), &first).await;
    assert_eq!(product["stock"], 10);
    let (_, page) = app.get("/api/inventory/movements", &first).await;
    assert_eq!(page["total"], 1);

    // Saída para o próprio cliente passa
    let (status, _) = app
        .post(
            "/api/inventory/exits",
            &first,
            json!({ "productId": product_id, "quantity": 4, "counterpartyId": client["id"] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn categories_filter_and_sort_the_catalog() {
    let app = TestApp::spawn();
    let (admin, _) = app.register("rayons@example.com").await;

    let (status, drinks) = app
        .post("/api/products/categories", &admin, json!({ "name": "Boissons" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{drinks}");
    let (status, body) = app
        .post("/api/products/categories", &admin, json!({ "name": "Boissons" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CATEGORY_NAME_EXISTS");

    let drinks_id = drinks["id"].as_str().unwrap();
    for (name, price) in [("Jus de bissap", 3.0), ("Eau 1.5L", 1.0), ("Café Touba", 2.0)] {
        let (status, body) = app
            .post(
                "/api/products",
                &admin,
                json!({ "name": name, "purchasePrice": price, "salePrice": price * 2.0, "categoryId": drinks_id }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }
    app.product(&admin, "Savon", 0).await;

    let (status, body) = app
        .post(
            "/api/products",
            &admin,
            json!({ "name": "Orphelin", "purchasePrice": 1, "salePrice": 2, "categoryId": Uuid::new_v4() }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "CATEGORY_NOT_FOUND");

    let (status, page) = app
        .get(
            &format!("/api/products?categoryId={drinks_id}&sort=purchasePrice&direction=desc"),
            &admin,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Jus de bissap", "Café Touba", "Eau 1.5L"]);

    let (status, body) = app.get("/api/products?sort=colour", &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, categories) = app.get("/api/products/categories", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(categories.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn dashboard_reports_today_and_the_chart() {
    let app = TestApp::spawn();
    let (admin, _) = app.register("painel@example.com").await;
    let employee = app.employee(&admin, "caisse@example.com").await;
    let product_id = app.product(&admin, "Thé vert", 3).await;

    let (status, _) = app
        .post(
            "/api/inventory/exits",
            &employee,
            json!({ "productId": product_id, "quantity": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, stats) = app.get("/api/dashboard/stats", &employee).await;
    assert_eq!(status, StatusCode::OK, "{stats}");
    assert_eq!(stats["activeProducts"], 1);
    assert_eq!(stats["today"]["entries"], 3);
    assert_eq!(stats["today"]["exits"], 1);
    // Estoque 2, mínimo padrão 5
    assert_eq!(stats["lowStockCount"], 1);
    assert_eq!(stats["lowStock"][0]["name"], "Thé vert");

    let (status, chart) = app.get("/api/dashboard/chart?period=7", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chart.as_array().unwrap().len(), 1);
    assert_eq!(chart[0]["exitMovements"], 1);

    let (status, body) = app.get("/api/dashboard/chart?period=14", &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}
