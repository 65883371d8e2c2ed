//! Integration tests for the catalog: bootstrap, CRUD, filters, persistence.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use serde_json::{Value, json};
use stockroom_integration_tests::{
    SeedServer, TestContext, UNREACHABLE_SEED_URL, seed_items,
};

async fn list(ctx: &TestContext, query: &str) -> (StatusCode, Value) {
    let resp = ctx
        .client
        .get(ctx.url(&format!("/api/v1/products{query}")))
        .send()
        .await
        .unwrap();
    let status = resp.status();
    (status, resp.json().await.unwrap())
}

const EVERYTHING: &str = "?minPrice=0&maxPrice=1000000&minStock=0&maxStock=1000000";

fn names(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect()
}

// ============================================================================
// Bootstrap
// ============================================================================

#[tokio::test]
async fn test_first_listing_bootstraps_once() {
    let seed = SeedServer::start(seed_items()).await;
    let ctx = TestContext::new(&seed).await;

    let resp = ctx.client.get(ctx.url("/health/ready")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = list(&ctx, EVERYTHING).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 200);
    assert_eq!(
        names(&body),
        [
            "Classic Grey Hooded Sweatshirt",
            "Classic Black Baseball Cap",
            "Sleek Wireless Mouse"
        ]
    );
    let ids: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["_id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, ["1", "2", "3"]);

    list(&ctx, EVERYTHING).await;
    list(&ctx, "").await;
    assert_eq!(seed.hits(), 1);

    let resp = ctx.client.get(ctx.url("/health/ready")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_bootstrap_survives_restart() {
    let seed = SeedServer::start(seed_items()).await;
    let ctx = TestContext::new(&seed).await;
    list(&ctx, EVERYTHING).await;
    assert_eq!(seed.hits(), 1);

    let ctx = ctx.restart().await;
    let (_, body) = list(&ctx, EVERYTHING).await;
    assert_eq!(names(&body).len(), 3);
    assert_eq!(seed.hits(), 1);
}

#[tokio::test]
async fn test_unreachable_seed_does_not_fail_reads() {
    let ctx = TestContext::with_env(UNREACHABLE_SEED_URL, &[]).await;

    let (status, body) = list(&ctx, EVERYTHING).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());
    assert!(!ctx.state.store().has_started().await);

    let resp = ctx.client.get(ctx.url("/health/ready")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_admin_bootstrap_reports_unavailable_source() {
    let ctx = TestContext::with_env(
        UNREACHABLE_SEED_URL,
        &[("STOCKROOM_ADMIN_USERNAMES", "root")],
    )
    .await;
    let token = ctx.token("root").await;

    let resp = ctx
        .client
        .post(ctx.url("/api/v1/catalog/bootstrap"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_empty_catalog_then_reseed() {
    let seed = SeedServer::start(seed_items()).await;
    let ctx = TestContext::with_env(&seed.url, &[("STOCKROOM_ADMIN_USERNAMES", "root")]).await;
    let token = ctx.token("root").await;
    list(&ctx, EVERYTHING).await;

    let resp = ctx
        .client
        .delete(ctx.url("/api/v1/catalog"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!ctx.state.store().has_started().await);
    assert_eq!(ctx.state.store().list_users().await.len(), 1);

    let resp = ctx
        .client
        .post(ctx.url("/api/v1/catalog/bootstrap"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["seeded"], 3);
    assert_eq!(seed.hits(), 2);
}

// ============================================================================
// CRUD
// ============================================================================

#[tokio::test]
async fn test_product_crud() {
    let seed = SeedServer::start(json!([])).await;
    let ctx = TestContext::new(&seed).await;
    let token = ctx.token("alice").await;

    // Create
    let resp = ctx
        .client
        .post(ctx.url("/api/v1/product"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Desk", "description": "Oak", "price": 120.5, "quantity": 4 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], 201);
    let id = body["data"]["_id"].as_str().unwrap().to_string();

    // Conflict on the same id
    let resp = ctx
        .client
        .post(ctx.url("/api/v1/product"))
        .bearer_auth(&token)
        .json(&json!({ "_id": id, "name": "Desk", "price": 1, "quantity": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    // Update
    let resp = ctx
        .client
        .put(ctx.url("/api/v1/product"))
        .bearer_auth(&token)
        .json(&json!({ "_id": id, "name": "Standing Desk", "price": 300, "quantity": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let (_, body) = list(&ctx, EVERYTHING).await;
    assert_eq!(names(&body), ["Standing Desk"]);

    // Delete
    let resp = ctx
        .client
        .delete(ctx.url(&format!("/api/v1/products/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ctx
        .client
        .delete(ctx.url(&format!("/api/v1/products/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let (_, body) = list(&ctx, EVERYTHING).await;
    assert!(names(&body).is_empty());
}

#[tokio::test]
async fn test_mutations_require_token() {
    let seed = SeedServer::start(json!([])).await;
    let ctx = TestContext::new(&seed).await;

    let resp = ctx
        .client
        .post(ctx.url("/api/v1/product"))
        .json(&json!({ "name": "Desk", "price": 1, "quantity": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = ctx
        .client
        .delete(ctx.url("/api/v1/products/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_rejects_bad_ids() {
    let seed = SeedServer::start(json!([])).await;
    let ctx = TestContext::new(&seed).await;
    let token = ctx.token("alice").await;

    for id in ["0", "", "abc"] {
        let resp = ctx
            .client
            .put(ctx.url("/api/v1/product"))
            .bearer_auth(&token)
            .json(&json!({ "_id": id, "name": "X", "price": 1, "quantity": 1 }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{id:?}");
    }

    let resp = ctx
        .client
        .put(ctx.url("/api/v1/product"))
        .bearer_auth(&token)
        .json(&json!({ "_id": "42", "name": "X", "price": 1, "quantity": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Filters
// ============================================================================

#[tokio::test]
async fn test_filter_bounds() {
    let seed = SeedServer::start(seed_items()).await;
    let ctx = TestContext::new(&seed).await;
    list(&ctx, EVERYTHING).await;

    let (_, body) = list(
        &ctx,
        "?minPrice=50&maxPrice=90&minStock=0&maxStock=1000",
    )
    .await;
    assert_eq!(
        names(&body),
        ["Classic Grey Hooded Sweatshirt", "Classic Black Baseball Cap"]
    );

    // Unspecified bounds default to zero.
    let (_, body) = list(&ctx, "").await;
    assert!(names(&body).is_empty());
}

#[tokio::test]
async fn test_unbounded_filter_defaults() {
    let seed = SeedServer::start(seed_items()).await;
    let ctx = TestContext::with_env(&seed.url, &[("STOCKROOM_LEGACY_FILTER_DEFAULTS", "false")])
        .await;

    let (_, body) = list(&ctx, "").await;
    assert_eq!(names(&body).len(), 3);
}

#[tokio::test]
async fn test_malformed_filter() {
    let seed = SeedServer::start(json!([])).await;
    let ctx = TestContext::new(&seed).await;

    let (status, body) = list(&ctx, "?minPrice=-5").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);

    let (status, _) = list(&ctx, "?minStock=lots").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_state_survives_restart() {
    let seed = SeedServer::start(json!([])).await;
    let ctx = TestContext::new(&seed).await;
    let token = ctx.token("alice").await;

    for name in ["Desk", "Chair"] {
        ctx.client
            .post(ctx.url("/api/v1/product"))
            .bearer_auth(&token)
            .json(&json!({ "name": name, "price": 10, "quantity": 1 }))
            .send()
            .await
            .unwrap();
    }
    let before = ctx.state.store().snapshot().await;

    let ctx = ctx.restart().await;
    assert_eq!(ctx.state.store().snapshot().await, before);

    // Tokens stay valid across restarts; the next id continues the sequence.
    let resp = ctx
        .client
        .post(ctx.url("/api/v1/product"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Lamp", "price": 10, "quantity": 1 }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["_id"], "3");

    let resp = ctx.login("alice", "secret123").await;
    assert_eq!(resp.status(), StatusCode::OK);
}
