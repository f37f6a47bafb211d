mod common;

use axum::http::{Method, StatusCode};
use kickfund_types::api::MAX_BACKING_AMOUNT;
use kickfund_types::models::StatsPolicy;
use serde_json::{Value, json};

use crate::common::TestApp;

async fn back(app: &TestApp, token: &str, campaign_id: i64, amount: i64) -> (StatusCode, Value) {
    app.json(
        Method::POST,
        &format!("/api/v1/campaigns/{}/back", campaign_id),
        Some(token),
        Some(json!({ "amount": amount })),
    )
    .await
}

#[tokio::test]
async fn backings_accumulate_on_the_campaign() {
    let app = TestApp::new().await;
    let (_, owner) = app.register("Ana", "ana@example.com").await;
    let (backer_id, backer) = app.register("Bia", "bia@example.com").await;
    let id = app.create_campaign(&owner, "Solar Roof", 100_000).await;

    let (status, first) = back(&app, &backer, id, 20_000).await;
    assert_eq!(status, StatusCode::CREATED, "{}", first);
    let tx = &first["data"];
    assert_eq!(tx["amount"], 20_000);
    assert_eq!(tx["status"], "pending");
    assert_eq!(tx["campaign"]["id"], id);
    assert_eq!(tx["user"]["id"], backer_id);
    let code = tx["code"].as_str().unwrap();
    assert!(code.starts_with("TRX-"));
    assert_eq!(tx["payment_url"], format!("https://pay.example/checkout/{}", code));

    let (status, _) = back(&app, &backer, id, 30_000).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, detail) = app.get(&format!("/api/v1/campaigns/{}", id), None).await;
    assert_eq!(detail["data"]["current_amount"], 50_000);
    assert_eq!(detail["data"]["backers_count"], 2);
    assert_eq!(detail["data"]["goal_amount"], 100_000);
}

#[tokio::test]
async fn invalid_backings_change_nothing() {
    let app = TestApp::new().await;
    let (_, owner) = app.register("Ana", "ana@example.com").await;
    let id = app.create_campaign(&owner, "Solar Roof", 100_000).await;

    let (status, _) = back(&app, &owner, id, 0).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = back(&app, &owner, id, -5).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = back(&app, &owner, id + 1, 10).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .json(
            Method::POST,
            &format!("/api/v1/campaigns/{}/back", id),
            None,
            Some(json!({ "amount": 10 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, detail) = app.get(&format!("/api/v1/campaigns/{}", id), None).await;
    assert_eq!(detail["data"]["current_amount"], 0);
    assert_eq!(detail["data"]["backers_count"], 0);
    let (_, ledger) = app.get(&format!("/api/v1/campaigns/{}/transactions", id), None).await;
    assert_eq!(ledger["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn oversized_backing_is_rejected_and_totals_keep_working() {
    let app = TestApp::new().await;
    let (_, owner) = app.register("Ana", "ana@example.com").await;
    let (_, backer) = app.register("Bia", "bia@example.com").await;
    let id = app.create_campaign(&owner, "Roof", 1_000).await;

    for amount in [i64::MAX, MAX_BACKING_AMOUNT + 1] {
        let (status, body) = back(&app, &backer, id, amount).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", body);
    }

    let (status, _) = back(&app, &backer, id, MAX_BACKING_AMOUNT).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = back(&app, &owner, id, 300).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, detail) = app.get(&format!("/api/v1/campaigns/{}", id), None).await;
    assert_eq!(detail["data"]["current_amount"], MAX_BACKING_AMOUNT + 300);
    assert_eq!(detail["data"]["backers_count"], 2);
}

#[tokio::test]
async fn transaction_listings_are_scoped() {
    let app = TestApp::new().await;
    let (_, owner) = app.register("Ana", "ana@example.com").await;
    let (_, bia) = app.register("Bia", "bia@example.com").await;
    let (_, caio) = app.register("Caio", "caio@example.com").await;
    let roof = app.create_campaign(&owner, "Roof", 1_000).await;
    let well = app.create_campaign(&owner, "Well", 1_000).await;

    back(&app, &bia, roof, 10).await;
    back(&app, &bia, well, 20).await;
    back(&app, &caio, roof, 30).await;

    let (status, by_campaign) = app.get(&format!("/api/v1/campaigns/{}/transactions", roof), None).await;
    assert_eq!(status, StatusCode::OK);
    let by_campaign = by_campaign["data"].as_array().unwrap();
    assert_eq!(by_campaign.len(), 2);
    assert!(by_campaign.iter().all(|t| t["campaign"]["id"] == roof));

    let (_, mine) = app.get("/api/v1/me/transactions", Some(&bia)).await;
    let mine = mine["data"].as_array().unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|t| t["user"]["email"] == "bia@example.com"));

    let (status, _) = app.get("/api/v1/transactions", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (_, all) = app.get("/api/v1/transactions", Some(&caio)).await;
    assert_eq!(all["data"].as_array().unwrap().len(), 3);

    let (_, unknown) = app.get("/api/v1/campaigns/999/transactions", None).await;
    assert_eq!(unknown["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn verify_marks_paid_and_is_repeatable() {
    let app = TestApp::new().await;
    let (_, owner) = app.register("Ana", "ana@example.com").await;
    let id = app.create_campaign(&owner, "Roof", 1_000).await;
    let (_, created) = back(&app, &owner, id, 250).await;
    let tx_id = created["data"]["id"].as_i64().unwrap();
    let verify_uri = format!("/api/v1/transactions/{}/verify", tx_id);

    let (status, body) = app.json(Method::PUT, &verify_uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "paid");

    let (status, body) = app.json(Method::PUT, &verify_uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "paid");

    let (status, fetched) = app.get(&format!("/api/v1/transactions/{}", tx_id), Some(&owner)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"]["status"], "paid");

    let (_, detail) = app.get(&format!("/api/v1/campaigns/{}", id), None).await;
    assert_eq!(detail["data"]["current_amount"], 250);
    assert_eq!(detail["data"]["backers_count"], 1);

    let (status, _) = app
        .json(Method::PUT, "/api/v1/transactions/999/verify", Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get("/api/v1/transactions/999", Some(&owner)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn paid_policy_counts_only_verified_backings() {
    let app = TestApp::with_policy(StatsPolicy::Paid).await;
    let (_, owner) = app.register("Ana", "ana@example.com").await;
    let (_, backer) = app.register("Bia", "bia@example.com").await;
    let id = app.create_campaign(&owner, "Roof", 1_000).await;
    let detail_uri = format!("/api/v1/campaigns/{}", id);

    let (_, first) = back(&app, &backer, id, 100).await;
    back(&app, &backer, id, 200).await;

    let (_, detail) = app.get(&detail_uri, None).await;
    assert_eq!(detail["data"]["current_amount"], 0);
    assert_eq!(detail["data"]["backers_count"], 0);

    let first_id = first["data"]["id"].as_i64().unwrap();
    let (status, _) = app
        .json(
            Method::PUT,
            &format!("/api/v1/transactions/{}/verify", first_id),
            Some(&backer),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, detail) = app.get(&detail_uri, None).await;
    assert_eq!(detail["data"]["current_amount"], 100);
    assert_eq!(detail["data"]["backers_count"], 1);
}
