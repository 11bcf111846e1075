use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use database::account::{memory::MemoryAccountRepository, repository::DynAccountRepository};
use mongodb::bson::oid::ObjectId;
use serde_json::{json, Value};
use server::{
    extractors::admin_actor::ADMIN_HEADER,
    router::AppRouter,
    services::{account::DocumentStore, Services},
};
use std::sync::Arc;
use tempfile::TempDir;

const BASE: &str = "/api/v1/user-executive";

struct TestApp {
    server: TestServer,
    dir: TempDir,
    admin: HeaderValue,
}

fn test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let repository = Arc::new(MemoryAccountRepository::new()) as DynAccountRepository;
    let services = Services::from_parts(repository, DocumentStore::new(dir.path()));
    let server = TestServer::new(AppRouter::new(services)).unwrap();

    TestApp {
        server,
        dir,
        admin: HeaderValue::from_str(&ObjectId::new().to_hex()).unwrap(),
    }
}

fn admin_header() -> HeaderName {
    HeaderName::from_static(ADMIN_HEADER)
}

fn account_body(mobile: &str, aadhar: &str, pan: &str) -> Value {
    json!({
        "userType": "Retailer",
        "name": "Ravi Kumar",
        "dateOfBirth": "1990-06-15",
        "mobile": mobile,
        "email": "ravi@example.com",
        "aadharNumber": aadhar,
        "panNumber": pan,
        "pinCode": "560001",
        "state": "Karnataka",
        "city": "Bengaluru",
        "address": "12 MG Road"
    })
}

async fn create(app: &TestApp, body: Value) -> Value {
    let response = app
        .server
        .post(BASE)
        .add_header(admin_header(), app.admin.clone())
        .json(&body)
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    for path in ["/api/v1/", "/api/v1"] {
        let response = app.server.get(path).await;

        response.assert_status_ok();
        response.assert_text("Server is running! 🚀");
    }
}

#[tokio::test]
async fn test_create_requires_admin_header() {
    let app = test_app();
    let response = app
        .server
        .post(BASE)
        .json(&account_body("9876543210", "123412341234", "ABCDE1234F"))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_and_get_account() {
    let app = test_app();
    let created = create(&app, account_body("9876543210", "123412341234", "abcde1234f")).await;

    assert_eq!(created["panNumber"], "ABCDE1234F");
    assert_eq!(created["availablePoints"], 0);
    assert_eq!(created["isVerified"], false);
    assert_eq!(created["pointPercentage"], 100);
    assert_eq!(created["createdBy"], app.admin.to_str().unwrap());
    assert!(created.get("_id").is_none());

    let id = created["id"].as_str().unwrap().to_string();
    let response = app.server.get(&format!("{}/{}", BASE, id)).await;
    response.assert_status_ok();
    let fetched = response.json::<Value>();
    assert_eq!(fetched["mobile"], "9876543210");
    assert!(fetched["age"].as_u64().unwrap() >= 35);
}

#[tokio::test]
async fn test_invalid_fields_are_rejected() {
    let app = test_app();
    let response = app
        .server
        .post(BASE)
        .add_header(admin_header(), app.admin.clone())
        .json(&account_body("12345", "123412341234", "ABCDE1234F"))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert_eq!(body["errors"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_duplicate_identity_is_conflict() {
    let app = test_app();
    create(&app, account_body("9876543210", "123412341234", "ABCDE1234F")).await;

    let response = app
        .server
        .post(BASE)
        .add_header(admin_header(), app.admin.clone())
        .json(&account_body("9000000000", "123412341234", "PQRST6789K"))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body = response.json::<Value>();
    assert_eq!(body["errors"]["message"][0], "Account already exists with this Aadhar number");
}

#[tokio::test]
async fn test_points_flow() {
    let app = test_app();
    let created = create(&app, account_body("9876543210", "123412341234", "ABCDE1234F")).await;
    let path = format!("{}/{}/points", BASE, created["id"].as_str().unwrap());

    for (points, operation, kind) in [(100, "add", "earned"), (50, "add", "refer"), (120, "deduct", "earned")] {
        app.server
            .patch(&path)
            .add_header(admin_header(), app.admin.clone())
            .json(&json!({ "points": points, "operation": operation, "type": kind }))
            .await
            .assert_status_ok();
    }

    let response = app
        .server
        .patch(&path)
        .add_header(admin_header(), app.admin.clone())
        .json(&json!({ "points": 40, "operation": "deduct" }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["errors"]["code"], "INSUFFICIENT_BALANCE");

    let response = app
        .server
        .patch(&path)
        .add_header(admin_header(), app.admin.clone())
        .json(&json!({ "points": -1, "operation": "add" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let fetched = app
        .server
        .get(&format!("{}/{}", BASE, created["id"].as_str().unwrap()))
        .await
        .json::<Value>();
    assert_eq!(fetched["availablePoints"], 30);
    assert_eq!(fetched["redeemAmount"], 120);
    assert_eq!(fetched["referPoints"], 50);
}

#[tokio::test]
async fn test_verification_flow() {
    let app = test_app();
    let created = create(&app, account_body("9876543210", "123412341234", "ABCDE1234F")).await;
    let path = format!("{}/{}/verification", BASE, created["id"].as_str().unwrap());

    let verified = app
        .server
        .patch(&path)
        .add_header(admin_header(), app.admin.clone())
        .json(&json!({ "isVerified": true }))
        .await
        .json::<Value>();
    assert_eq!(verified["isVerified"], true);
    assert!(verified["verificationDate"].is_string());

    let unverified = app
        .server
        .patch(&path)
        .add_header(admin_header(), app.admin.clone())
        .json(&json!({ "isVerified": false }))
        .await
        .json::<Value>();
    assert_eq!(unverified["isVerified"], false);
    assert!(unverified["verificationDate"].is_null());
    assert_eq!(unverified["unverifyReason"], "No reason provided");
}

#[tokio::test]
async fn test_referral_and_delete_flow() {
    let app = test_app();
    let referrer = create(&app, account_body("9876543210", "123412341234", "ABCDE1234F")).await;

    let mut body = account_body("8765432109", "432143214321", "PQRST6789K");
    body["referCode"] = json!("9876543210");
    let referred = create(&app, body).await;
    let referrer_path = format!("{}/{}", BASE, referrer["id"].as_str().unwrap());

    let fetched = app.server.get(&referrer_path).await.json::<Value>();
    assert_eq!(fetched["totalReferredUsers"], 1);
    assert_eq!(fetched["referredUsers"][0], referred["id"]);
    assert_eq!(referred["referredBy"], referrer["id"]);

    app.server
        .delete(&format!("{}/{}", BASE, referred["id"].as_str().unwrap()))
        .add_header(admin_header(), app.admin.clone())
        .await
        .assert_status_ok();

    let fetched = app.server.get(&referrer_path).await.json::<Value>();
    assert_eq!(fetched["totalReferredUsers"], 0);
    assert_eq!(fetched["referredUsers"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_documents_flow() {
    let app = test_app();
    let created = create(&app, account_body("9876543210", "123412341234", "ABCDE1234F")).await;
    let path = format!("{}/{}/documents", BASE, created["id"].as_str().unwrap());
    std::fs::write(app.dir.path().join("pan-1.pdf"), b"%PDF").unwrap();

    let response = app
        .server
        .post(&path)
        .add_header(admin_header(), app.admin.clone())
        .json(&json!({
            "documents": [{
                "type": "pan_card",
                "filename": "pan-1.pdf",
                "originalName": "pan.pdf",
                "mimetype": "application/pdf",
                "size": 4
            }]
        }))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    let documents = body["documents"].as_array().unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0]["url"], "/uploads/documents/pan-1.pdf");

    // 已存储文件通过静态目录对外提供
    app.server.get("/uploads/documents/pan-1.pdf").await.assert_status_ok();

    let doc_id = documents[0]["id"].as_str().unwrap();
    let response = app
        .server
        .delete(&format!("{}/{}", path, doc_id))
        .add_header(admin_header(), app.admin.clone())
        .await;
    response.assert_status_ok();
    assert!(response.json::<Value>()["documents"].as_array().unwrap().is_empty());
    assert!(!app.dir.path().join("pan-1.pdf").exists());
}

#[tokio::test]
async fn test_statistics_and_unknown_routes() {
    let app = test_app();

    let empty = app.server.get(&format!("{}/stats/overview", BASE)).await.json::<Value>();
    assert_eq!(empty["overview"]["totalUsers"], 0);
    assert_eq!(empty["overview"]["totalAvailablePoints"], 0);

    create(&app, account_body("9876543210", "123412341234", "ABCDE1234F")).await;
    let stats = app.server.get(&format!("{}/stats/overview", BASE)).await.json::<Value>();
    assert_eq!(stats["overview"]["totalUsers"], 1);
    assert_eq!(stats["overview"]["unverifiedUsers"], 1);
    assert_eq!(stats["userTypeDistribution"][0]["userType"], "Retailer");

    let response = app.server.get(&format!("{}/{}", BASE, ObjectId::new().to_hex())).await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = app.server.get(&format!("{}/not-an-id", BASE)).await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = app.server.get("/api/v2/nothing").await;
    response.assert_status(StatusCode::NOT_FOUND);
}
