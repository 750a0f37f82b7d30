mod common;

use advisory_backend::models::user::UserStatus;
use advisory_backend::services::email_service::EmailKind;
use axum::http::StatusCode;
use common::{get, json_request, multipart_request, seed_user, setup_app, token_for, Part};
use serde_json::json;

#[tokio::test]
async fn trade_alerts_reach_investors() {
    let app = setup_app().await;
    let (_, admin) = seed_user(&app, "admin-1", &[UserStatus::Admin]).await;
    let (_, investor) = seed_user(&app, "investor-1", &[UserStatus::Investor]).await;
    seed_user(&app, "investor-2", &[UserStatus::Investor]).await;
    let (_, learner) = seed_user(&app, "learner-1", &[UserStatus::Learner]).await;

    let (status, published) = json_request(
        &app,
        "POST",
        "/api/admin/trade-alerts",
        Some(&admin),
        json!({
            "title": "Trim semis",
            "symbol": "smh",
            "action": "sell",
            "target_price": 210.0
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(published["symbol"], "SMH");
    assert_eq!(published["created_by"], "admin-1");
    assert_eq!(published["notified"], 2);
    assert_eq!(published["notification_failures"], 0);

    let recipients: Vec<String> = app
        .mailer
        .sent_of(EmailKind::TradeAlert)
        .into_iter()
        .map(|e| e.to)
        .collect();
    assert_eq!(recipients.len(), 2);
    assert!(!recipients.contains(&"learner-1@example.com".to_string()));

    let (status, alerts) = get(&app, "/api/trade-alerts", Some(&investor)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(alerts.as_array().unwrap().len(), 1);

    let (status, _) = get(&app, "/api/trade-alerts", Some(&learner)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = json_request(
        &app,
        "POST",
        "/api/admin/trade-alerts",
        Some(&investor),
        json!({ "title": "x", "symbol": "x", "action": "buy" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn weekly_report_upload_and_notice() {
    let app = setup_app().await;
    let (_, admin) = seed_user(&app, "admin-1", &[UserStatus::Admin]).await;
    let (_, investor) = seed_user(&app, "investor-1", &[UserStatus::Investor]).await;
    app.mailer.fail(EmailKind::WeeklyReport);

    let (status, published) = multipart_request(
        &app,
        "/api/admin/weekly-reports",
        Some(&admin),
        &[
            Part::Text("title", "Week of June 2"),
            Part::Text("summary", "Rates steady."),
            Part::Text("week_of", "2025-06-02"),
            Part::File {
                name: "file",
                file_name: "weekly.pdf",
                content_type: "application/pdf",
                body: b"%PDF",
            },
        ],
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(published["notified"], 0);
    assert_eq!(published["notification_failures"], 1);

    let id = published["id"].as_str().unwrap();
    let keys = app.blobs.keys().await;
    assert_eq!(keys.len(), 1);
    assert!(keys[0].starts_with(&format!("weekly-reports/{}/", id)));
    let (body, content_type) = app.blobs.get(&keys[0]).await.expect("stored report");
    assert_eq!(&body[..], b"%PDF");
    assert_eq!(content_type, "application/pdf");

    let (status, reports) = get(&app, "/api/weekly-reports", Some(&investor)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reports[0]["week_of"], "2025-06-02");
}

#[tokio::test]
async fn weekly_report_requires_a_file() {
    let app = setup_app().await;
    let (_, admin) = seed_user(&app, "admin-1", &[UserStatus::Admin]).await;

    let (status, _) = multipart_request(
        &app,
        "/api/admin/weekly-reports",
        Some(&admin),
        &[Part::Text("title", "Empty"), Part::Text("week_of", "2025-06-02")],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.blobs.keys().await.is_empty());
}

#[tokio::test]
async fn sign_up_then_admin_grants_statuses() {
    let app = setup_app().await;
    let (_, admin) = seed_user(&app, "admin-1", &[UserStatus::Admin]).await;
    let newcomer = token_for("uid-9", "Morgan", "morgan@example.com");

    let (status, body) = json_request(&app, "POST", "/api/users/me", Some(&newcomer), json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["created"], true);
    assert_eq!(body["user"]["display_name"], "Morgan");

    let (status, body) = json_request(&app, "POST", "/api/users/me", Some(&newcomer), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], false);
    assert_eq!(app.mailer.sent_of(EmailKind::AccountConfirmation).len(), 1);

    let (status, _) = get(&app, "/api/weekly-reports", Some(&newcomer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, user) = json_request(
        &app,
        "PUT",
        "/api/admin/users/uid-9/statuses",
        Some(&admin),
        json!({ "statuses": ["Investor"] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["statuses"], json!(["Investor"]));

    let (status, _) = get(&app, "/api/weekly-reports", Some(&newcomer)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn community_board_posts_and_lists() {
    let app = setup_app().await;
    let (_, member) = seed_user(&app, "member-1", &[UserStatus::Learner]).await;
    let (_, outsider) = seed_user(&app, "outsider", &[]).await;

    let (status, posted) = multipart_request(
        &app,
        "/api/community/messages",
        Some(&member),
        &[
            Part::Text("message", "Anyone following the Fed minutes?"),
            Part::File {
                name: "image",
                file_name: "dot plot.png",
                content_type: "image/png",
                body: b"\x89PNG",
            },
        ],
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(posted["image_url"]
        .as_str()
        .unwrap()
        .starts_with("memory://community-images/member-1/"));

    let (status, _) = multipart_request(
        &app,
        "/api/community/messages",
        Some(&outsider),
        &[Part::Text("message", "let me in")],
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, listed) = get(&app, "/api/community/messages?limit=10", Some(&member)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}
