use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notification_cell::*;
use shared_config::AppConfig;

fn reminder_email() -> EmailMessage {
    EmailMessage {
        to: "patient@example.com".to_string(),
        subject: "Session reminder".to_string(),
        text: "Reminder: please fast 2 hours before your session".to_string(),
    }
}

#[tokio::test]
async fn test_http_sender_posts_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("authorization", "Bearer email-key"))
        .and(body_json(json!({
            "from": "clinic@example.com",
            "to": "patient@example.com",
            "subject": "Session reminder",
            "text": "Reminder: please fast 2 hours before your session"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "msg_1" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sender = HttpEmailSender::new(
        &format!("{}/emails", mock_server.uri()),
        "email-key",
        "clinic@example.com",
    );

    sender.send(&reminder_email()).await.unwrap();
}

#[tokio::test]
async fn test_http_sender_reports_provider_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_string("invalid recipient"))
        .mount(&mock_server)
        .await;

    let sender = HttpEmailSender::new(&mock_server.uri(), "email-key", "clinic@example.com");
    let result = sender.send(&reminder_email()).await;

    assert!(matches!(result, Err(NotificationError::Email(msg)) if msg.contains("invalid recipient")));
}

#[tokio::test]
async fn test_unconfigured_email_is_disabled() {
    assert!(HttpEmailSender::from_config(&AppConfig::default()).is_none());
    DisabledEmailSender.send(&reminder_email()).await.unwrap();
}
