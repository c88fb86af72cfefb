//! Failover across real HTTP providers backed by mock servers

use email_failover::{
    Attachment, EmailError, EmailProvider, FailoverMailer, MockProvider, PostmarkConfig,
    PostmarkProvider, ProviderFailure, SendGridConfig, SendGridProvider, SendOptions,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn sendgrid(status_profile: u16, status_send: u16) -> (MockServer, SendGridProvider) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .respond_with(ResponseTemplate::new(status_profile))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .respond_with(ResponseTemplate::new(status_send).insert_header("x-message-id", "sg-1"))
        .mount(&server)
        .await;

    let config = SendGridConfig::new("SG.key", "noreply@example.com", "Example")
        .with_api_url(server.uri());
    (server, SendGridProvider::new(config).unwrap())
}

async fn postmark(message_id: &str) -> (MockServer, PostmarkProvider) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/server"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ID": 7 })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/email"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "MessageID": message_id })))
        .mount(&server)
        .await;

    let config = PostmarkConfig::new("pm-token", "noreply@example.com", "Example")
        .with_api_url(server.uri());
    (server, PostmarkProvider::new(config).unwrap())
}

mod failover_tests {
    use super::*;

    #[tokio::test]
    async fn test_rejected_api_key_fails_over_to_postmark() {
        let (sg_server, sendgrid) = sendgrid(401, 401).await;
        let (_pm_server, postmark) = postmark("pm-42").await;

        let mut mailer = FailoverMailer::with_default_provider(Some("SendGrid"));
        mailer.add_provider(postmark).add_provider(sendgrid);

        let sent = mailer
            .send("user@example.com", "Hello", "<p>Hi</p>", &SendOptions::new())
            .await
            .unwrap();

        assert_eq!(sent.provider, "postmark");
        assert_eq!(sent.message_id.as_deref(), Some("pm-42"));

        let requests = sg_server.received_requests().await.unwrap();
        assert!(requests.iter().all(|r| r.url.path() == "/user/profile"));
    }

    #[tokio::test]
    async fn test_rejected_api_key_appears_in_aggregate() {
        let (_sg_server, sendgrid) = sendgrid(401, 401).await;

        let mut mailer = FailoverMailer::new();
        mailer.add_provider(sendgrid);

        let err = mailer
            .send("user@example.com", "Hello", "<p>Hi</p>", &SendOptions::new())
            .await
            .unwrap_err();

        assert_eq!(
            err.failures(),
            &[ProviderFailure::new("sendgrid", "authentication failed")]
        );
        assert_eq!(
            err.to_string(),
            "All email service providers failed. Errors: [sendgrid] authentication failed"
        );
    }

    #[tokio::test]
    async fn test_down_provider_is_skipped_without_diagnostic() {
        let (_sg_server, sendgrid) = sendgrid(503, 202).await;
        let fallback = MockProvider::failing("smtp", "connection refused");

        let mut mailer = FailoverMailer::new();
        mailer.add_provider(sendgrid).add_provider(fallback.clone());

        let err = mailer
            .send("user@example.com", "Hello", "<p>Hi</p>", &SendOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(err, EmailError::AllProvidersFailed { .. }));
        assert_eq!(
            err.failures(),
            &[ProviderFailure::new("smtp", "connection refused")]
        );
        assert_eq!(fallback.send_attempts(), 1);
    }

    #[tokio::test]
    async fn test_validation_failure_is_recorded_per_provider() {
        let (_sg_server, sendgrid) = sendgrid(200, 202).await;
        let (_pm_server, postmark) = postmark("unused").await;

        let mut mailer = FailoverMailer::new();
        mailer.add_provider(sendgrid).add_provider(postmark);

        let err = mailer
            .send("not-an-address", "Hello", "<p>Hi</p>", &SendOptions::new())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "All email service providers failed. Errors: \
             [sendgrid] Invalid recipient email address; \
             [postmark] Invalid recipient email address"
        );
    }

    #[tokio::test]
    async fn test_options_reach_the_accepting_provider() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report.csv");
        std::fs::write(&file, "a,b").unwrap();

        let down = MockProvider::unavailable("primary");
        let backup = MockProvider::new("backup");

        let mut mailer = FailoverMailer::new();
        mailer.add_provider(down).add_provider(backup.clone());

        let options = SendOptions::new()
            .with_from("ops@example.com")
            .with_bcc("audit@example.com")
            .with_attachment(Attachment::new(&file, "report.csv").with_content_type("text/csv"));

        mailer
            .send("user@example.com", "Report", "<p>See attached</p>", &options)
            .await
            .unwrap();

        let sent = backup.sent_emails().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].options, options);
    }

    #[tokio::test]
    async fn test_registration_behind_rwlock_while_sending() {
        let mailer = Arc::new(RwLock::new(FailoverMailer::new()));
        mailer.write().await.add_provider(MockProvider::unavailable("primary"));

        let err = mailer
            .read()
            .await
            .send("user@example.com", "Hello", "Body", &SendOptions::new())
            .await
            .unwrap_err();
        assert!(err.failures().is_empty());

        let backup = MockProvider::new("backup");
        mailer.write().await.add_provider(backup.clone());

        let sent = mailer
            .read()
            .await
            .send("user@example.com", "Hello", "Body", &SendOptions::new())
            .await
            .unwrap();
        assert_eq!(sent.provider, "backup");
        assert!(backup.was_sent_to("user@example.com").await);
    }

    #[tokio::test]
    async fn test_shared_provider_registration() {
        let shared: Arc<dyn EmailProvider> = Arc::new(MockProvider::new("Shared"));

        let mut mailer = FailoverMailer::new();
        mailer.add_shared_provider(Arc::clone(&shared));

        assert!(mailer.provider("shared").is_some());
        assert_eq!(mailer.available_providers().await.len(), 1);
    }
}
