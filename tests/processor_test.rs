use doc_embeddings_worker::config::WorkerConfig;
use doc_embeddings_worker::infrastructure::processor::setup_processor;
use doc_embeddings_worker::services::processor::{DocumentProcessor, HttpDocumentProcessor};
use mockito::Matcher;
use serde_json::json;

#[tokio::test]
async fn test_process_posts_source_url() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/process")
        .match_header("authorization", "Bearer secret-key")
        .match_body(Matcher::Json(json!({
            "source_url": "https://acct.blob.core.windows.net/docs/a.pdf?sv=2021-08-06&sig=x",
            "filename": "a.pdf"
        })))
        .with_status(202)
        .create_async()
        .await;

    let processor = HttpDocumentProcessor::new(
        reqwest::Client::new(),
        &format!("{}/api/process", server.url()),
        Some("secret-key".to_string()),
    )
    .unwrap();

    processor
        .process(
            "https://acct.blob.core.windows.net/docs/a.pdf?sv=2021-08-06&sig=x",
            "a.pdf",
        )
        .await
        .expect("Processing failed");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_process_error_status_fails() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/process")
        .with_status(500)
        .with_body("model overloaded")
        .create_async()
        .await;

    let processor = HttpDocumentProcessor::new(
        reqwest::Client::new(),
        &format!("{}/api/process", server.url()),
        None,
    )
    .unwrap();

    let err = processor
        .process("https://blob/a.pdf?sig=x", "a.pdf")
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("500"));
    assert!(message.contains("model overloaded"));
}

#[tokio::test]
async fn test_health_check_accepts_any_response() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("HEAD", "/api/process")
        .with_status(405)
        .create_async()
        .await;

    let processor = HttpDocumentProcessor::new(
        reqwest::Client::new(),
        &format!("{}/api/process", server.url()),
        None,
    )
    .unwrap();
    assert!(processor.health_check().await);
}

#[tokio::test]
async fn test_health_check_unreachable() {
    // Nothing listens on port 9 locally
    let processor =
        HttpDocumentProcessor::new(reqwest::Client::new(), "http://127.0.0.1:9/api/process", None)
            .unwrap();
    assert!(!processor.health_check().await);
}

#[tokio::test]
async fn test_unknown_processor_type_fails_startup() {
    let config = WorkerConfig {
        processor_type: "htpp".to_string(),
        ..WorkerConfig::default()
    };

    let err = setup_processor(&config).await.err().unwrap();
    assert!(err.to_string().contains("Unknown processor type 'htpp'"));
}
