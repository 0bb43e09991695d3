//! Integration tests for the pass-through service clients against mock backends.

use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use omnicron::config::ServiceConfig;
use omnicron::services::{
    fetch_image, ExtractedText, HttpSongService, HttpTextExtractor, ServiceError, SongService,
    TextExtractor, Upload,
};
use omnicron::Error;

fn service(server: &MockServer) -> ServiceConfig {
    ServiceConfig {
        url: format!("{}/", server.uri()),
        timeout_secs: 5,
    }
}

fn upload(filename: &str, content_type: &str) -> Upload {
    Upload {
        filename: filename.to_string(),
        content_type: Some(content_type.to_string()),
        bytes: Bytes::from_static(b"payload"),
    }
}

#[tokio::test]
async fn test_fetch_image_returns_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cat.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
        .expect(1)
        .mount(&server)
        .await;

    let bytes = tokio_test::assert_ok!(
        fetch_image(&Client::new(), &format!("{}/cat.png", server.uri()), None).await
    );

    assert_eq!(bytes.as_ref(), &[0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn test_fetch_image_404_is_download_failed_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = fetch_image(
        &Client::new(),
        &format!("{}/missing.png", server.uri()),
        Some(Duration::from_secs(2)),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::DownloadFailed(_)), "{err}");
}

#[tokio::test]
async fn test_song_search_passes_query_and_limit() {
    let server = MockServer::start().await;
    let tracks = serde_json::json!({"tracks": [{"title": "Levitating"}]});
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("query", "dua lipa"))
        .and(query_param("limit", "6"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tracks.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let songs = HttpSongService::new(&service(&server), Client::new());
    let result = songs.search("dua lipa", 6, None).await.unwrap();

    assert_eq!(result, tracks);
}

#[tokio::test]
async fn test_song_recognize_posts_upload() {
    let server = MockServer::start().await;
    let matched = serde_json::json!({"matches": [{"id": "42"}], "track": {"title": "Levitating"}});
    Mock::given(method("POST"))
        .and(path("/recognize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(matched.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let songs = HttpSongService::new(&service(&server), Client::new());
    let result = songs.recognize(upload("clip.mp3", "audio/mpeg")).await.unwrap();

    assert_eq!(result, matched);
}

#[tokio::test]
async fn test_song_backend_error_is_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("recognizer crashed"))
        .mount(&server)
        .await;

    let songs = HttpSongService::new(&service(&server), Client::new());
    let err = songs.recognize(upload("clip.mp3", "audio/mpeg")).await.unwrap_err();

    match err {
        ServiceError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "recognizer crashed");
        }
        other => panic!("expected Status, got {other}"),
    }
}

#[tokio::test]
async fn test_ocr_document_goes_to_document_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/document"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": ["p1", "p2"]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let extractor = HttpTextExtractor::new(&service(&server), Client::new());
    let text = extractor
        .extract(upload("book.pdf", "application/pdf"))
        .await
        .unwrap();

    assert_eq!(text, ExtractedText::Pages(vec!["p1".into(), "p2".into()]));
}

#[tokio::test]
async fn test_ocr_image_goes_to_image_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/image"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "hello world"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let extractor = HttpTextExtractor::new(&service(&server), Client::new());
    let text = extractor.extract(upload("scan.jpg", "image/jpeg")).await.unwrap();

    assert_eq!(text, ExtractedText::Text("hello world".into()));
}

#[tokio::test]
async fn test_ocr_single_page_document_still_pages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/document"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "only page"})),
        )
        .mount(&server)
        .await;

    let extractor = HttpTextExtractor::new(&service(&server), Client::new());
    let text = extractor.extract(upload("notes.txt", "text/plain")).await.unwrap();

    assert_eq!(text, ExtractedText::Pages(vec!["only page".into()]));
}

#[tokio::test]
async fn test_ocr_garbage_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let extractor = HttpTextExtractor::new(&service(&server), Client::new());
    let err = tokio_test::assert_err!(extractor.extract(upload("scan.jpg", "image/jpeg")).await);

    assert!(matches!(err, ServiceError::InvalidResponse(_)), "{err}");
}
