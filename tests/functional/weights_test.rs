//! Functional tests for weight provisioning over HTTP

use colorize_server::model::{InitError, LocalWeights, WeightProvisioner};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WEIGHTS: &[u8] = b"pretend these are 1.4GB of generator weights";

#[tokio::test]
async fn test_downloads_missing_weights() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/deoldify/ColorizeArtistic_gen.pth"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(WEIGHTS))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("models").join("ColorizeArtistic_gen.pth");
    let weights = LocalWeights::new(
        &target,
        Some(format!("{}/deoldify/ColorizeArtistic_gen.pth", server.uri())),
    );

    assert_eq!(weights.ensure_weights().await.unwrap(), target);
    assert_eq!(std::fs::read(&target).unwrap(), WEIGHTS);

    // Present now, so no second request is made
    assert_eq!(weights.ensure_weights().await.unwrap(), target);
}

#[tokio::test]
async fn test_failed_download_reports_missing_weights() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("ColorizeArtistic_gen.pth");
    let url = format!("{}/missing.pth", server.uri());
    let weights = LocalWeights::new(&target, Some(url.clone()));

    let err = weights.ensure_weights().await.unwrap_err();
    match &err {
        InitError::WeightsMissing { path, reason } => {
            assert_eq!(path, &target);
            assert!(reason.contains(&url));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    assert!(!target.exists());
    assert!(!target.with_extension("part").exists());
}

#[tokio::test]
async fn test_empty_download_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("ColorizeArtistic_gen.pth");
    let weights = LocalWeights::new(&target, Some(format!("{}/empty.pth", server.uri())));

    assert!(weights.ensure_weights().await.is_err());
    assert!(!target.exists());
}
