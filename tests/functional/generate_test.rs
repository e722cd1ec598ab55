//! Functional tests for the /generate endpoint

mod support;

use axum::{body::Body, http::Request, http::StatusCode};
use image::Rgb;
use img2img_serving::imaging::codec;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use support::{app, gateway, post_json, send, solid_png_b64, Exhausted, Recolor};

fn recolor(calls: &Arc<AtomicUsize>) -> Recolor {
    Recolor {
        color: Rgb([20, 200, 60]),
        calls: calls.clone(),
    }
}

#[tokio::test]
async fn test_generate_preserves_original_dimensions() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = app(gateway(recolor(&calls)));
    let input = solid_png_b64(300, 200, Rgb([220, 30, 30]));

    let (status, body) = post_json(
        app,
        json!({ "prompt": "a red circle", "control_image": input }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let generated = body["generated_image"].as_str().unwrap();
    let output = codec::decode(generated).unwrap();

    assert_eq!((output.width(), output.height()), (300, 200));
    assert_ne!(generated, input);
    let Rgb(pixel) = *output.to_rgb8().get_pixel(150, 100);
    for (got, want) in pixel.iter().zip([20u8, 200, 60]) {
        assert!(got.abs_diff(want) <= 1, "pixel {:?}", pixel);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_generate_accepts_data_url_input() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = app(gateway(recolor(&calls)));
    let input = format!(
        "data:image/png;base64,{}",
        solid_png_b64(64, 48, Rgb([0, 0, 255]))
    );

    let (status, body) = post_json(
        app,
        json!({ "prompt": "a blue square", "control_image": input }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let output = codec::decode(body["generated_image"].as_str().unwrap()).unwrap();
    assert_eq!((output.width(), output.height()), (64, 48));
}

#[tokio::test]
async fn test_missing_prompt_is_rejected_without_inference() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = app(gateway(recolor(&calls)));

    let (status, body) = post_json(
        app,
        json!({ "control_image": solid_png_b64(8, 8, Rgb([1, 2, 3])) }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("prompt"));
    assert_eq!(body["stage"], "validate");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_control_image_is_rejected_without_inference() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = app(gateway(recolor(&calls)));

    let (status, body) = post_json(app, json!({ "prompt": "a red circle" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("control_image"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_json_is_client_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = app(gateway(recolor(&calls)));

    let (status, body) = send(app, support::generate_request("{\"prompt\": ")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_undecodable_image_fails_at_decode_stage() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = app(gateway(recolor(&calls)));

    let (status, body) = post_json(
        app,
        json!({ "prompt": "a red circle", "control_image": "bm90IGFuIGltYWdl" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["stage"], "decode");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_resource_failure_returns_500_and_service_keeps_serving() {
    let exhausted_calls = Arc::new(AtomicUsize::new(0));
    let failing = app(gateway(Exhausted {
        calls: exhausted_calls.clone(),
    }));
    let input = solid_png_b64(300, 200, Rgb([220, 30, 30]));

    let (status, body) = post_json(
        failing.clone(),
        json!({ "prompt": "a red circle", "control_image": input }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("out of memory"));
    assert_eq!(body["stage"], "generate");
    assert_eq!(exhausted_calls.load(Ordering::SeqCst), 1);

    // The same router answers the next request rather than dying
    let (status, _) = post_json(
        failing,
        json!({ "prompt": "a red circle", "control_image": input }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(exhausted_calls.load(Ordering::SeqCst), 2);

    // An independent request against a working pipeline succeeds afterwards
    let calls = Arc::new(AtomicUsize::new(0));
    let (status, body) = post_json(
        app(gateway(recolor(&calls))),
        json!({ "prompt": "a red circle", "control_image": input }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["generated_image"].is_string());
}

#[tokio::test]
async fn test_health_reports_model_and_counters() {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = app(gateway(recolor(&calls)));

    let (status, _) = post_json(
        app.clone(),
        json!({ "prompt": "a red circle", "control_image": solid_png_b64(10, 10, Rgb([9, 9, 9])) }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        app,
        Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model"], "stabilityai/sdxl-turbo");
    assert_eq!(body["pipeline"], "recolor");
    assert_eq!(body["inferences"], 1);
    assert_eq!(body["failures"], 0);
}
