//! Job host over in-memory streams and a real `AppState`.

use std::sync::Arc;

use appstate::{AppState, AppStateConfig, Backends};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use tempfile::TempDir;
use tryon_native_messaging::{encode_frame, NativeMessagingConfig, NativeMessagingHost};

fn png_base64(width: u32, height: u32) -> String {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([90, 60, 40]));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    STANDARD.encode(buf.into_inner())
}

fn host(dir: &TempDir, config: NativeMessagingConfig) -> NativeMessagingHost {
    let state = AppState::new(
        AppStateConfig {
            temp_dir: dir.path().join("temp"),
            output_dir: dir.path().join("outputs"),
            error_log: None,
            ..Default::default()
        },
        Backends::reference(),
        0,
    )
    .unwrap();
    NativeMessagingHost::new(Arc::new(state), config)
}

/// Feeds `jobs` through the host and returns the decoded replies.
async fn exchange(host: &NativeMessagingHost, jobs: &[Value]) -> Vec<Value> {
    let mut input = Vec::new();
    for job in jobs {
        input.extend(encode_frame(job).unwrap());
    }
    let mut reader = input.as_slice();
    let mut output = Vec::new();
    host.run(&mut reader, &mut output).await.unwrap();

    let mut replies = Vec::new();
    let mut rest = output.as_slice();
    while !rest.is_empty() {
        let length = u32::from_le_bytes(rest[..4].try_into().unwrap()) as usize;
        replies.push(serde_json::from_slice(&rest[4..4 + length]).unwrap());
        rest = &rest[4 + length..];
    }
    replies
}

#[tokio::test]
async fn test_process_returns_paths_and_images() {
    let dir = TempDir::new().unwrap();
    let host = host(&dir, NativeMessagingConfig::default());

    let job = json!({
        "route": "process",
        "request_id": "job-1",
        "payload": {
            "profile": "hd",
            "category": "upper",
            "samples": 2,
            "steps": 2,
            "modelImage": format!("data:image/png;base64,{}", png_base64(256, 256)),
            "clothImage": png_base64(256, 256),
        }
    });
    let replies = exchange(&host, &[job]).await;

    assert_eq!(replies.len(), 1);
    let reply = &replies[0];
    assert_eq!(reply["request_id"], "job-1");
    assert_eq!(reply["success"], true);
    let data = &reply["data"];
    assert_eq!(data["resultPaths"].as_array().unwrap().len(), 2);
    let images = data["resultImages"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    let decoded = STANDARD.decode(images[0].as_str().unwrap()).unwrap();
    let image = image::load_from_memory(&decoded).unwrap();
    assert_eq!((image.width(), image.height()), (768, 1024));
}

#[tokio::test]
async fn test_result_images_can_be_disabled() {
    let dir = TempDir::new().unwrap();
    let host = host(
        &dir,
        NativeMessagingConfig {
            include_result_images: false,
            ..Default::default()
        },
    );

    let job = json!({
        "route": "process",
        "request_id": "job-2",
        "payload": {
            "model_image": png_base64(200, 300),
            "cloth_image": png_base64(200, 300),
        }
    });
    let replies = exchange(&host, &[job]).await;
    assert_eq!(replies[0]["success"], true);
    assert!(replies[0]["data"].get("resultImages").is_none());
}

#[tokio::test]
async fn test_validation_failure_carries_fields() {
    let dir = TempDir::new().unwrap();
    let host = host(&dir, NativeMessagingConfig::default());

    let job = json!({
        "route": "process",
        "request_id": "job-3",
        "payload": { "profile": "dc", "category": 5 }
    });
    let replies = exchange(&host, &[job]).await;

    let reply = &replies[0];
    assert_eq!(reply["success"], false);
    assert_eq!(reply["error"]["code"], "ValidationError");
    let fields: Vec<&str> = reply["error"]["details"]["fieldErrors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"category"));
    assert!(fields.contains(&"modelImage"));
    assert!(fields.contains(&"clothImage"));
}

#[tokio::test]
async fn test_payload_and_rule_violations_are_reported_together() {
    let dir = TempDir::new().unwrap();
    let host = host(&dir, NativeMessagingConfig::default());

    let job = json!({
        "route": "process",
        "request_id": "job-4",
        "payload": {
            "model_type": "dc",
            "category": 5,
            "samples": "many",
            "modelImage": png_base64(256, 256),
            "clothImage": "not base64!",
        }
    });
    let replies = exchange(&host, &[job]).await;

    let reply = &replies[0];
    assert_eq!(reply["success"], false);
    assert_eq!(reply["error"]["code"], "ValidationError");
    let fields: Vec<&str> = reply["error"]["details"]["fieldErrors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields.len(), 3, "{fields:?}");
    for expected in ["samples", "clothImage", "category"] {
        assert!(fields.contains(&expected), "missing {expected} in {fields:?}");
    }
}

#[tokio::test]
async fn test_bad_jobs_do_not_stop_the_loop() {
    let dir = TempDir::new().unwrap();
    let host = host(&dir, NativeMessagingConfig::default());

    let jobs = [
        json!({ "route": "render", "request_id": "a" }),
        json!({ "route": "process", "request_id": "b", "payload": { "modelImage": "%%%" } }),
        json!({ "route": "", "request_id": "c" }),
        json!({ "route": "health", "request_id": "d" }),
    ];
    let replies = exchange(&host, &jobs).await;

    assert_eq!(replies.len(), 4);
    assert_eq!(replies[0]["error"]["code"], "ROUTE_NOT_FOUND");
    assert_eq!(replies[1]["error"]["code"], "ValidationError");
    assert_eq!(replies[1]["error"]["details"]["fieldErrors"][0]["field"], "modelImage");
    assert_eq!(replies[2]["request_id"], "unknown");
    assert_eq!(replies[3]["request_id"], "d");
    assert_eq!(replies[3]["success"], true);
    assert_eq!(replies[3]["data"]["status"], "unhealthy");
}
