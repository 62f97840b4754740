use httpmock::prelude::*;
use safety_overlay::overlay::client::{HttpBackend, SafetyBackend};
use serde_json::json;

#[test]
fn events_are_decoded_from_the_dashboard_api() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/api/v1/videos/3/events");
        then.status(200).json_body(json!([
            {
                "id": 11,
                "type": "no_helmet",
                "track_id": 7,
                "video_timestamp": 12.4,
                "timestamp": "2024-05-01T10:00:00.123",
                "bbox": [100.0, 120.0, 300.0, 400.0],
                "confidence": 0.87,
                "action": "walking",
                "zone": "Safe Zone"
            },
            {
                "type": "fall",
                "video_timestamp": 13.0,
                "timestamp": "not a date",
                "bbox": null
            }
        ]));
    });

    let backend = HttpBackend::new(&server.url("/api/v1")).unwrap();
    let events = backend.fetch_events(3).unwrap();

    mock.assert();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, "no_helmet");
    assert_eq!(events[0].track_id, Some(7));
    assert!(events[0].timestamp.is_some());
    assert!(events[0].bbox().is_some());
    assert_eq!(events[1].track_id, None);
    assert_eq!(events[1].timestamp, None);
    assert!(events[1].bbox().is_none());
}

#[test]
fn null_video_timestamp_does_not_drop_the_batch() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/videos/3/events");
        then.status(200).json_body(json!([
            {"type": "no_helmet", "track_id": 7, "video_timestamp": 12.4,
             "bbox": [100.0, 120.0, 300.0, 400.0]},
            {"type": null, "track_id": 8, "video_timestamp": null,
             "bbox": [10.0, 10.0, 20.0, 20.0]},
            {"type": "fall", "track_id": 9, "video_timestamp": "late"}
        ]));
    });

    let backend = HttpBackend::new(&server.url("/api/v1")).unwrap();
    let events = backend.fetch_events(3).unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].video_timestamp, Some(12.4));
    assert_eq!(events[1].kind, "");
    assert_eq!(events[1].video_timestamp, None);
}

#[test]
fn zone_is_fetched_by_query_parameter() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/get_zone")
            .query_param("video_id", "4");
        then.status(200)
            .json_body(json!([[0.1, 0.1], [0.9, 0.1], [0.9, 0.9], [0.1, 0.9]]));
    });

    let backend = HttpBackend::new(&server.url("/api/v1")).unwrap();
    let zone = backend.fetch_zone(4).unwrap();

    mock.assert();
    assert_eq!(zone.len(), 4);
    assert_eq!(zone[2], [0.9, 0.9]);
}

#[test]
fn missing_zone_decodes_as_empty() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/get_zone");
        then.status(200).body("null");
    });

    let backend = HttpBackend::new(&server.url("/api/v1")).unwrap();
    assert!(backend.fetch_zone(1).unwrap().is_empty());
}

#[test]
fn zone_save_posts_point_pairs() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/update_zone")
            .query_param("video_id", "4")
            .json_body(json!([[0.1, 0.1], [0.9, 0.1], [0.9, 0.9], [0.1, 0.9]]));
        then.status(200)
            .json_body(json!({"status": "Zone updated", "video_id": 4}));
    });

    let backend = HttpBackend::new(&server.url("/api/v1")).unwrap();
    backend
        .save_zone(4, &[[0.1, 0.1], [0.9, 0.1], [0.9, 0.9], [0.1, 0.9]])
        .unwrap();
    mock.assert();
}

#[test]
fn rejected_zone_save_reports_the_status() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/v1/update_zone");
        then.status(400)
            .json_body(json!({"detail": "Need at least 3 points"}));
    });

    let backend = HttpBackend::new(&server.url("/api/v1")).unwrap();
    let err = backend.save_zone(4, &[[0.1, 0.1]]).unwrap_err();
    assert!(format!("{err:#}").contains("400"));
}

#[test]
fn reprocess_posts_to_the_video_resource() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/api/v1/videos/9/reprocess");
        then.status(200).json_body(json!({"status": "started"}));
    });

    let backend = HttpBackend::new(&server.url("/api/v1/")).unwrap();
    backend.reprocess(9).unwrap();
    mock.assert();
}

#[test]
fn server_errors_surface_as_fetch_failures() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/videos/3/events");
        then.status(500);
    });

    let backend = HttpBackend::new(&server.url("/api/v1")).unwrap();
    assert!(backend.fetch_events(3).is_err());
}
