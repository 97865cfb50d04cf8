use axum::body::Body;
use axum::http::Request;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ov_core::config::OpenVikingConfig;
use ov_server::{app_with_state, state::AppState};
use tokio::runtime::Runtime;
use tower::ServiceExt;

fn make_state(root: &std::path::Path) -> AppState {
    AppState::new(&OpenVikingConfig::default(), root.to_str().unwrap()).unwrap()
}

fn bench_http_health(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let state = make_state(dir.path());
    c.bench_function("http_health_1000", |b| {
        b.iter(|| {
            rt.block_on(async {
                for _ in 0..1000 {
                    let app = app_with_state(state.clone());
                    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
                    let resp = app.oneshot(req).await.unwrap();
                    black_box(resp.status());
                }
            })
        })
    });
}

fn bench_http_add_resource(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();

    c.bench_function("http_add_resource_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                let state = make_state(dir.path());
                for i in 0..100 {
                    let app = app_with_state(state.clone());
                    let body = serde_json::json!({
                        "title": format!("bench-{i}"),
                        "content": format!("# Benchmark resource {i}\n\nSome content."),
                    });
                    let req = Request::builder()
                        .method("POST")
                        .uri("/api/v1/resources")
                        .header("content-type", "application/json")
                        .body(Body::from(serde_json::to_vec(&body).unwrap()))
                        .unwrap();
                    let resp = app.oneshot(req).await.unwrap();
                    black_box(resp.status());
                }
            })
        })
    });
}

criterion_group!(benches, bench_http_health, bench_http_add_resource);
criterion_main!(benches);
