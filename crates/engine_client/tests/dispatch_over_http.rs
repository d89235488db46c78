use std::{sync::Arc, time::Duration};

use axum::{extract::Path, extract::State, http::StatusCode, routing::put, Json, Router};
use engine_client::{
    DispatchConfig, Dispatcher, HttpEngineWriter, WriteSubmitter, WriterTimeouts,
};
use serde_json::Value;
use shared::{
    domain::{Column, LayerTarget, RowIndex},
    protocol::{Endpoint, LayerWrite, WireFormat, DEFAULT_COLOUR_POINTER},
};
use tokio::{net::TcpListener, runtime::Handle, sync::Mutex};

type Seen = Arc<Mutex<Vec<(String, String)>>>;

async fn record_put(
    State(seen): State<Seen>,
    Path((layer, _clip)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> StatusCode {
    let colour = body
        .pointer(DEFAULT_COLOUR_POINTER)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    seen.lock().await.push((layer, colour));
    StatusCode::OK
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn committed_batch_reaches_every_layer() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/api/v1/composition/layers/:layer/clips/:clip", put(record_put))
        .with_state(Arc::clone(&seen));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let writer = HttpEngineWriter::new(WriterTimeouts {
        connect: Duration::from_millis(500),
        read: Duration::from_millis(1500),
    })
    .expect("writer");
    let (dispatcher, workers) = Dispatcher::spawn(
        &Handle::current(),
        Arc::new(writer),
        WireFormat::default(),
        Endpoint::new("127.0.0.1", port).expect("endpoint"),
        DispatchConfig::default(),
    );

    let writes: Vec<LayerWrite> = [("Outer", 3), ("Middle", 2), ("Inner", 1), ("DJ", 4)]
        .into_iter()
        .map(|(column, target)| LayerWrite {
            column: Column::from(column),
            target: LayerTarget::Index(target),
            row: RowIndex(0),
            colour: "#FF0000".to_string(),
        })
        .collect();
    let report = dispatcher.submit(&writes);
    assert_eq!(report.submitted, 4);

    drop(dispatcher);
    workers.join().await;

    let mut seen = seen.lock().await.clone();
    seen.sort();
    assert_eq!(
        seen,
        [
            ("1".to_string(), "#FF0000".to_string()),
            ("2".to_string(), "#FF0000".to_string()),
            ("3".to_string(), "#FF0000".to_string()),
            ("4".to_string(), "#FF0000".to_string()),
        ]
    );
}
