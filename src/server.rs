//! Web server for the QuakeBoard dashboard.
//!
//! Serves a single page with a map and a table, both driven by the
//! synchronizer's snapshots:
//! - Axum for HTTP server
//! - SSE (Server-Sent Events) pushing one `snapshot` event per transition
//! - Leaflet circle markers fed from the overlay GeoJSON

use std::convert::Infallible;
use std::fmt::Write as _;

use axum::{
    Json, Router,
    extract::State,
    response::{
        Html,
        sse::{Event, KeepAlive, Sse},
    },
    routing::get,
};
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing::{info, warn};

use crate::client::FeedSource;
use crate::models::OutputRecord;
use crate::sync::{DashboardSnapshot, SyncConfig, SyncHandle, SyncState};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Latest synchronizer snapshot
    snapshots: watch::Receiver<DashboardSnapshot>,
}

impl AppState {
    #[must_use]
    pub fn new(snapshots: watch::Receiver<DashboardSnapshot>) -> Self {
        Self { snapshots }
    }

    fn current(&self) -> DashboardSnapshot {
        self.snapshots.borrow().clone()
    }
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/stream", get(sse_handler))
        .route("/api/snapshot", get(snapshot_handler))
        .route("/api/overlay", get(overlay_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Start the synchronizer and the web server; Ctrl+C stops both.
pub async fn run_server<S: FeedSource>(
    config: ServerConfig,
    source: S,
    sync: SyncConfig,
) -> anyhow::Result<()> {
    let handle = SyncHandle::spawn(source, sync);
    let app = create_router(AppState::new(handle.subscribe()));

    let addr = format!("{}:{}", config.host, config.port);
    info!("🌍 QuakeBoard starting at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for Ctrl+C: {}", e);
            }
            info!("shutting down");
            // Closing the snapshot channel ends open SSE streams.
            handle.shutdown().await;
        })
        .await?;

    Ok(())
}

/// JSON body for `/api/snapshot` and the SSE stream.
#[must_use]
pub fn snapshot_json(snapshot: &DashboardSnapshot) -> Value {
    let records: Vec<OutputRecord> = snapshot
        .window
        .iter()
        .enumerate()
        .map(|(i, r)| OutputRecord::new(i, r, i == snapshot.cursor))
        .collect();

    json!({
        "state": snapshot.state,
        "cursor": snapshot.cursor,
        "generation": snapshot.generation,
        "stale": snapshot.stale,
        "last_error": snapshot.last_error,
        "updated_at": snapshot.updated_at.to_rfc3339(),
        "records": records,
        "overlay": snapshot.overlay.to_geojson(),
        "rows_html": render_rows(snapshot),
    })
}

/// Render table body rows; the cursor row gets the active style.
#[must_use]
pub fn render_rows(snapshot: &DashboardSnapshot) -> String {
    if snapshot.window.is_empty() {
        let message = match snapshot.state {
            SyncState::Idle | SyncState::Loading => "Loading seismic data…",
            SyncState::Failed => "Feed unavailable",
            SyncState::Displaying | SyncState::Refetching => "No recent earthquakes",
        };
        return format!(r#"<tr class="row-empty"><td colspan="6">{message}</td></tr>"#);
    }

    let mut html = String::new();
    for (index, record) in snapshot.window.iter().enumerate() {
        let class = if index == snapshot.cursor {
            "row-active"
        } else {
            "row-idle"
        };
        let _ = write!(
            html,
            r#"<tr class="{class}"><td><time datetime="{iso}">{local}</time></td><td>{lat:.5}</td><td>{lon:.5}</td><td>{depth:.5}</td><td>{mag:.5}</td><td>{place}</td></tr>"#,
            iso = record.timestamp.to_rfc3339(),
            local = record.local_time().format("%Y-%m-%d %H:%M:%S"),
            lat = record.latitude,
            lon = record.longitude,
            depth = record.depth_km(),
            mag = record.magnitude,
            place = escape_html(record.place()),
        );
    }
    html
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Main page handler - serves the HTML UI.
async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// SSE stream: the current snapshot, then one event per change.
async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let stream = WatchStream::new(state.snapshots.clone()).map(|snapshot| {
        Ok(Event::default()
            .event("snapshot")
            .data(snapshot_json(&snapshot).to_string()))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn snapshot_handler(State(state): State<AppState>) -> Json<Value> {
    Json(snapshot_json(&state.current()))
}

/// Overlay as a GeoJSON `FeatureCollection`.
async fn overlay_handler(State(state): State<AppState>) -> Json<Value> {
    Json(state.current().overlay.to_geojson())
}

/// Health check endpoint.
async fn health_handler() -> &'static str {
    "OK"
}

// ============================================================================
// HTML Template (embedded for single-binary deployment)
// ============================================================================

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>QuakeBoard — Live Earthquake Dashboard</title>
    <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
    <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
    <style>
        * { box-sizing: border-box; }
        body { margin: 0; font-family: system-ui, sans-serif; background: #f5f5f5; }
        .board { display: grid; grid-template-rows: 55vh 1fr; height: 100vh; gap: 8px; padding: 8px; }
        #map { border-radius: 8px; }
        .table-wrapper { overflow: auto; background: white; border-radius: 8px; }
        .status { font-size: 12px; color: #666; padding: 6px 10px; }
        .status.stale { color: #b45309; }
        table { width: 100%; border-collapse: collapse; font-size: 13px; }
        th, td { padding: 4px 8px; text-align: left; border-bottom: 1px solid #eee; }
        th { position: sticky; top: 0; background: #fafafa; }
        .row-active { background-color: green; color: white; }
        .row-idle { background-color: transparent; color: black; }
        .row-empty td { text-align: center; color: #888; padding: 24px; }
    </style>
</head>
<body>
    <div class="board">
        <div id="map"></div>
        <div class="table-wrapper">
            <div id="status" class="status">connecting…</div>
            <table class="quake-table">
                <thead>
                    <tr>
                        <th>DateTime</th><th>Latitude</th><th>Longitude</th>
                        <th>Depth</th><th>Magnitude</th><th>Place</th>
                    </tr>
                </thead>
                <tbody id="rows">
                    <tr class="row-empty"><td colspan="6">Loading seismic data…</td></tr>
                </tbody>
            </table>
        </div>
    </div>
    <script>
        const map = L.map('map').setView([39.5, -98.5], 3);
        L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
            attribution: '&copy; OpenStreetMap contributors'
        }).addTo(map);

        let markers = null;

        function render(snapshot) {
            document.getElementById('rows').innerHTML = snapshot.rows_html;
            document.querySelectorAll('#rows time').forEach(t => {
                t.textContent = new Date(t.dateTime).toLocaleString();
            });

            // Full replace: records carry no identity across windows.
            if (markers) { map.removeLayer(markers); }
            markers = L.geoJSON(snapshot.overlay, {
                pointToLayer: (_, latlng) => L.circleMarker(latlng, {
                    radius: 6, fillColor: 'red', color: 'rgba(255,255,255,0.8)',
                    weight: 2, fillOpacity: 0.9
                })
            }).addTo(map);

            const status = document.getElementById('status');
            status.textContent = `${snapshot.state} · window #${snapshot.generation} · ` +
                `${snapshot.records.length} records` +
                (snapshot.last_error ? ` · ${snapshot.last_error}` : '');
            status.classList.toggle('stale', snapshot.stale || !!snapshot.last_error);
        }

        const source = new EventSource('/stream');
        source.addEventListener('snapshot', e => render(JSON.parse(e.data)));
        source.onerror = () => {
            document.getElementById('status').textContent = 'disconnected, retrying…';
        };
    </script>
</body>
</html>
"##;
