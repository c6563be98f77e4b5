//! HTTP/WebSocket boundary for the pane monitoring core: REST routes for
//! commands, report and history, and the persistent subscriber endpoint.

mod routes;
mod ws;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use axum::routing::post;

use paneboard_core::bridge::CaptureBridge;
use paneboard_core::bridge::PaneTarget;
use paneboard_core::config::Settings;
use paneboard_core::history::CommandLog;
use paneboard_core::registry::ChannelRegistry;
use paneboard_core::report::FsReportStore;
use paneboard_core::report::ReportCache;
use paneboard_core::runtime::BridgeRuntime;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<ChannelRegistry>,
    pub runtime: BridgeRuntime,
    pub bridge: Arc<dyn CaptureBridge>,
    pub report: Arc<ReportCache<FsReportStore>>,
    pub history: Arc<CommandLog>,
    pub commander: PaneTarget,
}

impl AppState {
    pub fn new(
        settings: Arc<Settings>,
        registry: Arc<ChannelRegistry>,
        runtime: BridgeRuntime,
        bridge: Arc<dyn CaptureBridge>,
    ) -> Self {
        let report = Arc::new(ReportCache::new(FsReportStore::new(
            settings.paths.report.clone(),
        )));
        let history = Arc::new(CommandLog::new(settings.paths.queue.clone()));
        let commander = PaneTarget::new(settings.tmux.commander_session.clone(), 0);
        Self {
            settings,
            registry,
            runtime,
            bridge,
            report,
            history,
            commander,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(routes::healthz))
        .route("/api/dashboard", get(routes::dashboard))
        .route("/api/command", post(routes::send_command))
        .route("/api/special-key", post(routes::send_special_key))
        .route("/api/history", get(routes::history))
        .route("/api/monitor/clear", post(routes::clear_monitor))
        .route("/api/channels/{channel}/revive", post(routes::revive_channel))
        .route("/api/ws-config", get(routes::ws_config))
        .route("/ws", get(ws::ws_endpoint))
        .with_state(state)
}
