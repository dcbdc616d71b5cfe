use std::path::PathBuf;
use std::sync::Arc;

use geo_aggregator::api::GeoRouter;
use geo_aggregator::http::{build_router, AppState};
use log::{info, warn};
use tokio::sync::RwLock;

struct Args {
    port: u16,
    debug: bool,
    data_dir: PathBuf,
}

fn parse_args() -> Args {
    let mut port = 6091u16;
    let mut debug = false;
    let mut data_dir = PathBuf::from(".");

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--port" => {
                if let Some(v) = args.next() {
                    port = v.parse().unwrap_or(port);
                }
            }
            "--debug" => debug = true,
            "--providers-dir" => {
                if let Some(v) = args.next() {
                    data_dir = PathBuf::from(v);
                }
            }
            _ => {}
        }
    }

    Args { port, debug, data_dir }
}

#[tokio::main]
async fn main() {
    let args = parse_args();

    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let router = match GeoRouter::load(args.data_dir) {
        Ok(r) => r,
        Err(err) => {
            eprintln!("failed to load provider registry: {err}");
            std::process::exit(1);
        }
    };
    let autosave_handle = router.spawn_autosave_ticker();
    let state = AppState {
        router: Arc::new(RwLock::new(router)),
    };

    let app = build_router(state.clone());
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("geo-aggregator listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await.expect("bind listen port");
    let serve = axum::serve(listener, app.into_make_service());

    tokio::select! {
        result = serve => {
            if let Err(err) = result {
                warn!("server error: {err}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, force-saving provider state");
        }
    }

    autosave_handle.abort();
    if let Err(err) = state.router.read().await.shutdown_save() {
        warn!("shutdown save failed: {err}");
    }
}
