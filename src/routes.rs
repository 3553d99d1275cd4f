//! Route table
//!
//! All endpoints share one listener: the relay under `/ws/`, the document API
//! under `/api/`, the generated `/config.js`, and the front end bundle for
//! everything else.

use std::convert::Infallible;
use std::path::PathBuf;

use warp::filters::BoxedFilter;
use warp::path::Peek;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::config::ServerConfig;
use crate::constants::{API_PATH, MAX_DOCUMENT_BODY_SIZE, STATIC_PATH, WS_PATH};
use crate::core::server::SharedServerState;
use crate::handlers::errors::handle_rejection;
use crate::handlers::{files, info, websocket};

/// Every route of the server, with rejections mapped to responses
pub fn routes(
    state: SharedServerState,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let cors = cors(&state.config);
    let api = api_routes(state.clone())
        .with(cors)
        .map(|reply| Reply::into_response(reply))
        .boxed();

    let health = warp::path("health")
        .and(warp::path::end())
        .map(|| "OK".into_response());

    websocket_routes(state.clone())
        .or(api)
        .unify()
        .or(config_js_route(state.clone()))
        .unify()
        .or(health)
        .unify()
        .or(static_routes(state.config.static_dir.clone()))
        .unify()
        .recover(handle_rejection)
}

// Helper function to include shared state in request
fn with_state(
    state: SharedServerState,
) -> impl Filter<Extract = (SharedServerState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// `/ws/{room}` upgrades, and a 400 for `/ws` without a room
pub fn websocket_routes(state: SharedServerState) -> BoxedFilter<(Response,)> {
    let missing = warp::path(WS_PATH)
        .and(warp::path::end())
        .map(websocket::missing_room);

    let room = warp::path(WS_PATH)
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::header::optional::<String>("origin"))
        .and(warp::ws())
        .and(with_state(state))
        .and_then(websocket::upgrade_room);

    missing.or(room).unify().boxed()
}

/// `/api/info`, `/api/rooms` and the `/api/files` document endpoints
pub fn api_routes(state: SharedServerState) -> BoxedFilter<(Response,)> {
    let info = warp::path!("api" / "info")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(info::server_info);

    let rooms = warp::path!("api" / "rooms")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(info::list_rooms);

    let list_files = warp::path!("api" / "files")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(files::list_files);

    let create_file = warp::path!("api" / "files")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_DOCUMENT_BODY_SIZE))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(files::create_file);

    let get_file = warp::path!("api" / "files" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(files::get_file);

    let save_file = warp::path!("api" / "files" / String)
        .and(warp::put())
        .and(warp::body::content_length_limit(MAX_DOCUMENT_BODY_SIZE))
        .and(warp::body::json())
        .and(with_state(state))
        .and_then(files::save_file);

    info.or(rooms)
        .unify()
        .or(list_files)
        .unify()
        .or(create_file)
        .unify()
        .or(get_file)
        .unify()
        .or(save_file)
        .unify()
        .boxed()
}

fn config_js_route(state: SharedServerState) -> BoxedFilter<(Response,)> {
    warp::path("config.js")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::header::optional::<String>("host"))
        .and(with_state(state))
        .and_then(info::config_js)
        .boxed()
}

/// `/static/*` assets, then the single page app with an `index.html` fallback
pub fn static_routes(static_dir: PathBuf) -> BoxedFilter<(Response,)> {
    let index = static_dir.join("index.html");

    let assets = warp::path(STATIC_PATH)
        .and(warp::fs::dir(static_dir.clone()))
        .map(|file: warp::fs::File| file.into_response());

    let app = outside_reserved_paths()
        .and(warp::fs::dir(static_dir).or(warp::fs::file(index)).unify())
        .map(|file: warp::fs::File| file.into_response());

    assets.or(app).unify().boxed()
}

/// Rejects `/ws/...` and `/api/...` so the app fallback never shadows them
fn outside_reserved_paths() -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::path::peek()
        .and_then(|peek: Peek| async move {
            match peek.segments().next() {
                Some(WS_PATH) | Some(API_PATH) => Err(warp::reject::not_found()),
                _ => Ok(()),
            }
        })
        .untuple_one()
}

fn cors(config: &ServerConfig) -> warp::cors::Builder {
    warp::cors()
        .allow_origins(config.cors_origins.iter().map(String::as_str))
        .allow_methods(vec!["GET", "POST", "PUT", "OPTIONS"])
        .allow_headers(vec!["Content-Type", "X-Requested-With"])
}
