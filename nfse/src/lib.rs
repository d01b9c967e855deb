pub mod config;
pub mod context;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod operation;
pub mod request;
pub mod templates;
pub mod transport;
pub mod webhook;

pub use crate::{context::Context, error::Error};

use crate::{
    context::with_context,
    operation::{consulta_nfe_handler, envio_lote_rps_handler, envio_rps_handler},
    transport::Transport,
};
use tracing_subscriber::fmt::format::FmtSpan;
use warp::{Filter, Rejection, Reply};

/// Largest request body accepted, batches included.
const BODY_LIMIT: u64 = 4 * 1024 * 1024;

/// Set up logging and tracing, filtered by `RUST_LOG`. Calling this more than
/// once is harmless.
pub fn init_tracing() {
    let filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "nfse=info,rps_sign=info".to_owned());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Return a warp app with everything wired up.
///
/// This will setup:
///     - Logging and tracing
///     - Context injection
///     - Routing
pub fn app<T: Transport + Send + Sync + 'static>(
    ctx: Context<T>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    init_tracing();

    let envio_rps = warp::path!("api" / "EnvioRPS")
        .and(warp::body::content_length_limit(BODY_LIMIT))
        .and(warp::body::json())
        .and(with_context(ctx.clone()))
        .and_then(envio_rps_handler)
        .with(warp::trace::named("envio-rps"));

    let envio_lote_rps = warp::path!("api" / "EnvioLoteRPS")
        .and(warp::body::content_length_limit(BODY_LIMIT))
        .and(warp::body::json())
        .and(with_context(ctx.clone()))
        .and_then(envio_lote_rps_handler)
        .with(warp::trace::named("envio-lote-rps"));

    let consulta_nfe = warp::path!("api" / "ConsultaNFe")
        .and(warp::body::content_length_limit(BODY_LIMIT))
        .and(warp::body::json())
        .and(with_context(ctx))
        .and_then(consulta_nfe_handler)
        .with(warp::trace::named("consulta-nfe"));

    warp::post()
        .and(envio_rps.or(envio_lote_rps).or(consulta_nfe))
        .with(warp::trace::request())
}
