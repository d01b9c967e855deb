//! The API operations: build and sign the message, send it, then answer with
//! the parsed reply or hand it to the caller's webhook.
use rps_sign::ResponseTree;
use serde::Serialize;
use tracing::Instrument;
use warp::{
    http::StatusCode,
    reply::{self, Response},
    Rejection, Reply,
};

use crate::{
    context::Context,
    envelope::{build_envelope, Operation},
    error::Error,
    request::{Attachments, ConsultaNfeRequest, EnvioLoteRpsRequest, EnvioRpsRequest},
    templates::{Chave, ConsultaNfe, EnvioLoteRps, EnvioRps, SignedRps},
    transport::Transport,
    webhook::{self, ErrorBody, Outcome},
};

/// Signed `EnvioRPS` envelope for `body`. The sender and provider come from
/// the settings, never from the request.
pub fn envio_rps<T>(ctx: &Context<T>, body: &EnvioRpsRequest) -> Result<String, Error> {
    let message = EnvioRps {
        cnpj_remetente: &ctx.settings.cnpj,
        rps: SignedRps::sign(&ctx.key, &ctx.settings.inscricao_municipal, &body.rps)?,
    };
    build_envelope(&ctx.key, &message, Operation::EnvioRps)
}

/// Signed `EnvioLoteRPS` envelope for `body`, every RPS signed on its own.
pub fn envio_lote_rps<T>(ctx: &Context<T>, body: &EnvioLoteRpsRequest) -> Result<String, Error> {
    if body.rps.is_empty() {
        return Err(Error::MissingField("rps"));
    }
    let rps_list = body
        .rps
        .iter()
        .map(|rps| SignedRps::sign(&ctx.key, &ctx.settings.inscricao_municipal, rps))
        .collect::<Result<Vec<_>, _>>()?;
    let message = EnvioLoteRps {
        cnpj_remetente: &ctx.settings.cnpj,
        transacao: body.transacao,
        dt_inicio: body.dt_inicio,
        dt_fim: body.dt_fim,
        valor_total_servicos: &body.valor_total_servicos,
        valor_total_deducoes: &body.valor_total_deducoes,
        rps_list,
    };
    build_envelope(&ctx.key, &message, Operation::EnvioLoteRps)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Signed `ConsultaNFe` envelope for `body`.
pub fn consulta_nfe<T>(ctx: &Context<T>, body: &ConsultaNfeRequest) -> Result<String, Error> {
    let chave = match (non_empty(&body.numero_nfe), non_empty(&body.numero_rps)) {
        (Some(numero), _) => Chave::Nfe(numero, non_empty(&body.codigo_verificacao)),
        (None, Some(numero)) => Chave::Rps(non_empty(&body.serie_rps), numero),
        (None, None) => return Err(Error::MissingField("numeroNFe or numeroRps")),
    };
    let message = ConsultaNfe {
        cnpj_remetente: &ctx.settings.cnpj,
        inscricao_prestador: &ctx.settings.inscricao_municipal,
        chave,
    };
    build_envelope(&ctx.key, &message, Operation::ConsultaNfe)
}

/// Send `envelope` and parse the reply.
pub async fn send<T: Transport>(
    ctx: &Context<T>,
    operation: Operation,
    envelope: String,
) -> Result<ResponseTree, Error> {
    let body = ctx.transport.send(operation, envelope).await?;
    tracing::debug!("Response body: {}", body);
    Ok(rps_sign::parse_response(&body)?)
}

fn json_reply<V: Serialize>(value: &V, status: StatusCode) -> Response {
    reply::with_status(reply::json(value), status).into_response()
}

fn error_reply(e: &Error) -> Response {
    let status = StatusCode::from_u16(e.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_client_error() {
        tracing::warn!("Rejected request: {}", e);
    } else {
        tracing::error!("Request failed: {}", e);
    }
    json_reply(&ErrorBody::from(e), status)
}

async fn relay<T: Transport + Send + Sync + 'static>(
    ctx: Context<T>,
    operation: Operation,
    envelope: String,
    attachments: Attachments,
) {
    let outcome = Outcome::from(send(&ctx, operation, envelope).await);
    if let Some(url) = attachments.webhook() {
        if let Err(e) = webhook::deliver(&ctx.webhook, url, &outcome, &attachments).await {
            tracing::error!("{}", e);
        }
    }
}

/// Reply to a request whose envelope is `envelope`.
///
/// With a webhook in `attachments` the request is acknowledged right away and
/// the result delivered later; otherwise the reply waits for the web
/// service. A request that couldn't even be prepared is answered with the
/// error in both cases.
async fn respond<T: Transport + Send + Sync + 'static>(
    ctx: Context<T>,
    operation: Operation,
    envelope: Result<String, Error>,
    attachments: Option<Attachments>,
) -> Response {
    let envelope = match envelope {
        Ok(envelope) => envelope,
        Err(e) => return error_reply(&e),
    };
    match attachments {
        Some(attachments) if attachments.webhook().is_some() => {
            let span = tracing::info_span!("relay", %operation);
            tokio::spawn(relay(ctx, operation, envelope, attachments).instrument(span));
            json_reply(&serde_json::json!({ "success": true }), StatusCode::OK)
        }
        _ => match send(&ctx, operation, envelope).await {
            Ok(tree) => json_reply(&tree, StatusCode::OK),
            Err(e) => error_reply(&e),
        },
    }
}

#[tracing::instrument(level = "info", skip(body, ctx), fields(serie = %body.rps.serie_rps, numero = %body.rps.numero_rps))]
pub async fn envio_rps_handler<T: Transport + Send + Sync + 'static>(
    body: EnvioRpsRequest,
    ctx: Context<T>,
) -> Result<impl Reply, Rejection> {
    let envelope = envio_rps(&ctx, &body);
    Ok(respond(ctx, Operation::EnvioRps, envelope, body.attachments).await)
}

#[tracing::instrument(level = "info", skip(body, ctx), fields(count = body.rps.len()))]
pub async fn envio_lote_rps_handler<T: Transport + Send + Sync + 'static>(
    body: EnvioLoteRpsRequest,
    ctx: Context<T>,
) -> Result<impl Reply, Rejection> {
    let envelope = envio_lote_rps(&ctx, &body);
    Ok(respond(ctx, Operation::EnvioLoteRps, envelope, body.attachments).await)
}

#[tracing::instrument(level = "info", skip(body, ctx))]
pub async fn consulta_nfe_handler<T: Transport + Send + Sync + 'static>(
    body: ConsultaNfeRequest,
    ctx: Context<T>,
) -> Result<impl Reply, Rejection> {
    let envelope = consulta_nfe(&ctx, &body);
    Ok(respond(ctx, Operation::ConsultaNfe, envelope, body.attachments).await)
}
