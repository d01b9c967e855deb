//! Delivery of results to the caller's webhook.
use rps_sign::ResponseTree;
use serde::Serialize;

use crate::{error::Error, request::Attachments};

/// Body of an error reply.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl From<&Error> for ErrorBody {
    fn from(e: &Error) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
        }
    }
}

/// Result of a call to the web service as reported to our caller.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Outcome {
    Response(ResponseTree),
    Error(ErrorBody),
}

impl From<Result<ResponseTree, Error>> for Outcome {
    fn from(result: Result<ResponseTree, Error>) -> Self {
        match result {
            Ok(tree) => Outcome::Response(tree),
            Err(e) => Outcome::Error((&e).into()),
        }
    }
}

#[derive(Serialize, Debug)]
struct Delivery<'a> {
    response: &'a Outcome,
    attachment: &'a Attachments,
}

/// POST `outcome` to the webhook in `attachments`, together with the
/// attachments themselves.
#[tracing::instrument(level = "info", skip(client, outcome, attachments))]
pub async fn deliver(
    client: &reqwest::Client,
    url: &str,
    outcome: &Outcome,
    attachments: &Attachments,
) -> Result<(), Error> {
    let response = client
        .post(url)
        .json(&Delivery {
            response: outcome,
            attachment: attachments,
        })
        .send()
        .await
        .map_err(Error::WebhookError)?;
    response.error_for_status().map_err(Error::WebhookError)?;
    tracing::info!("Delivered result to webhook");
    Ok(())
}
