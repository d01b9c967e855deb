use std::{convert::Infallible, sync::Arc};

use rps_sign::KeyMaterial;
use warp::Filter;

use crate::config::Settings;

/// Everything a request handler needs, shared by all requests.
pub struct Context<T> {
    pub settings: Arc<Settings>,
    pub key: Arc<KeyMaterial>,
    pub transport: Arc<T>,
    pub webhook: reqwest::Client,
}

impl<T> Context<T> {
    pub fn new(settings: Settings, key: KeyMaterial, transport: T) -> Self {
        Self {
            settings: Arc::new(settings),
            key: Arc::new(key),
            transport: Arc::new(transport),
            webhook: reqwest::Client::new(),
        }
    }
}

// Not derived so that `T` doesn't have to be `Clone`.
impl<T> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            key: self.key.clone(),
            transport: self.transport.clone(),
            webhook: self.webhook.clone(),
        }
    }
}

/// Filter to inject the [Context] into the request handler.
pub fn with_context<T: Send + Sync + 'static>(
    ctx: Context<T>,
) -> impl Filter<Extract = (Context<T>,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}
