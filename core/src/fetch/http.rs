//! `reqwest` page client.

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use tracing::{debug, warn};

use netsift_common::config::RequestConfig;

use super::{Page, PageClient};
use crate::error::Result;

pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Builds a client from the request settings. Environment proxy
    /// variables are ignored; when proxies are configured one is picked at
    /// random for this client.
    pub fn new(cfg: &RequestConfig) -> Result<Self> {
        let redirect = if cfg.follow_redirects {
            Policy::limited(cfg.redirect_limit)
        } else {
            Policy::none()
        };

        let mut builder = reqwest::Client::builder()
            .default_headers(header_map(cfg))
            .connect_timeout(cfg.connect_timeout())
            .timeout(cfg.read_timeout())
            .danger_accept_invalid_certs(!cfg.verify_tls)
            .redirect(redirect)
            .no_proxy();

        if let Some(proxy) = cfg.proxies.choose(&mut rand::rng()) {
            debug!("Routing requests through {proxy}");
            builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

fn header_map(cfg: &RequestConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (key, value) in &cfg.headers {
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!("Ignoring invalid request header {key:?}"),
        }
    }
    headers
}

#[async_trait]
impl PageClient for HttpClient {
    async fn get(&self, url: &str) -> Result<Page> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(Page { status, body })
    }
}
