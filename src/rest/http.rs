//! Production [`DeliveryApi`] backed by `reqwest`.

use std::future::Future;

use serde::de::DeserializeOwned;

use crate::rest::{DeliveryApi, DetailResponse, OrderResponse, RestError, TrackResponse};

#[derive(Clone)]
pub struct HttpDeliveryApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDeliveryApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    // The client is cloned and the URL built before the future is created,
    // so the returned future borrows nothing from `self`.
    fn get_json<T: DeserializeOwned>(
        &self,
        path: String,
    ) -> impl Future<Output = Result<T, RestError>> + Send {
        let client = self.client.clone();
        let url = format!("{}{}", self.base_url, path);
        async move {
            let response = client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(RestError::Status(response.status().as_u16()));
            }
            Ok(response.json::<T>().await?)
        }
    }
}

impl DeliveryApi for HttpDeliveryApi {
    fn fetch_track(
        &self,
        delivery_id: &str,
    ) -> impl Future<Output = Result<TrackResponse, RestError>> + Send {
        self.get_json(format!("/deliveries/{}/track", delivery_id))
    }

    fn fetch_detail(
        &self,
        delivery_id: &str,
    ) -> impl Future<Output = Result<DetailResponse, RestError>> + Send {
        self.get_json(format!("/deliveries/{}/detail", delivery_id))
    }

    fn fetch_order(
        &self,
        order_id: &str,
    ) -> impl Future<Output = Result<OrderResponse, RestError>> + Send {
        self.get_json(format!("/orders/{}", order_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let api = HttpDeliveryApi::new("http://localhost:8080/");
        assert_eq!(api.base_url, "http://localhost:8080");
    }
}
