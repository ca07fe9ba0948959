use bytes::Bytes;
use reqwest::{header::HeaderMap, multipart::Form, StatusCode};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::{Config, OpenAIConfig},
    error::{map_deserialization_error, OpenAIError, WrappedError},
    file::Files,
    request_options::RequestOptions,
    Batches,
};

/// Client is a container for the HTTP client and provider config used to make API calls.
#[derive(Clone)]
pub struct Client<C: Config> {
    http_client: reqwest::Client,
    config: C,
}

impl Client<OpenAIConfig> {
    /// Client with default [OpenAIConfig]
    pub fn new() -> Self {
        Self::with_config(OpenAIConfig::default())
    }
}

impl Default for Client<OpenAIConfig> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Config> Client<C> {
    pub fn with_config(config: C) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            config,
        }
    }

    /// Provide your own [reqwest::Client], e.g. one configured with a custom
    /// timeout or proxy.
    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = http_client;
        self
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    /// To make the batches API call.
    pub fn batches(&self) -> Batches<'_, C> {
        Batches::new(self)
    }

    /// To make the files API call.
    pub fn files(&self) -> Files<'_, C> {
        Files::new(self)
    }

    fn request_headers(&self, options: &RequestOptions) -> Result<HeaderMap, OpenAIError> {
        let mut headers = self.config.headers();
        if let Some(extra) = options.headers() {
            headers.extend(extra.clone());
        }
        Ok(headers)
    }

    fn request_url(&self, path: &str, options: &RequestOptions) -> String {
        let url = self.config.url(path);
        let mut segments: Vec<String> = self
            .config
            .query()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        if let Some(extra) = options.query() {
            segments.push(extra.to_string());
        }
        if segments.is_empty() {
            url
        } else {
            format!("{url}?{}", segments.join("&"))
        }
    }

    pub(crate) async fn get<O>(
        &self,
        path: &str,
        options: &RequestOptions,
    ) -> Result<O, OpenAIError>
    where
        O: DeserializeOwned,
    {
        let request = self
            .http_client
            .get(self.request_url(path, options))
            .headers(self.request_headers(options)?)
            .build()?;

        let response = self.http_client.execute(request).await?;
        let bytes = self.handle_response(response).await?;
        serde_json::from_slice(&bytes).map_err(|e| map_deserialization_error(e, &bytes))
    }

    pub(crate) async fn get_raw(
        &self,
        path: &str,
        options: &RequestOptions,
    ) -> Result<(Bytes, HeaderMap), OpenAIError> {
        let request = self
            .http_client
            .get(self.request_url(path, options))
            .headers(self.request_headers(options)?)
            .build()?;

        let response = self.http_client.execute(request).await?;
        let headers = response.headers().clone();
        let bytes = self.handle_response(response).await?;
        Ok((bytes, headers))
    }

    pub(crate) async fn post<I, O>(
        &self,
        path: &str,
        body: I,
        options: &RequestOptions,
    ) -> Result<O, OpenAIError>
    where
        I: Serialize,
        O: DeserializeOwned,
    {
        let request = self
            .http_client
            .post(self.request_url(path, options))
            .headers(self.request_headers(options)?)
            .json(&body)
            .build()?;

        let response = self.http_client.execute(request).await?;
        let bytes = self.handle_response(response).await?;
        serde_json::from_slice(&bytes).map_err(|e| map_deserialization_error(e, &bytes))
    }

    pub(crate) async fn post_form<O>(
        &self,
        path: &str,
        form: Form,
        options: &RequestOptions,
    ) -> Result<O, OpenAIError>
    where
        O: DeserializeOwned,
    {
        let request = self
            .http_client
            .post(self.request_url(path, options))
            .headers(self.request_headers(options)?)
            .multipart(form)
            .build()?;

        let response = self.http_client.execute(request).await?;
        let bytes = self.handle_response(response).await?;
        serde_json::from_slice(&bytes).map_err(|e| map_deserialization_error(e, &bytes))
    }

    pub(crate) async fn delete<O>(
        &self,
        path: &str,
        options: &RequestOptions,
    ) -> Result<O, OpenAIError>
    where
        O: DeserializeOwned,
    {
        let request = self
            .http_client
            .delete(self.request_url(path, options))
            .headers(self.request_headers(options)?)
            .build()?;

        let response = self.http_client.execute(request).await?;
        let bytes = self.handle_response(response).await?;
        serde_json::from_slice(&bytes).map_err(|e| map_deserialization_error(e, &bytes))
    }

    async fn handle_response(&self, response: reqwest::Response) -> Result<Bytes, OpenAIError> {
        let status = response.status();
        let bytes = response.bytes().await?;

        if status != StatusCode::OK {
            let wrapped: Result<WrappedError, _> = serde_json::from_slice(&bytes);
            return match wrapped {
                Ok(wrapped) => Err(OpenAIError::ApiError(wrapped.error)),
                Err(_) => Err(OpenAIError::ApiError(crate::error::ApiError {
                    message: String::from_utf8_lossy(&bytes).to_string(),
                    r#type: None,
                    param: None,
                    code: Some(status.as_str().to_string()),
                })),
            };
        }

        Ok(bytes)
    }
}
