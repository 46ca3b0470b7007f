use std::marker::PhantomData;

use async_trait::async_trait;
use reqwest::{header::HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;

use crate::{Body, Error, HttpClient, Request, RequestContext, ResilientClient, ServiceError};

/// Typed request seam: success payload `R`, error payload `E`.
///
/// Implemented by [`TypedRequestService`]; callers that depend on the trait
/// can substitute their own implementation.
#[async_trait]
pub trait Requester<R, E>: Send + Sync {
    async fn request(
        &self,
        context: Option<RequestContext>,
        method: Method,
        url: &str,
        headers: Option<HeaderMap>,
        body: Option<Body>,
        retry: bool,
    ) -> Result<R, ServiceError<E>>;
}

/// Sends requests and decodes JSON responses into `R` on success and `E`
/// otherwise.
///
/// Outcomes:
/// - status in `200..300`: `Ok(R)`;
/// - any other status: [`ServiceError::NonSuccess`] carrying the decoded `E`;
/// - a body that does not parse as the expected type: [`Error::Decode`];
/// - construction and transport failures: the matching [`Error`].
pub struct TypedRequestService<R, E, C = ResilientClient> {
    client: C,
    _payloads: PhantomData<fn() -> (R, E)>,
}

impl<R, E, C: Clone> Clone for TypedRequestService<R, E, C> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

impl<R, E, C: std::fmt::Debug> std::fmt::Debug for TypedRequestService<R, E, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedRequestService")
            .field("client", &self.client)
            .finish()
    }
}

impl<R, E, C> TypedRequestService<R, E, C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            _payloads: PhantomData,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<R, E, C> TypedRequestService<R, E, C>
where
    R: DeserializeOwned,
    E: DeserializeOwned,
    C: HttpClient,
{
    /// Builds, sends and decodes one request.
    ///
    /// Without a `context` the call is scoped to the client's timeout, and
    /// the scope is released on every exit path.
    pub async fn request(
        &self,
        context: Option<RequestContext>,
        method: Method,
        url: &str,
        headers: Option<HeaderMap>,
        body: Option<Body>,
        retry: bool,
    ) -> Result<R, ServiceError<E>> {
        let (context, _scope) = match context {
            Some(context) => (context, None),
            None => {
                let (context, guard) = RequestContext::new().scoped(self.client.timeout());
                (context, Some(guard))
            }
        };

        let mut builder = Request::builder(method, url).context(context.clone());
        if let Some(headers) = headers {
            builder = builder.headers(headers);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let request = builder.build()?;

        let response = self.client.execute(request, retry).await?;
        let status = response.status();
        let bytes = context
            .run(response.bytes())
            .await
            .map_err(Error::from)?;

        if status.is_success() {
            Ok(decode_json::<R>(status, &bytes)?)
        } else {
            let payload = decode_json::<E>(status, &bytes)?;
            Err(ServiceError::NonSuccess { status, payload })
        }
    }

    pub async fn get(&self, url: &str, retry: bool) -> Result<R, ServiceError<E>> {
        self.request(None, Method::GET, url, None, None, retry).await
    }
}

#[async_trait]
impl<R, E, C> Requester<R, E> for TypedRequestService<R, E, C>
where
    R: DeserializeOwned + Send + 'static,
    E: DeserializeOwned + Send + 'static,
    C: HttpClient,
{
    async fn request(
        &self,
        context: Option<RequestContext>,
        method: Method,
        url: &str,
        headers: Option<HeaderMap>,
        body: Option<Body>,
        retry: bool,
    ) -> Result<R, ServiceError<E>> {
        TypedRequestService::request(self, context, method, url, headers, body, retry).await
    }
}

/// An empty body decodes as JSON `null`, so `()` and `Option<T>` payloads
/// accept bodiless responses.
fn decode_json<T: DeserializeOwned>(status: StatusCode, bytes: &[u8]) -> Result<T, Error> {
    let input: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        bytes
    };
    serde_json::from_slice(input).map_err(|err| Error::Decode {
        status: status.as_u16(),
        message: format!(
            "invalid JSON body: {err}; body: {}",
            String::from_utf8_lossy(bytes)
        ),
    })
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use reqwest::{header::HeaderMap, Method, StatusCode};
    use serde::Deserialize;

    use super::{decode_json, Requester, TypedRequestService};
    use crate::{
        executor::tests::{ScriptedTransport, Step},
        ClientOptions, Error, RequestContext, ResilientClient, ServiceError, TransportErrorKind,
    };

    #[derive(Debug, Deserialize, PartialEq)]
    struct Product {
        id: i64,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct ApiError {
        message: String,
    }

    fn service(steps: Vec<Step>) -> (TypedRequestService<Product, ApiError>, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new(steps));
        let client = ResilientClient::with_transport(transport.clone(), ClientOptions::default());
        (TypedRequestService::new(client), transport)
    }

    const URL: &str = "http://localhost:8080/api/v1/products/1";

    #[tokio::test]
    async fn success_decodes_payload() {
        let (service, _) = service(vec![Step::Status(200, r#"{"id":1}"#)]);

        let product = service.get(URL, false).await.expect("success");

        assert_eq!(product, Product { id: 1 });
    }

    #[tokio::test]
    async fn non_success_decodes_error_payload() {
        let (service, _) = service(vec![Step::Status(404, r#"{"message":"not found"}"#)]);

        let err = service.get(URL, false).await.expect_err("non-success");

        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(
            err.payload(),
            Some(&ApiError {
                message: "not found".to_owned()
            })
        );
        assert_eq!(err.to_string(), "non-success response: 404 Not Found");
    }

    #[tokio::test]
    async fn undecodable_success_body_is_decode_error() {
        let (service, _) = service(vec![Step::Status(200, "<html>")]);

        let err = service.get(URL, false).await.expect_err("decode");

        assert!(matches!(
            err,
            ServiceError::Client(Error::Decode { status: 200, .. })
        ));
    }

    #[tokio::test]
    async fn undecodable_error_body_is_decode_error_not_non_success() {
        let (service, _) = service(vec![Step::Status(500, "upstream exploded")]);

        let err = service.get(URL, false).await.expect_err("decode");

        assert!(err.payload().is_none());
        assert!(matches!(
            err,
            ServiceError::Client(Error::Decode { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn construction_error_is_reported_before_sending() {
        let (service, transport) = service(vec![]);

        let err = service.get("::not-a-url", true).await.expect_err("construction");

        assert!(matches!(err, ServiceError::Client(Error::Construction(_))));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_flag_reaches_the_executor() {
        let (service, transport) = service(vec![
            Step::Fail(TransportErrorKind::ConnectionReset),
            Step::Status(200, r#"{"id":7}"#),
        ]);

        let product = service.get(URL, true).await.expect("retried");

        assert_eq!(product.id, 7);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn headers_and_body_are_forwarded() {
        let (service, transport) = service(vec![Step::Status(201, r#"{"id":2}"#)]);
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().expect("value"));

        let product = service
            .request(
                Some(RequestContext::new()),
                Method::POST,
                "http://localhost:8080/api/v1/products",
                Some(headers),
                Some(r#"{"name":"widget"}"#.into()),
                false,
            )
            .await
            .expect("created");

        assert_eq!(product.id, 2);
        let sent = transport.headers.lock().expect("lock").clone();
        assert_eq!(sent[0]["content-type"], "application/json");
    }

    #[tokio::test]
    async fn cancelled_context_aborts_call() {
        let (service, transport) = service(vec![Step::Status(200, r#"{"id":1}"#)]);
        let context = RequestContext::new();
        context.cancel();

        let err = service
            .request(Some(context), Method::GET, URL, None, None, true)
            .await
            .expect_err("cancelled");

        assert!(matches!(
            err,
            ServiceError::Client(Error::Transport(ref inner)) if inner.kind() == TransportErrorKind::Cancelled
        ));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn unbounded_client_timeout_scopes_without_deadline() {
        let transport = Arc::new(ScriptedTransport::new([Step::Status(200, r#"{"id":4}"#)]));
        let client = ResilientClient::with_transport(
            transport,
            ClientOptions::default().with_timeout(Duration::MAX),
        );
        let service: TypedRequestService<Product, ApiError> = TypedRequestService::new(client);

        let product = service.get(URL, true).await.expect("success");

        assert_eq!(product.id, 4);
    }

    async fn fetch(requester: &dyn Requester<Product, ApiError>) -> Option<i64> {
        requester
            .request(None, Method::GET, URL, None, None, false)
            .await
            .ok()
            .map(|product| product.id)
    }

    #[tokio::test]
    async fn service_works_behind_the_requester_trait() {
        let (service, transport) = service(vec![Step::Status(200, r#"{"id":5}"#)]);

        assert_eq!(fetch(&service).await, Some(5));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn requester_trait_accepts_substitutes() {
        struct Fixed;

        #[async_trait::async_trait]
        impl Requester<Product, ApiError> for Fixed {
            async fn request(
                &self,
                _context: Option<RequestContext>,
                _method: Method,
                _url: &str,
                _headers: Option<HeaderMap>,
                _body: Option<crate::Body>,
                _retry: bool,
            ) -> Result<Product, ServiceError<ApiError>> {
                Ok(Product { id: 42 })
            }
        }

        assert_eq!(fetch(&Fixed).await, Some(42));
    }

    #[test]
    fn empty_body_decodes_as_null() {
        decode_json::<()>(StatusCode::NO_CONTENT, b"").expect("unit");
        assert_eq!(
            decode_json::<Option<Product>>(StatusCode::OK, b"  ").expect("none"),
            None
        );
        assert!(decode_json::<Product>(StatusCode::OK, b"").is_err());
    }
}
