use bytes::Bytes;
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE, LOCATION,
};
use http_body_util::{BodyExt, Full, combinators::BoxBody};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::GraphQLRequest;
use crate::subgraph::Subgraph;

type Body = BoxBody<Bytes, hyper::Error>;

fn full<T: Into<Bytes>>(value: T) -> Body {
    Full::new(value.into())
        .map_err(|never| match never {})
        .boxed()
}

const GRAPHIQL_HTML: &str = r#"
<!DOCTYPE html>
<html>
<head>
  <title>GraphiQL - Publications subgraph</title>
  <link href="https://unpkg.com/graphiql@1.5.0/graphiql.min.css" rel="stylesheet" />
  <style>
    body { margin: 0; padding: 0; height: 100vh; }
    #graphiql { height: 100vh; }
  </style>
</head>
<body>
  <div id="graphiql"></div>

  <script src="https://unpkg.com/react@17.0.2/umd/react.production.min.js"></script>
  <script src="https://unpkg.com/react-dom@17.0.2/umd/react-dom.production.min.js"></script>
  <script src="https://unpkg.com/graphiql@1.5.0/graphiql.min.js"></script>
  <script>
    const principal = localStorage.getItem('principal') || '';

    function graphQLFetcher(graphQLParams) {
      const headers = { 'Content-Type': 'application/json' };
      if (principal) {
        headers['__PRINCIPAL_HEADER__'] = principal;
      }
      return fetch('/graphql', {
        method: 'post',
        headers,
        body: JSON.stringify(graphQLParams),
      }).then(response => response.json());
    }

    ReactDOM.render(
      React.createElement(GraphiQL, { fetcher: graphQLFetcher }),
      document.getElementById('graphiql')
    );
  </script>
</body>
</html>
"#;

/// Shared by every connection.
pub struct ServerState {
    pub subgraph: Arc<Subgraph>,
    /// Trusted header carrying the caller's user id.
    pub principal_header: String,
}

fn json_response(status: StatusCode, body: String) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .header(ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .body(full(body))
        .unwrap_or_else(|_| internal_server_error())
}

fn internal_server_error() -> Response<Body> {
    let mut response = Response::new(full("Internal Server Error"));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

/// A missing or malformed header means an anonymous caller.
fn extract_principal(req: &Request<Incoming>, header: &str) -> Option<Uuid> {
    let value = req.headers().get(header)?;
    match value.to_str().ok().and_then(|text| Uuid::parse_str(text.trim()).ok()) {
        Some(principal) => Some(principal),
        None => {
            warn!(header, "ignoring malformed principal header");
            None
        }
    }
}

pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<ServerState>,
) -> Result<Response<Body>, Infallible> {
    let principal = extract_principal(&req, &state.principal_header);

    let result = match (req.method(), req.uri().path()) {
        (&Method::POST, "/graphql") => {
            let body_bytes = match req.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    warn!(error = %e, "failed to read request body");
                    return Ok(json_response(
                        StatusCode::BAD_REQUEST,
                        json!({ "errors": [{ "message": "failed to read request body" }] })
                            .to_string(),
                    ));
                }
            };

            match serde_json::from_slice::<GraphQLRequest>(&body_bytes) {
                Ok(mut graphql_req) => {
                    graphql_req.principal = principal;

                    match state.subgraph.process_request(graphql_req).await {
                        Ok(result) => json_response(StatusCode::OK, result.to_string()),
                        Err(e) => {
                            debug!(error = %e, "request rejected");
                            json_response(
                                StatusCode::OK,
                                json!({ "errors": [{ "message": e.to_string() }] }).to_string(),
                            )
                        }
                    }
                }
                Err(e) => json_response(
                    StatusCode::BAD_REQUEST,
                    json!({ "errors": [{ "message": format!("invalid JSON request: {e}") }] })
                        .to_string(),
                ),
            }
        }

        (&Method::GET, "/graphiql") => Response::builder()
            .header(CONTENT_TYPE, "text/html")
            .header(ACCESS_CONTROL_ALLOW_ORIGIN, "*")
            .body(full(
                GRAPHIQL_HTML.replace("__PRINCIPAL_HEADER__", &state.principal_header),
            ))
            .unwrap_or_else(|_| internal_server_error()),

        (&Method::GET, "/") => Response::builder()
            .status(StatusCode::FOUND)
            .header(LOCATION, "/graphiql")
            .header(ACCESS_CONTROL_ALLOW_ORIGIN, "*")
            .body(full(""))
            .unwrap_or_else(|_| internal_server_error()),

        (&Method::OPTIONS, _) => Response::builder()
            .header(ACCESS_CONTROL_ALLOW_ORIGIN, "*")
            .header(ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS")
            .header(
                ACCESS_CONTROL_ALLOW_HEADERS,
                format!("Content-Type, {}", state.principal_header),
            )
            .body(full(""))
            .unwrap_or_else(|_| internal_server_error()),

        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .header(ACCESS_CONTROL_ALLOW_ORIGIN, "*")
            .body(full("Not Found"))
            .unwrap_or_else(|_| internal_server_error()),
    };

    Ok(result)
}

#[derive(Clone)]
// An Executor that uses the tokio runtime.
pub struct TokioExecutor;

impl<F> hyper::rt::Executor<F> for TokioExecutor
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    fn execute(&self, fut: F) {
        tokio::task::spawn(fut);
    }
}

/// Accepts connections until the listener fails.
pub async fn serve(listener: TcpListener, state: Arc<ServerState>) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "publications subgraph listening");
        info!("GraphiQL UI available at http://{addr}/graphiql");
    }

    loop {
        let (stream, remote) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let state = Arc::clone(&state);

        tokio::task::spawn(async move {
            let service = service_fn(move |req| handle_request(req, Arc::clone(&state)));

            match hyper_util::server::conn::auto::Builder::new(TokioExecutor)
                .serve_connection(io, service)
                .await
            {
                Ok(()) => debug!(%remote, "connection closed"),
                Err(e) => error!(%remote, error = %e, "error processing connection"),
            }
        });
    }
}
