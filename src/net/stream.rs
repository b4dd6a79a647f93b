use crate::base::error::WatchError;
use boring::ssl::{SslConnector, SslMethod, SslVerifyMode};
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::client::conn::http1::{self, SendRequest};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

/// One HTTP/1.1 connection with its driver task spawned.
///
/// The pipeline is strictly sequential and talks to a handful of endpoints a
/// few times per day, so a fresh connection per request keeps the layer flat:
/// no pool, no reuse accounting.
pub(crate) struct HttpStream {
    sender: SendRequest<Full<Bytes>>,
}

impl HttpStream {
    pub(crate) async fn open(url: &Url, insecure: bool) -> Result<Self, WatchError> {
        let host = url
            .host_str()
            .ok_or_else(|| WatchError::InvalidUrl(url.to_string()))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| WatchError::InvalidUrl(url.to_string()))?;
        let tcp = TcpStream::connect((host, port))
            .await
            .map_err(|err| WatchError::Transport(format!("connect {host}:{port}: {err}")))?;

        let sender = match url.scheme() {
            "http" => handshake(TokioIo::new(tcp)).await?,
            "https" => {
                let mut builder = SslConnector::builder(SslMethod::tls())
                    .map_err(WatchError::transport)?;
                if insecure {
                    builder.set_verify(SslVerifyMode::NONE);
                }
                let config = builder
                    .build()
                    .configure()
                    .map_err(WatchError::transport)?;
                let tls = tokio_boring::connect(config, host, tcp)
                    .await
                    .map_err(|err| WatchError::Transport(format!("tls {host}: {err:?}")))?;
                handshake(TokioIo::new(tls)).await?
            }
            other => return Err(WatchError::InvalidUrl(format!("unsupported scheme: {other}"))),
        };
        Ok(Self { sender })
    }

    pub(crate) async fn send(
        &mut self,
        request: Request<Full<Bytes>>,
    ) -> Result<Response<Incoming>, WatchError> {
        self.sender
            .send_request(request)
            .await
            .map_err(WatchError::transport)
    }
}

async fn handshake<T>(io: T) -> Result<SendRequest<Full<Bytes>>, WatchError>
where
    T: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
{
    let (sender, conn) = http1::handshake(io).await.map_err(WatchError::transport)?;
    tokio::spawn(async move {
        if let Err(err) = conn.await {
            debug!(%err, "connection driver finished with error");
        }
    });
    Ok(sender)
}
