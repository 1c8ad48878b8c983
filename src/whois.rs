//! Raw WHOIS client: TCP/43, optionally tunneled through a SOCKS5 proxy,
//! with every I/O step bounded by the configured `WhoisTimeout`.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_socks::tcp::Socks5Stream;
use tracing::{debug, info, warn};

use crate::config;
use crate::errors::LookupError;
use crate::record::{DomainInfo, LookupOutcome, LookupType};
use crate::tld_tables::{WHOIS_MATCHERS, WHOIS_TLD_OPTIONS, WHOIS_TLD_SERVERS};
use crate::whois_parser::{parse_whois_response, WhoisParseError};

const WHOIS_PORT: u16 = 43;

// Registries close the stream after the response; the cap only guards
// against a misbehaving peer that never does.
const MAX_RESPONSE_SIZE: usize = 2 * 1024 * 1024;

/// Query the WHOIS record for `domain` against the registry server of `tld`.
pub async fn whois_query(domain: &str, tld: &str, use_proxy: bool) -> LookupOutcome {
    debug!("Querying whois for domain: {}", domain);

    let mut info = DomainInfo {
        lookup_type: LookupType::Whois,
        via_proxy: use_proxy,
        domain_name: domain.to_string(),
        ..DomainInfo::default()
    };

    let Some(&server) = WHOIS_TLD_SERVERS.get(tld) else {
        warn!("Whois not supported for TLD: {}", tld);
        return LookupOutcome::err(info, LookupError::NotSupportedTld(tld.to_string()));
    };

    let cfg = config::get();
    let io_timeout = Duration::from_secs(cfg.whois_timeout);

    let query = match WHOIS_TLD_OPTIONS.get(tld) {
        Some(prefix) => format!("{prefix} {domain}\r\n"),
        None => format!("{domain}\r\n"),
    };

    info!(
        "Querying WHOIS for domain: {} with TLD: {} on server: {}",
        domain, tld, server
    );

    let body = if use_proxy {
        let proxy_addr = (cfg.socket_proxy_host.as_str(), cfg.socket_proxy_port);
        let connect = async {
            if cfg.socket_proxy_auth {
                Socks5Stream::connect_with_password(
                    proxy_addr,
                    (server, WHOIS_PORT),
                    &cfg.socket_proxy_user,
                    &cfg.socket_proxy_password,
                )
                .await
            } else {
                Socks5Stream::connect(proxy_addr, (server, WHOIS_PORT)).await
            }
        };

        let mut stream = match timeout(io_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                warn!("Failed to connect to whois server {} via proxy: {}", server, err);
                return LookupOutcome::err(info, LookupError::ConnectToProxy(err.to_string()));
            }
            Err(_) => {
                warn!("Timeout connecting to whois server {} via proxy", server);
                return LookupOutcome::err(
                    info,
                    LookupError::WhoisTimeout(format!("connect to {server} via proxy")),
                );
            }
        };

        match exchange(&mut stream, &query, io_timeout).await {
            Ok(body) => body,
            Err(err) => return LookupOutcome::err(info, err),
        }
    } else {
        let mut stream = match timeout(io_timeout, TcpStream::connect((server, WHOIS_PORT))).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                warn!("Failed to connect to whois server {}: {}", server, err);
                return LookupOutcome::err(info, LookupError::WhoisTimeout(err.to_string()));
            }
            Err(_) => {
                warn!("Timeout connecting to whois server {}", server);
                return LookupOutcome::err(
                    info,
                    LookupError::WhoisTimeout(format!("connect to {server}")),
                );
            }
        };

        match exchange(&mut stream, &query, io_timeout).await {
            Ok(body) => body,
            Err(err) => return LookupOutcome::err(info, err),
        }
    };

    info.raw_response = body.clone();
    debug!("Whois query raw result:\n{}", body);

    if let Err(err) = ensure_body(&body, domain) {
        return LookupOutcome::err(info, err);
    }

    let Some(matcher) = WHOIS_MATCHERS.get(tld) else {
        tracing::error!("No parsing rule for TLD: {}", tld);
        return LookupOutcome::err(info, LookupError::NoParseRuleForTld(tld.to_string()));
    };

    match parse_whois_response(&body, domain, matcher) {
        Ok(mut parsed) => {
            parsed.via_proxy = use_proxy;
            LookupOutcome::ok(parsed)
        }
        Err(WhoisParseError::DomainNotFound) => {
            info!("Domain {} is not registered", domain);
            LookupOutcome::err(info, LookupError::WhoisNotFound(domain.to_string()))
        }
        Err(WhoisParseError::NoDomainInfo) => {
            tracing::error!("Failed to parse WHOIS response for domain {}", domain);
            LookupOutcome::err(
                info,
                LookupError::ParseWhoisResponse("no domain info found in whois response".into()),
            )
        }
    }
}

/// The empty-body check runs before any matcher regex is considered.
pub(crate) fn ensure_body(body: &str, domain: &str) -> Result<(), LookupError> {
    if body.trim().is_empty() {
        return Err(LookupError::NoContentInWhoisResponse(domain.to_string()));
    }
    Ok(())
}

/// Send the query line and read until the server closes the stream, with a
/// fresh deadline before every I/O operation.
async fn exchange<S>(stream: &mut S, query: &str, io_timeout: Duration) -> Result<String, LookupError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match timeout(io_timeout, stream.write_all(query.as_bytes())).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            warn!("Failed to write whois query: {}", err);
            return Err(LookupError::WhoisTimeout(err.to_string()));
        }
        Err(_) => return Err(LookupError::WhoisTimeout("write query".into())),
    }

    let mut response = Vec::new();
    let mut buffer = [0u8; 4096];
    loop {
        match timeout(io_timeout, stream.read(&mut buffer)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => {
                response.extend_from_slice(&buffer[..n]);
                if response.len() > MAX_RESPONSE_SIZE {
                    return Err(LookupError::WhoisServerFailed("response too large".into()));
                }
            }
            Ok(Err(err)) => {
                warn!("Failed to read WHOIS response: {}", err);
                return Err(LookupError::WhoisServerFailed(err.to_string()));
            }
            Err(_) => return Err(LookupError::WhoisTimeout("read response".into())),
        }
    }

    Ok(String::from_utf8_lossy(&response).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_maps_to_no_content_before_any_parsing() {
        let err = ensure_body("", "example.com").unwrap_err();
        assert_eq!(
            err,
            LookupError::NoContentInWhoisResponse("example.com".into())
        );
        assert!(ensure_body("   \r\n", "example.com").is_err());
        assert!(ensure_body("Domain Name: EXAMPLE.COM", "example.com").is_ok());
    }

    #[tokio::test]
    async fn exchange_reads_until_close_and_honors_the_query_line() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut line = vec![0u8; 64];
            let n = socket.read(&mut line).await.unwrap();
            assert_eq!(&line[..n], b"example.com\r\n");
            socket.write_all(b"Domain Name: EXAMPLE.COM\r\n").await.unwrap();
            // Dropping the socket closes the stream, ending the read loop.
        });

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let body = exchange(&mut stream, "example.com\r\n", Duration::from_secs(2))
            .await
            .unwrap();
        assert!(body.contains("EXAMPLE.COM"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_server_times_out_as_whois_timeout() {
        // RFC 5737 TEST-NET-1 address: connection attempts hang or fail.
        let result = timeout(
            Duration::from_millis(200),
            TcpStream::connect(("192.0.2.1", WHOIS_PORT)),
        )
        .await;
        let err = match result {
            Err(_) => LookupError::WhoisTimeout("connect".into()),
            Ok(Err(e)) => LookupError::WhoisTimeout(e.to_string()),
            Ok(Ok(_)) => panic!("TEST-NET-1 must not accept connections"),
        };
        assert!(matches!(err, LookupError::WhoisTimeout(_)));
    }
}
