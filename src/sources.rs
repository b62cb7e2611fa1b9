use crate::model::{EtxResponse, Host, HostsPage};
use anyhow::{Context, Result, anyhow};
use reqwest::{Client, Response, StatusCode};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::time::sleep;

const MAX_RETRIES: usize = 3;
const HTTP_TIMEOUT_SECONDS: u64 = 20;
const HOSTS_ENDPOINT: &str = "/api/v1/babel/hosts";
const ETX_ENDPOINT: &str = "/api/v1/babel/etx";
pub const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Deserialize)]
#[serde(untagged)]
enum HostsPayload {
    List(Vec<Host>),
    Page(HostsPage),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EtxPayload {
    Bare(FxHashMap<String, i64>),
    Wrapped(EtxResponse),
}

/// Nodes plus the total host count reported alongside them.
#[derive(Debug, Clone, Default)]
pub struct NodeSnapshot {
    pub hosts: Vec<Host>,
    pub total: usize,
}

pub fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("meshtable/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECONDS))
        .build()
        .context("failed to build HTTP client")
}

pub fn parse_hosts(bytes: &[u8]) -> Result<NodeSnapshot> {
    let payload: HostsPayload =
        serde_json::from_slice(bytes).context("failed to decode hosts payload")?;
    Ok(match payload {
        HostsPayload::List(hosts) => NodeSnapshot {
            total: hosts.len(),
            hosts,
        },
        HostsPayload::Page(page) => NodeSnapshot {
            total: page.total.max(page.nodes.len()),
            hosts: page.nodes,
        },
    })
}

pub fn parse_etx(bytes: &[u8]) -> Result<FxHashMap<String, i64>> {
    let payload: EtxPayload =
        serde_json::from_slice(bytes).context("failed to decode ETX payload")?;
    Ok(match payload {
        EtxPayload::Bare(map) => map,
        EtxPayload::Wrapped(response) => response.etx,
    })
}

pub async fn load_hosts_file(path: &Path) -> Result<NodeSnapshot> {
    let bytes = fs::read(path)
        .await
        .with_context(|| format!("failed to read hosts file {}", path.display()))?;
    let snapshot =
        parse_hosts(&bytes).with_context(|| format!("invalid hosts file {}", path.display()))?;
    tracing::info!(path = %path.display(), nodes = snapshot.hosts.len(), "loaded hosts file");
    Ok(snapshot)
}

pub async fn load_etx_file(path: &Path) -> Result<FxHashMap<String, i64>> {
    let bytes = fs::read(path)
        .await
        .with_context(|| format!("failed to read ETX file {}", path.display()))?;
    let metrics =
        parse_etx(&bytes).with_context(|| format!("invalid ETX file {}", path.display()))?;
    tracing::info!(path = %path.display(), prefixes = metrics.len(), "loaded ETX file");
    Ok(metrics)
}

fn endpoint_url(base: &str, endpoint: &str) -> String {
    format!("{}{endpoint}", base.trim_end_matches('/'))
}

fn hosts_page_url(base: &str, page: usize, limit: usize) -> String {
    format!(
        "{}?page={page}&limit={limit}",
        endpoint_url(base, HOSTS_ENDPOINT)
    )
}

pub async fn fetch_hosts(client: &Client, base: &str, page_size: usize) -> Result<NodeSnapshot> {
    let limit = page_size.max(1);
    let mut snapshot = NodeSnapshot::default();
    let mut page = 1;
    loop {
        let url = hosts_page_url(base, page, limit);
        let body: HostsPage = fetch_json(client, &url).await?;
        tracing::debug!(page, nodes = body.nodes.len(), total = body.total, "fetched hosts page");
        snapshot.total = body.total;
        let received = body.nodes.len();
        snapshot.hosts.extend(body.nodes);
        if received == 0 || received < limit || snapshot.hosts.len() >= body.total {
            break;
        }
        page += 1;
    }
    snapshot.total = snapshot.total.max(snapshot.hosts.len());
    tracing::info!(nodes = snapshot.hosts.len(), pages = page, "fetched mesh hosts");
    Ok(snapshot)
}

pub async fn fetch_etx(client: &Client, base: &str) -> Result<FxHashMap<String, i64>> {
    let url = endpoint_url(base, ETX_ENDPOINT);
    let response = send_with_retry(client, &url).await?;
    if response.status() == StatusCode::NOT_FOUND {
        tracing::warn!(url = %url, "Babel is disabled on the server; ETX values will be empty");
        return Ok(FxHashMap::default());
    }
    let body: EtxResponse = response
        .error_for_status()
        .with_context(|| format!("unexpected status from {url}"))?
        .json()
        .await
        .with_context(|| format!("failed to decode ETX response from {url}"))?;
    tracing::info!(prefixes = body.etx.len(), "fetched Babel ETX metrics");
    Ok(body.etx)
}

async fn fetch_json<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T> {
    send_with_retry(client, url)
        .await?
        .error_for_status()
        .with_context(|| format!("unexpected status from {url}"))?
        .json()
        .await
        .with_context(|| format!("failed to decode response body from {url}"))
}

// A 404 is returned as-is so callers can tell a disabled endpoint from an outage.
async fn send_with_retry(client: &Client, url: &str) -> Result<Response> {
    let mut last_err: Option<anyhow::Error> = None;
    for attempt in 1..=MAX_RETRIES {
        match client.get(url).send().await {
            Ok(response) if response.status() == StatusCode::NOT_FOUND => return Ok(response),
            Ok(response) => match response.error_for_status() {
                Ok(success) => return Ok(success),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }

        if attempt < MAX_RETRIES {
            let delay = calculate_backoff(attempt);
            tracing::warn!(url, attempt, delay_secs = delay.as_secs(), "request failed, retrying");
            sleep(delay).await;
        }
    }

    let detail = last_err
        .as_ref()
        .map_or_else(|| "unknown error".to_string(), describe_error);
    Err(anyhow!(
        "failed to fetch {url} after {MAX_RETRIES} attempts: {detail}"
    ))
}

fn calculate_backoff(attempt: usize) -> Duration {
    const MAX_BACKOFF_EXPONENT: u32 = 10;
    let exponent = u32::try_from(attempt)
        .unwrap_or(MAX_BACKOFF_EXPONENT)
        .min(MAX_BACKOFF_EXPONENT);
    let seconds = 2_u64.saturating_pow(exponent);
    Duration::from_secs(seconds)
}

fn describe_error(error: &anyhow::Error) -> String {
    let mut pieces: Vec<String> = Vec::new();
    for (idx, cause) in error.chain().enumerate() {
        let text = cause.to_string();
        if text.is_empty() {
            continue;
        }
        if idx == 0 {
            pieces.push(text);
        } else {
            pieces.push(format!("caused by {text}"));
        }
    }

    if pieces.is_empty() {
        format!("{error:?}")
    } else {
        pieces.join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const HOST_JSON: &str = r#"{"hostname": "n0call-1", "ip": "10.0.0.1"}"#;

    #[test]
    fn parses_page_and_bare_list() {
        let page = parse_hosts(format!(r#"{{"nodes": [{HOST_JSON}], "total": 7}}"#).as_bytes())
            .unwrap();
        assert_eq!(page.hosts.len(), 1);
        assert_eq!(page.total, 7);

        let list = parse_hosts(format!("[{HOST_JSON}, {HOST_JSON}]").as_bytes()).unwrap();
        assert_eq!(list.hosts.len(), 2);
        assert_eq!(list.total, 2);
    }

    #[test]
    fn parses_wrapped_and_bare_etx() {
        let wrapped = parse_etx(br#"{"etx": {"10.0.0.1/32": 512}}"#).unwrap();
        assert_eq!(wrapped.get("10.0.0.1/32"), Some(&512));

        let bare = parse_etx(br#"{"10.0.0.1/32": 256, "10.0.0.2/32": 0}"#).unwrap();
        assert_eq!(bare.len(), 2);
        assert_eq!(bare.get("10.0.0.2/32"), Some(&0));

        assert!(parse_etx(b"{}").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(parse_hosts(b"not json").is_err());
        assert!(parse_etx(br#"["10.0.0.1/32"]"#).is_err());
    }

    #[test]
    fn builds_endpoint_urls() {
        assert_eq!(
            hosts_page_url("http://localhost:3333/", 2, 50),
            "http://localhost:3333/api/v1/babel/hosts?page=2&limit=50"
        );
        assert_eq!(
            endpoint_url("http://localhost:3333", ETX_ENDPOINT),
            "http://localhost:3333/api/v1/babel/etx"
        );
    }

    #[test]
    fn backoff_grows_exponentially() {
        assert_eq!(calculate_backoff(1), Duration::from_secs(2));
        assert_eq!(calculate_backoff(2), Duration::from_secs(4));
        assert_eq!(calculate_backoff(100), Duration::from_secs(1024));
    }

    #[test]
    fn describes_error_chain() {
        let error = anyhow!("socket closed").context("failed to fetch hosts");
        assert_eq!(
            describe_error(&error),
            "failed to fetch hosts | caused by socket closed"
        );
    }

    #[tokio::test]
    async fn loads_files_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let hosts_path = dir.path().join("hosts.json");
        let etx_path = dir.path().join("etx.json");
        std::fs::write(&hosts_path, format!("[{HOST_JSON}]")).unwrap();
        std::fs::write(&etx_path, r#"{"etx": {"10.0.0.1/32": 1024}}"#).unwrap();

        let snapshot = load_hosts_file(&hosts_path).await.unwrap();
        assert_eq!(snapshot.hosts[0].hostname, "n0call-1");
        let etx = load_etx_file(&etx_path).await.unwrap();
        assert_eq!(etx.get("10.0.0.1/32"), Some(&1024));

        let missing = load_hosts_file(&dir.path().join("missing.json")).await;
        assert!(missing.is_err());
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    /// Serves canned responses keyed by request target until the test ends.
    async fn spawn_server(routes: Vec<(&'static str, String)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = vec![0_u8; 4096];
                let read = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..read]).to_string();
                let target = request.split_whitespace().nth(1).unwrap_or("").to_string();
                let response = routes
                    .iter()
                    .find(|(path, _)| *path == target)
                    .map_or_else(
                        || http_response("404 Not Found", r#"{"error": "not found"}"#),
                        |(_, body)| http_response("200 OK", body),
                    );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    fn local_client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    #[tokio::test]
    async fn fetches_every_hosts_page() {
        let page = |names: &[&str]| {
            let nodes: Vec<String> = names
                .iter()
                .enumerate()
                .map(|(i, name)| format!(r#"{{"hostname": "{name}", "ip": "10.0.1.{i}"}}"#))
                .collect();
            format!(r#"{{"nodes": [{}], "total": 3}}"#, nodes.join(","))
        };
        let base = spawn_server(vec![
            ("/api/v1/babel/hosts?page=1&limit=2", page(&["a", "b"])),
            ("/api/v1/babel/hosts?page=2&limit=2", page(&["c"])),
        ])
        .await;

        let client = local_client();
        let snapshot = fetch_hosts(&client, &base, 2).await.unwrap();
        let names: Vec<&str> = snapshot
            .hosts
            .iter()
            .map(|host| host.hostname.as_str())
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(snapshot.total, 3);
    }

    #[tokio::test]
    async fn etx_endpoint_and_disabled_babel() {
        let base = spawn_server(vec![(
            "/api/v1/babel/etx",
            r#"{"etx": {"10.0.0.1/32": 512}}"#.to_string(),
        )])
        .await;
        let client = local_client();
        let etx = fetch_etx(&client, &base).await.unwrap();
        assert_eq!(etx.get("10.0.0.1/32"), Some(&512));

        let disabled = spawn_server(Vec::new()).await;
        assert!(fetch_etx(&client, &disabled).await.unwrap().is_empty());
    }
}
