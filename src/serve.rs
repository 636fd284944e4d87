//! Local preview server.
//!
//! Serves the output directory over HTTP with `tiny_http`, optionally
//! rebuilding on change in a background watcher thread:
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Main Thread   │     │  Watcher Thread  │
//! │  (HTTP Server)  │     │  (watch module)  │
//! └────────┬────────┘     └────────┬─────────┘
//!          ▼                       ▼
//!    serve <output>/         rebuild <output>/
//! ```
//!
//! Request resolution:
//!
//! 1. Percent-decode the path and drop any query string or fragment.
//! 2. Refuse `..` segments (404), so nothing outside the output directory
//!    is reachable.
//! 3. A directory resolves to its `index.html`.
//! 4. A missing file gets `<output>/404.html` if the site has one, plain
//!    text otherwise.
//!
//! If the configured port is taken the next ones are tried, up to
//! [`MAX_PORT_RETRIES`] in total. Ctrl+C unblocks the server and stops the
//! watcher.

use crate::config::SiteContext;
use crate::output::status_line;
use crate::site::{BuildEvent, BuildMode};
use crate::watch::{self, WatchError};
use std::fs;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tiny_http::{Header, Request, Response, Server};

/// Ports tried before giving up, starting at the configured one.
pub const MAX_PORT_RETRIES: u16 = 10;

const NOT_FOUND_PAGE: &str = "404.html";

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("Invalid interface address `{0}`")]
    Interface(String),
    #[error("Failed to bind after {attempts} attempts (ports {first}-{last}): {message}")]
    Bind {
        attempts: u16,
        first: u16,
        last: u16,
        message: String,
    },
    #[error("Failed to set Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),
    #[error(transparent)]
    Watch(#[from] WatchError),
}

/// How `serve` runs.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub interface: String,
    pub port: u16,
    /// Rebuild on change.
    pub watch: bool,
    /// Rebuild strategy used by the watcher.
    pub mode: BuildMode,
}

impl ServeOptions {
    /// Options from the `[serve]` config table, with full rebuilds.
    pub fn from_context(context: &SiteContext) -> Self {
        let serve = &context.config.serve;
        Self {
            interface: serve.interface.clone(),
            port: serve.port,
            watch: serve.watch,
            mode: BuildMode::Full,
        }
    }
}

/// Serve the site's output directory until Ctrl+C.
pub fn serve_site(
    context: &SiteContext,
    options: &ServeOptions,
    events: Option<Sender<BuildEvent>>,
) -> Result<(), ServeError> {
    let interface: IpAddr = options
        .interface
        .parse()
        .map_err(|_| ServeError::Interface(options.interface.clone()))?;
    let (server, addr) = try_bind_port(interface, options.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);
    let shutdown = Arc::new(AtomicBool::new(false));

    let server_for_signal = Arc::clone(&server);
    let shutdown_for_signal = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        println!("{}", status_line("serve", "shutting down..."));
        shutdown_for_signal.store(true, Ordering::SeqCst);
        server_for_signal.unblock();
    })?;

    println!("{}", status_line("serve", format!("http://{addr}")));

    let watcher = options.watch.then(|| {
        let root = context.root.clone();
        let mode = options.mode;
        let shutdown = Arc::clone(&shutdown);
        std::thread::spawn(move || {
            if let Err(e) = watch::watch_blocking(&root, mode, events, shutdown) {
                println!("{}", status_line("watch", e));
            }
        })
    });

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, &context.output_dir) {
            println!("{}", status_line("serve", format!("request error: {e}")));
        }
    }

    shutdown.store(true, Ordering::SeqCst);
    if let Some(handle) = watcher {
        let _ = handle.join();
    }
    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(
    interface: IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(Server, SocketAddr), ServeError> {
    let mut last_error = String::new();
    let mut last_port = base_port;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);
        last_port = port;
        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    println!(
                        "{}",
                        status_line("serve", format!("port {base_port} in use, using {port} instead"))
                    );
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = e.to_string(),
        }
    }
    Err(ServeError::Bind {
        attempts: max_retries,
        first: base_port,
        last: last_port,
        message: last_error,
    })
}

/// Map a request URL to a file under `serve_root`.
///
/// Returns `None` for anything that does not resolve to an existing file,
/// including paths that try to climb out of `serve_root`.
pub fn resolve_request_path(serve_root: &Path, url: &str) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let decoded = urlencoding::decode(path).ok()?;

    let mut local = serve_root.to_path_buf();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            s if s.contains('\\') => return None,
            s => local.push(s),
        }
    }

    if local.is_dir() {
        local.push("index.html");
    }
    local.is_file().then_some(local)
}

fn handle_request(request: Request, serve_root: &Path) -> io::Result<()> {
    match resolve_request_path(serve_root, request.url()) {
        Some(path) => serve_file(request, &path, 200),
        None => serve_not_found(request, serve_root),
    }
}

fn serve_file(request: Request, path: &Path, status: u16) -> io::Result<()> {
    let content = fs::read(path)?;
    let mut response = Response::from_data(content).with_status_code(status);
    if let Some(header) = content_type_header(guess_content_type(path)) {
        response.add_header(header);
    }
    request.respond(response)
}

fn serve_not_found(request: Request, serve_root: &Path) -> io::Result<()> {
    let custom = serve_root.join(NOT_FOUND_PAGE);
    if custom.is_file() {
        return serve_file(request, &custom, 404);
    }
    let mut response = Response::from_string("404 Not Found").with_status_code(404);
    if let Some(header) = content_type_header("text/plain; charset=utf-8") {
        response.add_header(header);
    }
    request.respond(response)
}

fn content_type_header(value: &str) -> Option<Header> {
    Header::from_bytes(&b"Content-Type"[..], value.as_bytes()).ok()
}

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "json" => "application/json; charset=utf-8",
        "xml" => "application/xml; charset=utf-8",

        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",

        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",

        "pdf" => "application/pdf",
        "txt" => "text/plain; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",

        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn site() -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("blog/category")).unwrap();
        fs::write(tmp.path().join("index.html"), "home").unwrap();
        fs::write(tmp.path().join("blog/hello.html"), "hello").unwrap();
        fs::write(tmp.path().join("blog/my post.html"), "spaced").unwrap();
        tmp
    }

    #[test]
    fn root_resolves_to_index() {
        let tmp = site();
        assert_eq!(
            resolve_request_path(tmp.path(), "/"),
            Some(tmp.path().join("index.html"))
        );
    }

    #[test]
    fn file_paths_resolve() {
        let tmp = site();
        assert_eq!(
            resolve_request_path(tmp.path(), "/blog/hello.html"),
            Some(tmp.path().join("blog/hello.html"))
        );
    }

    #[test]
    fn query_string_is_ignored() {
        let tmp = site();
        assert_eq!(
            resolve_request_path(tmp.path(), "/blog/hello.html?v=3#top"),
            Some(tmp.path().join("blog/hello.html"))
        );
    }

    #[test]
    fn percent_encoding_is_decoded() {
        let tmp = site();
        assert_eq!(
            resolve_request_path(tmp.path(), "/blog/my%20post.html"),
            Some(tmp.path().join("blog/my post.html"))
        );
    }

    #[test]
    fn directory_without_index_is_not_found() {
        let tmp = site();
        assert_eq!(resolve_request_path(tmp.path(), "/blog/category/"), None);
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = site();
        assert_eq!(resolve_request_path(tmp.path(), "/nope.html"), None);
    }

    #[test]
    fn parent_segments_are_refused() {
        let tmp = site();
        fs::write(tmp.path().join("blog/secret.txt"), "x").unwrap();
        let root = tmp.path().join("blog/category");
        assert_eq!(resolve_request_path(&root, "/../secret.txt"), None);
        assert_eq!(resolve_request_path(&root, "/%2E%2E/secret.txt"), None);
    }

    #[test]
    fn content_types() {
        assert_eq!(guess_content_type(Path::new("a.html")), "text/html; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("a.CSS")), "text/css; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("a.png")), "image/png");
        assert_eq!(guess_content_type(Path::new("CNAME")), "application/octet-stream");
    }

    #[test]
    fn bind_retries_next_port() {
        let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let taken = holder.local_addr().unwrap().port();
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        let (_server, addr) = try_bind_port(ip, taken, MAX_PORT_RETRIES).unwrap();
        assert_ne!(addr.port(), taken);
    }

    #[test]
    fn bind_gives_up_after_retries() {
        let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let taken = holder.local_addr().unwrap().port();
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        let Err(err) = try_bind_port(ip, taken, 1) else {
            panic!("port {taken} should be taken");
        };
        assert!(matches!(err, ServeError::Bind { attempts: 1, .. }));
    }

    #[test]
    fn options_follow_config() {
        let context = SiteContext::new(Path::new("/proj"), crate::config::SiteConfig::default());
        let options = ServeOptions::from_context(&context);
        assert_eq!(options.interface, "127.0.0.1");
        assert_eq!(options.port, 8000);
        assert!(options.watch);
        assert_eq!(options.mode, BuildMode::Full);
    }
}
