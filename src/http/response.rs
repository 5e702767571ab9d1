//! Routing and response construction.
//!
//! Every route answers `200 OK`. Storage faults are logged and the body falls
//! back to an empty or confirmation payload; the client never sees an error
//! status.

use tracing::{error, info, warn};

use super::dashboard::{DashboardTemplate, DashboardView};
use super::request::Request;
use crate::collaborators::BlobStore;
use crate::csv_log::CsvLog;

// ---

pub const MANIFEST_PATH: &str = "/img/site.webmanifest";
pub const FAVICON_PATH: &str = "/favicon.ico";
pub const LOG_PATH: &str = "/stats.csv";
pub const DELETE_PATH: &str = "/delete.html";

/// One week, for assets that never change between firmware updates.
pub const CACHE_STATIC_SECS: u32 = 604_800;
/// The dashboard changes on every poll.
pub const CACHE_DASHBOARD_SECS: u32 = 60;
pub const CACHE_NONE: u32 = 0;

const DELETE_CONFIRMATION: &str = "<!DOCTYPE HTML>\r\n<html><head><meta http-equiv=\"refresh\" content=\"3; url='/'\"></head>\r\n<body><p>Log deleted.</p><a href=\"/\">Back</a></body></html>\r\n";
const DELETE_FAILED: &str = "<!DOCTYPE HTML>\r\n<html><head><meta http-equiv=\"refresh\" content=\"3; url='/'\"></head>\r\n<body><p>Log could not be deleted.</p><a href=\"/\">Back</a></body></html>\r\n";

/// Routing outcome: the dashboard, or one of the fixed resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Dashboard,
    Resource(Resource<'a>),
}

/// Non-dashboard routes, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource<'a> {
    // ---
    Manifest,
    Favicon,
    Log,
    DeleteLog,
    Static(&'a str),
}

impl<'a> Route<'a> {
    // ---
    /// Resolve `request` by exact match on its path (query already stripped).
    pub fn resolve(request: &'a Request) -> Self {
        // ---
        if !request.is_resource_request {
            return Route::Dashboard;
        }
        let resource = match request.path.as_str() {
            MANIFEST_PATH => Resource::Manifest,
            FAVICON_PATH => Resource::Favicon,
            LOG_PATH => Resource::Log,
            DELETE_PATH => Resource::DeleteLog,
            other => Resource::Static(other),
        };
        Route::Resource(resource)
    }
}

/// A fully built response. Always sent with status `200 OK`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub body: Vec<u8>,
    pub content_type: &'static str,
    pub cache_max_age_seconds: u32,
}

impl Response {
    // ---
    pub fn head(&self) -> String {
        // ---
        format!(
            "HTTP/1.1 200 OK\r\nContent-type: {}\r\nCache-Control: max-age={}\r\n\r\n",
            self.content_type, self.cache_max_age_seconds
        )
    }

    /// Status line, headers and body as sent on the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        // ---
        let head = self.head();
        let mut bytes = Vec::with_capacity(head.len() + self.body.len());
        bytes.extend_from_slice(head.as_bytes());
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

/// Builds responses from borrowed server resources.
pub struct ResponseBuilder<'a> {
    log: &'a CsvLog,
    blobs: &'a dyn BlobStore,
    template: &'a DashboardTemplate,
}

impl<'a> ResponseBuilder<'a> {
    // ---
    pub fn new(log: &'a CsvLog, blobs: &'a dyn BlobStore, template: &'a DashboardTemplate) -> Self {
        Self {
            log,
            blobs,
            template,
        }
    }

    /// Response for any non-dashboard route.
    pub fn resource(&self, resource: Resource<'_>) -> Response {
        // ---
        match resource {
            Resource::Manifest => Response {
                body: self.blob(MANIFEST_PATH),
                content_type: "application/manifest+json",
                cache_max_age_seconds: CACHE_STATIC_SECS,
            },
            Resource::Favicon => Response {
                body: self.blob(FAVICON_PATH),
                content_type: "image/x-icon",
                cache_max_age_seconds: CACHE_STATIC_SECS,
            },
            Resource::Log => {
                info!("Sending CSV file");
                let mut body = match self.log.read_all() {
                    Ok(bytes) => bytes,
                    Err(e) if e.is_not_found() => {
                        info!("No csv found, sending empty log");
                        Vec::new()
                    }
                    Err(e) => {
                        warn!(error = %e, "Could not read csv");
                        Vec::new()
                    }
                };
                // trailing blank line kept for clients that expect it
                body.extend_from_slice(b"\r\n\r\n");
                Response {
                    body,
                    content_type: "text/csv",
                    cache_max_age_seconds: CACHE_NONE,
                }
            }
            Resource::DeleteLog => {
                info!(path = %self.log.path().display(), "Removing csv");
                let body = match self.log.delete() {
                    Ok(()) => DELETE_CONFIRMATION,
                    Err(e) => {
                        warn!(error = %e, "Could not delete csv");
                        DELETE_FAILED
                    }
                };
                Response {
                    body: body.as_bytes().to_vec(),
                    content_type: "text/html",
                    cache_max_age_seconds: CACHE_NONE,
                }
            }
            Resource::Static(path) => Response {
                body: self.blob(path),
                content_type: "image/png",
                cache_max_age_seconds: CACHE_STATIC_SECS,
            },
        }
    }

    /// Render the dashboard page. A template failure yields an empty page.
    pub fn dashboard(&self, view: &DashboardView) -> Response {
        // ---
        let body = match self.template.render(view) {
            Ok(html) => html.into_bytes(),
            Err(e) => {
                error!(error = %e, "Dashboard template failed to render");
                Vec::new()
            }
        };
        Response {
            body,
            content_type: "text/html",
            cache_max_age_seconds: CACHE_DASHBOARD_SECS,
        }
    }

    fn blob(&self, path: &str) -> Vec<u8> {
        // ---
        match self.blobs.fetch(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path, error = %e, "Static asset lookup failed, sending empty body");
                Vec::new()
            }
        }
    }
}
