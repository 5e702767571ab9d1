//! The narrow HTTP surface: request-line parsing, routing, response framing and
//! the dashboard page.

mod dashboard;
mod request;
mod response;

pub use dashboard::{DashboardTemplate, DashboardView, ExtremesView, ReadingsView, Runtime};
pub use request::{read_request, Request, MAX_HEADER_LINES, MAX_REQUEST_BYTES};
pub use response::{
    Resource, Response, ResponseBuilder, Route, CACHE_DASHBOARD_SECS, CACHE_NONE, CACHE_STATIC_SECS,
};
