use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};

use log::Level;
use rocket::{
    fairing::{Fairing, Info, Kind},
    http::{Method, Status, StatusClass},
    request::{FromRequest, Outcome},
    Data, Orbit, Request, Response, Rocket,
};

/// A per-process sequence number identifying one request in the logs.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct RequestId(pub usize);

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl RequestId {
    /// Atomically take the next ID, wrapping on overflow.
    pub fn next() -> RequestId {
        static REQUEST_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);
        RequestId(REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for &'r RequestId {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(req.local_cache(RequestId::next))
    }
}

/// The level a response with the given status is logged at.
///
/// Rejected logins and votes are routine, so client errors are warnings.
pub fn level_for(status: Status) -> Level {
    match status.class() {
        StatusClass::ServerError => Level::Error,
        StatusClass::ClientError => Level::Warn,
        _ => Level::Info,
    }
}

/// The log line for an incoming request.
fn request_line(id: RequestId, method: Method, path: &str) -> String {
    format!("->req{id} {method} {path}")
}

/// The log line for an outgoing response, paired with its request by `id`.
fn response_line(id: RequestId, status: Status, route: &str) -> String {
    format!("<-rsp{id} {status} {route}")
}

/// Describe the route that handled a request, for the response log line.
fn describe_route(req: &Request<'_>) -> String {
    match req.route() {
        Some(route) => match route.name {
            Some(ref name) => format!("{name} ({})", route.uri),
            None => route.uri.to_string(),
        },
        None => "no route".to_string(),
    }
}

/// Logs server launch and shutdown, and one line for each request and response.
///
/// Query strings are left out of the request line, as login links carry their token there.
#[derive(Debug, Copy, Clone)]
pub struct LoggerFairing;

#[rocket::async_trait]
impl Fairing for LoggerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Logger",
            kind: Kind::Liftoff | Kind::Request | Kind::Response | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let protocol = if rocket.config().tls_enabled() {
            "https"
        } else {
            "http"
        };
        let ip = &rocket.config().address;
        let port = &rocket.config().port;
        info!("Election server listening on {protocol}://{ip}:{port}");
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        let id = req.local_cache(RequestId::next);
        info!("{}", request_line(*id, req.method(), req.uri().path().as_str()));
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let id = req.local_cache(RequestId::next);
        let status = res.status();
        log!(
            level_for(status),
            "{}",
            response_line(*id, status, &describe_route(req))
        );
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        warn!("Shutdown requested, stopping gracefully...");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_follow_status_class() {
        assert_eq!(Level::Info, level_for(Status::Ok));
        assert_eq!(Level::Info, level_for(Status::Created));
        assert_eq!(Level::Warn, level_for(Status::Conflict));
        assert_eq!(Level::Warn, level_for(Status::Gone));
        assert_eq!(Level::Error, level_for(Status::ServiceUnavailable));
    }

    #[test]
    fn ids_increase() {
        let first = RequestId::next();
        let second = RequestId::next();
        assert!(second > first);
        assert_eq!(first.0.to_string(), first.to_string());
    }

    #[test]
    fn request_and_response_lines_pair_up() {
        let id = RequestId(42);
        assert_eq!(
            "->req42 POST /auth/link",
            request_line(id, Method::Post, "/auth/link")
        );
        assert_eq!(
            "<-rsp42 409 Conflict request_link (/auth/link)",
            response_line(id, Status::Conflict, "request_link (/auth/link)")
        );
    }
}
