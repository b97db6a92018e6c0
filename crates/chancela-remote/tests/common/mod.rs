// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub signature server for integration tests.

#![allow(dead_code)]

use std::io::Read;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use chancela_core::config::ClientSettings;
use tiny_http::{Header, Response, Server};

/// One request as the stub saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }
}

/// What the stub answers for a given method and path.
pub struct Reply {
    pub status: u16,
    pub body: String,
    pub headers: Vec<(&'static str, &'static str)>,
    pub delay: Option<Duration>,
}

impl Reply {
    pub fn json(body: serde_json::Value) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            headers: Vec::new(),
            delay: None,
        }
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Start a stub on an ephemeral port. Returns its base URL and a feed of
/// every request it receives.
pub fn serve<F>(route: F) -> (String, Receiver<Recorded>)
where
    F: Fn(&str, &str) -> Reply + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").expect("bind stub server");
    let addr = server.server_addr().to_ip().expect("ip listener");
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for mut request in server.incoming_requests() {
            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            let recorded = Recorded {
                method: request.method().to_string(),
                path: request.url().to_string(),
                headers: request
                    .headers()
                    .iter()
                    .map(|h| (h.field.as_str().to_string(), h.value.as_str().to_string()))
                    .collect(),
                body,
            };
            let reply = route(&recorded.method, &recorded.path);
            let _ = tx.send(recorded);

            if let Some(delay) = reply.delay {
                thread::sleep(delay);
            }
            let mut response = Response::from_string(reply.body)
                .with_status_code(reply.status)
                .with_header(
                    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("header"),
                );
            for (name, value) in reply.headers {
                response = response
                    .with_header(Header::from_bytes(name.as_bytes(), value.as_bytes()).expect("header"));
            }
            let _ = request.respond(response);
        }
    });

    (format!("http://{addr}"), rx)
}

/// Settings pointing every URL at `base`.
pub fn settings_for(base: &str) -> ClientSettings {
    ClientSettings {
        local_server_url: format!("{base}/local"),
        remote_server_url: format!("{base}/remote"),
        validation_service_url: format!("{base}/validation"),
        connect_timeout_secs: 2,
        request_timeout_secs: 5,
        ..ClientSettings::default()
    }
}

/// Every request received so far.
pub fn drain(rx: &Receiver<Recorded>) -> Vec<Recorded> {
    rx.try_iter().collect()
}
