//! Shared helpers for the gateway integration tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::net::TcpListener;

use formgate::config::schema::Notifier;
use formgate::config::GatewayConfig;
use formgate::http::Server;
use formgate::notify::mailer::{MailError, Mailer, MailerFactory, OutgoingEmail};

/// Mailer that records every email instead of delivering it.
#[derive(Default)]
pub struct MockMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl MockMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, mail: &OutgoingEmail) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

/// Factory handing the same recording mailer to every notifier.
pub struct MockMailerFactory {
    pub mailer: Arc<MockMailer>,
}

impl MailerFactory for MockMailerFactory {
    fn create(&self, _notifier: &Notifier) -> Result<Arc<dyn Mailer>, MailError> {
        Ok(Arc::clone(&self.mailer) as Arc<dyn Mailer>)
    }
}

/// Configuration with one site ("acme") exposing one form ("contact").
pub fn gateway_config(rate_limit_per_minute: i64) -> GatewayConfig {
    let raw = serde_json::json!({
        "listenAddress": "127.0.0.1:0",
        "maxBodyBytes": 65536,
        "rateLimit": {"perIpSiteMinute": rate_limit_per_minute},
        "sites": [{
            "id": "acme",
            "token": "site-secret",
            "allowedOrigins": ["https://acme.example"],
            "forms": [{
                "id": "contact",
                "fields": {
                    "name": {"type": "string", "required": true, "max": 200},
                    "message": {"type": "string", "required": true}
                },
                "notifiers": [{
                    "from": "noreply@acme.example",
                    "to": "owner@acme.example",
                    "lang": "en",
                    "subject": "New message from {{ payload.name }}",
                    "intro": "You received a new contact form submission.",
                    "username": "user",
                    "password": "pass",
                    "host": "smtp.acme.example",
                    "port": 587
                }],
                "accessControlMaxAge": 600
            }]
        }]
    });

    serde_json::from_value(raw).expect("test config must deserialize")
}

/// Bind an ephemeral port and serve the gateway on it.
pub async fn start_gateway(config: GatewayConfig, mailer: Arc<MockMailer>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");

    let server = Server::new(config, &MockMailerFactory { mailer }).expect("build test server");

    tokio::spawn(server.serve(listener));

    addr
}
