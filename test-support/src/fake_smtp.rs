use log::debug;
use mailin_embedded::{Handler, Server, SslConfig};
use std::{
    net::IpAddr,
    sync::{Arc, Once, OnceLock},
    time::Duration,
};
use tokio::{
    net::TcpListener,
    sync::watch::{self, error::RecvError, Receiver, Sender},
    time::timeout,
};

pub const SMTP_PORT: u16 = 4567;
pub const POISONED_SMTP_PORT: u16 = 4568;

const SERVER_NAME: &str = "contact-relay.test";

#[derive(Clone)]
struct SmtpHandler(Vec<u8>, Arc<Sender<String>>);

impl Handler for SmtpHandler {
    fn data(&mut self, buf: &[u8]) -> std::io::Result<()> {
        debug!("Got data:\n{}", String::from_utf8_lossy(buf));
        self.0.extend(buf);
        Ok(())
    }

    fn data_end(&mut self) -> mailin_embedded::Response {
        let content = String::from_utf8_lossy(&self.0).into_owned();
        self.0.clear();
        // Only fails once the receiver is gone.
        let _ = self.1.send(content);
        mailin_embedded::response::OK
    }

    fn auth_plain(
        &mut self,
        authorization_id: &str,
        authentication_id: &str,
        _password: &str,
    ) -> mailin_embedded::Response {
        debug!("Got authentication data {authorization_id}, {authentication_id}");
        mailin_embedded::response::AUTH_OK
    }
}

/// An SMTP server on [`SMTP_PORT`] which accepts everything and remembers the last message.
pub struct FakeSmtpServer(
    std::sync::Mutex<Option<Server<SmtpHandler>>>,
    tokio::sync::Mutex<Receiver<String>>,
);

impl FakeSmtpServer {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel("".into());
        let handler = SmtpHandler(Vec::new(), Arc::new(sender));
        let mut server = Server::new(handler);
        server
            .with_name(SERVER_NAME)
            .with_ssl(SslConfig::None)
            .unwrap()
            .with_addr(format!("127.0.0.1:{SMTP_PORT}"))
            .unwrap();
        Self(
            std::sync::Mutex::new(Some(server)),
            tokio::sync::Mutex::new(receiver),
        )
    }

    /// Starts serving on a background thread. Later calls do nothing.
    pub fn start(&self) {
        let mut guard = self.0.lock().unwrap();
        if let Some(server) = guard.take() {
            std::thread::spawn(move || {
                let _ = server.serve();
            });
        }
    }

    pub fn url(&self) -> String {
        format!("smtp://127.0.0.1:{SMTP_PORT}")
    }

    /// Waits for the next message to arrive and returns its raw content.
    pub async fn last_mail_content(&self) -> Result<String, RecvError> {
        let mut receiver = self.1.lock().await;
        receiver.changed().await?;
        let content = receiver.borrow_and_update().clone();
        Ok(content)
    }

    /// Discards any message which arrived before now.
    pub async fn flush(&self) {
        let mut receiver = self.1.lock().await;
        let _ = timeout(Duration::from_millis(100), receiver.changed()).await;
        let _ = receiver.borrow_and_update();
    }
}

impl Default for FakeSmtpServer {
    fn default() -> Self {
        Self::new()
    }
}

/// The fake SMTP server shared by every test in the process.
pub fn fake_smtp() -> &'static FakeSmtpServer {
    static FAKE_SMTP: OnceLock<FakeSmtpServer> = OnceLock::new();
    FAKE_SMTP.get_or_init(FakeSmtpServer::new)
}

#[derive(Clone)]
struct PoisonedSmtpHandler;

impl Handler for PoisonedSmtpHandler {
    fn helo(&mut self, _ip: IpAddr, _domain: &str) -> mailin_embedded::Response {
        mailin_embedded::response::INTERNAL_ERROR
    }

    fn mail(&mut self, _ip: IpAddr, _domain: &str, _from: &str) -> mailin_embedded::Response {
        mailin_embedded::response::INTERNAL_ERROR
    }
}

/// Starts an SMTP server which refuses every message, returning its URL.
pub fn start_poisoned_smtp_server() -> String {
    static STARTED: Once = Once::new();
    STARTED.call_once(|| {
        let mut server = Server::new(PoisonedSmtpHandler);
        server
            .with_name(SERVER_NAME)
            .with_ssl(SslConfig::None)
            .unwrap()
            .with_addr(format!("127.0.0.1:{POISONED_SMTP_PORT}"))
            .unwrap();
        std::thread::spawn(move || {
            let _ = server.serve();
        });
    });
    format!("smtp://127.0.0.1:{POISONED_SMTP_PORT}")
}

/// Starts an SMTP server which accepts connections but never greets the client, returning its URL.
pub async fn start_unresponsive_smtp_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut connections = Vec::new();
        while let Ok((stream, peer)) = listener.accept().await {
            debug!("Holding SMTP connection from {peer}");
            connections.push(stream);
        }
    });
    format!("smtp://{address}")
}
