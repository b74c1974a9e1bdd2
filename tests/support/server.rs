// tests/support/server.rs

#![allow(dead_code)]

use std::convert::Infallible;
use std::future::Future;
use std::net;
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use tokio::runtime;
use tokio::sync::oneshot;

/// A scripted HTTP/1 server running on its own thread and runtime, so that
/// blocking clients can be tested against it.
pub struct Server {
    addr: net::SocketAddr,
    panic_rx: std_mpsc::Receiver<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl Server {
    pub fn addr(&self) -> net::SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if !thread::panicking() {
            self.panic_rx
                .recv_timeout(Duration::from_secs(3))
                .expect("test server should not panic");
        }
    }
}

pub fn http<F, Fut>(func: F) -> Server
where
    F: Fn(http::Request<hyper::body::Incoming>) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = http::Response<Full<Bytes>>> + Send + 'static,
{
    let test_name = thread::current().name().unwrap_or("<unknown>").to_string();

    let rt = runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("new rt");
    let listener = rt.block_on(async move {
        tokio::net::TcpListener::bind(&net::SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap()
    });
    let addr = listener.local_addr().unwrap();

    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
    let (panic_tx, panic_rx) = std_mpsc::channel();
    let tname = format!("test({test_name})-support-server");
    thread::Builder::new()
        .name(tname)
        .spawn(move || {
            rt.block_on(async move {
                loop {
                    tokio::select! {
                        _ = &mut shutdown_rx => {
                            break;
                        }
                        accepted = listener.accept() => {
                            let (io, _) = accepted.expect("accepted");
                            let func = func.clone();
                            let svc = hyper::service::service_fn(move |req| {
                                let fut = func(req);
                                async move { Ok::<_, Infallible>(fut.await) }
                            });
                            tokio::spawn(async move {
                                let _ = hyper::server::conn::http1::Builder::new()
                                    .serve_connection(hyper_util::rt::TokioIo::new(io), svc)
                                    .await;
                            });
                        }
                    }
                }
                let _ = panic_tx.send(());
            });
        })
        .expect("thread spawn");

    Server {
        addr,
        panic_rx,
        shutdown_tx: Some(shutdown_tx),
    }
}
