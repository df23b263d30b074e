#![deny(warnings)]
#![warn(unused_extern_crates)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]

#[macro_use]
extern crate tracing;

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use proxycheck_client::{ProxyCheckClient, ProxyCheckClientBuilder};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::{self, JoinHandle};

mod mock;

pub use crate::mock::{
    MockBehaviour, AUTH_CODE, AUTH_REQ_ID, CSRF_COOKIE, CSRF_TOKEN, SESSION_COOKIE, SESSION_TOKEN,
};
use crate::mock::MockState;

pub static PORT_ALLOC: AtomicU16 = AtomicU16::new(18080);

/// A running mock server. Dropping it without calling
/// [`TestHandle::shutdown`] leaves the server to die with the runtime.
pub struct TestHandle {
    addr: String,
    state: Arc<MockState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl TestHandle {
    pub fn get_url(&self) -> &str {
        self.addr.as_str()
    }

    /// Every request the mock has seen so far as `"METHOD /path"`, in order.
    pub fn requests(&self) -> Vec<String> {
        self.state.requests()
    }

    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

async fn bind_free_port() -> (TcpListener, u16) {
    let mut counter = 0;
    loop {
        let possible_port = PORT_ALLOC.fetch_add(1, Ordering::SeqCst);
        match TcpListener::bind(("127.0.0.1", possible_port)).await {
            Ok(listener) => return (listener, possible_port),
            Err(e) => {
                debug!(?e, port = possible_port, "port unavailable");
            }
        }
        counter += 1;
        #[allow(clippy::panic)]
        if counter >= 5 {
            error!("Unable to allocate port!");
            panic!();
        }
    }
}

/// Start the mock proxy and dex on a free local port and build a client
/// pointed at it.
pub async fn setup_async_test(behaviour: MockBehaviour) -> (ProxyCheckClient, TestHandle) {
    sketching::test_init();

    let (listener, port) = bind_free_port().await;
    let state = Arc::new(MockState::new(behaviour));
    let app = mock::router(state.clone());
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let join = task::spawn(async move {
        let res = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
        if let Err(e) = res {
            error!(?e, "mock server failed");
        }
    });
    // We have to yield now to guarantee that the server task is running.
    task::yield_now().await;

    let addr = format!("http://127.0.0.1:{}", port);

    #[allow(clippy::panic)]
    let rsclient = match ProxyCheckClientBuilder::new()
        .address(addr.clone())
        .no_proxy()
        .build()
    {
        Ok(val) => val,
        Err(_) => panic!("failed to build client"),
    };

    info!("Testkit server setup complete - {}", addr);

    (
        rsclient,
        TestHandle {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
            join: Some(join),
        },
    )
}
