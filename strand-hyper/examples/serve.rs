use std::net::SocketAddr;
use std::time::Duration;

use serde::Serialize;
use strand::http::StatusCode;
use strand::{Context, Server};
use strand_hyper::Serve;

#[derive(Serialize)]
struct Tick {
    message: String,
    seq: u64,
}

struct CurrentUser {
    id: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let app = Server::new()
        .wrap(|cx: Context| async move {
            cx.set("user", CurrentUser { id: 1 });
            tracing::info!(method = %cx.method(), path = cx.path(), "request");
        })
        .get("/", |cx: Context| async move {
            cx.text("hello from strand\n");
        })
        .ws("/ws", (guard, ticker));

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    tracing::info!(%addr, "listening");

    if let Err(err) = app.serve(addr).await {
        tracing::error!(error = %err, "server error");
    }
}

// Runs before the handshake; can still veto the upgrade.
async fn guard(cx: Context) {
    match cx.get::<CurrentUser>("user") {
        Some(user) if user.id != 0 => {}
        _ => {
            cx.status(StatusCode::UNAUTHORIZED);
            cx.halt();
        }
    }
}

async fn ticker(cx: Context) {
    let mut seq = 0;

    loop {
        let tick = Tick {
            message: format!("hello {}", seq),
            seq,
        };

        if cx.send_json(&tick).await.is_err() {
            return;
        }

        seq += 1;
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
