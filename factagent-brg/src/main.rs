use dotenv::dotenv;
use factagent::pipeline::RunHooks;
use factagent::{build_checker, CheckOutcome, Config, LiveChecker};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message as Frame;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod review;

use api::message::{
    now, CheckErrorPayload, CheckRequestPayload, CheckResultPayload, Message, SimilarClaim,
};
use review::{PendingReviews, WsObserver, WsReviewer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let checker = Arc::new(build_checker(&config)?);

    let addr: SocketAddr = config.brg_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "factagent-brg listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let checker = Arc::clone(&checker);
        tokio::spawn(async move {
            if let Err(e) = serve(stream, checker).await {
                warn!(%peer, error = %e, "connection closed with error");
            }
        });
    }
}

async fn serve(stream: TcpStream, checker: Arc<LiveChecker>) -> anyhow::Result<()> {
    let ws = accept_async(stream).await?;
    let (mut sink, mut frames) = ws.split();
    let (outbound, mut queue) = mpsc::unbounded_channel::<Message>();
    let pending = PendingReviews::default();
    let session = uuid::Uuid::new_v4().to_string();

    let writer = tokio::spawn(async move {
        while let Some(msg) = queue.recv().await {
            let text = serde_json::to_string(&msg)?;
            sink.send(Frame::Text(text)).await?;
        }
        anyhow::Ok(())
    });

    while let Some(frame) = frames.next().await {
        let frame = frame?;
        if !frame.is_text() {
            continue;
        }
        let parsed: Message = match serde_json::from_str(frame.to_text()?) {
            Ok(msg) => msg,
            Err(e) => {
                let _ = outbound.send(Message::CheckError {
                    id: "system".to_string(),
                    ts: now(),
                    payload: CheckErrorPayload {
                        message: format!("JSON parse error: {e}"),
                    },
                });
                continue;
            }
        };

        match parsed {
            Message::CheckRequest { id, payload, .. } => {
                let checker = Arc::clone(&checker);
                let outbound = outbound.clone();
                let pending = pending.clone();
                let session = payload.session.clone().unwrap_or_else(|| session.clone());
                tokio::spawn(async move {
                    run_check(checker, id, session, payload, outbound, pending).await;
                });
            }
            Message::ReviewResponse { id, payload, .. } => {
                if !pending.resolve(&id, payload) {
                    warn!(check = %id, "review response nobody asked for");
                }
            }
            other => warn!(frame = ?other, "ignoring server-side message from client"),
        }
    }

    drop(outbound);
    writer.await??;
    Ok(())
}

async fn run_check(
    checker: Arc<LiveChecker>,
    id: String,
    session: String,
    request: CheckRequestPayload,
    outbound: mpsc::UnboundedSender<Message>,
    pending: PendingReviews,
) {
    let observer = WsObserver::new(&id, outbound.clone());
    let reviewer = WsReviewer::new(&id, outbound.clone(), pending);
    let mut hooks = RunHooks::default().with_observer(&observer);
    if request.review {
        hooks = hooks.with_reviewer(&reviewer);
    }

    let reply = match checker.check_with(&session, &request.claim, None, hooks).await {
        CheckOutcome::Cached(check) => Message::CheckResult {
            id,
            ts: now(),
            payload: CheckResultPayload {
                result: check.result,
                cached: true,
                human_reviewed: check.human_reviewed,
                duration_secs: check.duration_secs,
                similar: Vec::new(),
            },
        },
        CheckOutcome::Completed {
            result,
            similar,
            human_reviewed,
            duration,
        } => Message::CheckResult {
            id,
            ts: now(),
            payload: CheckResultPayload {
                result,
                cached: false,
                human_reviewed,
                duration_secs: duration.as_secs_f64(),
                similar: similar.iter().map(SimilarClaim::from).collect(),
            },
        },
        CheckOutcome::Failed { error, .. } => Message::CheckError {
            id,
            ts: now(),
            payload: CheckErrorPayload { message: error },
        },
        CheckOutcome::Rejected(rejection) => Message::CheckError {
            id,
            ts: now(),
            payload: CheckErrorPayload {
                message: rejection.to_string(),
            },
        },
    };
    if outbound.send(reply).is_err() {
        error!("client went away before the result was sent");
    }
}
