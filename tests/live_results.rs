//! Live results over a real socket: a served router and a websocket client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use live_poll::bus::FanoutBus;
use live_poll::http::{AppState, router};
use live_poll::models::Poll;
use live_poll::store::PollCatalog;
use live_poll::store::memory::{MemoryCatalog, MemoryLedger, MemoryScoreStore};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use uuid::Uuid;

type Viewer = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct LiveServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    poll: Poll,
}

impl LiveServer {
    async fn start() -> Self {
        let catalog = Arc::new(MemoryCatalog::new());
        let poll = Poll::new("p1".into(), vec!["A".into(), "B".into()]);
        catalog.create_poll(&poll).await.unwrap();

        let state = Arc::new(AppState::new(
            catalog,
            Arc::new(MemoryLedger::new()),
            Arc::new(MemoryScoreStore::new()),
            Arc::new(FanoutBus::default()),
        ));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state, poll }
    }

    fn results_url(&self, poll_id: &str) -> String {
        format!("ws://{}/polls/{}/results", self.addr, poll_id)
    }

    async fn watch(&self) -> Viewer {
        let (viewer, _) = connect_async(self.results_url(&self.poll.id.to_string()))
            .await
            .unwrap();
        viewer
    }

    fn option(&self, index: usize) -> Uuid {
        self.poll.options[index].id
    }

    async fn wait_for_no_channels(&self) {
        for _ in 0..100 {
            if self.state.bus.channel_count() == 0 {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("channel still registered: {}", self.state.bus.channel_count());
    }
}

async fn next_frame(viewer: &mut Viewer) -> (Uuid, i64) {
    loop {
        let message = timeout(Duration::from_secs(2), viewer.next())
            .await
            .expect("no frame within 2s")
            .expect("socket closed")
            .unwrap();
        if !message.is_text() {
            continue;
        }

        let frame: Value = serde_json::from_str(message.to_text().unwrap()).unwrap();
        let option_id = Uuid::parse_str(frame["pollOptionId"].as_str().unwrap()).unwrap();
        return (option_id, frame["votes"].as_i64().unwrap());
    }
}

#[tokio::test]
async fn viewer_gets_snapshot_then_deltas() {
    let server = LiveServer::start().await;
    let (a, b) = (server.option(0), server.option(1));

    let first = server
        .state
        .engine
        .submit_vote(server.poll.id, None, b)
        .await
        .unwrap();

    let mut viewer = server.watch().await;
    assert_eq!(next_frame(&mut viewer).await, (a, 0));
    assert_eq!(next_frame(&mut viewer).await, (b, 1));

    server
        .state
        .engine
        .submit_vote(server.poll.id, Some(first.voter_id), a)
        .await
        .unwrap();

    assert_eq!(next_frame(&mut viewer).await, (b, 0));
    assert_eq!(next_frame(&mut viewer).await, (a, 1));
}

#[tokio::test]
async fn every_viewer_sees_the_same_changes() {
    let server = LiveServer::start().await;
    let a = server.option(0);
    let mut viewers = vec![server.watch().await, server.watch().await];
    for viewer in &mut viewers {
        next_frame(viewer).await;
        next_frame(viewer).await;
    }
    assert_eq!(server.state.bus.subscriber_count(server.poll.id), 2);

    for _ in 0..3 {
        server.state.engine.submit_vote(server.poll.id, None, a).await.unwrap();
    }

    for viewer in &mut viewers {
        for votes in 1..=3 {
            assert_eq!(next_frame(viewer).await, (a, votes));
        }
    }
}

#[tokio::test]
async fn closing_viewer_releases_its_channel() {
    let server = LiveServer::start().await;
    let mut viewer = server.watch().await;
    next_frame(&mut viewer).await;
    assert_eq!(server.state.bus.channel_count(), 1);

    viewer.send(Message::Close(None)).await.unwrap();
    drop(viewer);

    server.wait_for_no_channels().await;
}

#[tokio::test]
async fn unknown_poll_is_refused_before_upgrade() {
    let server = LiveServer::start().await;

    for poll_id in [Uuid::new_v4().to_string(), "not-a-uuid".to_string()] {
        match connect_async(server.results_url(&poll_id)).await {
            Err(WsError::Http(response)) => assert_eq!(response.status(), 400),
            Err(e) => panic!("unexpected error for {}: {}", poll_id, e),
            Ok(_) => panic!("upgrade accepted for {}", poll_id),
        }
    }

    server.wait_for_no_channels().await;
}
