// tests/telegram_chunks.rs
//
// Telegram channel against a fake Bot API: chunking, part headers, partial
// failure, and fan-out isolation through the mux.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde_json::Value;

use bulletin_monitor::error::DispatchError;
use bulletin_monitor::notify::chunk::{strip_part_header, CHANNEL_LIMIT};
use bulletin_monitor::notify::{ConsoleNotifier, TelegramNotifier};
use bulletin_monitor::{NotificationMessage, Notifier, NotifierMux};

#[derive(Clone, Default)]
struct Bot {
    received: Arc<Mutex<Vec<Value>>>,
    /// 1-based index of the request that gets a 500.
    fail_on: Option<usize>,
}

async fn send_message(
    State(bot): State<Bot>,
    Path(token): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    assert_eq!(token, "bot123:abc");
    let n = {
        let mut r = bot.received.lock().unwrap();
        r.push(body);
        r.len()
    };
    if bot.fail_on == Some(n) {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

async fn spawn(bot: Bot) -> String {
    let app = Router::new()
        .route("/{token}/sendMessage", post(send_message))
        .with_state(bot);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}")
}

fn notifier(base: &str) -> TelegramNotifier {
    TelegramNotifier::new("123:abc".into(), "42".into())
        .with_api_base(base)
        .with_chunk_delay(Duration::ZERO)
}

fn texts(bot: &Bot) -> Vec<String> {
    bot.received
        .lock()
        .unwrap()
        .iter()
        .map(|v| v["text"].as_str().unwrap_or_default().to_string())
        .collect()
}

fn long_body() -> String {
    (0..90)
        .map(|i| format!("{i:04} {}\n", "x".repeat(94)))
        .collect()
}

#[tokio::test]
async fn short_message_is_sent_once_with_metadata() {
    let bot = Bot::default();
    let base = spawn(bot.clone()).await;

    let msg = NotificationMessage::new("MON: BOC", "sin novedades").with_meta("year", "2026");
    notifier(&base).send(&msg).await.unwrap();

    let received = bot.received.lock().unwrap().clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["chat_id"], "42");
    assert_eq!(
        received[0]["text"],
        "🔔 MON: BOC\n\nsin novedades\n\n📋 Metadata: year: 2026"
    );
}

#[tokio::test]
async fn long_message_is_split_into_numbered_parts() {
    let bot = Bot::default();
    let base = spawn(bot.clone()).await;
    let body = long_body();
    assert_eq!(body.chars().count(), 9000);

    notifier(&base)
        .send(&NotificationMessage::new("MON: BOP", body.clone()))
        .await
        .unwrap();

    let parts = texts(&bot);
    assert_eq!(parts.len(), 3);
    for (i, p) in parts.iter().enumerate() {
        assert!(p.starts_with(&format!("📨 Part {}/3\n\n", i + 1)));
        assert!(p.chars().count() <= CHANNEL_LIMIT);
    }
    let rebuilt: String = parts.iter().map(|p| strip_part_header(p)).collect();
    assert_eq!(rebuilt, format!("🔔 MON: BOP\n\n{body}"));
}

#[tokio::test]
async fn failed_chunk_does_not_stop_the_rest() {
    let bot = Bot {
        fail_on: Some(2),
        ..Bot::default()
    };
    let base = spawn(bot.clone()).await;

    let err = notifier(&base)
        .send(&NotificationMessage::new("MON: BOP", long_body()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DispatchError::Chunks {
            channel: "telegram",
            failed: 1,
            total: 3
        }
    ));
    assert_eq!(texts(&bot).len(), 3);
}

#[tokio::test]
async fn mux_reports_telegram_failure_and_still_delivers_console() {
    let bot = Bot {
        fail_on: Some(1),
        ..Bot::default()
    };
    let base = spawn(bot.clone()).await;
    let mux = NotifierMux::new()
        .with(notifier(&base))
        .with(ConsoleNotifier::new());

    let report = mux.dispatch(&NotificationMessage::new("s", "b")).await;
    assert_eq!(report.delivered, vec!["console"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "telegram");
}
