//! End-to-end relay tests.
//!
//! Drives the real server with a fake telephony client on one side and a
//! scripted fake realtime endpoint on the other, asserting on the wire
//! traffic both ways: audio forwarding, playback marks, and the
//! truncate/clear sequence when the caller interrupts a response.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, accept_async, connect_async};

use callbridge_gateway::config::ServerConfig;
use callbridge_gateway::core::realtime::config::{DEFAULT_REALTIME_MODEL, RealtimeVoice};
use callbridge_gateway::routes;
use callbridge_gateway::state::AppState;

const WAIT: Duration = Duration::from_secs(5);

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Fake realtime endpoint: announces its session on connect, then relays
/// every received frame to the test and sends whatever the test scripts.
async fn spawn_fake_realtime() -> (SocketAddr, mpsc::Sender<Value>, mpsc::Receiver<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Value>(32);
    let (seen_tx, seen_rx) = mpsc::channel::<Value>(64);

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        // The endpoint announces its session before accepting configuration.
        let created = json!({
            "type": "session.created",
            "session": {"id": "sess_test", "model": "gpt-4o-realtime-preview"}
        });
        if ws
            .send(Message::Text(created.to_string().into()))
            .await
            .is_err()
        {
            return;
        }

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(event) => {
                        if ws.send(Message::Text(event.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                frame = ws.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let value: Value = serde_json::from_str(&text).unwrap();
                        if seen_tx.send(value).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                },
            }
        }
    });

    (addr, cmd_tx, seen_rx)
}

/// Boot the gateway on an ephemeral port, pointed at the fake endpoint.
async fn spawn_gateway(realtime_addr: SocketAddr) -> SocketAddr {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        tls: None,
        openai_api_key: Some("test-key".to_string()),
        realtime_url: format!("ws://{realtime_addr}/v1/realtime"),
        realtime_model: DEFAULT_REALTIME_MODEL.to_string(),
        voice: RealtimeVoice::default(),
        instructions: "Test persona".to_string(),
        temperature: 0.8,
    };
    let state = AppState::new(config);
    let app = routes::api::create_api_router()
        .merge(routes::media::create_media_router())
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect_telephony(gateway: SocketAddr) -> WsClient {
    let (ws, _) = connect_async(format!("ws://{gateway}/media-stream"))
        .await
        .expect("media-stream upgrade failed");
    ws
}

async fn send_json(ws: &mut WsClient, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

async fn recv_json(ws: &mut WsClient) -> Value {
    loop {
        let frame = timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for telephony frame")
            .expect("telephony stream ended")
            .expect("telephony socket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Wait for the fake endpoint to observe a client event of the given type,
/// skipping anything else.
async fn expect_seen(seen: &mut mpsc::Receiver<Value>, event_type: &str) -> Value {
    loop {
        let value = timeout(WAIT, seen.recv())
            .await
            .expect("timed out waiting for realtime frame")
            .expect("fake realtime endpoint gone");
        if value["type"] == event_type {
            return value;
        }
    }
}

#[tokio::test]
async fn caller_interrupt_truncates_in_flight_response() {
    let (ai_addr, ai_cmd, mut ai_seen) = spawn_fake_realtime().await;
    let gateway = spawn_gateway(ai_addr).await;
    let mut twilio = connect_telephony(gateway).await;

    // The gateway configures the session once the endpoint announces itself.
    let update = expect_seen(&mut ai_seen, "session.update").await;
    assert_eq!(update["session"]["output_audio_format"], "g711_ulaw");
    assert_eq!(update["session"]["instructions"], "Test persona");

    send_json(
        &mut twilio,
        json!({"event": "start", "start": {"streamSid": "MZ1", "callSid": "CA1"}}),
    )
    .await;
    send_json(
        &mut twilio,
        json!({"event": "media", "media": {"timestamp": "500", "payload": "Zm9v"}}),
    )
    .await;

    // Caller audio passes through base64-untouched.
    let append = expect_seen(&mut ai_seen, "input_audio_buffer.append").await;
    assert_eq!(append["audio"], "Zm9v");

    ai_cmd
        .send(json!({
            "type": "response.audio.delta",
            "response_id": "resp_1",
            "item_id": "item_1",
            "output_index": 0,
            "content_index": 0,
            "delta": "YmFy"
        }))
        .await
        .unwrap();

    // Synthesized audio reaches the caller tagged with the stream SID,
    // followed by a playback mark.
    let media = recv_json(&mut twilio).await;
    assert_eq!(media["event"], "media");
    assert_eq!(media["streamSid"], "MZ1");
    assert_eq!(media["media"]["payload"], "YmFy");

    let mark = recv_json(&mut twilio).await;
    assert_eq!(mark["event"], "mark");
    assert_eq!(mark["mark"]["name"], "responsePart");

    // More caller audio moves the caller clock forward. Waiting for the
    // append guarantees the relay has processed it before the interrupt.
    send_json(
        &mut twilio,
        json!({"event": "media", "media": {"timestamp": "900", "payload": "cXV4"}}),
    )
    .await;
    expect_seen(&mut ai_seen, "input_audio_buffer.append").await;

    ai_cmd
        .send(json!({
            "type": "input_audio_buffer.speech_started",
            "audio_start_ms": 860,
            "item_id": "item_user"
        }))
        .await
        .unwrap();

    // The endpoint is told exactly how much audio was heard: 900 - 500 ms.
    let truncate = expect_seen(&mut ai_seen, "conversation.item.truncate").await;
    assert_eq!(truncate["item_id"], "item_1");
    assert_eq!(truncate["content_index"], 0);
    assert_eq!(truncate["audio_end_ms"], 400);

    // And the caller's queued playback is flushed.
    let clear = recv_json(&mut twilio).await;
    assert_eq!(clear["event"], "clear");
    assert_eq!(clear["streamSid"], "MZ1");

    twilio.close(None).await.unwrap();
}

#[tokio::test]
async fn hangup_closes_realtime_channel() {
    let (ai_addr, _ai_cmd, mut ai_seen) = spawn_fake_realtime().await;
    let gateway = spawn_gateway(ai_addr).await;
    let mut twilio = connect_telephony(gateway).await;

    expect_seen(&mut ai_seen, "session.update").await;

    twilio.close(None).await.unwrap();

    // The session must close the realtime side too; the fake endpoint's
    // relay channel ends once its socket does.
    let drained = timeout(WAIT, async {
        while ai_seen.recv().await.is_some() {}
    })
    .await;
    assert!(drained.is_ok(), "realtime endpoint never saw the hangup");
}

#[tokio::test]
async fn stop_event_tears_down_session() {
    let (ai_addr, _ai_cmd, mut ai_seen) = spawn_fake_realtime().await;
    let gateway = spawn_gateway(ai_addr).await;
    let mut twilio = connect_telephony(gateway).await;

    expect_seen(&mut ai_seen, "session.update").await;

    send_json(
        &mut twilio,
        json!({"event": "start", "start": {"streamSid": "MZ1"}}),
    )
    .await;
    // A stray acknowledgement with nothing outstanding must not kill the call.
    send_json(
        &mut twilio,
        json!({"event": "mark", "mark": {"name": "responsePart"}}),
    )
    .await;
    send_json(&mut twilio, json!({"event": "stop"})).await;

    let closed = timeout(WAIT, async {
        loop {
            match twilio.next().await {
                None | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "gateway never closed the telephony socket");
}

#[tokio::test]
async fn malformed_telephony_frame_does_not_kill_the_call() {
    let (ai_addr, _ai_cmd, mut ai_seen) = spawn_fake_realtime().await;
    let gateway = spawn_gateway(ai_addr).await;
    let mut twilio = connect_telephony(gateway).await;

    expect_seen(&mut ai_seen, "session.update").await;

    send_json(
        &mut twilio,
        json!({"event": "start", "start": {"streamSid": "MZ1"}}),
    )
    .await;
    twilio
        .send(Message::Text("this is not json".to_string().into()))
        .await
        .unwrap();
    send_json(
        &mut twilio,
        json!({"event": "media", "media": {"timestamp": 40, "payload": "b2s="}}),
    )
    .await;

    // The bad frame is dropped; the next media frame still flows through.
    let append = expect_seen(&mut ai_seen, "input_audio_buffer.append").await;
    assert_eq!(append["audio"], "b2s=");

    twilio.close(None).await.unwrap();
}
