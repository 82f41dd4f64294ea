use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use tokio::sync::broadcast::error::RecvError;

use crate::services::events::EngineEvent;
use crate::AppState;

/// `GET /ws`: live feed of engine events as JSON text frames.
pub async fn handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| stream_events(socket, state))
}

/// What the feed loop should do after handling one input.
enum Flow {
    Continue,
    Stop,
}

async fn stream_events(mut socket: WebSocket, state: AppState) {
    let mut events = state.events.subscribe();
    let mut forwarded: u64 = 0;
    tracing::info!("Event feed subscriber connected");

    loop {
        let flow = tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    forwarded += 1;
                    forward(&mut socket, &event).await
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Event feed subscriber fell behind");
                    Flow::Continue
                }
                Err(RecvError::Closed) => Flow::Stop,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Ping(payload))) => reply(&mut socket, Message::Pong(payload)).await,
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => Flow::Stop,
                // The feed is one-way.
                Some(Ok(_)) => Flow::Continue,
            },
        };

        if let Flow::Stop = flow {
            break;
        }
    }

    tracing::info!(forwarded, "Event feed subscriber disconnected");
}

async fn forward(socket: &mut WebSocket, event: &EngineEvent) -> Flow {
    match serde_json::to_string(event) {
        Ok(text) => reply(socket, Message::Text(text)).await,
        Err(e) => {
            tracing::error!(error = %e, "Could not encode engine event");
            Flow::Continue
        }
    }
}

async fn reply(socket: &mut WebSocket, message: Message) -> Flow {
    match socket.send(message).await {
        Ok(()) => Flow::Continue,
        Err(_) => Flow::Stop,
    }
}
