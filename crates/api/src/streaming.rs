//! Live-update WebSocket channel.

#![allow(missing_docs)]

use async_trait::async_trait;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use qa_common::AppResult;
use qa_core::{AnswerDto, EventPublisher, QuestionDto, Suggestion};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::middleware::AppState;

const CHANNEL_CAPACITY: usize = 1000;

/// Events fanned out to every connected client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    QuestionCreated { data: QuestionDto },
    AnswerCreated { data: AnswerCreatedEvent },
    QuestionAnswered { data: QuestionRef },
    SuggestionCreated { data: SuggestionCreatedEvent },
    /// A client frame re-broadcast on request.
    Broadcast { data: Value, sender: String },
    Disconnect { message: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerCreatedEvent {
    pub question_id: String,
    pub answer: AnswerDto,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRef {
    pub question_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionCreatedEvent {
    pub question_id: String,
    pub suggestion: Suggestion,
}

/// Messages sent to a single client only.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connection { message: String, status: String },
    Echo { original: Value, message: String },
}

/// Shared state for the live channel.
#[derive(Clone)]
pub struct StreamingState {
    tx: Arc<broadcast::Sender<StreamEvent>>,
}

impl StreamingState {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx: Arc::new(tx) }
    }

    /// Fan an event out to all connected clients.
    ///
    /// Having no connected clients is not an error.
    pub fn publish(&self, event: StreamEvent) {
        match self.tx.send(event) {
            Ok(receivers) => debug!(receivers, "Live event published"),
            Err(_) => debug!("No live clients connected"),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for StreamingState {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for StreamingState {
    async fn publish_question_created(&self, question: &QuestionDto) -> AppResult<()> {
        self.publish(StreamEvent::QuestionCreated {
            data: question.clone(),
        });
        Ok(())
    }

    async fn publish_answer_created(&self, question_id: &str, answer: &AnswerDto) -> AppResult<()> {
        self.publish(StreamEvent::AnswerCreated {
            data: AnswerCreatedEvent {
                question_id: question_id.to_string(),
                answer: answer.clone(),
            },
        });
        Ok(())
    }

    async fn publish_question_answered(&self, question_id: &str) -> AppResult<()> {
        self.publish(StreamEvent::QuestionAnswered {
            data: QuestionRef {
                question_id: question_id.to_string(),
            },
        });
        Ok(())
    }

    async fn publish_suggestion_created(
        &self,
        question_id: &str,
        suggestion: &Suggestion,
    ) -> AppResult<()> {
        self.publish(StreamEvent::SuggestionCreated {
            data: SuggestionCreatedEvent {
                question_id: question_id.to_string(),
                suggestion: suggestion.clone(),
            },
        });
        Ok(())
    }
}

/// `GET /ws`
pub async fn streaming_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.streaming))
}

/// Parse an inbound text frame. Non-JSON frames are wrapped as a plain message.
fn parse_client_frame(text: &str) -> Value {
    serde_json::from_str(text)
        .unwrap_or_else(|_| serde_json::json!({ "type": "message", "content": text }))
}

fn wants_broadcast(frame: &Value) -> bool {
    frame.get("broadcast").and_then(Value::as_bool).unwrap_or(false)
}

fn encode<T: Serialize>(msg: &T) -> Option<Message> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            error!(error = %e, "Failed to encode live message");
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, streaming: StreamingState) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = streaming.subscribe();
    info!(connections = streaming.connection_count(), "WebSocket connected");

    let welcome = ServerMessage::Connection {
        message: "Connected to WebSocket".to_string(),
        status: "connected".to_string(),
    };
    if let Some(msg) = encode(&welcome)
        && sender.send(msg).await.is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let frame = parse_client_frame(text.as_str());
                        let broadcast = wants_broadcast(&frame);

                        let echo = ServerMessage::Echo {
                            original: frame.clone(),
                            message: "Message received".to_string(),
                        };
                        if let Some(msg) = encode(&echo)
                            && sender.send(msg).await.is_err()
                        {
                            break;
                        }

                        if broadcast {
                            streaming.publish(StreamEvent::Broadcast {
                                data: frame,
                                sender: "server".to_string(),
                            });
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        if let Some(msg) = encode(&event)
                            && sender.send(msg).await.is_err()
                        {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Live client lagging, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    drop(rx);
    streaming.publish(StreamEvent::Disconnect {
        message: "A client disconnected".to_string(),
    });
    info!(connections = streaming.connection_count(), "WebSocket disconnected");
}
