use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use futures_util::stream::{self, Stream};
use tokio::sync::mpsc;
use tracing::info;

use super::types::{
    DeltaPayload, ErrorResponse, FailurePayload, HealthResponse, SimulateRequest,
    TranscriptResponse,
};
use super::AppState;
use crate::core::conversation::{Conversation, TurnEvent};
use crate::core::persona::Persona;
use crate::core::producer::{select_producer, ResponseProducer};
use crate::core::scheduler::Scheduler;

const INDEX_HTML: &str = include_str!("../builtins/index.html");
const EVENT_BUFFER: usize = 32;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn prepare(
    state: &AppState,
    body: &[u8],
) -> Result<(Conversation, Arc<dyn ResponseProducer>), ApiError> {
    let settings = SimulateRequest::from_body(body).resolve(&state.config);
    let producer = select_producer(
        settings.engine,
        state.session.as_ref(),
        &state.client,
        &state.config,
    )
    .map_err(|err| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: err.to_string(),
            }),
        )
    })?;

    info!(
        topic = %settings.topic,
        turns = settings.turns,
        engine = producer.name(),
        deltas = settings.deltas,
        "Starting debate"
    );

    let scheduler = Scheduler::new(state.personas.clone(), settings.topic);
    let conversation = Conversation::new(Arc::clone(&producer), scheduler, settings.turns)
        .with_deltas(settings.deltas);
    Ok((conversation, producer))
}

fn to_sse_event(event: TurnEvent) -> Result<Event, axum::Error> {
    match event {
        TurnEvent::Delta { id, text } => Event::default().event("delta").json_data(DeltaPayload {
            id: &id,
            text: &text,
        }),
        TurnEvent::Message(message) => Event::default().json_data(&message),
        TurnEvent::Error { error, details } => Event::default().json_data(FailurePayload {
            error: &error,
            details: &details,
        }),
        TurnEvent::Done => Ok(Event::default().data("[DONE]")),
    }
}

fn event_stream(
    events: mpsc::Receiver<TurnEvent>,
) -> impl Stream<Item = Result<Event, axum::Error>> {
    stream::unfold(events, |mut events| async move {
        let event = events.recv().await?;
        Some((to_sse_event(event), events))
    })
}

pub async fn simulate(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let (conversation, _) = prepare(&state, &body)?;
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    tokio::spawn(conversation.run(tx));

    Ok((
        [(header::CACHE_CONTROL, "no-cache, no-transform")],
        Sse::new(event_stream(rx)).keep_alive(KeepAlive::default()),
    )
        .into_response())
}

pub async fn transcript(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let (conversation, producer) = prepare(&state, &body)?;
    let topic = conversation.topic().to_string();
    let turns = conversation.turns();
    let outcome = conversation.collect().await;

    Ok(Json(TranscriptResponse {
        topic,
        turns,
        engine: producer.name(),
        outcome,
    }))
}

pub async fn personas(State(state): State<AppState>) -> Json<Vec<Persona>> {
    Json(state.personas.list().to_vec())
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine = select_producer(
        state.config.engine(),
        state.session.as_ref(),
        &state.client,
        &state.config,
    )
    .map(|producer| producer.name())
    .unwrap_or("unconfigured");

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        engine,
    })
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
