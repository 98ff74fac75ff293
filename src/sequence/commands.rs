//! Transport-facing handlers. Each returns a status code plus a JSON body; the
//! code mapping lives here so the controller stays transport-agnostic.

use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    db::InterpretationRecord,
    sequence::{Admission, IngestError, IngestOutcome, PendingSentence, PipelineController},
    AppState,
};

#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub status: u16,
    pub body: Value,
}

impl IngestResponse {
    fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn controller_from_state(state: &AppState) -> PipelineController {
    state.pipeline.clone()
}

pub async fn receive_data(state: &AppState, payload: &Value) -> IngestResponse {
    match accept_data(state, payload).await {
        DataReply::Now(response) => response,
        DataReply::Later(pending) => complete_sentence(pending).await,
    }
}

/// A frame's reply, or the closed sentence it is still waiting on.
pub enum DataReply {
    Now(IngestResponse),
    Later(PendingSentence),
}

/// Runs only the ordered part of `receive_data`. Frames accepted in call order
/// land in the buffer in that order, whatever happens to `Later` replies.
pub async fn accept_data(state: &AppState, payload: &Value) -> DataReply {
    let controller = controller_from_state(state);
    match controller.admit_value(payload).await {
        Ok(Admission::Ready(outcome)) => DataReply::Now(outcome_response(&outcome)),
        Ok(Admission::Sentence(pending)) => DataReply::Later(pending),
        Err(err) => DataReply::Now(error_response(&err)),
    }
}

pub async fn complete_sentence(pending: PendingSentence) -> IngestResponse {
    match pending.finish().await {
        Ok(outcome) => outcome_response(&outcome),
        Err(err) => error_response(&err),
    }
}

pub fn outcome_response(outcome: &IngestOutcome) -> IngestResponse {
    match outcome {
        IngestOutcome::Accepted {
            reading,
            sequence,
            tokens,
            duplicate,
        } => {
            let message = if *duplicate {
                "Duplicate frame ignored"
            } else {
                "Data received"
            };
            IngestResponse::new(
                200,
                json!({
                    "success": true,
                    "message": message,
                    "sensorData": reading,
                    "sequence": sequence,
                    "tokens": tokens,
                    "isBoundary": false,
                }),
            )
        }
        IngestOutcome::Boundary {
            reading,
            interpretation,
        } => IngestResponse::new(
            200,
            json!({
                "success": true,
                "message": "Sentence complete",
                "sensorData": reading,
                "sentence": interpretation.rendered_sentence,
                "rawTokens": interpretation.raw_tokens,
                "display": interpretation.display_tokens(),
                "isBoundary": true,
            }),
        ),
        IngestOutcome::BoundaryIgnored { reading } => IngestResponse::new(
            200,
            json!({
                "success": true,
                "message": "Nothing to interpret",
                "sensorData": reading,
                "isBoundary": false,
            }),
        ),
    }
}

pub fn error_response(err: &IngestError) -> IngestResponse {
    match err {
        IngestError::InvalidShape(shape) => IngestResponse::new(
            400,
            json!({
                "success": false,
                "message": "Invalid data format",
                "error": shape.to_string(),
            }),
        ),
        IngestError::SequenceTooLong { max, reading } => IngestResponse::new(
            413,
            json!({
                "success": false,
                "message": err.to_string(),
                "sensorData": reading,
                "maxSequenceLen": max,
            }),
        ),
        IngestError::UpstreamUnavailable {
            reason,
            raw_tokens,
            sequence,
        } => IngestResponse::new(
            502,
            json!({
                "success": false,
                "message": "Could not generate a sentence",
                "error": reason,
                "rawTokens": raw_tokens,
                "sequence": sequence,
            }),
        ),
    }
}

pub async fn get_status(state: &AppState) -> Value {
    let controller = controller_from_state(state);
    let snapshot = controller.status().await;
    json!({
        "sensorData": snapshot.sensor_data,
        "status": snapshot.status,
        "sequence": snapshot.sequence,
        "preview": snapshot.preview,
    })
}

pub async fn get_history(state: &AppState, limit: usize) -> Result<Vec<InterpretationRecord>, String> {
    let controller = controller_from_state(state);
    controller.history(limit).await.map_err(|e| e.to_string())
}
