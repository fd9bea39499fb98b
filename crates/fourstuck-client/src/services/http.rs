//! Puzzle REST collaborator over `gloo::net`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use fourstuck_core::api::{
    ErrorBody, SubmitAnswerRequest, SubmitAnswerResponse, current_puzzle_url, submit_answer_url,
};
use fourstuck_core::{ApiError, PlayerId, PuzzleInstance};
use futures::future::{AbortHandle, Abortable};
use gloo::net::http::{Request, Response};
use serde_json::Value;

pub type Completion<T> = Box<dyn FnOnce(Result<T, ApiError>)>;

/// The two puzzle endpoints the session needs. Results are delivered to the
/// completion callback, never synchronously.
pub trait PuzzleApi {
    fn current_puzzle(&self, user_id: PlayerId, done: Completion<Option<PuzzleInstance>>);
    fn submit_answer(&self, request: SubmitAnswerRequest, done: Completion<SubmitAnswerResponse>);
}

/// Maps an error response body to an [`ApiError`].
pub fn classify(status: u16, body: &str) -> ApiError {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.detail_text())
        .unwrap_or_else(|_| body.trim().to_string());
    ApiError::from_status(status, detail)
}

fn decode_puzzle(value: Value) -> Result<Option<PuzzleInstance>, ApiError> {
    if value.is_null() {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| ApiError::Decode(e.to_string()))
}

async fn error_from(response: Response) -> ApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify(status, &body)
}

async fn get_current(url: String) -> Result<Option<PuzzleInstance>, ApiError> {
    tracing::debug!(%url, "GET current puzzle");
    let response = Request::get(&url)
        .send()
        .await
        .map_err(|e| ApiError::Transport(e.to_string()))?;
    if !response.ok() {
        return Err(error_from(response).await);
    }
    let value: Value = response
        .json()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))?;
    decode_puzzle(value)
}

async fn post_answer(
    url: String,
    request: SubmitAnswerRequest,
) -> Result<SubmitAnswerResponse, ApiError> {
    tracing::debug!(%url, puzzle_id = request.puzzle_id, "POST answer");
    let response = Request::post(&url)
        .json(&request)
        .map_err(|e| ApiError::Transport(e.to_string()))?
        .send()
        .await
        .map_err(|e| ApiError::Transport(e.to_string()))?;
    if !response.ok() {
        return Err(error_from(response).await);
    }
    response
        .json()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

/// In-flight requests are aborted when the client is dropped.
pub struct HttpPuzzleApi {
    api_base: String,
    next_id: Cell<u64>,
    in_flight: Rc<RefCell<HashMap<u64, AbortHandle>>>,
}

impl HttpPuzzleApi {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            next_id: Cell::new(0),
            in_flight: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    fn spawn<T, F>(&self, request: F, done: Completion<T>)
    where
        T: 'static,
        F: Future<Output = Result<T, ApiError>> + 'static,
    {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        let (handle, registration) = AbortHandle::new_pair();
        self.in_flight.borrow_mut().insert(id, handle);

        let in_flight = Rc::clone(&self.in_flight);
        wasm_bindgen_futures::spawn_local(async move {
            let outcome = Abortable::new(request, registration).await;
            in_flight.borrow_mut().remove(&id);
            match outcome {
                Ok(result) => done(result),
                Err(_) => tracing::debug!("request aborted"),
            }
        });
    }
}

impl PuzzleApi for HttpPuzzleApi {
    fn current_puzzle(&self, user_id: PlayerId, done: Completion<Option<PuzzleInstance>>) {
        self.spawn(get_current(current_puzzle_url(&self.api_base, user_id)), done);
    }

    fn submit_answer(&self, request: SubmitAnswerRequest, done: Completion<SubmitAnswerResponse>) {
        self.spawn(post_answer(submit_answer_url(&self.api_base), request), done);
    }
}

impl Drop for HttpPuzzleApi {
    fn drop(&mut self) {
        for (_, handle) in self.in_flight.borrow_mut().drain() {
            handle.abort();
        }
    }
}
