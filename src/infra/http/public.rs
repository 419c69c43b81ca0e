use std::sync::Arc;

use axum::{
    Form, Router,
    extract::{State, rejection::FormRejection},
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::{
    application::{
        error::AppError,
        letter::{LetterForm, LetterService},
    },
    domain::date::today_wire_date,
    infra::templates::TemplateStore,
    presentation::views::{IndexTemplate, render_error_response, render_template_response},
};

use super::middleware::{log_responses, set_request_context, track_metrics};

#[derive(Clone)]
pub struct HttpState {
    pub letters: Arc<LetterService>,
    pub templates: Arc<TemplateStore>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/generate", post(generate))
        .route("/_health", get(health))
        .route_layer(middleware::from_fn(track_metrics))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn index() -> Response {
    render_template_response(IndexTemplate::new(today_wire_date()), StatusCode::OK)
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn generate(
    State(state): State<HttpState>,
    form: Result<Form<LetterForm>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            state.letters.record_rejected_form();
            let err = AppError::validation(rejection.body_text());
            return render_error_response(&state.templates, &err).await;
        }
    };

    match state.letters.generate(form).await {
        Ok(pdf) => pdf_response(pdf),
        Err(err) => render_error_response(&state.templates, &err).await,
    }
}

fn pdf_response(pdf: Vec<u8>) -> Response {
    let mut response = (StatusCode::OK, pdf).into_response();
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(
        CONTENT_DISPOSITION,
        HeaderValue::from_static(r#"attachment; filename="letter.pdf""#),
    );
    response
}
