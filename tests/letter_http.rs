use std::{
    fs,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{
        Method, Request, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
};
use http_body_util::BodyExt;
use letter_generator::{
    application::{
        letter::LetterService,
        observer::{FailureStage, LetterObserver},
        render::{CompilerError, LetterRenderer, RenderError},
    },
    domain::letter::LetterContent,
    infra::{
        http::{HttpState, build_router},
        templates::TemplateStore,
    },
};
use tempfile::TempDir;
use tower::ServiceExt;

const FAKE_PDF: &[u8] = b"%PDF-1.5\n%fake\n";

#[derive(Default)]
struct FakeRenderer {
    calls: AtomicUsize,
    last: Mutex<Option<LetterContent>>,
    fail: bool,
}

#[async_trait]
impl LetterRenderer for FakeRenderer {
    async fn render(&self, letter: &LetterContent) -> Result<Vec<u8>, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().expect("lock") = Some(letter.clone());
        if self.fail {
            return Err(RenderError::Compiler(CompilerError::Failed {
                pass: 1,
                exit_code: Some(1),
                stdout: "! LaTeX Error: File `secret.sty' not found.".into(),
                stderr: "secret-stderr".into(),
            }));
        }
        Ok(FAKE_PDF.to_vec())
    }
}

#[derive(Default)]
struct CountingObserver {
    failures: Mutex<Vec<&'static str>>,
}

impl LetterObserver for CountingObserver {
    fn letter_requested(&self) {}

    fn letter_generated(&self, _artifact_bytes: usize, _elapsed: Duration) {}

    fn letter_failed(&self, stage: FailureStage) {
        self.failures.lock().expect("lock").push(stage.as_str());
    }
}

struct TestApp {
    router: Router,
    renderer: Arc<FakeRenderer>,
    observer: Arc<CountingObserver>,
}

fn app_with_templates(templates_dir: PathBuf) -> TestApp {
    build_app(templates_dir, FakeRenderer::default())
}

fn build_app(templates_dir: PathBuf, renderer: FakeRenderer) -> TestApp {
    let renderer = Arc::new(renderer);
    let observer = Arc::new(CountingObserver::default());
    let state = HttpState {
        letters: Arc::new(LetterService::new(renderer.clone(), observer.clone())),
        templates: Arc::new(TemplateStore::new(templates_dir)),
    };
    TestApp {
        router: build_router(state),
        renderer,
        observer,
    }
}

fn app() -> TestApp {
    app_with_templates(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("templates"))
}

fn form_request(body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/generate")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

#[tokio::test]
async fn generate_returns_pdf_attachment() {
    let app = app();
    let response = app
        .router
        .clone()
        .oneshot(form_request(
            "subject=K%C3%BCndigung+%7Bsofort%7D&recipient=Hausverwaltung&date=2024-12-25\
             &content=50%25+Rabatt&closing=Mit+freundlichen+Gr%C3%BC%C3%9Fen&signature_space=on",
        ))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/octet-stream");
    assert_eq!(
        response.headers()[CONTENT_DISPOSITION],
        r#"attachment; filename="letter.pdf""#
    );
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    assert_eq!(bytes.as_ref(), FAKE_PDF);

    assert_eq!(app.renderer.calls.load(Ordering::SeqCst), 1);
    let letter = app
        .renderer
        .last
        .lock()
        .expect("lock")
        .clone()
        .expect("letter rendered");
    assert_eq!(letter.date, "25. Dezember 2024");
    assert_eq!(letter.subject, "Kündigung  sofort ");
    assert_eq!(letter.content, "50  Rabatt");
    assert!(letter.signature_space);
}

#[tokio::test]
async fn missing_date_is_rejected_without_compiling() {
    let app = app();
    let response = app
        .router
        .clone()
        .oneshot(form_request("subject=Hallo&content=Text"))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_string(response).await;
    assert!(body.contains("date"), "{body}");
    assert_eq!(app.renderer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(*app.observer.failures.lock().expect("lock"), vec!["validation"]);
}

#[tokio::test]
async fn compiler_failure_shows_generic_error_page() {
    let app = build_app(
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("templates"),
        FakeRenderer {
            fail: true,
            ..Default::default()
        },
    );
    let response = app
        .router
        .clone()
        .oneshot(form_request("date=2024-01-01&subject=Hallo"))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get(CONTENT_DISPOSITION).is_none());
    let body = body_string(response).await;
    assert!(body.contains("The letter could not be generated."), "{body}");
    assert!(!body.contains("secret-stderr"), "{body}");
    assert!(!body.contains("secret.sty"), "{body}");
    assert_eq!(app.renderer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(*app.observer.failures.lock().expect("lock"), vec!["compile"]);
}

#[tokio::test]
async fn malformed_date_is_rejected_without_compiling() {
    let app = app();
    let response = app
        .router
        .clone()
        .oneshot(form_request("date=25.12.2024"))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_string(response).await;
    assert!(body.contains("25.12.2024"), "{body}");
    assert_eq!(app.renderer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn undecodable_form_is_a_bad_request() {
    let app = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/generate")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"date":"2024-01-01"}"#))
        .expect("request should build");

    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.renderer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(*app.observer.failures.lock().expect("lock"), vec!["validation"]);
}

#[tokio::test]
async fn error_page_escapes_user_input() {
    let app = app();
    let response = app
        .router
        .clone()
        .oneshot(form_request("date=%3Cscript%3E"))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let content_type = response.headers()[CONTENT_TYPE]
        .to_str()
        .expect("ascii header")
        .to_string();
    assert!(content_type.starts_with("text/html"), "{content_type}");
    let body = body_string(response).await;
    assert!(body.contains("&lt;script&gt;"), "{body}");
    assert!(!body.contains("<script>"), "{body}");
}

#[tokio::test]
async fn missing_error_template_falls_back_to_plain_text() {
    let empty = TempDir::new().expect("temp dir");
    let app = app_with_templates(empty.path().to_path_buf());

    let response = app
        .router
        .clone()
        .oneshot(form_request("subject=ohne+Datum"))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
    let body = body_string(response).await;
    let (template_error, message) = body.split_once('\n').expect("two-line fallback");
    assert!(template_error.contains("error.html"), "{template_error}");
    assert!(message.contains("date"), "{message}");
}

#[tokio::test]
async fn malformed_error_template_falls_back_to_plain_text() {
    let dir = TempDir::new().expect("temp dir");
    fs::write(dir.path().join("error.html.tera"), "{% if %}").expect("write template");
    let app = app_with_templates(dir.path().to_path_buf());

    let response = app
        .router
        .clone()
        .oneshot(form_request("date=nope"))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_string(response).await;
    assert!(body.starts_with("failed to parse template `error.html`"), "{body}");
}

#[tokio::test]
async fn index_serves_the_form() {
    let app = app();
    let request = Request::builder()
        .uri("/")
        .body(Body::empty())
        .expect("request should build");
    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    for field in [
        "subject",
        "recipient",
        "recipient_street",
        "recipient_postal_code",
        "recipient_city",
        "sender",
        "sender_street",
        "sender_postal_code",
        "sender_city",
        "date",
        "opening",
        "closing",
        "content",
        "signature_space",
    ] {
        assert!(body.contains(&format!("name=\"{field}\"")), "missing {field}");
    }
}

#[tokio::test]
async fn health_returns_no_content() {
    let app = app();
    let request = Request::builder()
        .uri("/_health")
        .body(Body::empty())
        .expect("request should build");
    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
