//! formgate demo server
//!
//! A guestbook and an image upload page, each protected by session CSRF and
//! validated through the asynchronous pipeline.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::{Method, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tower_sessions::Session;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use formgate_kernel::captcha::{self, CaptchaVerifier, RecaptchaClient};
use formgate_kernel::csrf::DEFAULT_CONTEXT_NAME;
use formgate_kernel::extract::{read_multipart, read_urlencoded};
use formgate_kernel::markup::{csrf_input, html_escape};
use formgate_kernel::session::{self, SessionData};
use formgate_kernel::validators::{DataRequired, FileAllowed, FileRequired, Length};
use formgate_kernel::{
    AppConfig, AsyncValidator, Field, Form, FormBuilder, HttpRequest, ValidationError,
    ValidationResult, Validator,
};

/// Longest guestbook entry, in characters.
const MAX_ENTRY_LEN: usize = 140;

/// Shared demo state.
#[derive(Clone)]
struct DemoState {
    config: Arc<AppConfig>,
    entries: Arc<RwLock<Vec<String>>>,
    uploads: Arc<RwLock<Vec<String>>>,
    captcha: Option<Arc<dyn CaptchaVerifier>>,
}

/// Handler error: logged, answered with a 500.
struct DemoError(anyhow::Error);

impl IntoResponse for DemoError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for DemoError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let config = AppConfig::from_env();
    if !config.contains("SECRET_KEY") && !config.contains("WTF_CSRF_SECRET_KEY") {
        warn!("no SECRET_KEY configured; CSRF protected forms will fail");
    }
    let captcha: Option<Arc<dyn CaptchaVerifier>> = config
        .contains("RECAPTCHA_PUBLIC_KEY")
        .then(|| Arc::new(RecaptchaClient::new()) as Arc<dyn CaptchaVerifier>);
    info!(captcha = captcha.is_some(), "configuration loaded");

    let port: u16 = std::env::var("PORT")
        .ok()
        .map(|port| port.parse().context("PORT must be a port number"))
        .transpose()?
        .unwrap_or(8000);

    let state = DemoState {
        config: Arc::new(config),
        entries: Arc::default(),
        uploads: Arc::default(),
        captcha,
    };

    let app = Router::new()
        .route("/", get(guestbook).post(guestbook))
        .route("/upload", get(upload).post(upload))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(session::create_session_layer(false)),
        )
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,formgate_kernel=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build the request snapshot a form binds to.
fn form_request(state: &DemoState, method: &Method, context: &SessionData) -> HttpRequest {
    let context_name = state
        .config
        .get_str("WTF_CSRF_CONTEXT_NAME", DEFAULT_CONTEXT_NAME)
        .to_string();
    HttpRequest::new(method.as_str(), state.config.clone())
        .with_context(context_name, context.clone())
}

/// Rejects a message that is already in the guestbook.
struct NotARepeat {
    entries: Arc<RwLock<Vec<String>>>,
}

#[async_trait]
impl AsyncValidator for NotARepeat {
    async fn validate(&self, _form: &Form, field: &Field) -> ValidationResult {
        let text = field.data().as_text().unwrap_or_default().trim();
        if self.entries.read().await.iter().any(|entry| entry == text) {
            return Err(ValidationError::invalid("Somebody already said that."));
        }
        Ok(())
    }
}

fn guestbook_form(state: &DemoState) -> FormBuilder {
    let not_a_repeat = Validator::asynchronous(NotARepeat {
        entries: state.entries.clone(),
    });

    let mut builder = Form::builder("guestbook")
        .field(
            Field::string("msg")
                .label("Message")
                .validator(DataRequired::new())
                .validator(Length::max(MAX_ENTRY_LEN))
                .validator(not_a_repeat),
        )
        .asynchronous();
    if let Some(verifier) = &state.captcha {
        builder = builder.field(captcha::recaptcha_field("captcha", verifier.clone()));
    }
    builder
}

async fn guestbook(
    State(state): State<DemoState>,
    session: Session,
    method: Method,
    body: Bytes,
) -> Result<Response, DemoError> {
    let context = session::load_session(&session).await?;
    let request = form_request(&state, &method, &context).with_form(read_urlencoded(&body));
    let mut form = guestbook_form(&state).bind(Arc::new(request))?;

    if form.validate_on_submit_async().await? {
        let text = form
            .field("msg")
            .and_then(|field| field.data().as_text())
            .unwrap_or_default()
            .trim()
            .to_string();
        info!(build_id = %form.build_id(), "guestbook entry added");
        state.entries.write().await.push(text);
        session::store_session(&context, &session).await?;
        return Ok(Redirect::to("/").into_response());
    }

    let entries = state
        .entries
        .read()
        .await
        .iter()
        .map(|entry| format!("<li>{}</li>", html_escape(entry)))
        .collect::<String>();
    let captcha_widget = if state.captcha.is_some() {
        captcha::render_recaptcha(&state.config)
    } else {
        String::new()
    };
    let body = format!(
        "<h1>Guestbook</h1><ul>{entries}</ul>\
         <form method=\"post\">{csrf}\
         <label>Message <input name=\"msg\" maxlength=\"{MAX_ENTRY_LEN}\"></label>{errors}\
         {captcha_widget}<button>Sign</button></form>\
         <p><a href=\"/upload\">Upload an image</a></p>",
        csrf = csrf_input(&form),
        errors = field_errors(&form),
    );

    // The token just rendered must survive until the next submission.
    session::store_session(&context, &session).await?;
    Ok(page("Guestbook", &body).into_response())
}

fn upload_form() -> FormBuilder {
    Form::builder("upload")
        .field(
            Field::file("image")
                .validator(FileRequired::new())
                .validator(FileAllowed::new(["png", "jpg", "jpeg", "gif"])),
        )
        .asynchronous()
}

async fn upload(
    State(state): State<DemoState>,
    session: Session,
    method: Method,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, DemoError> {
    let context = session::load_session(&session).await?;
    let mut request = form_request(&state, &method, &context);
    // A GET carries no multipart body.
    if let Ok(multipart) = multipart {
        let (form, files) = read_multipart(multipart).await?;
        request = request.with_form(form).with_files(files);
    }
    let mut form = upload_form().bind(Arc::new(request))?;

    let uploaded = if form.validate_on_submit_async().await? {
        form.field("image")
            .and_then(|field| field.data().as_file())
            .map(|file| {
                info!(filename = %file.name, size = file.body.len(), "image accepted");
                format!("{} ({} bytes)", file.name, file.body.len())
            })
    } else {
        None
    };
    if let Some(entry) = uploaded {
        state.uploads.write().await.push(entry);
    }

    let uploads = state
        .uploads
        .read()
        .await
        .iter()
        .map(|entry| format!("<li>{}</li>", html_escape(entry)))
        .collect::<String>();
    let body = format!(
        "<h1>Upload</h1><ul>{uploads}</ul>\
         <form method=\"post\" enctype=\"multipart/form-data\">{csrf}\
         <input type=\"file\" name=\"image\">{errors}<button>Upload</button></form>\
         <p><a href=\"/\">Guestbook</a></p>",
        csrf = csrf_input(&form),
        errors = field_errors(&form),
    );

    session::store_session(&context, &session).await?;
    Ok(page("Upload", &body).into_response())
}

/// Every field error of the last validation pass as a list.
fn field_errors(form: &Form) -> String {
    let Some(errors) = form.errors().filter(|errors| !errors.is_empty()) else {
        return String::new();
    };
    let items: String = errors
        .iter()
        .flat_map(|(field, messages)| {
            messages.iter().map(move |message| {
                format!("<li>{}: {}</li>", html_escape(field), html_escape(message))
            })
        })
        .collect();
    format!("<ul class=\"errors\">{items}</ul>")
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{}</title></head><body>{body}</body></html>",
        html_escape(title)
    ))
}
