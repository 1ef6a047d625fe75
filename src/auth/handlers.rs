use axum::{
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Form, Json, Router,
};
use axum_extra::extract::{SignedCookieJar, WithRejection};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginForm, LoginPage, PublicUser, RegisterRequest},
        extractors::CurrentUser,
        services,
    },
    error::{AppError, AppResult},
    sessions::{self, SessionRecord},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout))
}

#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<RegisterRequest>, AppError>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    let user = services::register(state.users.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn login_page(CurrentUser(user): CurrentUser) -> Json<LoginPage> {
    Json(LoginPage {
        view: "login",
        action: "/login",
        fields: ["email", "password"],
        authenticated: user.is_some(),
    })
}

/// Bad credentials or an unreadable form send the browser back to `/login`
/// without a session; anything else that fails is a real error.
#[instrument(skip(state, jar, form))]
pub async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    form: Result<Form<LoginForm>, FormRejection>,
) -> AppResult<(SignedCookieJar, Redirect)> {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            warn!(error = %rejection, "unreadable login form");
            return Ok((jar, Redirect::to("/login")));
        }
    };
    let user = match services::authenticate(state.users.as_ref(), &form.email, &form.password).await
    {
        Ok(user) => user,
        Err(AppError::InvalidCredentials) => return Ok((jar, Redirect::to("/login"))),
        Err(e) => return Err(e),
    };

    if let Some(previous) = sessions::session_id(&jar) {
        state.sessions.destroy(previous).await?;
    }

    let ttl = state.session_ttl();
    let record = SessionRecord::for_user(user.id, ttl);
    state.sessions.save(&record).await?;

    info!(user_id = user.id, "user logged in");
    let cookie = sessions::session_cookie(record.id, ttl, state.config.session.cookie_secure);
    Ok((jar.add(cookie), Redirect::to("/dashboard")))
}

#[instrument(skip(state, jar))]
pub async fn logout(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> AppResult<(SignedCookieJar, Redirect)> {
    if let Some(session_id) = sessions::session_id(&jar) {
        state.sessions.destroy(session_id).await?;
        info!(%session_id, "session destroyed");
    }
    Ok((jar.remove(sessions::removal_cookie()), Redirect::to("/")))
}
