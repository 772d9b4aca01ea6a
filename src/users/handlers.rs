use axum::{
    extract::{FromRef, Path, State},
    response::Html,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    response::{ApiError, StatusBody},
    state::AppState,
    users::{
        dto::{
            LoginRequest, ProfileResponse, RegisterRequest, RegisterResponse, TokenResponse,
            UpdateProfileRequest, UpdatedProfileResponse,
        },
        jwt::{AuthUser, JwtKeys},
        repo::{self, User},
        services::{generate_verification_token, hash_password, verify_password},
        validate::{self, Errors},
    },
};

const EMAIL_VERIFIED_HTML: &str = "<h1>Email verified successfully</h1>";
const NOT_FOUND_HTML: &str = "<!DOCTYPE html>\n<html>\n<head><title>404 Not Found</title></head>\n<body><h1>404</h1><p>The page you are looking for could not be found.</p></body>\n</html>";

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/profile", get(profile).put(update_profile))
        .route("/refresh", post(refresh))
}

pub fn verification_routes() -> Router<AppState> {
    Router::new()
        .route("/send-verify-mail/:email", get(send_verify_mail))
        .route("/verify-mail/:token", get(verify_mail))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let mut errors = Errors::default();

    if let Some(name) = validate::required(&mut errors, "name", &payload.name) {
        validate::min_len(&mut errors, "name", name, 2);
        validate::max_len(&mut errors, "name", name, 255);
    }

    if let Some(email) = validate::required(&mut errors, "email", &payload.email) {
        validate::email_format(&mut errors, "email", email);
        validate::max_len(&mut errors, "email", email, 255);
        // Ensure email is not taken
        if let Ok(Some(_)) = User::find_by_email(&state.db, email).await {
            warn!(%email, "email already registered");
            errors.add("email", "The email has already been taken.");
        }
    }

    if let Some(password) = validate::required(&mut errors, "password", &payload.password) {
        validate::min_len(&mut errors, "password", password, 6);
        validate::confirmed(&mut errors, "password", password, &payload.password_confirmation);
    }

    if !errors.is_empty() {
        return Err(ApiError::Invalid(errors.into_inner()));
    }

    // The rules above guarantee every field is present from here on.
    let name = payload.name.as_deref().unwrap_or_default();
    let email = payload.email.as_deref().unwrap_or_default();
    let password = payload.password.as_deref().unwrap_or_default();

    let hash = hash_password(password).map_err(|e| {
        error!(error = %e, "hash_password failed");
        ApiError::Failure(e.to_string())
    })?;

    let user = User::create(&state.db, name, email, &hash).await.map_err(|e| {
        error!(error = %e, "create user failed");
        ApiError::Failure(e.to_string())
    })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(Json(RegisterResponse {
        message: "User inserted successfully!".into(),
        user,
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let mut errors = Errors::default();

    if let Some(email) = validate::required(&mut errors, "email", &payload.email) {
        validate::email_format(&mut errors, "email", email);
        validate::max_len(&mut errors, "email", email, 255);
    }
    if let Some(password) = validate::required(&mut errors, "password", &payload.password) {
        validate::min_len(&mut errors, "password", password, 6);
    }
    if !errors.is_empty() {
        return Err(ApiError::Invalid(errors.into_inner()));
    }

    let email = payload.email.as_deref().unwrap_or_default();
    let password = payload.password.as_deref().unwrap_or_default();

    let user = match User::find_by_email(&state.db, email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(%email, "login unknown email");
            return Err(ApiError::failure("Email or password incorrect!"));
        }
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err(ApiError::Failure(e.to_string()));
        }
    };

    let ok = verify_password(password, &user.password).map_err(|e| {
        error!(error = %e, "verify_password failed");
        ApiError::Failure(e.to_string())
    })?;

    if !ok {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(ApiError::failure("Email or password incorrect!"));
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign(user.id).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        ApiError::Failure(e.to_string())
    })?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(TokenResponse::bearer(
        access_token,
        keys.access_ttl.as_secs(),
    )))
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<StatusBody>, ApiError> {
    repo::revoke_token(&state.db, auth.jti, auth.expires_at).await?;
    info!(user_id = %auth.user_id, "user logged out");
    Ok(Json(StatusBody {
        success: true,
        message: "User logged out!".into(),
    }))
}

#[instrument(skip(state))]
pub async fn profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| {
            error!(user_id = %auth.user_id, "authenticated user row missing");
            ApiError::failure("User not found!")
        })?;

    Ok(Json(ProfileResponse {
        success: true,
        data: user,
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UpdatedProfileResponse>, ApiError> {
    let mut errors = Errors::default();

    let id = validate::required(&mut errors, "id", &payload.id);
    if let Some(name) = validate::required(&mut errors, "name", &payload.name) {
        validate::max_len(&mut errors, "name", name, 255);
    }
    if let Some(email) = validate::required(&mut errors, "email", &payload.email) {
        validate::email_format(&mut errors, "email", email);
        validate::max_len(&mut errors, "email", email, 255);
        // No uniqueness re-check here, unlike registration; the unique
        // index is the only guard.
    }
    if !errors.is_empty() {
        return Err(ApiError::Invalid(errors.into_inner()));
    }

    // The target id comes from the body as-is and is not tied to the
    // authenticated caller.
    let id: Uuid = match id.unwrap_or_default().parse() {
        Ok(id) => id,
        Err(_) => {
            warn!(user_id = %auth.user_id, "profile update with unparseable id");
            return Err(ApiError::failure("User not found!"));
        }
    };

    let name = payload.name.as_deref().unwrap_or_default();
    let email = payload.email.as_deref().unwrap_or_default();

    let user = User::update_profile(&state.db, id, name, email)
        .await?
        .ok_or_else(|| {
            warn!(%id, "profile update for unknown user");
            ApiError::failure("User not found!")
        })?;

    info!(user_id = %user.id, caller = %auth.user_id, "profile updated");
    Ok(Json(UpdatedProfileResponse {
        success: true,
        message: "Updated user successfully!".into(),
        data: user,
    }))
}

#[instrument(skip(state))]
pub async fn send_verify_mail(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(email): Path<String>,
) -> Result<Json<StatusBody>, ApiError> {
    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| {
            warn!(%email, "verification mail requested for unknown email");
            ApiError::failure("User not found!")
        })?;

    let token = generate_verification_token();
    let url = format!("{}/verify-mail/{}", state.config.app_url, token);

    state
        .mailer
        .send_mail(&email, "Email verification!", &verification_mail_body(&url))
        .await
        .map_err(|e| {
            error!(error = %e, %email, "verification mail send failed");
            ApiError::Failure(e.to_string())
        })?;

    User::set_remember_token(&state.db, user.id, &token).await?;

    info!(user_id = %user.id, caller = %auth.user_id, "verification mail sent");
    Ok(Json(StatusBody {
        success: true,
        message: "Mail sent successfully.".into(),
    }))
}

fn verification_mail_body(url: &str) -> String {
    format!(
        "<p>Please click here to below to verify your email.</p>\
         <p><a href=\"{url}\">Verify email</a></p>"
    )
}

/// Reached from the emailed link, so no authentication. Replies with HTML
/// rather than JSON, which existing clients expect.
#[instrument(skip(state))]
pub async fn verify_mail(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Html<&'static str> {
    let user = match User::find_by_remember_token(&state.db, &token).await {
        Ok(Some(user)) => user,
        Ok(None) => return Html(NOT_FOUND_HTML),
        Err(e) => {
            error!(error = %e, "remember_token lookup failed");
            return Html(NOT_FOUND_HTML);
        }
    };

    if let Err(e) = User::mark_email_verified(&state.db, user.id).await {
        error!(error = %e, user_id = %user.id, "mark_email_verified failed");
        return Html(NOT_FOUND_HTML);
    }

    info!(user_id = %user.id, "email verified");
    Html(EMAIL_VERIFIED_HTML)
}

#[instrument(skip(state))]
pub async fn refresh(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<TokenResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);

    // The presented token stops working once the new one is issued.
    repo::revoke_token(&state.db, auth.jti, auth.expires_at).await?;

    let access_token = keys.sign(auth.user_id).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        ApiError::Failure(e.to_string())
    })?;

    info!(user_id = %auth.user_id, "token refreshed");
    Ok(Json(TokenResponse::bearer(
        access_token,
        keys.access_ttl.as_secs(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mail_body_embeds_the_verification_url() {
        let url = "http://localhost:8080/verify-mail/abc123";
        let body = verification_mail_body(url);
        assert!(body.contains(url));
        assert!(body.contains("verify your email"));
    }

    #[test]
    fn verified_fragment_matches_contract() {
        assert_eq!(EMAIL_VERIFIED_HTML, "<h1>Email verified successfully</h1>");
    }
}
