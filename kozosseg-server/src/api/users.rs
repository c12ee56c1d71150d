use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use kozosseg_types::{
    ContentType, FileUpload, ForgotPasswordRequest, LoginRequest, LoginResponse, PersonalDetails,
    RegisterRequest, ResetPasswordRequest, User,
};

use super::{get_user_from_headers, ApiError, ApiResult, SESSION_HEADER};
use crate::db::repositories::{PersonalRepository, UserRepository};
use crate::mail::{activation_mail, verification_code_mail};
use crate::password::MIN_PASSWORD_LEN;
use crate::state::AppState;
use crate::storage::{decode_base64, Bucket};

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Failed to compile email regex")
});

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct AvatarResponse {
    pub file_name: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

/// POST /users/register - Create an account and mail its activation link
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<Json<User>> {
    let email = payload.email.trim();
    if !EMAIL_REGEX.is_match(email) {
        return Err(ApiError::BadRequest("Invalid email address".to_string()));
    }
    validate_password(&payload.password)?;
    if payload.first_name.trim().is_empty() || payload.last_name.trim().is_empty() {
        return Err(ApiError::BadRequest("First and last name are required".to_string()));
    }

    let repo = UserRepository::new(state.db.pool.clone());
    if repo
        .email_exists(email)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
    {
        return Err(ApiError::BadRequest("Email is already registered".to_string()));
    }

    let password_hash = state.hasher.hash_blocking(payload.password.clone()).await?;
    let (user, guid) = repo
        .create(&payload, &password_hash)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    tracing::info!("Registered user {}", user.id);

    if let Err(e) = state
        .mailer
        .send(activation_mail(&user.email, &state.public_url, &guid))
        .await
    {
        tracing::error!("Failed to send activation mail to user {}: {}", user.id, e);
    }

    Ok(Json(user))
}

/// GET /users/activate/:guid - Activate the account behind an activation link
pub async fn activate(
    State(state): State<AppState>,
    Path(guid): Path<String>,
) -> ApiResult<Json<User>> {
    let repo = UserRepository::new(state.db.pool.clone());
    let user = repo
        .get_by_guid(&guid)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Unknown activation link".to_string()))?;

    repo.activate(&guid)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    tracing::info!("Activated user {}", user.id);

    Ok(Json(User {
        is_activated: true,
        ..user
    }))
}

/// POST /auth/login - Login with email and password
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let repo = UserRepository::new(state.db.pool.clone());
    let hasher = state.hasher;
    let LoginRequest { email, password } = payload;

    // bcrypt verification is CPU-bound
    let user = tokio::task::spawn_blocking(move || {
        repo.find_by_credentials(Some(email.as_str()), Some(password.as_str()), &hasher)
    })
    .await
    .map_err(|e| ApiError::InternalError(e.to_string()))?
    .map_err(|e| ApiError::InternalError(e.to_string()))?
    .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".to_string()))?;

    if !user.is_activated {
        return Err(ApiError::Forbidden("Account is not activated".to_string()));
    }

    let session_token = state
        .session_manager
        .create_session(user.id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    let repo = UserRepository::new(state.db.pool.clone());
    repo.touch_last_online(user.id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    let personal = PersonalRepository::new(state.db.pool.clone())
        .get(user.id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    Ok(Json(LoginResponse {
        user,
        personal,
        session_token,
    }))
}

/// POST /auth/logout - End the current session
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<MessageResponse>> {
    let token = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing session token".to_string()))?;

    state
        .session_manager
        .delete_session(token)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    Ok(MessageResponse::new("Logged out successfully"))
}

/// GET /users/me - Profile, account and settings of the caller
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<PersonalDetails>> {
    let user_id = get_user_from_headers(&state, &headers)?;
    let repo = UserRepository::new(state.db.pool.clone());
    let details = repo
        .get_personal_with_settings_and_user(user_id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;
    Ok(Json(details))
}

/// GET /users/:id - Public account summary
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<User>> {
    let repo = UserRepository::new(state.db.pool.clone());
    let user = repo
        .get_by_id(id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(user))
}

/// POST /users/password/forgot - Mail a verification code for a password reset
///
/// Answers the same way for unknown addresses.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let repo = UserRepository::new(state.db.pool.clone());
    let found = repo
        .get_by_email(&payload.email, false)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    if let Some((user, _)) = found {
        let code = state.verification_codes.issue(&user.email);
        state
            .mailer
            .send(verification_code_mail(&user.email, &code))
            .await
            .map_err(|e| ApiError::InternalError(format!("Failed to send verification code: {}", e)))?;
        tracing::info!("Verification code issued for user {}", user.id);
    }

    Ok(MessageResponse::new("If the address is registered, a code is on its way"))
}

/// POST /users/password/reset - Set a new password with a verification code
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    validate_password(&payload.new_password)?;

    if !state
        .verification_codes
        .verify_and_consume(&payload.email, &payload.code)
    {
        return Err(ApiError::BadRequest("Invalid or expired verification code".to_string()));
    }

    let repo = UserRepository::new(state.db.pool.clone());
    let (user, _) = repo
        .get_by_email(&payload.email, false)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .ok_or_else(|| ApiError::BadRequest("Invalid or expired verification code".to_string()))?;

    let password_hash = state.hasher.hash_blocking(payload.new_password).await?;
    repo.update_password(user.id, &password_hash)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    tracing::info!("Password reset for user {}", user.id);

    Ok(MessageResponse::new("Password updated"))
}

/// PUT /users/me/avatar - Upload a new profile picture
pub async fn upload_avatar(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(upload): Json<FileUpload>,
) -> ApiResult<Json<AvatarResponse>> {
    let user_id = get_user_from_headers(&state, &headers)?;

    if ContentType::from_mime(&upload.content_type) != Some(ContentType::Image) {
        return Err(ApiError::BadRequest("Avatar must be an image".to_string()));
    }
    let data = decode_base64(&upload.data).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let file_name = state
        .storage
        .store(Bucket::Avatars, &upload.file_name, &data)
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let updated = PersonalRepository::new(state.db.pool.clone())
        .update_avatar(user_id, &file_name)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    if !updated {
        return Err(ApiError::NotFound("Profile not found".to_string()));
    }

    Ok(Json(AvatarResponse { file_name }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{auth_headers, seeded_state};
    use crate::mail::RecordingMailSender;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn register_request(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            first_name: "Próba".to_string(),
            last_name: "Béla".to_string(),
            is_male: true,
            date_of_birth: NaiveDate::from_ymd_opt(1995, 5, 17),
            place_of_residence: Some("Pécs".to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_activate_login_flow() {
        let (_dir, mut state) = seeded_state();
        let mailer = RecordingMailSender::new();
        state.mailer = Arc::new(mailer.clone());

        let Json(user) = register(
            State(state.clone()),
            Json(register_request("proba.bela@kozosseg.hu", "Jelszo123")),
        )
        .await
        .unwrap();
        assert!(!user.is_activated);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        let guid = sent[0].body.rsplit('/').next().unwrap().trim().to_string();

        // not activated yet
        let result = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "proba.bela@kozosseg.hu".to_string(),
                password: "Jelszo123".to_string(),
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Forbidden(_))));

        let Json(activated) = activate(State(state.clone()), Path(guid)).await.unwrap();
        assert!(activated.is_activated);

        let Json(response) = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "proba.bela@kozosseg.hu".to_string(),
                password: "Jelszo123".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.user.id, user.id);
        assert_eq!(response.personal.unwrap().first_name, "Próba");
        assert_eq!(
            state.session_manager.validate_session(&response.session_token).unwrap(),
            Some(user.id)
        );
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (_dir, state) = seeded_state();

        let bad_email = register(State(state.clone()), Json(register_request("nem-email", "Jelszo123"))).await;
        assert!(matches!(bad_email, Err(ApiError::BadRequest(_))));

        let short = register(State(state.clone()), Json(register_request("a@b.hu", "rovid"))).await;
        assert!(matches!(short, Err(ApiError::BadRequest(_))));

        let duplicate = register(
            State(state.clone()),
            Json(register_request("teszt.elek@kozosseg.hu", "Jelszo123")),
        )
        .await;
        assert!(matches!(duplicate, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_login_with_wrong_password_is_unauthorized() {
        let (_dir, state) = seeded_state();
        let result = login(
            State(state),
            Json(LoginRequest {
                email: "teszt.elek@kozosseg.hu".to_string(),
                password: "rossz-jelszo".to_string(),
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_activate_unknown_guid() {
        let (_dir, state) = seeded_state();
        let result = activate(State(state), Path("nincs-ilyen".to_string())).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let (_dir, mut state) = seeded_state();
        let mailer = RecordingMailSender::new();
        state.mailer = Arc::new(mailer.clone());

        forgot_password(
            State(state.clone()),
            Json(ForgotPasswordRequest { email: "teszt.elek@kozosseg.hu".to_string() }),
        )
        .await
        .unwrap();
        let code: String = mailer.sent()[0].body.chars().filter(|c| c.is_ascii_digit()).take(6).collect();

        let wrong = reset_password(
            State(state.clone()),
            Json(ResetPasswordRequest {
                email: "teszt.elek@kozosseg.hu".to_string(),
                code: "000000x".to_string(),
                new_password: "UjJelszo123".to_string(),
            }),
        )
        .await;
        assert!(matches!(wrong, Err(ApiError::BadRequest(_))));

        reset_password(
            State(state.clone()),
            Json(ResetPasswordRequest {
                email: "teszt.elek@kozosseg.hu".to_string(),
                code,
                new_password: "UjJelszo123".to_string(),
            }),
        )
        .await
        .unwrap();

        let Json(response) = login(
            State(state),
            Json(LoginRequest {
                email: "teszt.elek@kozosseg.hu".to_string(),
                password: "UjJelszo123".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.user.id, 2);
    }

    #[tokio::test]
    async fn test_reset_code_refused_after_repeated_wrong_guesses() {
        let (_dir, mut state) = seeded_state();
        let mailer = RecordingMailSender::new();
        state.mailer = Arc::new(mailer.clone());

        forgot_password(
            State(state.clone()),
            Json(ForgotPasswordRequest { email: "teszt.elek@kozosseg.hu".to_string() }),
        )
        .await
        .unwrap();
        let code: String = mailer.sent()[0].body.chars().filter(|c| c.is_ascii_digit()).take(6).collect();
        let reset = |code: String| ResetPasswordRequest {
            email: "teszt.elek@kozosseg.hu".to_string(),
            code,
            new_password: "UjJelszo123".to_string(),
        };

        for _ in 0..crate::verification::MAX_ATTEMPTS {
            let wrong = reset_password(State(state.clone()), Json(reset("rossz".to_string()))).await;
            assert!(matches!(wrong, Err(ApiError::BadRequest(_))));
        }
        let too_late = reset_password(State(state), Json(reset(code))).await;
        assert!(matches!(too_late, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email_still_ok() {
        let (_dir, mut state) = seeded_state();
        let mailer = RecordingMailSender::new();
        state.mailer = Arc::new(mailer.clone());

        let result = forgot_password(
            State(state),
            Json(ForgotPasswordRequest { email: "senki@kozosseg.hu".to_string() }),
        )
        .await;
        assert!(result.is_ok());
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_me_and_get_user() {
        let (_dir, state) = seeded_state();
        let headers = auth_headers(&state, 1);

        let Json(details) = me(State(state.clone()), headers).await.unwrap();
        assert_eq!(details.personal.full_name(), "Gipsz Jakab");
        assert_eq!(details.user.email, "gipsz.jakab@kozosseg.hu");

        let Json(user) = get_user(State(state.clone()), Path(4)).await.unwrap();
        assert_eq!(user.email, "albatrosz.aladin@kozosseg.hu");
        assert!(matches!(get_user(State(state), Path(404)).await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let (_dir, state) = seeded_state();
        let headers = auth_headers(&state, 2);
        logout(State(state.clone()), headers.clone()).await.unwrap();
        assert!(matches!(me(State(state), headers).await, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_upload_avatar() {
        let (dir, state) = seeded_state();
        let headers = auth_headers(&state, 3);

        let Json(response) = upload_avatar(
            State(state.clone()),
            headers.clone(),
            Json(FileUpload {
                file_name: "arckep.png".to_string(),
                content_type: "image/png".to_string(),
                data: "aGVsbG8=".to_string(),
            }),
        )
        .await
        .unwrap();
        assert!(response.file_name.ends_with("-arckep.png"));
        assert!(dir.path().join("avatars").join(&response.file_name).exists());

        let personal = PersonalRepository::new(state.db.pool.clone()).get(3).unwrap().unwrap();
        assert_eq!(personal.avatar, Some(response.file_name));

        let not_image = upload_avatar(
            State(state),
            headers,
            Json(FileUpload {
                file_name: "cv.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                data: "aGVsbG8=".to_string(),
            }),
        )
        .await;
        assert!(matches!(not_image, Err(ApiError::BadRequest(_))));
    }
}
