//! JWT e middleware di autenticazione.
//!
//! Due emittenti: il token nativo (claims con `user_id` stringa e
//! `platform_id`) e un issuer esterno opzionale che trasporta un
//! `user_id` numerico più un ruolo, convertito nell'id interno tramite
//! il prefisso di ruolo. I token nativi sono inoltre governati dal
//! token store: qualunque stato diverso da `Normal` invalida la
//! richiesta.

use crate::config::Config;
use crate::core::error::ChatError;
use crate::core::ids::{role_from_str, Actor};
use crate::core::state::AppState;
use crate::hot::tokens::TokenStatus;
use axum::{
    body::Body,
    extract::{Request, State},
    http,
    http::Response,
    middleware::Next,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const ISSUER: &str = "ironrelay";
const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub platform_id: i32,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    /// Nonce per token: due login nello stesso secondo devono comunque
    /// produrre token distinti, o la policy di kick non li distingue.
    #[serde(default)]
    pub jti: String,
}

/// Claims di un sistema esterno: user_id numerico + ruolo opzionale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalClaims {
    pub user_id: i64,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

/// Identità autenticata propagata ai handler tramite Extension.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub platform_id: i32,
    pub token: String,
}

pub fn generate_token(
    user_id: &str,
    platform_id: i32,
    secret: &str,
    expire_hours: i64,
) -> Result<String, ChatError> {
    let now = Utc::now();
    let claims = Claims {
        user_id: user_id.to_string(),
        platform_id,
        exp: (now + Duration::hours(expire_hours)).timestamp(),
        iat: now.timestamp(),
        iss: ISSUER.to_string(),
        jti: uuid::Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ChatError::internal_server().with_details(e.to_string()))
}

pub fn parse_token(token: &str, secret: &str) -> Result<Claims, ChatError> {
    let mut validation = Validation::default();
    validation.set_required_spec_claims(&["exp"]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => ChatError::token_expired(),
        _ => ChatError::token_invalid(),
    })
}

/// Valida il token e pretende che subject e platform coincidano con
/// quelli dichiarati dal client (handshake WebSocket).
pub fn validate_token(
    token: &str,
    secret: &str,
    expected_user_id: &str,
    expected_platform_id: i32,
) -> Result<Claims, ChatError> {
    let claims = parse_token(token, secret)?;
    if claims.user_id != expected_user_id || claims.platform_id != expected_platform_id {
        return Err(ChatError::token_mismatch());
    }
    Ok(claims)
}

/// Converte un token dell'issuer esterno nei claims interni usando la
/// mappatura a prefisso di ruolo.
pub fn parse_external_token(
    token: &str,
    secret: &str,
    default_role: &str,
    default_platform_id: i32,
) -> Result<Claims, ChatError> {
    let mut validation = Validation::default();
    validation.set_required_spec_claims(&["exp"]);

    let data = decode::<ExternalClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => ChatError::token_expired(),
        _ => ChatError::token_invalid(),
    })?;

    let ext = data.claims;
    let role_str = ext.role.as_deref().unwrap_or(default_role);
    let role = role_from_str(role_str).ok_or_else(ChatError::token_invalid)?;
    let actor = Actor { id: ext.user_id, role };

    Ok(Claims {
        user_id: actor.to_im_user_id(),
        platform_id: default_platform_id,
        exp: ext.exp,
        iat: ext.iat,
        iss: ISSUER.to_string(),
        jti: String::new(),
    })
}

/// Prova prima il token nativo, poi l'issuer esterno se abilitato.
/// Il bool indica se il token è nativo (e quindi soggetto al token store).
pub fn parse_token_with_fallback(token: &str, cfg: &Config) -> Result<(Claims, bool), ChatError> {
    match parse_token(token, &cfg.jwt_secret) {
        Ok(claims) => Ok((claims, true)),
        Err(native_err) => {
            if cfg.external_jwt_enabled {
                let claims = parse_external_token(
                    token,
                    &cfg.external_jwt_secret,
                    &cfg.external_jwt_default_role,
                    cfg.external_jwt_default_platform_id,
                )?;
                Ok((claims, false))
            } else {
                Err(native_err)
            }
        }
    }
}

pub async fn authentication_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response<Body>, ChatError> {
    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .ok_or_else(ChatError::token_missing)?;
    let auth_header = auth_header.to_str().map_err(|_| ChatError::token_invalid())?;

    let token = auth_header
        .strip_prefix(BEARER_PREFIX)
        .ok_or_else(ChatError::token_invalid)?;

    let (claims, native) = parse_token_with_fallback(token, &state.config)?;
    let token = token.to_string();

    // I token nativi devono essere ancora Normal nel token store: un
    // login successivo sulla stessa piattaforma li marca Kicked.
    if native {
        match state
            .token_store
            .status(&claims.user_id, claims.platform_id, &token)
        {
            Some(TokenStatus::Normal) => {}
            _ => return Err(ChatError::token_invalid()),
        }
    }

    req.extensions_mut().insert(AuthUser {
        user_id: claims.user_id,
        platform_id: claims.platform_id,
        token: token.to_string(),
    });
    Ok(next.run(req).await)
}
