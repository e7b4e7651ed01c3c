use jsonwebtoken::{decode, DecodingKey, Validation};

use crate::config::AuthConfig;
use crate::error::AppError;

use super::Claims;

pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
    operator_roles: Vec<String>,
}

impl JwtValidator {
    /// Build a validator, or `None` when no secret is configured (open mode).
    pub fn from_config(config: &AuthConfig) -> Option<Self> {
        let secret = config.jwt_secret.as_deref().filter(|s| !s.is_empty())?;
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());

        let mut validation = Validation::default();

        if let Some(ref issuer) = config.issuer {
            validation.set_issuer(&[issuer]);
        }

        if let Some(ref audience) = config.audience {
            validation.set_audience(&[audience]);
        }

        Some(Self {
            decoding_key,
            validation,
            operator_roles: config.operator_roles.clone(),
        })
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AppError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }

    /// Validate a token and require one of the operator roles.
    pub fn authorize_operator(&self, token: &str) -> Result<Claims, AppError> {
        let claims = self.validate(token)?;
        if claims.has_any_role(&self.operator_roles) {
            Ok(claims)
        } else {
            Err(AppError::Forbidden(format!(
                "User {} may not operate queues",
                claims.user_id()
            )))
        }
    }
}
