use actix_web::{Error, HttpMessage, dev::ServiceRequest, web::Data};
use actix_web_httpauth::extractors::{
    AuthenticationError,
    bearer::{BearerAuth, Config},
};
use constant_time_eq::constant_time_eq_n;
use secrecy::ExposeSecret;

use crate::config::{ApiKey, ApiKeyConversionError, UserConfig};

/// Identity of the caller, resolved from its bearer key and stored in the request
/// extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub name: String,
}

/// Decoded API keys of the configured users.
#[derive(Clone)]
pub struct ApiUsers {
    users: Vec<(String, ApiKey)>,
}

impl ApiUsers {
    pub fn from_config(users: &[UserConfig]) -> Result<ApiUsers, ApiKeyConversionError> {
        let users = users
            .iter()
            .map(|user| {
                let key = ApiKey::try_from(user.api_key.expose_secret())?;
                Ok((user.name.clone(), key))
            })
            .collect::<Result<_, ApiKeyConversionError>>()?;

        Ok(ApiUsers { users })
    }

    /// Returns the user owning `token`. Every configured key is compared so the time
    /// taken does not depend on which one matches.
    fn find(&self, token: &ApiKey) -> Option<&str> {
        self.users.iter().fold(None, |found, (name, key)| {
            let matches = constant_time_eq_n(&key.key, &token.key);
            found.or(matches.then_some(name.as_str()))
        })
    }
}

pub async fn auth_validator(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    let config = req
        .app_data::<Config>()
        .cloned()
        .unwrap_or_default()
        .scope("v1");

    let token: ApiKey = match credentials.token().try_into() {
        Ok(token) => token,
        Err(_) => {
            return Err((AuthenticationError::from(config).into(), req));
        }
    };

    let user = req
        .app_data::<Data<ApiUsers>>()
        .and_then(|users| users.find(&token))
        .map(str::to_string);

    let Some(name) = user else {
        return Err((AuthenticationError::from(config).into(), req));
    };

    req.extensions_mut().insert(AuthenticatedUser { name });

    Ok(req)
}
