//! Bearer credential gate

use crate::domain::result::{Error, Result};
use crate::token::{Maker, Payload};

pub const AUTHORIZATION_TYPE_BEARER: &str = "bearer";

/// Check an authorization header value and return the verified payload
///
/// The header must read `<type> <credential>` with a `bearer` type (any
/// case). The payload's subject is the authenticated identity.
pub fn authorize(maker: &dyn Maker, header: Option<&str>) -> Result<Payload> {
    let header = header.map(str::trim).unwrap_or_default();
    if header.is_empty() {
        return Err(Error::unauthorized("authorization header is not provided"));
    }

    let fields: Vec<&str> = header.split_whitespace().collect();
    if fields.len() < 2 {
        return Err(Error::unauthorized("invalid authorization header format"));
    }

    if !fields[0].eq_ignore_ascii_case(AUTHORIZATION_TYPE_BEARER) {
        return Err(Error::unauthorized(format!(
            "unsupported authorization type {}",
            fields[0]
        )));
    }

    let payload = maker.verify_token(fields[1]).map_err(|e| {
        tracing::debug!(error = %e, "bearer credential rejected");
        e
    })?;
    Ok(payload)
}
