use rand::Rng;

use crate::error::AppError;

pub const OTP_MIN: u32 = 1000;
pub const OTP_MAX: u32 = 9999;

/// Issues delivery confirmation codes.
///
/// Codes are four decimal digits, stored and shown to the requester in clear
/// text. They gate a low-stakes hand-over, not access to anything secret.
pub trait OtpIssuer: Send + Sync {
    fn issue(&self) -> String;
}

#[derive(Debug, Default)]
pub struct RandomOtpIssuer;

impl OtpIssuer for RandomOtpIssuer {
    fn issue(&self) -> String {
        rand::thread_rng().gen_range(OTP_MIN..=OTP_MAX).to_string()
    }
}

/// Always hands out the same code. Handy for demos and tests.
#[derive(Debug, Clone)]
pub struct FixedOtpIssuer(pub String);

impl OtpIssuer for FixedOtpIssuer {
    fn issue(&self) -> String {
        self.0.clone()
    }
}

/// Compares as fixed-format strings; only surrounding whitespace is ignored.
pub fn verify(stored: Option<&str>, supplied: Option<&str>) -> Result<(), AppError> {
    let supplied = supplied
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .ok_or(AppError::OtpRequired)?;

    match stored {
        Some(expected) if expected == supplied => Ok(()),
        _ => Err(AppError::OtpMismatch),
    }
}
