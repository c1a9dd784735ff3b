use std::fmt;

use serde::Serialize;

#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    ConnectionError = 2,
    TargetError = 3,
    TimeoutError = 4,
    ProtocolError = 5,
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::GeneralError => write!(f, "general error"),
            Self::ConnectionError => write!(f, "connection error"),
            Self::TargetError => write!(f, "target error"),
            Self::TimeoutError => write!(f, "timeout error"),
            Self::ProtocolError => write!(f, "protocol error"),
        }
    }
}

#[derive(Debug)]
pub struct AppError {
    pub message: String,
    pub code: ExitCode,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

impl AppError {
    #[must_use]
    pub fn navigation_failed(error_text: &str) -> Self {
        Self {
            message: format!("Navigation failed: {error_text}"),
            code: ExitCode::GeneralError,
        }
    }

    #[must_use]
    pub fn navigation_timeout(timeout_ms: u64) -> Self {
        Self {
            message: format!(
                "Navigation did not reach network idle within {timeout_ms}ms. \
                 Use --timeout to increase the wait, or relax --idle-time / --max-connections."
            ),
            code: ExitCode::TimeoutError,
        }
    }

    #[must_use]
    pub fn no_page_target() -> Self {
        Self {
            message: "Chrome exposed no debuggable page target.".into(),
            code: ExitCode::TargetError,
        }
    }

    #[must_use]
    pub fn evaluation_failed(detail: &str) -> Self {
        Self {
            message: format!("Failed to read the rendered document: {detail}"),
            code: ExitCode::ProtocolError,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        let output = ErrorOutput {
            error: &self.message,
            code: self.code as u8,
        };
        serde_json::to_string(&output).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"{}","code":{}}}"#,
                self.message, self.code as u8
            )
        })
    }

    pub fn print_json_stderr(&self) {
        eprintln!("{}", self.to_json());
    }
}

#[derive(Serialize)]
struct ErrorOutput<'a> {
    error: &'a str,
    code: u8,
}
