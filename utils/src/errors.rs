use thiserror::Error;

#[derive(Error, Debug)]
pub enum TapircError {
	#[error("syntax error: {0}")]
	SyntaxError(String),
	#[error("system error: {0}")]
	SystemError(String),
	#[error("ill-formed ir: {0}")]
	VerifyError(String),
}

pub type Result<T, E = TapircError> = std::result::Result<T, E>;

pub fn map_sys_err(e: std::io::Error) -> TapircError {
	TapircError::SystemError(e.to_string())
}
