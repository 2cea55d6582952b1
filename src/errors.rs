#[macro_export]
macro_rules! invalid_data {
    ($($arg:tt)*) => {{
        let res = std::fmt::format(std::format_args!($($arg)*));
        std::io::Error::new(std::io::ErrorKind::InvalidData, res)
    }}
}

#[macro_export]
macro_rules! invalid_data_e {
    ($($arg:tt)*) => { Err(invalid_data!($($arg)*)) };
}

#[macro_export]
macro_rules! invalid_data_ae {
    ($($arg:tt)*) => { Err($crate::errors::ApiError::InvalidData(invalid_data!($($arg)*))) };
}

use std::fmt;
use std::io;
use std::result::Result;

#[derive(Debug)]
pub enum ApiError {
    UnsupportedOperator(String),
    UnsupportedAggregation(String),
    /// A filter value that can't be coerced to the column type; carries the parse error text.
    MalformedValue(String),
    InvalidData(io::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedOperator(op) => write!(f, "unsupported operator: {}", op),
            Self::UnsupportedAggregation(agg) => {
                write!(f, "aggregation of type {} is not yet implemented", agg)
            }
            Self::MalformedValue(msg) => write!(f, "{}", msg),
            Self::InvalidData(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ApiError {}

impl std::convert::From<io::Error> for ApiError {
    fn from(e: io::Error) -> Self {
        Self::InvalidData(e)
    }
}

impl std::convert::From<json::Error> for ApiError {
    fn from(e: json::Error) -> Self {
        Self::InvalidData(invalid_data!("{}", e))
    }
}

impl std::convert::From<std::num::ParseFloatError> for ApiError {
    fn from(e: std::num::ParseFloatError) -> Self {
        Self::MalformedValue(e.to_string())
    }
}

impl std::convert::From<std::fmt::Error> for ApiError {
    fn from(e: std::fmt::Error) -> Self {
        Self::InvalidData(invalid_data!("{}", e))
    }
}

#[test]
fn test_error_messages() {
    assert_eq!(
        ApiError::UnsupportedOperator("LIKE".to_owned()).to_string(),
        "unsupported operator: LIKE"
    );
    assert_eq!(
        ApiError::UnsupportedAggregation("MODE".to_owned()).to_string(),
        "aggregation of type MODE is not yet implemented"
    );
    let parse_err = "x".parse::<f64>().unwrap_err();
    assert_eq!(ApiError::from(parse_err).to_string(), "invalid float literal");
}
