//! Result type alias for SafeData

use super::errors::SafeDataError;

/// Result type alias for SafeData operations
///
/// # Examples
///
/// ```
/// use safedata::domain::result::Result;
/// use safedata::domain::errors::SafeDataError;
///
/// fn failing_function() -> Result<()> {
///     Err(SafeDataError::Configuration("k must be >= 2".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, SafeDataError>;
