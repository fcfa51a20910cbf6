use validator::Validate;

use crate::error::Result;

/// Runs `validator` rules and converts failures into a 400.
pub fn validate<T: Validate>(val: &T) -> Result<()> {
    val.validate()?;
    Ok(())
}
