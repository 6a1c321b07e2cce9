use crate::error::ShapeViolation;

/// Constraint checks a record must pass after it has been deserialized.
///
/// Deserialization already enforces required fields and types; this covers
/// what serde cannot: list lengths, numeric ranges, non-empty text.
pub trait Validate {
    fn validate(&self) -> Result<(), ShapeViolation>;
}

pub(crate) fn check_unit_range(field: &str, value: f32) -> Result<(), ShapeViolation> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ShapeViolation::new(field, format!("{value} is outside [0.0, 1.0]")))
    }
}

pub(crate) fn check_len<T>(field: &str, items: &[T], min: usize, max: usize) -> Result<(), ShapeViolation> {
    if items.len() < min || items.len() > max {
        return Err(ShapeViolation::new(
            field,
            format!("expected {min}..={max} items, got {}", items.len()),
        ));
    }
    Ok(())
}

pub(crate) fn check_non_empty(field: &str, text: &str) -> Result<(), ShapeViolation> {
    if text.trim().is_empty() {
        Err(ShapeViolation::new(field, "must not be empty"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_range_rejects_nan_and_out_of_bounds() {
        assert!(check_unit_range("c", 0.0).is_ok());
        assert!(check_unit_range("c", 1.0).is_ok());
        assert!(check_unit_range("c", 1.01).is_err());
        assert!(check_unit_range("c", -0.1).is_err());
        assert!(check_unit_range("c", f32::NAN).is_err());
    }

    #[test]
    fn len_bounds_are_inclusive() {
        assert!(check_len("xs", &[1, 2, 3], 1, 3).is_ok());
        assert!(check_len::<u8>("xs", &[], 1, 3).is_err());
        let err = check_len("xs", &[1, 2, 3, 4], 1, 3).unwrap_err();
        assert_eq!(err.field, "xs");
    }
}
