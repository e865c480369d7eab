use crate::error::BalError;

pub const VARIANT_VALUE_BITS: u32 = 61;
pub const MAX_VARIANT_ALTERNATIVES: usize = 8;
const VALUE_MASK: u64 = (1 << VARIANT_VALUE_BITS) - 1;

/// A sum type over several ID kinds that can share one ordered key field.
///
/// `ALTERNATIVES` must count every declared alternative, including ones not
/// currently constructed, so that [`decompose_max`] bounds all of them.
pub trait KeyVariant {
    const ALTERNATIVES: usize;

    /// Declaration index of the active alternative.
    fn ordinal(&self) -> usize;

    fn value(&self) -> u64;
}

fn check_alternatives<V: KeyVariant>() -> Result<(), BalError> {
    if V::ALTERNATIVES == 0 {
        return Err(BalError::Schema(
            "variant should contain at least one alternative".into(),
        ));
    }
    if V::ALTERNATIVES > MAX_VARIANT_ALTERNATIVES {
        return Err(BalError::Schema(format!(
            "variant has {} alternatives; at most {MAX_VARIANT_ALTERNATIVES} can be decomposed",
            V::ALTERNATIVES
        )));
    }
    Ok(())
}

/// Packs the active alternative as `ordinal << 61 | value`.
pub fn decompose<V: KeyVariant>(variant: &V) -> Result<u64, BalError> {
    check_alternatives::<V>()?;
    let ordinal = variant.ordinal();
    if ordinal >= V::ALTERNATIVES {
        return Err(BalError::Schema(format!(
            "variant ordinal {ordinal} is outside its {} declared alternatives",
            V::ALTERNATIVES
        )));
    }
    let value = variant.value();
    if value > VALUE_MASK {
        return Err(BalError::Schema(format!(
            "variant value {value} is too large to be decomposed"
        )));
    }
    Ok(((ordinal as u64) << VARIANT_VALUE_BITS) | value)
}

/// Smallest packed value of `V`; a range bound, never a stored key.
pub fn decompose_min<V: KeyVariant>() -> Result<u64, BalError> {
    check_alternatives::<V>()?;
    Ok(0)
}

/// Greatest packed value of `V`; a range bound, never a stored key. Its value
/// moves whenever alternatives are appended to `V`.
pub fn decompose_max<V: KeyVariant>() -> Result<u64, BalError> {
    check_alternatives::<V>()?;
    Ok((((V::ALTERNATIVES - 1) as u64) << VARIANT_VALUE_BITS) | VALUE_MASK)
}

/// Splits a packed value into `(ordinal, value)`.
pub fn recompose(packed: u64) -> (usize, u64) {
    ((packed >> VARIANT_VALUE_BITS) as usize, packed & VALUE_MASK)
}
