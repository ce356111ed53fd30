use alloy::primitives::U256;
use fastnum::{
    bint,
    decimal::{Context, RoundingMode, UnsignedDecimal},
};

use crate::error::DexError;

/// Raw token amount to decimal converter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Converter {
    decimals: i32,
}

impl Converter {
    pub fn new(decimals: u8) -> Self {
        Self {
            decimals: decimals as i32,
        }
    }

    pub fn decimals(&self) -> u8 {
        self.decimals as u8
    }

    /// Converts raw on-chain amount into human units.
    ///
    /// Fails if the raw amount does not fit into the target decimal width.
    pub fn from_raw<const N: usize>(&self, value: U256) -> Result<UnsignedDecimal<N>, DexError> {
        let unscaled = bint::UInt::<N>::from_le_slice(value.as_le_slice())
            .ok_or_else(|| DexError::Fatal(format!("amount out of range: {value}")))?;
        Ok(UnsignedDecimal::<N>::from_parts(
            unscaled,
            -self.decimals,
            Context::default().with_rounding_mode(RoundingMode::Floor),
        ))
    }

    /// Converts human units back into raw on-chain amount.
    pub fn to_raw<const N: usize>(&self, value: UnsignedDecimal<N>) -> U256 {
        let rescaled = value.rescale(self.decimals as i16);
        U256::from_le_slice(rescaled.digits().to_radix_le(256).as_slice())
    }
}

#[cfg(test)]
mod tests {
    use fastnum::{UD128, udec128};

    use super::*;

    #[test]
    fn test_numeric_converter_from_raw() {
        assert_eq!(
            Converter::new(0).from_raw::<2>(U256::from(1234567890)).unwrap(),
            udec128!(1234567890)
        );
        assert_eq!(
            Converter::new(6).from_raw::<2>(U256::from(1234567890)).unwrap(),
            udec128!(1234.56789)
        );
        assert_eq!(
            Converter::new(18)
                .from_raw::<2>(U256::from(1_500_000_000_000_000_000u128))
                .unwrap(),
            udec128!(1.5)
        );
    }

    #[test]
    fn test_numeric_converter_from_raw_out_of_range() {
        assert!(Converter::new(18).from_raw::<1>(U256::MAX).is_err());
    }

    #[test]
    fn test_numeric_converter_to_raw() {
        assert_eq!(
            Converter::new(0).to_raw(udec128!(1234567890)),
            U256::from(1234567890)
        );
        assert_eq!(
            Converter::new(6).to_raw(udec128!(1234.56789)),
            U256::from(1234567890)
        );
        assert_eq!(
            Converter::new(18).to_raw(udec128!(0.5)),
            U256::from(500_000_000_000_000_000u128)
        );
        assert_eq!(Converter::new(6).to_raw(UD128::ZERO), U256::ZERO);
    }
}
