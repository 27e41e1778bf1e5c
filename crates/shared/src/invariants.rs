//! Bounded numeric wrappers for values validated once at the edge.

use std::fmt;

/// A value fell outside its inclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundsError<T> {
    /// Rejected value.
    pub value: T,
    /// Inclusive minimum.
    pub min: T,
    /// Inclusive maximum.
    pub max: T,
}

impl<T: fmt::Display> fmt::Display for BoundsError<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "value {} is outside [{}, {}]",
            self.value, self.min, self.max
        )
    }
}

impl<T: fmt::Debug + fmt::Display> std::error::Error for BoundsError<T> {}

macro_rules! bounded_int {
    ($name:ident, $int:ty) => {
        #[doc = concat!("`", stringify!($int), "` constrained to `[MIN, MAX]`.")]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name<const MIN: $int, const MAX: $int>($int);

        impl<const MIN: $int, const MAX: $int> $name<MIN, MAX> {
            /// Returns `None` when `value` is out of range.
            #[must_use]
            pub const fn new(value: $int) -> Option<Self> {
                if value < MIN || value > MAX {
                    None
                } else {
                    Some(Self(value))
                }
            }

            /// Like [`Self::new`] but reports the violated bounds.
            pub const fn try_new(value: $int) -> Result<Self, BoundsError<$int>> {
                match Self::new(value) {
                    Some(bounded) => Ok(bounded),
                    None => Err(BoundsError {
                        value,
                        min: MIN,
                        max: MAX,
                    }),
                }
            }

            /// Raw value.
            #[must_use]
            pub const fn get(self) -> $int {
                self.0
            }
        }
    };
}

bounded_int!(BoundedU32, u32);
bounded_int!(BoundedU64, u64);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn bounds_are_inclusive() {
        assert_eq!(BoundedU32::<1, 4>::new(1).map(BoundedU32::get), Some(1));
        assert_eq!(BoundedU32::<1, 4>::new(4).map(BoundedU32::get), Some(4));
        assert!(BoundedU32::<1, 4>::new(0).is_none());
        assert_eq!(
            BoundedU64::<10, 20>::try_new(21),
            Err(BoundsError {
                value: 21,
                min: 10,
                max: 20
            })
        );
    }

    proptest! {
        #[test]
        fn accepted_values_round_trip(value in 100u64..=1_000) {
            let bounded = BoundedU64::<100, 1_000>::try_new(value);
            prop_assert_eq!(bounded.map(BoundedU64::get), Ok(value));
        }
    }
}
