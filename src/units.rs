//! Typed quantities used by the energy system and its costs.
//!
//! Each unit is a thin wrapper around an `f64`. Only the arithmetic the model actually needs is
//! implemented, so mixing up e.g. a capacity and a flow is a compile-time error.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Common behaviour for unit types
pub trait UnitType: Copy + PartialOrd + fmt::Debug {
    /// Create a new value of this unit
    fn new(value: f64) -> Self;

    /// The underlying value
    fn value(&self) -> f64;

    /// Whether the value is finite
    fn is_finite(&self) -> bool {
        self.value().is_finite()
    }
}

macro_rules! define_unit_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub f64);

        impl UnitType for $name {
            fn new(value: f64) -> Self {
                Self(value)
            }

            fn value(&self) -> f64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Add for $name {
            type Output = Self;

            fn add(self, rhs: Self) -> Self {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $name {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $name {
            type Output = Self;

            fn neg(self) -> Self {
                Self(-self.0)
            }
        }

        impl Mul<Dimensionless> for $name {
            type Output = Self;

            fn mul(self, rhs: Dimensionless) -> Self {
                Self(self.0 * rhs.0)
            }
        }

        impl Div for $name {
            type Output = Dimensionless;

            fn div(self, rhs: Self) -> Dimensionless {
                Dimensionless(self.0 / rhs.0)
            }
        }

        impl Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }
    };
}

define_unit_type! {
    /// A value with no units (e.g. an efficiency or a rate)
    Dimensionless
}
define_unit_type! {
    /// Installed capacity of a flow (power) or a storage (energy)
    Capacity
}
define_unit_type! {
    /// Energy carried by a flow in one timestep
    Flow
}
define_unit_type! {
    /// An amount of money
    Money
}
define_unit_type! {
    /// Money per unit of flow (e.g. a fuel price)
    MoneyPerFlow
}
define_unit_type! {
    /// Money per unit of capacity (e.g. a capital cost)
    MoneyPerCapacity
}
define_unit_type! {
    /// A duration in years
    Year
}

impl Dimensionless {
    /// Raise to a power
    pub fn powf(self, n: f64) -> Self {
        Self(self.0.powf(n))
    }
}

impl Mul<Capacity> for MoneyPerCapacity {
    type Output = Money;

    fn mul(self, rhs: Capacity) -> Money {
        Money(self.0 * rhs.0)
    }
}

impl Mul<Flow> for MoneyPerFlow {
    type Output = Money;

    fn mul(self, rhs: Flow) -> Money {
        Money(self.0 * rhs.0)
    }
}
