//! Macro for implementing Display and FromStr for label enums
//!
//! Operation names, season types and host names all round-trip through
//! strings (config files, environment variables, query parameters). This
//! macro gives them one consistent conversion.
//!
//! # Example
//!
//! ```rust
//! use statline_domain::impl_domain_enum_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Division {
//!     Fbs,
//!     Fcs,
//! }
//!
//! impl_domain_enum_conversions!(Division {
//!     Fbs => "fbs",
//!     Fcs => "fcs",
//! });
//!
//! assert_eq!(Division::Fbs.to_string(), "fbs");
//! assert_eq!("FCS".parse::<Division>().unwrap(), Division::Fcs);
//! ```

/// Implements Display and FromStr traits for label enums
///
/// This macro generates:
/// - Display trait: writes the variant's label
/// - FromStr trait: parses case-insensitive labels to enum variants
///
/// Labels must be lowercase for parsing to match.
#[macro_export]
macro_rules! impl_domain_enum_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
