//! Attribute-string configuration parsing
//!
//! Components are configured through host attribute strings:
//!
//! - ratio pairs: `"<bottom> [top]"`, floats in `[0, 1]`, the top value
//!   defaulting to the bottom value (`"0.5"`, `"0.5 0.7"`)
//! - margin pairs: `"<bottom> [top]"` lengths with a `px` or `vh` unit
//!   (`"100px"`, `"100px 20vh"`)
//! - the trigger flag: the only accepted value is `"visibility"`
//!
//! Malformed input is a configuration error, surfaced at component build
//! time and fatal to that component instance only.

use crate::error::ConfigError;
use crate::geometry::{Length, Margins};

/// Attribute value that marks a component as visibility-triggered.
pub const VISIBILITY_TRIGGER: &str = "visibility";

/// A bottom/top threshold pair.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RatioPair {
    pub bottom: f32,
    pub top: f32,
}

impl RatioPair {
    pub const ZERO: RatioPair = RatioPair {
        bottom: 0.0,
        top: 0.0,
    };

    pub const fn splat(ratio: f32) -> Self {
        Self {
            bottom: ratio,
            top: ratio,
        }
    }
}

/// Parse a `"<bottom> [top]"` ratio pair.
pub fn parse_ratio_pair(
    attribute: &'static str,
    input: &str,
) -> Result<RatioPair, ConfigError> {
    let mut parts = input.split_whitespace();
    let bottom = match parts.next() {
        Some(token) => parse_ratio(attribute, input, token)?,
        None => return Err(ConfigError::EmptyAttribute { attribute }),
    };
    let top = match parts.next() {
        Some(token) => parse_ratio(attribute, input, token)?,
        None => bottom,
    };
    if parts.next().is_some() {
        return Err(ConfigError::Malformed {
            attribute,
            value: input.to_string(),
        });
    }
    Ok(RatioPair { bottom, top })
}

fn parse_ratio(attribute: &'static str, input: &str, token: &str) -> Result<f32, ConfigError> {
    let value: f32 = token.parse().map_err(|_| ConfigError::Malformed {
        attribute,
        value: input.to_string(),
    })?;
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::RatioOutOfRange { value });
    }
    Ok(value)
}

/// Parse a `"<bottom> [top]"` margin pair with `px`/`vh` units.
pub fn parse_margin_pair(
    attribute: &'static str,
    input: &str,
) -> Result<Margins, ConfigError> {
    let mut parts = input.split_whitespace();
    let bottom = match parts.next() {
        Some(token) => parse_length(attribute, input, token)?,
        None => return Err(ConfigError::EmptyAttribute { attribute }),
    };
    let top = match parts.next() {
        Some(token) => parse_length(attribute, input, token)?,
        None => Length::Px(0.0),
    };
    if parts.next().is_some() {
        return Err(ConfigError::Malformed {
            attribute,
            value: input.to_string(),
        });
    }
    Ok(Margins { top, bottom })
}

fn parse_length(
    attribute: &'static str,
    input: &str,
    token: &str,
) -> Result<Length, ConfigError> {
    let (number, unit): (&str, fn(f32) -> Length) = if let Some(number) = token.strip_suffix("px")
    {
        (number, Length::Px)
    } else if let Some(number) = token.strip_suffix("vh") {
        (number, Length::Vh)
    } else {
        return Err(ConfigError::UnknownUnit {
            value: token.to_string(),
        });
    };
    let value: f32 = number.parse().map_err(|_| ConfigError::Malformed {
        attribute,
        value: input.to_string(),
    })?;
    Ok(unit(value))
}

/// Parse the trigger attribute. `None` means untriggered; the only
/// supported value is [`VISIBILITY_TRIGGER`].
pub fn parse_trigger(value: Option<&str>) -> Result<bool, ConfigError> {
    match value {
        None => Ok(false),
        Some(VISIBILITY_TRIGGER) => Ok(true),
        Some(other) => Err(ConfigError::UnsupportedTrigger {
            value: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_pair_single_value_splats() {
        let pair = parse_ratio_pair("ratios", "0.5").unwrap();
        assert_eq!(pair, RatioPair::splat(0.5));
    }

    #[test]
    fn test_ratio_pair_bottom_then_top() {
        let pair = parse_ratio_pair("ratios", "0.5 0.7").unwrap();
        assert_eq!(pair.bottom, 0.5);
        assert_eq!(pair.top, 0.7);
    }

    #[test]
    fn test_ratio_pair_rejects_out_of_range() {
        let err = parse_ratio_pair("ratios", "1.5").unwrap_err();
        assert_eq!(err, ConfigError::RatioOutOfRange { value: 1.5 });
    }

    #[test]
    fn test_ratio_pair_rejects_garbage() {
        assert!(matches!(
            parse_ratio_pair("ratios", "half"),
            Err(ConfigError::Malformed { .. })
        ));
        assert!(matches!(
            parse_ratio_pair("ratios", ""),
            Err(ConfigError::EmptyAttribute { .. })
        ));
        assert!(matches!(
            parse_ratio_pair("ratios", "0.1 0.2 0.3"),
            Err(ConfigError::Malformed { .. })
        ));
    }

    #[test]
    fn test_margin_pair_units() {
        let margins = parse_margin_pair("margins", "100px 20vh").unwrap();
        assert_eq!(margins.bottom, Length::Px(100.0));
        assert_eq!(margins.top, Length::Vh(20.0));

        let bottom_only = parse_margin_pair("margins", "40px").unwrap();
        assert_eq!(bottom_only.bottom, Length::Px(40.0));
        assert_eq!(bottom_only.top, Length::Px(0.0));
    }

    #[test]
    fn test_margin_pair_rejects_unknown_unit() {
        assert!(matches!(
            parse_margin_pair("margins", "10em"),
            Err(ConfigError::UnknownUnit { .. })
        ));
    }

    #[test]
    fn test_trigger_flag() {
        assert_eq!(parse_trigger(None), Ok(false));
        assert_eq!(parse_trigger(Some("visibility")), Ok(true));
        assert!(matches!(
            parse_trigger(Some("scroll")),
            Err(ConfigError::UnsupportedTrigger { .. })
        ));
    }
}
