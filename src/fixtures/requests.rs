//! Request Fixtures

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::lines::LineRequest;

/// Named line-item payloads, as the storefront would submit them.
#[derive(Debug, Deserialize)]
pub struct RequestsFixture {
    /// Map of request name -> lines
    pub requests: FxHashMap<String, Vec<LineRequest>>,
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn requests_use_boundary_field_names() -> TestResult {
        let fixture: RequestsFixture = serde_norway::from_str(
            r##"
requests:
  festive:
    - productId: kurta
      quantity: 2
      colorVariant: "#3F51B5"
    - productId: scarf
      quantity: 1
"##,
        )?;

        let lines = fixture.requests.get("festive").ok_or("missing request")?;

        assert_eq!(
            lines.as_slice(),
            &[
                LineRequest::new("kurta", 2).with_variant("#3f51b5"),
                LineRequest::new("scarf", 1),
            ]
        );

        Ok(())
    }

    #[test]
    fn fractional_quantity_is_rejected() {
        let result: Result<RequestsFixture, _> = serde_norway::from_str(
            "requests:\n  bad:\n    - productId: kurta\n      quantity: 1.5\n",
        );

        assert!(result.is_err());
    }
}
