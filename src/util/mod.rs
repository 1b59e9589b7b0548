//! Small helpers shared by the command layer.
//!
//! - **URL validation** for `addfeed`, refusing non-HTTP schemes and local hosts
//! - **Terminal-safe text**: control/escape stripping and width-aware truncation
//! - **Interval parsing** for `agg <interval>`
//!
//! ```
//! use gator::util::{parse_interval, strip_control_chars, validate_url};
//!
//! let url = validate_url("https://example.com/feed.xml").unwrap();
//! let every = parse_interval("30s").unwrap();
//! let title = strip_control_chars("\x1b[31mBreaking\x1b[0m");
//! assert_eq!(title, "Breaking");
//! ```

mod interval;
mod text;
mod url_validator;

pub use interval::{parse_interval, IntervalError};
pub use text::{strip_control_chars, truncate_to_width};
pub use url_validator::{validate_url, UrlValidationError};
