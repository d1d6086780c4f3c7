// Helpers shared by flag parsing and reporting: headers, error chains.

use std::error::Error;
use std::fmt::Write;

/// Split a `Name: value` header flag. The name keeps the case it was given in.
pub fn parse_header(s: &str) -> Option<(String, String)> {
    let (name, value) = s.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

/// Flatten an error and all of its sources into a single line.
pub fn error_chain(mut err: &(dyn Error + 'static)) -> String {
    let mut s = err.to_string();
    while let Some(src) = err.source() {
        let msg = src.to_string();
        // hyper and reqwest often repeat the inner message in the outer one
        if !s.ends_with(&msg) {
            let _ = write!(s, ": {}", msg);
        }
        err = src;
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[test]
    fn header_flags() {
        assert_eq!(
            parse_header("X-Request-Id: abc:123"),
            Some(("X-Request-Id".to_string(), "abc:123".to_string()))
        );
        assert_eq!(
            parse_header("Accept:text/plain"),
            Some(("Accept".to_string(), "text/plain".to_string()))
        );
        assert_eq!(parse_header("no-colon"), None);
        assert_eq!(parse_header(" : value"), None);
    }

    #[derive(Debug)]
    struct Layer(&'static str, Option<Box<Layer>>);

    impl fmt::Display for Layer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl Error for Layer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            self.1.as_deref().map(|e| e as &(dyn Error + 'static))
        }
    }

    #[test]
    fn error_chain_joins_sources() {
        let err = Layer(
            "error sending request",
            Some(Box::new(Layer(
                "client error (Connect)",
                Some(Box::new(Layer("connection refused", None))),
            ))),
        );
        assert_eq!(
            error_chain(&err),
            "error sending request: client error (Connect): connection refused"
        );
    }
}
