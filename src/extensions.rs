//! Extension-activation handshake.
//!
//! A client advertises which payment-extension version it speaks via the
//! `X-A2A-Extensions` request header; the server echoes back the version it
//! agreed to use on the response, per `spec.md` §4.7.

pub const EXTENSION_V1: &str = "https://github.com/google-a2a/a2a-x402/extensions/payment/v0.1";
pub const EXTENSION_V2: &str = "https://github.com/google-a2a/a2a-x402/extensions/payment/v0.2";

/// Picks which extension URI to echo back. Defaults to v0.2 unless the
/// client named v0.1 explicitly (and did not also name v0.2).
pub fn negotiate(requested: Option<&str>) -> &'static str {
    match requested {
        Some(value) if value.contains(EXTENSION_V1) && !value.contains(EXTENSION_V2) => EXTENSION_V1,
        _ => EXTENSION_V2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_v2_when_nothing_is_requested() {
        assert_eq!(negotiate(None), EXTENSION_V2);
    }

    #[test]
    fn echoes_v1_when_named_explicitly() {
        assert_eq!(negotiate(Some(EXTENSION_V1)), EXTENSION_V1);
    }

    #[test]
    fn prefers_v2_when_both_are_named() {
        let both = format!("{EXTENSION_V1}, {EXTENSION_V2}");
        assert_eq!(negotiate(Some(&both)), EXTENSION_V2);
    }
}
