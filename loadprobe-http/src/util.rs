pub(super) fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
}

/// Only `http` and `https` are accepted.
pub(super) fn parse_target(raw: &str) -> Result<url::Url, super::Error> {
    let parsed = url::Url::parse(raw).map_err(|_| super::Error::InvalidUrl(raw.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(super::Error::UnsupportedScheme(raw.to_string())),
    }
}
