use axum::http::{HeaderName, HeaderValue};
use axum_test::TestRequest;
use axum_test::multipart::MultipartForm;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use serde_json::Value;

/// Body of a harness request.
#[derive(Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(MultipartForm),
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<MultipartForm> for RequestBody {
    fn from(form: MultipartForm) -> Self {
        RequestBody::Multipart(form)
    }
}

impl RequestBody {
    pub(crate) fn apply(self, request: TestRequest) -> TestRequest {
        match self {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(&value),
            RequestBody::Multipart(form) => request.multipart(form),
        }
    }
}

/// Extra headers and query parameters for a single request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
}

impl RequestOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn queries<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(key, value)| (key.into(), value.into())));
        self
    }

    /// # Errors
    ///
    /// Returns an error if a header name or value is not valid HTTP.
    pub(crate) fn apply(self, mut request: TestRequest) -> Result<TestRequest> {
        for (name, value) in parse_headers(self.headers)? {
            request = request.add_header(name, value);
        }
        for (key, value) in self.query {
            request = request.add_query_param(&key, value);
        }
        Ok(request)
    }
}

/// # Errors
///
/// Returns an error naming the first invalid header.
pub fn parse_headers<I, K, V>(headers: I) -> Result<Vec<(HeaderName, HeaderValue)>>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    headers
        .into_iter()
        .map(|(name, value)| {
            let (name, value) = (name.as_ref(), value.as_ref());
            let header_name =
                HeaderName::try_from(name).wrap_err_with(|| format!("Invalid header name {name:?}"))?;
            let header_value =
                HeaderValue::try_from(value).wrap_err_with(|| format!("Invalid value for header {name}"))?;
            Ok((header_name, header_value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_builder() {
        let options = RequestOptions::new()
            .header("x-shop-id", "1")
            .query("limit", "10")
            .queries([("offset", "20")]);

        assert_eq!(options.headers, vec![("x-shop-id".to_string(), "1".to_string())]);
        assert_eq!(options.query.len(), 2);
    }

    #[test]
    fn test_invalid_header_rejected() {
        assert!(parse_headers([("bad header", "x")]).is_err());
        assert!(parse_headers([("accept", "line\nbreak")]).is_err());
        assert_eq!(parse_headers([("accept", "application/json")]).unwrap().len(), 1);
    }
}
