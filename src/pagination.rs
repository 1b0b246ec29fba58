//! Page-number pagination with the `{count, next, previous, data}` envelope
//! used by every list endpoint.

use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 200;

/// Parsed `page`/`page_size` query parameters.
#[derive(Debug, Clone, Copy)]
pub struct PageParams {
    pub page: u64,
    pub page_size: u64,
}

impl PageParams {
    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.page_size
    }
}

/// Extract pagination parameters with defaults and bounds.
pub fn page_params(params: &BTreeMap<String, String>) -> PageParams {
    let page = params
        .get("page")
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v >= 1)
        .unwrap_or(1);
    let page_size = params
        .get("page_size")
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v >= 1)
        .map(|v| v.min(MAX_PAGE_SIZE))
        .unwrap_or(DEFAULT_PAGE_SIZE);
    PageParams { page, page_size }
}

/// Standard pagination envelope.
#[derive(Debug, Serialize, ToSchema)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub data: Vec<T>,
}

fn page_url(path: &str, params: &BTreeMap<String, String>, page: u64) -> String {
    let mut query: Vec<String> = params
        .iter()
        .filter(|(key, _)| key.as_str() != "page")
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    query.push(format!("page={page}"));
    format!("{path}?{}", query.join("&"))
}

/// Wrap one page of results in the envelope, with next/previous links
/// rebuilt from the request path and parameters.
pub fn paginate<T>(
    path: &str,
    params: &BTreeMap<String, String>,
    page_params: PageParams,
    count: u64,
    data: Vec<T>,
) -> Page<T> {
    let next = if page_params.page * page_params.page_size < count {
        Some(page_url(path, params, page_params.page + 1))
    } else {
        None
    };
    let previous = if page_params.page > 1 {
        Some(page_url(path, params, page_params.page - 1))
    } else {
        None
    };

    Page {
        count,
        next,
        previous,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_and_bounds() {
        let p = page_params(&params(&[]));
        assert_eq!(p.page, 1);
        assert_eq!(p.page_size, DEFAULT_PAGE_SIZE);

        let p = page_params(&params(&[("page", "0"), ("page_size", "100000")]));
        assert_eq!(p.page, 1);
        assert_eq!(p.page_size, MAX_PAGE_SIZE);

        let p = page_params(&params(&[("page", "3"), ("page_size", "10")]));
        assert_eq!(p.offset(), 20);
    }

    #[test]
    fn test_envelope_links() {
        let request = params(&[("template_id", "FT1"), ("page", "2"), ("page_size", "10")]);
        let page = paginate(
            "/api/v1/data",
            &request,
            PageParams { page: 2, page_size: 10 },
            35,
            vec![1, 2, 3],
        );

        assert_eq!(page.count, 35);
        let next = page.next.unwrap();
        assert!(next.contains("page=3"));
        assert!(next.contains("template_id=FT1"));
        let previous = page.previous.unwrap();
        assert!(previous.contains("page=1"));
    }

    #[test]
    fn test_last_page_has_no_next() {
        let page = paginate(
            "/api/v1/data",
            &params(&[]),
            PageParams { page: 2, page_size: 20 },
            35,
            Vec::<i32>::new(),
        );
        assert!(page.next.is_none());
        assert!(page.previous.is_some());
    }
}
