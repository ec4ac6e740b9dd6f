//! Collection pagination headers (`X-WP-Total`, `X-WP-TotalPages`, `Link`).

use rocket::http::RawStr;
use rocket::request::{FromRequest, Outcome};
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::Request;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::Responses;
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use rocket_okapi::response::OpenApiResponderInner;
use serde::Serialize;

/// Decoded query pairs of the current request, used to rebuild page links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestQuery(pub Vec<(String, String)>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequestQuery {
    type Error = std::convert::Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let pairs = request
            .uri()
            .query()
            .map(|query| {
                query
                    .segments()
                    .map(|(key, value)| (key.to_string(), value.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        Outcome::Success(RequestQuery(pairs))
    }
}

impl<'r> OpenApiFromRequest<'r> for RequestQuery {
    fn from_request_input(
        _generator: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}

/// Page position and neighbour links for one collection response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLinks {
    pub total: i64,
    pub total_pages: i64,
    pub prev: Option<String>,
    pub next: Option<String>,
}

impl PageLinks {
    /// Compute headers for a page starting at `offset` with `per_page` rows.
    ///
    /// `base_url` is the collection URL without a query string; links keep
    /// every parameter of `query` except `page`, which is replaced.
    pub fn compute(
        total: i64,
        per_page: i64,
        offset: i64,
        base_url: &str,
        query: &RequestQuery,
    ) -> Self {
        let per_page = per_page.max(1);
        let page = (offset.max(0).saturating_add(per_page - 1) / per_page).saturating_add(1);
        let total_pages = total.max(0).saturating_add(per_page - 1) / per_page;

        let prev = (page > 1).then(|| page_url(base_url, query, (page - 1).min(total_pages)));
        let next =
            (total_pages > page).then(|| page_url(base_url, query, page.saturating_add(1)));

        Self {
            total,
            total_pages,
            prev,
            next,
        }
    }

    /// Value of the `Link` header, if any neighbour exists.
    pub fn link_header(&self) -> Option<String> {
        let mut links = Vec::new();
        if let Some(prev) = &self.prev {
            links.push(format!("<{prev}>; rel=\"prev\""));
        }
        if let Some(next) = &self.next {
            links.push(format!("<{next}>; rel=\"next\""));
        }
        (!links.is_empty()).then(|| links.join(", "))
    }
}

fn page_url(base_url: &str, query: &RequestQuery, page: i64) -> String {
    let mut pairs: Vec<String> = query
        .0
        .iter()
        .filter(|(key, _)| key != "page")
        .map(|(key, value)| {
            format!(
                "{}={}",
                RawStr::new(key).percent_encode(),
                RawStr::new(value).percent_encode()
            )
        })
        .collect();
    pairs.push(format!("page={page}"));
    format!("{base_url}?{}", pairs.join("&"))
}

/// JSON array response carrying pagination headers.
#[derive(Debug)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub links: PageLinks,
}

impl<'r, T: Serialize> Responder<'r, 'static> for Paginated<T> {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let mut response = Json(self.items).respond_to(request)?;
        response.set_raw_header("X-WP-Total", self.links.total.to_string());
        response.set_raw_header("X-WP-TotalPages", self.links.total_pages.to_string());
        if let Some(link) = self.links.link_header() {
            response.set_raw_header("Link", link);
        }
        Ok(response)
    }
}

impl<T: Serialize + JsonSchema + Send> OpenApiResponderInner for Paginated<T> {
    fn responses(generator: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        Json::<Vec<T>>::responses(generator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://shop.example/wp-json/wc/v1/customers";

    fn query(pairs: &[(&str, &str)]) -> RequestQuery {
        RequestQuery(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn first_page_links_only_forward() {
        let links = PageLinks::compute(25, 10, 0, BASE, &query(&[("per_page", "10")]));
        assert_eq!(links.total_pages, 3);
        assert_eq!(links.prev, None);
        assert_eq!(
            links.next.as_deref(),
            Some("https://shop.example/wp-json/wc/v1/customers?per_page=10&page=2")
        );
    }

    #[test]
    fn middle_page_links_both_ways_and_replaces_page() {
        let links = PageLinks::compute(
            25,
            10,
            10,
            BASE,
            &query(&[("page", "2"), ("search", "a b")]),
        );
        assert_eq!(
            links.prev.as_deref(),
            Some("https://shop.example/wp-json/wc/v1/customers?search=a%20b&page=1")
        );
        assert_eq!(
            links.next.as_deref(),
            Some("https://shop.example/wp-json/wc/v1/customers?search=a%20b&page=3")
        );
        assert_eq!(
            links.link_header().unwrap(),
            format!(
                "<{}>; rel=\"prev\", <{}>; rel=\"next\"",
                links.prev.as_deref().unwrap(),
                links.next.as_deref().unwrap()
            )
        );
    }

    #[test]
    fn out_of_range_page_points_back_to_last_page() {
        let links = PageLinks::compute(25, 10, 90, BASE, &RequestQuery::default());
        assert_eq!(links.total_pages, 3);
        assert_eq!(links.prev.as_deref(), Some(&*format!("{BASE}?page=3")));
        assert_eq!(links.next, None);
    }

    #[test]
    fn partial_offsets_round_the_page_up() {
        let links = PageLinks::compute(40, 10, 5, BASE, &RequestQuery::default());
        assert_eq!(links.prev.as_deref(), Some(&*format!("{BASE}?page=1")));
        assert_eq!(links.next.as_deref(), Some(&*format!("{BASE}?page=3")));
    }

    #[test]
    fn extreme_offset_saturates_instead_of_overflowing() {
        let links = PageLinks::compute(25, 1, i64::MAX, BASE, &RequestQuery::default());
        assert_eq!(links.total_pages, 25);
        assert_eq!(links.prev.as_deref(), Some(&*format!("{BASE}?page=25")));
        assert_eq!(links.next, None);

        let links = PageLinks::compute(i64::MAX, 100, i64::MAX, BASE, &RequestQuery::default());
        assert_eq!(links.total_pages, i64::MAX / 100 + 1);
        assert_eq!(links.next, None);
    }

    #[test]
    fn empty_collection_has_no_links() {
        let links = PageLinks::compute(0, 10, 0, BASE, &RequestQuery::default());
        assert_eq!(links.total_pages, 0);
        assert_eq!(links.link_header(), None);
    }
}
