use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body.to_string())
        .insert_header("content-type", "text/html; charset=utf-8")
}

/// Serves `pages[i]` for `?page=i+1`. Each page must be requested exactly once.
pub async fn mock_listing_server(pages: Vec<String>) -> MockServer {
    let server = MockServer::start().await;

    for (idx, body) in pages.iter().enumerate() {
        mount_page(&server, idx as u32 + 1, html(body), 1).await;
    }

    server
}

/// Mounts a single page response with an expected request count.
pub async fn mount_page(server: &MockServer, page: u32, response: ResponseTemplate, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("page", page.to_string()))
        .respond_with(response)
        .expect(expected)
        .mount(server)
        .await;
}

/// Makes `page` answer with a bare HTTP status.
pub async fn mount_status(server: &MockServer, page: u32, status: u16) {
    mount_page(server, page, ResponseTemplate::new(status).set_body_string("upstream error"), 1).await;
}

/// Makes `page` answer with arbitrary HTML.
pub async fn mount_html(server: &MockServer, page: u32, body: &str) {
    mount_page(server, page, html(body), 1).await;
}
