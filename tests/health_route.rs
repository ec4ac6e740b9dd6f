use metorik_helper::config::{AppConfig, CustomersEndpoint};
use metorik_helper::routes::health::{HealthResponse, health_check};
use metorik_helper::test_support::TestRocketBuilder;
use rocket::http::Status;
use rocket::routes;

#[test]
fn health_endpoint_reports_customers_endpoint_mode() {
    let client = TestRocketBuilder::new()
        .manage_config(AppConfig {
            customers_endpoint: CustomersEndpoint::ImportOverride,
            ..AppConfig::default()
        })
        .mount_api_routes(routes![health_check])
        .blocking_client();

    let response = client.get("/wp-json/wc/v1/health").dispatch();
    assert_eq!(response.status(), Status::Ok);

    let payload: HealthResponse = response.into_json().expect("valid JSON payload");
    assert_eq!(payload.status, "ok");
    assert_eq!(payload.customers_endpoint, "import_override");
}

#[test]
fn unknown_routes_get_a_json_404() {
    let client = TestRocketBuilder::new()
        .mount_api_routes(routes![health_check])
        .blocking_client();

    let response = client.get("/wp-json/wc/v1/nothing-here").dispatch();
    assert_eq!(response.status(), Status::NotFound);

    let body: serde_json::Value = response.into_json().expect("valid JSON payload");
    assert_eq!(body["error"], "NotFound");
}
