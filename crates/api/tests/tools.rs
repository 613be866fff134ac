mod support;

use api::{dispatch_tool_call, RequestCredentials};
use models::{ToolContent, ToolResponse};
use serde_json::{json, Value};
use support::{fixture, mint, Fixture};

async fn call(fx: &Fixture, name: &str, arguments: Value) -> ToolResponse {
    dispatch_tool_call(&fx.app, name, arguments, &RequestCredentials::default()).await
}

fn first_json(response: &ToolResponse) -> Value {
    match response.first().expect("non-empty response") {
        ToolContent::Text { text } => serde_json::from_str(text).unwrap(),
        ToolContent::Image { .. } => panic!("expected a JSON text part first"),
    }
}

fn expect_success(response: &ToolResponse) -> Value {
    let payload = first_json(response);
    assert_eq!(payload["status"], "success", "{payload}");
    payload["data"].clone()
}

fn expect_error(response: &ToolResponse, code: &str) -> Value {
    let payload = first_json(response);
    assert_eq!(payload["status"], "error", "{payload}");
    assert_eq!(payload["error_code"], code, "{payload}");
    assert!(
        payload["recovery_strategy"].as_str().unwrap().len() > 10,
        "{payload}"
    );
    payload
}

#[tokio::test]
async fn ping_and_help_require_no_token() {
    let fx = fixture();

    let data = expect_success(&call(&fx, "ping", json!({})).await);
    assert_eq!(data["service"], "folio");

    let data = expect_success(&call(&fx, "help", json!({})).await);
    assert_eq!(data["tools"].as_array().unwrap().len(), api::TOOL_NAMES.len());
}

#[tokio::test]
async fn discovery_lists_assets_across_groups() {
    let fx = fixture();

    let data = expect_success(&call(&fx, "list_templates", json!({})).await);
    assert_eq!(data["templates"].as_array().unwrap().len(), 3);

    let data = expect_success(
        &call(&fx, "get_template_details", json!({"template_id": "news_email"})).await,
    );
    assert_eq!(data["template_id"], "news_email");
    assert!(data["global_parameters"].as_array().unwrap().len() == 1);

    let data = expect_success(
        &call(&fx, "list_template_fragments", json!({"template_id": "news_email"})).await,
    );
    let ids: Vec<&str> = data["fragments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["fragment_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["news", "table", "image"]);

    let data = expect_success(&call(&fx, "list_styles", json!({})).await);
    assert_eq!(data["styles"].as_array().unwrap().len(), 3);

    let data = expect_success(&call(&fx, "list_themes", json!({})).await);
    assert_eq!(data["themes"].as_array().unwrap().len(), 2);

    let data = expect_success(&call(&fx, "list_handlers", json!({})).await);
    assert_eq!(data["handlers"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn mutating_tools_require_a_token() {
    let fx = fixture();
    let response = call(
        &fx,
        "create_document_session",
        json!({"template_id": "news_email"}),
    )
    .await;
    expect_error(&response, "AUTH_REQUIRED");
}

#[tokio::test]
async fn unknown_tool_and_malformed_arguments() {
    let fx = fixture();

    let response = call(&fx, "make_me_a_sandwich", json!({})).await;
    expect_error(&response, "UNKNOWN_TOOL");

    let token = mint(&["finance"], 600);
    let response = call(
        &fx,
        "create_document_session",
        json!({"auth_token": token}), // missing template_id
    )
    .await;
    expect_error(&response, "INVALID_ARGUMENTS");
}

#[tokio::test]
async fn caller_supplied_group_is_overwritten() {
    let fx = fixture();
    let token = mint(&["beta"], 600);

    let data = expect_success(
        &call(
            &fx,
            "create_document_session",
            json!({
                "template_id": "news_email",
                "group": "finance",
                "auth_token": token.clone(),
            }),
        )
        .await,
    );
    let session_id = data["session_id"].as_str().unwrap();

    // The session landed in beta, the verified group, not finance.
    let data = expect_success(
        &call(
            &fx,
            "get_session_status",
            json!({"session_id": session_id, "auth_token": token}),
        )
        .await,
    );
    assert_eq!(data["group"], "beta");
}

#[tokio::test]
async fn news_email_workflow_renders_fragment_content() {
    let fx = fixture();
    let token = mint(&["finance"], 600);

    let data = expect_success(
        &call(
            &fx,
            "create_document_session",
            json!({"template_id": "news_email", "auth_token": token.clone()}),
        )
        .await,
    );
    let session_id = data["session_id"].as_str().unwrap().to_string();

    expect_success(
        &call(
            &fx,
            "set_global_parameters",
            json!({
                "session_id": session_id,
                "parameters": {"subject": "Daily Brief"},
                "auth_token": token.clone(),
            }),
        )
        .await,
    );

    expect_success(
        &call(
            &fx,
            "add_fragment",
            json!({
                "session_id": session_id,
                "fragment_id": "news",
                "parameters": {
                    "story_summary": "X",
                    "date": "2025-11-18",
                    "author": "FT",
                    "source": "https://ft.com",
                    "impact_rating": "high",
                },
                "auth_token": token.clone(),
            }),
        )
        .await,
    );

    let data = expect_success(
        &call(
            &fx,
            "get_document",
            json!({
                "session_id": session_id,
                "format": "html",
                "style_id": "bizdark",
                "auth_token": token,
            }),
        )
        .await,
    );
    let html = data["content"].as_str().unwrap();
    for expect in ["X", "FT", "high"] {
        assert!(html.contains(expect), "missing {expect:?}");
    }
}

#[tokio::test]
async fn rendering_before_parameters_is_not_ready() {
    let fx = fixture();
    let token = mint(&["finance"], 600);

    let data = expect_success(
        &call(
            &fx,
            "create_document_session",
            json!({"template_id": "news_email", "auth_token": token.clone()}),
        )
        .await,
    );
    let session_id = data["session_id"].as_str().unwrap();

    let response = call(
        &fx,
        "get_document",
        json!({"session_id": session_id, "auth_token": token}),
    )
    .await;
    expect_error(&response, "SESSION_NOT_READY");
}

#[tokio::test]
async fn cross_group_session_access_reads_as_missing() {
    let fx = fixture();
    let alpha = mint(&["alpha"], 600);
    let beta = mint(&["beta"], 600);

    let data = expect_success(
        &call(
            &fx,
            "create_document_session",
            json!({"template_id": "news_email", "auth_token": alpha}),
        )
        .await,
    );
    let session_id = data["session_id"].as_str().unwrap();

    let response = call(
        &fx,
        "list_session_fragments",
        json!({"session_id": session_id, "auth_token": beta}),
    )
    .await;
    expect_error(&response, "SESSION_NOT_FOUND");
}

#[tokio::test]
async fn proxy_render_returns_guid_and_download_url() {
    let fx = fixture();
    let token = mint(&["finance"], 600);

    let data = expect_success(
        &call(
            &fx,
            "create_document_session",
            json!({"template_id": "news_email", "auth_token": token.clone()}),
        )
        .await,
    );
    let session_id = data["session_id"].as_str().unwrap().to_string();
    expect_success(
        &call(
            &fx,
            "set_global_parameters",
            json!({
                "session_id": session_id,
                "parameters": {"subject": "S"},
                "auth_token": token.clone(),
            }),
        )
        .await,
    );

    let data = expect_success(
        &call(
            &fx,
            "get_document",
            json!({
                "session_id": session_id,
                "proxy": true,
                "auth_token": token,
            }),
        )
        .await,
    );
    let guid = data["proxy_guid"].as_str().unwrap();
    assert!(models::parse_guid(guid).is_some());
    assert_eq!(
        data["download_url"],
        format!("http://docs.example.com/proxy/{guid}")
    );
}

#[tokio::test]
async fn render_graph_returns_image_part_and_saves() {
    let fx = fixture();
    let token = mint(&["finance"], 600);

    let response = call(
        &fx,
        "render_graph",
        json!({
            "graph_type": "bar",
            "title": "Revenue",
            "series": [{"name": "2025", "x": ["Q1", "Q2"], "y": [10, 20]}],
            "save": true,
            "alias": "revenue-chart",
            "auth_token": token.clone(),
        }),
    )
    .await;
    let data = expect_success(&response);
    let guid = data["guid"].as_str().unwrap().to_string();
    assert_eq!(data["format"], "svg");
    assert!(matches!(
        response.last().unwrap(),
        ToolContent::Image { mime_type, .. } if mime_type == "image/svg+xml"
    ));

    // The image is listed and retrievable by alias within the group.
    let data = expect_success(&call(&fx, "list_images", json!({"auth_token": token.clone()})).await);
    assert_eq!(data["image_count"], 1);
    assert_eq!(data["images"][0]["guid"].as_str().unwrap(), guid);

    let response = call(
        &fx,
        "get_image",
        json!({"identifier": "revenue-chart", "auth_token": token}),
    )
    .await;
    expect_success(&response);

    // A caller from another group sees a miss, not a denial.
    let beta = mint(&["beta"], 600);
    let response = call(
        &fx,
        "get_image",
        json!({"identifier": guid, "auth_token": beta}),
    )
    .await;
    expect_error(&response, "IMAGE_NOT_FOUND");
}

#[tokio::test]
async fn invalid_graph_params_are_rejected() {
    let fx = fixture();
    let token = mint(&["finance"], 600);

    let response = call(
        &fx,
        "render_graph",
        json!({
            "graph_type": "bar",
            "series": [{"y": [1.0]}],
            "alpha": 1.5,
            "auth_token": token.clone(),
        }),
    )
    .await;
    expect_error(&response, "INVALID_GRAPH_PARAMS");

    let response = call(
        &fx,
        "render_graph",
        json!({
            "graph_type": "pie",
            "series": [{"y": [1.0]}],
            "auth_token": token,
        }),
    )
    .await;
    expect_error(&response, "INVALID_GRAPH_PARAMS");
}

#[tokio::test]
async fn add_plot_fragment_embeds_stored_image() {
    let fx = fixture();
    let token = mint(&["finance"], 600);

    let data = expect_success(
        &call(
            &fx,
            "render_graph",
            json!({
                "graph_type": "line",
                "series": [{"x": [1, 2, 3], "y": [1.0, 4.0, 9.0]}],
                "save": true,
                "alias": "squares",
                "auth_token": token.clone(),
            }),
        )
        .await,
    );
    assert!(data["guid"].is_string());

    let data = expect_success(
        &call(
            &fx,
            "create_document_session",
            json!({"template_id": "news_email", "auth_token": token.clone()}),
        )
        .await,
    );
    let session_id = data["session_id"].as_str().unwrap().to_string();

    expect_success(
        &call(
            &fx,
            "add_plot_fragment",
            json!({
                "session_id": session_id,
                "identifier": "squares",
                "caption": "Squares over time",
                "auth_token": token.clone(),
            }),
        )
        .await,
    );

    let data = expect_success(
        &call(
            &fx,
            "list_session_fragments",
            json!({"session_id": session_id, "auth_token": token.clone()}),
        )
        .await,
    );
    assert_eq!(data["fragment_count"], 1);
    assert_eq!(data["fragments"][0]["fragment_id"], "image");

    let response = call(
        &fx,
        "add_plot_fragment",
        json!({
            "session_id": session_id,
            "identifier": "no-such-image",
            "auth_token": token,
        }),
    )
    .await;
    expect_error(&response, "IMAGE_NOT_FOUND");
}

#[tokio::test]
async fn add_image_fragment_requires_https_by_default() {
    let fx = fixture();
    let token = mint(&["finance"], 600);

    let data = expect_success(
        &call(
            &fx,
            "create_document_session",
            json!({"template_id": "news_email", "auth_token": token.clone()}),
        )
        .await,
    );
    let session_id = data["session_id"].as_str().unwrap();

    let response = call(
        &fx,
        "add_image_fragment",
        json!({
            "session_id": session_id,
            "image_url": "http://example.com/x.png",
            "auth_token": token,
        }),
    )
    .await;
    expect_error(&response, "INVALID_IMAGE_URL");
}

#[tokio::test]
async fn add_image_fragment_rejects_non_image_content_type() {
    // A local server that answers 200 text/html.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = axum::Router::new().route(
        "/x.png",
        axum::routing::get(|| async { axum::response::Html("<html>not an image</html>") }),
    );
    tokio::spawn(async move {
        axum::serve(listener, server).await.unwrap();
    });

    let fx = fixture();
    let token = mint(&["finance"], 600);
    let data = expect_success(
        &call(
            &fx,
            "create_document_session",
            json!({"template_id": "news_email", "auth_token": token.clone()}),
        )
        .await,
    );
    let session_id = data["session_id"].as_str().unwrap();

    let response = call(
        &fx,
        "add_image_fragment",
        json!({
            "session_id": session_id,
            "image_url": format!("http://{addr}/x.png"),
            "require_https": false,
            "auth_token": token,
        }),
    )
    .await;
    expect_error(&response, "INVALID_IMAGE_CONTENT_TYPE");
}

#[tokio::test]
async fn validate_parameters_reports_without_failing() {
    let fx = fixture();
    let token = mint(&["finance"], 600);

    let data = expect_success(
        &call(
            &fx,
            "validate_parameters",
            json!({
                "template_id": "news_email",
                "parameters": {"subject": "ok", "bogus": 1},
                "auth_token": token,
            }),
        )
        .await,
    );
    assert_eq!(data["valid"], false);
    assert!(data["errors"][0].as_str().unwrap().contains("bogus"));
}

#[tokio::test]
async fn expired_token_fails_auth() {
    let fx = fixture();
    let token = mint(&["finance"], -60);

    let response = call(
        &fx,
        "create_document_session",
        json!({"template_id": "news_email", "auth_token": token}),
    )
    .await;
    let payload = expect_error(&response, "AUTH_FAILED");
    assert!(
        payload["recovery_strategy"].as_str().unwrap().contains("EXPIRED"),
        "{payload}"
    );
}
