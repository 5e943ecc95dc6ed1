pub(crate) async fn service_worker() -> axum::response::Response {
    const SW_CONTENT: &str = include_str!("../static/sw.js");
    script_response(SW_CONTENT, "no-cache")
}

pub(crate) async fn push_register_script() -> axum::response::Response {
    const REGISTER_JS_CONTENT: &str = include_str!("../static/push_register.js");
    script_response(REGISTER_JS_CONTENT, "public, max-age=3600")
}

fn script_response(content: &'static str, cache_control: &'static str) -> axum::response::Response {
    axum::response::Response::builder()
        .status(200)
        .header("content-type", "application/javascript")
        .header("cache-control", cache_control)
        .body(content.into())
        .unwrap_or_default()
}
