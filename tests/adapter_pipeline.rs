//! End-to-end behavior of the normalization pipeline.

use axum::body::{Body, Bytes};
use axum::http::Method;
use route_adapter::adapter::{QueryValue, DATA_REQ_KEY, INFERRED_LOCALE_KEY, LOCALE_KEY};
use route_adapter::{AdapterError, RequestEnvelope};

mod common;
use common::{adapter, config_with_pages, proxied, rewrite, with_locales};

fn first<'a>(env: &'a RequestEnvelope, key: &str) -> Option<&'a str> {
    env.query().get(key).and_then(QueryValue::first)
}

#[tokio::test]
async fn test_dynamic_route_end_to_end() {
    let adapter = adapter(config_with_pages(&["/blog/[slug]"]));
    let mut env = proxied("/blog/hello-world", "/blog/[slug]");

    adapter.adapt(&mut env).await.unwrap();

    assert_eq!(env.pathname().unwrap(), "/blog/hello-world");
    assert_eq!(env.url.as_deref(), Some("/blog/hello-world"));
    assert!(env.meta().rewrote_url().is_none());
}

#[tokio::test]
async fn test_prefetch_fragment_wins_over_fragment() {
    let adapter = adapter(config_with_pages(&["/blog"]));
    let mut env = proxied("/blog.prefetch.rsc", "/blog.prefetch.rsc");

    adapter.adapt(&mut env).await.unwrap();

    assert_eq!(env.pathname().unwrap(), "/blog");
    assert!(env.meta().is_rsc_request());
    assert!(env.meta().is_prefetch_rsc_request());
    assert_eq!(env.header("rsc"), Some("1"));
    assert_eq!(env.header("next-router-prefetch"), Some("1"));
    assert_eq!(first(&env, DATA_REQ_KEY), Some("1"));
}

#[tokio::test]
async fn test_plain_fragment_is_not_prefetch() {
    let adapter = adapter(config_with_pages(&["/blog"]));
    let mut env = proxied("/blog.rsc", "/blog.rsc");

    adapter.adapt(&mut env).await.unwrap();

    assert_eq!(env.pathname().unwrap(), "/blog");
    assert!(env.meta().is_rsc_request());
    assert!(!env.meta().is_prefetch_rsc_request());
}

#[tokio::test]
async fn test_client_fragment_headers_are_stripped() {
    let adapter = adapter(config_with_pages(&["/blog"]));
    let mut env = proxied("/blog", "/blog")
        .with_header("rsc", "1")
        .with_header("next-router-state-tree", "%5B%5D");

    adapter.adapt(&mut env).await.unwrap();

    assert!(env.header("rsc").is_none());
    assert!(env.header("next-router-state-tree").is_none());
    assert!(!env.meta().is_rsc_request());
}

#[tokio::test]
async fn test_same_input_same_output() {
    let mut config = with_locales(config_with_pages(&["/blog/[slug]"]), &["en", "fr"], "en");
    config.rewrites.before_files = vec![rewrite("/en/posts/:slug", "/en/blog/:slug")];
    let adapter = adapter(config);

    let mut a = proxied("/posts/x?y=1", "/blog/[slug]");
    let mut b = proxied("/posts/x?y=1", "/blog/[slug]");
    adapter.adapt(&mut a).await.unwrap();
    adapter.adapt(&mut b).await.unwrap();

    assert_eq!(a.meta().rewrote_url(), Some("/en/blog/x"));
    assert_eq!(a.pathname().unwrap(), "/blog/x");
    assert_eq!(first(&a, "y"), Some("1"));

    assert_eq!(a.parsed_url, b.parsed_url);
    assert_eq!(a.url, b.url);
    assert_eq!(a.meta(), b.meta());
}

#[tokio::test]
async fn test_locale_prefixed_dynamic_route_is_interpolated() {
    let config = with_locales(config_with_pages(&["/blog/[slug]"]), &["en", "fr"], "en");
    let adapter = adapter(config);

    let mut env = proxied("/fr/blog/hello", "/fr/blog/[slug]");
    adapter.adapt(&mut env).await.unwrap();

    assert_eq!(env.pathname().unwrap(), "/blog/hello");
    assert_eq!(env.url.as_deref(), Some("/fr/blog/hello"));
    assert_eq!(first(&env, LOCALE_KEY), Some("fr"));
    assert!(!env.query().contains_key(INFERRED_LOCALE_KEY));
}

#[tokio::test]
async fn test_locale_prefixed_template_uses_default_matches() {
    let config = with_locales(config_with_pages(&["/blog/[slug]"]), &["en", "fr"], "en");
    let adapter = adapter(config);

    let mut env = proxied("/fr/blog/[slug]", "/fr/blog/[slug]");
    adapter.adapt(&mut env).await.unwrap();

    // default matches carry the literal template value, percent-encoded
    assert_eq!(env.pathname().unwrap(), "/blog/%5Bslug%5D");
    assert_eq!(first(&env, LOCALE_KEY), Some("fr"));
}

#[tokio::test]
async fn test_interception_markers_do_not_reach_the_url() {
    let adapter = adapter(config_with_pages(&["/blog/[slug]"]));
    let mut env = proxied("/blog/a?nxtIfeed=1&nxtPslug=a&keep=1", "/blog/[slug]");

    adapter.adapt(&mut env).await.unwrap();

    assert_eq!(env.url.as_deref(), Some("/blog/a?keep=1"));
    assert_eq!(env.pathname().unwrap(), "/blog/a");
}

#[tokio::test]
async fn test_invocation_failure_short_circuits() {
    let adapter = adapter(config_with_pages(&["/page"]));
    let mut env = RequestEnvelope::new(Method::GET, "/page?user=1")
        .with_header("x-invoke-status", "500")
        .with_header("x-invoke-error", r#"{"message":"boom"}"#);

    match adapter.adapt(&mut env).await {
        Err(AdapterError::Invocation(e)) => {
            assert_eq!(e.status_code, Some(500));
            assert_eq!(e.cause.map(|c| c.message).as_deref(), Some("boom"));
            assert!(!e.query.contains_key("user"));
        }
        other => panic!("expected invocation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_invoke_error_is_not_fatal_to_parsing() {
    let adapter = adapter(config_with_pages(&["/page"]));
    let mut env = RequestEnvelope::new(Method::GET, "/page")
        .with_header("x-invoke-status", "500")
        .with_header("x-invoke-error", "{not json");

    match adapter.adapt(&mut env).await {
        Err(AdapterError::Invocation(e)) => {
            assert_eq!(e.cause.map(|c| c.message).as_deref(), Some(""));
        }
        other => panic!("expected invocation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rewrite_sets_metadata_only_when_changed() {
    let mut config = config_with_pages(&["/b", "/c"]);
    config.rewrites.before_files = vec![rewrite("/a", "/b")];
    let adapter = adapter(config);

    let mut env = proxied("/a", "/b");
    adapter.adapt(&mut env).await.unwrap();
    assert_eq!(env.meta().rewrote_url(), Some("/b"));
    assert_eq!(env.pathname().unwrap(), "/b");

    let mut env = proxied("/c", "/c");
    adapter.adapt(&mut env).await.unwrap();
    assert!(env.meta().rewrote_url().is_none());
}

#[tokio::test]
async fn test_inferred_locale_then_explicit_from_route_matches() {
    let config = with_locales(config_with_pages(&["/blog/[slug]"]), &["en", "fr"], "en");
    let adapter = adapter(config);

    let mut env = proxied("/about", "/about");
    adapter.adapt(&mut env).await.unwrap();
    assert_eq!(first(&env, LOCALE_KEY), Some("en"));
    assert_eq!(first(&env, INFERRED_LOCALE_KEY), Some("1"));

    let mut env = proxied("/blog/[slug]", "/blog/[slug]")
        .with_header("x-now-route-matches", "1=fr&2=hello");
    adapter.adapt(&mut env).await.unwrap();
    assert_eq!(first(&env, LOCALE_KEY), Some("fr"));
    assert!(!env.query().contains_key(INFERRED_LOCALE_KEY));
    assert_eq!(env.pathname().unwrap(), "/blog/hello");
}

#[tokio::test]
async fn test_explicit_locale_in_url() {
    let config = with_locales(config_with_pages(&["/about"]), &["en", "fr"], "en");
    let adapter = adapter(config);

    let mut env = proxied("/fr/about", "/fr/about");
    adapter.adapt(&mut env).await.unwrap();
    assert_eq!(first(&env, LOCALE_KEY), Some("fr"));
    assert!(!env.query().contains_key(INFERRED_LOCALE_KEY));
}

#[tokio::test]
async fn test_data_request_under_base_path() {
    let mut config = config_with_pages(&["/blog/[slug]"]);
    config.base_path = "/docs".into();
    let adapter = adapter(config);

    let mut env = proxied("/docs/_next/data/b1/blog/a.json", "/_next/data/b1/blog/[slug].json");
    adapter.adapt(&mut env).await.unwrap();

    assert_eq!(first(&env, DATA_REQ_KEY), Some("1"));
    assert_eq!(env.pathname().unwrap(), "/blog/a");
}

#[tokio::test]
async fn test_postponed_resume_reads_body() {
    let adapter = adapter(config_with_pages(&["/feed"]));
    let chunks: Vec<Result<Bytes, std::io::Error>> =
        vec![Ok(Bytes::from("{\"s\":")), Ok(Bytes::from("1}"))];
    let mut env = RequestEnvelope::new(Method::POST, "/_next/postponed/resume/feed")
        .with_header("x-matched-path", "/_next/postponed/resume/feed")
        .with_body(Body::from_stream(futures_util::stream::iter(chunks)));

    adapter.adapt(&mut env).await.unwrap();

    assert_eq!(env.meta().postponed(), Some("{\"s\":1}"));
    assert_eq!(env.pathname().unwrap(), "/feed");
}

#[tokio::test]
async fn test_missing_matched_path_is_invariant() {
    let adapter = adapter(config_with_pages(&[]));
    let mut env = RequestEnvelope::new(Method::GET, "/a");
    assert!(matches!(
        adapter.adapt(&mut env).await,
        Err(AdapterError::Invariant(_))
    ));
}
