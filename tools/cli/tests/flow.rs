use std::process::ExitCode;

use clap::Parser;
use proxycheck_cli::flow::{run_flow, FlowError, FlowOptions};
use proxycheck_cli::ProxyCheckParser;
use proxycheck_client::{ClientError, StatusCode};
use proxycheck_testkit::{setup_async_test, MockBehaviour};

const FULL_WALK: &[&str] = &[
    "GET /",
    "GET /oauth2/start",
    "GET /dex/auth",
    "GET /dex/auth/mock",
    "GET /dex/approval",
    "POST /dex/approval",
    "GET /oauth2/callback",
    "GET /",
];

#[tokio::test]
async fn test_mock_flow_succeeds() {
    let (rsclient, mut handle) = setup_async_test(MockBehaviour::default()).await;

    let res = run_flow(&rsclient, &FlowOptions::default()).await;
    assert!(res.is_ok(), "flow failed: {:?}", res);
    assert_eq!(handle.requests(), FULL_WALK);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_mock_flow_needs_cookie_replay() {
    // A second client with an empty jar can't reach the resource directly,
    // it is sent back to the login page.
    let (rsclient, mut handle) = setup_async_test(MockBehaviour::default()).await;
    run_flow(&rsclient, &FlowOptions::default())
        .await
        .expect("flow failed");

    let fresh = rsclient.new_session().expect("failed to build session");
    let response = fresh.fetch(fresh.get_url()).await.expect("fetch failed");
    assert_eq!(response.url().path(), "/dex/auth");

    handle.shutdown().await;
}

#[tokio::test]
async fn test_404_stops_the_flow() {
    for (fail_path, last_seen) in [
        ("/", "GET /"),
        ("/dex/auth/mock", "GET /dex/auth/mock"),
        ("/oauth2/callback", "GET /oauth2/callback"),
    ] {
        let (rsclient, mut handle) = setup_async_test(MockBehaviour {
            fail_path: Some(fail_path.to_string()),
            ..Default::default()
        })
        .await;

        let res = run_flow(&rsclient, &FlowOptions::default()).await;
        assert!(
            matches!(
                res,
                Err(FlowError::Client(ClientError::Http(StatusCode::NOT_FOUND, _)))
            ),
            "{} gave {:?}",
            fail_path,
            res
        );

        // Nothing after the failing request was attempted.
        let requests = handle.requests();
        assert_eq!(requests.last().map(String::as_str), Some(last_seen));
        let idx = FULL_WALK
            .iter()
            .position(|r| *r == last_seen)
            .expect("unknown request");
        assert_eq!(requests, FULL_WALK[..=idx]);

        handle.shutdown().await;
    }
}

#[tokio::test]
async fn test_missing_auth_link() {
    let (rsclient, mut handle) = setup_async_test(MockBehaviour {
        omit_mock_link: true,
        ..Default::default()
    })
    .await;

    let res = run_flow(&rsclient, &FlowOptions::default()).await;
    match res {
        Err(FlowError::NoAuthLink(page)) => assert!(page.contains("/dex/auth")),
        other => panic!("expected missing auth link, got {:?}", other),
    }
    assert_eq!(handle.requests(), FULL_WALK[..3]);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_wrong_title_fails() {
    let (rsclient, mut handle) = setup_async_test(MockBehaviour {
        success_title: "Sign In".to_string(),
        ..Default::default()
    })
    .await;

    let res = run_flow(&rsclient, &FlowOptions::default()).await;
    match res {
        Err(FlowError::Client(ClientError::UnexpectedTitle { found, expected })) => {
            assert_eq!(found, "Sign In");
            assert_eq!(expected, "Authorization Successful!");
        }
        other => panic!("expected title mismatch, got {:?}", other),
    }

    // A configured title is honoured.
    let opts = FlowOptions {
        success_title: "Sign In".to_string(),
        ..Default::default()
    };
    let fresh = rsclient.new_session().expect("failed to build session");
    assert!(run_flow(&fresh, &opts).await.is_ok());

    handle.shutdown().await;
}

#[tokio::test]
async fn test_missing_grant_form_lenient_posts_empty_form() {
    let (rsclient, mut handle) = setup_async_test(MockBehaviour {
        omit_grant_form: true,
        ..Default::default()
    })
    .await;

    let res = run_flow(&rsclient, &FlowOptions::default()).await;
    assert!(matches!(
        res,
        Err(FlowError::Client(ClientError::Http(StatusCode::BAD_REQUEST, _)))
    ));
    assert_eq!(handle.requests(), FULL_WALK[..6]);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_missing_grant_form_strict_stops_before_post() {
    let (rsclient, mut handle) = setup_async_test(MockBehaviour {
        omit_grant_form: true,
        ..Default::default()
    })
    .await;

    let opts = FlowOptions {
        strict: true,
        ..Default::default()
    };
    let res = run_flow(&rsclient, &opts).await;
    assert!(matches!(res, Err(FlowError::EmptyGrantForm(_))));
    assert_eq!(handle.requests(), FULL_WALK[..5]);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_invalid_pattern_makes_no_requests() {
    let (rsclient, mut handle) = setup_async_test(MockBehaviour::default()).await;

    let opts = FlowOptions {
        auth_link_pattern: "/dex/auth/(mock".to_string(),
        ..Default::default()
    };
    let res = run_flow(&rsclient, &opts).await;
    assert!(matches!(res, Err(FlowError::InvalidPattern(_))));
    assert!(handle.requests().is_empty());

    handle.shutdown().await;
}

fn parser_for(url: &str) -> ProxyCheckParser {
    ProxyCheckParser::try_parse_from([
        "proxycheck",
        "-C",
        "/nonexistent/proxycheck/config.toml",
        "-H",
        url,
        "--no-proxy",
    ])
    .expect("args should parse")
}

#[tokio::test]
async fn test_exec_exit_codes() {
    let (_rsclient, mut handle) = setup_async_test(MockBehaviour::default()).await;
    let opt = parser_for(handle.get_url());
    assert_eq!(opt.exec().await, ExitCode::SUCCESS);
    handle.shutdown().await;

    let (_rsclient, mut handle) = setup_async_test(MockBehaviour {
        fail_path: Some("/dex/auth/mock".to_string()),
        ..Default::default()
    })
    .await;
    let opt = parser_for(handle.get_url());
    assert_eq!(opt.exec().await, ExitCode::FAILURE);
    assert_eq!(handle.requests(), FULL_WALK[..4]);
    handle.shutdown().await;

    // Nothing listening any more.
    assert_eq!(opt.exec().await, ExitCode::FAILURE);
}
