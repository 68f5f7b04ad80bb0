mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{admin_token, offline_app, send, u1_token};

// Every request here is rejected or answered before any query runs, so the
// router is backed by a pool that never connects.

#[tokio::test]
async fn root_describes_the_service() -> Result<()> {
    let (status, body) = send(offline_app()?, Method::GET, "/", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Jobly API");
    Ok(())
}

#[tokio::test]
async fn create_company_requires_a_token() -> Result<()> {
    let body = json!({"handle": "new", "name": "New", "description": "d"});
    let (status, body) = send(offline_app()?, Method::POST, "/companies", None, Some(body)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
    Ok(())
}

#[tokio::test]
async fn create_company_requires_admin() -> Result<()> {
    let token = u1_token();
    let body = json!({"handle": "new", "name": "New", "description": "d"});
    let (status, body) = send(offline_app()?, Method::POST, "/companies", Some(&token), Some(body)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Must be admin to access");
    Ok(())
}

#[tokio::test]
async fn job_writes_require_admin() -> Result<()> {
    let token = u1_token();
    let cases = [
        (Method::POST, "/jobs", Some(json!({"title": "t", "companyHandle": "c1"}))),
        (Method::PATCH, "/jobs/1", Some(json!({"title": "t"}))),
        (Method::DELETE, "/jobs/1", None),
        (Method::PATCH, "/companies/c1", Some(json!({"name": "x"}))),
        (Method::DELETE, "/companies/c1", None),
    ];
    for (method, uri, body) in cases {
        let (status, _) = send(offline_app()?, method.clone(), uri, Some(&token), body.clone()).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {} as non-admin", method, uri);

        let (status, _) = send(offline_app()?, method.clone(), uri, None, body).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {} as anon", method, uri);
    }
    Ok(())
}

#[tokio::test]
async fn invalid_token_counts_as_anonymous() -> Result<()> {
    let (status, body) = send(offline_app()?, Method::GET, "/auth/whoami", Some("not-a-jwt"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Must be logged in to access");
    Ok(())
}

#[tokio::test]
async fn whoami_returns_token_identity() -> Result<()> {
    let token = admin_token();
    let (status, body) = send(offline_app()?, Method::GET, "/auth/whoami", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"username": "admin", "isAdmin": true}));
    Ok(())
}

#[tokio::test]
async fn empty_job_patch_is_rejected_before_storage() -> Result<()> {
    let token = admin_token();
    let (status, body) = send(offline_app()?, Method::PATCH, "/jobs/1", Some(&token), Some(json!({}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No data");
    Ok(())
}

#[tokio::test]
async fn null_job_patch_reaches_storage() -> Result<()> {
    let token = admin_token();
    let (status, body) =
        send(offline_app()?, Method::PATCH, "/jobs/1", Some(&token), Some(json!({"salary": null}))).await?;
    // Passes validation; the offline pool then answers 503
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
    Ok(())
}

#[tokio::test]
async fn empty_company_patch_is_rejected_before_storage() -> Result<()> {
    let token = admin_token();
    let (status, body) =
        send(offline_app()?, Method::PATCH, "/companies/c1", Some(&token), Some(json!({}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    Ok(())
}

#[tokio::test]
async fn job_patch_cannot_change_identity_fields() -> Result<()> {
    let token = admin_token();
    for body in [json!({"id": 2}), json!({"companyHandle": "c2"})] {
        let (status, _) = send(offline_app()?, Method::PATCH, "/jobs/1", Some(&token), Some(body)).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
    Ok(())
}

#[tokio::test]
async fn company_create_validates_body() -> Result<()> {
    let token = admin_token();
    let body = json!({"handle": "new", "name": "New", "description": "d", "numEmployees": -1});
    let (status, body) = send(offline_app()?, Method::POST, "/companies", Some(&token), Some(body)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "numEmployees must be at least 0");
    Ok(())
}

#[tokio::test]
async fn company_filter_rejects_inverted_range() -> Result<()> {
    let (status, body) = send(
        offline_app()?,
        Method::GET,
        "/companies?minEmployees=10&maxEmployees=5",
        None,
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "minEmployees cannot be greater than maxEmployees");
    Ok(())
}

#[tokio::test]
async fn unknown_query_parameters_are_rejected() -> Result<()> {
    let (status, _) = send(offline_app()?, Method::GET, "/jobs?salary=10", None, None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn non_numeric_job_id_is_rejected() -> Result<()> {
    let (status, body) = send(offline_app()?, Method::GET, "/jobs/abc", None, None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
    Ok(())
}
