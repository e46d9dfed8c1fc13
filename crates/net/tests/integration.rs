//! Integration tests for net crate

#[cfg(test)]
mod tests {
    use devnet_errors::{ChainError, Error};
    use devnet_net::*;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn fast_client(retries: u32) -> NetClient {
        NetClient::new(NetConfig {
            retry_count: retries,
            retry_delay: Duration::from_millis(10),
            timeout: Duration::from_secs(5),
            ..NetConfig::default()
        })
        .unwrap()
    }

    fn rpc(server: &MockServer) -> CometRpcClient {
        CometRpcClient::new(fast_client(0), &server.base_url(), &format!("{}/", server.base_url()))
    }

    #[tokio::test]
    async fn test_get_height() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/status");
                then.status(200).body(
                    r#"{"jsonrpc":"2.0","id":-1,"result":{"node_info":{},"sync_info":{"latest_block_height":"1234","catching_up":false}}}"#,
                );
            })
            .await;

        assert_eq!(rpc(&server).get_height().await.unwrap(), 1234);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_block_time() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/block").query_param("height", "10");
                then.status(200).body(
                    r#"{"result":{"block":{"header":{"height":"10","time":"2024-05-01T10:00:05.123456789Z"}}}}"#,
                );
            })
            .await;

        let time = rpc(&server).get_block_time(10).await.unwrap();
        assert_eq!(time.to_rfc3339(), "2024-05-01T10:00:05.123456789+00:00");
    }

    #[tokio::test]
    async fn test_get_gov_params() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/cosmos/gov/v1/params/voting");
                then.status(200).body(
                    r#"{"voting_params":{"voting_period":"172800s"},"params":{"voting_period":"172800s","expedited_voting_period":"45s"}}"#,
                );
            })
            .await;

        let params = rpc(&server).get_gov_params().await.unwrap();
        assert_eq!(params.expedited_voting_period, Duration::from_secs(45));
    }

    #[tokio::test]
    async fn test_gov_params_missing_field() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/cosmos/gov/v1/params/voting");
                then.status(200).body(r#"{"voting_params":{"voting_period":"172800s"}}"#);
            })
            .await;

        let err = rpc(&server).get_gov_params().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Chain(ChainError::InvalidResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/status");
                then.status(503).body("unavailable");
            })
            .await;

        let client = CometRpcClient::new(fast_client(2), &server.base_url(), &server.base_url());
        let err = client.get_height().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Chain(ChainError::HttpError { status: 503, .. })
        ));
        mock.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn test_rpc_error_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/status");
                then.status(200)
                    .body(r#"{"jsonrpc":"2.0","id":-1,"error":{"code":-32603,"message":"internal"}}"#);
            })
            .await;

        assert!(rpc(&server).get_height().await.is_err());
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Nothing listens on port 1
        let client = CometRpcClient::new(fast_client(0), "http://127.0.0.1:1", "http://127.0.0.1:1");
        let err = client.get_height().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Chain(ChainError::ConnectionRefused(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let err = fast_client(0).get("not a url").await.unwrap_err();
        assert!(matches!(err, Error::Chain(ChainError::InvalidUrl(_))));
    }
}
