use mockall::mock;

use cloudstep_cloud::auth::{AccessToken, AuthError};
use cloudstep_cloud::executor::{GcloudError, GcloudExecutor};

mock! {
    Executor {}

    impl GcloudExecutor for Executor {
        async fn exec(&self, args: &[String]) -> Result<String, GcloudError>;
    }
}

#[tokio::test]
async fn token_is_fetched_once_and_trimmed() {
    let mut mock = MockExecutor::new();
    mock.expect_exec()
        .withf(|args| args.len() == 2 && args[0] == "auth" && args[1] == "print-access-token")
        .times(1)
        .returning(|_| Ok("ya29.token\n".to_owned()));

    let token = AccessToken::with_executor(mock);

    assert_eq!(token.bearer().await.unwrap(), "ya29.token");
    assert_eq!(token.bearer().await.unwrap(), "ya29.token");
}

#[tokio::test]
async fn nothing_is_fetched_until_needed() {
    let mut mock = MockExecutor::new();
    mock.expect_exec().times(0);

    let _token = AccessToken::with_executor(mock);
}

#[tokio::test]
async fn empty_output_is_an_error() {
    let mut mock = MockExecutor::new();
    mock.expect_exec().returning(|_| Ok("  \n".to_owned()));

    let token = AccessToken::with_executor(mock);

    assert!(matches!(token.bearer().await, Err(AuthError::EmptyToken)));
}

#[tokio::test]
async fn missing_gcloud_is_reported() {
    let mut mock = MockExecutor::new();
    mock.expect_exec().returning(|_| {
        Err(GcloudError::NotFound {
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        })
    });

    let token = AccessToken::with_executor(mock);
    let err = token.bearer().await.unwrap_err();

    assert!(matches!(
        err,
        AuthError::Gcloud {
            source: GcloudError::NotFound { .. }
        }
    ));
}

#[tokio::test]
async fn failed_fetch_is_retried_on_next_use() {
    let mut mock = MockExecutor::new();
    let mut calls = 0;
    mock.expect_exec().times(2).returning(move |_| {
        calls += 1;
        if calls == 1 {
            Err(GcloudError::CommandFailed {
                args: vec!["auth".to_owned(), "print-access-token".to_owned()],
                stderr: "You do not currently have an active account selected.".to_owned(),
            })
        } else {
            Ok("ya29.second\n".to_owned())
        }
    });

    let token = AccessToken::with_executor(mock);

    assert!(token.bearer().await.is_err());
    assert_eq!(token.bearer().await.unwrap(), "ya29.second");
}

#[tokio::test]
async fn fixed_token_skips_gcloud() {
    let token = AccessToken::fixed("injected");
    assert_eq!(token.bearer().await.unwrap(), "injected");
}
