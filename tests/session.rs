mod helpers;

use biwenger_scraper::error::RunError;
use biwenger_scraper::session::{LoginState, SessionController};
use helpers::{BASE, StubSite, login_form, test_config};

#[tokio::test]
async fn successful_login_ends_authenticated() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let browser = StubSite::new()
        .with_page(BASE, login_form())
        .with_login_redirect(format!("{BASE}/app/#/home"))
        .into_browser();
    let tab = browser.tabs().new_tab().await.unwrap();

    let mut session = SessionController::new(tab.as_ref(), &config);
    assert_eq!(session.state(), LoginState::Init);

    session.login(&config.credential()).await.unwrap();

    assert_eq!(session.state(), LoginState::Authenticated);
    assert_eq!(browser.visits(BASE), 1);
}

#[tokio::test]
async fn rejected_login_ends_failed() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let browser = StubSite::new().with_page(BASE, login_form()).into_browser();
    let tab = browser.tabs().new_tab().await.unwrap();

    let mut session = SessionController::new(tab.as_ref(), &config);
    let error = session.login(&config.credential()).await.unwrap_err();

    assert!(matches!(error, RunError::LoginIncomplete { ref url } if url == BASE));
    assert_eq!(session.state(), LoginState::Failed);
}
