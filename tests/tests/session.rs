use buzzbee_client::{
    api::{self, AuthToken, SignIn, SignUp, VoteType},
    toggle_bookmark, Backend, BookmarkAction, MemoryStore, Session, StoredSession, VoteAction,
    VoteState,
};

#[tokio::test]
async fn sign_in_then_rehydrate() {
    let (server, fx) = tests::generate(20);
    let mut session = Session::new(MemoryStore::default()).unwrap();
    let user = session
        .sign_in(&server, &fx.sign_in(2))
        .await
        .unwrap()
        .clone();
    assert_eq!(user.user_id, fx.users[2].0);
    assert_eq!(user.username, fx.users[2].1);
    assert!(session.is_verified());

    // next run: the saved session is checked once, then trusted
    let mut session = Session::new(session.store().clone()).unwrap();
    assert!(!session.is_verified());
    assert_eq!(session.viewer(), user.user_id);
    assert_eq!(session.init(&server).await.unwrap(), Some(&user));
    server
        .lock()
        .await
        .test_fail_next(api::Error::Unknown(String::from("should not be asked")));
    assert_eq!(session.init(&server).await.unwrap(), Some(&user));

    session.sign_out().unwrap();
    assert!(session.store().0.is_none());
    assert!(session.credentials().unwrap_err().is_permission_denied());
}

#[tokio::test]
async fn rejected_token_is_forgotten() {
    let (server, fx) = tests::generate(21);
    let mut session = Session::new(MemoryStore::default()).unwrap();
    session.sign_in(&server, &fx.sign_in(0)).await.unwrap();
    let saved = session.store().0.clone().unwrap();

    let stale = StoredSession {
        token: AuthToken(String::from("expired")),
        ..saved
    };
    let mut session = Session::new(MemoryStore(Some(stale))).unwrap();
    assert!(session.credentials().is_ok());
    assert_eq!(session.init(&server).await.unwrap(), None);
    assert!(session.is_verified());
    assert!(session.store().0.is_none());
    assert!(session.viewer().is_anonymous());
}

#[tokio::test]
async fn server_fault_keeps_saved_session() {
    let (server, fx) = tests::generate(25);
    let mut session = Session::new(MemoryStore::default()).unwrap();
    let user = session
        .sign_in(&server, &fx.sign_in(1))
        .await
        .unwrap()
        .clone();
    let saved = session.store().clone();

    let mut session = Session::new(saved.clone()).unwrap();
    server
        .lock()
        .await
        .test_fail_next(api::Error::Unknown(String::from("database is down")));
    let err = session.init(&server).await.unwrap_err();
    assert!(matches!(err, buzzbee_client::Error::Api(api::Error::Unknown(_))));
    assert!(!session.is_verified());
    assert_eq!(session.store().0, saved.0);
    assert_eq!(session.viewer(), user.user_id);
    assert!(session.credentials().is_ok());

    // once the backend is back, the same session checks out
    assert_eq!(session.init(&server).await.unwrap(), Some(&user));
    assert!(session.is_verified());
}

#[tokio::test]
async fn sign_up_then_sign_in() {
    let (server, _) = tests::generate(26);
    let mut session = Session::new(MemoryStore::default()).unwrap();
    let payload = SignUp {
        username: String::from("drone"),
        password: String::from("Nectar#99"),
        display_name: Some(String::from("  ")),
        bio: Some(String::from("mostly idle")),
        image_id: 3,
    };
    let user = session
        .sign_up(&server, &payload)
        .await
        .unwrap()
        .clone();
    assert_eq!(user.username, "drone");
    assert_eq!(user.display_name.as_deref(), Some("drone"));
    assert_eq!(user.bio.as_deref(), Some("mostly idle"));
    assert!(session.is_verified());
    assert_eq!(session.store().0.as_ref().unwrap().user.as_ref(), Some(&user));
    assert!(server.user_exists("drone").await.unwrap());

    // the new account signs in like any other
    let mut other = Session::new(MemoryStore::default()).unwrap();
    let again = other.sign_in(&server, &payload.sign_in()).await.unwrap();
    assert_eq!(again.user_id, user.user_id);
}

#[tokio::test]
async fn sign_up_refuses_taken_names_and_weak_passwords() {
    let (server, fx) = tests::generate(27);
    let mut session = Session::new(MemoryStore::default()).unwrap();
    let users = server.lock().await.test_num_users();

    let taken = SignUp {
        username: fx.users[0].1.clone(),
        password: String::from("Nectar#99"),
        display_name: None,
        bio: None,
        image_id: 1,
    };
    let err = session.sign_up(&server, &taken).await.unwrap_err();
    assert!(matches!(err, buzzbee_client::Error::Api(api::Error::NameAlreadyUsed(_))));

    let weak = SignUp {
        username: String::from("larva"),
        password: String::from("nectar"),
        ..taken
    };
    let err = session.sign_up(&server, &weak).await.unwrap_err();
    assert!(matches!(err, buzzbee_client::Error::Api(api::Error::InvalidRequest(_))));

    assert_eq!(server.lock().await.test_num_users(), users);
    assert!(session.user().is_none());
    assert!(session.store().0.is_none());
}

#[tokio::test]
async fn wrong_password_keeps_session_signed_out() {
    let (server, fx) = tests::generate(22);
    let mut session = Session::new(MemoryStore::default()).unwrap();
    let err = session
        .sign_in(
            &server,
            &SignIn {
                password: String::from("not the password"),
                ..fx.sign_in(0)
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_permission_denied());
    assert!(session.user().is_none());
    assert!(session.store().0.is_none());
}

#[tokio::test]
async fn votes_follow_the_backend_tallies() {
    let (server, fx) = tests::generate(23);
    let mut session = Session::new(MemoryStore::default()).unwrap();
    session.sign_in(&server, &fx.sign_in(3)).await.unwrap();
    let viewer = session.viewer();

    let mut post = server.fetch_post(viewer, fx.posts[4]).await.unwrap();
    let mut state = VoteState::of_post(&post);
    if let Some((_, v)) = state.current {
        state.click(&server, &session, v).await.unwrap();
    }
    assert_eq!(state.current, None);
    let base = state.counts;

    let action = state.click(&server, &session, VoteType::Up).await.unwrap();
    assert_eq!(action, VoteAction::Cast(VoteType::Up));
    assert_eq!(state.counts.upvote_count, base.upvote_count + 1);
    let (id, _) = state.current.unwrap();

    let action = state.click(&server, &session, VoteType::Down).await.unwrap();
    assert_eq!(action, VoteAction::Change(id, VoteType::Down));
    assert_eq!(state.counts.upvote_count, base.upvote_count);
    assert_eq!(state.counts.downvote_count, base.downvote_count + 1);
    assert_eq!(state.score(), base.upvote_count - base.downvote_count - 1);

    state.apply_to_post(&mut post);
    assert_eq!(post, server.fetch_post(viewer, fx.posts[4]).await.unwrap());

    server
        .lock()
        .await
        .test_fail_next(api::Error::Unknown(String::from("hive unreachable")));
    assert!(state.click(&server, &session, VoteType::Down).await.is_err());
    assert_eq!(state.current, Some((id, VoteType::Down)));

    let action = state.click(&server, &session, VoteType::Down).await.unwrap();
    assert_eq!(action, VoteAction::Remove(id));
    assert_eq!(state.counts, base);
    assert_eq!(state.current, None);
}

#[tokio::test]
async fn bookmarks_toggle() {
    let (server, fx) = tests::generate(24);
    let mut session = Session::new(MemoryStore::default()).unwrap();
    session.sign_in(&server, &fx.sign_in(1)).await.unwrap();
    let viewer = session.viewer();

    let mut post = server.fetch_post(viewer, fx.posts[9]).await.unwrap();
    assert!(!post.is_bookmarked);
    assert_eq!(
        toggle_bookmark(&server, &session, &mut post).await.unwrap(),
        BookmarkAction::Add
    );
    assert_eq!(post, server.fetch_post(viewer, fx.posts[9]).await.unwrap());

    let id = post.bookmark_id.unwrap();
    assert_eq!(
        toggle_bookmark(&server, &session, &mut post).await.unwrap(),
        BookmarkAction::Remove(id)
    );
    assert!(!post.is_bookmarked);
    assert!(!server
        .fetch_post(viewer, fx.posts[9])
        .await
        .unwrap()
        .is_bookmarked);

    session.sign_out().unwrap();
    assert!(toggle_bookmark(&server, &session, &mut post)
        .await
        .unwrap_err()
        .is_permission_denied());
}
