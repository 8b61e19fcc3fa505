use buzzbee_client::{
    api::{self, CommentId, CommentQuery, CommentSort, PostId, UserId},
    Backend, CommentNode, CommentThread, Error, LoadOutcome, MemoryStore, ReplyState, Session,
};
use buzzbee_mock_server::MockServer;

async fn load_thread(
    server: &MockServer,
    viewer: UserId,
    post: PostId,
    limit: u32,
) -> CommentThread {
    let mut thread = CommentThread::new(CommentQuery {
        limit,
        ..CommentQuery::for_post(viewer, post)
    });
    while let LoadOutcome::Loaded(_) = thread.load_more(server).await.unwrap() {}
    assert!(!thread.has_more());
    thread
}

async fn comments_on(server: &MockServer, post: PostId) -> Vec<api::Comment> {
    server
        .lock()
        .await
        .test_comments()
        .filter(|c| c.post_id == post)
        .cloned()
        .collect()
}

#[tokio::test]
async fn small_thread_comes_nested() {
    let (server, fx) = tests::generate(10);
    let thread = load_thread(&server, UserId::anonymous(), fx.quiet_post, 1000).await;
    let all = comments_on(&server, fx.quiet_post).await;

    let walked = CommentNode::walk(thread.roots());
    assert_eq!(walked.len(), all.len());
    for (depth, node) in walked {
        assert_eq!(depth == 0, node.comment.parent_comment_id.is_none());
        for child in &node.reply_children {
            assert_eq!(child.comment.parent_comment_id, Some(node.id()));
        }
        assert_eq!(thread.reply_state(&node.id()), Some(ReplyState::Expanded));
    }
}

#[tokio::test]
async fn busy_thread_expands_on_demand() {
    let (server, fx) = tests::generate(11);
    let mut thread = load_thread(&server, UserId::anonymous(), fx.busy_post, 4).await;
    let all = comments_on(&server, fx.busy_post).await;
    let top_level = all.iter().filter(|c| c.parent_comment_id.is_none()).count();

    assert_eq!(thread.roots().len(), top_level);
    assert!(thread.roots().iter().all(|n| n.reply_children.is_empty()));
    assert_eq!(
        thread.reply_state(&fx.deep_comment),
        Some(ReplyState::Collapsed)
    );

    let state = thread
        .expand_replies(&server, fx.deep_comment)
        .await
        .unwrap();
    assert_eq!(state, Some(ReplyState::Expanded));

    let deep = thread.find(&fx.deep_comment).unwrap();
    assert_eq!(deep.reply_children.len(), 2);
    let a = &deep.reply_children[0];
    assert_eq!(a.reply_children.len(), 2);
    let b = &a.reply_children[0];
    assert_eq!(b.reply_children.len(), 1);
    assert!(b.reply_children[0].reply_children.is_empty());
    assert_eq!(CommentNode::walk(&deep.reply_children).len(), 5);
    assert_eq!(thread.reply_state(&b.id()), Some(ReplyState::Expanded));

    // nothing left to fetch
    assert_eq!(
        thread.expand_replies(&server, fx.deep_comment).await.unwrap(),
        Some(ReplyState::Expanded)
    );
}

#[tokio::test]
async fn failed_expansion_can_be_retried() {
    let (server, fx) = tests::generate(12);
    let mut thread = load_thread(&server, UserId::anonymous(), fx.busy_post, 100).await;
    let before = thread.roots().to_vec();

    server
        .lock()
        .await
        .test_fail_next(api::Error::Unknown(String::from("swarm lost")));
    assert!(thread.expand_replies(&server, fx.deep_comment).await.is_err());
    assert_eq!(thread.roots(), &before[..]);
    assert_eq!(
        thread.reply_state(&fx.deep_comment),
        Some(ReplyState::Collapsed)
    );

    assert_eq!(
        thread.expand_replies(&server, fx.deep_comment).await.unwrap(),
        Some(ReplyState::Expanded)
    );
}

#[tokio::test]
async fn sort_change_drops_pending_expansion() {
    let (server, fx) = tests::generate(13);
    let mut thread = load_thread(&server, UserId::anonymous(), fx.busy_post, 100).await;

    let req = thread.begin_expand(fx.deep_comment).unwrap();
    assert_eq!(
        thread.reply_state(&fx.deep_comment),
        Some(ReplyState::Expanding)
    );
    assert!(thread.begin_expand(fx.deep_comment).is_none());

    thread.reset(CommentSort::New);
    assert_eq!(thread.query().sort, CommentSort::New);
    let res = server.fetch_replies(req.viewer, req.parent).await;
    assert_eq!(thread.finish_expand(req, res).unwrap(), None);
    assert!(thread.roots().is_empty());
}

#[tokio::test]
async fn writing_through_a_session() {
    let (server, fx) = tests::generate(14);
    let mut session = Session::new(MemoryStore::default()).unwrap();
    let me = session.sign_in(&server, &fx.sign_in(1)).await.unwrap().user_id;
    let mut thread = load_thread(&server, session.viewer(), fx.quiet_post, 1000).await;
    let roots = thread.roots().len();

    let top = thread
        .post_comment(&server, &session, None, "first buzz")
        .await
        .unwrap();
    assert_eq!(thread.roots().len(), roots + 1);
    assert_eq!(thread.roots()[roots].id(), top);

    let reply = thread
        .post_comment(&server, &session, Some(top), "second buzz")
        .await
        .unwrap();
    let node = thread.find(&top).unwrap();
    assert_eq!(node.comment.reply_count, 1);
    assert_eq!(node.reply_children[0].id(), reply);

    thread
        .edit_comment(&server, &session, reply, "buzz, edited")
        .await
        .unwrap();
    assert_eq!(thread.find(&reply).unwrap().comment.content, "buzz, edited");
    let stored = comments_on(&server, fx.quiet_post).await;
    assert!(stored
        .iter()
        .any(|c| c.comment_id == reply && c.content == "buzz, edited"));

    let err = thread
        .post_comment(&server, &session, Some(reply), "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Api(api::Error::EmptyText)));
    let err = thread
        .post_comment(&server, &session, Some(CommentId(-1)), "lost")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Api(api::Error::NotFound(_))));

    let not_mine = comments_on(&server, fx.busy_post)
        .await
        .into_iter()
        .find(|c| c.user_id != me)
        .unwrap();
    assert!(thread
        .delete_comment(&server, &session, not_mine.comment_id)
        .await
        .unwrap_err()
        .is_permission_denied());

    thread.delete_comment(&server, &session, top).await.unwrap();
    assert_eq!(thread.roots().len(), roots);
    assert!(thread.find(&reply).is_none());
    let stored = comments_on(&server, fx.quiet_post).await;
    assert!(stored
        .iter()
        .all(|c| c.comment_id != top && c.comment_id != reply));
}

#[tokio::test]
async fn signed_out_viewers_only_read() {
    let (server, fx) = tests::generate(15);
    let session = Session::new(MemoryStore::default()).unwrap();
    let mut thread = load_thread(&server, session.viewer(), fx.quiet_post, 1000).await;
    let before = comments_on(&server, fx.quiet_post).await.len();

    let err = thread
        .post_comment(&server, &session, None, "let me in")
        .await
        .unwrap_err();
    assert!(err.is_permission_denied());
    assert_eq!(comments_on(&server, fx.quiet_post).await.len(), before);
}
