use std::collections::HashSet;

use buzzbee_client::{
    api::{self, PostQuery, PostScope, PostSort, TopicQuery, UserId},
    search_everything, Backend, Error, Feed, FeedQuery, LoadOutcome, MemoryStore, Session,
};
use buzzbee_mock_server::MockServer;

async fn load_all<Q: FeedQuery>(feed: &mut Feed<Q>, backend: &MockServer) -> usize {
    let mut pages = 0;
    loop {
        match feed.load_more(backend).await.unwrap() {
            LoadOutcome::Loaded(_) => pages += 1,
            LoadOutcome::Exhausted => return pages,
            o => panic!("unexpected outcome {o:?}"),
        }
    }
}

#[tokio::test]
async fn overlapping_pages_are_deduplicated() {
    let (server, fx) = tests::generate(1);
    server.lock().await.test_set_page_overlap(true);

    let mut feed = Feed::new(PostQuery {
        limit: 4,
        sort: PostSort::New,
        ..PostQuery::all(UserId::anonymous())
    });
    let pages = load_all(&mut feed, &server).await;
    assert!(pages > 1);

    let ids = feed.items().iter().map(|p| p.post_id).collect::<Vec<_>>();
    let unique = ids.iter().collect::<HashSet<_>>();
    assert_eq!(unique.len(), ids.len(), "duplicated posts in {ids:?}");
    assert_eq!(ids.len(), fx.posts.len());

    // newest first, as the backend sent them
    let dates = feed.items().iter().map(|p| p.created_date).collect::<Vec<_>>();
    let mut sorted = dates.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(dates, sorted);
}

#[tokio::test]
async fn topic_feed_pages_through_everything() {
    let (server, fx) = tests::generate(2);
    let mut feed = Feed::new(TopicQuery {
        limit: 2,
        ..TopicQuery::search(UserId::anonymous(), "")
    });
    load_all(&mut feed, &server).await;
    assert_eq!(feed.items().len(), fx.topics.len());
    assert!(!feed.has_more());
    assert_eq!(feed.load_more(&server).await.unwrap(), LoadOutcome::Exhausted);
}

#[tokio::test]
async fn reset_while_loading_drops_the_old_answer() {
    let (server, fx) = tests::generate(3);
    let viewer = UserId::anonymous();
    let mut feed = Feed::new(PostQuery::all(viewer));

    let req = feed.begin_load().unwrap();
    assert!(feed.is_loading());
    assert!(feed.begin_load().is_none());
    assert_eq!(feed.load_more(&server).await.unwrap(), LoadOutcome::Busy);

    feed.reset(PostQuery::in_topic(viewer, fx.topics[2]));
    let res = server.fetch_posts(&req.query, req.cursor.as_ref()).await;
    assert_eq!(feed.finish_load(req, res).unwrap(), LoadOutcome::Stale);
    assert!(feed.items().is_empty());

    assert!(matches!(
        feed.load_more(&server).await.unwrap(),
        LoadOutcome::Loaded(n) if n > 0
    ));
    assert!(feed.items().iter().all(|p| p.topic_id == fx.topics[2]));
}

#[tokio::test]
async fn failed_page_can_be_asked_again() {
    let (server, _) = tests::generate(4);
    let mut feed = Feed::new(PostQuery::all(UserId::anonymous()));
    server
        .lock()
        .await
        .test_fail_next(api::Error::Unknown(String::from("hive on fire")));
    assert!(feed.load_more(&server).await.is_err());
    assert!(feed.items().is_empty());
    assert!(!feed.is_loading());
    assert!(matches!(
        feed.load_more(&server).await.unwrap(),
        LoadOutcome::Loaded(n) if n == api::DEFAULT_PAGE_LIMIT as usize
    ));
}

#[tokio::test]
async fn search_fetches_both_or_nothing() {
    let (server, fx) = tests::generate(5);
    let viewer = UserId::anonymous();

    let (topics, posts) = search_everything(&server, viewer, "", 3).await.unwrap();
    assert_eq!(topics.result.len(), 3);
    assert_eq!(posts.result.len(), 3);
    assert!(topics.cursor.is_some());
    assert!(posts.cursor.is_some());

    let title = server
        .fetch_post(viewer, fx.posts[7])
        .await
        .unwrap()
        .title;
    let (_, posts) = search_everything(&server, viewer, &title.to_uppercase(), 50)
        .await
        .unwrap();
    assert!(posts.result.iter().any(|p| p.post_id == fx.posts[7]));

    server
        .lock()
        .await
        .test_fail_next(api::Error::Unknown(String::from("no nectar")));
    assert!(search_everything(&server, viewer, "", 3).await.is_err());
}

#[tokio::test]
async fn following_feed_needs_a_signed_in_viewer() {
    let (server, fx) = tests::generate(6);
    let following = |viewer| PostQuery {
        scope: PostScope::Following,
        limit: 1000,
        ..PostQuery::all(viewer)
    };

    let mut feed = Feed::new(following(UserId::anonymous()));
    assert!(feed
        .load_more(&server)
        .await
        .unwrap_err()
        .is_permission_denied());

    let mut session = Session::new(MemoryStore::default()).unwrap();
    session.sign_in(&server, &fx.sign_in(0)).await.unwrap();
    let mut feed = Feed::new(following(session.viewer()));
    load_all(&mut feed, &server).await;
    let topics = feed.items().iter().map(|p| p.topic_id).collect::<HashSet<_>>();
    assert!(topics.contains(&fx.topics[0]));
    assert!(!topics.contains(&fx.topics[1]));
}

#[tokio::test]
async fn personalized_feed_puts_followed_topics_first() {
    let (server, fx) = tests::generate(7);
    let mut session = Session::new(MemoryStore::default()).unwrap();
    session.sign_in(&server, &fx.sign_in(0)).await.unwrap();

    let mut feed = Feed::new(PostQuery {
        scope: PostScope::Personalized,
        limit: 1000,
        ..PostQuery::all(session.viewer())
    });
    load_all(&mut feed, &server).await;
    assert_eq!(feed.items().len(), fx.posts.len());

    let followed = feed
        .items()
        .iter()
        .map(|p| p.is_following == Some(true))
        .collect::<Vec<_>>();
    let first_unfollowed = followed.iter().position(|f| !f).unwrap();
    assert!(first_unfollowed > 0);
    assert!(followed[first_unfollowed..].iter().all(|f| !f));
}

#[tokio::test]
async fn writing_posts_updates_the_feed() {
    let (server, fx) = tests::generate(8);
    let mut session = Session::new(MemoryStore::default()).unwrap();
    let me = session.sign_in(&server, &fx.sign_in(2)).await.unwrap().user_id;
    let topic = fx.topics[3];
    let mut feed = Feed::new(PostQuery {
        limit: 1000,
        ..PostQuery::in_topic(me, topic)
    });
    load_all(&mut feed, &server).await;
    let listed = feed.items().len();

    let id = feed
        .create_post(&server, &session, topic, "Queen spotted", "near the east hive")
        .await
        .unwrap();
    assert_eq!(feed.items().len(), listed + 1);
    assert_eq!(feed.items()[0].post_id, id);
    assert_eq!(feed.items()[0], server.fetch_post(me, id).await.unwrap());
    assert!(feed.items()[0].post_url.starts_with("queen-spotted-"));

    // a post in another topic does not belong to this listing
    let elsewhere = feed
        .create_post(&server, &session, fx.topics[4], "Swarm", "moving west")
        .await
        .unwrap();
    assert_eq!(feed.items().len(), listed + 1);
    assert_eq!(
        server.fetch_post(me, elsewhere).await.unwrap().topic_id,
        fx.topics[4]
    );

    let err = feed
        .create_post(&server, &session, topic, "  ", "no title")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Api(api::Error::EmptyText)));
    assert_eq!(feed.items().len(), listed + 1);

    feed.edit_post(&server, &session, id, "Queen found", "in the east hive")
        .await
        .unwrap();
    assert_eq!(feed.items()[0].title, "Queen found");
    assert_eq!(feed.items()[0], server.fetch_post(me, id).await.unwrap());

    let not_mine = feed
        .items()
        .iter()
        .find(|p| p.user_id != me)
        .map(|p| p.post_id);
    if let Some(p) = not_mine {
        assert!(feed
            .delete_post(&server, &session, p)
            .await
            .unwrap_err()
            .is_permission_denied());
        assert!(feed.items().iter().any(|i| i.post_id == p));
    }

    feed.delete_post(&server, &session, id).await.unwrap();
    assert_eq!(feed.items().len(), listed);
    assert!(feed.items().iter().all(|p| p.post_id != id));
    let err = server.fetch_post(me, id).await.unwrap_err();
    assert!(matches!(err, Error::Api(api::Error::NotFound(_))));

    session.sign_out().unwrap();
    assert!(feed
        .create_post(&server, &session, topic, "Anon", "buzz")
        .await
        .unwrap_err()
        .is_permission_denied());
}
