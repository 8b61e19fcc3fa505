use buzzbee_client::api::{
    CommentId, NewComment, PostId, SignIn, TopicId, UserId, VoteTarget, VoteType,
};
use buzzbee_mock_server::{Forum, MockServer, INLINE_REPLIES_THRESHOLD};
use rand::{rngs::StdRng, Rng, SeedableRng};

const NUM_USERS: usize = 4;
const NUM_TOPICS: usize = 5;
const POSTS_PER_TOPIC: usize = 6;
const POST_TITLE_WORDS: usize = 5;
const POST_WORDS: usize = 40;
const COMMENT_WORDS: usize = 12;

/// Top-level comments on the post whose replies come inline
const QUIET_POST_COMMENTS: usize = 4;
/// Top-level comments on the post that needs reply expansion
const BUSY_POST_COMMENTS: usize = INLINE_REPLIES_THRESHOLD + 5;

/// What `generate` put in the forum, for tests to refer to
#[derive(Debug)]
pub struct Fixture {
    pub users: Vec<(UserId, String, String)>,
    pub topics: Vec<TopicId>,
    pub posts: Vec<PostId>,

    /// Few enough comments that pages come with every reply
    pub quiet_post: PostId,

    /// Too many comments for inline replies, with threads several levels deep
    pub busy_post: PostId,

    /// A top-level comment of `busy_post` with replies to replies
    pub deep_comment: CommentId,
}

impl Fixture {
    pub fn sign_in(&self, user: usize) -> SignIn {
        let (_, name, pass) = &self.users[user];
        SignIn {
            username: name.clone(),
            password: pass.clone(),
        }
    }
}

fn comment(
    f: &mut Forum,
    user: UserId,
    post: PostId,
    parent: Option<CommentId>,
    rng: &mut StdRng,
) -> CommentId {
    f.admin_add_comment(&NewComment {
        post_id: post,
        user_id: user,
        parent_comment_id: parent,
        content: lipsum::lipsum_words_with_rng(&mut *rng, COMMENT_WORDS),
    })
    .expect("adding generated comment")
}

/// Add `top_level` comments to `post`, each with a random reply subtree
fn comment_tree(
    f: &mut Forum,
    fx: &Fixture,
    post: PostId,
    top_level: usize,
    rng: &mut StdRng,
) {
    for _ in 0..top_level {
        let user = fx.users[rng.gen_range(0..fx.users.len())].0;
        let root = comment(f, user, post, None, rng);
        let mut parents = vec![root];
        for _ in 0..rng.gen_range(0..5) {
            let parent = parents[rng.gen_range(0..parents.len())];
            let user = fx.users[rng.gen_range(0..fx.users.len())].0;
            parents.push(comment(f, user, post, Some(parent), rng));
        }
    }
}

/// Build a forum from `seed`. The same seed always gives the same forum.
pub fn generate(seed: u64) -> (MockServer, Fixture) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut f = Forum::new();
    let mut fx = Fixture {
        users: Vec::new(),
        topics: Vec::new(),
        posts: Vec::new(),
        quiet_post: PostId(0),
        busy_post: PostId(0),
        deep_comment: CommentId(0),
    };

    for i in 0..NUM_USERS {
        let name = format!("bee{i}");
        let pass = format!("{}{i}", lipsum::lipsum_words_with_rng(&mut rng, 1));
        let id = f.admin_create_user(&name, &pass).expect("creating user");
        fx.users.push((id, name, pass));
    }

    for i in 0..NUM_TOPICS {
        let owner = fx.users[i % NUM_USERS].0;
        let name = format!("{} {i}", lipsum::lipsum_title_with_rng(&mut rng));
        let description = lipsum::lipsum_words_with_rng(&mut rng, COMMENT_WORDS);
        let topic = f
            .admin_create_topic(owner, &name, &description, "Nature")
            .expect("creating topic");
        fx.topics.push(topic);
    }

    // user 0 follows the first topic and never the second
    let first = fx.users[0].0;
    for (u, _, _) in &fx.users {
        for (i, t) in fx.topics.iter().enumerate() {
            let follows = match (*u == first, i) {
                (true, 0) => true,
                (true, 1) => false,
                _ => rng.gen_bool(0.5),
            };
            if follows {
                f.admin_follow(*u, *t).expect("following topic");
            }
        }
    }

    for t in fx.topics.clone() {
        for _ in 0..POSTS_PER_TOPIC {
            let owner = fx.users[rng.gen_range(0..NUM_USERS)].0;
            let title = lipsum::lipsum_words_with_rng(&mut rng, POST_TITLE_WORDS);
            let content = lipsum::lipsum_words_with_rng(&mut rng, POST_WORDS);
            let post = f
                .admin_create_post(owner, t, &title, &content)
                .expect("creating post");
            fx.posts.push(post);
        }
    }

    fx.quiet_post = fx.posts[0];
    fx.busy_post = fx.posts[1];
    let quiet = fx.quiet_post;
    let busy = fx.busy_post;
    comment_tree(&mut f, &fx, quiet, QUIET_POST_COMMENTS, &mut rng);
    comment_tree(&mut f, &fx, busy, BUSY_POST_COMMENTS, &mut rng);
    for p in fx.posts.clone().into_iter().skip(2) {
        let n = rng.gen_range(0..4);
        comment_tree(&mut f, &fx, p, n, &mut rng);
    }

    // a thread three levels deep, with siblings at each level
    let author = fx.users[1].0;
    let deep = comment(&mut f, author, busy, None, &mut rng);
    let a = comment(&mut f, author, busy, Some(deep), &mut rng);
    comment(&mut f, author, busy, Some(deep), &mut rng);
    let b = comment(&mut f, author, busy, Some(a), &mut rng);
    comment(&mut f, author, busy, Some(a), &mut rng);
    comment(&mut f, author, busy, Some(b), &mut rng);
    fx.deep_comment = deep;

    for (u, _, _) in &fx.users {
        for p in &fx.posts {
            if rng.gen_bool(0.3) {
                let vote = match rng.gen_bool(0.7) {
                    true => VoteType::Up,
                    false => VoteType::Down,
                };
                f.admin_vote(*u, VoteTarget::Post(*p), vote)
                    .expect("voting on post");
            }
        }
    }

    (MockServer::from(f), fx)
}
