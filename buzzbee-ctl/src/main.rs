use std::path::PathBuf;

use anyhow::Context;
use buzzbee_client::{
    api::{
        CommentId, CommentQuery, CommentSort, PostId, PostQuery, PostScope, PostSort, SignIn,
        SignUp, TopicId, TopicQuery, TopicSort, VoteType,
    },
    relative_age, search_everything, toggle_bookmark, Backend, CommentNode, CommentThread, Feed,
    FeedQuery, LoadOutcome, ReplyState, Session, VoteState,
};
use structopt::StructOpt;

mod http;
mod store;

use http::HttpBackend;
use store::FileStore;

#[derive(structopt::StructOpt)]
struct Opt {
    /// Base URL of the forum, without the `/api` suffix
    #[structopt(short, long, env = "BUZZBEE_HOST")]
    host: String,

    /// Where the session is kept between runs
    #[structopt(long, env = "BUZZBEE_SESSION", parse(from_os_str))]
    session: Option<PathBuf>,

    /// Items asked for per page
    #[structopt(long, default_value = "10")]
    page_size: u32,

    /// Number of pages to load
    #[structopt(long, default_value = "1")]
    pages: usize,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Sign in and remember the session
    Login {
        username: String,

        #[structopt(long, env = "BUZZBEE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account and sign into it
    Signup {
        username: String,

        #[structopt(long, env = "BUZZBEE_PASSWORD", hide_env_values = true)]
        password: String,

        #[structopt(long)]
        display_name: Option<String>,

        #[structopt(long)]
        bio: Option<String>,

        /// Stock profile picture to use
        #[structopt(long, default_value = "1")]
        image: i64,
    },

    /// Forget the session
    Logout,

    /// Show who the saved session belongs to
    Whoami,

    /// List posts
    Posts {
        #[structopt(long)]
        topic: Option<i64>,

        #[structopt(long, default_value = "")]
        search: String,

        /// buzzing, alpha or new
        #[structopt(long, default_value = "buzzing", parse(try_from_str = parse_post_sort))]
        sort: PostSort,

        /// Only posts from followed topics
        #[structopt(long, conflicts_with = "for-you")]
        following: bool,

        /// Followed topics first, then everything else
        #[structopt(long)]
        for_you: bool,
    },

    /// List topics
    Topics {
        #[structopt(long, default_value = "")]
        search: String,

        /// buzzing, alpha or new
        #[structopt(long, default_value = "buzzing", parse(try_from_str = parse_topic_sort))]
        sort: TopicSort,
    },

    /// Search topics and posts at once
    Search { text: String },

    /// Start a new buzz in a topic
    Buzz {
        topic: i64,
        title: String,
        content: String,
    },

    /// Replace the title and text of one of your posts
    EditBuzz {
        post: i64,
        title: String,
        content: String,
    },

    /// Delete one of your posts, with its comments
    DeleteBuzz { post: i64 },

    /// Show the comments of a post
    Thread {
        post: i64,

        /// buzzing or new
        #[structopt(long, default_value = "buzzing", parse(try_from_str = parse_comment_sort))]
        sort: CommentSort,

        /// Load more replies under these comments
        #[structopt(long)]
        expand: Vec<i64>,
    },

    /// Comment on a post, or reply to a comment
    Comment {
        post: i64,

        #[structopt(long)]
        parent: Option<i64>,

        content: String,
    },

    /// Replace the text of one of your comments
    Edit {
        post: i64,
        comment: i64,
        content: String,
    },

    /// Delete one of your comments, with its replies
    Delete { post: i64, comment: i64 },

    /// Vote on a post, or on a comment with --comment; voting the same way twice
    /// takes the vote back
    Vote {
        post: i64,

        #[structopt(long)]
        comment: Option<i64>,

        /// up or down
        #[structopt(parse(try_from_str = parse_vote))]
        vote: VoteType,
    },

    /// Bookmark a post, or remove its bookmark
    Bookmark { post: i64 },
}

fn parse_post_sort(s: &str) -> anyhow::Result<PostSort> {
    match s {
        "buzzing" => Ok(PostSort::Buzzing),
        "alpha" => Ok(PostSort::Alpha),
        "new" => Ok(PostSort::New),
        _ => anyhow::bail!("unknown sort {s:?}, expected buzzing, alpha or new"),
    }
}

fn parse_topic_sort(s: &str) -> anyhow::Result<TopicSort> {
    match s {
        "buzzing" => Ok(TopicSort::Buzzing),
        "alpha" => Ok(TopicSort::Alpha),
        "new" => Ok(TopicSort::New),
        _ => anyhow::bail!("unknown sort {s:?}, expected buzzing, alpha or new"),
    }
}

fn parse_comment_sort(s: &str) -> anyhow::Result<CommentSort> {
    match s {
        "buzzing" => Ok(CommentSort::Buzzing),
        "new" => Ok(CommentSort::New),
        _ => anyhow::bail!("unknown sort {s:?}, expected buzzing or new"),
    }
}

fn parse_vote(s: &str) -> anyhow::Result<VoteType> {
    match s {
        "up" => Ok(VoteType::Up),
        "down" => Ok(VoteType::Down),
        _ => anyhow::bail!("unknown vote {s:?}, expected up or down"),
    }
}

fn default_session_path() -> anyhow::Result<PathBuf> {
    let home = std::env::var_os("HOME").context("neither BUZZBEE_SESSION nor HOME is set")?;
    Ok(PathBuf::from(home).join(".buzzbee-session.json"))
}

async fn load_pages<Q, B>(feed: &mut Feed<Q>, backend: &B, pages: usize) -> anyhow::Result<()>
where
    Q: FeedQuery,
    B: Backend + ?Sized,
{
    for _ in 0..pages {
        match feed.load_more(backend).await? {
            LoadOutcome::Loaded(n) => tracing::debug!(added = n, "loaded page"),
            LoadOutcome::Exhausted => break,
            o => tracing::warn!(outcome = ?o, "page not loaded"),
        }
    }
    Ok(())
}

/// Load root pages and expand replies until `id` shows up
async fn find_comment<B: Backend + ?Sized>(
    thread: &mut CommentThread,
    backend: &B,
    id: CommentId,
) -> anyhow::Result<()> {
    loop {
        if thread.find(&id).is_some() {
            return Ok(());
        }
        let collapsed = CommentNode::walk(thread.roots())
            .into_iter()
            .map(|(_, n)| n.id())
            .find(|c| thread.reply_state(c) == Some(ReplyState::Collapsed));
        match collapsed {
            Some(c) => {
                thread.expand_replies(backend, c).await?;
            }
            None if thread.has_more() => {
                thread.load_more(backend).await?;
            }
            None => anyhow::bail!("comment {} is not on this post", id.0),
        }
    }
}

fn print_thread(thread: &CommentThread) {
    let now = chrono::Utc::now();
    for (depth, node) in CommentNode::walk(thread.roots()) {
        let c = &node.comment;
        println!(
            "{:indent$}#{} {} ({:+}) {}: {}",
            "",
            c.comment_id.0,
            c.username,
            c.sum_votes,
            relative_age(now, c.created_date),
            c.content,
            indent = depth * 2,
        );
        if node.has_more_replies() {
            println!(
                "{:indent$}[{} more replies]",
                "",
                c.reply_count as usize - node.reply_children.len(),
                indent = depth * 2 + 2,
            );
        }
    }
    if thread.has_more() {
        println!("[more comments]");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let opt = Opt::from_args();
    let session_path = match opt.session {
        Some(p) => p,
        None => default_session_path()?,
    };
    let mut backend = HttpBackend::new(opt.host);
    let mut session = Session::new(FileStore::new(session_path))?;
    if let Err(e) = session.init(&backend).await {
        tracing::warn!(error = ?e, "could not verify saved session, continuing with it");
    }
    backend.set_token(session.token().cloned());
    let viewer = session.viewer();
    let now = chrono::Utc::now();

    match opt.cmd {
        Command::Login { username, password } => {
            let user = session
                .sign_in(&backend, &SignIn { username, password })
                .await?;
            println!("signed in as {} (#{})", user.username, user.user_id.0);
        }
        Command::Signup {
            username,
            password,
            display_name,
            bio,
            image,
        } => {
            let payload = SignUp {
                username,
                password,
                display_name,
                bio,
                image_id: image,
            };
            let user = session.sign_up(&backend, &payload).await?;
            println!("signed up as {} (#{})", user.username, user.user_id.0);
        }
        Command::Logout => {
            session.sign_out()?;
            println!("signed out");
        }
        Command::Whoami => match session.user() {
            Some(u) => println!("{} (#{})", u.username, u.user_id.0),
            None => println!("not signed in"),
        },
        Command::Posts {
            topic,
            search,
            sort,
            following,
            for_you,
        } => {
            let scope = match (following, for_you) {
                (true, _) => PostScope::Following,
                (false, true) => PostScope::Personalized,
                (false, false) => PostScope::All,
            };
            let mut feed = Feed::new(PostQuery {
                viewer,
                search,
                sort,
                scope,
                topic: topic.map(TopicId),
                limit: opt.page_size,
            });
            load_pages(&mut feed, &backend, opt.pages).await?;
            for p in feed.items() {
                println!(
                    "#{} [{}] {} ({:+}, {} comments, {}) by {}{}",
                    p.post_id.0,
                    p.topic_name,
                    p.title,
                    p.sum_votes,
                    p.comment_count,
                    relative_age(now, p.created_date),
                    p.username,
                    if p.is_bookmarked { " *" } else { "" },
                );
            }
            if feed.has_more() {
                println!("[more posts]");
            }
        }
        Command::Topics { search, sort } => {
            let mut feed = Feed::new(TopicQuery {
                viewer,
                search,
                sort,
                limit: opt.page_size,
            });
            load_pages(&mut feed, &backend, opt.pages).await?;
            for t in feed.items() {
                println!(
                    "#{} {} ({} followers, {} posts){}: {}",
                    t.topic_id.0,
                    t.topic_name,
                    t.followers_count,
                    t.posts_count,
                    if t.is_following { " following" } else { "" },
                    t.description,
                );
            }
            if feed.has_more() {
                println!("[more topics]");
            }
        }
        Command::Search { text } => {
            let (topics, posts) = search_everything(&backend, viewer, &text, opt.page_size).await?;
            println!("topics:");
            for t in &topics.result {
                println!("  #{} {}", t.topic_id.0, t.topic_name);
            }
            println!("posts:");
            for p in &posts.result {
                println!("  #{} {}", p.post_id.0, p.title);
            }
        }
        Command::Buzz {
            topic,
            title,
            content,
        } => {
            let mut feed = Feed::new(PostQuery::in_topic(viewer, TopicId(topic)));
            let id = feed
                .create_post(&backend, &session, TopicId(topic), &title, &content)
                .await?;
            let p = feed
                .items()
                .first()
                .context("created post missing from its topic")?;
            println!("posted buzz #{} at /buzz/{}", id.0, p.post_url);
        }
        Command::EditBuzz {
            post,
            title,
            content,
        } => {
            let mut feed = Feed::new(PostQuery::all(viewer));
            feed.edit_post(&backend, &session, PostId(post), &title, &content)
                .await?;
            println!("updated buzz #{post}");
        }
        Command::DeleteBuzz { post } => {
            let mut feed = Feed::new(PostQuery::all(viewer));
            feed.delete_post(&backend, &session, PostId(post)).await?;
            println!("deleted buzz #{post}");
        }
        Command::Thread { post, sort, expand } => {
            let mut thread = CommentThread::new(CommentQuery {
                sort,
                limit: opt.page_size,
                ..CommentQuery::for_post(viewer, PostId(post))
            });
            for _ in 0..opt.pages {
                if thread.load_more(&backend).await? == LoadOutcome::Exhausted {
                    break;
                }
            }
            for id in expand {
                if let Err(e) = find_comment(&mut thread, &backend, CommentId(id)).await {
                    tracing::warn!(error = ?e, "not expanding comment {id}");
                    continue;
                }
                while thread.reply_state(&CommentId(id)) == Some(ReplyState::Collapsed) {
                    thread.expand_replies(&backend, CommentId(id)).await?;
                }
            }
            print_thread(&thread);
        }
        Command::Comment {
            post,
            parent,
            content,
        } => {
            let mut thread = CommentThread::new(CommentQuery::for_post(viewer, PostId(post)));
            if let Some(p) = parent {
                find_comment(&mut thread, &backend, CommentId(p)).await?;
            }
            let id = thread
                .post_comment(&backend, &session, parent.map(CommentId), &content)
                .await?;
            println!("posted comment #{}", id.0);
        }
        Command::Edit {
            post,
            comment,
            content,
        } => {
            let mut thread = CommentThread::new(CommentQuery::for_post(viewer, PostId(post)));
            thread
                .edit_comment(&backend, &session, CommentId(comment), &content)
                .await?;
            println!("updated comment #{comment}");
        }
        Command::Delete { post, comment } => {
            let mut thread = CommentThread::new(CommentQuery::for_post(viewer, PostId(post)));
            thread
                .delete_comment(&backend, &session, CommentId(comment))
                .await?;
            println!("deleted comment #{comment}");
        }
        Command::Vote {
            post,
            comment,
            vote,
        } => {
            let mut state = match comment {
                None => VoteState::of_post(&backend.fetch_post(viewer, PostId(post)).await?),
                Some(c) => {
                    let mut thread =
                        CommentThread::new(CommentQuery::for_post(viewer, PostId(post)));
                    find_comment(&mut thread, &backend, CommentId(c)).await?;
                    let node = thread
                        .find(&CommentId(c))
                        .context("comment vanished from its thread")?;
                    VoteState::of_comment(&node.comment)
                }
            };
            let action = state.click(&backend, &session, vote).await?;
            println!("{action:?}: now {:+}", state.score());
        }
        Command::Bookmark { post } => {
            let mut p = backend.fetch_post(viewer, PostId(post)).await?;
            let action = toggle_bookmark(&backend, &session, &mut p).await?;
            println!("{action:?}");
        }
    }

    Ok(())
}
