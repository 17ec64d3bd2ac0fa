//! Built-in plugins.
//!
//! Each one is an ordinary [`Plugin`] with no access to anything a
//! third-party plugin couldn't reach. Together they make a working site
//! build:
//!
//! | Stage     | Plugin          | Priority |
//! |-----------|-----------------|----------|
//! | discover  | [`Discover`]    | first    |
//! | load      | [`Load`]        | default  |
//! | transform | [`Feeds`]       | late     |
//! | render    | [`Markdown`]    | default  |
//! | render    | [`Template`]    | late     |
//! | collect   | [`FeedIndex`]   | default  |
//! | write     | [`PrivateGuard`]| first    |
//! | write     | [`Publish`]     | default  |
//! | cleanup   | [`CleanStale`]  | default  |

pub mod clean;
pub mod discover;
pub mod feed_index;
pub mod feeds;
pub mod guard;
pub mod load;
pub mod markdown;
pub mod publish;
pub mod template;

pub use clean::CleanStale;
pub use discover::Discover;
pub use feed_index::FeedIndex;
pub use feeds::Feeds;
pub use guard::PrivateGuard;
pub use load::Load;
pub use markdown::Markdown;
pub use publish::Publish;
pub use template::Template;

use crate::plugin::Plugin;

/// Every built-in, for a full build.
pub fn defaults() -> Vec<Box<dyn Plugin>> {
    vec![
        Box::new(Discover),
        Box::new(Load),
        Box::new(Feeds),
        Box::new(Markdown),
        Box::new(Template),
        Box::new(FeedIndex),
        Box::new(PrivateGuard),
        Box::new(Publish::default()),
        Box::new(CleanStale),
    ]
}

/// Discovery and loading only: validates sources without rendering.
pub fn check_set() -> Vec<Box<dyn Plugin>> {
    vec![Box::new(Discover), Box::new(Load)]
}
