//! Content module - handles posts, front matter and markdown rendering

pub mod frontmatter;
mod item;
pub mod loader;
mod markdown;

pub use frontmatter::FrontMatter;
pub use item::ContentItem;
pub use loader::ContentLoader;
pub use markdown::{render_fragment, MarkdownRenderer};
