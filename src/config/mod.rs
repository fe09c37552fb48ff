//! Configuration module

mod site;

pub use site::FootnotesConfig;
pub use site::HighlightConfig;
pub use site::SiteConfig;
pub use site::SiteZone;
