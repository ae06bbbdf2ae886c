pub mod catalog;
pub mod db;
pub mod google;

pub use catalog::CommandCatalogRefresher;
pub use db::DbAdapter;
pub use google::{GoogleCalendarAdapter, GoogleOAuthAdapter};
